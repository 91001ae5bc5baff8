// Workflow operators
//
// Three composition operators implement the runnable contract: Pipeline
// (sequential stages with templated piping), Parallel (fan-out with merged
// results), and Loop (bounded repetition under a condition). Stages hold
// runnables, so workflows nest agents, agents nest workflows, and workflows
// nest workflows without any of them knowing.

mod looping;
mod parallel;
mod pipeline;

pub use looping::LoopWorkflow;
pub use parallel::ParallelWorkflow;
pub use pipeline::PipelineWorkflow;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use runweave_contracts::{Run, RunStatus, Session};
use runweave_core::{
    wire, CoreError, EventFactory, ExecutionContext, Result, RunOutput, Runnable, SessionStore,
};

use crate::forwarder::forward_events;
use crate::template::{eval_condition, render};

/// Default wire buffer for stage child runs
const STAGE_WIRE_CAPACITY: usize = 256;

/// One stage of a workflow: a runnable plus templated input piping and an
/// optional condition.
#[derive(Clone)]
pub struct Stage {
    pub id: String,
    pub runnable: Arc<dyn Runnable>,
    pub input_template: String,
    pub condition: Option<String>,
}

impl Stage {
    pub fn new(id: impl Into<String>, runnable: Arc<dyn Runnable>) -> Self {
        Self {
            id: id.into(),
            runnable,
            input_template: "{input}".to_string(),
            condition: None,
        }
    }

    pub fn with_input(mut self, template: impl Into<String>) -> Self {
        self.input_template = template.into();
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Environment key this stage's output lands under
    pub fn output_key(&self) -> String {
        format!("{}.output", self.id)
    }
}

/// What running one stage produced
pub(crate) enum StageOutcome {
    Skipped,
    Completed(RunOutput),
}

/// Shared lifecycle plumbing for the three operators
pub(crate) struct WorkflowBase {
    pub id: String,
    pub store: Arc<dyn SessionStore>,
    pub max_depth: u32,
}

impl WorkflowBase {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            id: id.into(),
            store,
            max_depth: 8,
        }
    }

    /// Depth check, session resolution, run record, `run_started`
    pub async fn begin(
        &self,
        input: &str,
        ctx: &ExecutionContext,
    ) -> Result<(ExecutionContext, EventFactory, Run)> {
        if ctx.depth > self.max_depth {
            return Err(CoreError::DepthExceeded(self.max_depth));
        }

        let session_id = match ctx.session_id {
            Some(session_id) => {
                if self.store.get_session(session_id).await?.is_none() {
                    let mut session = Session::new().with_agent(&self.id);
                    session.id = session_id;
                    self.store.create_session(session).await?;
                }
                session_id
            }
            None => {
                self.store
                    .create_session(Session::new().with_agent(&self.id))
                    .await?
                    .id
            }
        };

        let ctx = ctx.clone().with_session(session_id);
        let events = EventFactory::new(&ctx);

        let mut run = Run::new(session_id, &self.id).with_id(ctx.run_id);
        if let Some(parent) = ctx.parent_run_id {
            run = run.nested(parent, ctx.depth);
        }
        self.store.save_run(&run).await?;
        events.run_started(input, session_id).await?;
        run.transition(RunStatus::Running)
            .map_err(|e| CoreError::config(e.to_string()))?;
        self.store.save_run(&run).await?;

        info!(workflow = %self.id, run_id = %ctx.run_id, "workflow run started");
        Ok((ctx, events, run))
    }

    /// Run one stage on a child wire, forwarding its events. Skipped stages
    /// (condition false) produce no child run.
    pub async fn run_stage(
        &self,
        stage: &Stage,
        env: &BTreeMap<String, String>,
        ctx: &ExecutionContext,
        branch_id: Option<String>,
    ) -> Result<StageOutcome> {
        if let Some(condition) = &stage.condition {
            if !eval_condition(condition, env) {
                debug!(workflow = %self.id, stage = %stage.id, "stage skipped by condition");
                return Ok(StageOutcome::Skipped);
            }
        }

        let stage_input = render(&stage.input_template, env);
        let (child_wire, child_reader) = wire(STAGE_WIRE_CAPACITY);
        let child_ctx = ctx.child(stage.runnable.id(), child_wire);
        let forwarder = forward_events(child_reader, ctx.wire.clone(), branch_id);

        let output = stage.runnable.run(&stage_input, child_ctx).await;
        let _ = forwarder.await;
        let output = output?;

        if output.status != RunStatus::Completed {
            return Err(CoreError::tool(format!(
                "stage '{}' ended with status {}{}",
                stage.id,
                output.status,
                output
                    .error
                    .as_deref()
                    .map(|e| format!(": {e}"))
                    .unwrap_or_default()
            )));
        }
        Ok(StageOutcome::Completed(output))
    }

    /// Fold a child run's metrics into the parent run. Child runs live in
    /// their own sessions, so their sequence ranges stay theirs.
    pub async fn absorb_child(&self, run: &mut Run, child: &RunOutput) -> Result<()> {
        if let Some(child_run) = self.store.get_run(child.run_id).await? {
            run.metrics.accumulate(&child_run.metrics);
        }
        self.store.save_run(run).await?;
        Ok(())
    }

    /// Terminal bookkeeping shared by the operators
    pub async fn finish(
        &self,
        outcome: Result<Option<String>>,
        mut run: Run,
        ctx: &ExecutionContext,
        events: &EventFactory,
    ) -> Result<RunOutput> {
        let session_id = run.session_id;
        let output = match outcome {
            Ok(response) => {
                run.response = response.clone();
                events.run_completed(response.clone(), run.metrics).await?;
                run.transition(RunStatus::Completed)
                    .map_err(|e| CoreError::config(e.to_string()))?;
                RunOutput {
                    run_id: run.id,
                    session_id,
                    response,
                    status: RunStatus::Completed,
                    error: None,
                }
            }
            Err(CoreError::Cancelled) => {
                events.run_cancelled(None).await?;
                run.transition(RunStatus::Cancelled)
                    .map_err(|e| CoreError::config(e.to_string()))?;
                RunOutput {
                    run_id: run.id,
                    session_id,
                    response: None,
                    status: RunStatus::Cancelled,
                    error: None,
                }
            }
            Err(err) => {
                warn!(workflow = %self.id, run_id = %run.id, error = %err, "workflow failed");
                events.run_failed(&err).await?;
                run.error = Some(err.to_string());
                run.transition(RunStatus::Failed)
                    .map_err(|e| CoreError::config(e.to_string()))?;
                RunOutput {
                    run_id: run.id,
                    session_id,
                    response: None,
                    status: RunStatus::Failed,
                    error: Some(err.to_string()),
                }
            }
        };
        self.store.save_run(&run).await?;
        Ok(output)
    }

    pub fn check_abort(&self, ctx: &ExecutionContext) -> Result<()> {
        if ctx.abort.is_aborted() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }
}

/// Initial stage environment for a workflow input
pub(crate) fn initial_env(input: &str) -> BTreeMap<String, String> {
    let mut env = BTreeMap::new();
    env.insert("input".to_string(), input.to_string());
    env
}

/// Render the loop's final environment as a stable JSON snapshot
pub(crate) fn env_snapshot(env: &BTreeMap<String, String>) -> String {
    serde_json::to_string(env).unwrap_or_default()
}
