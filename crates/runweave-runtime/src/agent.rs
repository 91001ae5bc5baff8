// Agent runner
//
// Owns the lifecycle of one agent run: session resolution, run record,
// user step persistence, context build, the step-executor loop, and the
// terminal transitions (completed, failed, cancelled, suspended). The
// runner is the only place a consent suspension is caught; everything
// below it unwinds through the error channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};
use uuid::Uuid;

use runweave_contracts::{
    Run, RunStatus, Session, Step, StepRole, SuspendedState,
};
use runweave_core::{
    build_context, ContextBuildOptions, CoreError, EventFactory, ExecutionContext, LlmCallConfig,
    LlmDriver, Result, RunOutput, Runnable, SessionStore, StepExecutor, StepExecutorConfig,
    StepRange, ToolExecutor, TraceStore,
};
use runweave_core::traits::RunTrace;

/// Agent behavior knobs
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Unique agent id, referenced from configuration and events
    pub id: String,

    pub system_prompt: Option<String>,

    /// Step budget per run (model-call iterations)
    pub max_steps: u32,

    pub max_llm_retries: u32,

    /// Produce a closing summary when the step budget runs out
    pub enable_termination_summary: bool,

    /// Project persisted reasoning into the model context
    pub include_reasoning: bool,

    /// Keep only the last N steps of history in the model context
    pub history_limit: Option<usize>,

    /// Refuse to start past this nesting depth
    pub max_depth: u32,

    pub run_timeout: Option<Duration>,

    pub llm: LlmCallConfig,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, llm: LlmCallConfig) -> Self {
        Self {
            id: id.into(),
            system_prompt: None,
            max_steps: 10,
            max_llm_retries: 2,
            enable_termination_summary: false,
            include_reasoning: false,
            history_limit: None,
            max_depth: 8,
            run_timeout: None,
            llm,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_termination_summary(mut self) -> Self {
        self.enable_termination_summary = true;
        self
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }
}

/// An agent: one model, a tool surface, and the policy around them
pub struct Agent {
    config: AgentConfig,
    store: Arc<dyn SessionStore>,
    tools: Arc<ToolExecutor>,
    executor: StepExecutor,
    traces: Option<Arc<dyn TraceStore>>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        driver: Arc<dyn LlmDriver>,
        tools: Arc<ToolExecutor>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let executor = StepExecutor::new(driver, Arc::clone(&tools), Arc::clone(&store));
        Self {
            config,
            store,
            tools,
            executor,
            traces: None,
        }
    }

    pub fn with_traces(mut self, traces: Arc<dyn TraceStore>) -> Self {
        let executor = self.executor;
        self.executor = executor.with_traces(Arc::clone(&traces));
        self.traces = Some(traces);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub(crate) fn tools(&self) -> &Arc<ToolExecutor> {
        &self.tools
    }

    pub(crate) fn executor(&self) -> &StepExecutor {
        &self.executor
    }

    pub(crate) fn step_config(&self) -> StepExecutorConfig {
        let llm = self.config.llm.clone().with_tools(self.tools.tool_specs());
        let mut config = StepExecutorConfig::new(llm)
            .with_max_steps(self.config.max_steps)
            .with_termination_summary(self.config.enable_termination_summary);
        config.max_llm_retries = self.config.max_llm_retries;
        config
    }

    pub(crate) fn context_options(&self) -> ContextBuildOptions {
        ContextBuildOptions {
            include_reasoning: self.config.include_reasoning,
            max_steps: self.config.history_limit,
        }
    }

    /// Resolve the context's session, creating the record when absent
    pub(crate) async fn resolve_session(&self, ctx: &ExecutionContext) -> Result<Uuid> {
        if let Some(session_id) = ctx.session_id {
            if self.store.get_session(session_id).await?.is_none() {
                let mut session = Session::new().with_agent(&self.config.id);
                session.id = session_id;
                self.store.create_session(session).await?;
            }
            return Ok(session_id);
        }
        let session = self
            .store
            .create_session(Session::new().with_agent(&self.config.id))
            .await?;
        Ok(session.id)
    }

    /// Drive a run. `input` is persisted as a user step when given; resume
    /// paths pass `None` and continue from the history already in place.
    pub(crate) async fn drive(
        &self,
        input: Option<&str>,
        ctx: ExecutionContext,
    ) -> Result<RunOutput> {
        let session_id = ctx
            .session_id
            .ok_or_else(|| CoreError::config("drive requires a resolved session"))?;
        let events = EventFactory::new(&ctx);

        let mut run = Run::new(session_id, &self.config.id).with_id(ctx.run_id);
        if let Some(parent) = ctx.parent_run_id {
            run = run.nested(parent, ctx.depth);
        }
        self.store.save_run(&run).await?;

        events
            .run_started(input.unwrap_or_default(), session_id)
            .await?;

        if let Some(query) = input {
            let sequence = self.store.next_sequence(session_id).await?;
            let step = Step::user(session_id, ctx.run_id, query).with_sequence(sequence);
            events
                .step_started(step.id, sequence, StepRole::User)
                .await?;
            self.store.save_step(&step).await?;
            run.observe_sequence(sequence);
            events.step_completed(step).await?;
        }

        let history = self
            .store
            .list_steps(session_id, StepRange::all())
            .await?;
        let messages = build_context(
            self.config.system_prompt.as_deref(),
            &history,
            &self.context_options(),
        )?;

        run.transition(RunStatus::Running)
            .map_err(|e| CoreError::config(e.to_string()))?;
        self.store.save_run(&run).await?;

        let step_config = self.step_config();
        let work = self
            .executor
            .execute(messages, &ctx, &events, &mut run, &step_config);

        let outcome = match self.config.run_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, work).await {
                Ok(result) => result,
                Err(_) => {
                    ctx.abort.set();
                    Err(CoreError::Timeout(timeout))
                }
            },
            None => work.await,
        };

        self.finalize(outcome, run, &ctx, &events).await
    }

    pub(crate) async fn finalize(
        &self,
        outcome: Result<runweave_core::StepLoopOutcome>,
        mut run: Run,
        ctx: &ExecutionContext,
        events: &EventFactory,
    ) -> Result<RunOutput> {
        let session_id = run.session_id;
        let output = match outcome {
            Ok(loop_outcome) => {
                run.response = loop_outcome.final_response.clone();
                events
                    .run_completed(loop_outcome.final_response.clone(), run.metrics)
                    .await?;
                run.transition(RunStatus::Completed)
                    .map_err(|e| CoreError::config(e.to_string()))?;
                info!(
                    run_id = %run.id,
                    steps = loop_outcome.steps_executed,
                    budget_exhausted = loop_outcome.budget_exhausted,
                    "run completed"
                );
                RunOutput {
                    run_id: run.id,
                    session_id,
                    response: loop_outcome.final_response,
                    status: RunStatus::Completed,
                    error: None,
                }
            }
            Err(CoreError::Suspended(signal)) => {
                let state = SuspendedState::from_signal(run.id, *signal);
                self.store.save_suspended_state(&state).await?;
                events
                    .interaction_request(&state.interaction_request)
                    .await?;
                events
                    .execution_suspended(state.interaction_request.id)
                    .await?;
                run.transition(RunStatus::Suspended)
                    .map_err(|e| CoreError::config(e.to_string()))?;
                info!(run_id = %run.id, "run suspended pending interaction");
                RunOutput {
                    run_id: run.id,
                    session_id,
                    response: None,
                    status: RunStatus::Suspended,
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
                warn!(run_id = %run.id, error = %err, "run failed");
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
        if let Some(traces) = &self.traces {
            traces.record_run(RunTrace::from_run(&run)).await?;
        }
        Ok(output)
    }
}

#[async_trait]
impl Runnable for Agent {
    fn id(&self) -> &str {
        &self.config.id
    }

    async fn run(&self, input: &str, ctx: ExecutionContext) -> Result<RunOutput> {
        if ctx.depth > self.config.max_depth {
            ctx.wire.close();
            return Err(CoreError::DepthExceeded(self.config.max_depth));
        }

        let result = async {
            let session_id = self.resolve_session(&ctx).await?;
            let ctx = ctx.clone().with_session(session_id);
            self.drive(Some(input), ctx).await
        }
        .await;

        ctx.wire.close();
        result
    }
}
