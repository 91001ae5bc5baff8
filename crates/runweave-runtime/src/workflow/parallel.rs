// Parallel workflow
//
// Branches run concurrently, each on its own child context and sub-wire;
// forwarded events carry the branch id so consumers can demultiplex. Branch
// inputs render against the workflow input only (branches cannot see each
// other). Results merge through a template, or concatenate in declared
// order when no template is given.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use runweave_core::{CoreError, ExecutionContext, Result, RunOutput, Runnable, SessionStore};

use crate::template::render;
use crate::workflow::{initial_env, Stage, StageOutcome, WorkflowBase};

/// Concurrent composition of runnables
pub struct ParallelWorkflow {
    base: WorkflowBase,
    branches: Vec<Stage>,
    merge_template: Option<String>,
    /// Fail the workflow when any branch fails; otherwise failed branches
    /// contribute empty output
    strict: bool,
}

impl ParallelWorkflow {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>, branches: Vec<Stage>) -> Self {
        Self {
            base: WorkflowBase::new(id, store),
            branches,
            merge_template: None,
            strict: true,
        }
    }

    pub fn with_merge_template(mut self, template: impl Into<String>) -> Self {
        self.merge_template = Some(template.into());
        self
    }

    pub fn lenient(mut self) -> Self {
        self.strict = false;
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.base.max_depth = max_depth;
        self
    }

    async fn run_branches(
        &self,
        env: &mut BTreeMap<String, String>,
        ctx: &ExecutionContext,
        run: &mut runweave_contracts::Run,
    ) -> Result<Option<String>> {
        self.base.check_abort(ctx)?;

        let mut handles = Vec::with_capacity(self.branches.len());
        for stage in &self.branches {
            let stage = stage.clone();
            let env = env.clone();
            let ctx = ctx.clone();
            let base_store = Arc::clone(&self.base.store);
            let workflow_id = self.base.id.clone();
            let max_depth = self.base.max_depth;

            handles.push(tokio::spawn(async move {
                let base = WorkflowBase {
                    id: workflow_id,
                    store: base_store,
                    max_depth,
                };
                let branch_id = stage.id.clone();
                let outcome = base
                    .run_stage(&stage, &env, &ctx, Some(branch_id.clone()))
                    .await;
                (branch_id, outcome)
            }));
        }

        let mut child_outputs: Vec<RunOutput> = Vec::new();
        let mut merged: Vec<(String, String)> = Vec::new();
        let mut first_failure: Option<CoreError> = None;

        for handle in handles {
            let (branch_id, outcome) = handle
                .await
                .map_err(|e| CoreError::Internal(anyhow::anyhow!("branch task panicked: {e}")))?;
            match outcome {
                Ok(StageOutcome::Completed(output)) => {
                    let response = output.response.clone().unwrap_or_default();
                    merged.push((branch_id, response));
                    child_outputs.push(output);
                }
                Ok(StageOutcome::Skipped) => {
                    merged.push((branch_id, String::new()));
                }
                Err(err) => {
                    warn!(branch = %branch_id, error = %err, "branch failed");
                    if self.strict && first_failure.is_none() {
                        first_failure = Some(err);
                    }
                    merged.push((branch_id, String::new()));
                }
            }
        }

        for output in &child_outputs {
            self.base.absorb_child(run, output).await?;
        }

        if let Some(err) = first_failure {
            return Err(err);
        }

        // Merge environment holds each branch's output under its id
        for (branch_id, response) in &merged {
            env.insert(format!("{branch_id}.output"), response.clone());
            env.insert(branch_id.clone(), response.clone());
        }

        let response = match &self.merge_template {
            Some(template) => render(template, env),
            None => {
                // Declared order, not completion order
                self.branches
                    .iter()
                    .filter_map(|b| env.get(&b.output_key()))
                    .filter(|r| !r.is_empty())
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        Ok(Some(response))
    }
}

#[async_trait]
impl Runnable for ParallelWorkflow {
    fn id(&self) -> &str {
        &self.base.id
    }

    async fn run(&self, input: &str, ctx: ExecutionContext) -> Result<RunOutput> {
        let begun = self.base.begin(input, &ctx).await;
        let (ctx, events, mut run) = match begun {
            Ok(parts) => parts,
            Err(err) => {
                ctx.wire.close();
                return Err(err);
            }
        };

        let mut env = initial_env(input);
        let outcome = self.run_branches(&mut env, &ctx, &mut run).await;
        let result = self.base.finish(outcome, run, &ctx, &events).await;
        ctx.wire.close();
        result
    }
}
