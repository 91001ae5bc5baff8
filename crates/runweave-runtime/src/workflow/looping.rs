// Loop workflow
//
// Runs its stages like one pipeline iteration, then re-evaluates the
// condition against the updated environment; repeats while the condition
// holds, bounded by max_iterations. The final output is a JSON snapshot of
// the last iteration's environment (or a rendered output template).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use runweave_core::{ExecutionContext, Result, RunOutput, Runnable, SessionStore};

use crate::template::{eval_condition, render};
use crate::workflow::{env_snapshot, initial_env, Stage, StageOutcome, WorkflowBase};

/// Bounded repetition of a stage sequence
pub struct LoopWorkflow {
    base: WorkflowBase,
    stages: Vec<Stage>,
    /// Loop continues while this holds; evaluated after each iteration
    condition: String,
    max_iterations: u32,
    output_template: Option<String>,
}

impl LoopWorkflow {
    pub fn new(
        id: impl Into<String>,
        store: Arc<dyn SessionStore>,
        stages: Vec<Stage>,
        condition: impl Into<String>,
        max_iterations: u32,
    ) -> Self {
        Self {
            base: WorkflowBase::new(id, store),
            stages,
            condition: condition.into(),
            max_iterations: max_iterations.max(1),
            output_template: None,
        }
    }

    pub fn with_output_template(mut self, template: impl Into<String>) -> Self {
        self.output_template = Some(template.into());
        self
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.base.max_depth = max_depth;
        self
    }

    async fn run_iterations(
        &self,
        env: &mut BTreeMap<String, String>,
        ctx: &ExecutionContext,
        run: &mut runweave_contracts::Run,
    ) -> Result<Option<String>> {
        let mut iteration = 0u32;

        loop {
            iteration += 1;
            env.insert("iteration".to_string(), iteration.to_string());

            for stage in &self.stages {
                self.base.check_abort(ctx)?;
                match self.base.run_stage(stage, env, ctx, None).await? {
                    StageOutcome::Skipped => continue,
                    StageOutcome::Completed(output) => {
                        self.base.absorb_child(run, &output).await?;
                        env.insert(
                            stage.output_key(),
                            output.response.clone().unwrap_or_default(),
                        );
                    }
                }
            }

            if iteration >= self.max_iterations {
                debug!(workflow = %self.base.id, iteration, "loop hit max iterations");
                break;
            }
            if !eval_condition(&self.condition, env) {
                debug!(workflow = %self.base.id, iteration, "loop condition false");
                break;
            }
        }

        Ok(Some(match &self.output_template {
            Some(template) => render(template, env),
            None => env_snapshot(env),
        }))
    }
}

#[async_trait]
impl Runnable for LoopWorkflow {
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
        let outcome = self.run_iterations(&mut env, &ctx, &mut run).await;
        let result = self.base.finish(outcome, run, &ctx, &events).await;
        ctx.wire.close();
        result
    }
}
