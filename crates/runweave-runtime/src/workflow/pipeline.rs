// Pipeline workflow
//
// Ordered stages; each stage's rendered input can reference the workflow
// input and any prior stage's output. A stage whose condition evaluates
// false is skipped and the environment keeps flowing past it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use runweave_core::{ExecutionContext, Result, RunOutput, Runnable, SessionStore};

use crate::template::render;
use crate::workflow::{initial_env, Stage, StageOutcome, WorkflowBase};

/// Sequential composition of runnables
pub struct PipelineWorkflow {
    base: WorkflowBase,
    stages: Vec<Stage>,
    /// Optional template for the final output; defaults to the last
    /// non-skipped stage's response
    output_template: Option<String>,
}

impl PipelineWorkflow {
    pub fn new(id: impl Into<String>, store: Arc<dyn SessionStore>, stages: Vec<Stage>) -> Self {
        Self {
            base: WorkflowBase::new(id, store),
            stages,
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

    async fn run_stages(
        &self,
        env: &mut BTreeMap<String, String>,
        ctx: &ExecutionContext,
        run: &mut runweave_contracts::Run,
    ) -> Result<Option<String>> {
        let mut last_response: Option<String> = None;

        for stage in &self.stages {
            self.base.check_abort(ctx)?;
            match self.base.run_stage(stage, env, ctx, None).await? {
                StageOutcome::Skipped => continue,
                StageOutcome::Completed(output) => {
                    self.base.absorb_child(run, &output).await?;
                    let response = output.response.clone().unwrap_or_default();
                    env.insert(stage.output_key(), response.clone());
                    last_response = Some(response);
                }
            }
        }

        Ok(match &self.output_template {
            Some(template) => Some(render(template, env)),
            None => last_response,
        })
    }
}

#[async_trait]
impl Runnable for PipelineWorkflow {
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
        let outcome = self.run_stages(&mut env, &ctx, &mut run).await;
        let result = self.base.finish(outcome, run, &ctx, &events).await;
        ctx.wire.close();
        result
    }
}
