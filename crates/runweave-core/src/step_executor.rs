// Step executor
//
// The inner loop of a run: issue one streaming model call, reassemble
// tool-call fragments, persist the assistant step, execute the tool batch,
// persist tool steps, extend the message context, and repeat until the
// model stops calling tools or the step budget runs out.
//
// Tool calls inside one assistant step execute concurrently, but their tool
// steps are sequenced in the order the assistant declared them, keeping
// replay deterministic.

use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use runweave_contracts::{Run, Step, StepDelta, StepRole, Usage, UsageMetrics};

use crate::accumulator::ToolCallAccumulator;
use crate::context::ExecutionContext;
use crate::context_builder::step_to_llm_message;
use crate::error::{CoreError, Result};
use crate::events::EventFactory;
use crate::llm::{LlmCallConfig, LlmDriver, LlmMessage};
use crate::tool_executor::ToolExecutor;
use crate::traits::{LlmCallTrace, SessionStore, TraceStore};

/// Configuration for one step loop
#[derive(Debug, Clone)]
pub struct StepExecutorConfig {
    /// Maximum model-call iterations before the loop is cut off
    pub max_steps: u32,

    pub llm: LlmCallConfig,

    /// Retries for opening a model stream after a retryable transport error
    pub max_llm_retries: u32,

    /// Issue a final non-tool summary call when the budget runs out
    pub enable_termination_summary: bool,

    pub termination_prompt: String,
}

impl StepExecutorConfig {
    pub fn new(llm: LlmCallConfig) -> Self {
        Self {
            max_steps: 10,
            llm,
            max_llm_retries: 2,
            enable_termination_summary: false,
            termination_prompt: "The step limit for this run has been reached. Summarize the \
                                 work done so far and give the user a closing answer."
                .to_string(),
        }
    }

    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_termination_summary(mut self, enabled: bool) -> Self {
        self.enable_termination_summary = enabled;
        self
    }
}

/// What the loop produced
#[derive(Debug, Clone)]
pub struct StepLoopOutcome {
    /// Content of the final assistant step, when one was produced
    pub final_response: Option<String>,

    /// Model-call iterations executed
    pub steps_executed: u32,

    /// The loop stopped on budget, not because the model finished
    pub budget_exhausted: bool,

    /// Highest step sequence persisted by the loop
    pub last_sequence: u64,
}

/// Drives the model/tool loop for a single run
pub struct StepExecutor {
    driver: Arc<dyn LlmDriver>,
    tools: Arc<ToolExecutor>,
    store: Arc<dyn SessionStore>,
    traces: Option<Arc<dyn TraceStore>>,
}

impl StepExecutor {
    pub fn new(
        driver: Arc<dyn LlmDriver>,
        tools: Arc<ToolExecutor>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            driver,
            tools,
            store,
            traces: None,
        }
    }

    pub fn with_traces(mut self, traces: Arc<dyn TraceStore>) -> Self {
        self.traces = Some(traces);
        self
    }

    pub fn tools(&self) -> &Arc<ToolExecutor> {
        &self.tools
    }

    /// Run the loop. `messages` is the LLM context built from persisted
    /// history; `run` is updated (and saved) as steps land.
    pub async fn execute(
        &self,
        mut messages: Vec<LlmMessage>,
        ctx: &ExecutionContext,
        events: &EventFactory,
        run: &mut Run,
        config: &StepExecutorConfig,
    ) -> Result<StepLoopOutcome> {
        let session_id = ctx
            .session_id
            .ok_or_else(|| CoreError::config("step executor needs a resolved session"))?;

        let mut outcome = StepLoopOutcome {
            final_response: None,
            steps_executed: 0,
            budget_exhausted: false,
            last_sequence: run.end_sequence,
        };

        let mut budget = config.max_steps;
        while budget > 0 {
            if ctx.abort.is_aborted() {
                return Err(CoreError::Cancelled);
            }

            let step = self
                .model_step(&mut messages, ctx, events, run, session_id, &config.llm, config)
                .await?;
            outcome.steps_executed += 1;
            outcome.last_sequence = step.sequence;
            budget -= 1;

            if !step.has_tool_calls() {
                outcome.final_response = step.content.clone();
                return Ok(outcome);
            }

            let results = self
                .tools
                .execute_batch(step.tool_calls(), ctx, events)
                .await?;

            for result in &results {
                let sequence = self.store.next_sequence(session_id).await?;
                let mut tool_step = Step::tool(
                    session_id,
                    ctx.run_id,
                    &result.tool_call_id,
                    &result.tool_name,
                    &result.content,
                )
                .with_sequence(sequence);
                if let Some(user_surface) = &result.content_for_user {
                    tool_step = tool_step.with_content_for_user(user_surface);
                }
                tool_step.metrics.duration_ms = result.duration_ms;

                self.store.save_step(&tool_step).await?;
                run.observe_sequence(sequence);
                self.store.save_run(run).await?;
                events.step_completed(tool_step.clone()).await?;
                messages.push(step_to_llm_message(&tool_step, false));
                outcome.last_sequence = sequence;
            }
        }

        outcome.budget_exhausted = true;
        warn!(run_id = %ctx.run_id, max_steps = config.max_steps, "step budget exhausted");

        if config.enable_termination_summary {
            messages.push(LlmMessage::user(&config.termination_prompt));
            let summary_config = config.llm.without_tools();
            let step = self
                .model_step(&mut messages, ctx, events, run, session_id, &summary_config, config)
                .await?;
            outcome.last_sequence = step.sequence;
            outcome.final_response = step.content.clone();
        }

        Ok(outcome)
    }

    /// One streaming model call persisted as an assistant step
    async fn model_step(
        &self,
        messages: &mut Vec<LlmMessage>,
        ctx: &ExecutionContext,
        events: &EventFactory,
        run: &mut Run,
        session_id: Uuid,
        call_config: &LlmCallConfig,
        config: &StepExecutorConfig,
    ) -> Result<Step> {
        let sequence = self.store.next_sequence(session_id).await?;
        let step_id = Uuid::now_v7();
        events
            .step_started(step_id, sequence, StepRole::Assistant)
            .await?;

        let start = Instant::now();
        let mut stream = self.open_stream(messages, call_config, config).await?;

        let mut content = String::new();
        let mut reasoning = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        let mut usage = Usage::default();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(delta) = chunk.content_delta {
                if !delta.is_empty() {
                    content.push_str(&delta);
                    events.step_delta(step_id, StepDelta::content(delta)).await?;
                }
            }
            if let Some(delta) = chunk.reasoning_delta {
                if !delta.is_empty() {
                    reasoning.push_str(&delta);
                    events
                        .step_delta(step_id, StepDelta::reasoning(delta))
                        .await?;
                }
            }
            for fragment in chunk.tool_call_fragments {
                accumulator.merge(&fragment);
                events
                    .step_delta(step_id, StepDelta::tool_call(fragment))
                    .await?;
            }
            if let Some(chunk_usage) = chunk.usage {
                usage.input_tokens += chunk_usage.input_tokens;
                usage.output_tokens += chunk_usage.output_tokens;
            }
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let metrics = UsageMetrics {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            duration_ms,
        };

        let step = Step::assistant(session_id, ctx.run_id, content, accumulator.finalize())
            .with_id(step_id)
            .with_sequence(sequence)
            .with_reasoning(reasoning)
            .with_metrics(metrics);

        self.store.save_step(&step).await?;
        run.observe_sequence(sequence);
        run.metrics.accumulate(&metrics);
        self.store.save_run(run).await?;
        events.step_completed(step.clone()).await?;

        if let Some(traces) = &self.traces {
            traces
                .record_llm_call(LlmCallTrace::new(
                    ctx.run_id,
                    session_id,
                    &call_config.model,
                    usage,
                    duration_ms,
                ))
                .await?;
        }

        debug!(
            run_id = %ctx.run_id,
            sequence,
            tool_calls = step.tool_calls().len(),
            "assistant step persisted"
        );

        messages.push(step_to_llm_message(&step, false));
        Ok(step)
    }

    /// Open the model stream, retrying retryable transport errors up to the
    /// configured cap. Mid-stream errors are not retried; by then partial
    /// deltas are already on the wire.
    async fn open_stream(
        &self,
        messages: &[LlmMessage],
        call_config: &LlmCallConfig,
        config: &StepExecutorConfig,
    ) -> Result<crate::llm::ChunkStream> {
        let mut attempt = 0u32;
        loop {
            match self.driver.stream_chat(messages.to_vec(), call_config).await {
                Ok(stream) => return Ok(stream),
                Err(err) if err.is_retryable() && attempt < config.max_llm_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "retrying model call");
                }
                Err(err) => return Err(err),
            }
        }
    }
}
