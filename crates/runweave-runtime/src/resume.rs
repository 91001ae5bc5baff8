// Resume engine
//
// Continuation of a session with pending work. `resume_session` inspects
// the tail of the persisted steps and either starts a fresh model loop
// (trailing user step), finishes unresolved tool calls and re-drives the
// loop, or reports there is nothing to do. `resume` answers a suspended
// run's interaction request, records the consent decision, and replays the
// pending tool call through the full permission path.
//
// Idempotence: a tool call that already has a matching tool step in the
// session is never executed again.

use std::collections::HashSet;

use tracing::info;
use uuid::Uuid;

use runweave_contracts::{
    InteractionResponse, Run, RunStatus, Step, StepRole, ToolCall,
};
use runweave_core::{
    build_context, CoreError, EventFactory, ExecutionContext, Result, RunOutput, StepLoopOutcome,
    StepRange, Wire,
};

use crate::agent::Agent;

impl Agent {
    /// Inspect the session tail and continue whatever is unfinished.
    /// Returns `None` when the session is already complete.
    pub async fn resume_session(
        &self,
        session_id: Uuid,
        user_id: &str,
        wire: Wire,
    ) -> Result<Option<RunOutput>> {
        let result = self.resume_session_inner(session_id, user_id, &wire).await;
        wire.close();
        result
    }

    async fn resume_session_inner(
        &self,
        session_id: Uuid,
        user_id: &str,
        wire: &Wire,
    ) -> Result<Option<RunOutput>> {
        let steps = self
            .store()
            .list_steps(session_id, StepRange::all())
            .await?;
        let Some(last) = steps.last() else {
            return Ok(None);
        };

        // A persisted suspension needs an interaction response, not a bare
        // resume.
        if self
            .store()
            .get_suspended_state(last.run_id)
            .await?
            .is_some()
        {
            return Err(CoreError::config(format!(
                "run {} is suspended pending user input; resume it with an interaction response",
                last.run_id
            )));
        }

        match last.role {
            StepRole::User => {
                let ctx = ExecutionContext::root(user_id, wire.clone()).with_session(session_id);
                info!(session_id = %session_id, "resuming from trailing user step");
                Ok(Some(self.drive(None, ctx).await?))
            }
            StepRole::Assistant if !last.has_tool_calls() => Ok(None),
            _ => {
                let Some((_, pending)) = unresolved_tail(&steps) else {
                    return Ok(None);
                };
                info!(
                    session_id = %session_id,
                    pending = pending.len(),
                    "resuming unresolved tool calls"
                );
                let ctx = ExecutionContext::root(user_id, wire.clone()).with_session(session_id);
                let events = EventFactory::new(&ctx);

                let mut run = Run::new(session_id, self.id_str()).with_id(ctx.run_id);
                self.store().save_run(&run).await?;
                events
                    .run_started(last_user_query(&steps), session_id)
                    .await?;
                run.transition(RunStatus::Running)
                    .map_err(|e| CoreError::config(e.to_string()))?;
                self.store().save_run(&run).await?;

                let outcome = self
                    .continue_inner(&ctx, &events, &mut run, pending)
                    .await;
                Ok(Some(self.finalize(outcome, run, &ctx, &events).await?))
            }
        }
    }

    /// Answer a suspended run: record the consent decision, rehydrate the
    /// stored context, and re-drive from the pending tool call.
    pub async fn resume(
        &self,
        run_id: Uuid,
        response: InteractionResponse,
        wire: Wire,
    ) -> Result<RunOutput> {
        let result = self.resume_inner(run_id, response, &wire).await;
        wire.close();
        result
    }

    async fn resume_inner(
        &self,
        run_id: Uuid,
        response: InteractionResponse,
        wire: &Wire,
    ) -> Result<RunOutput> {
        let state = self
            .store()
            .get_suspended_state(run_id)
            .await?
            .ok_or_else(|| {
                CoreError::config(format!("run {run_id} has no suspended state"))
            })?;

        self.store().save_interaction_response(&response).await?;
        self.tools()
            .permissions()
            .record_decision(
                &state.context.user_id,
                &state.interaction_request.resource,
                response.confirmed,
            )
            .await?;
        self.store().remove_suspended_state(run_id).await?;

        let ctx = ExecutionContext::rehydrate(run_id, &state.context, wire.clone());
        let events = EventFactory::new(&ctx);
        let session_id = state.context.session_id;

        let mut run = self
            .store()
            .get_run(run_id)
            .await?
            .ok_or(CoreError::RunNotFound(run_id))?;
        run.transition(RunStatus::Running)
            .map_err(|e| CoreError::config(e.to_string()))?;
        self.store().save_run(&run).await?;
        info!(run_id = %run_id, confirmed = response.confirmed, "resuming suspended run");

        let steps = self
            .store()
            .list_steps(session_id, StepRange::all())
            .await?;
        let Some((_, pending)) = unresolved_tail(&steps) else {
            // Nothing pending; fall through to a plain completion
            let outcome = Ok(StepLoopOutcome {
                final_response: None,
                steps_executed: 0,
                budget_exhausted: false,
                last_sequence: run.end_sequence,
            });
            return self.finalize(outcome, run, &ctx, &events).await;
        };

        let outcome = self
            .continue_inner(&ctx, &events, &mut run, pending)
            .await;
        self.finalize(outcome, run, &ctx, &events).await
    }

    /// Execute the still-pending tool calls, persist their tool steps in
    /// declaration order, then re-drive the model loop over the full
    /// rebuilt context.
    async fn continue_inner(
        &self,
        ctx: &ExecutionContext,
        events: &EventFactory,
        run: &mut Run,
        pending: Vec<ToolCall>,
    ) -> Result<StepLoopOutcome> {
        let session_id = run.session_id;

        if !pending.is_empty() {
            let results = self.tools().execute_batch(&pending, ctx, events).await?;
            for result in &results {
                let sequence = self.store().next_sequence(session_id).await?;
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
                self.store().save_step(&tool_step).await?;
                run.observe_sequence(sequence);
                self.store().save_run(run).await?;
                events.step_completed(tool_step).await?;
            }
        }

        let history = self
            .store()
            .list_steps(session_id, StepRange::all())
            .await?;
        let messages = build_context(
            self.config().system_prompt.as_deref(),
            &history,
            &self.context_options(),
        )?;

        self.executor()
            .execute(messages, ctx, events, run, &self.step_config())
            .await
    }

    fn id_str(&self) -> String {
        self.config().id.clone()
    }
}

/// Find the trailing assistant step and its not-yet-answered tool calls.
/// Returns `None` when there is no assistant step or it requested no tools.
fn unresolved_tail(steps: &[Step]) -> Option<(Step, Vec<ToolCall>)> {
    let index = steps.iter().rposition(|s| s.role == StepRole::Assistant)?;
    let assistant = &steps[index];
    if !assistant.has_tool_calls() {
        return None;
    }
    let resolved: HashSet<&str> = steps[index + 1..]
        .iter()
        .filter(|s| s.role == StepRole::Tool)
        .filter_map(|s| s.tool_call_id.as_deref())
        .collect();
    let pending: Vec<ToolCall> = assistant
        .tool_calls()
        .iter()
        .filter(|tc| !resolved.contains(tc.id.as_str()))
        .cloned()
        .collect();
    Some((assistant.clone(), pending))
}

fn last_user_query(steps: &[Step]) -> String {
    steps
        .iter()
        .rev()
        .find(|s| s.role == StepRole::User)
        .and_then(|s| s.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_tail_reports_pending_calls() {
        let session = Uuid::now_v7();
        let run = Uuid::now_v7();
        let steps = vec![
            Step::user(session, run, "go").with_sequence(1),
            Step::assistant(
                session,
                run,
                "",
                vec![
                    ToolCall::new("t1", "echo", "{}"),
                    ToolCall::new("t2", "echo", "{}"),
                ],
            )
            .with_sequence(2),
            Step::tool(session, run, "t1", "echo", "done").with_sequence(3),
        ];
        let (assistant, pending) = unresolved_tail(&steps).unwrap();
        assert_eq!(assistant.sequence, 2);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, "t2");
    }

    #[test]
    fn fully_resolved_tail_has_no_pending() {
        let session = Uuid::now_v7();
        let run = Uuid::now_v7();
        let steps = vec![
            Step::assistant(session, run, "", vec![ToolCall::new("t1", "echo", "{}")])
                .with_sequence(1),
            Step::tool(session, run, "t1", "echo", "done").with_sequence(2),
        ];
        let (_, pending) = unresolved_tail(&steps).unwrap();
        assert!(pending.is_empty());
    }
}
