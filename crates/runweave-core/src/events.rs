// Event factory
//
// Bound to an execution context at construction; every emitted event is
// stamped with the run id, parent run id, depth, a fresh timestamp, and the
// next local sequence number, then written to the run's wire.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use runweave_contracts::{
    EventPayload, ExecutionSuspendedData, InteractionRequest, InteractionRequestData,
    RunCancelledData, RunCompletedData, RunFailedData, RunStartedData, Step, StepDelta, StepEvent,
    StepRole, StepStartedData, ToolCallCompletedData, ToolCallFailedData, ToolCallStartedData,
    UsageMetrics,
};

use crate::context::ExecutionContext;
use crate::error::{CoreError, Result};
use crate::wire::Wire;

/// Context-bound event constructor and emitter
#[derive(Debug, Clone)]
pub struct EventFactory {
    run_id: Uuid,
    parent_run_id: Option<Uuid>,
    depth: u32,
    wire: Wire,
    local_sequence: Arc<AtomicU64>,
}

impl EventFactory {
    pub fn new(ctx: &ExecutionContext) -> Self {
        Self {
            run_id: ctx.run_id,
            parent_run_id: ctx.parent_run_id,
            depth: ctx.depth,
            wire: ctx.wire.clone(),
            local_sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    fn envelope(&self, step_id: Option<Uuid>, payload: EventPayload) -> StepEvent {
        StepEvent {
            run_id: self.run_id,
            parent_run_id: self.parent_run_id,
            depth: self.depth,
            local_sequence: self.local_sequence.fetch_add(1, Ordering::SeqCst) + 1,
            ts: Utc::now(),
            step_id,
            branch_id: None,
            payload,
        }
    }

    async fn emit(&self, step_id: Option<Uuid>, payload: EventPayload) -> Result<()> {
        self.wire.write(self.envelope(step_id, payload)).await
    }

    pub async fn run_started(&self, query: impl Into<String>, session_id: Uuid) -> Result<()> {
        self.emit(
            None,
            EventPayload::RunStarted {
                data: RunStartedData {
                    query: query.into(),
                    session_id,
                },
            },
        )
        .await
    }

    pub async fn run_completed(
        &self,
        response: Option<String>,
        metrics: UsageMetrics,
    ) -> Result<()> {
        self.emit(
            None,
            EventPayload::RunCompleted {
                data: RunCompletedData { response, metrics },
            },
        )
        .await
    }

    pub async fn run_failed(&self, error: &CoreError) -> Result<()> {
        self.emit(
            None,
            EventPayload::RunFailed {
                data: RunFailedData {
                    error: error.to_string(),
                    is_fatal: error.is_fatal(),
                },
            },
        )
        .await
    }

    pub async fn run_cancelled(&self, reason: Option<String>) -> Result<()> {
        self.emit(
            None,
            EventPayload::RunCancelled {
                data: RunCancelledData { reason },
            },
        )
        .await
    }

    pub async fn step_started(&self, step_id: Uuid, sequence: u64, role: StepRole) -> Result<()> {
        self.emit(
            Some(step_id),
            EventPayload::StepStarted {
                data: StepStartedData { sequence, role },
            },
        )
        .await
    }

    pub async fn step_delta(&self, step_id: Uuid, delta: StepDelta) -> Result<()> {
        self.emit(Some(step_id), EventPayload::StepDelta { delta })
            .await
    }

    pub async fn step_completed(&self, snapshot: Step) -> Result<()> {
        self.emit(
            Some(snapshot.id),
            EventPayload::StepCompleted { snapshot },
        )
        .await
    }

    pub async fn tool_call_started(
        &self,
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        args: serde_json::Value,
    ) -> Result<()> {
        self.emit(
            None,
            EventPayload::ToolCallStarted {
                data: ToolCallStartedData {
                    tool_name: tool_name.into(),
                    tool_call_id: tool_call_id.into(),
                    args,
                },
            },
        )
        .await
    }

    pub async fn tool_call_completed(
        &self,
        tool_call_id: impl Into<String>,
        duration_ms: u64,
    ) -> Result<()> {
        self.emit(
            None,
            EventPayload::ToolCallCompleted {
                data: ToolCallCompletedData {
                    tool_call_id: tool_call_id.into(),
                    duration_ms,
                },
            },
        )
        .await
    }

    pub async fn tool_call_failed(
        &self,
        tool_call_id: impl Into<String>,
        error: impl Into<String>,
        retryable: bool,
    ) -> Result<()> {
        self.emit(
            None,
            EventPayload::ToolCallFailed {
                data: ToolCallFailedData {
                    tool_call_id: tool_call_id.into(),
                    error: error.into(),
                    retryable,
                },
            },
        )
        .await
    }

    pub async fn interaction_request(&self, request: &InteractionRequest) -> Result<()> {
        self.emit(
            None,
            EventPayload::InteractionRequested {
                data: InteractionRequestData {
                    interaction_request: request.clone(),
                },
            },
        )
        .await
    }

    pub async fn execution_suspended(&self, interaction_request_id: Uuid) -> Result<()> {
        self.emit(
            None,
            EventPayload::ExecutionSuspended {
                data: ExecutionSuspendedData {
                    interaction_request_id,
                },
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::wire;

    #[tokio::test]
    async fn events_are_stamped_and_sequenced() {
        let (w, reader) = wire(8);
        let ctx = ExecutionContext::root("u1", w.clone()).with_session(Uuid::now_v7());
        let factory = EventFactory::new(&ctx);

        factory.run_started("hello", ctx.session_id.unwrap()).await.unwrap();
        factory
            .run_completed(Some("done".into()), UsageMetrics::default())
            .await
            .unwrap();
        w.close();

        let events = reader.collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].run_id, ctx.run_id);
        assert_eq!(events[0].depth, 0);
        assert_eq!(events[0].local_sequence, 1);
        assert_eq!(events[1].local_sequence, 2);
        assert_eq!(events[0].kind(), "run_started");
        assert_eq!(events[1].kind(), "run_completed");
    }

    #[tokio::test]
    async fn nested_context_stamps_parent_and_depth() {
        let (pw, _pr) = wire(4);
        let parent = ExecutionContext::root("u1", pw).with_session(Uuid::now_v7());
        let (cw, reader) = wire(4);
        let child = parent.child("sub", cw.clone());
        let factory = EventFactory::new(&child);

        factory.run_cancelled(None).await.unwrap();
        cw.close();

        let events = reader.collect().await;
        assert_eq!(events[0].parent_run_id, Some(parent.run_id));
        assert_eq!(events[0].depth, 1);
    }
}
