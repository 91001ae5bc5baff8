// Event wire format
//
// Every event shares a common header (type, run_id, parent_run_id, depth,
// timestamp, step_id) and a kind-specific payload. Events are totally
// ordered per run; across parallel branches only per-branch order holds,
// and forwarded branch events carry a branch id for multiplexing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interaction::InteractionRequest;
use crate::step::{Step, StepRole, UsageMetrics};

// ============================================================================
// Event envelope
// ============================================================================

/// A typed record describing a point in a run's timeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub run_id: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,

    /// Nesting depth of the emitting run (root = 0)
    pub depth: u32,

    /// Position within the run's event stream
    pub local_sequence: u64,

    pub ts: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<Uuid>,

    /// Branch id stamped by a parallel workflow forwarder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,

    #[serde(flatten)]
    pub payload: EventPayload,
}

impl StepEvent {
    /// Event type in wire notation, e.g. "step_delta"
    pub fn kind(&self) -> &'static str {
        self.payload.kind()
    }
}

// ============================================================================
// Payloads
// ============================================================================

/// Kind-specific event payload. The serialized form nests fields under
/// `data`, `delta`, or `snapshot` depending on the kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    RunStarted { data: RunStartedData },
    RunCompleted { data: RunCompletedData },
    RunFailed { data: RunFailedData },
    RunCancelled { data: RunCancelledData },
    StepStarted { data: StepStartedData },
    StepDelta { delta: StepDelta },
    StepCompleted { snapshot: Step },
    ToolCallStarted { data: ToolCallStartedData },
    ToolCallCompleted { data: ToolCallCompletedData },
    ToolCallFailed { data: ToolCallFailedData },
    #[serde(rename = "interaction_request")]
    InteractionRequested { data: InteractionRequestData },
    ExecutionSuspended { data: ExecutionSuspendedData },
}

impl EventPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::RunStarted { .. } => "run_started",
            EventPayload::RunCompleted { .. } => "run_completed",
            EventPayload::RunFailed { .. } => "run_failed",
            EventPayload::RunCancelled { .. } => "run_cancelled",
            EventPayload::StepStarted { .. } => "step_started",
            EventPayload::StepDelta { .. } => "step_delta",
            EventPayload::StepCompleted { .. } => "step_completed",
            EventPayload::ToolCallStarted { .. } => "tool_call_started",
            EventPayload::ToolCallCompleted { .. } => "tool_call_completed",
            EventPayload::ToolCallFailed { .. } => "tool_call_failed",
            EventPayload::InteractionRequested { .. } => "interaction_request",
            EventPayload::ExecutionSuspended { .. } => "execution_suspended",
        }
    }
}

/// Data for run_started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStartedData {
    pub query: String,
    pub session_id: Uuid,
}

/// Data for run_completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCompletedData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    pub metrics: UsageMetrics,
}

/// Data for run_failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailedData {
    pub error: String,
    pub is_fatal: bool,
}

/// Data for run_cancelled
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCancelledData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Data for step_started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStartedData {
    pub sequence: u64,
    pub role: StepRole,
}

/// Incremental content for step_delta. At least one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallFragment>>,
}

impl StepDelta {
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            content: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(delta: impl Into<String>) -> Self {
        Self {
            reasoning_content: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: Some(vec![fragment]),
            ..Default::default()
        }
    }
}

/// A sparse streamed fragment of a tool call, keyed by `index`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub function: ToolCallFragmentFunction,
}

/// Function part of a streamed tool-call fragment
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFragmentFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// String-append stream of JSON argument text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallFragment {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            id: None,
            function: ToolCallFragmentFunction::default(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.function.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.function.arguments = Some(arguments.into());
        self
    }
}

/// Data for tool_call_started
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallStartedData {
    pub tool_name: String,
    pub tool_call_id: String,
    pub args: serde_json::Value,
}

/// Data for tool_call_completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallCompletedData {
    pub tool_call_id: String,
    pub duration_ms: u64,
}

/// Data for tool_call_failed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallFailedData {
    pub tool_call_id: String,
    pub error: String,
    pub retryable: bool,
}

/// Data for interaction_request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequestData {
    pub interaction_request: InteractionRequest,
}

/// Data for execution_suspended
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSuspendedData {
    pub interaction_request_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(payload: EventPayload) -> StepEvent {
        StepEvent {
            run_id: Uuid::now_v7(),
            parent_run_id: None,
            depth: 0,
            local_sequence: 1,
            ts: Utc::now(),
            step_id: None,
            branch_id: None,
            payload,
        }
    }

    #[test]
    fn run_started_serializes_with_tag_and_data() {
        let event = header(EventPayload::RunStarted {
            data: RunStartedData {
                query: "hello".to_string(),
                session_id: Uuid::now_v7(),
            },
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "run_started");
        assert_eq!(json["data"]["query"], "hello");
        assert!(json.get("parent_run_id").is_none());
    }

    #[test]
    fn interaction_request_uses_wire_name() {
        let event = header(EventPayload::InteractionRequested {
            data: InteractionRequestData {
                interaction_request: InteractionRequest::confirm("run_cmd(ls)", "call_1"),
            },
        });
        assert_eq!(event.kind(), "interaction_request");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "interaction_request");
    }

    #[test]
    fn step_delta_roundtrips_fragments() {
        let fragment = ToolCallFragment::new(0)
            .with_id("call_1")
            .with_name("echo")
            .with_arguments("{\"text\":");
        let event = header(EventPayload::StepDelta {
            delta: StepDelta::tool_call(fragment.clone()),
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: StepEvent = serde_json::from_str(&json).unwrap();
        match back.payload {
            EventPayload::StepDelta { delta } => {
                assert_eq!(delta.tool_calls.unwrap()[0], fragment);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }
}
