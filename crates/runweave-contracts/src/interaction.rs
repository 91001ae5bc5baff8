// Human-in-the-loop interaction records
//
// When a tool call needs consent, execution unwinds to the runner with a
// SuspendSignal, the runner persists a SuspendedState, and a later
// InteractionResponse resumes from the pending tool call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolCall;

/// What the user is being asked for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// Yes/no consent for a resource
    Confirm,
}

/// A request for user input raised during execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionRequest {
    pub id: Uuid,
    pub kind: InteractionKind,

    /// Resource the request concerns, e.g. `run_cmd(ls)`
    pub resource: String,

    /// Tool call id the request blocks
    pub tool_call_id: String,

    pub created_at: DateTime<Utc>,
}

impl InteractionRequest {
    pub fn confirm(resource: impl Into<String>, tool_call_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind: InteractionKind::Confirm,
            resource: resource.into(),
            tool_call_id: tool_call_id.into(),
            created_at: Utc::now(),
        }
    }
}

/// The user's answer to an interaction request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionResponse {
    pub request_id: Uuid,
    pub kind: InteractionKind,
    pub confirmed: bool,
    pub responded_at: DateTime<Utc>,
}

impl InteractionResponse {
    pub fn confirm(request_id: Uuid, confirmed: bool) -> Self {
        Self {
            request_id,
            kind: InteractionKind::Confirm,
            confirmed,
            responded_at: Utc::now(),
        }
    }
}

/// Serializable projection of an execution context, enough to rehydrate a
/// suspended run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedContext {
    pub session_id: Uuid,
    pub user_id: String,
    pub depth: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested_runnable_id: Option<String>,
}

/// Typed control-flow signal that unwinds the step loop to the runner when
/// consent is required. Not an error: the runner persists it and ends the
/// run in suspended status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendSignal {
    pub interaction_request: InteractionRequest,
    pub pending_tool_call: ToolCall,
    pub context: SerializedContext,
}

/// Durable record of a suspended run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspendedState {
    pub run_id: Uuid,
    pub interaction_request: InteractionRequest,
    pub pending_tool_call: ToolCall,
    pub context: SerializedContext,
    pub suspended_at: DateTime<Utc>,
}

impl SuspendedState {
    pub fn from_signal(run_id: Uuid, signal: SuspendSignal) -> Self {
        Self {
            run_id,
            interaction_request: signal.interaction_request,
            pending_tool_call: signal.pending_tool_call,
            context: signal.context,
            suspended_at: Utc::now(),
        }
    }
}
