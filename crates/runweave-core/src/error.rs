// Error types for the execution core

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use runweave_contracts::SuspendSignal;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur while executing a run
#[derive(Debug, Error)]
pub enum CoreError {
    /// Model transport or provider error
    #[error("model error: {message}")]
    Model { message: String, retryable: bool },

    /// Tool execution error surfaced outside a tool result
    #[error("tool error: {0}")]
    Tool(String),

    /// Store operation failed
    #[error("store error: {0}")]
    Store(String),

    /// Event written after the wire was closed, or the reader went away
    #[error("wire closed")]
    WireClosed,

    /// Invalid runner or executor configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A step with this sequence already exists (concurrent misuse)
    #[error("duplicate sequence {sequence} in session {session_id}")]
    DuplicateSequence { session_id: Uuid, sequence: u64 },

    /// Assistant step finished with a tool call that has no tool step
    #[error("unresolved tool call {tool_call_id} in step {step_id}")]
    MissingToolResult { step_id: Uuid, tool_call_id: String },

    /// Step list cannot be projected into a valid message sequence
    #[error("context projection error: {0}")]
    Projection(String),

    /// Nesting depth ceiling reached
    #[error("maximum nesting depth {0} exceeded")]
    DepthExceeded(u32),

    /// Run timed out
    #[error("run timed out after {0:?}")]
    Timeout(Duration),

    /// Abort signal honored
    #[error("run cancelled")]
    Cancelled,

    /// Consent required: not an error, a control-flow signal that unwinds
    /// the step loop to the runner
    #[error("execution suspended pending user interaction")]
    Suspended(Box<SuspendSignal>),

    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("run not found: {0}")]
    RunNotFound(Uuid),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    /// Create a model error
    pub fn model(message: impl Into<String>, retryable: bool) -> Self {
        CoreError::Model {
            message: message.into(),
            retryable,
        }
    }

    /// Create a tool error
    pub fn tool(message: impl Into<String>) -> Self {
        CoreError::Tool(message.into())
    }

    /// Create a store error
    pub fn store(message: impl Into<String>) -> Self {
        CoreError::Store(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        CoreError::Configuration(message.into())
    }

    /// Whether retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Model { retryable: true, .. })
    }

    /// Whether the error ends the run (suspension does not)
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CoreError::Suspended(_)) && !self.is_retryable()
    }
}
