// Shared contracts for the runweave orchestration core
//
// This crate defines the serializable types shared by every layer:
// - Session / Run / Step entities and their metrics
// - The typed event wire format
// - Tool call / tool result shapes
// - The LLM chunk interface providers must satisfy
// - Interaction (human-in-the-loop) records

pub mod events;
pub mod interaction;
pub mod llm;
pub mod session;
pub mod step;
pub mod tools;

pub use events::{
    EventPayload, ExecutionSuspendedData, InteractionRequestData, RunCancelledData,
    RunCompletedData, RunFailedData, RunStartedData, StepDelta, StepEvent, StepStartedData,
    ToolCallCompletedData, ToolCallFailedData, ToolCallFragment, ToolCallFragmentFunction,
    ToolCallStartedData,
};
pub use interaction::{
    InteractionKind, InteractionRequest, InteractionResponse, SerializedContext, SuspendSignal,
    SuspendedState,
};
pub use llm::{StreamChunk, Usage};
pub use session::{Run, RunStatus, Session, StatusTransitionError};
pub use step::{Step, StepRole, UsageMetrics};
pub use tools::{ToolCall, ToolErrorKind, ToolPolicy, ToolResult};
