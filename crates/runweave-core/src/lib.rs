// Execution core
//
// This crate contains the run-time machinery shared by agents and workflows:
// - The event wire and the context-bound event factory
// - The streaming step executor and its tool-call accumulator
// - The tool executor with permission checks and a pure-result cache
// - The LLM driver contract and a scripted driver for tests
// - Store contracts (session, trace, permission)
// - The runnable contract both agents and workflows implement
//
// Concrete provider transports and storage backends live outside the core;
// they plug in through the traits defined here.

pub mod abort;
pub mod accumulator;
pub mod builtins;
pub mod cache;
pub mod context;
pub mod context_builder;
pub mod error;
pub mod events;
pub mod llm;
pub mod permission;
pub mod runnable;
pub mod scripted;
pub mod step_executor;
pub mod tool;
pub mod tool_executor;
pub mod traits;
pub mod wire;

pub use abort::AbortSignal;
pub use accumulator::ToolCallAccumulator;
pub use cache::ToolResultCache;
pub use context::ExecutionContext;
pub use context_builder::{build_context, step_to_llm_message, ContextBuildOptions};
pub use error::{CoreError, Result};
pub use events::EventFactory;
pub use llm::{ChunkStream, LlmCallConfig, LlmDriver, LlmMessage, LlmRole, ToolSpec};
pub use permission::{PermissionDecision, PermissionManager, PermissionRules};
pub use runnable::{RunOutput, Runnable};
pub use scripted::{ScriptedDriver, ScriptedResponse};
pub use step_executor::{StepExecutor, StepExecutorConfig, StepLoopOutcome};
pub use tool::{Tool, ToolOutput};
pub use tool_executor::{DefaultClassifier, ErrorClassifier, ToolExecutor, ToolExecutorConfig};
pub use traits::{
    LlmCallTrace, PermissionStore, RunTrace, SessionStore, StepRange, TraceStore,
};
pub use wire::{wire, Wire, WireReader};

// Re-export the shared contracts for downstream convenience
pub use runweave_contracts as contracts;
