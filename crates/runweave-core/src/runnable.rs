// Runnable contract
//
// The minimal interface shared by agents and workflows, which is what makes
// them mutually embeddable: a workflow stage can hold an agent, an agent
// tool can wrap a workflow, and neither side knows the difference.

use async_trait::async_trait;
use uuid::Uuid;

use runweave_contracts::RunStatus;

use crate::context::ExecutionContext;
use crate::error::Result;

/// Outcome of one runnable invocation
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: Uuid,
    pub session_id: Uuid,
    pub response: Option<String>,
    pub status: RunStatus,
    pub error: Option<String>,
}

/// Anything that can be invoked with an input string under an execution
/// context. Implementations emit events on `ctx.wire`, honor `ctx.abort`,
/// and refuse to start past the configured depth ceiling.
#[async_trait]
pub trait Runnable: Send + Sync {
    /// Unique identifier, referenced from configuration and events
    fn id(&self) -> &str;

    async fn run(&self, input: &str, ctx: ExecutionContext) -> Result<RunOutput>;
}
