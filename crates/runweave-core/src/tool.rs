// Tool contract
//
// Tools are registered by name and invoked by the tool executor. A tool
// declares its parameter schema, whether it is pure (cacheable), and its
// default admission policy. Execution receives the parsed arguments and the
// run's context so cooperative abort works inside long calls.

use async_trait::async_trait;
use serde_json::Value;

use runweave_contracts::ToolPolicy;

use crate::context::ExecutionContext;
use crate::error::Result;
use crate::llm::ToolSpec;

/// What a tool produced: a model-visible text surface and an optional
/// display-only one.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: String,
    pub content_for_user: Option<String>,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            content_for_user: None,
        }
    }

    pub fn with_user_surface(mut self, content: impl Into<String>) -> Self {
        self.content_for_user = Some(content.into());
        self
    }
}

/// Trait implemented by every registered tool
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by
    fn name(&self) -> &str;

    /// Description surfaced to the model
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters
    fn parameters(&self) -> Value;

    /// Pure tools are deterministic over their arguments; their results may
    /// be served from the executor's cache.
    fn is_pure(&self) -> bool {
        false
    }

    /// Admission when no explicit permission rule matches
    fn default_policy(&self) -> ToolPolicy {
        ToolPolicy::RequiresConsent
    }

    /// Execute with parsed arguments. Long-running tools should watch
    /// `ctx.abort` and return early when it fires.
    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<ToolOutput>;

    /// Tool surface advertised to the model
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}
