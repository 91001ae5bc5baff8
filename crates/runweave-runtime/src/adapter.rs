// Runnable-as-tool adapter
//
// Wraps any runnable as a tool with a single `input` parameter, so agents
// can invoke nested agents or workflows. The child runs on its own wire; a
// forwarder re-emits its events on the parent wire, and the child context
// carries the parent run id and depth + 1, so every nested event lands
// correctly stamped in the parent's stream.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use runweave_contracts::{RunStatus, ToolPolicy};
use runweave_core::{
    wire, CoreError, ExecutionContext, Result, Runnable, Tool, ToolOutput,
};

use crate::forwarder::forward_events;

/// Default child wire buffer for nested runs
const CHILD_WIRE_CAPACITY: usize = 256;

/// Exposes a runnable as a tool
pub struct RunnableTool {
    runnable: Arc<dyn Runnable>,
    name: String,
    description: String,
}

impl RunnableTool {
    pub fn new(
        runnable: Arc<dyn Runnable>,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            runnable,
            name: name.into(),
            description: description.into(),
        }
    }

    /// Wrap with a derived name: `run_<runnable id>`
    pub fn wrap(runnable: Arc<dyn Runnable>) -> Self {
        let name = format!("run_{}", runnable.id());
        let description = format!(
            "Delegate a task to '{}' and return its final response.",
            runnable.id()
        );
        Self::new(runnable, name, description)
    }
}

#[async_trait]
impl Tool for RunnableTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "input": {
                    "type": "string",
                    "description": "The task or question to hand to the nested runnable"
                }
            },
            "required": ["input"]
        })
    }

    fn default_policy(&self) -> ToolPolicy {
        ToolPolicy::Allow
    }

    async fn execute(&self, args: Value, ctx: &ExecutionContext) -> Result<ToolOutput> {
        let input = args
            .get("input")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::tool("nested runnable requires an 'input' string"))?;

        let (child_wire, child_reader) = wire(CHILD_WIRE_CAPACITY);
        let child_ctx = ctx.child(self.runnable.id(), child_wire);
        let forwarder = forward_events(child_reader, ctx.wire.clone(), None);

        let output = self.runnable.run(input, child_ctx).await;

        // The child closed its wire on every exit path; drain the forwarder
        // before surfacing the result so parent ordering holds.
        let _ = forwarder.await;
        let output = output?;

        match output.status {
            RunStatus::Completed => {
                let response = output.response.unwrap_or_default();
                Ok(ToolOutput::text(response))
            }
            status => Err(CoreError::tool(format!(
                "nested runnable '{}' ended with status {status}{}",
                self.runnable.id(),
                output
                    .error
                    .map(|e| format!(": {e}"))
                    .unwrap_or_default()
            ))),
        }
    }
}
