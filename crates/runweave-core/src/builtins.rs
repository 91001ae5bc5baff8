// Builtin tool library
//
// Small set of tools used by examples, tests, and config-driven assembly.
// Each declares its own purity and admission policy; the factory resolves
// a builtin by the name used in tool component specs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use runweave_contracts::ToolPolicy;

use crate::context::ExecutionContext;
use crate::error::{CoreError, Result};
use crate::tool::{Tool, ToolOutput};

/// Resolve a builtin tool by its factory name
pub fn builtin_tool(name: &str) -> Option<Arc<dyn Tool>> {
    match name {
        "echo" => Some(Arc::new(EchoTool)),
        "current_time" => Some(Arc::new(CurrentTimeTool)),
        "add" => Some(Arc::new(AddTool)),
        _ => None,
    }
}

// ============================================================================
// Tool: echo
// ============================================================================

/// Returns its `text` argument unchanged
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echo the given text back unchanged."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to echo"
                }
            },
            "required": ["text"]
        })
    }

    fn is_pure(&self) -> bool {
        true
    }

    fn default_policy(&self) -> ToolPolicy {
        ToolPolicy::Allow
    }

    async fn execute(&self, args: Value, _ctx: &ExecutionContext) -> Result<ToolOutput> {
        let text = args
            .get("text")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::tool("echo requires a 'text' string argument"))?;
        Ok(ToolOutput::text(text))
    }
}

// ============================================================================
// Tool: current_time
// ============================================================================

/// Returns the current UTC date and time
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Get the current date and time in UTC, RFC 3339 formatted."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    fn default_policy(&self) -> ToolPolicy {
        ToolPolicy::Allow
    }

    async fn execute(&self, _args: Value, _ctx: &ExecutionContext) -> Result<ToolOutput> {
        Ok(ToolOutput::text(Utc::now().to_rfc3339()))
    }
}

// ============================================================================
// Tool: add
// ============================================================================

/// Adds two numbers
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Add two numbers together and return the result."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {
                    "type": "number",
                    "description": "The first number"
                },
                "b": {
                    "type": "number",
                    "description": "The second number"
                }
            },
            "required": ["a", "b"]
        })
    }

    fn is_pure(&self) -> bool {
        true
    }

    fn default_policy(&self) -> ToolPolicy {
        ToolPolicy::Allow
    }

    async fn execute(&self, args: Value, _ctx: &ExecutionContext) -> Result<ToolOutput> {
        let a = args
            .get("a")
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::tool("add requires a numeric 'a' argument"))?;
        let b = args
            .get("b")
            .and_then(Value::as_f64)
            .ok_or_else(|| CoreError::tool("add requires a numeric 'b' argument"))?;
        Ok(ToolOutput::text(format!("{}", a + b)))
    }
}
