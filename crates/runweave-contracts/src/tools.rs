// Tool call and tool result shapes
//
// A ToolCall is what the model requested; a ToolResult is what execution
// produced. Results carry two text surfaces: `content` is fed back to the
// model, `content_for_user` is display-only.

use serde::{Deserialize, Serialize};

/// How a tool's calls are admitted when no explicit permission rule matches
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToolPolicy {
    /// Ask the user before executing (HITL consent path)
    #[default]
    RequiresConsent,
    /// Execute without consent; explicit deny rules still apply
    Allow,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments, exactly as streamed by the provider
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the raw arguments into a JSON value
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::json!({}));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// Failure classification for tool results
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    /// No tool registered under the requested name
    UnknownTool,
    /// Arguments were not valid JSON or failed validation
    BadArguments,
    /// An explicit permission rule denied the call
    Denied,
    /// The abort signal fired during the call
    Aborted,
    /// The tool raised; retryable per the classifier
    Retryable,
    /// The tool raised; not retryable
    Failed,
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolErrorKind::UnknownTool => "unknown tool",
            ToolErrorKind::BadArguments => "bad arguments",
            ToolErrorKind::Denied => "denied",
            ToolErrorKind::Aborted => "aborted",
            ToolErrorKind::Retryable => "retryable failure",
            ToolErrorKind::Failed => "failure",
        };
        write!(f, "{s}")
    }
}

/// Outcome of executing one tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,

    /// Model-visible result text (or a human-readable error description)
    pub content: String,

    /// Display-only variant, never fed back to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_for_user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolErrorKind>,

    /// Whether the result came from the pure-result cache
    #[serde(default)]
    pub from_cache: bool,

    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            content_for_user: None,
            error: None,
            from_cache: false,
            duration_ms: 0,
        }
    }

    pub fn failure(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        kind: ToolErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            content: format!("Tool error ({kind}): {}", message.into()),
            content_for_user: None,
            error: Some(kind),
            from_cache: false,
            duration_ms: 0,
        }
    }

    pub fn with_content_for_user(mut self, content: impl Into<String>) -> Self {
        self.content_for_user = Some(content.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn cached(mut self) -> Self {
        self.from_cache = true;
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_retryable(&self) -> bool {
        self.error == Some(ToolErrorKind::Retryable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_arguments_as_object() {
        let call = ToolCall::new("t1", "echo", "");
        assert_eq!(call.parse_arguments().unwrap(), serde_json::json!({}));
    }

    #[test]
    fn failure_content_is_model_readable() {
        let result = ToolResult::failure("t1", "echo", ToolErrorKind::BadArguments, "not json");
        assert!(result.is_error());
        assert!(result.content.contains("bad arguments"));
        assert!(result.content.contains("not json"));
    }

    #[test]
    fn tool_policy_defaults_to_consent() {
        assert_eq!(ToolPolicy::default(), ToolPolicy::RequiresConsent);
    }
}
