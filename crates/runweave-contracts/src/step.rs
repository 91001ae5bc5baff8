// Step entity
//
// A step is one immutable turn in a session: user message, assistant message
// (optionally carrying tool calls), or a tool result. Sequences are assigned
// at persist time and are strictly increasing per session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tools::ToolCall;

/// Role of a step within the conversation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for StepRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepRole::System => "system",
            StepRole::User => "user",
            StepRole::Assistant => "assistant",
            StepRole::Tool => "tool",
        };
        write!(f, "{s}")
    }
}

/// Token and duration accounting, used for both steps and aggregated runs
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ms: u64,
}

impl UsageMetrics {
    pub fn accumulate(&mut self, other: &UsageMetrics) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.duration_ms += other.duration_ms;
    }

    pub fn add_usage(&mut self, usage: &crate::llm::Usage) {
        self.input_tokens += usage.input_tokens;
        self.output_tokens += usage.output_tokens;
    }

    pub fn total_tokens(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// One immutable turn in a session.
///
/// `content` is the model-visible text; `content_for_user` is a display-only
/// variant that is never projected back into any model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: Uuid,
    pub session_id: Uuid,
    pub run_id: Uuid,

    /// Per-session monotone sequence, assigned at persist time
    pub sequence: u64,

    pub role: StepRole,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Display-only text surface, never fed back to the model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_for_user: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    /// Set when role is `tool`: the assistant tool call this step answers
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Set when role is `tool`: the tool's name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Set when role is `assistant` and tools were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    pub metrics: UsageMetrics,

    pub created_at: DateTime<Utc>,
}

impl Step {
    fn base(session_id: Uuid, run_id: Uuid, role: StepRole) -> Self {
        Self {
            id: Uuid::now_v7(),
            session_id,
            run_id,
            sequence: 0,
            role,
            content: None,
            content_for_user: None,
            reasoning_content: None,
            tool_call_id: None,
            name: None,
            tool_calls: None,
            metrics: UsageMetrics::default(),
            created_at: Utc::now(),
        }
    }

    /// Create a user step
    pub fn user(session_id: Uuid, run_id: Uuid, content: impl Into<String>) -> Self {
        let mut step = Self::base(session_id, run_id, StepRole::User);
        step.content = Some(content.into());
        step
    }

    /// Create an assistant step; `tool_calls` may be empty
    pub fn assistant(
        session_id: Uuid,
        run_id: Uuid,
        content: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let mut step = Self::base(session_id, run_id, StepRole::Assistant);
        let content = content.into();
        if !content.is_empty() {
            step.content = Some(content);
        }
        if !tool_calls.is_empty() {
            step.tool_calls = Some(tool_calls);
        }
        step
    }

    /// Create a tool result step answering `tool_call_id`
    pub fn tool(
        session_id: Uuid,
        run_id: Uuid,
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut step = Self::base(session_id, run_id, StepRole::Tool);
        step.tool_call_id = Some(tool_call_id.into());
        step.name = Some(name.into());
        step.content = Some(content.into());
        step
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        let reasoning = reasoning.into();
        if !reasoning.is_empty() {
            self.reasoning_content = Some(reasoning);
        }
        self
    }

    pub fn with_content_for_user(mut self, content: impl Into<String>) -> Self {
        self.content_for_user = Some(content.into());
        self
    }

    pub fn with_metrics(mut self, metrics: UsageMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Tool calls requested by this step, empty for non-assistant steps
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }
}
