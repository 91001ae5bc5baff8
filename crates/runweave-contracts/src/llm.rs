// Chunk interface for model streams
//
// The core never talks to a concrete provider transport; drivers satisfy a
// stream-of-chunks contract. A chunk may carry any combination of content
// delta, reasoning delta, tool-call fragments, and usage.

use serde::{Deserialize, Serialize};

use crate::events::ToolCallFragment;

/// Token counts reported by the provider, usually on the final chunk
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// One streamed chunk from a model call
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// Incremental response text
    pub content_delta: Option<String>,

    /// Incremental reasoning text
    pub reasoning_delta: Option<String>,

    /// Sparse tool-call fragments, keyed by index
    pub tool_call_fragments: Vec<ToolCallFragment>,

    /// Usage totals, when the provider reports them
    pub usage: Option<Usage>,
}

impl StreamChunk {
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            content_delta: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn reasoning(delta: impl Into<String>) -> Self {
        Self {
            reasoning_delta: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn tool_fragment(fragment: ToolCallFragment) -> Self {
        Self {
            tool_call_fragments: vec![fragment],
            ..Default::default()
        }
    }

    pub fn usage(usage: Usage) -> Self {
        Self {
            usage: Some(usage),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content_delta.is_none()
            && self.reasoning_delta.is_none()
            && self.tool_call_fragments.is_empty()
            && self.usage.is_none()
    }
}
