// Scripted LLM driver
//
// A deterministic driver for tests, demos, and config-driven assembly
// without a live provider. It streams its responses as chunked deltas so
// the step executor exercises the same accumulation paths a real transport
// drives: split argument fragments, late usage, optional duplicated
// terminal snapshots.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use runweave_contracts::{StreamChunk, ToolCall, ToolCallFragment, Usage};

use crate::error::Result;
use crate::llm::{ChunkStream, LlmCallConfig, LlmDriver, LlmMessage, LlmRole};

/// One scripted model turn
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Fixed response text
    Text(String),
    /// Echo the last user message
    Echo,
    /// Reasoning followed by response text
    Reasoned { reasoning: String, text: String },
    /// Request tool calls, optionally with leading text
    ToolCalls {
        text: String,
        tool_calls: Vec<ToolCall>,
    },
}

impl ScriptedResponse {
    pub fn text(text: impl Into<String>) -> Self {
        ScriptedResponse::Text(text.into())
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        ScriptedResponse::ToolCalls {
            text: String::new(),
            tool_calls,
        }
    }
}

/// Deterministic scripted driver. Each call consumes the next response in
/// the script; an exhausted script yields empty assistant turns.
pub struct ScriptedDriver {
    script: Vec<ScriptedResponse>,
    cursor: AtomicUsize,
    /// Character count per streamed content chunk
    chunk_chars: usize,
    /// Resend completed tool calls as terminal snapshots (provider quirk)
    duplicate_tool_snapshots: bool,
}

impl ScriptedDriver {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script,
            cursor: AtomicUsize::new(0),
            chunk_chars: 8,
            duplicate_tool_snapshots: false,
        }
    }

    /// Driver that always answers with the same text
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::new(vec![ScriptedResponse::Text(text.into())])
    }

    /// Driver that echoes the last user message
    pub fn echo() -> Self {
        Self::new(vec![ScriptedResponse::Echo])
    }

    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    pub fn with_duplicate_tool_snapshots(mut self) -> Self {
        self.duplicate_tool_snapshots = true;
        self
    }

    fn next_response(&self) -> ScriptedResponse {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        if self.script.is_empty() {
            return ScriptedResponse::Text(String::new());
        }
        if index < self.script.len() {
            self.script[index].clone()
        } else if self.script.len() == 1 {
            // Single-entry scripts repeat, matching a fixed-response driver
            self.script[0].clone()
        } else {
            ScriptedResponse::Text(String::new())
        }
    }

    fn estimate_tokens(chars: usize) -> u32 {
        (chars as u32 / 4).max(1)
    }

    fn text_chunks(&self, text: &str, chunks: &mut Vec<StreamChunk>) {
        let chars: Vec<char> = text.chars().collect();
        for piece in chars.chunks(self.chunk_chars) {
            chunks.push(StreamChunk::content(piece.iter().collect::<String>()));
        }
    }

    fn tool_call_chunks(&self, tool_calls: &[ToolCall], chunks: &mut Vec<StreamChunk>) {
        for (index, call) in tool_calls.iter().enumerate() {
            let mid = call.arguments.len() / 2;
            // Arguments are ASCII JSON in scripts; split on a char boundary
            let mid = (0..=mid)
                .rev()
                .find(|i| call.arguments.is_char_boundary(*i))
                .unwrap_or(0);
            let (head, tail) = call.arguments.split_at(mid);

            chunks.push(StreamChunk::tool_fragment(
                ToolCallFragment::new(index)
                    .with_id(&call.id)
                    .with_name(&call.name)
                    .with_arguments(head),
            ));
            if !tail.is_empty() {
                chunks.push(StreamChunk::tool_fragment(
                    ToolCallFragment::new(index).with_arguments(tail),
                ));
            }
            if self.duplicate_tool_snapshots {
                chunks.push(StreamChunk::tool_fragment(
                    ToolCallFragment::new(index)
                        .with_id(&call.id)
                        .with_name(&call.name)
                        .with_arguments(&call.arguments),
                ));
            }
        }
    }
}

#[async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream_chat(
        &self,
        messages: Vec<LlmMessage>,
        _config: &LlmCallConfig,
    ) -> Result<ChunkStream> {
        let response = self.next_response();

        let input_text: usize = messages.iter().map(|m| m.content.len()).sum();
        let mut chunks = Vec::new();
        let mut output_text = String::new();

        match response {
            ScriptedResponse::Text(text) => {
                self.text_chunks(&text, &mut chunks);
                output_text = text;
            }
            ScriptedResponse::Echo => {
                let text = messages
                    .iter()
                    .rev()
                    .find(|m| m.role == LlmRole::User)
                    .map(|m| m.content.clone())
                    .unwrap_or_default();
                self.text_chunks(&text, &mut chunks);
                output_text = text;
            }
            ScriptedResponse::Reasoned { reasoning, text } => {
                chunks.push(StreamChunk::reasoning(reasoning));
                self.text_chunks(&text, &mut chunks);
                output_text = text;
            }
            ScriptedResponse::ToolCalls { text, tool_calls } => {
                self.text_chunks(&text, &mut chunks);
                self.tool_call_chunks(&tool_calls, &mut chunks);
                output_text = text;
            }
        }

        chunks.push(StreamChunk::usage(Usage {
            input_tokens: Self::estimate_tokens(input_text),
            output_tokens: Self::estimate_tokens(output_text.len()),
        }));

        Ok(Box::pin(stream::iter(chunks.into_iter().map(Ok))))
    }
}

impl std::fmt::Debug for ScriptedDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedDriver")
            .field("script_len", &self.script.len())
            .field("cursor", &self.cursor.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn config() -> LlmCallConfig {
        LlmCallConfig::new("scripted")
    }

    async fn drain(mut stream: ChunkStream) -> Vec<StreamChunk> {
        let mut chunks = Vec::new();
        while let Some(chunk) = stream.next().await {
            chunks.push(chunk.unwrap());
        }
        chunks
    }

    #[tokio::test]
    async fn fixed_response_streams_in_chunks() {
        let driver = ScriptedDriver::fixed("hello world, this is long").with_chunk_chars(5);
        let stream = driver
            .stream_chat(vec![LlmMessage::user("hi")], &config())
            .await
            .unwrap();
        let chunks = drain(stream).await;

        let text: String = chunks
            .iter()
            .filter_map(|c| c.content_delta.clone())
            .collect();
        assert_eq!(text, "hello world, this is long");
        assert!(chunks.last().unwrap().usage.is_some());
    }

    #[tokio::test]
    async fn echo_returns_last_user_message() {
        let driver = ScriptedDriver::echo();
        let stream = driver
            .stream_chat(
                vec![LlmMessage::user("first"), LlmMessage::user("second")],
                &config(),
            )
            .await
            .unwrap();
        let chunks = drain(stream).await;
        let text: String = chunks
            .iter()
            .filter_map(|c| c.content_delta.clone())
            .collect();
        assert_eq!(text, "second");
    }

    #[tokio::test]
    async fn tool_calls_stream_as_split_fragments() {
        let call = ToolCall::new("t1", "echo", "{\"text\":\"hi\"}");
        let driver = ScriptedDriver::new(vec![ScriptedResponse::tool_calls(vec![call])]);
        let stream = driver
            .stream_chat(vec![LlmMessage::user("go")], &config())
            .await
            .unwrap();
        let chunks = drain(stream).await;

        let fragments: Vec<_> = chunks
            .iter()
            .flat_map(|c| c.tool_call_fragments.clone())
            .collect();
        assert!(fragments.len() >= 2);
        assert_eq!(fragments[0].id.as_deref(), Some("t1"));
        let rebuilt: String = fragments
            .iter()
            .filter_map(|f| f.function.arguments.clone())
            .collect();
        assert_eq!(rebuilt, "{\"text\":\"hi\"}");
    }

    #[tokio::test]
    async fn multi_entry_script_exhausts_to_empty() {
        let driver = ScriptedDriver::new(vec![
            ScriptedResponse::text("one"),
            ScriptedResponse::text("two"),
        ]);
        for expected in ["one", "two", ""] {
            let stream = driver
                .stream_chat(vec![LlmMessage::user("x")], &config())
                .await
                .unwrap();
            let text: String = drain(stream)
                .await
                .iter()
                .filter_map(|c| c.content_delta.clone())
                .collect();
            assert_eq!(text, expected);
        }
    }
}
