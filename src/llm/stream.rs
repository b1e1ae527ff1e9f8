use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::llm::LlmError;
use crate::llm::client_core::{OpenAIClient, cancellable};
use crate::llm::payload::{ChatOptions, build_chat_request};
use crate::llm::stream_tools::{ToolCallDelta, ToolDeltaBuffer, lenient, lenient_or_default};
use crate::llm::types::{ChatMessage, Role, Usage};

// Stream types. Fields with an unexpected JSON type read as missing, so a
// single odd field does not cost the record its content.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamChoiceDelta {
    #[serde(default, deserialize_with = "lenient")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    // OpenAI-compatible tool_calls (streamed as incremental deltas)
    #[serde(default, deserialize_with = "lenient")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StreamChoice {
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub index: usize,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub delta: StreamChoiceDelta,
    #[serde(default, deserialize_with = "lenient")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_or_default")]
    pub choices: Vec<StreamChoice>,
    #[serde(default, deserialize_with = "lenient")]
    pub usage: Option<Usage>,
}

/// Timing for one streamed response. `event_count` counts content deltas,
/// not model tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingStats {
    pub event_count: u64,
    pub started_at: Instant,
    pub first_event_at: Option<Instant>,
    pub ended_at: Instant,
}

impl StreamingStats {
    pub fn time_to_first_event(&self) -> Option<Duration> {
        self.first_event_at.map(|t| t - self.started_at)
    }

    pub fn elapsed(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

/// Callbacks for a streamed response. All methods default to doing nothing.
pub trait StreamHandler {
    fn on_token(&mut self, _token: &str) {}

    /// Non-fatal: the stream keeps going after this is called.
    fn on_error(&mut self, _message: &str) {}

    fn on_done(&mut self, _stats: &StreamingStats) {}
}

impl StreamHandler for () {}

/// Splits a byte stream into lines. A line that is not yet terminated stays
/// buffered until the chunk carrying its newline arrives.
#[derive(Debug, Default)]
pub struct LineFramer {
    pending: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0usize;
        while let Some(pos) = self.pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + pos;
            lines.push(String::from_utf8_lossy(&self.pending[start..end]).into_owned());
            start = end + 1;
        }
        if start > 0 {
            self.pending.drain(..start);
        }
        lines
    }

    /// Whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(rest)
    }
}

#[derive(Debug, Clone)]
pub enum StreamRecord {
    Done,
    Error(String),
    Chunk(Box<ChatStreamChunk>),
    Malformed(String),
}

/// Classifies one framed line. Blank lines and SSE comments yield `None`.
pub fn parse_record(line: &str) -> Option<StreamRecord> {
    let line = line.trim();
    if line.starts_with(':') {
        return None;
    }
    let payload = line.strip_prefix("data:").unwrap_or(line).trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return Some(StreamRecord::Done);
    }
    if payload.starts_with("error") {
        return Some(StreamRecord::Error(payload.to_string()));
    }
    Some(match serde_json::from_str::<ChatStreamChunk>(payload) {
        Ok(chunk) => StreamRecord::Chunk(Box::new(chunk)),
        Err(e) => StreamRecord::Malformed(format!("Error parsing JSON: {e}")),
    })
}

#[derive(Debug, Clone)]
pub struct StreamOutcome {
    /// The assistant message assembled from the streamed deltas.
    pub message: ChatMessage,
    pub stats: StreamingStats,
}

/// Incremental decoder for a chat-completions event stream.
#[derive(Debug)]
pub struct StreamDecoder {
    framer: LineFramer,
    tool_calls: ToolDeltaBuffer,
    content: String,
    event_count: u64,
    started_at: Instant,
    first_event_at: Option<Instant>,
    done: bool,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self {
            framer: LineFramer::new(),
            tool_calls: ToolDeltaBuffer::new(),
            content: String::new(),
            event_count: 0,
            started_at: Instant::now(),
            first_event_at: None,
            done: false,
        }
    }

    /// True once `[DONE]` has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn feed<H: StreamHandler + ?Sized>(&mut self, chunk: &[u8], handler: &mut H) {
        if self.done {
            return;
        }
        for line in self.framer.push(chunk) {
            self.handle_line(&line, handler);
            if self.done {
                break;
            }
        }
    }

    pub fn finish<H: StreamHandler + ?Sized>(mut self, handler: &mut H) -> StreamOutcome {
        if !self.done
            && let Some(rest) = self.framer.finish()
        {
            self.handle_line(&rest, handler);
        }
        let stats = StreamingStats {
            event_count: self.event_count,
            started_at: self.started_at,
            first_event_at: self.first_event_at,
            ended_at: Instant::now(),
        };
        handler.on_done(&stats);
        StreamOutcome {
            message: ChatMessage {
                role: Role::Assistant,
                content: self.content,
                tool_calls: self.tool_calls.finish(),
                tool_call_id: None,
            },
            stats,
        }
    }

    fn handle_line<H: StreamHandler + ?Sized>(&mut self, line: &str, handler: &mut H) {
        match parse_record(line) {
            None => {}
            Some(StreamRecord::Done) => self.done = true,
            Some(StreamRecord::Error(message)) => {
                warn!(record=%message, "error record in stream");
                handler.on_error(&message);
            }
            Some(StreamRecord::Malformed(message)) => {
                warn!(line, "failed to parse stream chunk");
                handler.on_error(&message);
            }
            Some(StreamRecord::Chunk(chunk)) => self.handle_chunk(*chunk, handler),
        }
    }

    fn handle_chunk<H: StreamHandler + ?Sized>(&mut self, chunk: ChatStreamChunk, handler: &mut H) {
        let Some(choice) = chunk.choices.into_iter().next() else {
            return;
        };
        if let Some(content) = choice.delta.content
            && !content.is_empty()
        {
            self.first_event_at.get_or_insert_with(Instant::now);
            self.event_count += 1;
            handler.on_token(&content);
            self.content.push_str(&content);
        }
        for delta in choice.delta.tool_calls.iter().flatten() {
            self.tool_calls.push(delta);
        }
    }
}

impl OpenAIClient {
    /// Streaming chat completion. Tokens go to `handler` as they arrive; the
    /// assembled assistant message is returned once the stream ends.
    pub async fn stream_chat<H: StreamHandler + Send + ?Sized>(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
        handler: &mut H,
        cancel: Option<CancellationToken>,
    ) -> Result<StreamOutcome, LlmError> {
        let cancel = cancel.unwrap_or_default();
        let mut req = build_chat_request(model, messages, options)?;
        req.stream = true;

        if let Ok(payload) = serde_json::to_string_pretty(&req) {
            debug!(payload=%payload, endpoint=%self.endpoint(), "sending chat.completions payload (stream)");
        }

        let resp = self
            .post_json("/v1/chat/completions", &req, &cancel)
            .await?;
        if resp.content_length() == Some(0) {
            return Err(LlmError::MissingBody);
        }

        let mut byte_stream = resp.bytes_stream();
        let mut decoder = StreamDecoder::new();
        while !decoder.is_done() {
            match cancellable(&cancel, byte_stream.next()).await? {
                Some(Ok(chunk)) => decoder.feed(&chunk, handler),
                Some(Err(e)) => {
                    warn!(err=%e, "error reading chunk from byte stream");
                    return Err(e.into());
                }
                None => break, // End of stream
            }
        }
        let outcome = decoder.finish(handler);
        debug!(
            events = outcome.stats.event_count,
            elapsed_ms = outcome.stats.elapsed().as_millis() as u64,
            "chat stream finished"
        );
        Ok(outcome)
    }
}
