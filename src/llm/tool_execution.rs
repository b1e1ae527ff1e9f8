use std::sync::mpsc::Sender;
use thiserror::Error;

use crate::llm::LlmError;
use crate::llm::client_core::OpenAIClient;
use crate::llm::payload::ChatOptions;
use crate::llm::tool_runtime::ToolRegistry;
use crate::llm::types::ToolCall;

mod agent_loop;

pub const DEFAULT_MAX_ROUNDS: usize = 6;

/// Answer reported when the model never produced any text.
pub const NO_RESPONSE_PLACEHOLDER: &str = "[No response]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    #[default]
    Batch,
    Streaming,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// A streamed content fragment (streaming mode only).
    Token(String),
    ToolCall(ToolCall),
    ToolResult {
        call_id: String,
        name: String,
        content: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Completed,
    LoopGuardExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub status: LoopStatus,
    pub answer: String,
    pub rounds: usize,
}

/// A transport failure inside the loop, with the text gathered before it.
#[derive(Debug, Error)]
#[error("tool-call loop failed: {source}")]
pub struct LoopError {
    pub partial_answer: String,
    #[source]
    pub source: LlmError,
}

/// Drives a conversation through model requests and tool executions until the
/// model answers without tool calls or `max_rounds` requests have been made.
pub struct ToolCallLoop<'a> {
    client: &'a OpenAIClient,
    registry: &'a ToolRegistry,
    model: String,
    options: ChatOptions,
    mode: RequestMode,
    max_rounds: usize,
    events: Option<Sender<LoopEvent>>,
}

impl<'a> ToolCallLoop<'a> {
    pub fn new(client: &'a OpenAIClient, registry: &'a ToolRegistry, model: impl Into<String>) -> Self {
        Self {
            client,
            registry,
            model: model.into(),
            options: ChatOptions::default(),
            mode: RequestMode::default(),
            max_rounds: DEFAULT_MAX_ROUNDS,
            events: None,
        }
    }

    /// Sampling options. `tools` and `stream` are overwritten on every round.
    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    /// Request budget for one run. Zero is raised to one.
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_events(mut self, tx: Sender<LoopEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
