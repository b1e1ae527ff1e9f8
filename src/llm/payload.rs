use serde::Serialize;

use crate::llm::LlmError;
use crate::llm::types::{ChatMessage, ToolDef};

/// Model-name prefixes served by reasoning-style backends. These reject
/// `max_tokens`, `temperature` and `stop`.
pub const REASONING_MODEL_PREFIXES: &[&str] = &["o4", "gpt-4.1"];

pub fn is_reasoning_model(model: &str) -> bool {
    REASONING_MODEL_PREFIXES
        .iter()
        .any(|prefix| model.starts_with(prefix))
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub stop_tokens: Vec<String>,
    pub tools: Vec<ToolDef>,
    pub tool_choice: Option<serde_json::Value>,
    /// Defaults to `true` when unset.
    pub stream: Option<bool>,
}

impl ChatOptions {
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDef>) -> Self {
        self.tools = tools;
        self
    }
}

/// Body of a `/v1/chat/completions` request. Built fresh for every round and
/// borrowed from the transcript, never stored.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<&'a [ToolDef]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'a serde_json::Value>,
}

pub fn build_chat_request<'a>(
    model: &'a str,
    messages: &'a [ChatMessage],
    options: &'a ChatOptions,
) -> Result<ChatRequest<'a>, LlmError> {
    if model.is_empty() {
        return Err(LlmError::MissingModel);
    }
    let mut req = ChatRequest {
        model,
        messages,
        stream: options.stream.unwrap_or(true),
        max_completion_tokens: None,
        max_tokens: None,
        temperature: None,
        stop: None,
        tools: None,
        tool_choice: None,
    };

    if is_reasoning_model(model) {
        // temperature and stop are dropped even when supplied
        req.max_completion_tokens = options.max_tokens;
    } else {
        req.max_tokens = options.max_tokens;
        req.temperature = options.temperature;
        if !options.stop_tokens.is_empty() {
            req.stop = Some(&options.stop_tokens);
        }
    }

    if !options.tools.is_empty() {
        req.tools = Some(&options.tools);
    }
    req.tool_choice = options.tool_choice.as_ref();
    Ok(req)
}
