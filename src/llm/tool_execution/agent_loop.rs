use std::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    LoopError, LoopEvent, LoopOutcome, LoopStatus, NO_RESPONSE_PLACEHOLDER, RequestMode,
    ToolCallLoop,
};
use crate::llm::LlmError;
use crate::llm::history::Transcript;
use crate::llm::payload::ChatOptions;
use crate::llm::stream::{StreamHandler, StreamingStats};
use crate::llm::types::{ChatMessage, ToolCall};

#[derive(Debug)]
enum LoopState {
    AwaitingModelResponse,
    ExecutingTools(Vec<ToolCall>),
    Done,
}

/// Forwards streamed tokens to the loop's event channel.
struct TokenForwarder {
    events: Option<Sender<LoopEvent>>,
}

impl StreamHandler for TokenForwarder {
    fn on_token(&mut self, token: &str) {
        if let Some(tx) = &self.events {
            let _ = tx.send(LoopEvent::Token(token.to_string()));
        }
    }

    fn on_error(&mut self, message: &str) {
        warn!(record = message, "stream reported a bad record");
    }

    fn on_done(&mut self, stats: &StreamingStats) {
        debug!(events = stats.event_count, "round stream complete");
    }
}

fn joined_answer(parts: &[String]) -> String {
    if parts.is_empty() {
        NO_RESPONSE_PLACEHOLDER.to_string()
    } else {
        parts.join("\n")
    }
}

impl ToolCallLoop<'_> {
    pub async fn run(
        &self,
        transcript: &mut Transcript,
        cancel: Option<CancellationToken>,
    ) -> Result<LoopOutcome, LoopError> {
        let cancel = cancel.unwrap_or_default();
        let mut options = self.options.clone();
        options.tools = self.registry.definitions().to_vec();
        options.stream = Some(self.mode == RequestMode::Streaming);

        let mut parts: Vec<String> = Vec::new();
        let mut rounds = 0usize;
        let mut state = LoopState::AwaitingModelResponse;

        loop {
            state = match state {
                LoopState::AwaitingModelResponse => {
                    if rounds >= self.max_rounds {
                        warn!(rounds, "tool-call loop guard reached");
                        return Ok(LoopOutcome {
                            status: LoopStatus::LoopGuardExceeded,
                            answer: joined_answer(&parts),
                            rounds,
                        });
                    }
                    rounds += 1;
                    debug!(round = rounds, messages = transcript.len(), "requesting model response");

                    let message = self
                        .request(transcript.all(), &options, cancel.clone())
                        .await
                        .map_err(|source| LoopError {
                            partial_answer: parts.join("\n"),
                            source,
                        })?;
                    if !message.content.is_empty() {
                        parts.push(message.content.clone());
                    }
                    let calls = message.tool_calls.clone();
                    transcript.add_message(message);
                    if calls.is_empty() {
                        LoopState::Done
                    } else {
                        LoopState::ExecutingTools(calls)
                    }
                }
                LoopState::ExecutingTools(calls) => {
                    for call in calls {
                        info!(tool = call.name(), id = %call.id, "executing tool");
                        self.emit(LoopEvent::ToolCall(call.clone()));
                        let content = self.registry.dispatch(&call).await;
                        self.emit(LoopEvent::ToolResult {
                            call_id: call.id.clone(),
                            name: call.name().to_string(),
                            content: content.clone(),
                        });
                        transcript.add_message(ChatMessage::tool_result(call.id, content));
                    }
                    LoopState::AwaitingModelResponse
                }
                LoopState::Done => {
                    return Ok(LoopOutcome {
                        status: LoopStatus::Completed,
                        answer: joined_answer(&parts),
                        rounds,
                    });
                }
            };
        }
    }

    async fn request(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: CancellationToken,
    ) -> Result<ChatMessage, LlmError> {
        match self.mode {
            RequestMode::Batch => self
                .client
                .complete_chat(&self.model, messages, options, Some(cancel))
                .await?
                .into_first_message()
                .ok_or(LlmError::MissingMessage),
            RequestMode::Streaming => {
                let mut forwarder = TokenForwarder {
                    events: self.events.clone(),
                };
                let outcome = self
                    .client
                    .stream_chat(&self.model, messages, options, &mut forwarder, Some(cancel))
                    .await?;
                Ok(outcome.message)
            }
        }
    }
}
