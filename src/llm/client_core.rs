use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::LlmConfig;
use crate::llm::LlmError;
use crate::llm::payload::{ChatOptions, build_chat_request};
use crate::llm::types::{ChatCompletion, ChatMessage};

mod network;

pub use network::{ModelInfo, normalize_models};

/// API key value that means "no credential" to local backends.
pub const NO_API_KEY: &str = "_";

#[derive(Debug, Clone)]
pub struct OpenAIClient {
    pub base_url: String,
    pub api_key: Option<String>,
    pub(crate) inner: reqwest::Client,
    pub llm_cfg: LlmConfig,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Warmup {
    pub answer: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl OpenAIClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self, LlmError> {
        let base_url = normalize_base_url(&base_url.into());
        if base_url.is_empty() {
            return Err(LlmError::MissingBaseUrl);
        }
        let inner = reqwest::Client::builder().build()?;
        Ok(Self {
            base_url,
            api_key,
            inner,
            llm_cfg: LlmConfig::default(),
        })
    }

    pub fn with_llm_config(mut self, cfg: LlmConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = cfg.connect_timeout_ms {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = cfg.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        // If building fails, keep the existing client.
        if let Ok(c) = builder.build() {
            self.inner = c;
        }
        self.llm_cfg = cfg;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn endpoint(&self) -> String {
        self.url("/v1/chat/completions")
    }

    pub(crate) fn headers(&self) -> Result<HeaderMap, LlmError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.api_key.as_deref()
            && !key.is_empty()
            && key != NO_API_KEY
        {
            headers.insert(AUTHORIZATION, format!("Bearer {key}").parse()?);
        }
        Ok(headers)
    }

    /// POSTs `body` as JSON and fails on any non-2xx status.
    pub(crate) async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, LlmError> {
        let url = self.url(path);
        let req = self.inner.post(&url).headers(self.headers()?).json(body);
        let resp = cancellable(cancel, req.send()).await??;
        ensure_success(resp, &url, cancel).await
    }

    pub(crate) async fn get(
        &self,
        path: &str,
        cancel: &CancellationToken,
    ) -> Result<reqwest::Response, LlmError> {
        let url = self.url(path);
        let req = self.inner.get(&url).headers(self.headers()?);
        let resp = cancellable(cancel, req.send()).await??;
        ensure_success(resp, &url, cancel).await
    }

    /// Batch chat completion. The request is always sent with `stream:false`.
    pub async fn complete_chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: Option<CancellationToken>,
    ) -> Result<ChatCompletion, LlmError> {
        let cancel = cancel.unwrap_or_default();
        let mut req = build_chat_request(model, messages, options)?;
        req.stream = false;

        if let Ok(payload) = serde_json::to_string_pretty(&req) {
            debug!(payload=%payload, endpoint=%self.endpoint(), "sending chat.completions payload");
        }

        let resp = self
            .post_json("/v1/chat/completions", &req, &cancel)
            .await?;
        let text = cancellable(&cancel, resp.text()).await??;
        debug!(response_body=%text, "chat.completions response");
        Ok(serde_json::from_str(&text)?)
    }

    /// Sends only a system message to get the model loaded and reports the
    /// answer with the server's token usage.
    pub async fn warmup(
        &self,
        model: &str,
        system_prompt: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Warmup, LlmError> {
        let messages = [ChatMessage::system(system_prompt)];
        let body = self
            .complete_chat(model, &messages, &ChatOptions::default(), cancel)
            .await?;
        let usage = body.usage.clone().unwrap_or_default();
        let answer = body
            .first_message()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        info!(model, total_tokens = usage.total_tokens, "warmup finished");
        Ok(Warmup {
            answer,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        })
    }
}

/// Trims whitespace, trailing slashes and a trailing `/v1` so paths can be
/// appended uniformly.
pub fn normalize_base_url(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    base.strip_suffix("/v1")
        .unwrap_or(base)
        .trim_end_matches('/')
        .to_string()
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, LlmError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("request cancelled");
            Err(LlmError::Cancelled)
        }
        out = fut => Ok(out),
    }
}

async fn ensure_success(
    resp: reqwest::Response,
    url: &str,
    cancel: &CancellationToken,
) -> Result<reqwest::Response, LlmError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = cancellable(cancel, resp.text())
        .await?
        .unwrap_or_default()
        .trim()
        .to_owned();
    error!(status=%status.as_u16(), endpoint=%url, body=%body, "non-success status");
    Err(LlmError::Status { status, body })
}
