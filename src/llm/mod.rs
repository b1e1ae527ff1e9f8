mod client_core;
mod history;
mod payload;
mod stream;
mod stream_tools;
mod tool_execution;
mod tool_runtime;
pub mod types;

use reqwest::StatusCode;
use thiserror::Error;

pub use client_core::*;
pub use history::*;
pub use payload::*;
pub use stream::*;
pub use stream_tools::*;
pub use tool_execution::*;
pub use tool_runtime::*;
pub use types::*;

/// Transport and protocol failures. These are returned to the caller of the
/// tool-call loop; tool failures never take this path.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("missing model")]
    MissingModel,
    #[error("missing base url")]
    MissingBaseUrl,
    #[error("HTTP error: {status}")]
    Status { status: StatusCode, body: String },
    #[error("missing response body")]
    MissingBody,
    #[error("missing response message")]
    MissingMessage,
    #[error("request cancelled")]
    Cancelled,
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl LlmError {
    /// The HTTP status for `Status` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            LlmError::Status { status, .. } => Some(*status),
            LlmError::Http(e) => e.status(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, LlmError::Cancelled)
    }
}
