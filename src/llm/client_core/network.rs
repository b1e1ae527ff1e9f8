use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{OpenAIClient, cancellable};
use crate::llm::LlmError;

/// One entry of a model listing. Backends disagree on field names, so both
/// spellings are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owned_by: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub created: Option<Value>,
    #[serde(default)]
    pub created_at: Option<Value>,
}

impl ModelInfo {
    pub fn display_name(&self) -> &str {
        self.id
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("-")
    }

    pub fn owner(&self) -> &str {
        self.owned_by
            .as_deref()
            .or(self.owner.as_deref())
            .unwrap_or("-")
    }

    pub fn created(&self) -> Option<&Value> {
        self.created.as_ref().or(self.created_at.as_ref())
    }
}

/// Accepts `{data:[...]}`, `{models:[...]}` or a bare array. Anything else is
/// an empty listing; entries that are not objects are skipped.
pub fn normalize_models(payload: Value) -> Vec<ModelInfo> {
    let list = match payload {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            _ => match obj.remove("models") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
        },
        _ => Vec::new(),
    };
    list.into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

impl OpenAIClient {
    pub async fn list_models(
        &self,
        cancel: Option<CancellationToken>,
    ) -> Result<Vec<ModelInfo>, LlmError> {
        let cancel = cancel.unwrap_or_default();
        let resp = self.get("/v1/models", &cancel).await?;
        let body: Value = cancellable(&cancel, resp.json()).await??;
        let models = normalize_models(body);
        debug!(count = models.len(), "listed models");
        Ok(models)
    }

    /// llama.cpp-style warm load.
    pub async fn load_model(
        &self,
        model: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Value, LlmError> {
        self.post_model("/models/load", model, cancel).await
    }

    /// Ollama-style pull. When the pull endpoint fails for any reason the
    /// request is retried once against `/models/load`.
    pub async fn pull_model(
        &self,
        model: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Value, LlmError> {
        match self.post_model("/api/pull", model, cancel.clone()).await {
            Ok(v) => Ok(v),
            Err(LlmError::Cancelled) => Err(LlmError::Cancelled),
            Err(e) => {
                warn!(model, err=%e, "pull failed, falling back to load");
                self.load_model(model, cancel).await
            }
        }
    }

    pub async fn delete_model(
        &self,
        model: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Value, LlmError> {
        self.post_model("/api/delete", model, cancel).await
    }

    async fn post_model(
        &self,
        path: &str,
        model: &str,
        cancel: Option<CancellationToken>,
    ) -> Result<Value, LlmError> {
        if model.is_empty() {
            return Err(LlmError::MissingModel);
        }
        let cancel = cancel.unwrap_or_default();
        let resp = self
            .post_json(path, &json!({ "model": model }), &cancel)
            .await?;
        let text = cancellable(&cancel, resp.text()).await??;
        info!(path, model, "model request finished");
        // Some backends answer with an empty body on success.
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}
