use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::llm::types::ToolCall;

/// Slots a single delta may open past the highest one seen so far.
pub const MAX_TOOL_CALL_INDEX_GAP: usize = 64;

/// Reads any JSON value and keeps it only if it has the expected shape.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Like [`lenient`], falling back to `T::default()`.
pub(crate) fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunctionDelta {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub arguments: Option<String>, // streamed as partial JSON string
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default, deserialize_with = "lenient")]
    pub index: Option<usize>,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub kind: Option<String>, // "function"
    #[serde(default, deserialize_with = "lenient")]
    pub function: Option<ToolCallFunctionDelta>,
}

#[derive(Debug, Clone, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Rebuilds complete tool calls out of streamed `tool_calls` fragments.
#[derive(Debug, Default)]
pub struct ToolDeltaBuffer {
    // Each index may have an in-progress tool call
    calls: Vec<PartialCall>,
}

impl ToolDeltaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    // index can be sparse/increasing; we resize as needed
    pub fn push(&mut self, delta: &ToolCallDelta) {
        let index = delta.index.unwrap_or(0);
        if index > self.calls.len() + MAX_TOOL_CALL_INDEX_GAP {
            warn!(index, open = self.calls.len(), "ignoring out-of-range tool call index");
            return;
        }
        if self.calls.len() <= index {
            self.calls.resize_with(index + 1, Default::default);
        }
        let slot = &mut self.calls[index];
        if let Some(id) = delta.id.as_deref()
            && !id.is_empty()
        {
            slot.id = id.to_string();
        }
        if let Some(f) = &delta.function {
            if let Some(name) = f.name.as_deref() {
                slot.name.push_str(name);
            }
            if let Some(args) = f.arguments.as_deref() {
                slot.arguments.push_str(args);
            }
        }
    }

    /// Completed calls in index order. Slots that never received a name are
    /// dropped.
    pub fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|c| !c.name.is_empty())
            .map(|c| ToolCall::new(c.id, c.name, c.arguments))
            .collect()
    }
}
