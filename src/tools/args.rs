use serde_json::{Map, Value};

pub(crate) const INVALID_ARGUMENTS: &str = "Invalid arguments.";
pub(crate) const INVALID_PATH: &str = "Invalid path.";
pub(crate) const INVALID_SOURCE_PATH: &str = "Invalid source path.";
pub(crate) const INVALID_DESTINATION_PATH: &str = "Invalid destination path.";
pub(crate) const OK: &str = "OK";

/// Tool arguments as sent by the model. Fields of the wrong type read as
/// absent.
#[derive(Debug, Default)]
pub(crate) struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// Empty text counts as `{}`. Valid JSON that is not an object carries no
    /// fields.
    pub fn parse(text: &str) -> Result<Self, String> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Ok(Self::default()),
            Err(_) => Err(INVALID_ARGUMENTS.to_string()),
        }
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn trimmed(&self, key: &str) -> Option<&str> {
        self.raw(key).map(str::trim)
    }
}

/// Absolute path to a file, not a directory.
pub(crate) fn is_file_path(path: &str) -> bool {
    path.starts_with('/') && !path.ends_with('/')
}
