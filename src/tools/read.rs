use serde_json::json;
use tracing::debug;

use super::args::{INVALID_PATH, ToolArgs};
use super::store::Store;
use crate::llm::types::ToolDef;

pub fn read_file_def() -> ToolDef {
    ToolDef::function(
        "vfs_read_file",
        "Read a text file from the virtual file system.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute VFS path starting with /."}
            },
            "required": ["path"]
        }),
    )
}

pub fn file_exists_def() -> ToolDef {
    ToolDef::function(
        "vfs_file_exists",
        "Check if a VFS file exists.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute file path starting with /."}
            },
            "required": ["path"]
        }),
    )
}

pub async fn read_file(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = args.trimmed("path").unwrap_or_default();
    if !path.starts_with('/') {
        return INVALID_PATH.to_string();
    }
    match store.read_text(path).await {
        Ok(text) => text,
        Err(e) => {
            debug!(path, err=%e, "read failed");
            "Unable to read file.".to_string()
        }
    }
}

pub async fn file_exists(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = args.trimmed("path").unwrap_or_default();
    if !path.starts_with('/') {
        return INVALID_PATH.to_string();
    }
    store.read_text(path).await.is_ok().to_string()
}
