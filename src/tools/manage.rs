use serde_json::json;
use tracing::{debug, info};

use super::args::{INVALID_DESTINATION_PATH, INVALID_PATH, INVALID_SOURCE_PATH, OK, ToolArgs, is_file_path};
use super::store::Store;
use crate::llm::types::ToolDef;

fn from_to_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "from": {"type": "string", "description": "Source file path starting with /."},
            "to": {"type": "string", "description": "Destination file path starting with /."}
        },
        "required": ["from", "to"]
    })
}

pub fn rename_file_def() -> ToolDef {
    ToolDef::function("vfs_rename_file", "Rename or move a VFS file.", from_to_schema())
}

pub fn copy_file_def() -> ToolDef {
    ToolDef::function("vfs_copy_file", "Copy a VFS file.", from_to_schema())
}

pub fn delete_file_def() -> ToolDef {
    ToolDef::function(
        "vfs_delete_file",
        "Delete a VFS file.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute file path starting with /."}
            },
            "required": ["path"]
        }),
    )
}

/// Validated `from`/`to` pair, or the message to return.
fn from_to(arguments: &str) -> Result<(String, String), String> {
    let args = ToolArgs::parse(arguments)?;
    let from = args.trimmed("from").unwrap_or_default();
    let to = args.trimmed("to").unwrap_or_default();
    if !is_file_path(from) {
        return Err(INVALID_SOURCE_PATH.to_string());
    }
    if !is_file_path(to) {
        return Err(INVALID_DESTINATION_PATH.to_string());
    }
    Ok((from.to_string(), to.to_string()))
}

pub async fn rename_file(store: &dyn Store, arguments: &str) -> String {
    let (from, to) = match from_to(arguments) {
        Ok(pair) => pair,
        Err(msg) => return msg,
    };
    match store.move_entry(&from, &to).await {
        Ok(()) => {
            info!(%from, %to, "file renamed");
            OK.to_string()
        }
        Err(e) => {
            debug!(%from, %to, err=%e, "rename failed");
            "Unable to rename file.".to_string()
        }
    }
}

pub async fn copy_file(store: &dyn Store, arguments: &str) -> String {
    let (from, to) = match from_to(arguments) {
        Ok(pair) => pair,
        Err(msg) => return msg,
    };
    match store.copy(&from, &to).await {
        Ok(()) => OK.to_string(),
        Err(e) => {
            debug!(%from, %to, err=%e, "copy failed");
            "Unable to copy file.".to_string()
        }
    }
}

pub async fn delete_file(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = args.trimmed("path").unwrap_or_default();
    if !is_file_path(path) {
        return INVALID_PATH.to_string();
    }
    match store.remove(path).await {
        Ok(()) => {
            info!(path, "file deleted");
            OK.to_string()
        }
        Err(e) => {
            debug!(path, err=%e, "delete failed");
            "Unable to delete file.".to_string()
        }
    }
}
