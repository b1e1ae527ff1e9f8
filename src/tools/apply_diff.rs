use serde_json::json;
use tracing::{info, warn};

use super::args::{INVALID_PATH, OK, ToolArgs};
use super::store::Store;
use crate::llm::types::ToolDef;

pub fn tool_def() -> ToolDef {
    ToolDef::function(
        "vfs_apply_diff",
        "Apply a unified diff to an existing VFS file (preferred for edits).",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute file path starting with /."},
                "diff": {"type": "string", "description": "Unified diff to apply."}
            },
            "required": ["path", "diff"]
        }),
    )
}

pub async fn run(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = args.trimmed("path").unwrap_or_default();
    let diff = args.raw("diff").unwrap_or_default();
    if !path.starts_with('/') {
        return INVALID_PATH.to_string();
    }
    if diff.is_empty() {
        return "Empty diff.".to_string();
    }
    match store.apply_unified_diff(path, diff).await {
        Ok(()) => {
            info!(path, "diff applied");
            OK.to_string()
        }
        Err(e) => {
            warn!(path, err=%e, "diff rejected");
            "Unable to apply diff.".to_string()
        }
    }
}
