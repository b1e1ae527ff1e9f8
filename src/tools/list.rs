use serde_json::json;
use tracing::debug;

use super::args::{INVALID_PATH, ToolArgs};
use super::store::{Store, as_dir_path, is_dir_path};
use crate::llm::types::ToolDef;

pub fn tool_def() -> ToolDef {
    ToolDef::function(
        "vfs_list_files",
        "List entries in a VFS directory.",
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute directory path ending with /. Defaults to /."
                }
            }
        }),
    )
}

/// Files below the directory, recursively, one absolute path per line.
pub async fn run(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = match args.trimmed("path") {
        Some(p) if !p.is_empty() => p,
        _ => "/",
    };
    if !path.starts_with('/') {
        return INVALID_PATH.to_string();
    }
    let base = as_dir_path(path);
    match store.list(&base).await {
        Ok(entries) => entries
            .iter()
            .filter(|e| !is_dir_path(e))
            .map(|e| format!("{base}{e}"))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            debug!(path=%base, err=%e, "list failed");
            "Unable to list directory.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MemoryStore;

    fn store() -> MemoryStore {
        MemoryStore::with_entries([
            ("/readme.md", "r"),
            ("/src/lib.rs", "l"),
            ("/src/bin/main.rs", "m"),
            ("/src/empty/", ""),
        ])
    }

    #[tokio::test]
    async fn lists_files_only() {
        let store = store();
        assert_eq!(
            run(&store, "{}").await,
            "/readme.md\n/src/bin/main.rs\n/src/lib.rs"
        );
        assert_eq!(
            run(&store, r#"{"path":"/src"}"#).await,
            "/src/bin/main.rs\n/src/lib.rs"
        );
    }

    #[tokio::test]
    async fn blank_path_defaults_to_root() {
        let store = store();
        assert_eq!(run(&store, r#"{"path":"  "}"#).await, run(&store, "").await);
        assert_eq!(run(&store, r#"{"path":"src"}"#).await, "Invalid path.");
        assert_eq!(run(&store, r#"{"path":"/nope/"}"#).await, "");
    }
}
