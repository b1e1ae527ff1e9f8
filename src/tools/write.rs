use serde_json::json;
use tracing::{debug, info};

use super::args::{INVALID_PATH, OK, ToolArgs, is_file_path};
use super::store::{Store, as_dir_path};
use crate::llm::types::ToolDef;

pub fn write_file_def() -> ToolDef {
    ToolDef::function(
        "vfs_write_file",
        "Create or overwrite a VFS file with text content.",
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Absolute file path starting with /."},
                "content": {"type": "string", "description": "Text content to write."}
            },
            "required": ["path", "content"]
        }),
    )
}

pub fn mkdir_def() -> ToolDef {
    ToolDef::function(
        "vfs_mkdir",
        "Create a directory in the VFS.",
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute directory path starting with / and ending with /."
                }
            },
            "required": ["path"]
        }),
    )
}

pub async fn write_file(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = args.trimmed("path").unwrap_or_default();
    let content = args.raw("content").unwrap_or_default();
    if !is_file_path(path) {
        return INVALID_PATH.to_string();
    }
    match store.write_text(path, content).await {
        Ok(()) => {
            info!(path, bytes = content.len(), "file written");
            OK.to_string()
        }
        Err(e) => {
            debug!(path, err=%e, "write failed");
            "Unable to write file.".to_string()
        }
    }
}

pub async fn mkdir(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let path = args.trimmed("path").unwrap_or_default();
    if !path.starts_with('/') {
        return INVALID_PATH.to_string();
    }
    let dir = as_dir_path(path);
    match store.write_text(&dir, "").await {
        Ok(()) => OK.to_string(),
        Err(e) => {
            debug!(path=%dir, err=%e, "mkdir failed");
            "Unable to create directory.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MemoryStore;

    #[tokio::test]
    async fn writes_untrimmed_content() {
        let store = MemoryStore::new();
        let out = write_file(&store, r#"{"path":"/a.txt","content":"  spaced\n"}"#).await;
        assert_eq!(out, "OK");
        assert_eq!(store.read_text("/a.txt").await.unwrap(), "  spaced\n");

        // missing content writes an empty file
        assert_eq!(write_file(&store, r#"{"path":"/b.txt"}"#).await, "OK");
        assert_eq!(store.read_text("/b.txt").await.unwrap(), "");
    }

    #[tokio::test]
    async fn directory_paths_are_not_files() {
        let store = MemoryStore::new();
        assert_eq!(
            write_file(&store, r#"{"path":"/dir/","content":"x"}"#).await,
            "Invalid path."
        );
        assert_eq!(write_file(&store, "nope").await, "Invalid arguments.");
    }

    #[tokio::test]
    async fn mkdir_appends_slash() {
        let store = MemoryStore::new();
        assert_eq!(mkdir(&store, r#"{"path":"/docs"}"#).await, "OK");
        assert_eq!(store.read_text("/docs/").await.unwrap(), "");
        assert_eq!(mkdir(&store, r#"{"path":"docs"}"#).await, "Invalid path.");
    }
}
