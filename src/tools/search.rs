use serde_json::json;
use tracing::{debug, trace};

use super::args::ToolArgs;
use super::store::{Store, is_dir_path};
use crate::llm::types::ToolDef;

pub fn tool_def() -> ToolDef {
    ToolDef::function(
        "vfs_grep",
        "Find files containing a given string in the VFS.",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "String to search for."}
            },
            "required": ["query"]
        }),
    )
}

/// Paths of every file containing `query`, one per line.
pub async fn run(store: &dyn Store, arguments: &str) -> String {
    let args = match ToolArgs::parse(arguments) {
        Ok(a) => a,
        Err(msg) => return msg,
    };
    let query = args.raw("query").unwrap_or_default();
    if query.is_empty() {
        return "Empty query.".to_string();
    }
    let entries = match store.list("/").await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(err=%e, "grep listing failed");
            return "Unable to search files.".to_string();
        }
    };
    let mut matches = Vec::new();
    for entry in entries.iter().filter(|e| !is_dir_path(e)) {
        let path = format!("/{entry}");
        match store.read_text(&path).await {
            Ok(text) if text.contains(query) => matches.push(path),
            Ok(_) => {}
            Err(e) => trace!(%path, err=%e, "skipping unreadable file"),
        }
    }
    debug!(query, hits = matches.len(), "grep finished");
    matches.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::MemoryStore;

    #[tokio::test]
    async fn finds_matching_files() {
        let store = MemoryStore::with_entries([
            ("/a.txt", "needle here"),
            ("/b.txt", "nothing"),
            ("/sub/c.txt", "another needle"),
            ("/needle/", ""),
        ]);
        assert_eq!(
            run(&store, r#"{"query":"needle"}"#).await,
            "/a.txt\n/sub/c.txt"
        );
        assert_eq!(run(&store, r#"{"query":"absent"}"#).await, "");
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let store = MemoryStore::new();
        assert_eq!(run(&store, r#"{"query":""}"#).await, "Empty query.");
        assert_eq!(run(&store, "{}").await, "Empty query.");
    }
}
