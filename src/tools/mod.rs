mod apply_diff;
mod args;
mod datetime;
mod fs_store;
mod list;
mod manage;
mod memory;
mod read;
mod search;
mod store;
mod write;

use async_trait::async_trait;
use std::sync::Arc;

use crate::llm::types::{ToolCall, ToolDef};
use crate::llm::{RegistryError, ToolHandler, ToolRegistry};

pub use fs_store::FsStore;
pub use memory::MemoryStore;
pub use store::{Store, StoreError, apply_diff_text, as_dir_path, is_dir_path};

/// The built-in tools. Each variant owns its wire name and schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VfsTool {
    GetDatetime,
    ReadFile,
    ListFiles,
    ApplyDiff,
    WriteFile,
    RenameFile,
    DeleteFile,
    CopyFile,
    Mkdir,
    FileExists,
    Grep,
}

impl VfsTool {
    pub const ALL: [VfsTool; 11] = [
        VfsTool::GetDatetime,
        VfsTool::ReadFile,
        VfsTool::ListFiles,
        VfsTool::ApplyDiff,
        VfsTool::WriteFile,
        VfsTool::RenameFile,
        VfsTool::DeleteFile,
        VfsTool::CopyFile,
        VfsTool::Mkdir,
        VfsTool::FileExists,
        VfsTool::Grep,
    ];

    pub fn name(self) -> &'static str {
        match self {
            VfsTool::GetDatetime => "get_datetime",
            VfsTool::ReadFile => "vfs_read_file",
            VfsTool::ListFiles => "vfs_list_files",
            VfsTool::ApplyDiff => "vfs_apply_diff",
            VfsTool::WriteFile => "vfs_write_file",
            VfsTool::RenameFile => "vfs_rename_file",
            VfsTool::DeleteFile => "vfs_delete_file",
            VfsTool::CopyFile => "vfs_copy_file",
            VfsTool::Mkdir => "vfs_mkdir",
            VfsTool::FileExists => "vfs_file_exists",
            VfsTool::Grep => "vfs_grep",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    pub fn definition(self) -> ToolDef {
        match self {
            VfsTool::GetDatetime => datetime::tool_def(),
            VfsTool::ReadFile => read::read_file_def(),
            VfsTool::ListFiles => list::tool_def(),
            VfsTool::ApplyDiff => apply_diff::tool_def(),
            VfsTool::WriteFile => write::write_file_def(),
            VfsTool::RenameFile => manage::rename_file_def(),
            VfsTool::DeleteFile => manage::delete_file_def(),
            VfsTool::CopyFile => manage::copy_file_def(),
            VfsTool::Mkdir => write::mkdir_def(),
            VfsTool::FileExists => read::file_exists_def(),
            VfsTool::Grep => search::tool_def(),
        }
    }

    pub async fn run(self, store: &dyn Store, arguments: &str) -> String {
        match self {
            VfsTool::GetDatetime => datetime::run(),
            VfsTool::ReadFile => read::read_file(store, arguments).await,
            VfsTool::ListFiles => list::run(store, arguments).await,
            VfsTool::ApplyDiff => apply_diff::run(store, arguments).await,
            VfsTool::WriteFile => write::write_file(store, arguments).await,
            VfsTool::RenameFile => manage::rename_file(store, arguments).await,
            VfsTool::DeleteFile => manage::delete_file(store, arguments).await,
            VfsTool::CopyFile => manage::copy_file(store, arguments).await,
            VfsTool::Mkdir => write::mkdir(store, arguments).await,
            VfsTool::FileExists => read::file_exists(store, arguments).await,
            VfsTool::Grep => search::run(store, arguments).await,
        }
    }
}

struct VfsHandler {
    tool: VfsTool,
    store: Arc<dyn Store>,
}

#[async_trait]
impl ToolHandler for VfsHandler {
    async fn call(&self, call: &ToolCall) -> String {
        self.tool.run(self.store.as_ref(), call.arguments_json()).await
    }
}

/// Registry with every built-in tool bound to `store`.
pub fn vfs_registry(store: Arc<dyn Store>) -> Result<ToolRegistry, RegistryError> {
    let mut builder = ToolRegistry::builder();
    for tool in VfsTool::ALL {
        builder = builder.register(
            tool.definition(),
            VfsHandler {
                tool,
                store: store.clone(),
            },
        )?;
    }
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_match_definitions() {
        for tool in VfsTool::ALL {
            assert_eq!(tool.definition().name(), tool.name());
            assert_eq!(VfsTool::from_name(tool.name()), Some(tool));
        }
        assert_eq!(VfsTool::from_name("fs_read"), None);
    }

    #[tokio::test]
    async fn registry_routes_to_store() {
        let store = Arc::new(MemoryStore::with_entries([("/hello.txt", "hi there")]));
        let registry = vfs_registry(store.clone()).unwrap();
        assert_eq!(registry.len(), VfsTool::ALL.len());
        assert_eq!(registry.definitions()[0].name(), "get_datetime");

        let out = registry
            .dispatch(&ToolCall::new("1", "vfs_read_file", r#"{"path":"/hello.txt"}"#))
            .await;
        assert_eq!(out, "hi there");

        let out = registry
            .dispatch(&ToolCall::new(
                "2",
                "vfs_write_file",
                r#"{"path":"/new.txt","content":"x"}"#,
            ))
            .await;
        assert_eq!(out, "OK");
        assert_eq!(store.read_text("/new.txt").await.unwrap(), "x");

        let out = registry
            .dispatch(&ToolCall::new("3", "vfs_grep", r#"{"query":"there"}"#))
            .await;
        assert_eq!(out, "/hello.txt");
    }
}
