use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use super::store::{Store, StoreError, as_dir_path, check_absolute, is_dir_path};

/// In-process store. Directory markers are entries whose path ends in `/`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries<I, P, C>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(p, c)| (p.into(), c.into()))
            .collect();
        Self {
            entries: RwLock::new(map),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn keys_under<'a>(map: &'a BTreeMap<String, String>, dir: &'a str) -> impl Iterator<Item = &'a String> {
    map.keys().filter(move |k| k.starts_with(dir))
}

#[async_trait]
impl Store for MemoryStore {
    async fn read_text(&self, path: &str) -> Result<String, StoreError> {
        self.entries
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<(), StoreError> {
        check_absolute(path)?;
        self.entries
            .write()
            .await
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let mut map = self.entries.write().await;
        if is_dir_path(path) {
            let doomed: Vec<String> = keys_under(&map, path).cloned().collect();
            if doomed.is_empty() {
                return Err(StoreError::NotFound(path.to_string()));
            }
            for key in doomed {
                map.remove(&key);
            }
            return Ok(());
        }
        map.remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let dir = as_dir_path(dir);
        let map = self.entries.read().await;
        let mut out = BTreeSet::new();
        for key in keys_under(&map, &dir) {
            let rel = &key[dir.len()..];
            if rel.is_empty() {
                continue;
            }
            // implied parent directories
            for (i, _) in rel.match_indices('/') {
                out.insert(rel[..=i].to_string());
            }
            out.insert(rel.to_string());
        }
        Ok(out.into_iter().collect())
    }

    async fn move_entry(&self, from: &str, to: &str) -> Result<(), StoreError> {
        check_absolute(to)?;
        let mut map = self.entries.write().await;
        if is_dir_path(from) {
            let to = as_dir_path(to);
            let moved: Vec<String> = keys_under(&map, from).cloned().collect();
            if moved.is_empty() {
                return Err(StoreError::NotFound(from.to_string()));
            }
            // one entry at a time; not atomic as a whole
            for key in moved {
                if let Some(content) = map.remove(&key) {
                    map.insert(format!("{to}{}", &key[from.len()..]), content);
                }
            }
            return Ok(());
        }
        let content = map
            .remove(from)
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        map.insert(to.to_string(), content);
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        check_absolute(to)?;
        let mut map = self.entries.write().await;
        let content = map
            .get(from)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(from.to_string()))?;
        map.insert(to.to_string(), content);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryStore {
        MemoryStore::with_entries([
            ("/notes.txt", "hello"),
            ("/docs/a.md", "# A"),
            ("/docs/deep/b.md", "# B"),
            ("/empty/", ""),
        ])
    }

    #[tokio::test]
    async fn list_is_recursive_and_relative() {
        let store = seeded();
        assert_eq!(
            store.list("/").await.unwrap(),
            vec!["docs/", "docs/a.md", "docs/deep/", "docs/deep/b.md", "empty/", "notes.txt"]
        );
        assert_eq!(
            store.list("/docs").await.unwrap(),
            vec!["a.md", "deep/", "deep/b.md"]
        );
        assert!(store.list("/nothing/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn move_and_copy_files() {
        let store = seeded();
        store.move_entry("/notes.txt", "/docs/notes.txt").await.unwrap();
        assert!(store.read_text("/notes.txt").await.is_err());
        assert_eq!(store.read_text("/docs/notes.txt").await.unwrap(), "hello");

        store.copy("/docs/a.md", "/a-copy.md").await.unwrap();
        assert_eq!(store.read_text("/a-copy.md").await.unwrap(), "# A");
        assert_eq!(store.read_text("/docs/a.md").await.unwrap(), "# A");

        assert!(matches!(
            store.copy("/missing", "/x").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn move_and_remove_directories() {
        let store = seeded();
        store.move_entry("/docs/", "/archive").await.unwrap();
        assert_eq!(store.read_text("/archive/deep/b.md").await.unwrap(), "# B");
        assert!(store.list("/docs/").await.unwrap().is_empty());

        store.remove("/archive/").await.unwrap();
        assert_eq!(store.len().await, 2);
        assert!(store.remove("/archive/").await.is_err());
    }

    #[tokio::test]
    async fn apply_diff_through_default_method() {
        let store = MemoryStore::with_entries([("/todo.txt", "milk\neggs\n")]);
        let diff = diffy::create_patch("milk\neggs\n", "milk\nbread\n").to_string();
        store.apply_unified_diff("/todo.txt", &diff).await.unwrap();
        assert_eq!(store.read_text("/todo.txt").await.unwrap(), "milk\nbread\n");
    }

    #[tokio::test]
    async fn relative_paths_are_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.write_text("notes.txt", "x").await,
            Err(StoreError::InvalidPath(_))
        ));
    }
}
