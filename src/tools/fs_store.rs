use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::store::{Store, StoreError, as_dir_path, check_absolute, is_dir_path};

/// Store backed by a directory on disk. `/a/b.txt` maps to `<root>/a/b.txt`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StoreError> {
        check_absolute(path)?;
        Ok(self.root.join(path.trim_start_matches('/')))
    }
}

fn map_io(path: &str, e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound(path.to_string())
    } else {
        StoreError::Io(e)
    }
}

async fn ensure_parent(target: &Path) -> Result<(), StoreError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

#[async_trait]
impl Store for FsStore {
    async fn read_text(&self, path: &str) -> Result<String, StoreError> {
        let target = self.resolve(path)?;
        if is_dir_path(path) {
            let meta = fs::metadata(&target).await.map_err(|e| map_io(path, e))?;
            if meta.is_dir() {
                return Ok(String::new());
            }
            return Err(StoreError::NotFound(path.to_string()));
        }
        fs::read_to_string(&target)
            .await
            .map_err(|e| map_io(path, e))
    }

    async fn write_text(&self, path: &str, content: &str) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        if is_dir_path(path) {
            fs::create_dir_all(&target).await?;
            return Ok(());
        }
        ensure_parent(&target).await?;
        fs::write(&target, content).await?;
        debug!(path, bytes = content.len(), "wrote file");
        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let target = self.resolve(path)?;
        let res = if is_dir_path(path) {
            fs::remove_dir_all(&target).await
        } else {
            fs::remove_file(&target).await
        };
        res.map_err(|e| map_io(path, e))
    }

    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError> {
        let dir = as_dir_path(dir);
        let base = self.resolve(&dir)?;
        let mut out = Vec::new();
        let mut pending = vec![(base, String::new())];
        while let Some((current, prefix)) = pending.pop() {
            let mut rd = match fs::read_dir(&current).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = rd.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await?.is_dir() {
                    let rel = format!("{prefix}{name}/");
                    out.push(rel.clone());
                    pending.push((entry.path(), rel));
                } else {
                    out.push(format!("{prefix}{name}"));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn move_entry(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        ensure_parent(&dst).await?;
        fs::rename(&src, &dst).await.map_err(|e| map_io(from, e))
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.resolve(from)?;
        let dst = self.resolve(to)?;
        ensure_parent(&dst).await?;
        fs::copy(&src, &dst).await.map_err(|e| map_io(from, e))?;
        Ok(())
    }
}
