use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("failed to parse diff: {0}")]
    DiffParse(String),
    #[error("failed to apply diff: {0}")]
    DiffApply(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Text-addressable storage the built-in tools operate on. Paths are absolute
/// and start with `/`; a trailing `/` names a directory.
#[async_trait]
pub trait Store: Send + Sync {
    async fn read_text(&self, path: &str) -> Result<String, StoreError>;

    /// Writing to a directory path creates the directory.
    async fn write_text(&self, path: &str, content: &str) -> Result<(), StoreError>;

    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Every entry below `dir`, recursively, relative to `dir` and sorted.
    /// Directories carry a trailing `/`.
    async fn list(&self, dir: &str) -> Result<Vec<String>, StoreError>;

    async fn move_entry(&self, from: &str, to: &str) -> Result<(), StoreError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError>;

    async fn apply_unified_diff(&self, path: &str, diff: &str) -> Result<(), StoreError> {
        let original = self.read_text(path).await?;
        let patched = apply_diff_text(&original, diff)?;
        debug!(path, bytes = patched.len(), "applied diff");
        self.write_text(path, &patched).await
    }
}

/// Applies a unified diff to `original`. Line endings are compared as LF and
/// CRLF files keep CRLF.
pub fn apply_diff_text(original: &str, diff: &str) -> Result<String, StoreError> {
    let has_crlf = original.contains("\r\n");
    let original_lf = original.replace("\r\n", "\n");
    let diff_lf = diff.replace("\r\n", "\n");

    let patch = diffy::Patch::from_str(&diff_lf).map_err(|e| StoreError::DiffParse(e.to_string()))?;
    if patch.hunks().is_empty() {
        return Err(StoreError::DiffParse("no hunks".into()));
    }
    let mut patched = diffy::apply(&original_lf, &patch).map_err(|e| StoreError::DiffApply(e.to_string()))?;
    if has_crlf {
        patched = patched.replace('\n', "\r\n");
    }
    Ok(patched)
}

pub fn is_dir_path(path: &str) -> bool {
    path.ends_with('/')
}

/// `path` with exactly one trailing `/`.
pub fn as_dir_path(path: &str) -> String {
    format!("{}/", path.trim_end_matches('/'))
}

pub(crate) fn check_absolute(path: &str) -> Result<(), StoreError> {
    if !path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(StoreError::InvalidPath(path.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diff_applies_and_keeps_crlf() {
        let original = "one\ntwo\nthree\n";
        let modified = "one\n2\nthree\n";
        let diff = diffy::create_patch(original, modified).to_string();
        assert_eq!(apply_diff_text(original, &diff).unwrap(), modified);

        let crlf = original.replace('\n', "\r\n");
        assert_eq!(
            apply_diff_text(&crlf, &diff).unwrap(),
            modified.replace('\n', "\r\n")
        );
    }

    #[test]
    fn mismatched_diff_fails() {
        let diff = diffy::create_patch("a\nb\n", "a\nc\n").to_string();
        assert!(matches!(
            apply_diff_text("x\ny\n", &diff),
            Err(StoreError::DiffApply(_))
        ));
        assert!(apply_diff_text("x\n", "not a diff").is_err());
    }

    #[test]
    fn path_helpers() {
        assert!(is_dir_path("/a/"));
        assert!(!is_dir_path("/a"));
        assert_eq!(as_dir_path("/a"), "/a/");
        assert_eq!(as_dir_path("/a//"), "/a/");
        assert_eq!(as_dir_path("/"), "/");
        assert!(check_absolute("/a/b").is_ok());
        assert!(check_absolute("a/b").is_err());
        assert!(check_absolute("/a/../b").is_err());
    }
}
