use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::storage::store::{ObjectStore, StorageError, validate_key};

/// Object store backed by a directory tree.
///
/// Objects live at `root/<key>`; URLs are `base_url/<key>`, for whatever serves `root`.
#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    root: PathBuf,
    base_url: String,
    overwrite: bool,
}

impl LocalObjectStore {
    /// Store rooted at `root`. Existing objects are never replaced.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
            overwrite: false,
        }
    }

    /// Replace existing objects instead of reporting [`StorageError::AlreadyExists`].
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        let io = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let dest = self.path_for(key);
        if !self.overwrite && tokio::fs::try_exists(&dest).await.map_err(io)? {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io)?;
        }
        let bytes = tokio::fs::copy(path, &dest).await.map_err(io)?;
        tracing::debug!(key, bytes, content_type, dest = %dest.display(), "stored object");
        Ok(self.url_for(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url.trim_end_matches('/'))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/local.rs"]
mod tests;
