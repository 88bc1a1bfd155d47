use std::path::Path;

use async_trait::async_trait;

/// Failure reported by an [`ObjectStore`].
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    /// An object is already stored under this key.
    #[error("object '{0}' already exists")]
    AlreadyExists(String),

    /// The key is empty, absolute or escapes the store root.
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    /// Reading the local file or writing the object failed.
    #[error("io error for '{key}': {source}")]
    Io {
        /// Key being written.
        key: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable artifact storage.
///
/// Keys are `/`-separated relative paths, conventionally `{content_hash}/{name}`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `path` under `key` and return its public URL.
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Public URL an object stored under `key` is (or would be) reachable at.
    fn url_for(&self, key: &str) -> String;
}

/// Key for artifact `name` of the record identified by `content_hash`.
pub fn object_key(content_hash: &str, name: &str) -> String {
    format!("{content_hash}/{name}")
}

/// Reject keys that could address anything outside the store.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// MIME type for an object key, from its extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Upload `path` under `key`, treating an existing object as success.
///
/// Returns the object's URL, or `None` when the upload failed. Failures are logged here and never
/// propagated, so one artifact's upload does not affect another's.
pub async fn upload_or_existing(store: &dyn ObjectStore, key: &str, path: &Path) -> Option<String> {
    match store.put_file(key, path, content_type_for(key)).await {
        Ok(url) => {
            tracing::info!(key, url = %url, "uploaded artifact");
            Some(url)
        }
        Err(StorageError::AlreadyExists(_)) => {
            let url = store.url_for(key);
            tracing::info!(key, url = %url, "artifact already stored, reusing");
            Some(url)
        }
        Err(e) => {
            tracing::warn!(key, error = %e, "upload failed");
            None
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/storage/store.rs"]
mod tests;
