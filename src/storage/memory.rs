use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::storage::store::{ObjectStore, StorageError, validate_key};

/// One object held by [`InMemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredObject {
    /// Object bytes.
    pub bytes: Vec<u8>,
    /// Content type given at upload.
    pub content_type: String,
}

/// In-memory object store for tests and debugging.
#[derive(Debug)]
pub struct InMemoryStore {
    base_url: String,
    failing: HashSet<String>,
    objects: Mutex<BTreeMap<String, StoredObject>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new("memory://panoreel")
    }
}

impl InMemoryStore {
    /// Empty store whose URLs start with `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            failing: HashSet::new(),
            objects: Mutex::new(BTreeMap::new()),
        }
    }

    /// Make every upload to `key` fail with a backend error.
    pub fn failing(mut self, key: impl Into<String>) -> Self {
        self.failing.insert(key.into());
        self
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Stored object under `key`, if any.
    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(key).cloned()
    }

    /// Return `true` if an object is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn put_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<String, StorageError> {
        validate_key(key)?;
        if self.failing.contains(key) {
            return Err(StorageError::Backend(format!("scripted failure for '{key}'")));
        }
        let bytes = tokio::fs::read(path).await.map_err(|source| StorageError::Io {
            key: key.to_string(),
            source,
        })?;

        {
            let mut objects = self
                .objects
                .lock()
                .map_err(|_| StorageError::Backend("object map poisoned".to_string()))?;
            if objects.contains_key(key) {
                return Err(StorageError::AlreadyExists(key.to_string()));
            }
            objects.insert(
                key.to_string(),
                StoredObject {
                    bytes,
                    content_type: content_type.to_string(),
                },
            );
        }
        Ok(self.url_for(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.base_url.trim_end_matches('/'))
    }
}
