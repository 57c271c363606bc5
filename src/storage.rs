//! Blob-storage seam for company logos, profile photos and contract
//! documents. The hosted bucket sits behind [`ObjectStorage`]; the engine
//! only ever deals in opaque public urls.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("object {0} not found")]
    NotFound(String),
    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the bytes under `path` and return a stable public url.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError>;

    /// Remove the object a previous upload returned the url for.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

const MEMORY_SCHEME: &str = "memory://";

/// In-memory bucket for the dev server and tests.
#[derive(Debug, Default)]
pub struct MemoryObjectStorage {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, url: &str) -> bool {
        let Some(path) = url.strip_prefix(MEMORY_SCHEME) else {
            return false;
        };
        self.objects
            .lock()
            .map(|objects| objects.contains_key(path))
            .unwrap_or(false)
    }
}

#[async_trait]
impl ObjectStorage for MemoryObjectStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("bucket mutex poisoned".to_string()))?;
        objects.insert(path.to_string(), bytes);
        Ok(format!("{MEMORY_SCHEME}{path}"))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = url
            .strip_prefix(MEMORY_SCHEME)
            .ok_or_else(|| StorageError::NotFound(url.to_string()))?;
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| StorageError::Unavailable("bucket mutex poisoned".to_string()))?;
        objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_returns_a_resolvable_url() {
        let bucket = MemoryObjectStorage::new();
        let url = bucket
            .upload("companies/c1/logo.png", vec![1, 2, 3])
            .await
            .expect("upload");
        assert!(bucket.contains(&url));
        bucket.delete(&url).await.expect("delete");
        assert!(!bucket.contains(&url));
    }

    #[tokio::test]
    async fn deleting_unknown_objects_is_reported() {
        let bucket = MemoryObjectStorage::new();
        let err = bucket.delete("memory://missing.png").await.expect_err("missing");
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
