//! In-memory storage backend.
//!
//! Keeps everything in a `BTreeMap` behind a `RwLock`. Nothing is persisted;
//! use it for development servers and tests.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// Cloning shares the underlying map. Keys are kept sorted, so prefix scans
/// are a single `BTreeMap::range` walk.
///
/// # Examples
///
/// ```
/// # use keyhold_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("secrets/a", b"{}").await.unwrap();
/// let val = backend.get("secrets/a").await.unwrap();
/// assert_eq!(val, Some(b"{}".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.data
            .write()
            .await
            .insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.data.read().await.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_key_returns_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("secrets/nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let backend = MemoryBackend::new();
        backend.put("folders/a", b"v1").await.unwrap();
        backend.put("folders/a", b"v2").await.unwrap();
        assert_eq!(backend.get("folders/a").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn delete_missing_key_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete("logs/missing").await.unwrap();
        assert!(!backend.exists("logs/missing").await.unwrap());
    }

    #[tokio::test]
    async fn list_stops_at_prefix_boundary() {
        let backend = MemoryBackend::new();
        backend.put("secret_snapshots/1", b"s").await.unwrap();
        backend.put("secret_versions/1", b"a").await.unwrap();
        backend.put("secret_versions/2", b"b").await.unwrap();
        backend.put("secrets/1", b"c").await.unwrap();

        let keys = backend.list("secret_versions/").await.unwrap();
        assert_eq!(keys, vec!["secret_versions/1", "secret_versions/2"]);
    }

    #[tokio::test]
    async fn scan_returns_values_in_key_order() {
        let backend = MemoryBackend::new();
        backend.put("secrets/b", b"2").await.unwrap();
        backend.put("secrets/a", b"1").await.unwrap();
        backend.put("users/a", b"3").await.unwrap();

        let entries = backend.scan("secrets/").await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("secrets/a".to_owned(), b"1".to_vec()),
                ("secrets/b".to_owned(), b"2".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.put("key", b"val").await.unwrap();
        assert_eq!(clone.get("key").await.unwrap(), Some(b"val".to_vec()));
    }
}
