//! In-process object store.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{check_key, ObjectStore};
use crate::error::{StorageError, StorageResult};

/// Object store backed by a sorted map.
///
/// `set_available(false)` makes every call fail with
/// `StorageError::Unavailable`, which is how tests exercise the transient
/// failure path.
pub struct MemoryStore {
    name: String,
    objects: RwLock<BTreeMap<String, Vec<u8>>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate a store outage (or recovery).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn ensure_available(&self, operation: &'static str, key: &str) -> StorageResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable {
                operation,
                key: key.to_string(),
                message: "memory store marked unavailable".to_string(),
            })
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        self.ensure_available("list", prefix)?;
        let objects = self.objects.read().await;
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        check_key(key)?;
        self.ensure_available("get", key)?;
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()> {
        check_key(key)?;
        self.ensure_available("put", key)?;
        self.objects.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        check_key(src)?;
        check_key(dst)?;
        self.ensure_available("copy", src)?;
        let mut objects = self.objects.write().await;
        let bytes = objects
            .get(src)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                key: src.to_string(),
            })?;
        objects.insert(dst.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        check_key(key)?;
        self.ensure_available("delete", key)?;
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        check_key(key)?;
        self.ensure_available("exists", key)?;
        Ok(self.objects.read().await.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new("test");
        store.put("incoming/a.jpg", vec![1, 2, 3]).await.unwrap();
        assert_eq!(store.get("incoming/a.jpg").await.unwrap(), vec![1, 2, 3]);
        assert!(store.exists("incoming/a.jpg").await.unwrap());

        store.delete("incoming/a.jpg").await.unwrap();
        assert!(!store.exists("incoming/a.jpg").await.unwrap());
        // Deleting again is fine
        store.delete("incoming/a.jpg").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MemoryStore::new("test");
        let err = store.get("canonical/nope.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = MemoryStore::new("test");
        store.put("incoming/a.jpg", vec![]).await.unwrap();
        store.put("incoming/b.jpg", vec![]).await.unwrap();
        store.put("canonical/c.jpg", vec![]).await.unwrap();
        store.put("incomingx/d.jpg", vec![]).await.unwrap();

        let keys = store.list("incoming/").await.unwrap();
        assert_eq!(keys, vec!["incoming/a.jpg", "incoming/b.jpg"]);
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let store = MemoryStore::new("test");
        let err = store
            .copy("incoming/a.jpg", "canonical/a.jpg")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unavailable_is_transient() {
        let store = MemoryStore::new("test");
        store.set_available(false);
        let err = store.exists("incoming/a.jpg").await.unwrap_err();
        assert!(err.is_transient());

        store.set_available(true);
        assert!(!store.exists("incoming/a.jpg").await.unwrap());
    }
}
