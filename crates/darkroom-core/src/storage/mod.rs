//! Object store abstraction.
//!
//! Every stage receives its store as an explicitly constructed
//! `Arc<dyn ObjectStore>`; there is no ambient client. Keys are full
//! `namespace/name` strings (see [`crate::types::ObjectRef::key`]).
//!
//! Backends:
//! - **memory**: in-process map, used by tests and embedders
//! - **fs**: directory tree on local disk, used by the CLI

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::StorageResult;

/// Durable key/value blob store organized by namespace prefixes.
///
/// Uses `async_trait` because the pipeline holds stores as
/// `Arc<dyn ObjectStore>`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store identity, compared against the `store` field of incoming events.
    fn name(&self) -> &str;

    /// List every key starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Fetch the full contents of `key`. Missing keys are `StorageError::NotFound`.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Create or replace `key`. Readers never observe a partial write.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()>;

    /// Copy `src` to `dst`, replacing `dst` if present.
    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()>;

    /// Remove `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Reject keys that could escape a namespace or address nothing.
pub(crate) fn check_key(key: &str) -> StorageResult<()> {
    use crate::error::StorageError;

    if key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg == ".." || seg == ".")
    {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_key_accepts_nested() {
        assert!(check_key("incoming/2024/photo.jpg").is_ok());
    }

    #[test]
    fn test_check_key_rejects_traversal() {
        assert!(check_key("incoming/../etc/passwd").is_err());
        assert!(check_key("/canonical/a.png").is_err());
        assert!(check_key("").is_err());
        assert!(check_key("incoming\\a.png").is_err());
    }
}
