//! Directory-backed object store.
//!
//! Each key maps to `root/<key>`. Writes go to a hidden temp file in the
//! destination directory and are renamed into place, so a concurrent reader
//! sees either the old bytes or the new bytes, never a torn file.

use async_trait::async_trait;
use rand::Rng;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::{check_key, ObjectStore};
use crate::error::{StorageError, StorageResult};

/// Prefix of in-flight temp files; never listed.
const TEMP_PREFIX: &str = ".darkroom-tmp-";

/// Object store rooted at a local directory.
pub struct FsStore {
    name: String,
    root: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub async fn open(name: impl Into<String>, root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::Io {
                key: root.display().to_string(),
                source,
            })?;
        Ok(Self {
            name: name.into(),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        check_key(key)?;
        Ok(self.root.join(key))
    }

    async fn write_atomic(&self, key: &str, bytes: &[u8]) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let io_err = |source| StorageError::Io {
            key: key.to_string(),
            source,
        };

        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;

        let suffix: u64 = rand::thread_rng().gen();
        let tmp = parent.join(format!("{TEMP_PREFIX}{suffix:016x}"));
        if let Err(e) = tokio::fs::write(&tmp, bytes).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(io_err(e));
        }
        Ok(())
    }
}

/// Map an I/O error on `key` into the storage taxonomy.
fn map_io(key: &str, source: std::io::Error) -> StorageError {
    if source.kind() == ErrorKind::NotFound {
        StorageError::NotFound {
            key: key.to_string(),
        }
    } else {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Walk `root/<dir part of prefix>` and return matching keys, sorted.
fn list_sync(root: &Path, prefix: &str) -> Vec<String> {
    let dir_part = match prefix.rfind('/') {
        Some(idx) => &prefix[..idx],
        None => "",
    };
    let start = root.join(dir_part);
    if !start.is_dir() {
        return Vec::new();
    }

    let mut keys: Vec<String> = WalkDir::new(&start)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| {
            !e.file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(TEMP_PREFIX))
        })
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?;
            let parts: Vec<&str> = rel.iter().filter_map(|c| c.to_str()).collect();
            Some(parts.join("/"))
        })
        .filter(|key| key.starts_with(prefix))
        .collect();
    keys.sort();
    keys
}

#[async_trait]
impl ObjectStore for FsStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let root = self.root.clone();
        let prefix_owned = prefix.to_string();
        tokio::task::spawn_blocking(move || list_sync(&root, &prefix_owned))
            .await
            .map_err(|e| StorageError::Unavailable {
                operation: "list",
                key: prefix.to_string(),
                message: format!("Task join error: {e}"),
            })
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.path_for(key)?;
        tokio::fs::read(&path).await.map_err(|e| map_io(key, e))
    }

    async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()> {
        self.write_atomic(key, &bytes).await
    }

    async fn copy(&self, src: &str, dst: &str) -> StorageResult<()> {
        let bytes = self.get(src).await?;
        self.write_atomic(dst, &bytes).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(key, e)),
        }
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(map_io(key, e)),
        }
    }
}
