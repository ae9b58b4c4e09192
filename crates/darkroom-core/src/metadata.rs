//! Per-object metadata records consumed by the labeling workflow.
//!
//! Records are keyed by file name. Each carries a `filename_stem`, the part
//! of the file name before its first `.`, which the store recomputes on every
//! write. For objects named by the ingest stage the stem happens to equal the
//! content hash, but nothing keeps the two in sync: after a rename the stem
//! follows the new name while the bytes (and their digest) do not change.
//! Never treat `filename_stem` as a verified digest.

use async_trait::async_trait;
use rand::seq::IteratorRandom;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::{MetadataError, MetadataResult};

/// Text before the first `.` of `file_name`.
pub fn filename_stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// One labeled (or not yet labeled) canonical object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: u64,

    pub file_name: String,

    /// Label assigned by a human reviewer; `None` while unclassified
    pub human_label: Option<bool>,

    /// Label assigned by an automated classifier
    pub predicted_label: Option<bool>,

    /// Derived from `file_name`, not from content
    pub filename_stem: String,
}

impl MetadataRecord {
    pub fn is_classified(&self) -> bool {
        self.human_label.is_some()
    }
}

/// Record store contract.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record for `file_name`, or return the existing one.
    async fn upsert(&self, file_name: &str) -> MetadataResult<MetadataRecord>;

    async fn get(&self, file_name: &str) -> MetadataResult<MetadataRecord>;

    /// Up to `limit` random records without a human label.
    async fn random_unclassified(&self, limit: usize) -> MetadataResult<Vec<MetadataRecord>>;

    /// Up to `limit` random records with a human label.
    async fn random_classified(&self, limit: usize) -> MetadataResult<Vec<MetadataRecord>>;

    /// Set the human label. Fails with `NotFound` if no record matches.
    async fn set_classification(&self, file_name: &str, label: bool) -> MetadataResult<()>;

    async fn set_prediction(&self, file_name: &str, label: bool) -> MetadataResult<()>;

    /// Move a record to a new file name, recomputing its stem.
    async fn rename(&self, from: &str, to: &str) -> MetadataResult<MetadataRecord>;
}

/// In-process [`MetadataStore`].
#[derive(Default)]
pub struct MemoryMetadataStore {
    inner: RwLock<Records>,
}

#[derive(Default)]
struct Records {
    next_id: u64,
    by_name: BTreeMap<String, MetadataRecord>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sample(
        records: &BTreeMap<String, MetadataRecord>,
        limit: usize,
        classified: bool,
    ) -> Vec<MetadataRecord> {
        let mut rng = rand::thread_rng();
        records
            .values()
            .filter(|r| r.is_classified() == classified)
            .cloned()
            .choose_multiple(&mut rng, limit)
    }
}

fn check_file_name(file_name: &str) -> MetadataResult<()> {
    if file_name.is_empty() || file_name.contains('/') {
        return Err(MetadataError::InvalidFileName(file_name.to_string()));
    }
    Ok(())
}

fn not_found(file_name: &str) -> MetadataError {
    MetadataError::NotFound {
        file_name: file_name.to_string(),
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn upsert(&self, file_name: &str) -> MetadataResult<MetadataRecord> {
        check_file_name(file_name)?;
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.by_name.get(file_name) {
            return Ok(existing.clone());
        }

        inner.next_id += 1;
        let record = MetadataRecord {
            id: inner.next_id,
            file_name: file_name.to_string(),
            human_label: None,
            predicted_label: None,
            filename_stem: filename_stem(file_name).to_string(),
        };
        inner.by_name.insert(file_name.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, file_name: &str) -> MetadataResult<MetadataRecord> {
        self.inner
            .read()
            .await
            .by_name
            .get(file_name)
            .cloned()
            .ok_or_else(|| not_found(file_name))
    }

    async fn random_unclassified(&self, limit: usize) -> MetadataResult<Vec<MetadataRecord>> {
        let inner = self.inner.read().await;
        Ok(Self::sample(&inner.by_name, limit, false))
    }

    async fn random_classified(&self, limit: usize) -> MetadataResult<Vec<MetadataRecord>> {
        let inner = self.inner.read().await;
        Ok(Self::sample(&inner.by_name, limit, true))
    }

    async fn set_classification(&self, file_name: &str, label: bool) -> MetadataResult<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .by_name
            .get_mut(file_name)
            .ok_or_else(|| not_found(file_name))?;
        record.human_label = Some(label);
        tracing::debug!("metadata: {} labeled {}", file_name, label);
        Ok(())
    }

    async fn set_prediction(&self, file_name: &str, label: bool) -> MetadataResult<()> {
        let mut inner = self.inner.write().await;
        let record = inner
            .by_name
            .get_mut(file_name)
            .ok_or_else(|| not_found(file_name))?;
        record.predicted_label = Some(label);
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> MetadataResult<MetadataRecord> {
        check_file_name(to)?;
        let mut inner = self.inner.write().await;
        if inner.by_name.contains_key(to) {
            return Err(MetadataError::InvalidFileName(format!("{to} already exists")));
        }
        let mut record = inner.by_name.remove(from).ok_or_else(|| not_found(from))?;
        record.file_name = to.to_string();
        record.filename_stem = filename_stem(to).to_string();
        inner.by_name.insert(to.to_string(), record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Hasher;

    #[test]
    fn test_filename_stem() {
        assert_eq!(filename_stem("abc123.jpg"), "abc123");
        assert_eq!(filename_stem("archive.tar.gz"), "archive");
        assert_eq!(filename_stem("noext"), "noext");
        assert_eq!(filename_stem(".hidden"), "");
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let store = MemoryMetadataStore::new();
        let first = store.upsert("abc.jpg").await.unwrap();
        let second = store.upsert("abc.jpg").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.filename_stem, "abc");
        assert!(!first.is_classified());
    }

    #[tokio::test]
    async fn test_classification_requires_record() {
        let store = MemoryMetadataStore::new();
        let err = store.set_classification("missing.jpg", true).await.unwrap_err();
        assert_eq!(
            err,
            MetadataError::NotFound {
                file_name: "missing.jpg".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_random_sampling_partitions() {
        let store = MemoryMetadataStore::new();
        for i in 0..10 {
            store.upsert(&format!("{i}.jpg")).await.unwrap();
        }
        for i in 0..3 {
            store.set_classification(&format!("{i}.jpg"), i % 2 == 0).await.unwrap();
        }

        let unclassified = store.random_unclassified(100).await.unwrap();
        assert_eq!(unclassified.len(), 7);
        assert!(unclassified.iter().all(|r| r.human_label.is_none()));

        let classified = store.random_classified(2).await.unwrap();
        assert_eq!(classified.len(), 2);
        assert!(classified.iter().all(|r| r.is_classified()));
    }

    #[tokio::test]
    async fn test_prediction_does_not_classify() {
        let store = MemoryMetadataStore::new();
        store.upsert("a.png").await.unwrap();
        store.set_prediction("a.png", true).await.unwrap();
        assert_eq!(store.random_unclassified(5).await.unwrap().len(), 1);
        assert_eq!(store.get("a.png").await.unwrap().predicted_label, Some(true));
    }

    #[tokio::test]
    async fn test_rename_diverges_from_content_hash() {
        let bytes = b"image bytes";
        let digest = Hasher::md5_hex(bytes);
        let store = MemoryMetadataStore::new();

        let record = store.upsert(&format!("{digest}.jpg")).await.unwrap();
        assert_eq!(record.filename_stem, digest);

        let renamed = store.rename(&record.file_name, "holiday.jpg").await.unwrap();
        assert_eq!(renamed.id, record.id);
        assert_eq!(renamed.filename_stem, "holiday");
        assert_ne!(renamed.filename_stem, Hasher::md5_hex(bytes));
        assert!(store.get(&record.file_name).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let store = MemoryMetadataStore::new();
        assert!(matches!(
            store.upsert("canonical/abc.jpg").await,
            Err(MetadataError::InvalidFileName(_))
        ));
    }
}
