//! Content-addressed ingestion from `incoming` into `canonical`.
//!
//! Relocation is copy-then-delete. Both steps are individually idempotent, so
//! a crash between them leaves the upload in place and the next delivery
//! finds the canonical copy and removes the upload as a duplicate.

use std::sync::Arc;

use super::hash::Hasher;
use super::validate::{extension_of, guard_write, Admission};
use crate::config::{Config, HashAlgorithm};
use crate::error::PipelineResult;
use crate::storage::ObjectStore;
use crate::types::{Namespace, ObjectEvent, ObjectRef, ProcessingReport, ProcessingStatus, Stage};

/// Deduplicating gate between uploads and the canonical namespace.
pub struct IngestGate {
    store: Arc<dyn ObjectStore>,
    admission: Admission,
    hash_algorithm: HashAlgorithm,
}

impl IngestGate {
    pub fn new(config: &Config, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            admission: Admission::new(
                Stage::Ingest,
                store.name(),
                &config.ingest.allowed_extensions,
            ),
            hash_algorithm: config.ingest.hash_algorithm,
            store,
        }
    }

    /// Canonical location for content with digest `hash` uploaded as `file_name`.
    pub fn canonical_ref(hash: &str, file_name: &str) -> ObjectRef {
        let ext = extension_of(file_name).unwrap_or_default();
        ObjectRef::new(Namespace::Canonical, format!("{hash}{ext}"))
    }

    /// Ingest the upload named by `event`.
    pub async fn ingest(&self, event: &ObjectEvent) -> PipelineResult<ProcessingReport> {
        let source = match self.admission.admit(event) {
            Ok(obj) => obj,
            Err(ProcessingStatus::SkippedInvalidExtension) => {
                let key = event.object().key();
                self.store.delete(&key).await?;
                tracing::warn!("ingest: deleted {} (extension not allowed)", key);
                return Ok(ProcessingReport::skipped(
                    Stage::Ingest,
                    key,
                    ProcessingStatus::SkippedInvalidExtension,
                ));
            }
            Err(status) => {
                tracing::debug!("ingest: skipping {}/{} ({:?})", event.namespace, event.key, status);
                return Ok(ProcessingReport::skipped(
                    Stage::Ingest,
                    event.object().key(),
                    status,
                ));
            }
        };
        let source_key = source.key();

        let bytes = match self.store.get(&source_key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                // Redelivery after an earlier run already relocated it
                tracing::debug!("ingest: {} already gone", source_key);
                return Ok(ProcessingReport::skipped(
                    Stage::Ingest,
                    source_key,
                    ProcessingStatus::SkippedMissing,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let hash = Hasher::content_hash(self.hash_algorithm, &bytes);
        let canonical = Self::canonical_ref(&hash, source.file_name());
        guard_write(Stage::Ingest, &canonical)?;
        let canonical_key = canonical.key();

        let status = if self.store.exists(&canonical_key).await? {
            self.store.delete(&source_key).await?;
            tracing::info!("ingest: {} duplicates {}, removed", source_key, canonical_key);
            ProcessingStatus::DuplicateRemoved
        } else {
            match self.store.copy(&source_key, &canonical_key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    tracing::debug!("ingest: {} vanished before copy", source_key);
                    return Ok(ProcessingReport::skipped(
                        Stage::Ingest,
                        source_key,
                        ProcessingStatus::SkippedMissing,
                    ));
                }
                Err(e) => return Err(e.into()),
            }
            self.store.delete(&source_key).await?;
            tracing::info!("ingest: {} -> {}", source_key, canonical_key);
            ProcessingStatus::Processed
        };

        Ok(ProcessingReport {
            stage: Stage::Ingest,
            source_key,
            status,
            target_key: Some(canonical_key),
            content_hash: Some(hash),
        })
    }
}
