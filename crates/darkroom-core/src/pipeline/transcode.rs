//! Grayscale variant generation.

use image::ImageFormat;
use std::sync::Arc;

use super::codec::{format_for_extension, ImageCodec};
use super::decode::ImageDecoder;
use super::validate::{extension_of, guard_write, strip_extension, Admission, Validator};
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult};
use crate::storage::ObjectStore;
use crate::types::{Namespace, ObjectEvent, ObjectRef, ProcessingReport, ProcessingStatus, Stage};

/// Derives single-channel variants of canonical objects into `derived-mono`.
pub struct Transcoder {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn ImageCodec>,
    admission: Admission,
    validator: Validator,
    decoder: ImageDecoder,
    marker: String,
    fallback_format: ImageFormat,
}

impl Transcoder {
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        codec: Arc<dyn ImageCodec>,
    ) -> PipelineResult<Self> {
        let fallback_format = ImageFormat::from_extension(&config.transcode.fallback_format)
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "unknown fallback format '{}'",
                    config.transcode.fallback_format
                ))
            })?;
        Ok(Self {
            admission: Admission::new(
                Stage::Transcode,
                store.name(),
                &config.ingest.allowed_extensions,
            )
            .with_marker(config.transcode.marker.clone()),
            validator: Validator::new(config.limits.clone()),
            decoder: ImageDecoder::new(Arc::clone(&codec), config.limits.clone()),
            marker: config.transcode.marker.clone(),
            fallback_format,
            store,
            codec,
        })
    }

    /// `canonical/<base>.<ext>` -> `derived-mono/<base><marker>.<ext>`.
    pub fn mono_key(&self, source: &ObjectRef) -> ObjectRef {
        let base = strip_extension(&source.name);
        let name = match extension_of(source.file_name()) {
            Some(ext) => format!("{base}{}{ext}", self.marker),
            None => format!("{base}{}", self.marker),
        };
        ObjectRef::new(Namespace::DerivedMono, name)
    }

    /// Derive and store the grayscale variant of the canonical object in `event`.
    pub async fn derive_grayscale(&self, event: &ObjectEvent) -> PipelineResult<ProcessingReport> {
        let source = match self.admission.admit(event) {
            Ok(obj) => obj,
            Err(status) => {
                if status == ProcessingStatus::SkippedAlreadyProcessed {
                    tracing::info!("transcode: skipping already processed {}", event.key);
                } else {
                    tracing::debug!(
                        "transcode: skipping {}/{} ({:?})",
                        event.namespace,
                        event.key,
                        status
                    );
                }
                return Ok(ProcessingReport::skipped(
                    Stage::Transcode,
                    event.object().key(),
                    status,
                ));
            }
        };
        let source_key = source.key();

        let target = self.mono_key(&source);
        guard_write(Stage::Transcode, &target)?;

        let bytes = match self.store.get(&source_key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                tracing::warn!("transcode: {} not found, skipping", source_key);
                return Ok(ProcessingReport::skipped(
                    Stage::Transcode,
                    source_key,
                    ProcessingStatus::SkippedMissing,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let encoded = self.convert(bytes, &source_key).await.inspect_err(|e| {
            tracing::error!("transcode: failed for {}: {}", source_key, e);
        })?;

        let target_key = target.key();
        self.store.put(&target_key, encoded).await?;
        tracing::info!("transcode: {} -> {}", source_key, target_key);

        Ok(ProcessingReport {
            stage: Stage::Transcode,
            source_key,
            status: ProcessingStatus::Processed,
            target_key: Some(target_key),
            content_hash: None,
        })
    }

    /// Decode, convert to luma, re-encode in the source container.
    async fn convert(&self, bytes: Vec<u8>, key: &str) -> PipelineResult<Vec<u8>> {
        self.validator.validate(key, &bytes)?;
        let decoded = self.decoder.decode(bytes, key).await?;
        let format = decoded
            .format
            .or_else(|| extension_of(key).and_then(|ext| format_for_extension(&ext)))
            .unwrap_or(self.fallback_format);

        let codec = Arc::clone(&self.codec);
        let key_owned = key.to_string();
        tokio::task::spawn_blocking(move || {
            let mono = codec
                .convert_channels(&decoded.image, 1)
                .map_err(|e| PipelineError::Decode {
                    key: key_owned.clone(),
                    message: e.to_string(),
                })?;
            codec
                .encode(&mono, format)
                .map_err(|e| PipelineError::Encode {
                    key: key_owned,
                    message: e.to_string(),
                })
        })
        .await
        .map_err(|e| PipelineError::Encode {
            key: key.to_string(),
            message: format!("Task join error: {e}"),
        })?
    }
}
