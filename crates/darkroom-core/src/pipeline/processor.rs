//! Pipeline orchestration - routes each notification to the stages watching
//! its namespace.

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;

use super::codec::{ImageCodec, StandardCodec};
use super::ingest::IngestGate;
use super::tensor::Tensorizer;
use super::transcode::Transcoder;
use crate::config::Config;
use crate::error::PipelineResult;
use crate::storage::ObjectStore;
use crate::types::{EventOutcome, Namespace, ObjectEvent, ProcessingReport, Stage};

/// All three stages sharing one injected store.
pub struct Pipeline {
    store: Arc<dyn ObjectStore>,
    ingest: IngestGate,
    transcoder: Transcoder,
    tensorizer: Tensorizer,
    parallel_workers: usize,
}

impl Pipeline {
    /// Build the stages with the default `image`-backed codec.
    pub fn new(config: &Config, store: Arc<dyn ObjectStore>) -> PipelineResult<Self> {
        Self::with_codec(config, store, Arc::new(StandardCodec))
    }

    pub fn with_codec(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        codec: Arc<dyn ImageCodec>,
    ) -> PipelineResult<Self> {
        Ok(Self {
            ingest: IngestGate::new(config, Arc::clone(&store)),
            transcoder: Transcoder::new(config, Arc::clone(&store), Arc::clone(&codec))?,
            tensorizer: Tensorizer::new(config, Arc::clone(&store), codec)?,
            parallel_workers: config.pipeline.parallel_workers.max(1),
            store,
        })
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn ingest_gate(&self) -> &IngestGate {
        &self.ingest
    }

    pub fn transcoder(&self) -> &Transcoder {
        &self.transcoder
    }

    pub fn tensorizer(&self) -> &Tensorizer {
        &self.tensorizer
    }

    /// Stages triggered by creations in `namespace`.
    pub fn stages_watching(namespace: Namespace) -> &'static [Stage] {
        match namespace {
            Namespace::Incoming => &[Stage::Ingest],
            Namespace::Canonical => &[Stage::Transcode, Stage::Tensorize],
            Namespace::DerivedMono | Namespace::DerivedTensor => &[],
        }
    }

    /// Run one stage on one event, folding errors into an outcome.
    pub async fn run_stage(&self, stage: Stage, event: &ObjectEvent) -> EventOutcome {
        let result = match stage {
            Stage::Ingest => self.ingest.ingest(event).await,
            Stage::Transcode => self.transcoder.derive_grayscale(event).await,
            Stage::Tensorize => self.tensorizer.derive_tensor(event).await,
        };
        Self::outcome(stage, event, result)
    }

    fn outcome(
        stage: Stage,
        event: &ObjectEvent,
        result: PipelineResult<ProcessingReport>,
    ) -> EventOutcome {
        match result {
            Ok(report) => EventOutcome::Report(report),
            Err(e) => {
                let retryable = e.is_retryable();
                tracing::error!(
                    "{} failed for {}/{}: {} (retryable: {})",
                    stage,
                    event.namespace,
                    event.key,
                    e,
                    retryable
                );
                EventOutcome::Failed {
                    stage,
                    source_key: event.object().key(),
                    error: e.to_string(),
                    retryable,
                }
            }
        }
    }

    /// Handle one notification. Canonical objects fan out to both derivers
    /// concurrently; namespaces nobody watches produce no outcomes.
    pub async fn handle(&self, event: &ObjectEvent) -> Vec<EventOutcome> {
        match event.namespace {
            Namespace::Incoming => vec![self.run_stage(Stage::Ingest, event).await],
            Namespace::Canonical => {
                let (mono, tensor) = tokio::join!(
                    self.run_stage(Stage::Transcode, event),
                    self.run_stage(Stage::Tensorize, event)
                );
                vec![mono, tensor]
            }
            other => {
                tracing::debug!("no stage watches {}, ignoring {}", other, event.key);
                Vec::new()
            }
        }
    }

    /// Handle a batch with up to `parallel_workers` events in flight.
    ///
    /// Events are independent; outcomes come back in completion order.
    pub async fn handle_batch(&self, events: &[ObjectEvent]) -> Vec<EventOutcome> {
        stream::iter(events)
            .map(|event| self.handle(event))
            .buffer_unordered(self.parallel_workers)
            .flat_map(stream::iter)
            .collect()
            .await
    }
}
