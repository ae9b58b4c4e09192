//! Darkroom Core - content-addressed image ingestion library.
//!
//! Uploads land in `incoming/`, are deduplicated by content hash into
//! `canonical/`, and every canonical image fans out to two independent
//! derivers: a grayscale variant in `derived-mono/` and a fixed-size float
//! tensor in `derived-tensor/`.
//!
//! # Architecture
//!
//! Stages are driven by object-created notifications that may arrive more
//! than once, so every stage is idempotent and re-entrant:
//!
//! ```text
//! upload -> incoming/ -> IngestGate -> canonical/ -+-> Transcoder -> derived-mono/
//!                                                 +-> Tensorizer -> derived-tensor/
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use darkroom_core::{Config, Darkroom};
//!
//! #[tokio::main]
//! async fn main() -> darkroom_core::Result<()> {
//!     let darkroom = Darkroom::new(Config::load()?).await?;
//!     let event = darkroom.upload("photo.jpg", std::fs::read("photo.jpg")?).await?;
//!     let outcomes = darkroom.route(vec![event], false).await;
//!     println!("{} outcomes", outcomes.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{
    ConfigError, DarkroomError, MetadataError, PipelineError, PipelineResult, Result, StorageError,
};
pub use events::{parse_events, EventBatch};
pub use metadata::{MemoryMetadataStore, MetadataRecord, MetadataStore};
pub use output::{ReportFormat, ReportWriter};
pub use pipeline::{LocalRouter, Pipeline};
pub use storage::{FsStore, MemoryStore, ObjectStore};
pub use types::{
    BatchSummary, EventOutcome, Namespace, ObjectEvent, ObjectRef, ProcessingReport,
    ProcessingStatus, Stage,
};

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A configured pipeline bound to one object store.
pub struct Darkroom {
    config: Config,
    store: Arc<dyn ObjectStore>,
    pipeline: Arc<Pipeline>,
}

impl Darkroom {
    /// Open the filesystem store at `config.store_root()` and build the stages.
    pub async fn new(config: Config) -> Result<Self> {
        let root = config.store_root();
        tracing::debug!("Opening store '{}' at {}", config.store.name, root.display());
        let store = FsStore::open(config.store.name.clone(), root).await?;
        Self::with_store(config, Arc::new(store))
    }

    /// Build the stages against an already constructed store.
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>) -> Result<Self> {
        if store.name() != config.store.name {
            tracing::warn!(
                "Store name '{}' differs from configured '{}'; events are matched against the store",
                store.name(),
                config.store.name
            );
        }
        let pipeline = Arc::new(Pipeline::new(&config, Arc::clone(&store))?);
        Ok(Self {
            config,
            store,
            pipeline,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn pipeline(&self) -> &Arc<Pipeline> {
        &self.pipeline
    }

    /// Put `bytes` into `incoming/<file_name>` and return the notification
    /// the store would emit for it.
    pub async fn upload(&self, file_name: &str, bytes: Vec<u8>) -> Result<ObjectEvent> {
        if file_name.is_empty() || file_name.contains('/') {
            return Err(StorageError::InvalidKey(file_name.to_string()).into());
        }
        let object = ObjectRef::new(Namespace::Incoming, file_name);
        self.store.put(&object.key(), bytes).await?;
        tracing::info!("Uploaded {}", object);
        Ok(ObjectEvent::new(self.store.name(), &object))
    }

    /// Handle exactly the given notifications, without following creations.
    pub async fn handle(&self, events: &[ObjectEvent]) -> Vec<EventOutcome> {
        self.pipeline.handle_batch(events).await
    }

    /// Handle the notifications and everything they transitively create.
    pub async fn route(&self, seed: Vec<ObjectEvent>, redeliver: bool) -> Vec<EventOutcome> {
        LocalRouter::new(
            Arc::clone(&self.pipeline),
            self.config.pipeline.parallel_workers,
        )
        .with_redelivery(redeliver)
        .run(seed)
        .await
    }

    /// Synthesize notifications for everything currently in `namespace`, so
    /// a sweep can catch up on missed deliveries.
    pub async fn pending(&self, namespace: Namespace) -> Result<Vec<ObjectEvent>> {
        let keys = self.store.list(&namespace.prefix()).await?;
        Ok(keys
            .iter()
            .filter_map(|key| ObjectRef::parse(key))
            .map(|object| ObjectEvent::new(self.store.name(), &object))
            .collect())
    }

    /// Start a listener task: notifications sent on the returned sender are
    /// handled as they arrive and their outcomes delivered on the receiver.
    pub fn listen(
        &self,
    ) -> (
        mpsc::Sender<ObjectEvent>,
        mpsc::Receiver<EventOutcome>,
        JoinHandle<()>,
    ) {
        let (event_tx, event_rx) = pipeline::bounded_channel(&self.config.pipeline);
        let (outcome_tx, outcome_rx) = pipeline::bounded_channel(&self.config.pipeline);
        let stage = pipeline::EventStage::new(
            event_rx,
            outcome_tx,
            self.config.pipeline.parallel_workers,
        );
        let handle = tokio::spawn(stage.run(Arc::clone(&self.pipeline)));
        (event_tx, outcome_rx, handle)
    }
}
