//! Core data types for the Darkroom pipeline.
//!
//! These types describe where objects live, the notifications that move them
//! between stages, and the per-object reports each stage produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A storage namespace. Each stage watches exactly one and owns at most one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Namespace {
    /// Raw user uploads, arbitrary filenames
    Incoming,
    /// Deduplicated uploads named by content hash
    Canonical,
    /// Grayscale variants of canonical objects
    DerivedMono,
    /// Normalized float tensors of canonical objects
    DerivedTensor,
}

impl Namespace {
    pub const ALL: [Namespace; 4] = [
        Namespace::Incoming,
        Namespace::Canonical,
        Namespace::DerivedMono,
        Namespace::DerivedTensor,
    ];

    /// Directory-style prefix used in store keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Incoming => "incoming",
            Namespace::Canonical => "canonical",
            Namespace::DerivedMono => "derived-mono",
            Namespace::DerivedTensor => "derived-tensor",
        }
    }

    /// Prefix suitable for `ObjectStore::list`.
    pub fn prefix(&self) -> String {
        format!("{}/", self.as_str())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| format!("unknown namespace '{s}'"))
    }
}

/// Location of an object: namespace plus the name within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub namespace: Namespace,
    /// Path-like key, unique within the namespace
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: Namespace, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Parse a full store key such as `canonical/abc.png`.
    pub fn parse(key: &str) -> Option<Self> {
        let (ns, name) = key.split_once('/')?;
        let namespace = ns.parse().ok()?;
        Some(Self::new(namespace, name))
    }

    /// Full store key, `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Last path segment of the name.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }

    /// Folder markers are zero-byte keys ending in `/`.
    pub fn is_folder_marker(&self) -> bool {
        self.name.is_empty() || self.name.ends_with('/')
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One "object created" notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEvent {
    /// Identity of the store the object was created in
    pub store: String,
    /// Namespace the object landed in
    pub namespace: Namespace,
    /// Name within the namespace
    pub key: String,
}

impl ObjectEvent {
    pub fn new(store: impl Into<String>, object: &ObjectRef) -> Self {
        Self {
            store: store.into(),
            namespace: object.namespace,
            key: object.name.clone(),
        }
    }

    pub fn object(&self) -> ObjectRef {
        ObjectRef::new(self.namespace, self.key.clone())
    }
}

/// Pipeline stage names, used in reports and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    Transcode,
    Tensorize,
}

impl Stage {
    /// Namespace whose creations trigger this stage.
    pub fn watches(&self) -> Namespace {
        match self {
            Stage::Ingest => Namespace::Incoming,
            Stage::Transcode | Stage::Tensorize => Namespace::Canonical,
        }
    }

    /// Namespace this stage writes into.
    pub fn owns(&self) -> Namespace {
        match self {
            Stage::Ingest => Namespace::Canonical,
            Stage::Transcode => Namespace::DerivedMono,
            Stage::Tensorize => Namespace::DerivedTensor,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Ingest => f.write_str("ingest"),
            Stage::Transcode => f.write_str("transcode"),
            Stage::Tensorize => f.write_str("tensorize"),
        }
    }
}

/// Outcome of one stage on one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Artifact written (or object relocated into canonical)
    Processed,
    /// Content already canonical; the redundant upload was removed
    DuplicateRemoved,
    /// Extension outside the allow-list
    SkippedInvalidExtension,
    /// Input already carries this stage's derived marker
    SkippedAlreadyProcessed,
    /// Event for a namespace this stage does not watch
    SkippedWrongNamespace,
    /// Key is a folder marker
    SkippedFolder,
    /// Event from a different store
    SkippedForeignStore,
    /// Source vanished before the stage reached it
    SkippedMissing,
}

impl ProcessingStatus {
    pub fn is_skip(&self) -> bool {
        !matches!(
            self,
            ProcessingStatus::Processed | ProcessingStatus::DuplicateRemoved
        )
    }
}

/// Per-object summary returned by every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    /// Stage that produced this report
    pub stage: Stage,

    /// Full key of the object the event referred to
    pub source_key: String,

    pub status: ProcessingStatus,

    /// Key written or found (canonical key for ingest, derived key otherwise)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_key: Option<String>,

    /// Content hash, when the stage computed or derived one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
}

impl ProcessingReport {
    pub fn skipped(stage: Stage, source_key: impl Into<String>, status: ProcessingStatus) -> Self {
        Self {
            stage,
            source_key: source_key.into(),
            status,
            target_key: None,
            content_hash: None,
        }
    }

    /// The object this report created, if any, as a routable reference.
    pub fn created(&self) -> Option<ObjectRef> {
        if self.status != ProcessingStatus::Processed {
            return None;
        }
        self.target_key.as_deref().and_then(ObjectRef::parse)
    }
}

/// Result of handling one event: a report, or a fatal error with the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    Report(ProcessingReport),
    Failed {
        stage: Stage,
        source_key: String,
        error: String,
        retryable: bool,
    },
}

/// Aggregate counts over a batch of outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub processed: usize,
    pub duplicates_removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub retryable_failures: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[EventOutcome]) -> Self {
        let mut summary = Self::default();
        for outcome in outcomes {
            match outcome {
                EventOutcome::Report(r) => match r.status {
                    ProcessingStatus::Processed => summary.processed += 1,
                    ProcessingStatus::DuplicateRemoved => summary.duplicates_removed += 1,
                    _ => summary.skipped += 1,
                },
                EventOutcome::Failed { retryable, .. } => {
                    summary.failed += 1;
                    if *retryable {
                        summary.retryable_failures += 1;
                    }
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_ref_parse_roundtrip() {
        let obj = ObjectRef::parse("derived-mono/abc_mono.png").unwrap();
        assert_eq!(obj.namespace, Namespace::DerivedMono);
        assert_eq!(obj.name, "abc_mono.png");
        assert_eq!(obj.key(), "derived-mono/abc_mono.png");
    }

    #[test]
    fn test_object_ref_parse_unknown_namespace() {
        assert!(ObjectRef::parse("sources/abc.png").is_none());
        assert!(ObjectRef::parse("no-slash").is_none());
    }

    #[test]
    fn test_folder_marker() {
        assert!(ObjectRef::new(Namespace::Incoming, "").is_folder_marker());
        assert!(ObjectRef::new(Namespace::Incoming, "batch/").is_folder_marker());
        assert!(!ObjectRef::new(Namespace::Incoming, "batch/a.jpg").is_folder_marker());
    }

    #[test]
    fn test_file_name_nested() {
        let obj = ObjectRef::new(Namespace::Incoming, "2024/05/photo.JPG");
        assert_eq!(obj.file_name(), "photo.JPG");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessingStatus::DuplicateRemoved).unwrap();
        assert_eq!(json, "\"duplicate_removed\"");
    }

    #[test]
    fn test_created_only_for_processed() {
        let mut report = ProcessingReport {
            stage: Stage::Ingest,
            source_key: "incoming/a.jpg".to_string(),
            status: ProcessingStatus::DuplicateRemoved,
            target_key: Some("canonical/abc.jpg".to_string()),
            content_hash: Some("abc".to_string()),
        };
        assert!(report.created().is_none());
        report.status = ProcessingStatus::Processed;
        assert_eq!(
            report.created(),
            Some(ObjectRef::new(Namespace::Canonical, "abc.jpg"))
        );
    }

    #[test]
    fn test_batch_summary_counts() {
        let outcomes = vec![
            EventOutcome::Report(ProcessingReport::skipped(
                Stage::Ingest,
                "incoming/a.gif",
                ProcessingStatus::SkippedInvalidExtension,
            )),
            EventOutcome::Failed {
                stage: Stage::Transcode,
                source_key: "canonical/x.png".to_string(),
                error: "bad".to_string(),
                retryable: false,
            },
        ];
        let summary = BatchSummary::from_outcomes(&outcomes);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.retryable_failures, 0);
    }
}
