//! Pipeline stages and their plumbing.
//!
//! ```text
//! incoming/ --ingest--> canonical/ --transcode--> derived-mono/
//!                                  \--tensorize--> derived-tensor/
//! ```
//!
//! - **validate**: admission predicates, write guards, header checks
//! - **hash**: content digests used for canonical naming
//! - **codec**: the image capability behind decode/resize/encode
//! - **decode**: bounded, timed decoding on the blocking pool
//! - **ingest**: deduplicating relocation into `canonical/`
//! - **transcode**: grayscale variants
//! - **tensor**: fixed-size normalized float tensors
//! - **processor**: routes one notification to the stages watching it
//! - **router**: local fan-out until quiescence
//! - **channel**: bounded event channel for long-running listeners

pub mod channel;
pub mod codec;
pub mod decode;
pub mod hash;
pub mod ingest;
pub mod processor;
pub mod router;
pub mod tensor;
pub mod transcode;
pub mod validate;

pub use channel::{bounded_channel, EventStage};
pub use codec::{ImageCodec, StandardCodec};
pub use decode::{DecodedImage, ImageDecoder};
pub use hash::Hasher;
pub use ingest::IngestGate;
pub use processor::Pipeline;
pub use router::LocalRouter;
pub use tensor::{ResizePlan, Tensorizer};
pub use transcode::Transcoder;
pub use validate::{Admission, Validator};
