//! Tensor derivation: aspect-preserving resize, centered padding, [0, 1]
//! normalization.
//!
//! Output layout:
//! - Canvas: `target × target`, filled with the background color
//! - Channels: 3 (RGB) or 1 (luma, when `grayscale` is set)
//! - Values: `byte / 255` as `f32`
//! - Order: row-major HWC (row, then column, then channel)
//! - Serialization: little-endian IEEE-754 `f32`, no header

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array3;
use std::sync::Arc;

use super::codec::{CodecError, ImageCodec};
use super::decode::ImageDecoder;
use super::hash::Hasher;
use super::validate::{guard_write, strip_extension, Admission, Validator};
use crate::config::{Config, HashAlgorithm, TensorConfig};
use crate::error::{PipelineError, PipelineResult};
use crate::storage::ObjectStore;
use crate::types::{Namespace, ObjectEvent, ObjectRef, ProcessingReport, ProcessingStatus, Stage};

/// File extension of serialized tensors.
pub const TENSOR_EXTENSION: &str = "f32";

/// Geometry of the resize-and-pad step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub new_width: u32,
    pub new_height: u32,
    pub paste_x: u32,
    pub paste_y: u32,
    pub target: u32,
}

impl ResizePlan {
    /// Scale so the longer side equals `target`; ties use the height.
    ///
    /// `floor(side * target / long_side)` is evaluated in integers so the
    /// long side lands exactly on `target`. Computing `side * (target /
    /// long_side)` in `f64` instead can land one pixel short on the short
    /// side (38x19 at 500 gives 249 rows rather than 250), so tensors
    /// produced that way will not match byte for byte.
    pub fn new(width: u32, height: u32, target: u32) -> Self {
        let long_side = if width > height { width } else { height };
        let scaled = |side: u32| -> u32 {
            let v = (side as u64 * target as u64) / long_side.max(1) as u64;
            (v as u32).clamp(1, target)
        };
        let new_width = scaled(width);
        let new_height = scaled(height);
        Self {
            new_width,
            new_height,
            paste_x: (target - new_width) / 2,
            paste_y: (target - new_height) / 2,
            target,
        }
    }
}

/// Resize, pad and normalize `image` into an `(H, W, C)` array.
pub fn tensorize(
    codec: &dyn ImageCodec,
    image: &DynamicImage,
    config: &TensorConfig,
) -> Result<Array3<f32>, CodecError> {
    let (width, height) = image.dimensions();
    let plan = ResizePlan::new(width, height, config.target_pixels);

    let rgb = codec.convert_channels(image, 3)?;
    let resized = codec.resize(&rgb, plan.new_width, plan.new_height).to_rgb8();

    let mut canvas = RgbImage::from_pixel(
        plan.target,
        plan.target,
        Rgb(config.background_color),
    );
    image::imageops::replace(
        &mut canvas,
        &resized,
        plan.paste_x as i64,
        plan.paste_y as i64,
    );

    let channels = config.channels();
    let padded = codec.convert_channels(&DynamicImage::ImageRgb8(canvas), channels as u8)?;
    let raw = padded.as_bytes();

    let side = plan.target as usize;
    let mut values = Vec::with_capacity(config.tensor_len());
    values.extend(raw.iter().map(|&b| b as f32 / 255.0));
    Array3::from_shape_vec((side, side, channels), values)
        .map_err(|e| CodecError::Decode(format!("tensor shape mismatch: {e}")))
}

/// Serialize in logical row-major order as little-endian `f32`.
pub fn encode_tensor(tensor: &Array3<f32>) -> Vec<u8> {
    let mut out = Vec::with_capacity(tensor.len() * 4);
    for v in tensor.iter() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Parse a serialized tensor back into floats.
///
/// Returns `None` if the byte length is not a multiple of 4.
pub fn decode_tensor(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Derives normalized tensors from canonical objects into `derived-tensor`.
pub struct Tensorizer {
    store: Arc<dyn ObjectStore>,
    codec: Arc<dyn ImageCodec>,
    admission: Admission,
    validator: Validator,
    decoder: ImageDecoder,
    config: TensorConfig,
    hash_algorithm: HashAlgorithm,
}

impl Tensorizer {
    pub fn new(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        codec: Arc<dyn ImageCodec>,
    ) -> PipelineResult<Self> {
        if config.tensor.target_pixels == 0 {
            return Err(PipelineError::Validation(
                "tensor.target_pixels must be > 0".to_string(),
            ));
        }
        Ok(Self {
            admission: Admission::new(
                Stage::Tensorize,
                store.name(),
                &config.ingest.allowed_extensions,
            ),
            validator: Validator::new(config.limits.clone()),
            decoder: ImageDecoder::new(Arc::clone(&codec), config.limits.clone()),
            config: config.tensor.clone(),
            hash_algorithm: config.ingest.hash_algorithm,
            store,
            codec,
        })
    }

    /// Derived key for a canonical object: its content hash plus `.f32`.
    pub fn tensor_key(canonical: &ObjectRef) -> ObjectRef {
        ObjectRef::new(
            Namespace::DerivedTensor,
            format!("{}.{}", strip_extension(&canonical.name), TENSOR_EXTENSION),
        )
    }

    /// Derive and store the tensor for the canonical object in `event`.
    pub async fn derive_tensor(&self, event: &ObjectEvent) -> PipelineResult<ProcessingReport> {
        let source = match self.admission.admit(event) {
            Ok(obj) => obj,
            Err(status) => {
                tracing::debug!("tensorize: skipping {}/{} ({:?})", event.namespace, event.key, status);
                return Ok(ProcessingReport::skipped(
                    Stage::Tensorize,
                    event.object().key(),
                    status,
                ));
            }
        };
        let source_key = source.key();

        let bytes = match self.store.get(&source_key).await {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => {
                tracing::warn!("tensorize: {} not found, skipping", source_key);
                return Ok(ProcessingReport::skipped(
                    Stage::Tensorize,
                    source_key,
                    ProcessingStatus::SkippedMissing,
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let content_hash = strip_extension(source.file_name()).to_string();
        if !Hasher::looks_like_digest(self.hash_algorithm, &content_hash) {
            tracing::warn!(
                "tensorize: canonical name {} is not a {:?} digest",
                source_key,
                self.hash_algorithm
            );
        }

        let target = Self::tensor_key(&source);
        guard_write(Stage::Tensorize, &target)?;

        let payload = self.build(bytes, &source_key).await.inspect_err(|e| {
            tracing::error!("tensorize: failed for {}: {}", source_key, e);
        })?;

        let target_key = target.key();
        self.store.put(&target_key, payload).await?;
        tracing::info!("tensorize: {} -> {}", source_key, target_key);

        Ok(ProcessingReport {
            stage: Stage::Tensorize,
            source_key,
            status: ProcessingStatus::Processed,
            target_key: Some(target_key),
            content_hash: Some(content_hash),
        })
    }

    async fn build(&self, bytes: Vec<u8>, key: &str) -> PipelineResult<Vec<u8>> {
        self.validator.validate(key, &bytes)?;
        let decoded = self.decoder.decode(bytes, key).await?;

        let codec = Arc::clone(&self.codec);
        let config = self.config.clone();
        let key_owned = key.to_string();
        tokio::task::spawn_blocking(move || {
            tensorize(codec.as_ref(), &decoded.image, &config)
                .map(|t| encode_tensor(&t))
                .map_err(|e| PipelineError::Decode {
                    key: key_owned,
                    message: e.to_string(),
                })
        })
        .await
        .map_err(|e| PipelineError::Decode {
            key: key.to_string(),
            message: format!("Task join error: {e}"),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::codec::StandardCodec;
    use crate::storage::MemoryStore;
    use image::ImageFormat;

    const HASH: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn tensorizer(store: Arc<MemoryStore>) -> Tensorizer {
        let mut config = Config::default();
        config.tensor.target_pixels = 16;
        Tensorizer::new(&config, store, Arc::new(StandardCodec)).unwrap()
    }

    fn event(namespace: Namespace, key: &str) -> ObjectEvent {
        ObjectEvent {
            store: "test".to_string(),
            namespace,
            key: key.to_string(),
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 0, 0])));
        StandardCodec.encode(&img, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_plan_landscape() {
        let plan = ResizePlan::new(800, 400, 500);
        assert_eq!((plan.new_width, plan.new_height), (500, 250));
        assert_eq!((plan.paste_x, plan.paste_y), (0, 125));
    }

    #[test]
    fn test_plan_square_uses_height_branch() {
        let plan = ResizePlan::new(400, 400, 500);
        assert_eq!((plan.new_width, plan.new_height), (500, 500));
        assert_eq!((plan.paste_x, plan.paste_y), (0, 0));
    }

    #[test]
    fn test_plan_portrait() {
        let plan = ResizePlan::new(300, 1000, 500);
        assert_eq!((plan.new_width, plan.new_height), (150, 500));
        assert_eq!((plan.paste_x, plan.paste_y), (175, 0));
    }

    #[test]
    fn test_plan_odd_padding_floors() {
        let plan = ResizePlan::new(1000, 333, 500);
        assert_eq!((plan.new_width, plan.new_height), (500, 166));
        assert_eq!(plan.paste_y, 167);
    }

    #[test]
    fn test_plan_floors_without_float_error() {
        // 19 * (500 / 38) is 249.99... in f64
        let plan = ResizePlan::new(38, 19, 500);
        assert_eq!((plan.new_width, plan.new_height), (500, 250));
        assert_eq!(plan.paste_y, 125);
    }

    #[test]
    fn test_plan_extreme_aspect_keeps_one_pixel() {
        let plan = ResizePlan::new(10_000, 1, 500);
        assert_eq!((plan.new_width, plan.new_height), (500, 1));
    }

    #[test]
    fn test_tensorize_shape_and_padding() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(800, 400, Rgb([255, 255, 255])));
        let config = TensorConfig::default();
        let tensor = tensorize(&StandardCodec, &img, &config).unwrap();
        assert_eq!(tensor.shape(), &[500, 500, 3]);

        // Top padding band is background (black)
        assert_eq!(tensor[[0, 250, 0]], 0.0);
        assert_eq!(tensor[[124, 250, 2]], 0.0);
        // Image body is white
        assert!((tensor[[250, 250, 1]] - 1.0).abs() < 0.01);
        // Bottom padding band
        assert_eq!(tensor[[499, 0, 0]], 0.0);
    }

    #[test]
    fn test_tensorize_grayscale_background() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 20, Rgb([0, 0, 0])));
        let config = TensorConfig {
            target_pixels: 40,
            grayscale: true,
            background_color: [255, 255, 255],
        };
        let tensor = tensorize(&StandardCodec, &img, &config).unwrap();
        assert_eq!(tensor.shape(), &[40, 40, 1]);
        // Left padding is white, body is black
        assert!((tensor[[20, 0, 0]] - 1.0).abs() < 0.01);
        assert_eq!(tensor[[20, 20, 0]], 0.0);
    }

    #[test]
    fn test_values_in_unit_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(37, 23, |x, y| {
            Rgb([(x * 7) as u8, (y * 11) as u8, ((x + y) * 3) as u8])
        }));
        let config = TensorConfig {
            target_pixels: 64,
            ..TensorConfig::default()
        };
        let tensor = tensorize(&StandardCodec, &img, &config).unwrap();
        assert!(tensor.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_encode_is_row_major_little_endian() {
        let tensor = Array3::from_shape_vec((1, 2, 1), vec![0.5f32, 1.0]).unwrap();
        let bytes = encode_tensor(&tensor);
        assert_eq!(bytes.len(), 8);
        assert_eq!(&bytes[0..4], &0.5f32.to_le_bytes());
        assert_eq!(decode_tensor(&bytes), Some(vec![0.5, 1.0]));
        assert_eq!(decode_tensor(&bytes[..5]), None);
    }

    #[test]
    fn test_tensor_key_uses_hash() {
        let canonical = ObjectRef::new(Namespace::Canonical, "d41d8cd98f00b204e9800998ecf8427e.jpg");
        assert_eq!(
            Tensorizer::tensor_key(&canonical).key(),
            "derived-tensor/d41d8cd98f00b204e9800998ecf8427e.f32"
        );
    }

    #[tokio::test]
    async fn test_derive_writes_hash_keyed_tensor() {
        let store = Arc::new(MemoryStore::new("test"));
        store.put(&format!("canonical/{HASH}.png"), png(8, 4)).await.unwrap();

        let report = tensorizer(store.clone())
            .derive_tensor(&event(Namespace::Canonical, &format!("{HASH}.png")))
            .await
            .unwrap();
        let target = format!("derived-tensor/{HASH}.f32");
        assert_eq!(report.status, ProcessingStatus::Processed);
        assert_eq!(report.target_key.as_deref(), Some(target.as_str()));
        assert_eq!(report.content_hash.as_deref(), Some(HASH));

        let values = decode_tensor(&store.get(&target).await.unwrap()).unwrap();
        assert_eq!(values.len(), 16 * 16 * 3);
        // 8x4 -> 16x8 pasted at y=4
        assert_eq!(values[0], 0.0);
        assert!((values[(8 * 16 + 8) * 3] - 1.0).abs() < 0.01);
    }

    #[tokio::test]
    async fn test_wrong_namespace_skipped() {
        let store = Arc::new(MemoryStore::new("test"));
        store.put(&format!("incoming/{HASH}.png"), png(4, 4)).await.unwrap();

        let report = tensorizer(store.clone())
            .derive_tensor(&event(Namespace::Incoming, &format!("{HASH}.png")))
            .await
            .unwrap();
        assert_eq!(report.status, ProcessingStatus::SkippedWrongNamespace);
        assert!(store.list("derived-tensor/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_extension_not_deleted() {
        let store = Arc::new(MemoryStore::new("test"));
        store.put("canonical/abc.gif", b"GIF89a".to_vec()).await.unwrap();

        let report = tensorizer(store.clone())
            .derive_tensor(&event(Namespace::Canonical, "abc.gif"))
            .await
            .unwrap();
        assert_eq!(report.status, ProcessingStatus::SkippedInvalidExtension);
        assert!(store.exists("canonical/abc.gif").await.unwrap());
        assert!(store.list("derived-tensor/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_folder_marker_skipped() {
        let store = Arc::new(MemoryStore::new("test"));
        let report = tensorizer(store)
            .derive_tensor(&event(Namespace::Canonical, "batch/"))
            .await
            .unwrap();
        assert_eq!(report.status, ProcessingStatus::SkippedFolder);
    }

    #[tokio::test]
    async fn test_missing_source_is_skip() {
        // Ingest's copy event can arrive after a later delete
        let store = Arc::new(MemoryStore::new("test"));
        let report = tensorizer(store.clone())
            .derive_tensor(&event(Namespace::Canonical, &format!("{HASH}.png")))
            .await
            .unwrap();
        assert_eq!(report.status, ProcessingStatus::SkippedMissing);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_store_outage_is_retryable() {
        let store = Arc::new(MemoryStore::new("test"));
        store.put(&format!("canonical/{HASH}.png"), png(4, 4)).await.unwrap();
        store.set_available(false);

        let err = tensorizer(store.clone())
            .derive_tensor(&event(Namespace::Canonical, &format!("{HASH}.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Storage(_)));
        assert!(err.is_retryable());

        store.set_available(true);
        assert!(store.list("derived-tensor/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_input_is_permanent() {
        let store = Arc::new(MemoryStore::new("test"));
        let mut bytes = png(8, 8);
        bytes.truncate(30);
        store.put(&format!("canonical/{HASH}.png"), bytes).await.unwrap();

        let err = tensorizer(store.clone())
            .derive_tensor(&event(Namespace::Canonical, &format!("{HASH}.png")))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
        assert!(!err.is_retryable());
        assert!(store.list("derived-tensor/").await.unwrap().is_empty());
    }
}
