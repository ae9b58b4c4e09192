//! Image decoding with dimension limits and timeout support.

use image::{DynamicImage, GenericImageView, ImageFormat};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::codec::{format_for_extension, ImageCodec};
use super::validate::extension_of;
use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Decoder that runs the codec on the blocking pool under a timeout.
pub struct ImageDecoder {
    codec: Arc<dyn ImageCodec>,
    limits: LimitsConfig,
}

/// Result of decoding an image.
#[derive(Debug)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Container format, sniffed from bytes or inferred from the key
    pub format: Option<ImageFormat>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageDecoder {
    pub fn new(codec: Arc<dyn ImageCodec>, limits: LimitsConfig) -> Self {
        Self { codec, limits }
    }

    /// Decode `bytes` fetched from `key`.
    pub async fn decode(&self, bytes: Vec<u8>, key: &str) -> Result<DecodedImage, PipelineError> {
        let codec = Arc::clone(&self.codec);
        let key_owned = key.to_string();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || Self::decode_sync(codec.as_ref(), &bytes, &key_owned))
                .await
        })
        .await;

        match decode_result {
            Ok(Ok(Ok(decoded))) => {
                if decoded.width > self.limits.max_image_dimension
                    || decoded.height > self.limits.max_image_dimension
                {
                    return Err(PipelineError::ImageTooLarge {
                        key: key.to_string(),
                        width: decoded.width,
                        height: decoded.height,
                        max_dim: self.limits.max_image_dimension,
                    });
                }
                Ok(decoded)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(PipelineError::Decode {
                key: key.to_string(),
                message: format!("Task join error: {}", e),
            }),
            Err(_) => Err(PipelineError::Timeout {
                key: key.to_string(),
                stage: "decode".to_string(),
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }

    fn decode_sync(
        codec: &dyn ImageCodec,
        bytes: &[u8],
        key: &str,
    ) -> Result<DecodedImage, PipelineError> {
        let decoded = codec.decode(bytes).map_err(|e| PipelineError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        let format = decoded
            .format
            .or_else(|| extension_of(key).and_then(|ext| format_for_extension(&ext)));

        let (width, height) = decoded.image.dimensions();
        Ok(DecodedImage {
            image: decoded.image,
            format,
            width,
            height,
        })
    }
}
