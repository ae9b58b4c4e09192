//! Image capability interface.
//!
//! Stages never call into the image library directly; they go through
//! [`ImageCodec`], which exposes only the four operations the pipeline needs.

use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use thiserror::Error;

/// Failures raised by a codec. Stages attach the object key.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("cannot encode image as {format:?}: {message}")]
    Encode { format: ImageFormat, message: String },

    #[error("unsupported channel count {0} (expected 1 or 3)")]
    Channels(u8),
}

/// A decoded image plus the container format sniffed from its bytes.
pub struct Decoded {
    pub image: DynamicImage,
    /// `None` when the bytes decoded but the container was not identifiable
    pub format: Option<ImageFormat>,
}

/// Minimal image operations used by the pipeline.
pub trait ImageCodec: Send + Sync {
    /// Decode raw bytes, sniffing the format from content.
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError>;

    /// Resize to exactly `width × height`.
    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage;

    /// Convert to 1 (luma) or 3 (RGB) channels.
    fn convert_channels(&self, image: &DynamicImage, channels: u8)
        -> Result<DynamicImage, CodecError>;

    /// Encode into a container format.
    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, CodecError>;
}

/// [`ImageCodec`] backed by the `image` crate, resampling with Lanczos3.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardCodec;

impl ImageCodec for StandardCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Decoded, CodecError> {
        let reader = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(format!("Cannot detect image format: {e}")))?;
        let format = reader.format();
        let image = reader
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        Ok(Decoded { image, format })
    }

    fn resize(&self, image: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        image.resize_exact(width, height, image::imageops::FilterType::Lanczos3)
    }

    fn convert_channels(
        &self,
        image: &DynamicImage,
        channels: u8,
    ) -> Result<DynamicImage, CodecError> {
        match channels {
            1 => Ok(DynamicImage::ImageLuma8(image.to_luma8())),
            3 => Ok(DynamicImage::ImageRgb8(image.to_rgb8())),
            other => Err(CodecError::Channels(other)),
        }
    }

    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, format)
            .map_err(|e| CodecError::Encode {
                format,
                message: e.to_string(),
            })?;
        Ok(buffer.into_inner())
    }
}

/// Container format for a lowercased extension such as `.jpg`.
pub fn format_for_extension(ext: &str) -> Option<ImageFormat> {
    ImageFormat::from_extension(ext.trim_start_matches('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};

    fn sample_png() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 4, Rgb([200, 10, 10])));
        StandardCodec.encode(&img, ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_decode_sniffs_format() {
        let decoded = StandardCodec.decode(&sample_png()).unwrap();
        assert_eq!(decoded.format, Some(ImageFormat::Png));
        assert_eq!(decoded.image.dimensions(), (8, 4));
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            StandardCodec.decode(b"definitely not an image"),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn test_convert_channels() {
        let img = StandardCodec.decode(&sample_png()).unwrap().image;
        let mono = StandardCodec.convert_channels(&img, 1).unwrap();
        assert_eq!(mono.color().channel_count(), 1);
        let rgb = StandardCodec.convert_channels(&mono, 3).unwrap();
        assert_eq!(rgb.color().channel_count(), 3);
        assert!(matches!(
            StandardCodec.convert_channels(&img, 4),
            Err(CodecError::Channels(4))
        ));
    }

    #[test]
    fn test_resize_exact() {
        let img = DynamicImage::new_rgb8(100, 50);
        assert_eq!(StandardCodec.resize(&img, 30, 7).dimensions(), (30, 7));
    }

    #[test]
    fn test_jpeg_roundtrip_mono() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(16, 16));
        let bytes = StandardCodec.encode(&img, ImageFormat::Jpeg).unwrap();
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_extension_mapping() {
        assert_eq!(format_for_extension(".jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(format_for_extension(".png"), Some(ImageFormat::Png));
    }
}
