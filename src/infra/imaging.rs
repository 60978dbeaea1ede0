//! Image probing and derivative generation.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage};
use imagesize::ImageError;
use thiserror::Error;

pub const DERIVATIVE_CONTENT_TYPE: &str = "image/jpeg";
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Error)]
pub enum ImagingError {
    #[error("unsupported image format")]
    Unsupported,
    #[error("image could not be decoded: {0}")]
    Decode(String),
    #[error("image could not be encoded: {0}")]
    Encode(String),
    #[error("image worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait ImageResizer: Send + Sync {
    /// Read the pixel size from the image header.
    fn dimensions(&self, bytes: &[u8]) -> Result<ImageDimensions, ImagingError>;

    /// Re-encode `bytes` so the result fits inside a `max_dimension` square.
    async fn resize(&self, bytes: Bytes, max_dimension: u32) -> Result<Bytes, ImagingError>;
}

/// Resizer backed by the `image` crate. Output is always JPEG and never enlarged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageCrateResizer;

#[async_trait]
impl ImageResizer for ImageCrateResizer {
    fn dimensions(&self, bytes: &[u8]) -> Result<ImageDimensions, ImagingError> {
        let size = match imagesize::blob_size(bytes) {
            Ok(size) => size,
            Err(ImageError::NotSupported) => return Err(ImagingError::Unsupported),
            Err(ImageError::CorruptedImage) => {
                return Err(ImagingError::Decode("corrupted image".to_string()));
            }
            Err(ImageError::IoError(err)) => return Err(ImagingError::Decode(err.to_string())),
        };
        let width = u32::try_from(size.width)
            .map_err(|_| ImagingError::Decode("width out of range".to_string()))?;
        let height = u32::try_from(size.height)
            .map_err(|_| ImagingError::Decode("height out of range".to_string()))?;
        Ok(ImageDimensions { width, height })
    }

    async fn resize(&self, bytes: Bytes, max_dimension: u32) -> Result<Bytes, ImagingError> {
        tokio::task::spawn_blocking(move || resize_to_jpeg(&bytes, max_dimension))
            .await
            .map_err(|err| ImagingError::Worker(err.to_string()))?
    }
}

fn resize_to_jpeg(bytes: &[u8], max_dimension: u32) -> Result<Bytes, ImagingError> {
    let image =
        image::load_from_memory(bytes).map_err(|err| ImagingError::Decode(err.to_string()))?;
    let fitted = fit_inside(image, max_dimension);
    let rgb = fitted.to_rgb8();

    let mut encoded = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        encoder
            .encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8.into())
            .map_err(|err| ImagingError::Encode(err.to_string()))?;
    }
    Ok(Bytes::from(encoded))
}

fn fit_inside(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    if image.width() <= max_dimension && image.height() <= max_dimension {
        return image;
    }
    image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
}
