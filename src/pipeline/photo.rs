//! Photo scaling: decode a raster image and re-encode it as a small JPEG.
//!
//! Decode, resize and encode are CPU-bound, so the work runs inside
//! `spawn_blocking` to keep the Tokio worker threads free for I/O.

use crate::error::ConversionError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use std::path::Path;
use tracing::debug;

/// Read `path` and produce a JPEG whose longest edge is at most `max_dimension`.
pub async fn scale_to_jpeg(
    path: &Path,
    max_dimension: u32,
    quality: u8,
) -> Result<Vec<u8>, ConversionError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| ConversionError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    tokio::task::spawn_blocking(move || scale_bytes(&bytes, max_dimension, quality))
        .await
        .map_err(|e| ConversionError::Image {
            detail: format!("Scale task panicked: {e}"),
        })?
}

/// Blocking implementation of [`scale_to_jpeg`].
///
/// Images already within bounds are re-encoded but never upscaled.
pub fn scale_bytes(
    bytes: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<Vec<u8>, ConversionError> {
    let img = image::load_from_memory(bytes).map_err(|e| ConversionError::Image {
        detail: format!("decode: {e}"),
    })?;

    let (w, h) = (img.width(), img.height());
    let img = if w > max_dimension || h > max_dimension {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        img
    };
    debug!("Scaled photo {}x{} → {}x{}", w, h, img.width(), img.height());

    // JPEG has no alpha channel.
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        .map_err(|e| ConversionError::Image {
            detail: format!("encode: {e}"),
        })?;
    Ok(out)
}
