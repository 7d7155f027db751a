//! Inbound image normalization
//!
//! Every raw upload goes through [`ImagePreprocessor::prepare`] before a
//! strategy touches it: decode, honor EXIF orientation, convert the pixel
//! layout, cap the longer edge, and re-encode.

use crate::{
    config::{ColorMode, ResizePolicy},
    error::{ProcessingError, Result},
    services::OutputFormatHandler,
    types::ImageBlob,
};
use image::{imageops::FilterType, DynamicImage, ImageDecoder, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Decodes, normalizes and downsizes inbound images
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Produce a size-capped blob in the layout and encoding a strategy expects
    ///
    /// RGBA output is PNG encoded; RGB output is JPEG encoded with
    /// `policy.jpeg_quality`. The input buffer is never modified.
    ///
    /// # Errors
    /// - `Decode` when `raw` is not a recognizable image
    /// - `Internal` when re-encoding fails
    pub fn prepare(raw: &[u8], target_mode: ColorMode, policy: &ResizePolicy) -> Result<ImageBlob> {
        let image = Self::decode(raw)?;
        let original = (image.width(), image.height());

        let image = OutputFormatHandler::convert_color(image, target_mode);
        let image = Self::downscale(image, policy.max_side);

        debug!(
            original_width = original.0,
            original_height = original.1,
            width = image.width(),
            height = image.height(),
            mode = ?target_mode,
            "Prepared inbound image"
        );

        OutputFormatHandler::encode_for_mode(&image, target_mode, policy.jpeg_quality)
    }

    /// Decode raw bytes, applying the orientation recorded by the camera
    ///
    /// # Errors
    /// `Decode` when the bytes are empty, unrecognized, or corrupt.
    pub fn decode(raw: &[u8]) -> Result<DynamicImage> {
        if raw.is_empty() {
            return Err(ProcessingError::decode("Input is empty"));
        }

        let reader = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()
            .map_err(|e| ProcessingError::decode(format!("Failed to read input: {e}")))?;
        if reader.format().is_none() {
            return Err(ProcessingError::decode(
                "Input is not a recognizable image format",
            ));
        }

        let mut decoder = reader
            .into_decoder()
            .map_err(|e| ProcessingError::decode(format!("Unsupported image: {e}")))?;
        let orientation = decoder
            .orientation()
            .map_err(|e| ProcessingError::decode(format!("Failed to read orientation: {e}")))?;
        let mut image = DynamicImage::from_decoder(decoder)
            .map_err(|e| ProcessingError::decode(format!("Failed to decode image: {e}")))?;
        image.apply_orientation(orientation);

        Ok(image)
    }

    /// Shrink an image so its longer edge is at most `max_side`
    ///
    /// Images already within bounds are returned untouched; this never upscales.
    #[must_use]
    pub fn downscale(image: DynamicImage, max_side: u32) -> DynamicImage {
        let (width, height) = (image.width(), image.height());
        let (new_width, new_height) = Self::target_dimensions(width, height, max_side);
        if (new_width, new_height) == (width, height) {
            return image;
        }
        image.resize_exact(new_width, new_height, FilterType::Lanczos3)
    }

    /// Compute output dimensions for a given threshold
    ///
    /// `scale = max(width, height) / max_side`; when `scale > 1` both edges are
    /// divided by it and rounded, otherwise the dimensions are unchanged.
    #[must_use]
    pub fn target_dimensions(width: u32, height: u32, max_side: u32) -> (u32, u32) {
        let longest = width.max(height);
        if max_side == 0 || longest <= max_side {
            return (width, height);
        }

        let scale = f64::from(longest) / f64::from(max_side);
        let scale_edge = |edge: u32| -> u32 {
            if edge == longest {
                max_side
            } else {
                ((f64::from(edge) / scale).round() as u32).clamp(1, max_side)
            }
        };

        (scale_edge(width), scale_edge(height))
    }
}
