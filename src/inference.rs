//! Segmentation model abstraction
//!
//! The local model is an in-process collaborator. Backends may hand back
//! either decoded pixels or an encoded buffer; [`ModelOutput`] is the adapter
//! that turns both into one RGBA representation right at the boundary.

use crate::error::{ProcessingError, Result};
use image::{DynamicImage, RgbaImage};

/// What a segmentation backend returns for one image
#[derive(Debug, Clone)]
pub enum ModelOutput {
    /// Already decoded pixel data
    Decoded(DynamicImage),
    /// An encoded image buffer (PNG, WebP, ...)
    Encoded(Vec<u8>),
}

impl ModelOutput {
    /// Normalize either representation to decoded RGBA pixels
    ///
    /// # Errors
    /// `ModelFailure` when an encoded buffer cannot be decoded.
    pub fn into_rgba(self) -> Result<RgbaImage> {
        match self {
            Self::Decoded(image) => Ok(image.into_rgba8()),
            Self::Encoded(bytes) => image::load_from_memory(&bytes)
                .map(DynamicImage::into_rgba8)
                .map_err(|e| ProcessingError::model("OutputDecode", e)),
        }
    }
}

/// A loaded foreground segmentation model
///
/// Implementations are loaded once and are read-only afterwards, so one
/// instance can serve concurrent requests from worker threads.
pub trait SegmentationModel: Send + Sync {
    /// Strip the background from an RGBA image
    ///
    /// This is blocking, CPU-bound work; callers run it on a worker thread.
    ///
    /// # Errors
    /// - Model inference failures
    /// - Tensor conversion errors
    fn transform(&self, image: &DynamicImage) -> Result<ModelOutput>;

    /// Short model description for logs
    fn name(&self) -> &str;
}
