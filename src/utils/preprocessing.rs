//! Tensor conversion helpers for segmentation models
//!
//! Models take a square, letterboxed, normalized NCHW tensor and return a
//! single-channel probability map of the same square size. These helpers
//! build the input tensor and map the output back onto the source pixels.

use crate::{
    config::ModelConfig,
    error::{ProcessingError, Result},
};
use image::{imageops::FilterType, DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage, RgbaImage};
use ndarray::Array4;

/// Geometry of the letterbox applied to one image
///
/// Needed to undo the resize and centering when the mask comes back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor from source pixels to tensor pixels
    pub scale: f32,
    pub offset_x: u32,
    pub offset_y: u32,
    /// Side length of the square tensor
    pub target_size: u32,
    pub scaled_width: u32,
    pub scaled_height: u32,
}

impl Letterbox {
    /// Compute the letterbox for a source image of the given size
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn new(width: u32, height: u32, target_size: u32) -> Self {
        let target = target_size as f32;
        let scale = (target / width.max(1) as f32).min(target / height.max(1) as f32);

        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            target_size,
            scaled_width,
            scaled_height,
        }
    }

    /// Map a source pixel to its tensor coordinate
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn project(&self, x: u32, y: u32) -> (u32, u32) {
        let last = self.target_size.saturating_sub(1);
        let tx = ((x as f32 * self.scale) as u32).min(self.scaled_width - 1) + self.offset_x;
        let ty = ((y as f32 * self.scale) as u32).min(self.scaled_height - 1) + self.offset_y;
        (tx.min(last), ty.min(last))
    }
}

/// Converts images to model tensors and model output back to masks
pub struct TensorPreprocessor;

impl TensorPreprocessor {
    /// Letterbox an image onto a white square canvas and normalize it to NCHW
    ///
    /// # Errors
    /// `ModelFailure` for a zero-sized model input.
    pub fn image_to_tensor(
        image: &DynamicImage,
        config: &ModelConfig,
    ) -> Result<(Letterbox, Array4<f32>)> {
        let target_size = config.input_size;
        if target_size == 0 {
            return Err(ProcessingError::model(
                "Preprocess",
                "model input size must be positive",
            ));
        }

        let rgb = image.to_rgb8();
        let letterbox = Letterbox::new(rgb.width(), rgb.height(), target_size);
        let resized = image::imageops::resize(
            &rgb,
            letterbox.scaled_width,
            letterbox.scaled_height,
            FilterType::Triangle,
        );

        let mut canvas: RgbImage =
            ImageBuffer::from_pixel(target_size, target_size, image::Rgb([255, 255, 255]));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        Ok((letterbox, Self::canvas_to_tensor(&canvas, config)))
    }

    fn canvas_to_tensor(canvas: &RgbImage, config: &ModelConfig) -> Array4<f32> {
        let side = canvas.width() as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));

        #[allow(clippy::indexing_slicing)]
        // tensor was allocated with the canvas dimensions
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                tensor[[0, channel, y, x]] = (f32::from(pixel[channel]) / 255.0
                    - config.normalization_mean[channel])
                    / config.normalization_std[channel];
            }
        }

        tensor
    }

    /// Turn a raw square probability map into an 8-bit mask at source resolution
    ///
    /// Values are min-max normalized first, so models that emit logits or
    /// compressed ranges still produce a full 0-255 alpha ramp. A flat map is
    /// clamped to 0-1 instead.
    ///
    /// # Errors
    /// `ModelFailure` when the map is not `side * side` values long.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn output_to_mask(
        values: &[f32],
        letterbox: &Letterbox,
        original_dimensions: (u32, u32),
    ) -> Result<GrayImage> {
        let side = letterbox.target_size as usize;
        if values.len() != side * side {
            return Err(ProcessingError::model(
                "OutputShape",
                format!(
                    "expected {side}x{side} mask values, got {}",
                    values.len()
                ),
            ));
        }

        let (min, max) = values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;
        let normalize = |v: f32| {
            if range > f32::EPSILON {
                (v - min) / range
            } else {
                v.clamp(0.0, 1.0)
            }
        };

        let (width, height) = original_dimensions;
        let mask = GrayImage::from_fn(width, height, |x, y| {
            let (tx, ty) = letterbox.project(x, y);
            let value = values
                .get(ty as usize * side + tx as usize)
                .copied()
                .map_or(0.0, normalize);
            Luma([(value * 255.0).round().clamp(0.0, 255.0) as u8])
        });

        Ok(mask)
    }

    /// Use a mask as the alpha channel of an image
    ///
    /// # Errors
    /// `ModelFailure` when the mask and image dimensions differ.
    pub fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> Result<RgbaImage> {
        let mut rgba = image.to_rgba8();
        if rgba.dimensions() != mask.dimensions() {
            return Err(ProcessingError::model(
                "MaskShape",
                format!(
                    "mask is {:?} but image is {:?}",
                    mask.dimensions(),
                    rgba.dimensions()
                ),
            ));
        }

        for (pixel, alpha) in rgba.pixels_mut().zip(mask.pixels()) {
            pixel[3] = alpha[0];
        }
        Ok(rgba)
    }
}
