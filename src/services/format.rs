//! Output format handling service
//!
//! Keeps pixel-layout conversion and encoding out of the strategies so every
//! stage produces blobs the same way.

use crate::{
    config::ColorMode,
    error::{ProcessingError, Result},
    types::ImageBlob,
};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageFormat};
use std::io::Cursor;

/// Service for converting and encoding images
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Convert an image to the requested pixel layout
    ///
    /// RGB conversion drops alpha; RGBA conversion adds an opaque alpha channel.
    #[must_use]
    pub fn convert_color(image: DynamicImage, mode: ColorMode) -> DynamicImage {
        match (mode, image) {
            (ColorMode::Rgba, image @ DynamicImage::ImageRgba8(_)) => image,
            (ColorMode::Rgb, image @ DynamicImage::ImageRgb8(_)) => image,
            (ColorMode::Rgba, image) => DynamicImage::ImageRgba8(image.to_rgba8()),
            (ColorMode::Rgb, image) => DynamicImage::ImageRgb8(image.to_rgb8()),
        }
    }

    /// Encode as PNG (lossless, alpha preserved)
    pub fn encode_png(image: &DynamicImage) -> Result<ImageBlob> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, ImageFormat::Png)
            .map_err(|e| ProcessingError::internal(format!("PNG encoding failed: {e}")))?;
        Ok(ImageBlob::new(buffer.into_inner(), ImageFormat::Png))
    }

    /// Encode as JPEG with the given quality (alpha is dropped)
    pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<ImageBlob> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .encode_image(&rgb)
            .map_err(|e| ProcessingError::internal(format!("JPEG encoding failed: {e}")))?;
        Ok(ImageBlob::new(buffer, ImageFormat::Jpeg))
    }

    /// Encode in the format that matches a color mode
    ///
    /// RGBA goes to PNG so the alpha channel survives; RGB goes to JPEG to bound
    /// the payload sent over the network.
    pub fn encode_for_mode(image: &DynamicImage, mode: ColorMode, quality: u8) -> Result<ImageBlob> {
        match mode {
            ColorMode::Rgba => Self::encode_png(image),
            ColorMode::Rgb => Self::encode_jpeg(image, quality),
        }
    }

    /// Get the file extension for a format (without the dot)
    ///
    /// # Examples
    /// ```rust
    /// use rugcut::services::OutputFormatHandler;
    /// use image::ImageFormat;
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(ImageFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(ImageFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: ImageFormat) -> &'static str {
        match format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::WebP => "webp",
            ImageFormat::Gif => "gif",
            ImageFormat::Tiff => "tiff",
            ImageFormat::Bmp => "bmp",
            _ => "png",
        }
    }

    #[must_use]
    pub fn mime_type(format: ImageFormat) -> &'static str {
        match format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Tiff => "image/tiff",
            ImageFormat::Bmp => "image/bmp",
            _ => "image/png",
        }
    }

    /// Check if a format can carry an alpha channel
    #[must_use]
    pub fn supports_transparency(format: ImageFormat) -> bool {
        matches!(
            format,
            ImageFormat::Png | ImageFormat::WebP | ImageFormat::Tiff | ImageFormat::Gif
        )
    }
}
