//! Mock segmentation models for unit tests
//!
//! Lets strategy and dispatcher tests run without a model file on disk.

use crate::{
    error::{ProcessingError, Result},
    inference::{ModelOutput, SegmentationModel},
    services::OutputFormatHandler,
};
use image::{DynamicImage, Rgb, RgbImage, Rgba, RgbaImage};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// How the mock model behaves when called
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Return decoded RGBA with a circular foreground
    Decoded,
    /// Return the same mask, PNG encoded
    Encoded,
    /// Return an error value
    Fail,
    /// Panic inside the worker
    Panic,
    /// Return an image of the wrong size
    WrongSize,
}

/// Mock segmentation model with call counting
#[derive(Debug, Clone)]
pub struct MockSegmentationModel {
    behavior: MockBehavior,
    calls: Arc<AtomicUsize>,
}

impl MockSegmentationModel {
    #[must_use]
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times `transform` ran
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Cut everything outside a centered circle
    fn circle_cutout(image: &DynamicImage) -> RgbaImage {
        let mut rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius = width.min(height) as f32 / 3.0;

        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            let dx = x as f32 - center_x;
            let dy = y as f32 - center_y;
            if (dx * dx + dy * dy).sqrt() > radius {
                pixel[3] = 0;
            }
        }
        rgba
    }
}

impl SegmentationModel for MockSegmentationModel {
    fn transform(&self, image: &DynamicImage) -> Result<ModelOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        match self.behavior {
            MockBehavior::Decoded => Ok(ModelOutput::Decoded(DynamicImage::ImageRgba8(
                Self::circle_cutout(image),
            ))),
            MockBehavior::Encoded => {
                let cut = DynamicImage::ImageRgba8(Self::circle_cutout(image));
                Ok(ModelOutput::Encoded(
                    OutputFormatHandler::encode_png(&cut)?.into_bytes(),
                ))
            },
            MockBehavior::Fail => Err(ProcessingError::model(
                "MockInferenceError",
                "simulated inference failure",
            )),
            MockBehavior::Panic => panic!("simulated segmentation crash"),
            MockBehavior::WrongSize => Ok(ModelOutput::Decoded(DynamicImage::ImageRgba8(
                RgbaImage::from_pixel(3, 3, Rgba([0, 0, 0, 0])),
            ))),
        }
    }

    fn name(&self) -> &str {
        "mock-segmentation"
    }
}

/// Shared test data helpers
pub mod test_helpers {
    use super::*;

    /// Gradient RGB image so encoders have something to work with
    #[must_use]
    pub fn create_test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    /// JPEG bytes for a gradient test image
    #[must_use]
    pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
        OutputFormatHandler::encode_jpeg(&create_test_image(width, height), 90)
            .unwrap()
            .into_bytes()
    }

    /// PNG bytes for a gradient test image
    #[must_use]
    pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
        OutputFormatHandler::encode_png(&create_test_image(width, height))
            .unwrap()
            .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::test_helpers::*;
    use super::*;

    #[test]
    fn test_mock_counts_calls() {
        let model = MockSegmentationModel::new(MockBehavior::Decoded);
        let clone = model.clone();
        let image = create_test_image(30, 30);

        model.transform(&image).unwrap();
        clone.transform(&image).unwrap();
        assert_eq!(model.calls(), 2);
    }

    #[test]
    fn test_mock_outputs_agree() {
        let image = create_test_image(40, 20);
        let decoded = MockSegmentationModel::new(MockBehavior::Decoded)
            .transform(&image)
            .unwrap()
            .into_rgba()
            .unwrap();
        let encoded = MockSegmentationModel::new(MockBehavior::Encoded)
            .transform(&image)
            .unwrap()
            .into_rgba()
            .unwrap();

        assert_eq!(decoded, encoded);
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
        assert_eq!(decoded.get_pixel(20, 10)[3], 255);
    }

    #[test]
    fn test_mock_failure() {
        let model = MockSegmentationModel::new(MockBehavior::Fail);
        assert!(model.transform(&create_test_image(4, 4)).is_err());
    }
}
