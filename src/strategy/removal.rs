//! Background removal with the local segmentation model

use super::{join_error_message, ImageStrategy};
use crate::{
    config::StrategyId,
    error::{ProcessingError, Result},
    inference::SegmentationModel,
    services::OutputFormatHandler,
    tracing_config::spans,
    types::ImageBlob,
};
use async_trait::async_trait;
use image::DynamicImage;
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, Instrument};

/// Cuts the rug out of its background and delivers a transparent PNG
pub struct BackgroundRemovalStrategy {
    model: Arc<dyn SegmentationModel>,
}

impl BackgroundRemovalStrategy {
    #[must_use]
    pub fn new(model: Arc<dyn SegmentationModel>) -> Self {
        Self { model }
    }

    /// Run the model on a worker thread and return the PNG cutout
    ///
    /// The input must already be RGBA and size-capped by the preprocessor.
    ///
    /// # Errors
    /// `ModelFailure` for anything that goes wrong, including a panicking backend.
    pub async fn remove_background(&self, image: ImageBlob) -> Result<ImageBlob> {
        let model = Arc::clone(&self.model);
        let span = tracing::Span::current();

        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            Self::remove_background_blocking(model.as_ref(), &image)
        })
        .await
        .map_err(|e| ProcessingError::model("WorkerPanic", join_error_message(e)))?
    }

    /// Blocking body of [`remove_background`](Self::remove_background)
    pub fn remove_background_blocking(
        model: &dyn SegmentationModel,
        image: &ImageBlob,
    ) -> Result<ImageBlob> {
        let decoded = image
            .decode()
            .map_err(|e| ProcessingError::model("InputDecode", e))?;
        let dimensions = (decoded.width(), decoded.height());

        let start = Instant::now();
        let output = {
            let _span = spans::model_inference(model.name(), dimensions).entered();
            model.transform(&decoded)?
        };
        let rgba = output.into_rgba()?;
        debug!(
            model = %model.name(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Segmentation finished"
        );

        if rgba.dimensions() != dimensions {
            return Err(ProcessingError::model(
                "OutputShape",
                format!(
                    "model returned {}x{} for a {}x{} input",
                    rgba.width(),
                    rgba.height(),
                    dimensions.0,
                    dimensions.1
                ),
            ));
        }

        OutputFormatHandler::encode_png(&DynamicImage::ImageRgba8(rgba))
            .map_err(|e| ProcessingError::model("Encode", e))
    }
}

#[async_trait]
impl ImageStrategy for BackgroundRemovalStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::RemoveBackground
    }

    fn name(&self) -> &str {
        "background-removal"
    }

    async fn apply(&self, image: ImageBlob) -> Result<ImageBlob> {
        self.remove_background(image)
            .instrument(spans::strategy(self.name()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{test_helpers::create_test_png, MockBehavior, MockSegmentationModel};
    use crate::error::ErrorKind;
    use image::{GenericImageView, ImageFormat};

    fn strategy(behavior: MockBehavior) -> (BackgroundRemovalStrategy, MockSegmentationModel) {
        let model = MockSegmentationModel::new(behavior);
        (BackgroundRemovalStrategy::new(Arc::new(model.clone())), model)
    }

    #[tokio::test]
    async fn test_decoded_output_becomes_transparent_png() {
        let (strategy, model) = strategy(MockBehavior::Decoded);
        let input = ImageBlob::new(create_test_png(60, 40), ImageFormat::Png);

        let output = strategy.apply(input).await.unwrap();
        assert_eq!(output.format(), ImageFormat::Png);
        assert_eq!(model.calls(), 1);

        let decoded = output.decode().unwrap();
        assert_eq!(decoded.dimensions(), (60, 40));
        assert!(decoded.color().has_alpha());
        assert!(decoded.to_rgba8().pixels().any(|p| p[3] < 255));
    }

    #[tokio::test]
    async fn test_encoded_output_is_normalized() {
        let (strategy, _) = strategy(MockBehavior::Encoded);
        let input = ImageBlob::new(create_test_png(32, 32), ImageFormat::Png);

        let decoded = strategy.apply(input).await.unwrap().decode().unwrap();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[tokio::test]
    async fn test_model_error_is_model_failure() {
        let (strategy, _) = strategy(MockBehavior::Fail);
        let input = ImageBlob::new(create_test_png(8, 8), ImageFormat::Png);

        let err = strategy.apply(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFailure);
        assert!(err.to_string().contains("MockInferenceError"));
    }

    #[tokio::test]
    async fn test_model_panic_is_model_failure() {
        let (strategy, _) = strategy(MockBehavior::Panic);
        let input = ImageBlob::new(create_test_png(8, 8), ImageFormat::Png);

        let err = strategy.apply(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFailure);
        assert!(err.to_string().contains("simulated segmentation crash"));
    }

    #[tokio::test]
    async fn test_wrong_output_size_is_rejected() {
        let (strategy, _) = strategy(MockBehavior::WrongSize);
        let input = ImageBlob::new(create_test_png(16, 16), ImageFormat::Png);

        let err = strategy.apply(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFailure);
        assert!(err.to_string().contains("OutputShape"));
    }

    #[test]
    fn test_corrupt_input_is_model_failure() {
        let model = MockSegmentationModel::new(MockBehavior::Decoded);
        let input = ImageBlob::new(vec![0x89, b'P', b'N', b'G'], ImageFormat::Png);

        let err = BackgroundRemovalStrategy::remove_background_blocking(&model, &input).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ModelFailure);
        assert_eq!(model.calls(), 0);
    }
}
