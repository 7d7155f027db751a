//! Interior compositing through the remote image API

use super::{join_error_message, ImageStrategy};
use crate::{
    config::{CompositingApi, RemoteConfig, StrategyId},
    error::{ProcessingError, Result},
    tracing_config::spans,
    types::ImageBlob,
};
use async_trait::async_trait;
use instant::Instant;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Instrument};

/// Fixed instruction sent with every compositing request
pub const INTERIOR_PROMPT: &str = "\
Place the rug from the attached photo into a photorealistic interior. \
Keep the rug exactly as it is: do not change its pattern, colors, texture, shape or proportions. \
Choose a room whose style, palette and lighting suit the rug. \
Lay the rug on the floor with correct perspective and a believable scale relative to the furniture, \
with natural contact shadows and consistent lighting. \
Do not add watermarks, logos, captions or any other text. \
Return a single high-quality image.";

/// One remote request shape able to produce a composited image
#[async_trait]
pub trait CompositingBackend: Send + Sync {
    fn api(&self) -> CompositingApi;

    /// Full URL the backend posts to
    fn endpoint(&self) -> String;

    /// Send the image with the instruction and return the generated image bytes
    ///
    /// # Errors
    /// `RemoteFailure` or `NoImageInResponse`.
    async fn generate(&self, image: &ImageBlob, prompt: &str) -> Result<Vec<u8>>;
}

/// Places the rug into a generated interior
pub struct InteriorCompositingStrategy {
    backend: Arc<dyn CompositingBackend>,
    timeout: Duration,
}

impl InteriorCompositingStrategy {
    #[must_use]
    pub fn new(backend: Arc<dyn CompositingBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Build the strategy with the backend selected by `config.api`
    ///
    /// # Errors
    /// `InvalidConfig` for a missing API key or bad edit size.
    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        Ok(Self::new(
            crate::remote::backend_from_config(config)?,
            config.timeout,
        ))
    }

    /// Run one remote call, bounded by the configured timeout
    ///
    /// The returned bytes are decoded once before success is reported, so a
    /// corrupt payload never reaches the user.
    ///
    /// # Errors
    /// `RemoteFailure` (including `Timeout` and `NoImageInResponse`).
    pub async fn composite_interior(&self, image: ImageBlob) -> Result<ImageBlob> {
        let start = Instant::now();
        let call = self
            .backend
            .generate(&image, INTERIOR_PROMPT)
            .instrument(spans::remote_call(
                &self.backend.api().to_string(),
                &self.backend.endpoint(),
            ));

        let bytes = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| ProcessingError::Timeout(self.timeout))??;

        info!(
            api = %self.backend.api(),
            duration_ms = start.elapsed().as_millis() as u64,
            bytes = bytes.len(),
            "Remote compositing returned an image"
        );

        tokio::task::spawn_blocking(move || verify_image(bytes))
            .await
            .map_err(|e| ProcessingError::remote("WorkerPanic", join_error_message(e)))?
    }
}

/// Check that the reply really is an image before handing it on
fn verify_image(bytes: Vec<u8>) -> Result<ImageBlob> {
    let blob = ImageBlob::from_encoded(bytes)
        .map_err(|e| ProcessingError::remote("ResponseDecode", e))?;
    blob.decode()
        .map_err(|e| ProcessingError::remote("ResponseDecode", e))?;
    Ok(blob)
}

#[async_trait]
impl ImageStrategy for InteriorCompositingStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::InteriorCompositing
    }

    fn name(&self) -> &str {
        "interior-compositing"
    }

    async fn apply(&self, image: ImageBlob) -> Result<ImageBlob> {
        self.composite_interior(image)
            .instrument(spans::strategy(self.name()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::test_helpers::{create_test_jpeg, create_test_png};
    use crate::error::ErrorKind;
    use image::ImageFormat;
    use std::sync::Mutex;

    /// Backend returning canned bytes after an optional delay
    struct CannedBackend {
        reply: Mutex<Option<Result<Vec<u8>>>>,
        delay: Duration,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedBackend {
        fn new(reply: Result<Vec<u8>>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                delay,
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompositingBackend for CannedBackend {
        fn api(&self) -> CompositingApi {
            CompositingApi::Responses
        }

        fn endpoint(&self) -> String {
            "mock://responses".to_string()
        }

        async fn generate(&self, _image: &ImageBlob, prompt: &str) -> Result<Vec<u8>> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            tokio::time::sleep(self.delay).await;
            self.reply.lock().unwrap().take().unwrap()
        }
    }

    fn input() -> ImageBlob {
        ImageBlob::new(create_test_jpeg(20, 10), ImageFormat::Jpeg)
    }

    #[test]
    fn test_prompt_contract() {
        let prompt = INTERIOR_PROMPT.to_lowercase();
        assert!(prompt.contains("do not change its pattern, colors, texture"));
        assert!(prompt.contains("photorealistic interior"));
        assert!(prompt.contains("perspective"));
        assert!(prompt.contains("shadows"));
        assert!(prompt.contains("watermarks, logos"));
        assert!(prompt.contains("single high-quality image"));
    }

    #[tokio::test]
    async fn test_success_returns_verified_image() {
        let backend = CannedBackend::new(Ok(create_test_png(16, 12)), Duration::ZERO);
        let strategy = InteriorCompositingStrategy::new(backend.clone(), Duration::from_secs(5));

        let out = strategy.apply(input()).await.unwrap();
        assert_eq!(out.format(), ImageFormat::Png);
        assert_eq!(out.decode().unwrap().width(), 16);
        assert_eq!(backend.prompts.lock().unwrap().as_slice(), [INTERIOR_PROMPT]);
    }

    #[tokio::test]
    async fn test_backend_error_passes_through() {
        let backend = CannedBackend::new(
            Err(ProcessingError::no_image("nothing generated")),
            Duration::ZERO,
        );
        let strategy = InteriorCompositingStrategy::new(backend, Duration::from_secs(5));

        let err = strategy.apply(input()).await.unwrap_err();
        assert!(matches!(err, ProcessingError::NoImageInResponse(_)));
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
    }

    #[tokio::test]
    async fn test_garbage_reply_is_remote_failure() {
        let backend = CannedBackend::new(Ok(b"not an image".to_vec()), Duration::ZERO);
        let strategy = InteriorCompositingStrategy::new(backend, Duration::from_secs(5));

        let err = strategy.apply(input()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
        assert!(err.to_string().contains("ResponseDecode"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_times_out() {
        let backend = CannedBackend::new(Ok(create_test_png(4, 4)), Duration::from_secs(600));
        let strategy = InteriorCompositingStrategy::new(backend, Duration::from_secs(30));

        let err = strategy.apply(input()).await.unwrap_err();
        assert!(matches!(err, ProcessingError::Timeout(_)));
        assert_eq!(err.kind(), ErrorKind::RemoteFailure);
    }

    #[test]
    fn test_from_config_requires_key() {
        assert!(InteriorCompositingStrategy::from_config(&RemoteConfig::default()).is_err());
    }
}
