//! Chat-facing request handling
//!
//! [`RequestHandler`] turns inbound photo events into pipeline runs and renders
//! each [`ProcessingResult`] back through a [`ChatTransport`]: a document, an
//! inline photo, or an error text. The transport is the only thing that knows
//! about the actual messenger.

use crate::{
    config::StrategyId,
    dispatcher::PipelineDispatcher,
    error::{ErrorKind, Result},
    types::{DeliveryMode, ImageBlob, ProcessingRequest, ProcessingResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Opaque address the transport replies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyTarget(pub String);

impl std::fmt::Display for ReplyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One available resolution of an inbound photo
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoSize {
    /// Transport-specific handle used to fetch the bytes
    pub file_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// "Photo received" event
#[derive(Debug, Clone)]
pub struct PhotoEvent {
    pub target: ReplyTarget,
    /// Every size the transport offers for the same photo
    pub sizes: Vec<PhotoSize>,
}

impl PhotoEvent {
    /// Event with a single known size
    #[must_use]
    pub fn single(target: ReplyTarget, file_id: impl Into<String>) -> Self {
        Self {
            target,
            sizes: vec![PhotoSize {
                file_id: file_id.into(),
                width: 0,
                height: 0,
                file_size: None,
            }],
        }
    }

    /// The highest-resolution variant, ties broken by file size
    #[must_use]
    pub fn largest(&self) -> Option<&PhotoSize> {
        self.sizes.iter().max_by_key(|size| {
            (
                u64::from(size.width) * u64::from(size.height),
                size.file_size.unwrap_or(0),
            )
        })
    }
}

/// A finished artifact ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundArtifact {
    pub file_name: String,
    pub caption: String,
    pub blob: ImageBlob,
}

/// Messenger-side collaborator
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Download the bytes of one photo variant
    async fn fetch_bytes(&self, photo: &PhotoSize) -> Result<Vec<u8>>;

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<()>;

    /// Deliver as a file attachment, no recompression
    async fn send_document(&self, target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()>;

    /// Deliver as an inline photo; the transport may recompress
    async fn send_photo(&self, target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()>;
}

/// User-facing texts and artifact names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyMessages {
    pub greeting: String,
    pub acknowledgement: String,
    pub removal_caption: String,
    pub interior_caption: String,
    pub removal_file_stem: String,
    pub interior_file_stem: String,
}

impl Default for ReplyMessages {
    fn default() -> Self {
        Self::for_strategy(StrategyId::RemoveBackground)
    }
}

impl ReplyMessages {
    /// Default texts, with the greeting and acknowledgement matching `strategy`
    #[must_use]
    pub fn for_strategy(strategy: StrategyId) -> Self {
        let (greeting, acknowledgement) = match strategy {
            StrategyId::RemoveBackground => (
                "Hi! Send me a photo of a rug and I will cut it out of the background \
                 and send it back as a PNG with transparency.",
                "Photo received. Cutting out the rug...",
            ),
            StrategyId::InteriorCompositing => (
                "Hi! Send me a photo of a rug and I will place it in a matching interior.",
                "Photo received. Placing the rug in an interior, this can take a minute...",
            ),
        };

        Self {
            greeting: greeting.to_string(),
            acknowledgement: acknowledgement.to_string(),
            removal_caption: "Done. PNG with transparent background.".to_string(),
            interior_caption: "Done. Your rug in an interior.".to_string(),
            removal_file_stem: "cut_rug".to_string(),
            interior_file_stem: "rug_interior".to_string(),
        }
    }

    /// Text sent in place of an artifact when a run fails
    #[must_use]
    pub fn failure_text(kind: ErrorKind, message: &str) -> String {
        format!("Processing failed [{kind}]: {message}")
    }

    fn artifact(&self, strategy: StrategyId, blob: ImageBlob) -> OutboundArtifact {
        let (stem, caption) = match strategy {
            StrategyId::RemoveBackground => (&self.removal_file_stem, &self.removal_caption),
            StrategyId::InteriorCompositing => (&self.interior_file_stem, &self.interior_caption),
        };
        OutboundArtifact {
            file_name: format!("{stem}.{}", blob.extension()),
            caption: caption.clone(),
            blob,
        }
    }
}

/// Glue between the transport and the dispatcher
pub struct RequestHandler {
    dispatcher: PipelineDispatcher,
    transport: Arc<dyn ChatTransport>,
    messages: ReplyMessages,
}

impl RequestHandler {
    #[must_use]
    pub fn new(dispatcher: PipelineDispatcher, transport: Arc<dyn ChatTransport>) -> Self {
        let messages = ReplyMessages::for_strategy(dispatcher.config().strategy);
        Self {
            dispatcher,
            transport,
            messages,
        }
    }

    #[must_use]
    pub fn with_messages(mut self, messages: ReplyMessages) -> Self {
        self.messages = messages;
        self
    }

    #[must_use]
    pub fn dispatcher(&self) -> &PipelineDispatcher {
        &self.dispatcher
    }

    /// Reply to the start command
    pub async fn handle_start(&self, target: &ReplyTarget) -> Result<()> {
        self.transport.send_text(target, &self.messages.greeting).await
    }

    /// Process a photo with the configured strategy
    pub async fn handle_photo(&self, event: PhotoEvent) -> Result<ProcessingResult> {
        let strategy = self.dispatcher.config().strategy;
        self.handle_photo_with(event, strategy).await
    }

    /// Process a photo and deliver the outcome to its reply target
    ///
    /// The returned result mirrors what was delivered.
    ///
    /// # Errors
    /// Only transport send failures; processing failures are delivered as text.
    pub async fn handle_photo_with(
        &self,
        event: PhotoEvent,
        strategy: StrategyId,
    ) -> Result<ProcessingResult> {
        let target = &event.target;
        self.transport
            .send_text(target, &self.messages.acknowledgement)
            .await?;

        let raw = match self.fetch_largest(&event).await {
            Ok(raw) => raw,
            Err(message) => {
                let result = ProcessingResult::failure(ErrorKind::Internal, message);
                self.deliver(target, strategy, result.clone()).await?;
                return Ok(result);
            },
        };

        let request = ProcessingRequest::new(raw, strategy);
        info!(
            target = %target,
            request_id = %request.request_id(),
            strategy = %strategy,
            "Processing photo"
        );

        let result = self.dispatcher.run(request).await;
        self.deliver(target, strategy, result.clone()).await?;
        Ok(result)
    }

    async fn fetch_largest(&self, event: &PhotoEvent) -> std::result::Result<Vec<u8>, String> {
        let photo = event
            .largest()
            .ok_or_else(|| "photo event carried no image".to_string())?;
        self.transport.fetch_bytes(photo).await.map_err(|e| {
            warn!(target = %event.target, error = %e, "Failed to fetch photo");
            format!("could not download the photo: {e}")
        })
    }

    async fn deliver(
        &self,
        target: &ReplyTarget,
        strategy: StrategyId,
        result: ProcessingResult,
    ) -> Result<()> {
        match result {
            ProcessingResult::Success { blob, delivery } => {
                let artifact = self.messages.artifact(strategy, blob);
                match delivery {
                    DeliveryMode::Document => self.transport.send_document(target, artifact).await,
                    DeliveryMode::Photo => self.transport.send_photo(target, artifact).await,
                }
            },
            ProcessingResult::Failure { kind, message } => {
                self.transport
                    .send_text(target, &ReplyMessages::failure_text(kind, &message))
                    .await
            },
        }
    }
}

impl std::fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestHandler")
            .field("dispatcher", &self.dispatcher)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    fn size(id: &str, width: u32, height: u32) -> PhotoSize {
        PhotoSize {
            file_id: id.to_string(),
            width,
            height,
            file_size: None,
        }
    }

    #[test]
    fn test_largest_photo_size() {
        let event = PhotoEvent {
            target: ReplyTarget("42".into()),
            sizes: vec![size("s", 90, 60), size("x", 1280, 853), size("m", 320, 213)],
        };
        assert_eq!(event.largest().unwrap().file_id, "x");

        let empty = PhotoEvent {
            target: ReplyTarget("42".into()),
            sizes: vec![],
        };
        assert!(empty.largest().is_none());
    }

    #[test]
    fn test_failure_text() {
        assert_eq!(
            ReplyMessages::failure_text(ErrorKind::Decode, "not an image"),
            "Processing failed [DecodeError]: not an image"
        );
    }

    #[test]
    fn test_artifact_naming() {
        let messages = ReplyMessages::default();
        let png = messages.artifact(
            StrategyId::RemoveBackground,
            ImageBlob::new(vec![], ImageFormat::Png),
        );
        assert_eq!(png.file_name, "cut_rug.png");
        assert_eq!(png.caption, "Done. PNG with transparent background.");

        let jpg = messages.artifact(
            StrategyId::InteriorCompositing,
            ImageBlob::new(vec![], ImageFormat::Jpeg),
        );
        assert_eq!(jpg.file_name, "rug_interior.jpg");
    }
}
