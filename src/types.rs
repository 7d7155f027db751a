//! Core data types flowing through the pipeline

use crate::{
    config::StrategyId,
    error::{ErrorKind, ProcessingError, Result},
    services::OutputFormatHandler,
};
use image::{DynamicImage, ImageFormat};

/// In-memory encoded image payload plus its format tag
///
/// A blob is owned by exactly one pipeline run and dropped when the run completes.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBlob {
    bytes: Vec<u8>,
    format: ImageFormat,
}

impl ImageBlob {
    /// Wrap already-encoded bytes with a known format
    #[must_use]
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Self {
        Self { bytes, format }
    }

    /// Wrap encoded bytes, inferring the format from the magic bytes
    ///
    /// # Errors
    /// `Decode` when the bytes carry no recognizable image signature.
    pub fn from_encoded(bytes: Vec<u8>) -> Result<Self> {
        let format = image::guess_format(&bytes)
            .map_err(|e| ProcessingError::decode(format!("Unrecognized image data: {e}")))?;
        Ok(Self { bytes, format })
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    #[must_use]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Decode the payload into pixels
    ///
    /// # Errors
    /// `Decode` when the payload is corrupt.
    pub fn decode(&self) -> Result<DynamicImage> {
        image::load_from_memory_with_format(&self.bytes, self.format)
            .map_err(|e| ProcessingError::decode(format!("Failed to decode {:?} payload: {e}", self.format)))
    }

    /// MIME type matching the format tag
    #[must_use]
    pub fn mime_type(&self) -> &'static str {
        OutputFormatHandler::mime_type(self.format)
    }

    /// File extension matching the format tag (without the dot)
    #[must_use]
    pub fn extension(&self) -> &'static str {
        OutputFormatHandler::get_extension(self.format)
    }
}

impl std::fmt::Debug for ImageBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageBlob")
            .field("format", &self.format)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One inbound photo plus the strategy it should go through
///
/// Immutable once constructed; lives for one pipeline run.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    request_id: String,
    raw: Vec<u8>,
    strategy: StrategyId,
}

impl ProcessingRequest {
    #[must_use]
    pub fn new(raw: Vec<u8>, strategy: StrategyId) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            raw,
            strategy,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Raw inbound bytes exactly as received from the transport
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    #[must_use]
    pub fn strategy(&self) -> StrategyId {
        self.strategy
    }

    pub(crate) fn into_parts(self) -> (String, Vec<u8>, StrategyId) {
        (self.request_id, self.raw, self.strategy)
    }
}

/// How the transport should render a finished artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Generic file attachment; no re-compression, transparency preserved
    Document,
    /// Inline displayable photo; the transport may recompress
    Photo,
}

/// Outcome of one pipeline run
///
/// Exactly one variant is populated. A failure never carries partial output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    Success {
        blob: ImageBlob,
        delivery: DeliveryMode,
    },
    Failure {
        kind: ErrorKind,
        message: String,
    },
}

impl ProcessingResult {
    #[must_use]
    pub fn success(blob: ImageBlob, delivery: DeliveryMode) -> Self {
        Self::Success { blob, delivery }
    }

    #[must_use]
    pub fn failure<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure category, if this is a failure
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl From<ProcessingError> for ProcessingResult {
    fn from(error: ProcessingError) -> Self {
        Self::failure(error.kind(), error.to_string())
    }
}
