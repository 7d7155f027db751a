//! Error types for the rug photo pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Failure category reported to the user when a pipeline run fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Input bytes are not a recognizable image
    Decode,
    /// Local background-removal backend raised or returned unusable data
    ModelFailure,
    /// Remote image API failed, timed out, or returned no image
    RemoteFailure,
    /// Configuration, transport or worker failures outside the strategies
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Decode => write!(f, "DecodeError"),
            Self::ModelFailure => write!(f, "MODEL_FAILURE"),
            Self::RemoteFailure => write!(f, "REMOTE_FAILURE"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Error types for pipeline operations
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// Input bytes could not be decoded as an image
    #[error("Image decode error: {0}")]
    Decode(String),

    /// Local segmentation model failure
    #[error("Model failure: {0}")]
    ModelFailure(String),

    /// Remote image API failure (transport error, non-2xx status, malformed body)
    #[error("Remote API failure: {0}")]
    RemoteFailure(String),

    /// Remote response was well-formed but carried no generated image
    #[error("Remote API failure: NoImageInResponse: {0}")]
    NoImageInResponse(String),

    /// Remote call exceeded its configured deadline
    #[error("Remote API failure: Timeout: no response within {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Chat transport could not fetch or deliver data
    #[error("Transport error: {0}")]
    Transport(String),

    /// Input/output errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unexpected conditions (worker panics, encoder failures)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProcessingError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a model failure labelled with the backend error type
    pub fn model(error_type: &str, msg: impl std::fmt::Display) -> Self {
        Self::ModelFailure(format!("{error_type}: {msg}"))
    }

    /// Create a remote failure labelled with the backend error type
    pub fn remote(error_type: &str, msg: impl std::fmt::Display) -> Self {
        Self::RemoteFailure(format!("{error_type}: {msg}"))
    }

    /// Create a missing-image error
    pub fn no_image<S: Into<String>>(msg: S) -> Self {
        Self::NoImageInResponse(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {parameter}: {value} (valid range: {valid_range})"
        ))
    }

    /// Failure category this error is reported under
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::ModelFailure(_) => ErrorKind::ModelFailure,
            Self::RemoteFailure(_) | Self::NoImageInResponse(_) | Self::Timeout(_) => {
                ErrorKind::RemoteFailure
            },
            Self::InvalidConfig(_) | Self::Transport(_) | Self::Io(_) | Self::Internal(_) => {
                ErrorKind::Internal
            },
        }
    }
}

impl From<reqwest::Error> for ProcessingError {
    fn from(error: reqwest::Error) -> Self {
        let error_type = if error.is_timeout() {
            "Timeout"
        } else if error.is_connect() {
            "Connect"
        } else if error.is_decode() {
            "ResponseDecode"
        } else if error.is_status() {
            "HttpStatus"
        } else {
            "Request"
        };
        Self::remote(error_type, error)
    }
}
