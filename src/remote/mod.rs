//! Clients for the remote image generation API
//!
//! Two request shapes are supported, selected by [`CompositingApi`]:
//! a multimodal generation call with an image-generation tool
//! ([`ResponsesBackend`]) and a multipart image edit call ([`ImageEditBackend`]).
//! Both authenticate with a bearer key and make exactly one attempt.

pub mod edits;
pub mod responses;

pub use edits::ImageEditBackend;
pub use responses::ResponsesBackend;

use crate::{
    config::{CompositingApi, RemoteConfig},
    error::{ProcessingError, Result},
    strategy::CompositingBackend,
};
use base64::Engine;
use serde::Deserialize;
use std::sync::Arc;

/// Shared HTTP plumbing for both request shapes
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RemoteClient {
    /// Build a client from the remote settings
    ///
    /// # Errors
    /// - `InvalidConfig` when no API key is configured
    /// - `Internal` when the HTTP client cannot be created
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ProcessingError::invalid_config(
                "Remote image API requires OPENAI_API_KEY",
            ));
        }

        let http = reqwest::Client::builder()
            .user_agent(concat!("rugcut/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProcessingError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Absolute URL for an API path such as `/responses`
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST a JSON body and return the parsed JSON reply
    pub(crate) async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: serde::Serialize + ?Sized,
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;
        Self::parse_reply(response).await
    }

    /// POST a multipart form and return the parsed JSON reply
    pub(crate) async fn post_multipart<R>(&self, path: &str, form: reqwest::multipart::Form) -> Result<R>
    where
        R: serde::de::DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        Self::parse_reply(response).await
    }

    async fn parse_reply<R: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<R> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ProcessingError::remote("ResponseDecode", format!("invalid JSON reply: {e}")))
    }
}

impl std::fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

/// Turn a non-2xx reply into a labelled remote failure
fn api_error(status: reqwest::StatusCode, body: &str) -> ProcessingError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => ProcessingError::remote(
            "HttpStatus",
            format!(
                "{status}: {} ({})",
                envelope.error.message,
                envelope.error.kind.as_deref().unwrap_or("api_error")
            ),
        ),
        Err(_) => {
            let snippet: String = body.chars().take(512).collect();
            ProcessingError::remote("HttpStatus", format!("{status}: {snippet}"))
        },
    }
}

/// Decode a base64 image payload from an API reply
pub(crate) fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| ProcessingError::remote("ResponseDecode", format!("invalid base64 image: {e}")))
}

/// Build the backend matching the configured request shape
pub fn backend_from_config(config: &RemoteConfig) -> Result<Arc<dyn CompositingBackend>> {
    let client = RemoteClient::new(config)?;
    let backend: Arc<dyn CompositingBackend> = match config.api {
        CompositingApi::Responses => Arc::new(ResponsesBackend::new(client, &config.vision_model)),
        CompositingApi::ImageEdit => {
            Arc::new(ImageEditBackend::new(client, &config.edit_model, &config.size)?)
        },
    };
    Ok(backend)
}
