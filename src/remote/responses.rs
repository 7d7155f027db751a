//! Multimodal generation call with an image-generation tool

use super::{decode_base64, RemoteClient};
use crate::{
    config::CompositingApi,
    error::{ProcessingError, Result},
    strategy::CompositingBackend,
    types::ImageBlob,
};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};

/// Output item type that carries a generated image
pub const IMAGE_GENERATION_CALL: &str = "image_generation_call";

/// Sends the photo as a data URL and asks the model to generate one image
#[derive(Debug, Clone)]
pub struct ResponsesBackend {
    client: RemoteClient,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ResponsesReply {
    #[serde(default)]
    output: Vec<OutputItem>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    result: Option<String>,
}

impl ResponsesBackend {
    #[must_use]
    pub fn new(client: RemoteClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    /// JSON body for one generation request
    #[must_use]
    pub fn request_body(&self, image: &ImageBlob, prompt: &str) -> Value {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image.bytes());
        json!({
            "model": self.model,
            "input": [{
                "role": "user",
                "content": [
                    { "type": "input_text", "text": prompt },
                    {
                        "type": "input_image",
                        "image_url": format!("data:{};base64,{encoded}", image.mime_type()),
                    },
                ],
            }],
            "tools": [{ "type": "image_generation" }],
        })
    }

    /// Pick the generated image out of the reply's typed output items
    fn extract_image(reply: ResponsesReply) -> Result<Vec<u8>> {
        let item_types: Vec<String> = reply.output.iter().map(|item| item.kind.clone()).collect();
        let payload = reply
            .output
            .into_iter()
            .filter(|item| item.kind == IMAGE_GENERATION_CALL)
            .find_map(|item| item.result.filter(|result| !result.is_empty()))
            .ok_or_else(|| {
                ProcessingError::no_image(format!(
                    "no {IMAGE_GENERATION_CALL} item in output (got {item_types:?})"
                ))
            })?;
        decode_base64(&payload)
    }
}

#[async_trait]
impl CompositingBackend for ResponsesBackend {
    fn api(&self) -> CompositingApi {
        CompositingApi::Responses
    }

    fn endpoint(&self) -> String {
        self.client.endpoint("/responses")
    }

    async fn generate(&self, image: &ImageBlob, prompt: &str) -> Result<Vec<u8>> {
        let body = self.request_body(image, prompt);
        let reply: ResponsesReply = self.client.post_json("/responses", &body).await?;
        Self::extract_image(reply)
    }
}
