//! Image edit call with a file attachment

use super::{decode_base64, RemoteClient};
use crate::{
    config::{parse_size, CompositingApi},
    error::{ProcessingError, Result},
    strategy::CompositingBackend,
    types::ImageBlob,
};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

/// Uploads the photo to the edit endpoint and asks for one edited image
#[derive(Debug, Clone)]
pub struct ImageEditBackend {
    client: RemoteClient,
    model: String,
    size: String,
}

#[derive(Debug, Deserialize)]
struct EditReply {
    #[serde(default)]
    data: Vec<EditedImage>,
}

#[derive(Debug, Deserialize)]
struct EditedImage {
    #[serde(default)]
    b64_json: Option<String>,
}

impl ImageEditBackend {
    /// # Errors
    /// `InvalidConfig` when `size` is not `<width>x<height>` or `auto`.
    pub fn new(client: RemoteClient, model: &str, size: &str) -> Result<Self> {
        parse_size(size)?;
        Ok(Self {
            client,
            model: model.to_string(),
            size: size.to_string(),
        })
    }

    fn form(&self, image: &ImageBlob, prompt: &str) -> Result<Form> {
        let file_name = format!("rug.{}", image.extension());
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(file_name)
            .mime_str(image.mime_type())
            .map_err(|e| ProcessingError::internal(format!("Invalid upload MIME type: {e}")))?;

        Ok(Form::new()
            .text("model", self.model.clone())
            .text("prompt", prompt.to_string())
            .text("size", self.size.clone())
            .text("n", "1")
            .part("image", part))
    }

    fn extract_image(reply: EditReply) -> Result<Vec<u8>> {
        let payload = reply
            .data
            .into_iter()
            .next()
            .and_then(|item| item.b64_json)
            .filter(|b64| !b64.is_empty())
            .ok_or_else(|| ProcessingError::no_image("edit reply has no b64_json data"))?;
        decode_base64(&payload)
    }
}

#[async_trait]
impl CompositingBackend for ImageEditBackend {
    fn api(&self) -> CompositingApi {
        CompositingApi::ImageEdit
    }

    fn endpoint(&self) -> String {
        self.client.endpoint("/images/edits")
    }

    async fn generate(&self, image: &ImageBlob, prompt: &str) -> Result<Vec<u8>> {
        let form = self.form(image, prompt)?;
        let reply: EditReply = self.client.post_multipart("/images/edits", form).await?;
        Self::extract_image(reply)
    }
}
