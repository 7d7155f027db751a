//! Filesystem stand-in for a chat transport
//!
//! Photo file ids are paths, reply targets are the input paths, artifacts are
//! written next to each other in the output directory and text replies go to
//! stdout (through the progress bar when one is active).

use crate::{
    error::{ProcessingError, Result},
    handler::{ChatTransport, OutboundArtifact, PhotoSize, ReplyTarget},
};
use async_trait::async_trait;
use indicatif::ProgressBar;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct FsTransport {
    output_dir: PathBuf,
    progress: Option<ProgressBar>,
}

impl FsTransport {
    /// Create the transport, making sure the output directory exists
    pub async fn new(output_dir: &Path, progress: Option<ProgressBar>) -> Result<Self> {
        if output_dir.is_file() {
            return Err(ProcessingError::invalid_config(format!(
                "Output path is a file, not a directory: {}",
                output_dir.display()
            )));
        }
        tokio::fs::create_dir_all(output_dir).await?;
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            progress,
        })
    }

    /// Where an artifact for `target` ends up
    ///
    /// Artifact names are fixed per strategy, so the input's stem is prefixed
    /// to keep a batch from overwriting itself.
    #[must_use]
    pub fn artifact_path(&self, target: &ReplyTarget, file_name: &str) -> PathBuf {
        let stem = Path::new(&target.0)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "photo".to_string());
        self.output_dir.join(format!("{stem}_{file_name}"))
    }

    fn say(&self, line: &str) {
        match &self.progress {
            Some(pb) => pb.println(line),
            None => println!("{line}"),
        }
    }

    async fn write_artifact(&self, target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()> {
        let path = self.artifact_path(target, &artifact.file_name);
        tokio::fs::write(&path, artifact.blob.bytes())
            .await
            .map_err(|e| ProcessingError::transport(format!("write {}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = artifact.blob.len(), "Artifact written");
        self.say(&format!("{target}: {} -> {}", artifact.caption, path.display()));
        Ok(())
    }
}

impl std::fmt::Debug for FsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsTransport")
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatTransport for FsTransport {
    async fn fetch_bytes(&self, photo: &PhotoSize) -> Result<Vec<u8>> {
        tokio::fs::read(&photo.file_id)
            .await
            .map_err(|e| ProcessingError::transport(format!("read {}: {e}", photo.file_id)))
    }

    async fn send_text(&self, target: &ReplyTarget, text: &str) -> Result<()> {
        self.say(&format!("{target}: {text}"));
        Ok(())
    }

    async fn send_document(&self, target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()> {
        self.write_artifact(target, artifact).await
    }

    async fn send_photo(&self, target: &ReplyTarget, artifact: OutboundArtifact) -> Result<()> {
        self.write_artifact(target, artifact).await
    }
}
