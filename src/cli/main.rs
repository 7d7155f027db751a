//! Rug photo CLI
//!
//! Drives the same request handler a chat bot would, with the filesystem as
//! the transport: every input file is one photo event, artifacts land in the
//! output directory and text replies are printed.

use super::config::CliConfigBuilder;
use super::transport::FsTransport;
use crate::{
    dispatcher::PipelineDispatcher,
    handler::{PhotoEvent, ReplyTarget, RequestHandler},
    tracing_config::{TracingConfig, TracingFormat},
    types::ProcessingResult,
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const IMAGE_EXTENSIONS: [&str; 8] = [
    "jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif", "gif",
];

/// Rug photo pipeline: cut the rug out or place it in an interior
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rugcut")]
pub struct Cli {
    /// Input photos or directories
    #[arg(value_name = "INPUT", required = true)]
    pub input: Vec<PathBuf>,

    /// Directory for finished artifacts
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    pub output: PathBuf,

    /// Processing strategy [env: RUGCUT_STRATEGY]
    #[arg(short, long, value_enum)]
    pub strategy: Option<CliStrategy>,

    /// Remote request shape for interior compositing [env: RUGCUT_COMPOSITING_API]
    #[arg(long, value_enum)]
    pub api: Option<CliApi>,

    /// ONNX segmentation model for background removal [env: RUGCUT_MODEL_PATH]
    #[arg(short, long, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Longest edge after downscaling [env: RUGCUT_MAX_SIDE]
    #[arg(long)]
    pub max_side: Option<u32>,

    /// JPEG quality for images sent to the remote API, 1-100 [env: RUGCUT_JPEG_QUALITY]
    #[arg(long)]
    pub jpeg_quality: Option<u8>,

    /// Output size for the edit call, e.g. 1024x1024 [env: RUGCUT_EDIT_SIZE]
    #[arg(long)]
    pub size: Option<String>,

    /// Remote call timeout in seconds [env: RUGCUT_REMOTE_TIMEOUT_SECS]
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Remote API base URL [env: OPENAI_BASE_URL]
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Walk directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Photos processed at the same time (0 = number of CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log line format
    #[arg(long, value_enum, default_value_t = CliLogFormat::Console)]
    pub log_format: CliLogFormat,

    /// Also write logs to this file, rotated daily
    #[cfg(feature = "tracing-files")]
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliStrategy {
    /// Remove the background, deliver a transparent PNG
    Cut,
    /// Place the rug in a generated interior
    Interior,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliApi {
    Responses,
    Edit,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliLogFormat {
    Console,
    Compact,
    #[cfg(feature = "tracing-json")]
    Json,
}

pub async fn main() -> Result<()> {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    let _guard = init_tracing(&cli).context("Failed to initialize tracing")?;
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "Loaded environment file");
    }

    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;
    info!(
        strategy = %config.strategy,
        max_side = config.resize.max_side,
        api = %config.remote.api,
        "Starting rugcut"
    );

    let registry = CliConfigBuilder::build_registry(&config)?;
    let files = collect_inputs(&cli.input, cli.recursive)?;
    if files.is_empty() {
        anyhow::bail!("No supported image files found in the provided inputs");
    }

    let progress = (files.len() > 1).then(|| progress_bar(files.len() as u64));
    let transport = Arc::new(
        FsTransport::new(&cli.output, progress.clone())
            .await
            .with_context(|| format!("Failed to prepare output directory {}", cli.output.display()))?,
    );
    let dispatcher = PipelineDispatcher::new(Arc::new(config), registry);
    let handler = Arc::new(RequestHandler::new(dispatcher, transport));

    let start = Instant::now();
    let (succeeded, failed) = process_files(&handler, files, jobs(cli.jobs), progress.as_ref()).await;
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    info!(
        succeeded,
        failed,
        elapsed_s = %format!("{:.2}", start.elapsed().as_secs_f64()),
        "Done"
    );
    if failed > 0 {
        anyhow::bail!("{failed} of {} photo(s) failed", succeeded + failed);
    }
    Ok(())
}

fn init_tracing(cli: &Cli) -> Result<crate::tracing_config::TracingGuard> {
    let format = match cli.log_format {
        CliLogFormat::Console => TracingFormat::Console,
        CliLogFormat::Compact => TracingFormat::Compact,
        #[cfg(feature = "tracing-json")]
        CliLogFormat::Json => TracingFormat::Json,
    };

    let mut config = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        config = config.with_env_filter(filter);
    }
    #[cfg(feature = "tracing-files")]
    if let Some(path) = &cli.log_file {
        config = config.with_output(crate::tracing_config::TracingOutput::Both(path.clone()));
    }
    config.init()
}

fn jobs(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}

fn progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// Run every file through the handler, reporting in completion order
async fn process_files(
    handler: &Arc<RequestHandler>,
    files: Vec<PathBuf>,
    jobs: usize,
    progress: Option<&ProgressBar>,
) -> (usize, usize) {
    let mut results = stream::iter(files)
        .map(|path| {
            let handler = Arc::clone(handler);
            async move {
                let event = PhotoEvent::single(
                    ReplyTarget(path.display().to_string()),
                    path.display().to_string(),
                );
                let outcome = handler.handle_photo(event).await;
                (path, outcome)
            }
        })
        .buffer_unordered(jobs.max(1));

    let (mut succeeded, mut failed) = (0, 0);
    while let Some((path, outcome)) = results.next().await {
        match outcome {
            Ok(ProcessingResult::Success { .. }) => succeeded += 1,
            Ok(ProcessingResult::Failure { kind, .. }) => {
                debug!(path = %path.display(), kind = %kind, "Photo failed");
                failed += 1;
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not deliver result");
                failed += 1;
            },
        }
        if let Some(pb) = progress {
            pb.set_message(file_label(&path));
            pb.inc(1);
        }
    }
    (succeeded, failed)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Expand directories into the image files they contain
fn collect_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let depth = if recursive { usize::MAX } else { 1 };
            let mut found = Vec::new();
            for entry in walkdir::WalkDir::new(input).max_depth(depth) {
                let entry = entry
                    .with_context(|| format!("Failed to read directory {}", input.display()))?;
                if entry.file_type().is_file() && is_image_file(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            anyhow::bail!("Input not found: {}", input.display());
        }
    }

    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}
