#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Rugcut
//!
//! Rug photo pipeline: takes a photo of a rug and either cuts the rug out of its
//! background with a local segmentation model, or asks a remote image API to
//! place it in a photorealistic interior.
//!
//! Every photo goes through the same path:
//!
//! 1. [`ImagePreprocessor`] decodes it, downscales it so the longest edge is at
//!    most `max_side` and re-encodes it in the form the strategy wants (lossless
//!    RGBA PNG for background removal, RGB JPEG for compositing).
//! 2. The [`PipelineDispatcher`] hands the prepared image to the selected
//!    [`ImageStrategy`] on a worker task.
//! 3. The outcome comes back as a [`ProcessingResult`], never as a panic.
//!
//! [`RequestHandler`] sits between a chat transport and the dispatcher and turns
//! results into document, photo or text replies.
//!
//! ## Feature Flags
//!
//! - `tract` (default): pure Rust ONNX inference for background removal
//! - `cli` (default): the `rugcut` binary, progress bars and tracing setup
//! - `webp-support` (default): WebP input decoding
//! - `tracing-json`: JSON log lines
//! - `tracing-files`: log to rolling files
//!
//! ## Example
//!
//! ```rust,no_run
//! use rugcut::{
//!     BackgroundRemovalStrategy, PipelineConfig, PipelineDispatcher, ProcessingRequest,
//!     StrategyId, StrategyRegistry, TractSegmentationModel,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PipelineConfig::builder().model_path("models/rug.onnx").build()?;
//! let model = TractSegmentationModel::load(&config.model)?;
//! let registry = StrategyRegistry::new()
//!     .with(Arc::new(BackgroundRemovalStrategy::new(Arc::new(model))));
//!
//! let dispatcher = PipelineDispatcher::new(Arc::new(config), registry);
//! let raw = std::fs::read("rug.jpg")?;
//! let result = dispatcher
//!     .run(ProcessingRequest::new(raw, StrategyId::RemoveBackground))
//!     .await;
//! println!("success: {}", result.is_success());
//! # Ok(())
//! # }
//! ```

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod inference;
pub mod preprocessor;
pub mod remote;
pub mod services;
pub mod strategy;
pub mod tracing_config;
pub mod types;
pub mod utils;

#[cfg(feature = "tract")]
pub use backends::TractSegmentationModel;
pub use config::{
    ColorMode, CompositingApi, ModelConfig, PipelineConfig, PipelineConfigBuilder, RemoteConfig,
    ResizePolicy, StrategyId,
};
pub use dispatcher::PipelineDispatcher;
pub use error::{ErrorKind, ProcessingError, Result};
pub use handler::{
    ChatTransport, OutboundArtifact, PhotoEvent, PhotoSize, ReplyMessages, ReplyTarget,
    RequestHandler,
};
pub use inference::{ModelOutput, SegmentationModel};
pub use preprocessor::ImagePreprocessor;
pub use remote::{ImageEditBackend, RemoteClient, ResponsesBackend};
pub use services::OutputFormatHandler;
pub use strategy::{
    BackgroundRemovalStrategy, CompositingBackend, ImageStrategy, InteriorCompositingStrategy,
    StrategyRegistry, INTERIOR_PROMPT,
};
pub use types::{DeliveryMode, ImageBlob, ProcessingRequest, ProcessingResult};

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
pub use tracing_config::{events, spans, TracingConfig, TracingFormat, TracingOutput};
