//! Configuration types for the rug photo pipeline

use crate::error::{ErrorKind, ProcessingError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default upper bound for the longer image edge after preprocessing
pub const DEFAULT_MAX_SIDE: u32 = 1600;

/// Default JPEG quality for images sent to the remote API
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Default OpenAI-compatible API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Which image transformation a request runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyId {
    /// Strip the background with the local segmentation model
    RemoveBackground,
    /// Place the rug into a generated interior via the remote API
    InteriorCompositing,
}

impl StrategyId {
    /// Color mode the preprocessor must normalize to for this strategy
    #[must_use]
    pub fn color_mode(self) -> ColorMode {
        match self {
            // Alpha is filled in by the model downstream
            Self::RemoveBackground => ColorMode::Rgba,
            Self::InteriorCompositing => ColorMode::Rgb,
        }
    }

    /// How the transport should render the finished artifact
    #[must_use]
    pub fn delivery_mode(self) -> crate::types::DeliveryMode {
        match self {
            Self::RemoveBackground => crate::types::DeliveryMode::Document,
            Self::InteriorCompositing => crate::types::DeliveryMode::Photo,
        }
    }

    /// Failure category used when the strategy's worker dies without an error value
    #[must_use]
    pub fn failure_kind(self) -> ErrorKind {
        match self {
            Self::RemoveBackground => ErrorKind::ModelFailure,
            Self::InteriorCompositing => ErrorKind::RemoteFailure,
        }
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RemoveBackground => write!(f, "remove-background"),
            Self::InteriorCompositing => write!(f, "interior-compositing"),
        }
    }
}

impl std::str::FromStr for StrategyId {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove-background" | "remove_background" | "cut" | "removal" => {
                Ok(Self::RemoveBackground)
            },
            "interior-compositing" | "interior_compositing" | "interior" | "compositing" => {
                Ok(Self::InteriorCompositing)
            },
            other => Err(ProcessingError::invalid_config(format!(
                "Unknown strategy '{other}' (expected remove-background or interior-compositing)"
            ))),
        }
    }
}

/// Pixel layout the preprocessor converts inbound images to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    /// 8-bit RGB, no alpha (some generative APIs reject alpha)
    Rgb,
    /// 8-bit RGBA
    Rgba,
}

/// Request shape used to talk to the remote image API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositingApi {
    /// Multimodal generation endpoint with an image-generation tool
    Responses,
    /// Image edit endpoint with a file attachment
    ImageEdit,
}

impl Default for CompositingApi {
    fn default() -> Self {
        Self::Responses
    }
}

impl std::fmt::Display for CompositingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Responses => write!(f, "responses"),
            Self::ImageEdit => write!(f, "image-edit"),
        }
    }
}

impl std::str::FromStr for CompositingApi {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "responses" | "vision" | "generation" => Ok(Self::Responses),
            "image-edit" | "image_edit" | "edit" | "edits" => Ok(Self::ImageEdit),
            other => Err(ProcessingError::invalid_config(format!(
                "Unknown compositing API '{other}' (expected responses or image-edit)"
            ))),
        }
    }
}

/// Bounds applied to every inbound image before a strategy sees it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResizePolicy {
    /// Maximum length of the longer edge in pixels; larger images are downscaled
    pub max_side: u32,
    /// JPEG quality for the lossy encoding used on the compositing path (1-100)
    pub jpeg_quality: u8,
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_MAX_SIDE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Remote image API settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Bearer credential; never logged
    #[serde(skip_serializing, default)]
    pub api_key: String,
    /// API base URL without trailing slash
    pub base_url: String,
    /// Request shape to use
    pub api: CompositingApi,
    /// Model for the multimodal generation call
    pub vision_model: String,
    /// Model for the image edit call
    pub edit_model: String,
    /// Requested output size for the edit call, e.g. "1024x1024"
    pub size: String,
    /// Deadline for one remote call
    pub timeout: Duration,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api: CompositingApi::default(),
            vision_model: "gpt-4.1".to_string(),
            edit_model: "gpt-image-1".to_string(),
            size: "1024x1024".to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_empty() {
            "<unset>"
        } else {
            "<redacted>"
        };
        f.debug_struct("RemoteConfig")
            .field("api_key", &key)
            .field("base_url", &self.base_url)
            .field("api", &self.api)
            .field("vision_model", &self.vision_model)
            .field("edit_model", &self.edit_model)
            .field("size", &self.size)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Local segmentation model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Path to an ONNX segmentation model (ISNet / U2-Net family)
    pub model_path: Option<PathBuf>,
    /// Square input resolution expected by the model
    pub input_size: u32,
    /// Per-channel normalization mean (RGB, 0-1 range)
    pub normalization_mean: [f32; 3],
    /// Per-channel normalization standard deviation (RGB)
    pub normalization_std: [f32; 3],
}

impl Default for ModelConfig {
    fn default() -> Self {
        // isnet-general-use defaults
        Self {
            model_path: None,
            input_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Process-wide configuration, built once at startup and passed by reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Resize and encoding bounds
    pub resize: ResizePolicy,
    /// Strategy used for inbound photos
    pub strategy: StrategyId,
    /// Remote image API settings
    pub remote: RemoteConfig,
    /// Local segmentation model settings
    pub model: ModelConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            resize: ResizePolicy::default(),
            strategy: StrategyId::RemoveBackground,
            remote: RemoteConfig::default(),
            model: ModelConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rugcut::config::{PipelineConfig, StrategyId};
    ///
    /// let config = PipelineConfig::builder()
    ///     .strategy(StrategyId::InteriorCompositing)
    ///     .api_key("sk-test")
    ///     .max_side(1200)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.resize.max_side, 1200);
    /// ```
    #[must_use]
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::new()
    }

    /// Build a configuration from process environment variables
    ///
    /// Unset variables keep their defaults. Values that are present but cannot be
    /// parsed are reported as `InvalidConfig`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = PipelineConfigBuilder::new();

        if let Some(key) = lookup("OPENAI_API_KEY") {
            builder = builder.api_key(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            builder = builder.base_url(url);
        }
        if let Some(strategy) = lookup("RUGCUT_STRATEGY") {
            builder = builder.strategy(strategy.parse()?);
        }
        if let Some(api) = lookup("RUGCUT_COMPOSITING_API") {
            builder = builder.compositing_api(api.parse()?);
        }
        if let Some(max_side) = lookup("RUGCUT_MAX_SIDE") {
            builder = builder.max_side(parse_number("RUGCUT_MAX_SIDE", &max_side)?);
        }
        if let Some(quality) = lookup("RUGCUT_JPEG_QUALITY") {
            builder = builder.jpeg_quality(parse_number("RUGCUT_JPEG_QUALITY", &quality)?);
        }
        if let Some(size) = lookup("RUGCUT_EDIT_SIZE") {
            builder = builder.size(size);
        }
        if let Some(secs) = lookup("RUGCUT_REMOTE_TIMEOUT_SECS") {
            let secs: u64 = parse_number("RUGCUT_REMOTE_TIMEOUT_SECS", &secs)?;
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(path) = lookup("RUGCUT_MODEL_PATH") {
            builder = builder.model_path(path);
        }

        Ok(builder.config)
    }

    /// Validate the configuration for the selected strategy
    ///
    /// # Errors
    /// - `max_side` of zero
    /// - JPEG quality outside 1-100
    /// - malformed edit `size` or zero timeout
    /// - interior compositing without an API key
    pub fn validate(&self) -> Result<()> {
        if self.resize.max_side == 0 {
            return Err(ProcessingError::config_value_error(
                "max_side",
                self.resize.max_side,
                "1-65535",
            ));
        }
        if self.resize.jpeg_quality == 0 || self.resize.jpeg_quality > 100 {
            return Err(ProcessingError::config_value_error(
                "JPEG quality",
                self.resize.jpeg_quality,
                "1-100",
            ));
        }
        if self.remote.timeout.is_zero() {
            return Err(ProcessingError::invalid_config(
                "Remote timeout must be greater than zero",
            ));
        }
        parse_size(&self.remote.size)?;
        if self.model.input_size == 0 {
            return Err(ProcessingError::config_value_error(
                "model input size",
                self.model.input_size,
                "1-4096",
            ));
        }
        if self.strategy == StrategyId::InteriorCompositing && self.remote.api_key.trim().is_empty()
        {
            return Err(ProcessingError::invalid_config(
                "Interior compositing requires OPENAI_API_KEY",
            ));
        }
        Ok(())
    }
}

/// Builder for `PipelineConfig`
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PipelineConfig::default(),
        }
    }

    #[must_use]
    pub fn strategy(mut self, strategy: StrategyId) -> Self {
        self.config.strategy = strategy;
        self
    }

    #[must_use]
    pub fn max_side(mut self, max_side: u32) -> Self {
        self.config.resize.max_side = max_side;
        self
    }

    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.config.resize.jpeg_quality = quality.clamp(1, 100);
        self
    }

    #[must_use]
    pub fn api_key<S: Into<String>>(mut self, key: S) -> Self {
        self.config.remote.api_key = key.into();
        self
    }

    #[must_use]
    pub fn base_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.remote.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn compositing_api(mut self, api: CompositingApi) -> Self {
        self.config.remote.api = api;
        self
    }

    #[must_use]
    pub fn vision_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.remote.vision_model = model.into();
        self
    }

    #[must_use]
    pub fn edit_model<S: Into<String>>(mut self, model: S) -> Self {
        self.config.remote.edit_model = model.into();
        self
    }

    #[must_use]
    pub fn size<S: Into<String>>(mut self, size: S) -> Self {
        self.config.remote.size = size.into();
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.remote.timeout = timeout;
        self
    }

    #[must_use]
    pub fn model_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.config.model.model_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn model_input_size(mut self, size: u32) -> Self {
        self.config.model.input_size = size;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<PipelineConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl From<PipelineConfig> for PipelineConfigBuilder {
    fn from(config: PipelineConfig) -> Self {
        Self { config }
    }
}

/// Parse an edit-call size string (`"<width>x<height>"` or `"auto"`)
pub fn parse_size(size: &str) -> Result<Option<(u32, u32)>> {
    if size == "auto" {
        return Ok(None);
    }
    let invalid = || {
        ProcessingError::invalid_config(format!(
            "Invalid size '{size}' (expected <width>x<height> or auto)"
        ))
    };
    let (w, h) = size.split_once('x').ok_or_else(invalid)?;
    let width: u32 = w.parse().map_err(|_| invalid())?;
    let height: u32 = h.parse().map_err(|_| invalid())?;
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    Ok(Some((width, height)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ProcessingError::invalid_config(format!("{key} must be a number, got '{value}'"))
    })
}
