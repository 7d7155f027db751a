//! Tracing configuration for structured logging
//!
//! The library only emits spans and events. Installing a subscriber is left
//! to the binary, which builds a [`TracingConfig`] from its command line.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Colored compact console output (default)
    Console,
    /// Plain compact output for CI logs
    Compact,
    /// JSON lines for log shippers
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Where log lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TracingOutput {
    /// stderr only
    Console,
    /// A single log file
    #[cfg(feature = "tracing-files")]
    File(std::path::PathBuf),
    /// stderr plus a daily-rotated file
    #[cfg(feature = "tracing-files")]
    Both(std::path::PathBuf),
}

/// Subscriber settings
#[derive(Debug)]
pub struct TracingConfig {
    /// `-v` count
    pub verbosity: u8,
    pub format: TracingFormat,
    pub output: TracingOutput,
    /// Explicit filter directive, wins over verbosity
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            output: TracingOutput::Console,
            env_filter: None,
        }
    }
}

/// Keeps background log writers alive; drop it only at process exit
#[derive(Debug, Default)]
#[must_use = "dropping the guard stops file logging"]
pub struct TracingGuard {
    #[cfg(feature = "tracing-files")]
    _file: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl TracingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: TracingOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Map `-v` count to a filter directive
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<TracingGuard> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(directive) => EnvFilter::try_new(directive)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };
        let registry = Registry::default().with(filter);
        #[allow(unused_mut)]
        let mut guard = TracingGuard::default();

        match (&self.format, &self.output) {
            (TracingFormat::Console, TracingOutput::Console) => {
                registry
                    .with(
                        fmt::layer()
                            .with_writer(std::io::stderr)
                            .with_ansi(true)
                            .with_target(false)
                            .compact(),
                    )
                    .try_init()?;
            },

            (TracingFormat::Compact, TracingOutput::Console) => {
                registry
                    .with(
                        fmt::layer()
                            .with_writer(std::io::stderr)
                            .with_ansi(false)
                            .with_target(false)
                            .compact(),
                    )
                    .try_init()?;
            },

            #[cfg(feature = "tracing-json")]
            (TracingFormat::Json, TracingOutput::Console) => {
                registry
                    .with(
                        fmt::layer()
                            .json()
                            .with_writer(std::io::stderr)
                            .with_current_span(true)
                            .with_span_list(true),
                    )
                    .try_init()?;
            },

            #[cfg(feature = "tracing-files")]
            (format, TracingOutput::File(path)) => {
                let (writer, file_guard) = tracing_appender::non_blocking(
                    tracing_appender::rolling::never(log_dir(path), log_name(path, "rugcut.log")),
                );
                guard._file = Some(file_guard);

                match format {
                    #[cfg(feature = "tracing-json")]
                    TracingFormat::Json => registry
                        .with(fmt::layer().json().with_writer(writer).with_current_span(true))
                        .try_init()?,
                    _ => registry
                        .with(fmt::layer().with_ansi(false).with_writer(writer).compact())
                        .try_init()?,
                }
            },

            #[cfg(feature = "tracing-files")]
            (format, TracingOutput::Both(path)) => {
                let (writer, file_guard) = tracing_appender::non_blocking(
                    tracing_appender::rolling::daily(log_dir(path), log_name(path, "rugcut")),
                );
                guard._file = Some(file_guard);

                let file_layer = fmt::layer().with_ansi(false).with_writer(writer).compact();
                let console_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(*format == TracingFormat::Console)
                    .with_target(false)
                    .compact();

                registry.with(console_layer).with(file_layer).try_init()?;
            },
        }

        Ok(guard)
    }
}

#[cfg(feature = "tracing-files")]
fn log_dir(path: &std::path::Path) -> &std::path::Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."))
}

#[cfg(feature = "tracing-files")]
fn log_name<'a>(path: &'a std::path::Path, fallback: &'static str) -> &'a std::ffi::OsStr {
    path.file_name()
        .unwrap_or_else(|| std::ffi::OsStr::new(fallback))
}

/// Install console tracing with CLI defaults
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<TracingGuard> {
    TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(TracingFormat::Console)
        .init()
}

/// Span helpers for pipeline stages
pub mod spans {
    use crate::config::StrategyId;
    use tracing::{Level, Span};

    /// One pipeline run
    pub fn request(request_id: &str, strategy: StrategyId) -> Span {
        tracing::span!(
            Level::INFO,
            "request",
            request_id = %request_id,
            strategy = %strategy
        )
    }

    pub fn preprocessing(input_bytes: usize, max_side: u32) -> Span {
        tracing::span!(
            Level::DEBUG,
            "preprocessing",
            input_bytes = input_bytes,
            max_side = max_side
        )
    }

    pub fn strategy(name: &str) -> Span {
        tracing::span!(Level::DEBUG, "strategy", name = %name)
    }

    /// An outbound call to the remote image API
    pub fn remote_call(api: &str, endpoint: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "remote_call",
            api = %api,
            endpoint = %endpoint
        )
    }

    pub fn model_inference(model_name: &str, dimensions: (u32, u32)) -> Span {
        tracing::span!(
            Level::DEBUG,
            "model_inference",
            model_name = %model_name,
            width = dimensions.0,
            height = dimensions.1
        )
    }
}

/// Event helpers for recurring log lines
pub mod events {
    use tracing::{debug, warn};

    /// Stage duration in milliseconds
    pub fn stage_timing(stage: &str, duration_ms: u64) {
        debug!(stage = %stage, duration_ms = duration_ms, "Stage finished");
    }

    /// A run ended in a failure result
    pub fn run_failed(kind: &dyn std::fmt::Display, message: &str) {
        warn!(kind = %kind, error = %message, "Pipeline run failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_mapping() {
        assert_eq!(TracingConfig::new().with_verbosity(0).verbosity_to_filter(), "info");
        assert_eq!(TracingConfig::new().with_verbosity(1).verbosity_to_filter(), "debug");
        assert_eq!(TracingConfig::new().with_verbosity(2).verbosity_to_filter(), "trace");
        assert_eq!(TracingConfig::new().with_verbosity(9).verbosity_to_filter(), "trace");
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::new()
            .with_verbosity(2)
            .with_format(TracingFormat::Compact)
            .with_env_filter("rugcut=debug");

        assert_eq!(config.verbosity, 2);
        assert_eq!(config.format, TracingFormat::Compact);
        assert_eq!(config.env_filter.as_deref(), Some("rugcut=debug"));
        assert_eq!(config.output, TracingOutput::Console);
    }

    #[test]
    fn test_spans_can_be_entered_without_subscriber() {
        let span = spans::request("abc", crate::config::StrategyId::RemoveBackground);
        let _entered = span.enter();
        events::stage_timing("preprocess", 3);
    }
}
