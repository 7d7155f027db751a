//! Pipeline dispatcher
//!
//! Runs preprocessing and the selected strategy for one request and folds
//! every outcome, including worker panics, into a [`ProcessingResult`].

use crate::{
    config::{PipelineConfig, ResizePolicy},
    error::{ErrorKind, ProcessingError, Result},
    preprocessor::ImagePreprocessor,
    strategy::{join_error_message, ImageStrategy, StrategyRegistry},
    tracing_config::{events, spans},
    types::{ImageBlob, ProcessingRequest, ProcessingResult},
};
use instant::Instant;
use std::sync::Arc;
use tracing::{info, Instrument};

/// Selects and runs strategies; holds no per-request state
#[derive(Debug, Clone)]
pub struct PipelineDispatcher {
    config: Arc<PipelineConfig>,
    registry: StrategyRegistry,
}

impl PipelineDispatcher {
    #[must_use]
    pub fn new(config: Arc<PipelineConfig>, registry: StrategyRegistry) -> Self {
        Self { config, registry }
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request to completion
    ///
    /// Never panics and never returns an error: failures of either stage come
    /// back as [`ProcessingResult::Failure`]. The work runs on its own task, so
    /// dropping this future lets an in-flight run finish and discards its result.
    pub async fn run(&self, request: ProcessingRequest) -> ProcessingResult {
        let (request_id, raw, strategy_id) = request.into_parts();
        let span = spans::request(&request_id, strategy_id);

        let Some(strategy) = self.registry.get(strategy_id) else {
            let result = ProcessingResult::failure(
                ErrorKind::Internal,
                format!("No strategy registered for {strategy_id}"),
            );
            span.in_scope(|| events::run_failed(&ErrorKind::Internal, "strategy not registered"));
            return result;
        };

        let start = Instant::now();
        let policy = self.config.resize;
        let handle = tokio::spawn(Self::execute(strategy, raw, policy).instrument(span.clone()));

        let result = match handle.await {
            Ok(Ok(blob)) => ProcessingResult::success(blob, strategy_id.delivery_mode()),
            Ok(Err(error)) => ProcessingResult::from(error),
            Err(join_error) => ProcessingResult::failure(
                strategy_id.failure_kind(),
                join_error_message(join_error),
            ),
        };

        span.in_scope(|| match &result {
            ProcessingResult::Success { blob, delivery } => info!(
                bytes = blob.len(),
                delivery = ?delivery,
                duration_ms = start.elapsed().as_millis() as u64,
                "Pipeline run succeeded"
            ),
            ProcessingResult::Failure { kind, message } => events::run_failed(kind, message),
        });

        result
    }

    async fn execute(
        strategy: Arc<dyn ImageStrategy>,
        raw: Vec<u8>,
        policy: ResizePolicy,
    ) -> Result<ImageBlob> {
        let mode = strategy.id().color_mode();
        let preprocess_span = spans::preprocessing(raw.len(), policy.max_side);

        let start = Instant::now();
        let prepared = tokio::task::spawn_blocking(move || {
            let _entered = preprocess_span.enter();
            ImagePreprocessor::prepare(&raw, mode, &policy)
        })
        .await
        .map_err(|e| ProcessingError::internal(join_error_message(e)))??;
        events::stage_timing("preprocess", start.elapsed().as_millis() as u64);

        let start = Instant::now();
        let output = strategy.apply(prepared).await?;
        events::stage_timing(strategy.name(), start.elapsed().as_millis() as u64);

        Ok(output)
    }
}
