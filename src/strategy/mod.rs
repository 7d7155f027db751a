//! Image strategies and their registry
//!
//! A strategy takes a preprocessed [`ImageBlob`] and returns the finished
//! artifact. Both implementations move their blocking work off the async
//! executor themselves, so callers can simply `.await` them.

pub mod compositing;
pub mod removal;

pub use compositing::{CompositingBackend, InteriorCompositingStrategy, INTERIOR_PROMPT};
pub use removal::BackgroundRemovalStrategy;

use crate::{config::StrategyId, error::Result, types::ImageBlob};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// One interchangeable image transformation
#[async_trait]
pub trait ImageStrategy: Send + Sync {
    /// Which request strategy this implementation serves
    fn id(&self) -> StrategyId;

    /// Short name for logs
    fn name(&self) -> &str;

    /// Transform a preprocessed image into the final artifact
    ///
    /// # Errors
    /// Strategy-specific failures; the dispatcher converts them into a
    /// failure result.
    async fn apply(&self, image: ImageBlob) -> Result<ImageBlob>;
}

/// Strategies keyed by the id they serve
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<StrategyId, Arc<dyn ImageStrategy>>,
}

impl StrategyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a strategy under its own id, replacing any previous one
    pub fn register(&mut self, strategy: Arc<dyn ImageStrategy>) {
        self.strategies.insert(strategy.id(), strategy);
    }

    /// Builder-style [`register`](Self::register)
    #[must_use]
    pub fn with(mut self, strategy: Arc<dyn ImageStrategy>) -> Self {
        self.register(strategy);
        self
    }

    #[must_use]
    pub fn get(&self, id: StrategyId) -> Option<Arc<dyn ImageStrategy>> {
        self.strategies.get(&id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: StrategyId) -> bool {
        self.strategies.contains_key(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.strategies.keys()).finish()
    }
}

/// Best-effort text for a worker that died instead of returning
pub(crate) fn join_error_message(error: tokio::task::JoinError) -> String {
    if error.is_cancelled() {
        return "worker task was cancelled".to_string();
    }
    match error.try_into_panic() {
        Ok(payload) => {
            let text = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            format!("worker panicked: {text}")
        },
        Err(error) => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageFormat;

    struct Echo(StrategyId);

    #[async_trait]
    impl ImageStrategy for Echo {
        fn id(&self) -> StrategyId {
            self.0
        }

        fn name(&self) -> &str {
            "echo"
        }

        async fn apply(&self, image: ImageBlob) -> Result<ImageBlob> {
            Ok(image)
        }
    }

    #[test]
    fn test_registry_keys_by_id() {
        let registry = StrategyRegistry::new()
            .with(Arc::new(Echo(StrategyId::RemoveBackground)))
            .with(Arc::new(Echo(StrategyId::RemoveBackground)));

        assert_eq!(registry.len(), 1);
        assert!(registry.contains(StrategyId::RemoveBackground));
        assert!(registry.get(StrategyId::InteriorCompositing).is_none());
    }

    #[tokio::test]
    async fn test_registered_strategy_runs() {
        let registry = StrategyRegistry::new().with(Arc::new(Echo(StrategyId::InteriorCompositing)));
        let strategy = registry.get(StrategyId::InteriorCompositing).unwrap();

        let blob = ImageBlob::new(vec![1, 2, 3], ImageFormat::Png);
        let out = strategy.apply(blob.clone()).await.unwrap();
        assert_eq!(out, blob);
    }

    #[tokio::test]
    async fn test_join_error_message_reports_panic() {
        let handle = tokio::spawn(async { panic!("boom") });
        let message = join_error_message(handle.await.unwrap_err());
        assert!(message.contains("boom"), "{message}");
    }
}
