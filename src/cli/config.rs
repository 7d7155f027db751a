//! Turns CLI arguments and the environment into pipeline configuration

use crate::cli::main_impl::{Cli, CliApi, CliStrategy};
use crate::{
    config::{CompositingApi, PipelineConfig, PipelineConfigBuilder, StrategyId},
    strategy::{InteriorCompositingStrategy, StrategyRegistry},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Environment first, then explicit flags on top
    pub(crate) fn from_cli(cli: &Cli) -> Result<PipelineConfig> {
        let base = PipelineConfig::from_env().context("Invalid environment configuration")?;
        Self::apply(cli, base)
    }

    fn apply(cli: &Cli, base: PipelineConfig) -> Result<PipelineConfig> {
        let mut builder = PipelineConfigBuilder::from(base);

        if let Some(strategy) = cli.strategy {
            builder = builder.strategy(match strategy {
                CliStrategy::Cut => StrategyId::RemoveBackground,
                CliStrategy::Interior => StrategyId::InteriorCompositing,
            });
        }
        if let Some(api) = cli.api {
            builder = builder.compositing_api(match api {
                CliApi::Responses => CompositingApi::Responses,
                CliApi::Edit => CompositingApi::ImageEdit,
            });
        }
        if let Some(model) = &cli.model {
            builder = builder.model_path(model.clone());
        }
        if let Some(max_side) = cli.max_side {
            builder = builder.max_side(max_side);
        }
        if let Some(quality) = cli.jpeg_quality {
            builder = builder.jpeg_quality(quality);
        }
        if let Some(size) = &cli.size {
            builder = builder.size(size.clone());
        }
        if let Some(secs) = cli.timeout {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(url) = &cli.base_url {
            builder = builder.base_url(url.clone());
        }

        builder.build().context("Invalid configuration")
    }

    /// Load only what the selected strategy needs
    pub(crate) fn build_registry(config: &PipelineConfig) -> Result<StrategyRegistry> {
        let mut registry = StrategyRegistry::new();

        match config.strategy {
            StrategyId::RemoveBackground => {
                registry.register(Self::removal_strategy(config)?);
            },
            StrategyId::InteriorCompositing => {
                let strategy = InteriorCompositingStrategy::from_config(&config.remote)
                    .context("Failed to set up the remote image API client")?;
                registry.register(Arc::new(strategy));
            },
        }

        Ok(registry)
    }

    #[cfg(feature = "tract")]
    fn removal_strategy(
        config: &PipelineConfig,
    ) -> Result<Arc<dyn crate::strategy::ImageStrategy>> {
        use crate::backends::TractSegmentationModel;
        use crate::strategy::BackgroundRemovalStrategy;

        let model = TractSegmentationModel::load(&config.model)
            .context("Failed to load the segmentation model")?;
        Ok(Arc::new(BackgroundRemovalStrategy::new(Arc::new(model))))
    }

    #[cfg(not(feature = "tract"))]
    fn removal_strategy(
        _config: &PipelineConfig,
    ) -> Result<Arc<dyn crate::strategy::ImageStrategy>> {
        anyhow::bail!("Background removal needs the `tract` feature")
    }
}
