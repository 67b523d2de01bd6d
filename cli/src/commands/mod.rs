pub mod evaluate;
pub mod impute;

use anyhow::{bail, Context, Result};
use blockfill::{
    FactorizationStrategy, IdwStrategy, ImputerConfig, KnnStrategy, SpacematrixStrategy, Strategy,
};

use crate::cli::{StrategyArgs, StrategyName};

fn default_strategy(name: StrategyName) -> Strategy {
    match name {
        StrategyName::Mean => Strategy::Mean,
        StrategyName::Knn => KnnStrategy::default().into(),
        StrategyName::Idw => IdwStrategy::default().into(),
        StrategyName::Spacematrix => SpacematrixStrategy::default().into(),
        StrategyName::Nmf => FactorizationStrategy::default().into(),
    }
}

/// Resolve the imputer configuration from `--config` and `--strategy`.
/// A `--strategy` different from the configured one replaces it with its defaults.
pub fn load_config(args: &StrategyArgs) -> Result<ImputerConfig> {
    let config = match &args.config {
        Some(path) => Some(ImputerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?),
        None => None,
    };

    let config = match (config, args.strategy) {
        (Some(mut config), Some(name)) => {
            let strategy = default_strategy(name);
            if std::mem::discriminant(&strategy) != std::mem::discriminant(&config.strategy) {
                config.strategy = strategy;
            }
            config
        }
        (Some(config), None) => config,
        (None, Some(name)) => ImputerConfig::from(default_strategy(name)),
        (None, None) => bail!("either --strategy or --config is required"),
    };

    config.validate().context("invalid imputer configuration")?;
    tracing::debug!("[config] {config:?}");
    Ok(config)
}
