use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    dataset::{BlockDataset, DEFAULT_FEATURES},
    error::{ImputeError, Result},
    imputer::Imputer,
    strategy::Strategy,
};

fn default_features() -> Vec<String> {
    DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()
}

/// Imputation settings as read from JSON, e.g.
/// `{"features": ["footprint_area"], "strategy": "idw", "k": 8}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputerConfig {
    #[serde(default = "default_features")]
    pub features: Vec<String>,
    #[serde(flatten)]
    pub strategy: Strategy,
}

impl From<Strategy> for ImputerConfig {
    fn from(strategy: Strategy) -> Self {
        Self { features: default_features(), strategy }
    }
}

impl ImputerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        tracing::debug!("[config] reading {}", path.display());
        Self::from_json_str(&fs::read_to_string(path)?)
    }

    /// Reject parameter values no fit can work with.
    pub fn validate(&self) -> Result<()> {
        if self.features.is_empty() {
            return Err(ImputeError::InvalidParameter("features must not be empty".into()));
        }
        self.strategy.validate()
    }

    /// Validate and build an imputer over `dataset`.
    pub fn imputer(&self, dataset: &BlockDataset) -> Result<Imputer> {
        self.validate()?;
        Imputer::new(dataset, self.features.clone(), self.strategy.clone())
    }
}
