#![doc = "Spatial imputation of built floor area and footprint area for urban blocks"]
mod error;
mod imputer;

pub mod config;
pub mod dataset;
pub mod metrics;
pub mod model;
pub mod spatial;
pub mod strategy;

#[doc(inline)]
pub use error::{ImputeError, Result};

#[doc(inline)]
pub use imputer::Imputer;

#[doc(inline)]
pub use config::ImputerConfig;

#[doc(inline)]
pub use dataset::{read_csv, read_csv_string, write_csv, Block, BlockDataset, BlockId, BlockTable};

#[doc(inline)]
pub use metrics::{evaluate_metrics, MetricsRecord};

#[doc(inline)]
pub use strategy::{
    FactorizationStrategy, IdwStrategy, ImputationStrategy, KnnStrategy, MeanStrategy,
    SpacematrixStrategy, Strategy,
};
