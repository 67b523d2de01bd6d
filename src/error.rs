use thiserror::Error;

use crate::dataset::BlockId;

/// Result type used throughout the imputation core.
pub type Result<T> = std::result::Result<T, ImputeError>;

/// Every failure an imputation call can surface.
/// None of these are recovered from internally; they propagate to the caller.
#[derive(Error, Debug)]
pub enum ImputeError {
    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("no known blocks to fit on")]
    EmptyTrainingSet,

    #[error("requested {k} neighbors but only {available} known blocks are available")]
    InsufficientNeighbors { k: usize, available: usize },

    #[error("cannot compute fsi/gsi: {0}")]
    RatioComputation(String),

    #[error("classifier fit failed: {0}")]
    ClassifierFit(String),

    #[error("factorization failed: {0}")]
    Factorization(String),

    #[error("duplicate block id {0}")]
    DuplicateId(BlockId),

    #[error("missing value in column '{column}' for block {id}")]
    MissingValue { column: String, id: BlockId },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("data error: {0}")]
    Data(#[from] polars::error::PolarsError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
