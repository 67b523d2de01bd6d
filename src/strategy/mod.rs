mod factorization;
mod idw;
mod knn;
mod mean;
mod spacematrix;

pub use factorization::FactorizationStrategy;
pub use idw::{idw_weights, IdwStrategy, MIN_DISTANCE};
pub use knn::KnnStrategy;
pub use mean::MeanStrategy;
pub use spacematrix::{
    ClassifierKind, ClusterProfile, Spacematrix, SpacematrixModel, SpacematrixStrategy, TypologyClassifier,
    UNCLUSTERED,
};

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{dataset::BlockTable, error::{ImputeError, Result}};

/// One way of estimating the target features of unknown blocks from known blocks.
pub trait ImputationStrategy {
    /// Short name for logging.
    fn name(&self) -> &'static str;

    /// Columns the strategy reads in addition to the target `features`.
    fn auxiliary_columns(&self, features: &[String]) -> Vec<String>;

    /// Estimate `features` for every row of `unknown`, fitting only on `known`.
    /// Returns an `unknown.len() × features.len()` matrix. `known` is never empty.
    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>>;

    /// Error raised when a required column is absent from the dataset.
    fn missing_column(&self, column: &str) -> ImputeError {
        ImputeError::MissingColumn(column.to_string())
    }
}

/// The closed set of available strategies, selectable from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    Mean,
    #[serde(alias = "knn")]
    SpatialKnn(KnnStrategy),
    Idw(IdwStrategy),
    Spacematrix(SpacematrixStrategy),
    #[serde(alias = "nmf")]
    Factorization(FactorizationStrategy),
}

impl Strategy {
    fn inner(&self) -> &dyn ImputationStrategy {
        match self {
            Strategy::Mean => &MeanStrategy,
            Strategy::SpatialKnn(s) => s,
            Strategy::Idw(s) => s,
            Strategy::Spacematrix(s) => s,
            Strategy::Factorization(s) => s,
        }
    }

    /// Check parameters that would make any fit meaningless.
    pub fn validate(&self) -> Result<()> {
        match self {
            Strategy::Mean => Ok(()),
            Strategy::SpatialKnn(s) => check_positive("k", s.neighbors.k),
            Strategy::Idw(s) => check_positive("k", s.neighbors.k),
            Strategy::Spacematrix(s) => {
                check_positive("n_clusters", s.n_clusters)?;
                s.blend_knn.map_or(Ok(()), |search| check_positive("blend_knn.k", search.k))
            }
            Strategy::Factorization(s) => {
                check_positive("rank", s.rank)?;
                check_positive("max_iter", s.max_iter)?;
                check_positive("bootstrap.k", s.bootstrap.k)
            }
        }
    }
}

fn check_positive(name: &str, value: usize) -> Result<()> {
    if value == 0 {
        return Err(ImputeError::InvalidParameter(format!("{name} must be positive")));
    }
    Ok(())
}

impl ImputationStrategy for Strategy {
    fn name(&self) -> &'static str { self.inner().name() }

    fn auxiliary_columns(&self, features: &[String]) -> Vec<String> {
        self.inner().auxiliary_columns(features)
    }

    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>> {
        self.inner().impute(known, unknown, features)
    }

    fn missing_column(&self, column: &str) -> ImputeError {
        self.inner().missing_column(column)
    }
}

impl From<MeanStrategy> for Strategy {
    fn from(_: MeanStrategy) -> Self { Strategy::Mean }
}

impl From<KnnStrategy> for Strategy {
    fn from(s: KnnStrategy) -> Self { Strategy::SpatialKnn(s) }
}

impl From<IdwStrategy> for Strategy {
    fn from(s: IdwStrategy) -> Self { Strategy::Idw(s) }
}

impl From<SpacematrixStrategy> for Strategy {
    fn from(s: SpacematrixStrategy) -> Self { Strategy::Spacematrix(s) }
}

impl From<FactorizationStrategy> for Strategy {
    fn from(s: FactorizationStrategy) -> Self { Strategy::Factorization(s) }
}

/// Dense copy of `columns`, failing on the first missing value.
pub(crate) fn finite_matrix(table: &BlockTable, columns: &[String]) -> Result<Array2<f64>> {
    let matrix = table.matrix(columns)?;
    for ((row, col), value) in matrix.indexed_iter() {
        if !value.is_finite() {
            return Err(ImputeError::MissingValue { column: columns[col].clone(), id: table.ids()[row] });
        }
    }
    Ok(matrix)
}

/// Row-wise mean of each neighbor set's feature rows.
pub(crate) fn neighbor_means(values: &Array2<f64>, neighbors: &[crate::spatial::NeighborQuery]) -> Array2<f64> {
    let mut result = Array2::zeros((neighbors.len(), values.ncols()));
    for (mut row, query) in result.rows_mut().into_iter().zip(neighbors) {
        let gathered = query.gather(values);
        if let Some(mean) = gathered.mean_axis(ndarray::Axis(0)) { row.assign(&mean) }
    }
    result
}
