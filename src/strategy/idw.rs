use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{centroid_columns, BlockTable},
    error::Result,
    spatial::{IndexAlgorithm, NeighborSearch},
};
use super::{finite_matrix, ImputationStrategy};

/// Distances are clipped to this floor before inversion.
pub const MIN_DISTANCE: f64 = 1e-6;

/// Normalized inverse-squared-distance weights, `wᵢ ∝ 1 / max(dᵢ, ε)²`.
pub fn idw_weights(distances: &[f64]) -> Vec<f64> {
    let raw = distances.iter()
        .map(|&d| 1.0 / d.max(MIN_DISTANCE).powi(2))
        .collect::<Vec<f64>>();
    let total = raw.iter().sum::<f64>();
    raw.into_iter().map(|w| w / total).collect()
}

/// Inverse-distance-weighted mean of the k spatially nearest known blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdwStrategy {
    #[serde(flatten)]
    pub neighbors: NeighborSearch,
}

impl IdwStrategy {
    pub fn new(k: usize) -> Self {
        Self { neighbors: NeighborSearch::new(k) }
    }

    pub fn with_algorithm(mut self, algorithm: IndexAlgorithm) -> Self {
        self.neighbors = self.neighbors.with_algorithm(algorithm);
        self
    }
}

impl ImputationStrategy for IdwStrategy {
    fn name(&self) -> &'static str { "idw" }

    fn auxiliary_columns(&self, _features: &[String]) -> Vec<String> { centroid_columns() }

    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>> {
        let values = finite_matrix(known, features)?;
        let neighbors = self.neighbors.neighbors(known, unknown)?;

        let mut result = Array2::zeros((unknown.len(), features.len()));
        for (mut row, query) in result.rows_mut().into_iter().zip(&neighbors) {
            let weights = Array1::from(idw_weights(&query.distances));
            row.assign(&weights.dot(&query.gather(&values)));
        }
        Ok(result)
    }
}
