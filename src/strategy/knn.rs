use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{centroid_columns, BlockTable},
    error::Result,
    spatial::{IndexAlgorithm, NeighborSearch},
};
use super::{finite_matrix, neighbor_means, ImputationStrategy};

/// Unweighted mean of the k spatially nearest known blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnnStrategy {
    #[serde(flatten)]
    pub neighbors: NeighborSearch,
}

impl KnnStrategy {
    pub fn new(k: usize) -> Self {
        Self { neighbors: NeighborSearch::new(k) }
    }

    pub fn with_algorithm(mut self, algorithm: IndexAlgorithm) -> Self {
        self.neighbors = self.neighbors.with_algorithm(algorithm);
        self
    }
}

impl ImputationStrategy for KnnStrategy {
    fn name(&self) -> &'static str { "spatial_knn" }

    fn auxiliary_columns(&self, _features: &[String]) -> Vec<String> { centroid_columns() }

    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>> {
        let neighbors = self.neighbors.neighbors(known, unknown)?;
        Ok(neighbor_means(&finite_matrix(known, features)?, &neighbors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImputeError;
    use ndarray::array;

    fn columns() -> Vec<String> {
        vec!["centroid_x".into(), "centroid_y".into(), "v".into()]
    }

    #[test]
    fn averages_nearest_neighbors() {
        let known = BlockTable::new(
            vec![1, 2, 3, 4],
            columns(),
            array![[0.0, 0.0, 1.0], [1.0, 0.0, 3.0], [10.0, 0.0, 100.0], [11.0, 0.0, 200.0]],
        ).unwrap();
        let unknown = BlockTable::new(vec![5], columns(), array![[0.5, 0.1, f64::NAN]]).unwrap();

        let values = KnnStrategy::new(2).impute(&known, &unknown, &["v".into()]).unwrap();
        assert_eq!(values, array![[2.0]]);
    }

    #[test]
    fn k_larger_than_known_set_fails() {
        let known = BlockTable::new(vec![1], columns(), array![[0.0, 0.0, 1.0]]).unwrap();
        let unknown = BlockTable::new(vec![2], columns(), array![[1.0, 1.0, f64::NAN]]).unwrap();

        let result = KnnStrategy::new(5).impute(&known, &unknown, &["v".into()]);
        assert!(matches!(result, Err(ImputeError::InsufficientNeighbors { k: 5, available: 1 })));
    }

    #[test]
    fn missing_unknown_centroid_is_reported() {
        let known = BlockTable::new(vec![1], columns(), array![[0.0, 0.0, 1.0]]).unwrap();
        let unknown = BlockTable::new(vec![2], columns(), array![[f64::NAN, 1.0, f64::NAN]]).unwrap();

        let result = KnnStrategy::new(1).impute(&known, &unknown, &["v".into()]);
        assert!(matches!(result, Err(ImputeError::MissingValue { id: 2, .. })));
    }
}
