use serde::{Deserialize, Serialize};

use crate::{
    dataset::{centroid_columns, BlockTable},
    error::Result,
    strategy::finite_matrix,
};
use super::{IndexAlgorithm, NeighborIndex, NeighborQuery, DEFAULT_NEIGHBORS};

/// Neighbor-search parameters shared by every strategy that needs spatial neighbors.
/// Builds a fresh [`NeighborIndex`] over the known centroids on each query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborSearch {
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub algorithm: IndexAlgorithm,
}

fn default_k() -> usize { DEFAULT_NEIGHBORS }

impl Default for NeighborSearch {
    fn default() -> Self {
        Self { k: DEFAULT_NEIGHBORS, algorithm: IndexAlgorithm::default() }
    }
}

impl NeighborSearch {
    pub fn new(k: usize) -> Self {
        Self { k, ..Self::default() }
    }

    pub fn with_algorithm(mut self, algorithm: IndexAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// The k nearest known rows for every unknown row, by centroid distance.
    pub fn neighbors(&self, known: &BlockTable, unknown: &BlockTable) -> Result<Vec<NeighborQuery>> {
        let columns = centroid_columns();
        let index = NeighborIndex::build(finite_matrix(known, &columns)?.view(), self.k, self.algorithm)?;
        index.query(finite_matrix(unknown, &columns)?.view())
    }
}
