use ndarray::{Array2, ArrayView2};
use rstar::{primitives::GeomWithData, RTree};
use serde::{Deserialize, Serialize};

use crate::error::{ImputeError, Result};

/// Default number of neighbors per query.
pub const DEFAULT_NEIGHBORS: usize = 5;

/// Underlying search structure of a [`NeighborIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexAlgorithm {
    /// R*-tree over centroids (logarithmic queries).
    #[default]
    #[serde(rename = "rtree")]
    RTree,
    /// Exhaustive scan over every known centroid.
    BruteForce,
}

/// A known centroid in the R-tree, tagged with its row in the known table.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

#[derive(Debug)]
enum Structure {
    RTree(RTree<IndexedPoint>),
    BruteForce(Vec<[f64; 2]>),
}

/// k-nearest-neighbor index over known block centroids.
#[derive(Debug)]
pub struct NeighborIndex {
    k: usize,
    size: usize,
    structure: Structure,
}

/// The k nearest known rows of one query point, ordered by increasing distance.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborQuery {
    pub indices: Vec<usize>,   // Rows of the known table
    pub distances: Vec<f64>,   // Euclidean distances, parallel to `indices`
}

impl NeighborIndex {
    /// Build an index over `points` (n × 2, columns x and y).
    /// Fails if `k` is zero or exceeds the number of points.
    pub fn build(points: ArrayView2<f64>, k: usize, algorithm: IndexAlgorithm) -> Result<Self> {
        if points.ncols() != 2 {
            return Err(ImputeError::ShapeMismatch(format!("centroids have {} columns, expected 2", points.ncols())));
        }
        let size = points.nrows();
        if k == 0 || k > size {
            return Err(ImputeError::InsufficientNeighbors { k, available: size });
        }
        if let Some(row) = points.rows().into_iter().position(|p| !(p[0].is_finite() && p[1].is_finite())) {
            return Err(ImputeError::InvalidParameter(format!("known centroid at row {row} is not finite")));
        }

        let coords = points.rows().into_iter().map(|p| [p[0], p[1]]);
        let structure = match algorithm {
            IndexAlgorithm::RTree => Structure::RTree(RTree::bulk_load(
                coords.enumerate().map(|(i, p)| IndexedPoint::new(p, i)).collect()
            )),
            IndexAlgorithm::BruteForce => Structure::BruteForce(coords.collect()),
        };

        Ok(Self { k, size, structure })
    }

    /// Get the number of neighbors returned per query.
    #[inline] pub fn k(&self) -> usize { self.k }

    /// Get the number of indexed points.
    #[inline] pub fn len(&self) -> usize { self.size }

    /// Check if the index holds no points.
    #[inline] pub fn is_empty(&self) -> bool { self.size == 0 }

    /// Query the k nearest indexed points for each row of `points` (m × 2).
    pub fn query(&self, points: ArrayView2<f64>) -> Result<Vec<NeighborQuery>> {
        if points.ncols() != 2 {
            return Err(ImputeError::ShapeMismatch(format!("query points have {} columns, expected 2", points.ncols())));
        }
        points.rows().into_iter()
            .enumerate()
            .map(|(row, p)| {
                if !(p[0].is_finite() && p[1].is_finite()) {
                    return Err(ImputeError::InvalidParameter(format!("query centroid at row {row} is not finite")));
                }
                Ok(self.nearest([p[0], p[1]]))
            })
            .collect()
    }

    /// k nearest points to `point`, ties broken by lower construction index.
    fn nearest(&self, point: [f64; 2]) -> NeighborQuery {
        let mut candidates: Vec<(f64, usize)> = match &self.structure {
            Structure::RTree(tree) => {
                // Pull past the k-th neighbor while distances tie, so the tie-break is stable.
                let mut found: Vec<(f64, usize)> = Vec::with_capacity(self.k + 1);
                for (entry, d2) in tree.nearest_neighbor_iter_with_distance_2(&point) {
                    if found.len() >= self.k && d2 > found[self.k - 1].0 { break }
                    found.push((d2, entry.data));
                }
                found
            }
            Structure::BruteForce(coords) => coords.iter()
                .enumerate()
                .map(|(i, c)| {
                    let (dx, dy) = (c[0] - point[0], c[1] - point[1]);
                    (dx * dx + dy * dy, i)
                })
                .collect(),
        };

        candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        candidates.truncate(self.k);

        NeighborQuery {
            indices: candidates.iter().map(|&(_, i)| i).collect(),
            distances: candidates.iter().map(|&(d2, _)| d2.sqrt()).collect(),
        }
    }
}

impl NeighborQuery {
    /// Rows of `values` belonging to these neighbors.
    pub fn gather(&self, values: &Array2<f64>) -> Array2<f64> {
        values.select(ndarray::Axis(0), &self.indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn grid() -> Array2<f64> {
        array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [1.0, 1.0],
            [5.0, 5.0],
            [-1.0, 0.0],
        ]
    }

    #[test]
    fn query_returns_k_sorted_neighbors() {
        let index = NeighborIndex::build(grid().view(), 3, IndexAlgorithm::RTree).unwrap();
        let result = index.query(array![[0.1, 0.1]].view()).unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].indices.len(), 3);
        assert_eq!(result[0].indices[0], 0);
        assert!(result[0].distances.windows(2).all(|w| w[0] <= w[1]));
        assert_abs_diff_eq!(result[0].distances[0], (0.02f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn ties_are_broken_by_construction_order() {
        // (1,0), (0,1), (-1,0) are all at distance 1 from the origin query.
        let points = array![[1.0, 0.0], [0.0, 1.0], [-1.0, 0.0], [0.0, -1.0], [3.0, 3.0]];
        for algorithm in [IndexAlgorithm::RTree, IndexAlgorithm::BruteForce] {
            let index = NeighborIndex::build(points.view(), 2, algorithm).unwrap();
            let result = index.query(array![[0.0, 0.0]].view()).unwrap();
            assert_eq!(result[0].indices, vec![0, 1], "{algorithm:?}");
        }
    }

    #[test]
    fn rtree_matches_brute_force() {
        let points = grid();
        let queries = array![[0.4, 0.6], [4.0, 4.0], [-3.0, 2.0], [0.5, 0.5]];
        let rtree = NeighborIndex::build(points.view(), 4, IndexAlgorithm::RTree).unwrap();
        let brute = NeighborIndex::build(points.view(), 4, IndexAlgorithm::BruteForce).unwrap();

        assert_eq!(rtree.query(queries.view()).unwrap(), brute.query(queries.view()).unwrap());
    }

    #[test]
    fn k_larger_than_known_set_fails() {
        let result = NeighborIndex::build(grid().view(), 7, IndexAlgorithm::RTree);
        assert!(matches!(result, Err(ImputeError::InsufficientNeighbors { k: 7, available: 6 })));
    }

    #[test]
    fn zero_k_fails() {
        let result = NeighborIndex::build(grid().view(), 0, IndexAlgorithm::BruteForce);
        assert!(matches!(result, Err(ImputeError::InsufficientNeighbors { k: 0, .. })));
    }

    #[test]
    fn non_finite_query_fails() {
        let index = NeighborIndex::build(grid().view(), 1, IndexAlgorithm::RTree).unwrap();
        assert!(index.query(array![[f64::NAN, 0.0]].view()).is_err());
    }

    #[test]
    fn gather_selects_neighbor_rows() {
        let index = NeighborIndex::build(grid().view(), 2, IndexAlgorithm::BruteForce).unwrap();
        let result = index.query(array![[5.0, 4.9]].view()).unwrap();
        let rows = result[0].gather(&grid());
        assert_eq!(rows.row(0).to_vec(), vec![5.0, 5.0]);
    }
}
