use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ImputeError, Result};

/// K-means clustering with k-means++ seeding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

/// Centroids and training labels learned by [`KMeans::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedKMeans {
    centroids: Array2<f64>,
    labels: Vec<usize>,
    inertia: f64,
    n_iter: usize,
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index and squared distance of the centroid nearest to `row`; lower index wins ties.
fn nearest_centroid(row: ArrayView1<f64>, centroids: &Array2<f64>) -> (usize, f64) {
    centroids.rows().into_iter()
        .enumerate()
        .map(|(c, centroid)| (c, squared_distance(row, centroid)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
}

impl KMeans {
    pub fn new(n_clusters: usize, seed: u64) -> Self {
        Self { n_clusters, max_iter: 300, tol: 1e-4, seed }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// k-means++: each next centroid is drawn with probability proportional to its
    /// squared distance from the nearest centroid chosen so far.
    fn init_centroids(&self, x: ArrayView2<f64>, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((self.n_clusters, x.ncols()));
        centroids.row_mut(0).assign(&x.row(rng.random_range(0..n_samples)));

        let mut d2 = x.rows().into_iter()
            .map(|row| squared_distance(row, centroids.row(0)))
            .collect::<Vec<f64>>();

        for c in 1..self.n_clusters {
            let total = d2.iter().sum::<f64>();
            let chosen = if total > 0.0 {
                let target = rng.random::<f64>() * total;
                let mut cumulative = 0.0;
                d2.iter()
                    .position(|&d| { cumulative += d; d > 0.0 && cumulative >= target })
                    .or_else(|| d2.iter().rposition(|&d| d > 0.0))
                    .unwrap_or(0)
            } else {
                rng.random_range(0..n_samples)
            };
            centroids.row_mut(c).assign(&x.row(chosen));

            for (i, row) in x.rows().into_iter().enumerate() {
                d2[i] = d2[i].min(squared_distance(row, centroids.row(c)));
            }
        }
        centroids
    }

    /// Fit on `x` (n × features). Requires at least `n_clusters` samples.
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<FittedKMeans> {
        let n_samples = x.nrows();
        if n_samples == 0 { return Err(ImputeError::EmptyTrainingSet) }
        if self.n_clusters == 0 || self.n_clusters > n_samples {
            return Err(ImputeError::InvalidParameter(format!(
                "cannot form {} clusters from {n_samples} samples", self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut centroids = self.init_centroids(x, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];
        let mut n_iter = 0;

        for iter in 0..self.max_iter {
            n_iter = iter + 1;

            // Assignment step.
            let assigned = x.rows().into_iter()
                .map(|row| nearest_centroid(row, &centroids))
                .collect::<Vec<_>>();
            let changed = assigned.iter().zip(labels.iter()).filter(|(a, l)| a.0 != **l).count();
            labels = assigned.iter().map(|&(c, _)| c).collect();

            // Update step.
            let mut sums = Array2::<f64>::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut sum = sums.row_mut(c);
                sum += &x.row(i);
            }

            let mut updated = sums;
            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    updated.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // Empty cluster: restart it at the sample farthest from its centroid.
                    let far = assigned.iter()
                        .enumerate()
                        .fold((0, f64::NEG_INFINITY), |best, (i, &(_, d))| if d > best.1 { (i, d) } else { best })
                        .0;
                    updated.row_mut(c).assign(&x.row(far));
                }
            }

            let shift = centroids.iter().zip(updated.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f64>();
            centroids = updated;

            if changed == 0 || shift <= self.tol * self.tol { break }
        }

        // Final labels against the final centroids.
        let assigned = x.rows().into_iter()
            .map(|row| nearest_centroid(row, &centroids))
            .collect::<Vec<_>>();
        let inertia = assigned.iter().map(|&(_, d)| d).sum();
        let labels = assigned.into_iter().map(|(c, _)| c).collect();

        tracing::debug!("[model::kmeans] {} clusters converged after {n_iter} iterations, inertia {inertia:.4}", self.n_clusters);
        Ok(FittedKMeans { centroids, labels, inertia, n_iter })
    }
}

impl FittedKMeans {
    #[inline] pub fn centroids(&self) -> &Array2<f64> { &self.centroids }

    /// Labels of the training samples.
    #[inline] pub fn labels(&self) -> &[usize] { &self.labels }

    #[inline] pub fn n_clusters(&self) -> usize { self.centroids.nrows() }

    /// Sum of squared distances of training samples to their centroid.
    #[inline] pub fn inertia(&self) -> f64 { self.inertia }

    #[inline] pub fn n_iter(&self) -> usize { self.n_iter }

    /// Assign each row of `x` to its nearest centroid.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Vec<usize>> {
        if x.ncols() != self.centroids.ncols() {
            return Err(ImputeError::ShapeMismatch(format!(
                "kmeans fitted on {} columns, got {}", self.centroids.ncols(), x.ncols()
            )));
        }
        Ok(x.rows().into_iter().map(|row| nearest_centroid(row, &self.centroids).0).collect())
    }
}
