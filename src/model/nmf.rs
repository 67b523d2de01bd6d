use ndarray::{Array2, ArrayView2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ImputeError, Result};

/// Guard against division by zero in the multiplicative updates.
const EPSILON: f64 = 1e-10;

/// Relative-error convergence is checked every this many iterations.
const CHECK_EVERY: usize = 10;

/// Nonnegative matrix factorization `X ≈ W·H` by Lee–Seung multiplicative updates
/// on the Frobenius loss, with a seeded random initialization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nmf {
    pub rank: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub seed: u64,
}

/// Factors learned by [`Nmf::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct NmfFactors {
    w: Array2<f64>,   // rows × rank
    h: Array2<f64>,   // rank × columns
    n_iter: usize,
    converged: bool,
    reconstruction_err: f64,
}

fn frobenius(x: ArrayView2<f64>, w: &Array2<f64>, h: &Array2<f64>) -> f64 {
    (&x - &w.dot(h)).mapv(|v| v * v).sum().sqrt()
}

impl Nmf {
    pub fn new(rank: usize, max_iter: usize, seed: u64) -> Self {
        Self { rank, max_iter, tol: 1e-4, seed }
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    /// Factor `x`. Every entry must be finite and nonnegative.
    pub fn fit(&self, x: ArrayView2<f64>) -> Result<NmfFactors> {
        if self.rank == 0 || self.max_iter == 0 {
            return Err(ImputeError::InvalidParameter("nmf rank and max_iter must be positive".into()));
        }
        if x.is_empty() {
            return Err(ImputeError::Factorization("input matrix is empty".into()));
        }
        if let Some(v) = x.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ImputeError::Factorization(format!("input contains invalid value {v}")));
        }

        let (n, m) = x.dim();
        let scale = (x.mean().unwrap_or(0.0) / self.rank as f64).sqrt();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut w = Array2::from_shape_fn((n, self.rank), |_| scale * rng.random::<f64>());
        let mut h = Array2::from_shape_fn((self.rank, m), |_| scale * rng.random::<f64>());

        let initial_err = frobenius(x, &w, &h);
        let mut previous_err = initial_err;
        let mut reconstruction_err = initial_err;
        let mut converged = false;
        let mut n_iter = 0;

        for iter in 1..=self.max_iter {
            n_iter = iter;

            let numer = x.dot(&h.t());
            let denom = w.dot(&h.dot(&h.t()));
            w.zip_mut_with(&(numer / denom.mapv(|v| v + EPSILON)), |a, &b| *a *= b);

            let numer = w.t().dot(&x);
            let denom = w.t().dot(&w).dot(&h);
            h.zip_mut_with(&(numer / denom.mapv(|v| v + EPSILON)), |a, &b| *a *= b);

            if iter % CHECK_EVERY == 0 || iter == self.max_iter {
                reconstruction_err = frobenius(x, &w, &h);
                if !reconstruction_err.is_finite() {
                    return Err(ImputeError::Factorization(format!("reconstruction diverged at iteration {iter}")));
                }
                if initial_err <= EPSILON || (previous_err - reconstruction_err) / initial_err < self.tol {
                    converged = true;
                    break;
                }
                previous_err = reconstruction_err;
            }
        }

        if w.iter().chain(h.iter()).any(|v| !v.is_finite()) {
            return Err(ImputeError::Factorization("factors are not finite".into()));
        }

        tracing::debug!("[model::nmf] rank {} after {n_iter} iterations, error {reconstruction_err:.6} (converged: {converged})", self.rank);
        Ok(NmfFactors { w, h, n_iter, converged, reconstruction_err })
    }
}

impl NmfFactors {
    #[inline] pub fn w(&self) -> &Array2<f64> { &self.w }

    #[inline] pub fn h(&self) -> &Array2<f64> { &self.h }

    #[inline] pub fn n_iter(&self) -> usize { self.n_iter }

    /// Whether the relative error decrease fell below tolerance before the iteration cap.
    #[inline] pub fn converged(&self) -> bool { self.converged }

    /// Frobenius norm of `X - W·H` at the last check.
    #[inline] pub fn reconstruction_err(&self) -> f64 { self.reconstruction_err }

    /// The low-rank reconstruction `W·H`.
    pub fn reconstruct(&self) -> Array2<f64> {
        self.w.dot(&self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn low_rank() -> Array2<f64> {
        // Rank-2 nonnegative matrix.
        let w = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [2.0, 0.5]];
        let h = array![[1.0, 2.0, 0.0], [0.5, 0.0, 3.0]];
        w.dot(&h)
    }

    #[test]
    fn factors_are_nonnegative() {
        let factors = Nmf::new(2, 200, 42).fit(low_rank().view()).unwrap();
        assert!(factors.w().iter().all(|&v| v >= 0.0));
        assert!(factors.h().iter().all(|&v| v >= 0.0));
        assert_eq!(factors.reconstruct().dim(), (4, 3));
    }

    #[test]
    fn reconstruction_improves_on_initialization() {
        let x = low_rank();
        let factors = Nmf::new(2, 200, 42).fit(x.view()).unwrap();
        let norm = x.mapv(|v| v * v).sum().sqrt();
        assert!(factors.reconstruction_err() < 0.5 * norm);
    }

    #[test]
    fn negative_input_is_rejected() {
        let x = array![[1.0, -0.5], [2.0, 1.0]];
        assert!(matches!(Nmf::new(1, 10, 0).fit(x.view()), Err(ImputeError::Factorization(_))));
    }

    #[test]
    fn same_seed_is_deterministic() {
        let x = low_rank();
        let a = Nmf::new(2, 50, 5).fit(x.view()).unwrap();
        let b = Nmf::new(2, 50, 5).fit(x.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn zero_matrix_reconstructs_to_zero() {
        let x = Array2::<f64>::zeros((3, 2));
        let factors = Nmf::new(2, 20, 1).fit(x.view()).unwrap();
        assert!(factors.converged());
        assert!(factors.reconstruct().iter().all(|&v| v == 0.0));
    }
}
