use ndarray::{concatenate, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{centroid_columns, BlockTable, SITE_AREA_COLUMN},
    error::{ImputeError, Result},
    model::Nmf,
    spatial::NeighborSearch,
};
use super::{finite_matrix, neighbor_means, ImputationStrategy};

fn default_rank() -> usize { 10 }
fn default_max_iter() -> usize { 200 }
fn default_seed() -> u64 { 42 }
fn default_tol() -> f64 { 1e-4 }

/// Smooths a spatial-KNN bootstrap through a low-rank nonnegative factorization of
/// every block's context and target values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorizationStrategy {
    #[serde(default)]
    pub additional_columns: Vec<String>,
    #[serde(default = "default_rank")]
    pub rank: usize,
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_tol")]
    pub tol: f64,
    /// Accept a factorization that hit the iteration cap, with a warning, instead of failing.
    #[serde(default)]
    pub allow_unconverged: bool,
    #[serde(default)]
    pub bootstrap: NeighborSearch,
}

impl Default for FactorizationStrategy {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl FactorizationStrategy {
    pub fn new(additional_columns: Vec<String>) -> Self {
        Self {
            additional_columns,
            rank: default_rank(),
            max_iter: default_max_iter(),
            seed: default_seed(),
            tol: default_tol(),
            allow_unconverged: false,
            bootstrap: NeighborSearch::default(),
        }
    }

    pub fn with_rank(mut self, rank: usize) -> Self {
        self.rank = rank;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn allow_unconverged(mut self) -> Self {
        self.allow_unconverged = true;
        self
    }

    pub fn with_bootstrap(mut self, bootstrap: NeighborSearch) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    fn context_columns(&self) -> Vec<String> {
        let mut columns = centroid_columns();
        columns.push(SITE_AREA_COLUMN.to_string());
        columns.extend(self.additional_columns.iter().cloned());
        columns
    }
}

fn hstack(left: Array2<f64>, right: Array2<f64>) -> Result<Array2<f64>> {
    concatenate(Axis(1), &[left.view(), right.view()]).map_err(|e| ImputeError::ShapeMismatch(e.to_string()))
}

impl ImputationStrategy for FactorizationStrategy {
    fn name(&self) -> &'static str { "factorization" }

    fn auxiliary_columns(&self, _features: &[String]) -> Vec<String> { self.context_columns() }

    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>> {
        let known_targets = finite_matrix(known, features)?;
        let bootstrap = neighbor_means(&known_targets, &self.bootstrap.neighbors(known, unknown)?);

        let context = self.context_columns();
        let known_rows = hstack(finite_matrix(known, &context)?, known_targets)?;
        let unknown_rows = hstack(finite_matrix(unknown, &context)?, bootstrap)?;
        let x = concatenate(Axis(0), &[known_rows.view(), unknown_rows.view()])
            .map_err(|e| ImputeError::ShapeMismatch(e.to_string()))?;

        let target_rows = (known.len()..x.nrows()).collect::<Vec<usize>>();
        let target_cols = (context.len()..context.len() + features.len()).collect::<Vec<usize>>();

        let factors = Nmf::new(self.rank, self.max_iter, self.seed).with_tol(self.tol).fit(x.view())?;
        if !factors.converged() {
            if !self.allow_unconverged {
                return Err(ImputeError::Factorization(format!(
                    "no convergence within {} iterations (error {:.6})", self.max_iter, factors.reconstruction_err()
                )));
            }
            tracing::warn!("[factorization] iteration cap {} reached before convergence", self.max_iter);
        }

        Ok(factors.reconstruct()
            .select(Axis(0), &target_rows)
            .select(Axis(1), &target_cols))
    }
}
