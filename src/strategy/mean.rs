use ndarray::{Array2, Axis};

use crate::{dataset::BlockTable, error::{ImputeError, Result}};
use super::{finite_matrix, ImputationStrategy};

/// Baseline: every unknown block gets the known-set mean of each feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MeanStrategy;

impl ImputationStrategy for MeanStrategy {
    fn name(&self) -> &'static str { "mean" }

    fn auxiliary_columns(&self, _features: &[String]) -> Vec<String> { Vec::new() }

    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>> {
        let means = finite_matrix(known, features)?
            .mean_axis(Axis(0))
            .ok_or(ImputeError::EmptyTrainingSet)?;

        let mut values = Array2::zeros((unknown.len(), features.len()));
        for mut row in values.rows_mut() { row.assign(&means) }
        Ok(values)
    }
}
