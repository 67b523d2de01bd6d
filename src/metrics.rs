use ahash::AHashSet;
use ndarray::Array1;
use serde::Serialize;

use crate::{
    dataset::BlockTable,
    error::{ImputeError, Result},
    model::median,
};

/// Error scores of one imputed column against ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsRecord {
    pub feature: String,
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
    /// Median-based r², less sensitive to a few very large blocks.
    pub r2_robust: f64,
}

impl MetricsRecord {
    fn score(feature: &str, truth: &Array1<f64>, pred: &Array1<f64>) -> Self {
        let diff = truth - pred;
        let residual_sq = diff.mapv(|d| d * d);
        let mean = truth.mean().unwrap_or(f64::NAN);
        let total_sq = truth.mapv(|t| (t - mean) * (t - mean));

        let robust = match (median(residual_sq.to_vec()), median(total_sq.to_vec())) {
            (Some(residual), Some(total)) => 1.0 - residual / total,
            _ => f64::NAN,
        };

        Self {
            feature: feature.to_string(),
            mae: diff.mapv(f64::abs).mean().unwrap_or(f64::NAN),
            rmse: residual_sq.mean().unwrap_or(f64::NAN).sqrt(),
            r2: 1.0 - residual_sq.sum() / total_sq.sum(),
            r2_robust: robust,
        }
    }
}

/// Score `pred` against `truth` column by column, in `pred` column order.
///
/// Both tables must hold the same ids and columns; rows are matched by id.
pub fn evaluate_metrics(truth: &BlockTable, pred: &BlockTable) -> Result<Vec<MetricsRecord>> {
    if pred.is_empty() {
        return Err(ImputeError::ShapeMismatch("no predictions to score".into()));
    }
    let same_ids = truth.len() == pred.len()
        && truth.ids().iter().collect::<AHashSet<_>>() == pred.ids().iter().collect::<AHashSet<_>>();
    if !same_ids {
        return Err(ImputeError::ShapeMismatch("truth and prediction cover different blocks".into()));
    }
    if truth.columns().len() != pred.columns().len() || !pred.columns().iter().all(|c| truth.has_column(c)) {
        return Err(ImputeError::ShapeMismatch(format!(
            "truth columns {:?} differ from prediction columns {:?}", truth.columns(), pred.columns()
        )));
    }

    let truth_rows = truth.row_index();
    let order = pred.ids().iter().filter_map(|id| truth_rows.get(id).copied()).collect::<Vec<_>>();
    let aligned = truth.rows(&order);

    pred.columns().iter()
        .map(|column| {
            let truth = aligned.column(column)?.to_owned();
            let pred = pred.column(column)?.to_owned();
            Ok(MetricsRecord::score(column, &truth, &pred))
        })
        .collect()
}
