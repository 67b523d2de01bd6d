//! Numerical models used by the strategies.
//!
//! Every model separates fitting from inference: `fit` consumes training data and
//! returns a fitted value, and only the fitted value can transform or predict.

mod classifier;
mod forest;
mod kmeans;
mod nmf;
mod scaler;

pub use classifier::{FittedClassifier, SoftmaxClassifier};
pub use forest::{FittedForest, RandomForestClassifier};
pub use kmeans::{FittedKMeans, KMeans};
pub use nmf::{Nmf, NmfFactors};
pub use scaler::{FittedScaler, StandardScaler};

/// Median of `values`, averaging the two middle elements for even lengths.
pub(crate) fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() { return None }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 { (values[mid - 1] + values[mid]) / 2.0 } else { values[mid] })
}
