use std::collections::BTreeSet;

use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ImputeError, Result};
use super::{FittedScaler, StandardScaler};

/// Multinomial logistic regression trained by full-batch gradient descent.
/// Inputs are standard-scaled internally; the bias column is not regularized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftmaxClassifier {
    pub learning_rate: f64,
    pub max_iter: usize,
    pub l2: f64,
    pub seed: u64,
}

/// Class list, input scaling and weights learned by [`SoftmaxClassifier::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedClassifier {
    classes: Vec<i64>,
    scaler: FittedScaler,
    weights: Array2<f64>,   // (features + 1) × classes, bias in the last row
}

/// Row-wise softmax, shifted by the row maximum for stability.
fn softmax(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    logits
}

/// Append a column of ones for the bias term.
fn with_bias(x: Array2<f64>) -> Result<Array2<f64>> {
    let ones = Array2::ones((x.nrows(), 1));
    concatenate(Axis(1), &[x.view(), ones.view()])
        .map_err(|e| ImputeError::ShapeMismatch(e.to_string()))
}

impl Default for SoftmaxClassifier {
    fn default() -> Self {
        Self { learning_rate: 0.5, max_iter: 500, l2: 1e-3, seed: 42 }
    }
}

impl SoftmaxClassifier {
    pub fn new(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }

    /// Fit on `x` (n × features) against integer labels `y`.
    /// Needs at least two distinct labels.
    pub fn fit(&self, x: ArrayView2<f64>, y: &[i64]) -> Result<FittedClassifier> {
        if x.nrows() != y.len() {
            return Err(ImputeError::ShapeMismatch(format!("{} samples but {} labels", x.nrows(), y.len())));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ImputeError::ClassifierFit("training features contain non-finite values".into()));
        }

        let classes = y.iter().copied().collect::<BTreeSet<i64>>().into_iter().collect::<Vec<_>>();
        if classes.len() < 2 {
            return Err(ImputeError::ClassifierFit(format!(
                "need at least 2 distinct labels, found {}", classes.len()
            )));
        }

        let scaler = StandardScaler.fit(x)?;
        let design = with_bias(scaler.transform(x)?)?;
        let (n, d) = design.dim();
        let c = classes.len();

        let mut targets = Array2::<f64>::zeros((n, c));
        for (i, label) in y.iter().enumerate() {
            if let Ok(j) = classes.binary_search(label) { targets[[i, j]] = 1.0 }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut weights = Array2::from_shape_fn((d, c), |_| rng.random_range(-0.01..0.01));

        // Gradient of the mean cross-entropy is Lipschitz with constant <= d / 2 on scaled inputs.
        let rate = self.learning_rate.min(1.0 / d as f64);
        let mut penalty = Array2::<f64>::from_elem((d, c), self.l2);
        penalty.row_mut(d - 1).fill(0.0);

        for _ in 0..self.max_iter {
            let probs = softmax(design.dot(&weights));
            let gradient = design.t().dot(&(probs - &targets)) / n as f64 + &penalty * &weights;
            weights.scaled_add(-rate, &gradient);
        }

        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ImputeError::ClassifierFit("weights diverged".into()));
        }

        Ok(FittedClassifier { classes, scaler, weights })
    }
}

impl FittedClassifier {
    /// Class labels, in the column order of [`FittedClassifier::predict_proba`].
    #[inline] pub fn classes(&self) -> &[i64] { &self.classes }

    /// Probability of each class for each row of `x`; rows sum to 1.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        let design = with_bias(self.scaler.transform(x)?)?;
        Ok(softmax(design.dot(&self.weights)))
    }

    /// Most probable class for each row of `x`.
    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<i64>> {
        let probs = self.predict_proba(x)?;
        Ok(probs.rows().into_iter()
            .map(|row| {
                let best = row.iter()
                    .enumerate()
                    .fold((0, f64::NEG_INFINITY), |b, (j, &p)| if p > b.1 { (j, p) } else { b })
                    .0;
                self.classes[best]
            })
            .collect())
    }
}
