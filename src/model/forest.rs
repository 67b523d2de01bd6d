use std::collections::BTreeSet;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::{seq::SliceRandom, Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::error::{ImputeError, Result};

/// Bagged ensemble of Gini decision trees. Each tree is grown on a bootstrap sample
/// and considers `ceil(sqrt(features))` randomly chosen features at every split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomForestClassifier {
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

/// Trees and class list learned by [`RandomForestClassifier::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct FittedForest {
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<TreeNode>,
}

#[derive(Debug, Clone, PartialEq)]
enum TreeNode {
    /// Class frequencies of the training rows that reached this leaf.
    Leaf { proba: Array1<f64> },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn leaf(&self, row: ArrayView1<f64>) -> &Array1<f64> {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { proba } => return proba,
                TreeNode::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 { return 0.0 }
    let total = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / total).powi(2)).sum::<f64>()
}

/// Grows one tree over class indices `y` (positions in the class list).
struct TreeBuilder<'a> {
    params: &'a RandomForestClassifier,
    x: ArrayView2<'a, f64>,
    y: &'a [usize],
    n_classes: usize,
    max_features: usize,
}

impl TreeBuilder<'_> {
    fn counts(&self, rows: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &row in rows { counts[self.y[row]] += 1 }
        counts
    }

    fn build(&self, rows: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let counts = self.counts(rows);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let stop = pure
            || rows.len() < self.params.min_samples_split
            || self.params.max_depth.is_some_and(|d| depth >= d);

        if !stop {
            if let Some((feature, threshold)) = self.best_split(rows, &counts, rng) {
                let (left, right): (Vec<usize>, Vec<usize>) = rows.iter()
                    .partition(|&&row| self.x[[row, feature]] <= threshold);
                return TreeNode::Split {
                    feature,
                    threshold,
                    left: Box::new(self.build(&left, depth + 1, rng)),
                    right: Box::new(self.build(&right, depth + 1, rng)),
                };
            }
        }

        let total = rows.len() as f64;
        TreeNode::Leaf { proba: counts.iter().map(|&c| c as f64 / total).collect() }
    }

    /// Feature and midpoint threshold with the largest Gini decrease, if any split helps.
    fn best_split(&self, rows: &[usize], counts: &[usize], rng: &mut ChaCha8Rng) -> Option<(usize, f64)> {
        let n = rows.len();
        let parent = gini(counts, n);
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut features = (0..self.x.ncols()).collect::<Vec<usize>>();
        features.shuffle(rng);
        features.truncate(self.max_features);
        features.sort_unstable();

        let mut best: Option<(usize, f64, f64)> = None;
        for feature in features {
            let mut sorted = rows.iter()
                .map(|&row| (self.x[[row, feature]], self.y[row]))
                .collect::<Vec<(f64, usize)>>();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = vec![0; self.n_classes];
            let mut right = counts.to_vec();
            for i in 1..n {
                let class = sorted[i - 1].1;
                left[class] += 1;
                right[class] -= 1;

                if sorted[i - 1].0 == sorted[i].0 || i < min_leaf || n - i < min_leaf { continue }

                let weighted = (i as f64 * gini(&left, i) + (n - i) as f64 * gini(&right, n - i)) / n as f64;
                let gain = parent - weighted;
                if gain > 1e-12 && best.is_none_or(|b| gain > b.2) {
                    best = Some((feature, (sorted[i - 1].0 + sorted[i].0) / 2.0, gain));
                }
            }
        }
        best.map(|(feature, threshold, _)| (feature, threshold))
    }
}

impl Default for RandomForestClassifier {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: Some(10),
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

impl RandomForestClassifier {
    pub fn new(seed: u64) -> Self {
        Self { seed, ..Self::default() }
    }

    pub fn with_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Fit on `x` (n × features) against integer labels `y`.
    /// Needs at least two distinct labels.
    pub fn fit(&self, x: ArrayView2<f64>, y: &[i64]) -> Result<FittedForest> {
        if x.nrows() != y.len() {
            return Err(ImputeError::ShapeMismatch(format!("{} samples but {} labels", x.nrows(), y.len())));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ImputeError::ClassifierFit("training features contain non-finite values".into()));
        }
        if self.n_estimators == 0 {
            return Err(ImputeError::InvalidParameter("n_estimators must be at least 1".into()));
        }

        let classes = y.iter().copied().collect::<BTreeSet<i64>>().into_iter().collect::<Vec<_>>();
        if classes.len() < 2 {
            return Err(ImputeError::ClassifierFit(format!(
                "need at least 2 distinct labels, found {}", classes.len()
            )));
        }
        let encoded = y.iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect::<Vec<usize>>();

        let n_features = x.ncols();
        let builder = TreeBuilder {
            params: self,
            x: x.view(),
            y: &encoded,
            n_classes: classes.len(),
            max_features: ((n_features as f64).sqrt().ceil() as usize).max(1),
        };

        let n = x.nrows();
        let trees = (0..self.n_estimators)
            .map(|tree| {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(tree as u64));
                let sample = (0..n).map(|_| rng.random_range(0..n)).collect::<Vec<usize>>();
                builder.build(&sample, 0, &mut rng)
            })
            .collect::<Vec<_>>();

        tracing::debug!("[model::forest] {} trees over {n} samples, {} classes", trees.len(), classes.len());
        Ok(FittedForest { classes, n_features, trees })
    }
}

impl FittedForest {
    /// Class labels, in the column order of [`FittedForest::predict_proba`].
    #[inline] pub fn classes(&self) -> &[i64] { &self.classes }

    #[inline] pub fn n_trees(&self) -> usize { self.trees.len() }

    /// Leaf class frequencies averaged over the trees; rows sum to 1.
    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features {
            return Err(ImputeError::ShapeMismatch(format!(
                "forest fitted on {} columns, got {}", self.n_features, x.ncols()
            )));
        }
        let mut probs = Array2::<f64>::zeros((x.nrows(), self.classes.len()));
        for (mut out, row) in probs.axis_iter_mut(Axis(0)).zip(x.rows()) {
            for tree in &self.trees {
                out += tree.leaf(row);
            }
        }
        Ok(probs / self.trees.len() as f64)
    }

    /// Most probable class for each row of `x`; lower labels win ties.
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
