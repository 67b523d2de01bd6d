use std::collections::BTreeMap;

use ahash::AHashSet;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::{
    dataset::{
        centroid_columns, BlockTable, BUILD_FLOOR_AREA_COLUMN, FOOTPRINT_AREA_COLUMN, SITE_AREA_COLUMN,
    },
    error::{ImputeError, Result},
    model::{
        median, FittedClassifier, FittedForest, FittedKMeans, FittedScaler, KMeans,
        RandomForestClassifier, SoftmaxClassifier, StandardScaler,
    },
    spatial::NeighborSearch,
};
use super::{finite_matrix, neighbor_means, ImputationStrategy};

/// Label of known blocks whose fsi or gsi is not positive.
pub const UNCLUSTERED: i64 = -1;

const DEFAULT_CLUSTERS: usize = 11;
const DEFAULT_SEED: u64 = 42;

fn default_clusters() -> usize { DEFAULT_CLUSTERS }
fn default_seed() -> u64 { DEFAULT_SEED }

/// Median density of the known blocks in one cluster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClusterProfile {
    pub fsi: f64,
    pub gsi: f64,
    pub size: usize,
}

/// Model mapping context columns to a density label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    #[default]
    Forest,
    /// Multinomial logistic regression, linear in the context columns.
    Softmax,
}

impl ClassifierKind {
    fn fit(self, x: ArrayView2<f64>, y: &[i64], seed: u64) -> Result<TypologyClassifier> {
        Ok(match self {
            ClassifierKind::Forest => TypologyClassifier::Forest(RandomForestClassifier::new(seed).fit(x, y)?),
            ClassifierKind::Softmax => TypologyClassifier::Softmax(SoftmaxClassifier::new(seed).fit(x, y)?),
        })
    }
}

/// A fitted label classifier of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum TypologyClassifier {
    Forest(FittedForest),
    Softmax(FittedClassifier),
}

impl TypologyClassifier {
    /// Class labels, in the column order of [`TypologyClassifier::predict_proba`].
    pub fn classes(&self) -> &[i64] {
        match self {
            TypologyClassifier::Forest(c) => c.classes(),
            TypologyClassifier::Softmax(c) => c.classes(),
        }
    }

    pub fn predict_proba(&self, x: ArrayView2<f64>) -> Result<Array2<f64>> {
        match self {
            TypologyClassifier::Forest(c) => c.predict_proba(x),
            TypologyClassifier::Softmax(c) => c.predict_proba(x),
        }
    }

    pub fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<i64>> {
        match self {
            TypologyClassifier::Forest(c) => c.predict(x),
            TypologyClassifier::Softmax(c) => c.predict(x),
        }
    }
}

/// Fits the Spacematrix typology on a known table: density clusters over (fsi, gsi),
/// then a classifier from contextual columns to cluster label.
#[derive(Debug, Clone, PartialEq)]
pub struct Spacematrix {
    pub n_clusters: usize,
    pub seed: u64,
    pub context_columns: Vec<String>,
    pub classifier: ClassifierKind,
}

/// Typology learned by [`Spacematrix::fit`].
#[derive(Debug, Clone)]
pub struct SpacematrixModel {
    labels: Vec<i64>,
    profiles: BTreeMap<i64, ClusterProfile>,
    density: Option<(FittedScaler, FittedKMeans)>,  // None when every known block is masked
    classifier: TypologyClassifier,
    context_columns: Vec<String>,
    class_ratios: Array2<f64>,  // classes × (fsi, gsi), in classifier class order
}

/// (fsi, gsi) of every row, failing with `RatioComputation` on missing or invalid areas.
fn ratio_inputs(table: &BlockTable) -> Result<(Vec<f64>, Vec<f64>)> {
    let column = move |name: &str| table.column(name).map_err(|_| {
        ImputeError::RatioComputation(format!("column '{name}' is not available"))
    });
    let floor = column(BUILD_FLOOR_AREA_COLUMN)?;
    let footprint = column(FOOTPRINT_AREA_COLUMN)?;
    let site = column(SITE_AREA_COLUMN)?;

    let mut fsi = Vec::with_capacity(table.len());
    let mut gsi = Vec::with_capacity(table.len());
    for (row, &id) in table.ids().iter().enumerate() {
        let (f, p, s) = (floor[row], footprint[row], site[row]);
        if !(f.is_finite() && p.is_finite() && s.is_finite()) {
            return Err(ImputeError::RatioComputation(format!("block {id} has a missing area value")));
        }
        if s <= 0.0 {
            return Err(ImputeError::RatioComputation(format!("block {id} has site area {s}")));
        }
        fsi.push(f / s);
        gsi.push(p / s);
    }
    Ok((fsi, gsi))
}

/// Rows with positive fsi and gsi; the others are labelled [`UNCLUSTERED`].
fn valid_rows(fsi: &[f64], gsi: &[f64]) -> Vec<usize> {
    (0..fsi.len()).filter(|&row| fsi[row] > 0.0 && gsi[row] > 0.0).collect()
}

fn density_points(fsi: &[f64], gsi: &[f64], rows: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((rows.len(), 2), |(i, j)| if j == 0 { fsi[rows[i]] } else { gsi[rows[i]] })
}

fn distinct_points(points: &Array2<f64>) -> usize {
    points.rows().into_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<AHashSet<_>>()
        .len()
}

impl Spacematrix {
    pub fn new(context_columns: Vec<String>, n_clusters: usize, seed: u64) -> Self {
        Self { n_clusters, seed, context_columns, classifier: ClassifierKind::default() }
    }

    pub fn with_classifier(mut self, classifier: ClassifierKind) -> Self {
        self.classifier = classifier;
        self
    }

    /// Cluster the known blocks by density and train the label classifier.
    pub fn fit(&self, known: &BlockTable) -> Result<SpacematrixModel> {
        if known.is_empty() { return Err(ImputeError::EmptyTrainingSet) }

        let (fsi, gsi) = ratio_inputs(known)?;
        let valid = valid_rows(&fsi, &gsi);

        let mut labels = vec![UNCLUSTERED; known.len()];
        let mut density = None;
        if !valid.is_empty() {
            let points = density_points(&fsi, &gsi, &valid);
            let scaler = StandardScaler.fit(points.view())?;
            let scaled = scaler.transform(points.view())?;

            let distinct = distinct_points(&scaled);
            let n_clusters = self.n_clusters.min(distinct);
            if n_clusters < self.n_clusters {
                tracing::warn!("[spacematrix] only {distinct} distinct density points; reducing clusters from {} to {n_clusters}", self.n_clusters);
            }

            let kmeans = KMeans::new(n_clusters, self.seed).fit(scaled.view())?;
            for (&row, &label) in valid.iter().zip(kmeans.labels()) {
                labels[row] = label as i64;
            }
            tracing::debug!("[spacematrix] {n_clusters} clusters over {} valid blocks after {} iterations", valid.len(), kmeans.n_iter());
            density = Some((scaler, kmeans));
        }

        let mut profiles = BTreeMap::new();
        for &label in labels.iter().collect::<AHashSet<_>>() {
            let members = (0..known.len()).filter(|&row| labels[row] == label).collect::<Vec<_>>();
            let profile = if label == UNCLUSTERED {
                ClusterProfile { fsi: 0.0, gsi: 0.0, size: members.len() }
            } else {
                ClusterProfile {
                    fsi: median(members.iter().map(|&row| fsi[row]).collect()).unwrap_or(0.0),
                    gsi: median(members.iter().map(|&row| gsi[row]).collect()).unwrap_or(0.0),
                    size: members.len(),
                }
            };
            profiles.insert(label, profile);
        }

        let context = finite_matrix(known, &self.context_columns)?;
        let classifier = self.classifier.fit(context.view(), &labels, self.seed)?;

        let mut class_ratios = Array2::zeros((classifier.classes().len(), 2));
        for (mut row, class) in class_ratios.rows_mut().into_iter().zip(classifier.classes()) {
            let profile = profiles.get(class).ok_or_else(|| {
                ImputeError::ClassifierFit(format!("classifier produced unknown label {class}"))
            })?;
            row.assign(&Array1::from(vec![profile.fsi, profile.gsi]));
        }

        Ok(SpacematrixModel {
            labels,
            profiles,
            density,
            classifier,
            context_columns: self.context_columns.clone(),
            class_ratios,
        })
    }
}

impl SpacematrixModel {
    /// Density label of every known row, [`UNCLUSTERED`] for masked rows.
    #[inline] pub fn labels(&self) -> &[i64] { &self.labels }

    #[inline] pub fn profiles(&self) -> &BTreeMap<i64, ClusterProfile> { &self.profiles }

    #[inline] pub fn classifier(&self) -> &TypologyClassifier { &self.classifier }

    #[inline] pub fn context_columns(&self) -> &[String] { &self.context_columns }

    /// Label probabilities for each row of `table`, columns in `classifier().classes()` order.
    pub fn predict_proba(&self, table: &BlockTable) -> Result<Array2<f64>> {
        let context = finite_matrix(table, &self.context_columns)?;
        self.classifier.predict_proba(context.view())
    }

    /// Most probable label for each row of `table`.
    pub fn predict_labels(&self, table: &BlockTable) -> Result<Array1<i64>> {
        let context = finite_matrix(table, &self.context_columns)?;
        self.classifier.predict(context.view())
    }

    /// K-means centres in (fsi, gsi) units, row `i` for label `i`.
    /// Empty when no known block had a positive density.
    pub fn density_centroids(&self) -> Result<Array2<f64>> {
        match &self.density {
            Some((scaler, kmeans)) => scaler.inverse_transform(kmeans.centroids().view()),
            None => Ok(Array2::zeros((0, 2))),
        }
    }

    /// Assign each row of `table`, which needs its area columns, to the nearest density centre.
    pub fn density_labels(&self, table: &BlockTable) -> Result<Vec<i64>> {
        let (fsi, gsi) = ratio_inputs(table)?;
        let mut labels = vec![UNCLUSTERED; table.len()];
        let valid = valid_rows(&fsi, &gsi);
        let Some((scaler, kmeans)) = &self.density else { return Ok(labels) };
        if valid.is_empty() { return Ok(labels) }

        let points = scaler.transform(density_points(&fsi, &gsi, &valid).view())?;
        for (&row, label) in valid.iter().zip(kmeans.predict(points.view())?) {
            labels[row] = label as i64;
        }
        Ok(labels)
    }

    /// Probability-weighted (fsi, gsi) for each row of `table`.
    pub fn predict_ratios(&self, table: &BlockTable) -> Result<Array2<f64>> {
        Ok(self.predict_proba(table)?.dot(&self.class_ratios))
    }
}

/// Imputes floor area and footprint area from the predicted density typology of each block,
/// optionally blended with a spatial-KNN estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpacematrixStrategy {
    #[serde(default)]
    pub additional_columns: Vec<String>,
    #[serde(default = "default_clusters")]
    pub n_clusters: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Add centroid coordinates to the classifier features.
    #[serde(default)]
    pub use_coordinates: bool,
    #[serde(default)]
    pub blend_knn: Option<NeighborSearch>,
    #[serde(default)]
    pub classifier: ClassifierKind,
}

impl Default for SpacematrixStrategy {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl SpacematrixStrategy {
    pub fn new(additional_columns: Vec<String>) -> Self {
        Self {
            additional_columns,
            n_clusters: DEFAULT_CLUSTERS,
            seed: DEFAULT_SEED,
            use_coordinates: false,
            blend_knn: None,
            classifier: ClassifierKind::default(),
        }
    }

    pub fn with_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_coordinates(mut self) -> Self {
        self.use_coordinates = true;
        self
    }

    pub fn with_blend(mut self, search: NeighborSearch) -> Self {
        self.blend_knn = Some(search);
        self
    }

    pub fn with_classifier(mut self, classifier: ClassifierKind) -> Self {
        self.classifier = classifier;
        self
    }

    fn context_columns(&self) -> Vec<String> {
        let mut columns = vec![SITE_AREA_COLUMN.to_string()];
        columns.extend(self.additional_columns.iter().cloned());
        if self.use_coordinates { columns.extend(centroid_columns()) }
        columns
    }

    /// The fitter this strategy runs on every call.
    pub fn fitter(&self) -> Spacematrix {
        Spacematrix::new(self.context_columns(), self.n_clusters, self.seed).with_classifier(self.classifier)
    }
}

impl ImputationStrategy for SpacematrixStrategy {
    fn name(&self) -> &'static str { "spacematrix" }

    fn auxiliary_columns(&self, _features: &[String]) -> Vec<String> {
        let mut columns = vec![
            BUILD_FLOOR_AREA_COLUMN.to_string(),
            FOOTPRINT_AREA_COLUMN.to_string(),
        ];
        columns.extend(self.context_columns());
        if self.blend_knn.is_some() && !self.use_coordinates { columns.extend(centroid_columns()) }
        columns
    }

    fn impute(&self, known: &BlockTable, unknown: &BlockTable, features: &[String]) -> Result<Array2<f64>> {
        let ratio_columns = features.iter()
            .map(|feature| match feature.as_str() {
                BUILD_FLOOR_AREA_COLUMN => Ok(0),
                FOOTPRINT_AREA_COLUMN => Ok(1),
                other => Err(ImputeError::RatioComputation(format!("cannot derive '{other}' from fsi/gsi"))),
            })
            .collect::<Result<Vec<usize>>>()?;

        let model = self.fitter().fit(known)?;
        let ratios = model.predict_ratios(unknown)?;
        let site = finite_matrix(unknown, &[SITE_AREA_COLUMN.to_string()])?;

        let mut values = ratios.select(Axis(1), &ratio_columns) * &site;
        if let Some(search) = self.blend_knn {
            let knn = neighbor_means(&finite_matrix(known, features)?, &search.neighbors(known, unknown)?);
            values = (values + knn) * 0.5;
        }
        Ok(values)
    }

    fn missing_column(&self, column: &str) -> ImputeError {
        match column {
            BUILD_FLOOR_AREA_COLUMN | FOOTPRINT_AREA_COLUMN | SITE_AREA_COLUMN => {
                ImputeError::RatioComputation(format!("column '{column}' is not available"))
            }
            _ => ImputeError::MissingColumn(column.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::KnnStrategy;
    use approx::assert_abs_diff_eq;

    fn columns() -> Vec<String> {
        ["centroid_x", "centroid_y", "site_area", "footprint_area", "build_floor_area"]
            .into_iter().map(String::from).collect()
    }

    fn features() -> Vec<String> {
        vec![FOOTPRINT_AREA_COLUMN.to_string(), BUILD_FLOOR_AREA_COLUMN.to_string()]
    }

    /// Large sparse blocks (fsi 0.5, gsi 0.2) and small dense blocks (fsi 3, gsi 0.6).
    fn known() -> BlockTable {
        let mut ids = Vec::new();
        let mut values = Vec::new();
        for i in 0..6 {
            let site = 1000.0 + 20.0 * i as f64;
            ids.push(i + 1);
            values.extend([i as f64, 0.0, site, site * (0.2 + 0.01 * i as f64), site * (0.5 + 0.02 * i as f64)]);
        }
        for i in 0..6 {
            let site = 200.0 + 10.0 * i as f64;
            ids.push(i + 7);
            values.extend([i as f64, 10.0, site, site * (0.6 + 0.01 * i as f64), site * (3.0 + 0.05 * i as f64)]);
        }
        BlockTable::new(ids, columns(), Array2::from_shape_vec((12, 5), values).unwrap()).unwrap()
    }

    fn unknown() -> BlockTable {
        let nan = f64::NAN;
        BlockTable::new(
            vec![20, 21],
            columns(),
            ndarray::array![[2.5, 0.5, 1050.0, nan, nan], [2.5, 9.5, 220.0, nan, nan]],
        ).unwrap()
    }

    #[test]
    fn imputes_nonnegative_areas() {
        let strategy = SpacematrixStrategy::new(vec![]).with_clusters(2);
        let values = strategy.impute(&known(), &unknown(), &features()).unwrap();
        assert_eq!(values.dim(), (2, 2));
        assert!(values.iter().all(|&v| v.is_finite() && v >= 0.0));

        // Smaller site area resembles the dense typology.
        let fsi_large = values[[0, 1]] / 1050.0;
        let fsi_small = values[[1, 1]] / 220.0;
        assert!(fsi_small > fsi_large);
    }

    #[test]
    fn probabilities_sum_to_one() {
        let model = SpacematrixStrategy::new(vec![]).with_clusters(2).fitter().fit(&known()).unwrap();
        let probs = model.predict_proba(&unknown()).unwrap();
        for row in probs.rows() {
            assert_abs_diff_eq!(row.sum(), 1.0, epsilon = 1e-9);
            assert!(row.iter().all(|&p| p >= 0.0));
        }
        assert_eq!(model.profiles().len(), 2);
        assert_eq!(model.labels().len(), 12);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let strategy = SpacematrixStrategy::new(vec![]).with_clusters(3).with_blend(NeighborSearch::new(2));
        let a = strategy.impute(&known(), &unknown(), &features()).unwrap();
        let b = strategy.impute(&known(), &unknown(), &features()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn blend_averages_typology_and_knn() {
        let plain = SpacematrixStrategy::new(vec![]).with_clusters(2);
        let blended = plain.clone().with_blend(NeighborSearch::new(2));

        let typology = plain.impute(&known(), &unknown(), &features()).unwrap();
        let knn = KnnStrategy::new(2).impute(&known(), &unknown(), &features()).unwrap();
        let mixed = blended.impute(&known(), &unknown(), &features()).unwrap();

        assert_eq!(mixed.dim(), (2, 2));
        for ((m, t), k) in mixed.iter().zip(typology.iter()).zip(knn.iter()) {
            assert_abs_diff_eq!(*m, (t + k) / 2.0, epsilon = 1e-9);
        }
        assert_ne!(mixed, typology);
    }

    #[test]
    fn density_centroids_are_group_means() {
        let model = SpacematrixStrategy::new(vec![]).with_clusters(2).fitter().fit(&known()).unwrap();
        let centroids = model.density_centroids().unwrap();
        assert_eq!(centroids.dim(), (2, 2));

        // Each group is an arithmetic progression, so its mean equals its median profile.
        for (label, profile) in model.profiles() {
            let centre = centroids.row(*label as usize);
            assert_abs_diff_eq!(centre[0], profile.fsi, epsilon = 1e-9);
            assert_abs_diff_eq!(centre[1], profile.gsi, epsilon = 1e-9);
        }
    }

    #[test]
    fn density_labels_reproduce_training_labels() {
        let table = with_value(&known(), 0, 3, 0.0);
        let model = SpacematrixStrategy::new(vec![]).with_clusters(2).fitter().fit(&table).unwrap();
        assert_eq!(model.density_labels(&table).unwrap(), model.labels());
    }

    #[test]
    fn predicted_labels_follow_site_area() {
        let model = SpacematrixStrategy::new(vec![]).with_clusters(2).fitter().fit(&known()).unwrap();
        let (sparse, dense) = (model.labels()[0], model.labels()[6]);
        assert_ne!(sparse, dense);
        assert_eq!(model.predict_labels(&unknown()).unwrap().to_vec(), vec![sparse, dense]);
    }

    #[test]
    fn softmax_classifier_is_available() {
        let strategy = SpacematrixStrategy::new(vec![]).with_clusters(2).with_classifier(ClassifierKind::Softmax);
        let model = strategy.fitter().fit(&known()).unwrap();
        assert!(matches!(model.classifier(), TypologyClassifier::Softmax(_)));
        assert_eq!(model.classifier().classes(), &[0, 1]);

        let values = strategy.impute(&known(), &unknown(), &features()).unwrap();
        assert!(values.iter().all(|&v| v.is_finite() && v >= 0.0));
    }

    #[test]
    fn forest_is_the_default_classifier() {
        let model = SpacematrixStrategy::default().with_clusters(2).fitter().fit(&known()).unwrap();
        assert!(matches!(model.classifier(), TypologyClassifier::Forest(_)));
    }

    fn with_value(table: &BlockTable, row: usize, col: usize, value: f64) -> BlockTable {
        let mut values = table.values().clone();
        values[[row, col]] = value;
        BlockTable::new(table.ids().to_vec(), table.columns().to_vec(), values).unwrap()
    }

    #[test]
    fn cluster_count_is_reduced_to_distinct_points() {
        // Three density levels, each repeated on four blocks of different size.
        let values = Array2::from_shape_fn((12, 5), |(i, j)| {
            let site = 100.0 + 50.0 * i as f64;
            let level = (i % 3) as f64 + 1.0;
            match j {
                0 => i as f64,
                1 => 0.0,
                2 => site,
                3 => site * 0.1 * level,
                _ => site * 0.5 * level,
            }
        });
        let table = BlockTable::new((1..=12).collect(), columns(), values).unwrap();
        let model = SpacematrixStrategy::new(vec![]).fitter().fit(&table).unwrap();
        assert_eq!(model.profiles().len(), 3);
    }

    #[test]
    fn masked_rows_get_the_zero_profile() {
        let table = with_value(&known(), 0, 3, 0.0);  // zero footprint on block 1
        let model = SpacematrixStrategy::new(vec![]).with_clusters(2).fitter().fit(&table).unwrap();
        assert_eq!(model.labels()[0], UNCLUSTERED);
        let profile = model.profiles()[&UNCLUSTERED];
        assert_eq!((profile.fsi, profile.gsi, profile.size), (0.0, 0.0, 1));
    }

    #[test]
    fn identical_densities_fail_classification() {
        let values = Array2::from_shape_fn((4, 5), |(i, j)| match j {
            0 => i as f64,
            1 => 0.0,
            2 => 100.0,
            3 => 40.0,
            _ => 150.0,
        });
        let table = BlockTable::new(vec![1, 2, 3, 4], columns(), values).unwrap();
        let result = SpacematrixStrategy::new(vec![]).impute(&table, &unknown(), &features());
        assert!(matches!(result, Err(ImputeError::ClassifierFit(_))));
    }

    #[test]
    fn nonpositive_site_area_fails() {
        let table = with_value(&known(), 2, 2, 0.0);
        let result = SpacematrixStrategy::new(vec![]).impute(&table, &unknown(), &features());
        assert!(matches!(result, Err(ImputeError::RatioComputation(_))));
    }

    #[test]
    fn unsupported_feature_fails() {
        let result = SpacematrixStrategy::new(vec![])
            .impute(&known(), &unknown(), &["site_area".to_string()]);
        assert!(matches!(result, Err(ImputeError::RatioComputation(_))));
    }

    #[test]
    fn missing_ratio_column_maps_to_ratio_error() {
        let strategy = SpacematrixStrategy::default();
        assert!(matches!(strategy.missing_column("site_area"), ImputeError::RatioComputation(_)));
        assert!(matches!(strategy.missing_column("landuse"), ImputeError::MissingColumn(_)));
    }
}
