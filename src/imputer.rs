use ndarray::Axis;

use crate::{
    dataset::{BlockDataset, BlockId, BlockTable},
    error::{ImputeError, Result},
    strategy::{ImputationStrategy, Strategy},
};

/// Imputes target features of chosen blocks from every other block of a dataset.
///
/// Holds its own copy of the dataset restricted to the columns the strategy reads;
/// the source dataset is never touched after construction.
#[derive(Debug, Clone)]
pub struct Imputer<S: ImputationStrategy = Strategy> {
    strategy: S,
    features: Vec<String>,
    table: BlockTable,
}

impl<S: ImputationStrategy> Imputer<S> {
    /// Create an imputer for `features` of `dataset`.
    /// Fails if any feature or auxiliary column the strategy needs is absent.
    pub fn new(dataset: &BlockDataset, features: Vec<String>, strategy: S) -> Result<Self> {
        if features.is_empty() {
            return Err(ImputeError::InvalidParameter("no features to impute".into()));
        }

        let mut columns = features.clone();
        for column in strategy.auxiliary_columns(&features) {
            if !columns.contains(&column) { columns.push(column) }
        }
        if let Some(missing) = columns.iter().find(|column| !dataset.has_column(column)) {
            return Err(strategy.missing_column(missing));
        }

        let table = dataset.table(&columns)?;
        Ok(Self { strategy, features, table })
    }

    #[inline] pub fn strategy(&self) -> &S { &self.strategy }

    #[inline] pub fn features(&self) -> &[String] { &self.features }

    /// Columns held by this imputer: features followed by auxiliaries.
    #[inline] pub fn columns(&self) -> &[String] { self.table.columns() }

    /// Impute the target features of `unknown_ids`, fitting on all other blocks.
    ///
    /// Returns one row per requested id present in the dataset, in dataset order,
    /// holding exactly the feature columns.
    pub fn impute(&self, unknown_ids: &[BlockId]) -> Result<BlockTable> {
        let (known, mut unknown) = self.table.split(unknown_ids);
        if unknown.is_empty() {
            tracing::debug!("[imputer] none of {} requested ids are in the dataset", unknown_ids.len());
            return Ok(BlockTable::empty(self.features.clone()));
        }
        if known.is_empty() {
            return Err(ImputeError::EmptyTrainingSet);
        }

        tracing::debug!("[imputer] {}: {} known, {} unknown blocks", self.strategy.name(), known.len(), unknown.len());
        let values = self.strategy.impute(&known, &unknown, &self.features)?;
        if values.dim() != (unknown.len(), self.features.len()) {
            return Err(ImputeError::ShapeMismatch(format!(
                "{} returned {:?}, expected ({}, {})",
                self.strategy.name(), values.dim(), unknown.len(), self.features.len()
            )));
        }

        for (feature, column) in self.features.iter().zip(values.axis_iter(Axis(1))) {
            unknown.set_column(feature, column)?;
        }

        tracing::info!("[imputer] imputed {} features for {} blocks with {}", self.features.len(), unknown.len(), self.strategy.name());
        unknown.select(&self.features)
    }
}
