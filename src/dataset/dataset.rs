use std::collections::BTreeSet;

use ahash::AHashSet;
use ndarray::Array2;
use polars::{frame::DataFrame, prelude::{Column, DataType, NamedFrom}, series::Series};

use crate::error::{ImputeError, Result};
use super::{
    Block, BlockId, BlockTable,
    BUILD_FLOOR_AREA_COLUMN, CENTROID_X_COLUMN, CENTROID_Y_COLUMN, FOOTPRINT_AREA_COLUMN,
    ID_COLUMN, SITE_AREA_COLUMN,
};

/// An ordered collection of blocks keyed by unique id, backed by a polars DataFrame.
///
/// The imputation core never mutates a dataset; imputers take a dense copy of the
/// columns they need via [`BlockDataset::table`].
#[derive(Debug, Clone)]
pub struct BlockDataset {
    data: DataFrame,
    ids: Vec<BlockId>,
}

impl BlockDataset {
    /// Wrap a DataFrame that has an integer `id` column with unique, non-null values.
    pub fn from_dataframe(data: DataFrame) -> Result<Self> {
        let ids = data.column(ID_COLUMN)
            .map_err(|_| ImputeError::MissingColumn(ID_COLUMN.to_string()))?
            .cast(&DataType::Int64)?
            .i64()?
            .into_iter()
            .enumerate()
            .map(|(row, id)| id.ok_or_else(|| ImputeError::InvalidParameter(
                format!("null {ID_COLUMN} at row {row}")
            )))
            .collect::<Result<Vec<_>>>()?;

        let mut seen = AHashSet::with_capacity(ids.len());
        if let Some(&duplicate) = ids.iter().find(|&&id| !seen.insert(id)) {
            return Err(ImputeError::DuplicateId(duplicate));
        }

        Ok(Self { data, ids })
    }

    /// Build a dataset from in-memory blocks.
    /// Auxiliary attributes absent on some blocks become nulls.
    pub fn from_blocks(blocks: &[Block]) -> Result<Self> {
        let attributes = blocks.iter()
            .flat_map(|block| block.attributes.keys().cloned())
            .collect::<BTreeSet<String>>();

        let mut columns: Vec<Column> = vec![
            Series::new(ID_COLUMN.into(), blocks.iter().map(|b| b.id).collect::<Vec<_>>()).into(),
            Series::new(CENTROID_X_COLUMN.into(), blocks.iter().map(|b| b.centroid.x()).collect::<Vec<_>>()).into(),
            Series::new(CENTROID_Y_COLUMN.into(), blocks.iter().map(|b| b.centroid.y()).collect::<Vec<_>>()).into(),
            Series::new(SITE_AREA_COLUMN.into(), blocks.iter().map(|b| b.site_area).collect::<Vec<_>>()).into(),
            Series::new(FOOTPRINT_AREA_COLUMN.into(), blocks.iter().map(|b| b.footprint_area).collect::<Vec<_>>()).into(),
            Series::new(BUILD_FLOOR_AREA_COLUMN.into(), blocks.iter().map(|b| b.build_floor_area).collect::<Vec<_>>()).into(),
        ];
        for name in &attributes {
            let values = blocks.iter()
                .map(|b| b.attributes.get(name).copied())
                .collect::<Vec<Option<f64>>>();
            columns.push(Series::new(name.as_str().into(), values).into());
        }

        Self::from_dataframe(DataFrame::new(columns)?)
    }

    /// Get the number of blocks.
    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    /// Check if there are no blocks.
    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    /// Block ids in dataset order.
    #[inline] pub fn ids(&self) -> &[BlockId] { &self.ids }

    /// Get a reference to the underlying DataFrame.
    #[inline] pub fn dataframe(&self) -> &DataFrame { &self.data }

    pub fn column_names(&self) -> Vec<String> {
        self.data.get_column_names().into_iter().map(|name| name.to_string()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.data.column(name).is_ok()
    }

    /// Ids of blocks where any of `columns` is null (i.e. the blocks that need imputing).
    pub fn ids_missing_any(&self, columns: &[String]) -> Result<Vec<BlockId>> {
        let table = self.table(columns)?;
        Ok(table.values().rows().into_iter()
            .zip(self.ids.iter())
            .filter_map(|(row, &id)| row.iter().any(|v| v.is_nan()).then_some(id))
            .collect())
    }

    /// Dense copy of the requested numeric columns, with nulls as `NaN`.
    pub fn table(&self, columns: &[String]) -> Result<BlockTable> {
        let mut values = Array2::from_elem((self.len(), columns.len()), f64::NAN);
        for (j, name) in columns.iter().enumerate() {
            let column = self.data.column(name)
                .map_err(|_| ImputeError::MissingColumn(name.clone()))?
                .cast(&DataType::Float64)?;
            for (i, value) in column.f64()?.into_iter().enumerate() {
                if let Some(value) = value { values[[i, j]] = value }
            }
        }
        BlockTable::new(self.ids.clone(), columns.to_vec(), values)
    }

    /// One-hot encode a categorical column (e.g. land use) into `{column}_{category}`
    /// indicator columns, returning their names. Categories come from the data, sorted.
    pub fn encode_categorical(&mut self, column: &str) -> Result<Vec<String>> {
        let values = self.data.column(column)
            .map_err(|_| ImputeError::MissingColumn(column.to_string()))?
            .cast(&DataType::String)?;
        let values = values.str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect::<Vec<Option<String>>>();

        let categories = values.iter().flatten().cloned().collect::<BTreeSet<String>>();

        let mut names = Vec::with_capacity(categories.len());
        for category in &categories {
            let name = format!("{column}_{category}");
            let indicator = values.iter()
                .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                .collect::<Vec<f64>>();
            self.data.with_column(Series::new(name.as_str().into(), indicator))?;
            names.push(name);
        }
        Ok(names)
    }
}
