use ahash::{AHashMap, AHashSet};
use ndarray::{Array2, ArrayView1, Axis};
use polars::{frame::DataFrame, prelude::{Column, NamedFrom}, series::Series};

use crate::error::{ImputeError, Result};
use super::{BlockId, ID_COLUMN};

/// A dense, row-major working table: one row per block, one column per numeric attribute.
/// Missing observations are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockTable {
    ids: Vec<BlockId>,
    columns: Vec<String>,
    values: Array2<f64>,
}

impl BlockTable {
    pub fn new(ids: Vec<BlockId>, columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if values.dim() != (ids.len(), columns.len()) {
            return Err(ImputeError::ShapeMismatch(format!(
                "values are {:?}, expected ({}, {})", values.dim(), ids.len(), columns.len()
            )));
        }
        Ok(Self { ids, columns, values })
    }

    /// An empty table carrying only the column layout.
    pub fn empty(columns: Vec<String>) -> Self {
        let width = columns.len();
        Self { ids: Vec::new(), columns, values: Array2::zeros((0, width)) }
    }

    /// Number of rows (blocks).
    #[inline] pub fn len(&self) -> usize { self.ids.len() }

    /// Check if the table holds no rows.
    #[inline] pub fn is_empty(&self) -> bool { self.ids.is_empty() }

    #[inline] pub fn ids(&self) -> &[BlockId] { &self.ids }

    #[inline] pub fn columns(&self) -> &[String] { &self.columns }

    #[inline] pub fn values(&self) -> &Array2<f64> { &self.values }

    /// Position of a named column.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.columns.iter()
            .position(|column| column == name)
            .ok_or_else(|| ImputeError::MissingColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// View of a single named column.
    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        Ok(self.values.column(self.column_index(name)?))
    }

    /// Value at (block id, column), if the id is present.
    pub fn get(&self, id: BlockId, column: &str) -> Result<Option<f64>> {
        let col = self.column_index(column)?;
        Ok(self.ids.iter().position(|&i| i == id).map(|row| self.values[[row, col]]))
    }

    /// Dense matrix of the given columns, in the given order.
    pub fn matrix(&self, columns: &[String]) -> Result<Array2<f64>> {
        let indices = columns.iter()
            .map(|column| self.column_index(column))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.values.select(Axis(1), &indices))
    }

    /// Copy of this table restricted to the given columns.
    pub fn select(&self, columns: &[String]) -> Result<BlockTable> {
        Ok(Self {
            ids: self.ids.clone(),
            columns: columns.to_vec(),
            values: self.matrix(columns)?,
        })
    }

    /// Copy of the given rows, in the given order.
    pub fn rows(&self, indices: &[usize]) -> BlockTable {
        Self {
            ids: indices.iter().map(|&i| self.ids[i]).collect(),
            columns: self.columns.clone(),
            values: self.values.select(Axis(0), indices),
        }
    }

    /// Partition rows into (known, unknown) by membership in `unknown_ids`.
    /// Both halves preserve table order; requested ids absent from the table are ignored.
    pub fn split(&self, unknown_ids: &[BlockId]) -> (BlockTable, BlockTable) {
        let targets = unknown_ids.iter().copied().collect::<AHashSet<_>>();
        let (unknown, known) = (0..self.len())
            .partition::<Vec<_>, _>(|&row| targets.contains(&self.ids[row]));
        (self.rows(&known), self.rows(&unknown))
    }

    /// Overwrite one column with new values (row-aligned).
    pub(crate) fn set_column(&mut self, name: &str, values: ArrayView1<f64>) -> Result<()> {
        if values.len() != self.len() {
            return Err(ImputeError::ShapeMismatch(format!(
                "column '{name}' has {} values, expected {}", values.len(), self.len()
            )));
        }
        let col = self.column_index(name)?;
        self.values.column_mut(col).assign(&values);
        Ok(())
    }

    /// Map from block id to row position.
    pub(crate) fn row_index(&self) -> AHashMap<BlockId, usize> {
        self.ids.iter().enumerate().map(|(row, &id)| (id, row)).collect()
    }

    /// Convert to a polars DataFrame with the id column first; `NaN` becomes null.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.columns.len() + 1);
        columns.push(Series::new(ID_COLUMN.into(), self.ids.clone()).into());
        for (j, name) in self.columns.iter().enumerate() {
            let values = self.values.column(j).iter()
                .map(|&v| (!v.is_nan()).then_some(v))
                .collect::<Vec<Option<f64>>>();
            columns.push(Series::new(name.as_str().into(), values).into());
        }
        Ok(DataFrame::new(columns)?)
    }
}
