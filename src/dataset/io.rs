//! CSV reading and writing of block tables.

use std::{fs::File, io::Cursor, path::Path};

use polars::{io::SerReader, prelude::{CsvReader, CsvWriter, SerWriter}};

use crate::error::Result;
use super::{BlockDataset, BlockTable};

/// Reads a block CSV file from `path` into a dataset.
pub fn read_csv(path: &Path) -> Result<BlockDataset> {
    let file = File::open(path)?;
    let df = CsvReader::new(file).finish()?;
    tracing::debug!("[dataset::io] read {} rows from {}", df.height(), path.display());
    BlockDataset::from_dataframe(df)
}

/// Reads a block CSV from an in-memory string.
pub fn read_csv_string(csv: &str) -> Result<BlockDataset> {
    let df = CsvReader::new(Cursor::new(csv.as_bytes())).finish()?;
    BlockDataset::from_dataframe(df)
}

/// Writes a table (id column first) to a CSV file at `path`.
pub fn write_csv(table: &BlockTable, path: &Path) -> Result<()> {
    let mut df = table.to_dataframe()?;
    let file = File::create(path)?;
    CsvWriter::new(file).finish(&mut df)?;
    tracing::debug!("[dataset::io] wrote {} rows to {}", df.height(), path.display());
    Ok(())
}
