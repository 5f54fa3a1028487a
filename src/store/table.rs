//! Flat CSV tables keyed by column name.

use std::collections::BTreeMap;
use std::path::Path;

use super::write_atomic;
use crate::error::{Error, Result};

/// One CSV row, by column name.
pub type Row = BTreeMap<String, String>;

/// A CSV file read as header plus rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableFile {
    /// Header, in file order
    pub columns: Vec<String>,
    /// Rows
    pub rows: Vec<Row>,
}

impl TableFile {
    /// Whether the file has the given column.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Read a CSV table. A missing file gives `None`.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Option<TableFile>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Row = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.clone(), record.get(i).unwrap_or("").to_string()))
            .collect();
        rows.push(row);
    }
    Ok(Some(TableFile { columns, rows }))
}

/// Write a CSV table with the given column order. Missing cells are empty.
pub fn write_rows(path: impl AsRef<Path>, columns: &[&str], rows: &[Row]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows {
        writer.write_record(columns.iter().map(|c| row.get(*c).map(String::as_str).unwrap_or("")))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::Other(format!("CSV buffer: {}", e)))?;
    write_atomic(path.as_ref(), &bytes)
}
