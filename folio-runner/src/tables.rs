//! CSV input tables.
//!
//! Every input file is read as strings into a `folio_core::hierarchy::Table`;
//! typed parsing and validation happen after the read.

use std::path::Path;

use folio_core::hierarchy::{Table, ValidationError};
use thiserror::Error;

/// Errors from loading input data.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{label} not found: {path}")]
    NotFound { label: String, path: String },
    #[error("failed to read {path}: {source}")]
    Csv { path: String, source: csv::Error },
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Dataset missing required columns: {0:?}")]
    MissingSymbols(Vec<String>),
    #[error("invalid date '{value}' in row {row}")]
    InvalidDate { row: usize, value: String },
    #[error("invalid price '{value}' for {symbol} on {date}")]
    InvalidPrice {
        symbol: String,
        date: String,
        value: String,
    },
    #[error("Dataset contains no complete rows for required columns: {0:?}")]
    NoCompleteRows(Vec<String>),
    #[error("Required tickers contain gaps inside effective analysis window: {0:?}")]
    GapInWindow(Vec<String>),
    #[error("{0}")]
    Portfolio(String),
}

/// Read a CSV file with a header row into a `Table` labelled `label`.
pub fn read_table(path: &Path, label: &str) -> Result<Table, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            label: label.to_string(),
            path: path.display().to_string(),
        });
    }
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.display().to_string(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(csv_err)?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(str::to_string)
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    tracing::debug!(path = %path.display(), rows = rows.len(), "read table");
    Ok(Table::new(label, headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_headers_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        std::fs::write(&path, "a,b\n1,2\n3\n").unwrap();
        let table = read_table(&path, "test table").unwrap();
        assert_eq!(table.headers(), &["a".to_string(), "b".to_string()]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "b"), "");
    }

    #[test]
    fn missing_file_reports_label() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table(&dir.path().join("nope.csv"), "Portfolio definitions").unwrap_err();
        assert!(err.to_string().starts_with("Portfolio definitions not found"));
    }
}
