//! Typed errors for the load and clean boundaries
//!
//! Structural problems (unknown keys, missing files, missing columns) fail fast here.
//! Once data is inside the merge/score pipeline, problems surface as missing values
//! instead of errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CbamError {
    #[error("unknown dataset key: {key} (available keys: {available})")]
    UnknownDataset { key: String, available: String },

    #[error("data directory not found: {}", .0.display())]
    DataDirMissing(PathBuf),

    #[error("dataset file not found: {}", .0.display())]
    FileMissing(PathBuf),

    #[error("{0} is empty")]
    EmptyDataset(String),

    #[error("{dataset} missing required columns: {}", .columns.join(", "))]
    MissingColumns {
        dataset: String,
        columns: Vec<String>,
    },

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    ColumnLength {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("failed to read {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("dataframe operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CbamError>;
