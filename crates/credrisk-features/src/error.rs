//! Error types for feature derivation and ingestion.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors that can occur while ingesting records or building feature tables.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// Batch input is missing required raw columns
    #[error("Batch is missing required columns: {}", missing.join(", "))]
    MissingColumns {
        /// Names of the missing columns, in canonical order
        missing: Vec<String>,
    },

    /// A raw field failed validation
    #[error("Invalid value for {field}{}: {reason}", row.map(|r| format!(" (row {r})")).unwrap_or_default())]
    InvalidField {
        /// 1-based batch row, if the record came from a batch
        row: Option<usize>,
        /// Name of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Feature table shape does not match its column list
    #[error("Feature table has {columns} column names but {width} value columns")]
    ShapeMismatch {
        /// Number of column names
        columns: usize,
        /// Width of the value matrix
        width: usize,
    },

    /// Deriver or schema configuration is invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// CSV parsing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// ndarray shape error
    #[error("Shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl FeatureError {
    /// Attach a batch row number to an `InvalidField` error.
    pub fn at_row(self, row: usize) -> Self {
        match self {
            Self::InvalidField { field, reason, .. } => Self::InvalidField {
                row: Some(row),
                field,
                reason,
            },
            other => other,
        }
    }
}
