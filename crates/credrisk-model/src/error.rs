//! Error types for model loading, scoring and attribution.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while loading or applying a model
#[derive(Debug, Error)]
pub enum ModelError {
    /// Model artifact is missing or unusable
    #[error("Failed to load model from {}: {reason}", path.display())]
    LoadFailure {
        /// Artifact path
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// Model structure is inconsistent
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Objective other than binary logistic
    #[error("Unsupported objective: {0}")]
    UnsupportedObjective(String),

    /// Feature table columns differ from the model's declared features
    #[error("Feature schema mismatch (missing: {missing:?}, extra: {extra:?})")]
    SchemaMismatch {
        /// Model features absent from the table, or out of position
        missing: Vec<String>,
        /// Table columns the model does not declare, or out of position
        extra: Vec<String>,
    },

    /// Row width differs from the model's feature count
    #[error("Expected {expected} features, got {actual}")]
    FeatureCount {
        /// Model feature count
        expected: usize,
        /// Row width
        actual: usize,
    },

    /// Decision threshold outside (0, 1)
    #[error("Decision threshold must be in (0, 1), got {0}")]
    InvalidThreshold(f64),

    /// Top-K of zero
    #[error("Top-K must be at least 1, got {0}")]
    InvalidTopK(usize),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ModelError {
    /// Wrap any error raised while reading the artifact at `path`.
    pub fn load_failure(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::LoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
