//! Error types for the scoring pipeline.

use credrisk_features::FeatureError;
use credrisk_model::ModelError;
use credrisk_output::ExportError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, CredRiskError>;

/// Errors that can occur while configuring or running the pipeline.
#[derive(Debug, Error)]
pub enum CredRiskError {
    /// Raw input could not be read, validated or derived
    #[error(transparent)]
    Features(#[from] FeatureError),

    /// Model could not be loaded or applied
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Reports could not be exported
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Configuration sources could not be read or merged
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
