#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/credrisk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod loader;
pub mod pipeline;
pub mod settings;

// Re-export main types from sub-crates
pub use credrisk_features as features;
pub use credrisk_model as model;
pub use credrisk_output as output;

pub use error::{CredRiskError, Result};
pub use loader::load_model;
pub use pipeline::{BatchProgress, ScoringPipeline};
pub use settings::{AppConfig, LogFormat, LoggingConfig, ScoringConfig};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
