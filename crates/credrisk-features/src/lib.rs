#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/credrisk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod align;
pub mod derive;
pub mod error;
pub mod input;
pub mod record;
pub mod registry;
pub mod schema;

pub use align::SchemaAligner;
pub use derive::{DeriverConfig, DerivedFeatures, FeatureDeriver};
pub use error::{FeatureError, Result};
pub use input::{REQUIRED_COLUMNS, read_batch, read_batch_file, validate_headers};
pub use record::{BillingHistory, Categorical, InteractiveRecord, RawAccountRecord};
pub use schema::{ColumnKind, ColumnSpec, FeatureSchema, FeatureTable};

// Re-export registry types for convenience
pub use registry::{
    FeatureCategory, FeatureInfo, available_features, features_by_category, get_feature_info,
};
