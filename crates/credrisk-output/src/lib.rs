#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/credrisk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attribution;
pub mod export;
pub mod report;
pub mod summary;

pub use attribution::FeatureAttribution;
pub use export::{ExportError, ExportFormat, Exporter};
pub use report::ScoreReport;
pub use summary::{BatchReport, BatchSummary};
