#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/credrisk/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod attribution;
pub mod error;
pub mod logistic;
pub mod model;
pub mod scorer;
pub mod shap;
pub mod tree;
pub mod xgboost;

// Re-export main types
pub use attribution::{Attributor, Explanation, FeatureContribution, RiskDirection};
pub use error::{ModelError, Result};
pub use logistic::LogisticModel;
pub use model::{Contributions, CreditModel, logit, sigmoid};
pub use scorer::{DecisionThreshold, DefaultLabel, Prediction, Scorer};
pub use tree::{Node, Tree, TreeEnsemble};
