//! Credit Model
//!
//! The capability every loaded artifact provides: a log-odds margin per
//! feature row, the default probability derived from it, and a native additive
//! decomposition of that margin.
//!
//! p(default) = 1 / (1 + exp(-margin))
//! margin     = base_value + Σ contribution_i

use crate::error::{ModelError, Result};
use crate::scorer::{DecisionThreshold, DefaultLabel};
use credrisk_features::FeatureSchema;
use ndarray::{Array1, ArrayView1, ArrayView2};
use std::fmt;

/// Trait for loaded default-prediction models
///
/// Implementations are read-only after construction and shared across
/// threads.
pub trait CreditModel: Send + Sync + fmt::Debug {
    /// Short human-readable model description
    fn name(&self) -> &str;

    /// Feature names in the order the model consumes them
    fn feature_names(&self) -> &[String];

    /// Raw log-odds output for one feature row
    fn margin(&self, row: ArrayView1<'_, f64>) -> f64;

    /// Additive decomposition of [`CreditModel::margin`] for one feature row
    fn contributions(&self, row: ArrayView1<'_, f64>) -> Contributions;

    /// Number of features the model consumes
    fn n_features(&self) -> usize {
        self.feature_names().len()
    }

    /// Probability of default for one feature row
    fn probability(&self, row: ArrayView1<'_, f64>) -> f64 {
        sigmoid(self.margin(row))
    }

    /// Probability of default for every row
    fn predict_proba(&self, rows: ArrayView2<'_, f64>) -> Array1<f64> {
        rows.outer_iter().map(|row| self.probability(row)).collect()
    }

    /// Binary label for every row under `threshold`
    fn predict(&self, rows: ArrayView2<'_, f64>, threshold: DecisionThreshold) -> Vec<DefaultLabel> {
        self.predict_proba(rows)
            .iter()
            .map(|&p| threshold.classify(p))
            .collect()
    }
}

/// Per-feature contributions to one margin, in log-odds space
#[derive(Debug, Clone, PartialEq)]
pub struct Contributions {
    /// Expected margin over the model's background distribution
    pub base_value: f64,
    /// One signed contribution per feature, in model order
    pub values: Array1<f64>,
}

impl Contributions {
    /// Create a new contribution vector
    pub const fn new(base_value: f64, values: Array1<f64>) -> Self {
        Self { base_value, values }
    }

    /// The margin these contributions add up to
    pub fn margin(&self) -> f64 {
        self.base_value + self.values.sum()
    }
}

/// Logistic link
pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Inverse of [`sigmoid`]
pub fn logit(probability: f64) -> f64 {
    (probability / (1.0 - probability)).ln()
}

/// Feature names for an artifact that may not declare them.
///
/// An artifact without names is assumed to use the default credit-default
/// schema when its feature count matches it.
pub fn resolve_feature_names(declared: Vec<String>, n_features: usize) -> Result<Vec<String>> {
    if !declared.is_empty() {
        if declared.len() != n_features {
            return Err(ModelError::FeatureCount {
                expected: declared.len(),
                actual: n_features,
            });
        }
        return Ok(declared);
    }

    let default = FeatureSchema::credit_default();
    if default.len() == n_features {
        Ok(default.names().into_iter().map(String::from).collect())
    } else {
        Err(ModelError::InvalidModel(format!(
            "artifact declares no feature names and has {} features; the default schema has {}",
            n_features,
            default.len()
        )))
    }
}
