//! Scorer
//!
//! Turns aligned feature rows into default probabilities and labels under one
//! named decision threshold:
//!
//! label = Default  iff  p(default) > threshold
//!
//! The table's columns are checked against the model's declared features
//! before any row is scored.

use crate::error::{ModelError, Result};
use crate::model::CreditModel;
use credrisk_features::FeatureTable;
use derive_more::Display;
use ndarray::ArrayView1;
use ndarray::parallel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Probability cutoff above which a record is labelled [`DefaultLabel::Default`]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct DecisionThreshold(f64);

impl DecisionThreshold {
    /// Default cutoff, tuned for recall on the minority default class
    pub const DEFAULT: f64 = 0.30;

    /// Create a threshold; must lie strictly inside (0, 1).
    pub fn new(value: f64) -> Result<Self> {
        if value > 0.0 && value < 1.0 {
            Ok(Self(value))
        } else {
            Err(ModelError::InvalidThreshold(value))
        }
    }

    /// Cutoff value
    pub const fn value(&self) -> f64 {
        self.0
    }

    /// Label for a probability of default
    pub fn classify(&self, probability: f64) -> DefaultLabel {
        if probability > self.0 {
            DefaultLabel::Default
        } else {
            DefaultLabel::Compliant
        }
    }
}

impl Default for DecisionThreshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl TryFrom<f64> for DecisionThreshold {
    type Error = ModelError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DecisionThreshold> for f64 {
    fn from(threshold: DecisionThreshold) -> Self {
        threshold.0
    }
}

/// Binary outcome, serialized as 0 / 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DefaultLabel {
    /// Expected to keep paying (0)
    #[display("Compliant")]
    Compliant,
    /// Expected to default next month (1)
    #[display("Default")]
    Default,
}

impl DefaultLabel {
    /// Whether this is the default class
    pub const fn is_default(&self) -> bool {
        matches!(self, Self::Default)
    }
}

impl From<DefaultLabel> for u8 {
    fn from(label: DefaultLabel) -> Self {
        match label {
            DefaultLabel::Compliant => 0,
            DefaultLabel::Default => 1,
        }
    }
}

impl TryFrom<u8> for DefaultLabel {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Compliant),
            1 => Ok(Self::Default),
            other => Err(format!("label must be 0 or 1, got {other}")),
        }
    }
}

/// Score for one feature row
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Raw log-odds
    pub margin: f64,
    /// Probability of default
    pub probability: f64,
    /// Label under the scorer's threshold
    pub label: DefaultLabel,
}

/// Applies a model and a decision threshold to aligned feature tables
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    threshold: DecisionThreshold,
    parallel: bool,
}

impl Scorer {
    /// Create a scorer with the given threshold (serial).
    pub const fn new(threshold: DecisionThreshold) -> Self {
        Self {
            threshold,
            parallel: false,
        }
    }

    /// Score rows in parallel; results keep the input order.
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Decision threshold
    pub const fn threshold(&self) -> DecisionThreshold {
        self.threshold
    }

    /// Fail unless `columns` equal the model's features, in order.
    ///
    /// A column present on both sides but in the wrong position is reported in
    /// both `missing` and `extra`.
    pub fn check_schema(model: &dyn CreditModel, columns: &[String]) -> Result<()> {
        let expected = model.feature_names();
        if columns == expected {
            return Ok(());
        }

        let mut missing: Vec<String> = expected
            .iter()
            .filter(|name| !columns.contains(name))
            .cloned()
            .collect();
        let mut extra: Vec<String> = columns
            .iter()
            .filter(|name| !expected.contains(name))
            .cloned()
            .collect();

        if missing.is_empty() && extra.is_empty() {
            // Same set, different order
            for (want, got) in expected.iter().zip(columns) {
                if want != got {
                    missing.push(want.clone());
                    extra.push(got.clone());
                }
            }
        }

        Err(ModelError::SchemaMismatch { missing, extra })
    }

    /// Score one row without a schema check.
    pub fn score_row(&self, model: &dyn CreditModel, row: ArrayView1<'_, f64>) -> Prediction {
        let margin = model.margin(row);
        let probability = crate::model::sigmoid(margin);
        Prediction {
            margin,
            probability,
            label: self.threshold.classify(probability),
        }
    }

    /// Score every row of an aligned table.
    pub fn score(&self, model: &dyn CreditModel, table: &FeatureTable) -> Result<Vec<Prediction>> {
        Self::check_schema(model, table.columns())?;

        let predictions: Vec<Prediction> = if self.parallel {
            (0..table.nrows())
                .into_par_iter()
                .map(|i| self.score_row(model, table.row(i)))
                .collect()
        } else {
            table
                .values()
                .outer_iter()
                .map(|row| self.score_row(model, row))
                .collect()
        };

        debug!(
            rows = predictions.len(),
            defaults = predictions.iter().filter(|p| p.label.is_default()).count(),
            threshold = self.threshold.value(),
            "Scored feature table"
        );
        Ok(predictions)
    }
}
