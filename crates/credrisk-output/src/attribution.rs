//! Feature attributions as reported to users.
//!
//! A reported attribution names a model feature, the value it had for the
//! scored record and its signed log-odds contribution to the score.

use credrisk_model::{FeatureContribution, RiskDirection};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One explained feature of a score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeatureAttribution {
    /// Name of the feature (e.g., "max_delay", "credit_utilization").
    pub feature: String,

    /// The feature's value for the scored record.
    pub value: f64,

    /// Signed contribution to the log-odds of default.
    pub contribution: f64,

    /// Whether the contribution raises or lowers the risk.
    pub direction: RiskDirection,
}

impl FeatureAttribution {
    /// Create a new feature attribution.
    ///
    /// # Arguments
    ///
    /// * `feature` - Name of the feature
    /// * `value` - Feature value for the record
    /// * `contribution` - Signed log-odds contribution
    ///
    /// # Examples
    ///
    /// ```
    /// use credrisk_output::FeatureAttribution;
    /// use credrisk_model::RiskDirection;
    ///
    /// let attribution = FeatureAttribution::new("max_delay".to_string(), 3.0, 0.82);
    ///
    /// assert_eq!(attribution.direction, RiskDirection::Increases);
    /// assert_eq!(attribution.direction.to_string(), "increases risk");
    /// ```
    pub fn new(feature: String, value: f64, contribution: f64) -> Self {
        Self {
            feature,
            value,
            contribution,
            direction: RiskDirection::of(contribution),
        }
    }
}

impl From<&FeatureContribution> for FeatureAttribution {
    fn from(c: &FeatureContribution) -> Self {
        Self {
            feature: c.feature.clone(),
            value: c.value,
            contribution: c.contribution,
            direction: c.direction,
        }
    }
}

impl From<FeatureContribution> for FeatureAttribution {
    fn from(c: FeatureContribution) -> Self {
        Self {
            feature: c.feature,
            value: c.value,
            contribution: c.contribution,
            direction: c.direction,
        }
    }
}

impl fmt::Display for FeatureAttribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:+.4} log-odds, {} (value: {})",
            self.feature, self.contribution, self.direction, self.value
        )
    }
}
