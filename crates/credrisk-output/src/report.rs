//! Per-record score reports.

use crate::attribution::FeatureAttribution;
use credrisk_model::{DefaultLabel, Explanation, Prediction};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scoring result for one customer record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreReport {
    /// Record identifier (the batch `ID` column, or the 1-based row number).
    pub record_id: String,

    /// Probability of default next month, in [0, 1].
    pub probability: f64,

    /// Binary label under the decision threshold (0 = compliant, 1 = default).
    pub label: DefaultLabel,

    /// Most influential features, largest absolute contribution first.
    pub attributions: Vec<FeatureAttribution>,

    /// Whether the billing features were derived from placeholder averages.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub placeholder_history: bool,
}

impl ScoreReport {
    /// Create a new score report.
    pub const fn new(
        record_id: String,
        probability: f64,
        label: DefaultLabel,
        attributions: Vec<FeatureAttribution>,
    ) -> Self {
        Self {
            record_id,
            probability,
            label,
            attributions,
            placeholder_history: false,
        }
    }

    /// Build a report from a prediction and its explanation.
    pub fn from_parts(record_id: String, prediction: &Prediction, explanation: &Explanation) -> Self {
        Self::new(
            record_id,
            prediction.probability,
            prediction.label,
            explanation.top.iter().map(FeatureAttribution::from).collect(),
        )
    }

    /// Mark the report as scored from placeholder billing averages.
    pub const fn with_placeholder_history(mut self, placeholder: bool) -> Self {
        self.placeholder_history = placeholder;
        self
    }

    /// Format as an ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("\nCredit Default Score: {}\n", self.record_id));
        output.push_str(&"=".repeat(72));
        output.push('\n');
        output.push_str(&format!(
            "{:<28} {:>12.2}%\n",
            "Probability of Default",
            self.probability * 100.0
        ));
        output.push_str(&format!(
            "{:<28} {:>13}\n",
            "Prediction",
            self.label.to_string()
        ));

        if !self.attributions.is_empty() {
            output.push_str(&"-".repeat(72));
            output.push('\n');
            output.push_str(&format!(
                "{:<24} {:>14} {:>14}  {}\n",
                "Feature", "Value", "Contribution", "Effect"
            ));
            output.push_str(&"-".repeat(72));
            output.push('\n');
            for a in &self.attributions {
                output.push_str(&format!(
                    "{:<24} {:>14.4} {:>+14.4}  {}\n",
                    a.feature, a.value, a.contribution, a.direction
                ));
            }
        }

        output.push_str(&"=".repeat(72));
        output.push('\n');

        if self.placeholder_history {
            output.push_str(
                "Note: no billing history was supplied; bill and payment features use \
                 placeholder averages and do not describe this customer.\n",
            );
        }

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# Credit Default Score: {}\n\n", self.record_id));
        output.push_str(&format!(
            "- **Probability of Default:** {:.2}%\n",
            self.probability * 100.0
        ));
        output.push_str(&format!("- **Prediction:** {}\n\n", self.label));

        if !self.attributions.is_empty() {
            output.push_str("| Feature | Value | Contribution | Effect |\n");
            output.push_str("|---------|-------|--------------|--------|\n");
            for a in &self.attributions {
                output.push_str(&format!(
                    "| {} | {:.4} | {:+.4} | {} |\n",
                    a.feature, a.value, a.contribution, a.direction
                ));
            }
        }

        output
    }
}

impl fmt::Display for ScoreReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2}% ({})",
            self.record_id,
            self.probability * 100.0,
            self.label
        )?;
        for a in &self.attributions {
            write!(f, "\n  {a}")?;
        }
        Ok(())
    }
}
