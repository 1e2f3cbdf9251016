//! Batch summaries.
//!
//! Aggregates the per-record reports of one batch run: how many records were
//! scored, how many were labelled as defaults and how the probabilities are
//! spread.

use crate::report::ScoreReport;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate statistics for one scored batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    /// Number of records scored.
    pub count: usize,

    /// Records labelled as defaults.
    pub predicted_defaults: usize,

    /// Share of records labelled as defaults.
    pub default_rate: f64,

    /// Mean probability of default.
    pub mean_probability: f64,

    /// Lowest probability of default.
    pub min_probability: f64,

    /// Highest probability of default.
    pub max_probability: f64,

    /// Decision threshold the labels were assigned under.
    pub threshold: f64,
}

impl BatchSummary {
    /// Summarise a set of score reports.
    ///
    /// # Arguments
    ///
    /// * `reports` - Per-record reports of the batch
    /// * `threshold` - Decision threshold used for the labels
    ///
    /// # Examples
    ///
    /// ```
    /// use credrisk_model::DefaultLabel;
    /// use credrisk_output::{BatchSummary, ScoreReport};
    ///
    /// let reports = vec![
    ///     ScoreReport::new("1".to_string(), 0.10, DefaultLabel::Compliant, vec![]),
    ///     ScoreReport::new("2".to_string(), 0.70, DefaultLabel::Default, vec![]),
    /// ];
    ///
    /// let summary = BatchSummary::from_reports(&reports, 0.30);
    ///
    /// assert_eq!(summary.count, 2);
    /// assert_eq!(summary.predicted_defaults, 1);
    /// assert_eq!(summary.default_rate, 0.5);
    /// ```
    pub fn from_reports(reports: &[ScoreReport], threshold: f64) -> Self {
        let count = reports.len();
        if count == 0 {
            return Self {
                count,
                predicted_defaults: 0,
                default_rate: 0.0,
                mean_probability: 0.0,
                min_probability: 0.0,
                max_probability: 0.0,
                threshold,
            };
        }

        let predicted_defaults = reports.iter().filter(|r| r.label.is_default()).count();
        let probabilities = reports.iter().map(|r| r.probability);

        Self {
            count,
            predicted_defaults,
            default_rate: predicted_defaults as f64 / count as f64,
            mean_probability: probabilities.clone().sum::<f64>() / count as f64,
            min_probability: probabilities.clone().fold(f64::INFINITY, f64::min),
            max_probability: probabilities.fold(f64::NEG_INFINITY, f64::max),
            threshold,
        }
    }

    /// Format as an ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nBatch Summary\n");
        output.push_str(&"=".repeat(48));
        output.push('\n');
        output.push_str(&format!("{:<30} {:>16}\n", "Records", self.count));
        output.push_str(&format!(
            "{:<30} {:>16}\n",
            "Predicted Defaults", self.predicted_defaults
        ));
        output.push_str(&format!(
            "{:<30} {:>15.2}%\n",
            "Default Rate",
            self.default_rate * 100.0
        ));
        output.push_str(&"-".repeat(48));
        output.push('\n');
        output.push_str(&format!(
            "{:<30} {:>15.2}%\n",
            "Mean Probability",
            self.mean_probability * 100.0
        ));
        output.push_str(&format!(
            "{:<30} {:>15.2}%\n",
            "Min Probability",
            self.min_probability * 100.0
        ));
        output.push_str(&format!(
            "{:<30} {:>15.2}%\n",
            "Max Probability",
            self.max_probability * 100.0
        ));
        output.push_str(&format!("{:<30} {:>16.2}\n", "Threshold", self.threshold));
        output.push_str(&"=".repeat(48));
        output.push('\n');

        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("## Summary\n\n");
        output.push_str(&format!("- **Records:** {}\n", self.count));
        output.push_str(&format!(
            "- **Predicted Defaults:** {} ({:.2}%)\n",
            self.predicted_defaults,
            self.default_rate * 100.0
        ));
        output.push_str(&format!(
            "- **Probability:** mean {:.2}%, min {:.2}%, max {:.2}%\n",
            self.mean_probability * 100.0,
            self.min_probability * 100.0,
            self.max_probability * 100.0
        ));
        output.push_str(&format!("- **Threshold:** {:.2}\n", self.threshold));

        output
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Batch Summary: {} records", self.count)?;
        writeln!(
            f,
            "  Predicted Defaults: {} ({:.2}%)",
            self.predicted_defaults,
            self.default_rate * 100.0
        )?;
        writeln!(f, "  Mean Probability: {:.2}%", self.mean_probability * 100.0)?;
        writeln!(f, "  Threshold: {:.2}", self.threshold)?;
        Ok(())
    }
}

/// All reports of one batch run plus their summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReport {
    /// Aggregate statistics.
    pub summary: BatchSummary,

    /// Maximum attributions per record.
    pub top_k: usize,

    /// Per-record reports in input order.
    pub records: Vec<ScoreReport>,
}

impl BatchReport {
    /// Create a batch report and compute its summary.
    pub fn new(records: Vec<ScoreReport>, threshold: f64, top_k: usize) -> Self {
        Self {
            summary: BatchSummary::from_reports(&records, threshold),
            top_k,
            records,
        }
    }

    /// Format as an ASCII table for terminal display.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nCredit Default Scores\n");
        output.push_str(&"=".repeat(96));
        output.push('\n');
        output.push_str(&format!(
            "{:<12} {:>10} {:>10}  {}\n",
            "Record", "P(default)", "Label", "Top Features"
        ));
        output.push_str(&"-".repeat(96));
        output.push('\n');

        for record in &self.records {
            let features = record
                .attributions
                .iter()
                .map(|a| format!("{} ({:+.3})", a.feature, a.contribution))
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(
                "{:<12} {:>9.2}% {:>10}  {}\n",
                record.record_id,
                record.probability * 100.0,
                record.label.to_string(),
                features
            ));
        }

        output.push_str(&self.summary.to_ascii_table());
        output
    }

    /// Format as Markdown for documentation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Credit Default Scores\n\n");
        output.push_str("| Record | P(default) | Label | Top Features |\n");
        output.push_str("|--------|------------|-------|--------------|\n");

        for record in &self.records {
            let features = record
                .attributions
                .iter()
                .map(|a| format!("{} ({})", a.feature, a.direction))
                .collect::<Vec<_>>()
                .join(", ");
            output.push_str(&format!(
                "| {} | {:.2}% | {} | {} |\n",
                record.record_id,
                record.probability * 100.0,
                record.label,
                features
            ));
        }

        output.push('\n');
        output.push_str(&self.summary.to_markdown());
        output
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        write!(f, "{}", self.summary)
    }
}
