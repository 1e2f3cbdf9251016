//! Export functionality for credrisk score reports.
//!
//! CSV export writes one flat row per record with the top attributions spread
//! over numbered columns (`top1_feature`, `top1_contribution`,
//! `top1_direction`, ...). JSON export writes the reports as they are.

use crate::report::ScoreReport;
use crate::summary::BatchReport;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid format error.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pretty-json" | "pretty_json" => Ok(Self::PrettyJson),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

/// Header of the flat CSV layout for `top_k` attributions.
fn csv_header(top_k: usize) -> Vec<String> {
    let mut header = vec![
        "record_id".to_string(),
        "probability".to_string(),
        "label".to_string(),
    ];
    for i in 1..=top_k {
        header.push(format!("top{i}_feature"));
        header.push(format!("top{i}_contribution"));
        header.push(format!("top{i}_direction"));
    }
    header
}

/// One flat CSV row; missing attributions leave their cells empty.
fn csv_row(report: &ScoreReport, top_k: usize) -> Vec<String> {
    let mut row = vec![
        report.record_id.clone(),
        report.probability.to_string(),
        u8::from(report.label).to_string(),
    ];
    for i in 0..top_k {
        match report.attributions.get(i) {
            Some(a) => {
                row.push(a.feature.clone());
                row.push(a.contribution.to_string());
                row.push(a.direction.to_string());
            }
            None => row.extend(std::iter::repeat_n(String::new(), 3)),
        }
    }
    row
}

fn reports_to_csv(reports: &[ScoreReport], top_k: usize) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(csv_header(top_k))?;
    for report in reports {
        wtr.write_record(csv_row(report, top_k))?;
    }
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| ExportError::InvalidFormat(e.to_string()))
}

impl Exporter for ScoreReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => reports_to_csv(std::slice::from_ref(self), self.attributions.len()),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for Vec<ScoreReport> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let top_k = self.iter().map(|r| r.attributions.len()).max().unwrap_or(0);
                reports_to_csv(self, top_k)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Exporter for BatchReport {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => reports_to_csv(&self.records, self.top_k),
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::FeatureAttribution;
    use credrisk_model::DefaultLabel;
    use rstest::rstest;

    fn batch() -> BatchReport {
        BatchReport::new(
            vec![
                ScoreReport::new(
                    "C-1".to_string(),
                    0.8,
                    DefaultLabel::Default,
                    vec![
                        FeatureAttribution::new("max_delay".to_string(), 3.0, 1.25),
                        FeatureAttribution::new("pay_ratio".to_string(), 0.0, -0.5),
                    ],
                ),
                ScoreReport::new(
                    "C-2".to_string(),
                    0.1,
                    DefaultLabel::Compliant,
                    vec![FeatureAttribution::new("AGE".to_string(), 50.0, -0.25)],
                ),
            ],
            0.30,
            2,
        )
    }

    #[test]
    fn test_batch_csv_layout() {
        let csv = batch().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "record_id,probability,label,top1_feature,top1_contribution,top1_direction,\
             top2_feature,top2_contribution,top2_direction"
        );
        assert_eq!(
            lines[1],
            "C-1,0.8,1,max_delay,1.25,increases risk,pay_ratio,-0.5,decreases risk"
        );
        assert_eq!(lines[2], "C-2,0.1,0,AGE,-0.25,decreases risk,,,");
    }

    #[test]
    fn test_batch_json() {
        let json = batch().export_to_string(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["count"], 2);
        assert_eq!(value["records"][0]["record_id"], "C-1");
        assert_eq!(value["records"][1]["label"], 0);

        let parsed: BatchReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, batch());
    }

    #[test]
    fn test_pretty_json() {
        let json = batch().export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(json.contains("  ")); // Indentation indicates pretty format
        assert!(json.contains("\"predicted_defaults\": 1"));
    }

    #[test]
    fn test_export_to_file() {
        let path = std::env::temp_dir().join(format!("credrisk-export-{}.csv", std::process::id()));
        batch().export_to_file(&path, ExportFormat::Csv).unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("record_id,"));
        std::fs::remove_file(&path).unwrap();
    }

    #[rstest]
    #[case("csv", ExportFormat::Csv)]
    #[case("JSON", ExportFormat::Json)]
    #[case("pretty-json", ExportFormat::PrettyJson)]
    fn test_parse_format(#[case] input: &str, #[case] expected: ExportFormat) {
        assert_eq!(input.parse::<ExportFormat>().unwrap(), expected);
    }

    #[test]
    fn test_format_extension() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
        assert_eq!(
            ExportFormat::from_path(Path::new("scores.json")),
            Some(ExportFormat::Json)
        );
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
