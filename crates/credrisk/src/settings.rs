//! Layered application configuration.
//!
//! Values come from the built-in defaults, then an optional TOML file, then
//! `CREDRISK_*` environment variables. Nested keys are separated by `__`, so
//! `CREDRISK_SCORING__THRESHOLD=0.4` sets `scoring.threshold`.

use crate::error::{CredRiskError, Result};
use config::{Config, Environment, File, FileFormat};
use credrisk_features::DeriverConfig;
use credrisk_model::{Attributor, DecisionThreshold};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of the environment variables read by [`AppConfig::load`].
pub const ENV_PREFIX: &str = "CREDRISK";

/// Scoring and attribution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Probability above which a record is labelled a default (default: 0.30)
    pub threshold: f64,
    /// Features reported per record (default: 2)
    pub top_k: usize,
    /// Rows scored per batch chunk (default: 1000)
    pub chunk_size: usize,
    /// Score batch rows on the rayon pool (default: true)
    pub parallel: bool,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: DecisionThreshold::DEFAULT,
            top_k: Attributor::DEFAULT_TOP_K,
            chunk_size: 1000,
            parallel: true,
        }
    }
}

impl ScoringConfig {
    /// Check the threshold, top-K and chunk size.
    pub fn validate(&self) -> Result<()> {
        self.decision_threshold()?;
        Attributor::new(self.top_k)?;
        if self.chunk_size == 0 {
            return Err(CredRiskError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The threshold as a validated [`DecisionThreshold`].
    pub fn decision_threshold(&self) -> Result<DecisionThreshold> {
        Ok(DecisionThreshold::new(self.threshold)?)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the credrisk crates (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    /// Check that the level is one `tracing` understands.
    pub fn validate(&self) -> Result<()> {
        if Self::LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(CredRiskError::InvalidConfig(format!(
                "unknown log level {:?}",
                self.level
            )))
        }
    }

    /// Default `tracing` directive for the credrisk crates.
    pub fn directive(&self) -> String {
        format!("credrisk={}", self.level.to_ascii_lowercase())
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Model artifact to load, unless given on the command line
    pub model_path: Option<PathBuf>,
    /// Feature derivation caps and placeholders
    pub features: DeriverConfig,
    /// Scoring settings
    pub scoring: ScoringConfig,
    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// A given `path` must exist. Without one, only defaults and environment
    /// overrides apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, Self::environment())
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with(path: Option<&Path>, environment: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let config: Self = builder
            .add_source(environment)
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        self.features.validate()?;
        self.scoring.validate()?;
        self.logging.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn env(vars: &[(&str, &str)]) -> Environment {
        AppConfig::environment().source(Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    fn write_toml(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "credrisk-config-{}-{name}.toml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::load_with(None, env(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.scoring.threshold, 0.30);
        assert_eq!(config.scoring.top_k, 2);
        assert_eq!(config.features.bill_cap, 200_000.0);
        assert_eq!(config.logging.directive(), "credrisk=info");
    }

    #[test]
    fn test_toml_file() {
        let path = write_toml(
            "file",
            r#"
model_path = "models/xgb.json"

[scoring]
threshold = 0.45
top_k = 3

[features]
payment_cap = 15000.0

[logging]
format = "json"
"#,
        );

        let config = AppConfig::load_with(Some(&path), env(&[])).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.model_path, Some(PathBuf::from("models/xgb.json")));
        assert_eq!(config.scoring.threshold, 0.45);
        assert_eq!(config.scoring.top_k, 3);
        assert_eq!(config.scoring.chunk_size, 1000);
        assert_eq!(config.features.payment_cap, 15_000.0);
        assert_eq!(config.features.bill_cap, 200_000.0);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_environment_overrides_file() {
        let path = write_toml("env", "[scoring]\nthreshold = 0.45\n");
        let config = AppConfig::load_with(
            Some(&path),
            env(&[
                ("CREDRISK_SCORING__THRESHOLD", "0.4"),
                ("CREDRISK_SCORING__PARALLEL", "false"),
                ("OTHER_SCORING__TOP_K", "9"),
            ]),
        )
        .unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.scoring.threshold, 0.4);
        assert!(!config.scoring.parallel);
        assert_eq!(config.scoring.top_k, 2);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let path = std::env::temp_dir().join("credrisk-config-does-not-exist.toml");
        let result = AppConfig::load_with(Some(&path), env(&[]));
        assert!(matches!(result, Err(CredRiskError::Config(_))));
    }

    #[rstest]
    #[case("threshold", "[scoring]\nthreshold = 1.5\n")]
    #[case("top-k", "[scoring]\ntop_k = 0\n")]
    #[case("chunk", "[scoring]\nchunk_size = 0\n")]
    #[case("cap", "[features]\nbill_cap = -1.0\n")]
    #[case("level", "[logging]\nlevel = \"loud\"\n")]
    fn test_invalid_values_rejected(#[case] name: &str, #[case] contents: &str) {
        let path = write_toml(name, contents);
        let result = AppConfig::load_with(Some(&path), env(&[]));
        std::fs::remove_file(&path).unwrap();
        assert!(result.is_err());
    }
}
