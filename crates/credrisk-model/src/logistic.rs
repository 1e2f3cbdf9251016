//! Logistic-regression model artifact.
//!
//! ```json
//! {
//!   "kind": "logistic",
//!   "feature_names": ["LIMIT_BAL", "AGE", ...],
//!   "intercept": -1.2,
//!   "coefficients": [-0.000002, 0.004, ...],
//!   "feature_means": [167484.3, 35.5, ...]
//! }
//! ```
//!
//! Contributions are exact linear SHAP values against the feature means:
//! φ_i = w_i * (x_i - μ_i), with base value b + w·μ.

use crate::error::{ModelError, Result};
use crate::model::{Contributions, CreditModel, resolve_feature_names};
use ndarray::{Array1, ArrayView1, Zip};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

/// Value of the `kind` field identifying a logistic artifact
pub const LOGISTIC_KIND: &str = "logistic";

#[derive(Debug, Deserialize)]
struct LogisticArtifact {
    kind: String,
    #[serde(default)]
    feature_names: Vec<String>,
    intercept: f64,
    coefficients: Vec<f64>,
    #[serde(default)]
    feature_means: Option<Vec<f64>>,
}

/// Linear model on the log-odds scale
#[derive(Debug, Clone)]
pub struct LogisticModel {
    name: String,
    feature_names: Vec<String>,
    intercept: f64,
    coefficients: Array1<f64>,
    feature_means: Array1<f64>,
}

impl LogisticModel {
    /// Create a logistic model.
    ///
    /// # Arguments
    /// * `feature_names` - Feature names in model order
    /// * `intercept` - Log-odds intercept
    /// * `coefficients` - One weight per feature
    /// * `feature_means` - Background means for attribution
    pub fn new(
        feature_names: Vec<String>,
        intercept: f64,
        coefficients: Array1<f64>,
        feature_means: Array1<f64>,
    ) -> Result<Self> {
        let n = feature_names.len();
        for (what, len) in [
            ("coefficients", coefficients.len()),
            ("feature means", feature_means.len()),
        ] {
            if len != n {
                return Err(ModelError::InvalidModel(format!(
                    "{len} {what} for {n} features"
                )));
            }
        }
        let all_finite = std::iter::once(&intercept)
            .chain(coefficients.iter())
            .chain(feature_means.iter())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(ModelError::InvalidModel(
                "logistic parameters must be finite".to_string(),
            ));
        }

        Ok(Self {
            name: format!("logistic regression ({n} features)"),
            feature_names,
            intercept,
            coefficients,
            feature_means,
        })
    }

    /// Log-odds intercept
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Feature weights
    pub const fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    /// Background means used for attribution
    pub const fn feature_means(&self) -> &Array1<f64> {
        &self.feature_means
    }
}

impl CreditModel for LogisticModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn margin(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.intercept + self.coefficients.dot(&row)
    }

    fn contributions(&self, row: ArrayView1<'_, f64>) -> Contributions {
        let values = Zip::from(&self.coefficients)
            .and(&row)
            .and(&self.feature_means)
            .map_collect(|&w, &x, &mu| w * (x - mu));
        let base_value = self.intercept + self.coefficients.dot(&self.feature_means);
        Contributions::new(base_value, values)
    }
}

/// Whether a parsed JSON document is a logistic artifact.
pub fn is_logistic(document: &serde_json::Value) -> bool {
    document.get("kind").and_then(serde_json::Value::as_str) == Some(LOGISTIC_KIND)
}

/// Build a model from a parsed logistic artifact.
pub fn from_value(document: serde_json::Value) -> Result<LogisticModel> {
    let artifact: LogisticArtifact = serde_json::from_value(document)?;
    if artifact.kind != LOGISTIC_KIND {
        return Err(ModelError::InvalidModel(format!(
            "expected kind {LOGISTIC_KIND:?}, got {:?}",
            artifact.kind
        )));
    }

    let n = artifact.coefficients.len();
    let feature_names = resolve_feature_names(artifact.feature_names, n)?;
    let feature_means = artifact.feature_means.unwrap_or_else(|| {
        debug!("Logistic artifact has no feature means; attributing against zero");
        vec![0.0; n]
    });

    let model = LogisticModel::new(
        feature_names,
        artifact.intercept,
        Array1::from(artifact.coefficients),
        Array1::from(feature_means),
    )?;
    info!(features = n, intercept = model.intercept, "Loaded logistic model");
    Ok(model)
}

/// Load a logistic model from a JSON file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<LogisticModel> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::load_failure(path, e))?;
    serde_json::from_str(&text)
        .map_err(ModelError::from)
        .and_then(from_value)
        .map_err(|e| ModelError::load_failure(path, e))
}
