//! Model artifact loading.
//!
//! The artifact format is detected from the JSON document itself: XGBoost
//! models carry `learner.gradient_booster`, logistic artifacts carry
//! `"kind": "logistic"`.

use crate::error::Result;
use credrisk_model::{CreditModel, ModelError, logistic, xgboost};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Load a model artifact once, for sharing across scoring threads.
///
/// Every failure, from a missing file to an unsupported objective, is
/// reported as [`ModelError::LoadFailure`] naming the path.
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Arc<dyn CreditModel>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::load_failure(path, e))?;
    let document: serde_json::Value =
        serde_json::from_str(&text).map_err(|e| ModelError::load_failure(path, e))?;

    let model: Arc<dyn CreditModel> = if xgboost::is_xgboost(&document) {
        Arc::new(xgboost::from_value(document).map_err(|e| ModelError::load_failure(path, e))?)
    } else if logistic::is_logistic(&document) {
        Arc::new(logistic::from_value(document).map_err(|e| ModelError::load_failure(path, e))?)
    } else {
        return Err(ModelError::load_failure(path, "unrecognised model format").into());
    };

    info!(
        path = %path.display(),
        model = model.name(),
        features = model.n_features(),
        "Model ready"
    );
    Ok(model)
}
