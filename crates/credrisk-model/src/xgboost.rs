//! XGBoost JSON model loader.
//!
//! Reads the document written by `Booster.save_model("model.json")` for a
//! `binary:logistic` gbtree booster. Only the fields needed for prediction and
//! TreeSHAP are read; everything else in the document is ignored.
//!
//! Per tree, node `i` is a leaf iff `left_children[i] == -1`, in which case
//! `split_conditions[i]` holds the leaf value. Covers come from `sum_hessian`.

use crate::error::{ModelError, Result};
use crate::model::{logit, resolve_feature_names};
use crate::tree::{Node, Tree, TreeEnsemble};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

const SUPPORTED_OBJECTIVE: &str = "binary:logistic";

#[derive(Debug, Deserialize)]
struct Document {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    model: BoosterModel,
}

#[derive(Debug, Deserialize)]
struct BoosterModel {
    trees: Vec<TreeDocument>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    #[serde(default)]
    num_feature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f64>,
    default_left: Vec<Flag>,
    sum_hessian: Vec<f64>,
}

/// Older writers emit `default_left` as 0/1, newer ones as booleans.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    const fn is_set(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(i) => i != 0,
        }
    }
}

impl TreeDocument {
    fn into_tree(self, id: usize) -> Result<Tree> {
        let n = self.left_children.len();
        let lengths = [
            self.right_children.len(),
            self.split_indices.len(),
            self.split_conditions.len(),
            self.default_left.len(),
            self.sum_hessian.len(),
        ];
        if lengths.iter().any(|&len| len != n) {
            return Err(ModelError::InvalidModel(format!(
                "tree {id} has node arrays of different lengths"
            )));
        }

        let index = |value: i64, what: &str, node: usize| {
            usize::try_from(value).map_err(|_| {
                ModelError::InvalidModel(format!("tree {id} node {node} has invalid {what} {value}"))
            })
        };

        let nodes = (0..n)
            .map(|i| {
                let cover = self.sum_hessian[i];
                if self.left_children[i] == -1 {
                    return Ok(Node::Leaf {
                        value: self.split_conditions[i],
                        cover,
                    });
                }
                Ok(Node::Split {
                    feature: index(self.split_indices[i], "split index", i)?,
                    threshold: self.split_conditions[i],
                    default_left: self.default_left[i].is_set(),
                    left: index(self.left_children[i], "left child", i)?,
                    right: index(self.right_children[i], "right child", i)?,
                    cover,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Tree::new(nodes).map_err(|e| ModelError::InvalidModel(format!("tree {id}: {e}")))
    }
}

/// `base_score` is a probability, written as `"5E-1"` or `"[5E-1]"`.
fn parse_base_score(raw: &str) -> Result<f64> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let score: f64 = trimmed
        .parse()
        .map_err(|_| ModelError::InvalidModel(format!("unparseable base_score {raw:?}")))?;
    if score > 0.0 && score < 1.0 {
        Ok(score)
    } else {
        Err(ModelError::InvalidModel(format!(
            "base_score {score} is not a probability in (0, 1)"
        )))
    }
}

/// Whether a parsed JSON document looks like an XGBoost model.
pub fn is_xgboost(document: &serde_json::Value) -> bool {
    document
        .get("learner")
        .and_then(|l| l.get("gradient_booster"))
        .is_some()
}

/// Build an ensemble from a parsed XGBoost JSON document.
pub fn from_value(document: serde_json::Value) -> Result<TreeEnsemble> {
    let Document { learner } = serde_json::from_value(document)?;

    if learner.objective.name != SUPPORTED_OBJECTIVE {
        return Err(ModelError::UnsupportedObjective(learner.objective.name));
    }
    if learner.gradient_booster.name != "gbtree" {
        return Err(ModelError::InvalidModel(format!(
            "unsupported booster {}",
            learner.gradient_booster.name
        )));
    }

    let base_margin = logit(parse_base_score(&learner.learner_model_param.base_score)?);

    let trees = learner
        .gradient_booster
        .model
        .trees
        .into_iter()
        .enumerate()
        .map(|(id, tree)| tree.into_tree(id))
        .collect::<Result<Vec<_>>>()?;

    let declared_count = learner
        .learner_model_param
        .num_feature
        .as_deref()
        .and_then(|n| n.parse::<usize>().ok());
    let split_count = trees
        .iter()
        .filter_map(Tree::max_feature)
        .max()
        .map_or(0, |f| f + 1);
    let n_features = if learner.feature_names.is_empty() {
        declared_count.unwrap_or(split_count)
    } else {
        learner.feature_names.len()
    };
    let feature_names = resolve_feature_names(learner.feature_names, n_features)?;

    let name = format!("xgboost {} ({} trees)", SUPPORTED_OBJECTIVE, trees.len());
    let model = TreeEnsemble::new(name, feature_names, base_margin, trees)?;

    info!(
        trees = model.trees().len(),
        features = n_features,
        base_margin,
        "Loaded XGBoost model"
    );
    Ok(model)
}

/// Build an ensemble from XGBoost JSON text.
pub fn from_json_str(json: &str) -> Result<TreeEnsemble> {
    from_value(serde_json::from_str(json)?)
}

/// Load an ensemble from an XGBoost JSON file.
pub fn load<P: AsRef<Path>>(path: P) -> Result<TreeEnsemble> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| ModelError::load_failure(path, e))?;
    from_json_str(&text).map_err(|e| ModelError::load_failure(path, e))
}
