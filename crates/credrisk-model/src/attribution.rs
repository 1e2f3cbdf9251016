//! Attributor
//!
//! Ranks the per-feature contributions a model reports for one prediction and
//! keeps the K most influential. Contributions are in log-odds space:
//!
//! margin = base_value + Σ contribution_i
//!
//! A positive contribution pushes the record towards default.

use crate::error::{ModelError, Result};
use crate::model::CreditModel;
use crate::scorer::Scorer;
use credrisk_features::FeatureTable;
use derive_more::Display;
use ndarray::ArrayView1;
use ndarray::parallel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way a contribution moves the default risk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskDirection {
    /// Positive contribution
    #[display("increases risk")]
    Increases,
    /// Zero or negative contribution
    #[display("decreases risk")]
    Decreases,
}

impl RiskDirection {
    /// Direction of a signed contribution.
    ///
    /// ```
    /// use credrisk_model::RiskDirection;
    ///
    /// assert_eq!(RiskDirection::of(0.4), RiskDirection::Increases);
    /// assert_eq!(RiskDirection::of(-0.1).to_string(), "decreases risk");
    /// ```
    pub fn of(contribution: f64) -> Self {
        if contribution > 0.0 {
            Self::Increases
        } else {
            Self::Decreases
        }
    }
}

/// One feature's contribution to one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    /// Feature name
    pub feature: String,
    /// Position in the model schema
    pub index: usize,
    /// Feature value in the scored row
    pub value: f64,
    /// Signed log-odds contribution
    pub contribution: f64,
    /// Risk direction of the contribution
    pub direction: RiskDirection,
}

impl FeatureContribution {
    /// Create a contribution; the direction follows the sign.
    pub fn new(feature: impl Into<String>, index: usize, value: f64, contribution: f64) -> Self {
        Self {
            feature: feature.into(),
            index,
            value,
            contribution,
            direction: RiskDirection::of(contribution),
        }
    }
}

impl fmt::Display for FeatureContribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {:.4}: {:+.4} ({})",
            self.feature, self.value, self.contribution, self.direction
        )
    }
}

/// Ranked explanation of one prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    /// Expected margin the contributions start from
    pub base_value: f64,
    /// Model margin for the row
    pub margin: f64,
    /// Top contributions by absolute size, largest first
    pub top: Vec<FeatureContribution>,
}

/// Selects the most influential features of a prediction
#[derive(Debug, Clone, Copy)]
pub struct Attributor {
    top_k: usize,
}

impl Default for Attributor {
    fn default() -> Self {
        Self {
            top_k: Self::DEFAULT_TOP_K,
        }
    }
}

impl Attributor {
    /// Number of features reported when not configured
    pub const DEFAULT_TOP_K: usize = 2;

    /// Create an attributor reporting at most `top_k` features.
    pub fn new(top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(ModelError::InvalidTopK(top_k));
        }
        Ok(Self { top_k })
    }

    /// Maximum number of features reported
    pub const fn top_k(&self) -> usize {
        self.top_k
    }

    /// Rank signed contributions for one row.
    ///
    /// Sorted by descending absolute contribution with ties in schema order.
    /// Exactly-zero contributions are not reported.
    pub fn rank(
        &self,
        columns: &[String],
        row: ArrayView1<'_, f64>,
        contributions: ArrayView1<'_, f64>,
    ) -> Vec<FeatureContribution> {
        let mut ranked: Vec<FeatureContribution> = columns
            .iter()
            .zip(row.iter().zip(contributions.iter()))
            .enumerate()
            .filter(|(_, (_, (_, c)))| **c != 0.0)
            .map(|(i, (name, (&value, &c)))| FeatureContribution::new(name.as_str(), i, value, c))
            .collect();

        // Stable sort keeps schema order among equal magnitudes
        ranked.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
        ranked.truncate(self.top_k);
        ranked
    }

    /// Explain one aligned row.
    pub fn explain_row(&self, model: &dyn CreditModel, row: ArrayView1<'_, f64>) -> Explanation {
        let contributions = model.contributions(row);
        Explanation {
            base_value: contributions.base_value,
            margin: contributions.margin(),
            top: self.rank(model.feature_names(), row, contributions.values.view()),
        }
    }

    /// Explain every row of an aligned table, in row order.
    pub fn explain(
        &self,
        model: &dyn CreditModel,
        table: &FeatureTable,
        parallel: bool,
    ) -> Result<Vec<Explanation>> {
        Scorer::check_schema(model, table.columns())?;

        let explanations: Vec<Explanation> = if parallel {
            (0..table.nrows())
                .into_par_iter()
                .map(|i| self.explain_row(model, table.row(i)))
                .collect()
        } else {
            table
                .values()
                .outer_iter()
                .map(|row| self.explain_row(model, row))
                .collect()
        };
        Ok(explanations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logistic::LogisticModel;
    use approx::assert_relative_eq;
    use ndarray::{Array1, array};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn columns(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    #[test]
    fn test_rank_orders_by_magnitude() {
        let ranked = Attributor::new(3).unwrap().rank(
            &columns(4),
            array![1.0, 2.0, 3.0, 4.0].view(),
            array![0.1, -0.9, 0.5, 0.2].view(),
        );

        let names: Vec<&str> = ranked.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(names, ["f1", "f2", "f3"]);
        assert_eq!(ranked[0].direction, RiskDirection::Decreases);
        assert_eq!(ranked[0].value, 2.0);
        assert_eq!(ranked[1].direction, RiskDirection::Increases);
    }

    #[test]
    fn test_ties_keep_schema_order() {
        let ranked = Attributor::new(2).unwrap().rank(
            &columns(3),
            array![0.0, 0.0, 0.0].view(),
            array![0.3, -0.5, -0.3].view(),
        );
        assert_eq!(ranked[0].feature, "f1");
        assert_eq!(ranked[1].feature, "f0");
    }

    #[test]
    fn test_zero_contributions_excluded() {
        let ranked = Attributor::default().rank(
            &columns(3),
            array![1.0, 1.0, 1.0].view(),
            array![0.0, 0.25, 0.0].view(),
        );
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].feature, "f1");
    }

    #[test]
    fn test_zero_top_k_rejected() {
        assert!(matches!(Attributor::new(0), Err(ModelError::InvalidTopK(0))));
    }

    #[test]
    fn test_random_rankings_sorted_and_bounded() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..200 {
            let n = rng.gen_range(1..12);
            let k = rng.gen_range(1..6);
            let values: Array1<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let contributions: Array1<f64> = (0..n)
                .map(|_| if rng.gen_bool(0.2) { 0.0 } else { rng.gen_range(-2.0..2.0) })
                .collect();

            let ranked = Attributor::new(k)
                .unwrap()
                .rank(&columns(n), values.view(), contributions.view());

            assert!(ranked.len() <= k);
            assert!(ranked.iter().all(|c| c.contribution != 0.0));
            for pair in ranked.windows(2) {
                assert!(pair[0].contribution.abs() >= pair[1].contribution.abs());
            }
        }
    }

    #[test]
    fn test_explanation_is_additive() {
        let model = LogisticModel::new(
            columns(3),
            -0.5,
            array![0.2, -1.0, 0.7],
            array![1.0, 1.0, 1.0],
        )
        .unwrap();
        let table = FeatureTable::new(columns(3), array![[2.0, 0.5, 3.0], [1.0, 1.0, 1.0]]).unwrap();

        let explanations = Attributor::new(3).unwrap().explain(&model, &table, true).unwrap();
        assert_eq!(explanations.len(), 2);

        let first = &explanations[0];
        assert_relative_eq!(first.margin, model.margin(table.row(0)), epsilon = 1e-12);
        assert_eq!(first.top[0].feature, "f2");
        // The row at the means has nothing to explain
        assert!(explanations[1].top.is_empty());
    }
}
