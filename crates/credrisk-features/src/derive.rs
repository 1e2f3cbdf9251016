//! Feature Deriver
//!
//! Turns a [`RawAccountRecord`] into the engineered features the default model
//! was trained on:
//!
//! - billing: mean of strictly-positive bills, winsorized at `bill_cap`, then `ln(1 + x)`
//! - payments: plain mean of payments, winsorized at `payment_cap`, then `ln(1 + x)`
//! - `pay_ratio = pay_winz / (bill_winz + 1)`, clipped to `[0, pay_ratio_cap]`
//! - delinquency: count, maximum (floored at 0) and positive-only mean of the
//!   repayment-status codes
//! - `credit_utilization = bill_winz / (limit + 1)`, clipped to `[0, utilization_cap]`
//!
//! Every formula is total: empty positive sets average to 0 and every
//! denominator carries a `+ 1`, so degenerate records (zero limit, no activity)
//! still produce finite features.

use crate::error::{FeatureError, Result};
use crate::record::{BillingHistory, Categorical, RawAccountRecord};
use ndarray::parallel::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Configuration for the [`FeatureDeriver`].
///
/// The caps are the 99th-percentile bounds used when the model was trained and
/// must match the model artifact being served.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeriverConfig {
    /// Upper bound for the average billed amount (default: 200,000)
    pub bill_cap: f64,
    /// Upper bound for the average paid amount (default: 20,000)
    pub payment_cap: f64,
    /// Upper bound for `pay_ratio` (default: 5)
    pub pay_ratio_cap: f64,
    /// Upper bound for `credit_utilization` (default: 2)
    pub utilization_cap: f64,
    /// Average bill substituted when no billing history is available (default: 50,000)
    pub placeholder_avg_bill: f64,
    /// Average payment substituted when no billing history is available (default: 2,500)
    pub placeholder_avg_payment: f64,
}

impl Default for DeriverConfig {
    fn default() -> Self {
        Self {
            bill_cap: 200_000.0,
            payment_cap: 20_000.0,
            pay_ratio_cap: 5.0,
            utilization_cap: 2.0,
            placeholder_avg_bill: 50_000.0,
            placeholder_avg_payment: 2_500.0,
        }
    }
}

impl DeriverConfig {
    /// Check that every cap is positive and every placeholder non-negative.
    pub fn validate(&self) -> Result<()> {
        let caps = [
            ("bill_cap", self.bill_cap),
            ("payment_cap", self.payment_cap),
            ("pay_ratio_cap", self.pay_ratio_cap),
            ("utilization_cap", self.utilization_cap),
        ];
        for (name, value) in caps {
            if !value.is_finite() || value <= 0.0 {
                return Err(FeatureError::InvalidConfig(format!(
                    "{name} must be a positive finite number, got {value}"
                )));
            }
        }

        let placeholders = [
            ("placeholder_avg_bill", self.placeholder_avg_bill),
            ("placeholder_avg_payment", self.placeholder_avg_payment),
        ];
        for (name, value) in placeholders {
            if !value.is_finite() || value < 0.0 {
                return Err(FeatureError::InvalidConfig(format!(
                    "{name} must be a non-negative finite number, got {value}"
                )));
            }
        }

        Ok(())
    }
}

/// Engineered features for one record.
///
/// Categorical codes are carried through unencoded; the schema aligner turns
/// them into indicator columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    /// Caller-supplied identifier, if any
    pub record_id: Option<String>,
    /// Credit limit
    pub limit_bal: f64,
    /// Age in years
    pub age: f64,
    /// Mean of strictly-positive billed amounts
    pub avg_bill_amt: f64,
    /// `avg_bill_amt` capped at the bill cap
    pub avg_bill_amt_winz: f64,
    /// `ln(1 + avg_bill_amt_winz)`
    pub avg_bill_amt_log: f64,
    /// Mean of paid amounts
    pub avg_pay_amt: f64,
    /// `avg_pay_amt` capped at the payment cap
    pub avg_pay_amt_winz: f64,
    /// `ln(1 + avg_pay_amt_winz)`
    pub avg_pay_amt_log: f64,
    /// Winsorized payment over winsorized bill, bounded
    pub pay_ratio: f64,
    /// Months with a positive repayment-status code
    pub months_delayed: u32,
    /// Largest repayment-status code, floored at 0
    pub max_delay: i32,
    /// Mean of the positive repayment-status codes
    pub mean_delay: f64,
    /// Whether any month was delinquent
    pub any_delay: bool,
    /// Winsorized bill over credit limit, bounded
    pub credit_utilization: f64,
    /// Sex code
    pub sex: i64,
    /// Education code
    pub education: i64,
    /// Marital status code
    pub marriage: i64,
    /// Whether billing averages came from the placeholder
    pub placeholder_history: bool,
}

impl DerivedFeatures {
    /// Names of the numeric features, in model order.
    pub const NUMERIC_COLUMNS: [&'static str; 14] = [
        "LIMIT_BAL",
        "AGE",
        "avg_bill_amt",
        "avg_bill_amt_winz",
        "avg_bill_amt_log",
        "avg_pay_amt",
        "avg_pay_amt_winz",
        "avg_pay_amt_log",
        "pay_ratio",
        "months_delayed",
        "max_delay",
        "mean_delay",
        "any_delay",
        "credit_utilization",
    ];

    /// Numeric feature values, aligned with [`Self::NUMERIC_COLUMNS`].
    pub fn numeric_values(&self) -> [f64; 14] {
        [
            self.limit_bal,
            self.age,
            self.avg_bill_amt,
            self.avg_bill_amt_winz,
            self.avg_bill_amt_log,
            self.avg_pay_amt,
            self.avg_pay_amt_winz,
            self.avg_pay_amt_log,
            self.pay_ratio,
            f64::from(self.months_delayed),
            f64::from(self.max_delay),
            self.mean_delay,
            if self.any_delay { 1.0 } else { 0.0 },
            self.credit_utilization,
        ]
    }

    /// Code of a categorical field.
    pub const fn categorical(&self, field: Categorical) -> i64 {
        match field {
            Categorical::Sex => self.sex,
            Categorical::Education => self.education,
            Categorical::Marriage => self.marriage,
        }
    }
}

/// Derives [`DerivedFeatures`] from raw records.
///
/// Holds only its configuration; deriving is a pure function of the record.
#[derive(Debug, Clone, Default)]
pub struct FeatureDeriver {
    config: DeriverConfig,
}

impl FeatureDeriver {
    /// Create a deriver with the given configuration.
    pub fn new(config: DeriverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration.
    pub const fn config(&self) -> &DeriverConfig {
        &self.config
    }

    /// Validate and derive features for a single record.
    pub fn derive(&self, record: &RawAccountRecord) -> Result<DerivedFeatures> {
        record.validate()?;

        let (avg_bill_amt, avg_pay_amt) = match &record.history {
            BillingHistory::Monthly { bills, payments } => {
                (positive_mean(bills.iter().copied()), mean(payments))
            }
            BillingHistory::Placeholder => {
                warn!(
                    avg_bill = self.config.placeholder_avg_bill,
                    avg_payment = self.config.placeholder_avg_payment,
                    "No billing history collected; using placeholder averages, \
                     financial features do not describe this customer"
                );
                (
                    self.config.placeholder_avg_bill,
                    self.config.placeholder_avg_payment,
                )
            }
        };

        let avg_bill_amt_winz = avg_bill_amt.min(self.config.bill_cap);
        let avg_pay_amt_winz = avg_pay_amt.min(self.config.payment_cap);

        let pay_ratio =
            (avg_pay_amt_winz / (avg_bill_amt_winz + 1.0)).clamp(0.0, self.config.pay_ratio_cap);
        let credit_utilization = (avg_bill_amt_winz / (record.limit_bal + 1.0))
            .clamp(0.0, self.config.utilization_cap);

        let status = record.repayment_status;
        let months_delayed = status.iter().filter(|&&code| code > 0).count() as u32;
        let max_delay = status.iter().copied().max().unwrap_or(0).max(0);
        let mean_delay = positive_mean(status.iter().map(|&code| f64::from(code)));

        Ok(DerivedFeatures {
            record_id: record.record_id.clone(),
            limit_bal: record.limit_bal,
            age: f64::from(record.age),
            avg_bill_amt,
            avg_bill_amt_winz,
            avg_bill_amt_log: avg_bill_amt_winz.ln_1p(),
            avg_pay_amt,
            avg_pay_amt_winz,
            avg_pay_amt_log: avg_pay_amt_winz.ln_1p(),
            pay_ratio,
            months_delayed,
            max_delay,
            mean_delay,
            any_delay: months_delayed > 0,
            credit_utilization,
            sex: record.sex,
            education: record.education,
            marriage: record.marriage,
            placeholder_history: record.uses_placeholder(),
        })
    }

    /// Derive features for every record, in input order.
    ///
    /// Rows are independent, so `parallel` only changes throughput. A failing
    /// record rejects the batch with its 1-based row number.
    pub fn derive_batch(
        &self,
        records: &[RawAccountRecord],
        parallel: bool,
    ) -> Result<Vec<DerivedFeatures>> {
        let derive_row = |(i, record): (usize, &RawAccountRecord)| {
            self.derive(record).map_err(|e| e.at_row(i + 1))
        };

        if parallel {
            records.par_iter().enumerate().map(derive_row).collect()
        } else {
            records.iter().enumerate().map(derive_row).collect()
        }
    }
}

/// Mean of the strictly-positive values, or 0 when there are none.
fn positive_mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|&v| v > 0.0)
        .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MONTHS;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    fn record(status: [i32; MONTHS], bills: [f64; MONTHS], payments: [f64; MONTHS]) -> RawAccountRecord {
        RawAccountRecord {
            record_id: None,
            limit_bal: 200_000.0,
            age: 35,
            sex: 1,
            education: 2,
            marriage: 2,
            repayment_status: status,
            history: BillingHistory::Monthly { bills, payments },
        }
    }

    #[test]
    fn test_config_default() {
        let config = DeriverConfig::default();
        assert_eq!(config.bill_cap, 200_000.0);
        assert_eq!(config.payment_cap, 20_000.0);
        assert_eq!(config.pay_ratio_cap, 5.0);
        assert_eq!(config.utilization_cap, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_config() {
        let config = DeriverConfig {
            bill_cap: 0.0,
            ..Default::default()
        };
        assert!(FeatureDeriver::new(config).is_err());
    }

    #[test]
    fn test_all_zero_record() {
        let deriver = FeatureDeriver::default();
        let features = deriver
            .derive(&record([0; MONTHS], [0.0; MONTHS], [0.0; MONTHS]))
            .unwrap();

        assert_eq!(features.months_delayed, 0);
        assert_eq!(features.max_delay, 0);
        assert_eq!(features.mean_delay, 0.0);
        assert!(!features.any_delay);
        assert_eq!(features.avg_bill_amt, 0.0);
        assert_eq!(features.avg_bill_amt_log, 0.0);
        assert_eq!(features.credit_utilization, 0.0);
        assert_eq!(features.pay_ratio, 0.0);
    }

    #[test]
    fn test_delinquent_record() {
        let deriver = FeatureDeriver::default();
        let features = deriver
            .derive(&record([3, 2, -1, -1, -1, -1], [0.0; MONTHS], [0.0; MONTHS]))
            .unwrap();

        assert_eq!(features.months_delayed, 2);
        assert_eq!(features.max_delay, 3);
        assert_relative_eq!(features.mean_delay, 2.5);
        assert!(features.any_delay);
    }

    #[test]
    fn test_billing_features() {
        let deriver = FeatureDeriver::default();
        let features = deriver
            .derive(&record(
                [0; MONTHS],
                [1000.0, -200.0, 0.0, 3000.0, 0.0, 2000.0],
                [600.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            ))
            .unwrap();

        // Only the three positive bills count towards the average
        assert_relative_eq!(features.avg_bill_amt, 2000.0);
        assert_relative_eq!(features.avg_pay_amt, 100.0);
        assert_relative_eq!(features.avg_bill_amt_log, 2001.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(features.pay_ratio, 100.0 / 2001.0);
        assert_relative_eq!(features.credit_utilization, 2000.0 / 200_001.0);
    }

    #[rstest]
    #[case::bill_cap([900_000.0; MONTHS], [0.0; MONTHS], 200_000.0, 0.0)]
    #[case::payment_cap([0.0; MONTHS], [50_000.0; MONTHS], 0.0, 20_000.0)]
    fn test_winsorization(
        #[case] bills: [f64; MONTHS],
        #[case] payments: [f64; MONTHS],
        #[case] bill_winz: f64,
        #[case] pay_winz: f64,
    ) {
        let features = FeatureDeriver::default()
            .derive(&record([0; MONTHS], bills, payments))
            .unwrap();
        assert_eq!(features.avg_bill_amt_winz, bill_winz);
        assert_eq!(features.avg_pay_amt_winz, pay_winz);
    }

    #[test]
    fn test_pay_ratio_is_capped() {
        // No bills and large payments: 20,000 / 1 would be far above the cap
        let features = FeatureDeriver::default()
            .derive(&record([0; MONTHS], [0.0; MONTHS], [30_000.0; MONTHS]))
            .unwrap();
        assert_eq!(features.pay_ratio, 5.0);
    }

    #[test]
    fn test_zero_limit_utilization() {
        let raw = RawAccountRecord {
            limit_bal: 0.0,
            ..record([0; MONTHS], [150_000.0; MONTHS], [0.0; MONTHS])
        };
        let features = FeatureDeriver::default().derive(&raw).unwrap();
        assert!(features.credit_utilization.is_finite());
        assert_eq!(features.credit_utilization, 2.0);
    }

    #[test]
    fn test_placeholder_history() {
        let raw = RawAccountRecord {
            history: BillingHistory::Placeholder,
            ..record([0; MONTHS], [0.0; MONTHS], [0.0; MONTHS])
        };
        let features = FeatureDeriver::default().derive(&raw).unwrap();
        assert!(features.placeholder_history);
        assert_eq!(features.avg_bill_amt, 50_000.0);
        assert_eq!(features.avg_pay_amt, 2_500.0);
        assert_relative_eq!(features.pay_ratio, 2_500.0 / 50_001.0);
        assert_relative_eq!(features.credit_utilization, 50_000.0 / 200_001.0);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let deriver = FeatureDeriver::default();
        let raw = record(
            [2, 1, 0, -1, 3, 0],
            [12_345.6, 7_890.1, 0.0, 45.5, 99_999.9, 3.3],
            [100.0, 250.5, 0.0, 12.25, 9_000.0, 1.0],
        );
        let first = deriver.derive(&raw).unwrap();
        let second = deriver.derive(&raw).unwrap();

        let first_bits: Vec<u64> = first.numeric_values().iter().map(|v| v.to_bits()).collect();
        let second_bits: Vec<u64> = second.numeric_values().iter().map(|v| v.to_bits()).collect();
        assert_eq!(first_bits, second_bits);
    }

    #[test]
    fn test_random_records_respect_bounds() {
        let deriver = FeatureDeriver::default();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..2_000 {
            let status: [i32; MONTHS] = std::array::from_fn(|_| rng.gen_range(-2..=9));
            let bills: [f64; MONTHS] = std::array::from_fn(|_| rng.gen_range(-50_000.0..2_000_000.0));
            let payments: [f64; MONTHS] = std::array::from_fn(|_| rng.gen_range(0.0..2_000_000.0));
            let raw = RawAccountRecord {
                limit_bal: if rng.gen_bool(0.1) { 0.0 } else { rng.gen_range(0.0..1_000_000.0) },
                ..record(status, bills, payments)
            };

            let features = deriver.derive(&raw).unwrap();
            let positive = status.iter().filter(|&&s| s > 0).count() as u32;

            assert_eq!(features.months_delayed, positive);
            assert!(features.max_delay >= 0);
            assert!(features.avg_bill_amt_winz <= 200_000.0);
            assert!(features.avg_pay_amt_winz <= 20_000.0);
            assert!((0.0..=5.0).contains(&features.pay_ratio));
            assert!((0.0..=2.0).contains(&features.credit_utilization));
            if positive == 0 {
                assert_eq!(features.mean_delay, 0.0);
                assert!(!features.any_delay);
            }
            assert!(features.numeric_values().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_batch_reports_failing_row() {
        let deriver = FeatureDeriver::default();
        let good = record([0; MONTHS], [0.0; MONTHS], [0.0; MONTHS]);
        let bad = RawAccountRecord {
            age: 5,
            ..good.clone()
        };

        let err = deriver
            .derive_batch(&[good.clone(), good, bad], false)
            .unwrap_err();
        assert!(matches!(
            err,
            FeatureError::InvalidField {
                row: Some(3),
                field: "AGE",
                ..
            }
        ));
    }

    #[test]
    fn test_parallel_batch_matches_serial() {
        let deriver = FeatureDeriver::default();
        let mut rng = StdRng::seed_from_u64(7);
        let records: Vec<RawAccountRecord> = (0..256)
            .map(|_| {
                record(
                    std::array::from_fn(|_| rng.gen_range(-2..=8)),
                    std::array::from_fn(|_| rng.gen_range(0.0..300_000.0)),
                    std::array::from_fn(|_| rng.gen_range(0.0..30_000.0)),
                )
            })
            .collect();

        let serial = deriver.derive_batch(&records, false).unwrap();
        let parallel = deriver.derive_batch(&records, true).unwrap();
        assert_eq!(serial, parallel);
    }
}
