//! Raw account records.
//!
//! A [`RawAccountRecord`] carries exactly what a customer file holds: the credit
//! limit, demographics as integer codes, six monthly repayment-status codes and
//! (in batch mode) six months of billed and paid amounts. Records collected
//! interactively have no billing history; they are built from an
//! [`InteractiveRecord`] and carry [`BillingHistory::Placeholder`] instead.

use crate::error::{FeatureError, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

/// Number of monthly observations in a record.
pub const MONTHS: usize = 6;

/// Accepted age range in years.
pub const AGE_RANGE: RangeInclusive<u32> = 18..=100;

/// Accepted repayment-status code range.
///
/// `-2` (no consumption) and `-1` (paid duly) through `9` (nine or more months
/// delinquent).
pub const REPAYMENT_STATUS_RANGE: RangeInclusive<i32> = -2..=9;

/// Categorical raw fields that are one-hot encoded before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Categorical {
    /// Sex (1 = male, 2 = female)
    Sex,
    /// Education (1 = graduate school, 2 = university, 3 = high school, 4 = other)
    Education,
    /// Marital status (1 = married, 2 = single, 3 = other)
    Marriage,
}

impl Categorical {
    /// All categorical fields in canonical order.
    pub const ALL: [Self; 3] = [Self::Sex, Self::Education, Self::Marriage];

    /// Raw column name of this field.
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Sex => "SEX",
            Self::Education => "EDUCATION",
            Self::Marriage => "MARRIAGE",
        }
    }

    /// Reference level; it has no indicator column in the model schema.
    pub const fn reference_level(&self) -> i64 {
        1
    }

    /// Levels the model was trained on, reference level included.
    pub const fn trained_levels(&self) -> &'static [i64] {
        match self {
            Self::Sex => &[1, 2],
            Self::Education => &[1, 2, 3, 4],
            Self::Marriage => &[1, 2, 3],
        }
    }

    /// Human-readable description of a level, if it is a trained level.
    pub const fn level_name(&self, level: i64) -> Option<&'static str> {
        match (self, level) {
            (Self::Sex, 1) => Some("male"),
            (Self::Sex, 2) => Some("female"),
            (Self::Education, 1) => Some("graduate school"),
            (Self::Education, 2) => Some("university"),
            (Self::Education, 3) => Some("high school"),
            (Self::Education, 4) => Some("other"),
            (Self::Marriage, 1) => Some("married"),
            (Self::Marriage, 2) => Some("single"),
            (Self::Marriage, 3) => Some("other"),
            _ => None,
        }
    }

    /// Look up a categorical field by its raw column name.
    pub fn from_column(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.column() == name)
    }

    /// Name of the indicator column for `level`, e.g. `EDUCATION_3`.
    pub fn indicator_column(&self, level: i64) -> String {
        format!("{}_{}", self.column(), level)
    }
}

/// Monthly billing and payment history of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingHistory {
    /// Six months of billed and paid amounts, most recent first.
    Monthly {
        /// Billed amounts (`BILL_AMT1..6`)
        bills: [f64; MONTHS],
        /// Paid amounts (`PAY_AMT1..6`)
        payments: [f64; MONTHS],
    },
    /// No history was collected; the deriver substitutes its configured
    /// placeholder averages.
    Placeholder,
}

/// One customer's raw inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawAccountRecord {
    /// Caller-supplied identifier, if any
    pub record_id: Option<String>,
    /// Credit limit (`LIMIT_BAL`)
    pub limit_bal: f64,
    /// Age in years
    pub age: u32,
    /// Sex code
    pub sex: i64,
    /// Education code
    pub education: i64,
    /// Marital status code
    pub marriage: i64,
    /// Repayment status codes `PAY_0, PAY_2..PAY_6`, most recent first
    pub repayment_status: [i32; MONTHS],
    /// Billing history
    pub history: BillingHistory,
}

impl RawAccountRecord {
    /// Code of a categorical field.
    pub const fn categorical(&self, field: Categorical) -> i64 {
        match field {
            Categorical::Sex => self.sex,
            Categorical::Education => self.education,
            Categorical::Marriage => self.marriage,
        }
    }

    /// Whether the record relies on placeholder billing averages.
    pub const fn uses_placeholder(&self) -> bool {
        matches!(self.history, BillingHistory::Placeholder)
    }

    /// Check every raw field against its accepted domain.
    ///
    /// A zero credit limit or an all-zero history is valid; only values that
    /// would make a derived feature undefined are rejected.
    pub fn validate(&self) -> Result<()> {
        if !self.limit_bal.is_finite() || self.limit_bal < 0.0 {
            return Err(invalid(
                "LIMIT_BAL",
                format!("expected a non-negative amount, got {}", self.limit_bal),
            ));
        }

        if !AGE_RANGE.contains(&self.age) {
            return Err(invalid(
                "AGE",
                format!(
                    "expected {}..={}, got {}",
                    AGE_RANGE.start(),
                    AGE_RANGE.end(),
                    self.age
                ),
            ));
        }

        for (name, code) in REPAYMENT_COLUMNS.into_iter().zip(self.repayment_status) {
            if !REPAYMENT_STATUS_RANGE.contains(&code) {
                return Err(invalid(
                    name,
                    format!(
                        "expected {}..={}, got {code}",
                        REPAYMENT_STATUS_RANGE.start(),
                        REPAYMENT_STATUS_RANGE.end()
                    ),
                ));
            }
        }

        if let BillingHistory::Monthly { bills, payments } = &self.history {
            for (name, bill) in BILL_COLUMNS.into_iter().zip(bills) {
                if !bill.is_finite() {
                    return Err(invalid(name, format!("expected a finite amount, got {bill}")));
                }
            }
            for (name, payment) in PAYMENT_COLUMNS.into_iter().zip(payments) {
                if !payment.is_finite() || *payment < 0.0 {
                    return Err(invalid(
                        name,
                        format!("expected a non-negative amount, got {payment}"),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Repayment-status column names, most recent first.
pub const REPAYMENT_COLUMNS: [&str; MONTHS] = ["PAY_0", "PAY_2", "PAY_3", "PAY_4", "PAY_5", "PAY_6"];

/// Billed-amount column names, most recent first.
pub const BILL_COLUMNS: [&str; MONTHS] = [
    "BILL_AMT1",
    "BILL_AMT2",
    "BILL_AMT3",
    "BILL_AMT4",
    "BILL_AMT5",
    "BILL_AMT6",
];

/// Paid-amount column names, most recent first.
pub const PAYMENT_COLUMNS: [&str; MONTHS] = [
    "PAY_AMT1", "PAY_AMT2", "PAY_AMT3", "PAY_AMT4", "PAY_AMT5", "PAY_AMT6",
];

fn invalid(field: &'static str, reason: String) -> FeatureError {
    FeatureError::InvalidField {
        row: None,
        field,
        reason,
    }
}

/// Fields gathered by the single-record form.
///
/// The form does not ask for billed or paid amounts, so records built from it
/// score with placeholder billing averages. Their financial features describe a
/// typical account, not this customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractiveRecord {
    /// Credit limit
    pub limit_bal: f64,
    /// Age in years
    pub age: u32,
    /// Sex code
    pub sex: i64,
    /// Education code
    pub education: i64,
    /// Marital status code
    pub marriage: i64,
    /// Repayment status codes, most recent first
    pub repayment_status: [i32; MONTHS],
}

impl Default for InteractiveRecord {
    fn default() -> Self {
        Self {
            limit_bal: 10_000.0,
            age: 35,
            sex: 1,
            education: 1,
            marriage: 1,
            repayment_status: [0; MONTHS],
        }
    }
}

impl From<InteractiveRecord> for RawAccountRecord {
    fn from(record: InteractiveRecord) -> Self {
        Self {
            record_id: None,
            limit_bal: record.limit_bal,
            age: record.age,
            sex: record.sex,
            education: record.education,
            marriage: record.marriage,
            repayment_status: record.repayment_status,
            history: BillingHistory::Placeholder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn monthly_record() -> RawAccountRecord {
        RawAccountRecord {
            record_id: Some("1".to_string()),
            limit_bal: 200_000.0,
            age: 35,
            sex: 1,
            education: 2,
            marriage: 2,
            repayment_status: [0; MONTHS],
            history: BillingHistory::Monthly {
                bills: [0.0; MONTHS],
                payments: [0.0; MONTHS],
            },
        }
    }

    #[test]
    fn test_valid_record() {
        assert!(monthly_record().validate().is_ok());
    }

    #[test]
    fn test_zero_limit_is_valid() {
        let record = RawAccountRecord {
            limit_bal: 0.0,
            ..monthly_record()
        };
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_negative_bill_is_valid() {
        let record = RawAccountRecord {
            history: BillingHistory::Monthly {
                bills: [-150.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                payments: [0.0; MONTHS],
            },
            ..monthly_record()
        };
        assert!(record.validate().is_ok());
    }

    #[rstest]
    #[case::negative_limit(RawAccountRecord { limit_bal: -1.0, ..monthly_record() }, "LIMIT_BAL")]
    #[case::nan_limit(RawAccountRecord { limit_bal: f64::NAN, ..monthly_record() }, "LIMIT_BAL")]
    #[case::too_young(RawAccountRecord { age: 12, ..monthly_record() }, "AGE")]
    #[case::too_old(RawAccountRecord { age: 130, ..monthly_record() }, "AGE")]
    #[case::status(RawAccountRecord { repayment_status: [0, 0, 12, 0, 0, 0], ..monthly_record() }, "PAY_3")]
    #[case::payment(
        RawAccountRecord {
            history: BillingHistory::Monthly { bills: [0.0; MONTHS], payments: [0.0, -5.0, 0.0, 0.0, 0.0, 0.0] },
            ..monthly_record()
        },
        "PAY_AMT2"
    )]
    #[case::bill(
        RawAccountRecord {
            history: BillingHistory::Monthly { bills: [f64::INFINITY, 0.0, 0.0, 0.0, 0.0, 0.0], payments: [0.0; MONTHS] },
            ..monthly_record()
        },
        "BILL_AMT1"
    )]
    fn test_invalid_fields(#[case] record: RawAccountRecord, #[case] expected: &str) {
        match record.validate() {
            Err(FeatureError::InvalidField { field, row, .. }) => {
                assert_eq!(field, expected);
                assert_eq!(row, None);
            }
            other => panic!("expected InvalidField for {expected}, got {other:?}"),
        }
    }

    #[test]
    fn test_interactive_record_uses_placeholder() {
        let raw: RawAccountRecord = InteractiveRecord::default().into();
        assert!(raw.uses_placeholder());
        assert!(raw.record_id.is_none());
    }

    #[test]
    fn test_categorical_lookup() {
        assert_eq!(Categorical::from_column("EDUCATION"), Some(Categorical::Education));
        assert_eq!(Categorical::from_column("AGE"), None);
        assert_eq!(Categorical::Marriage.indicator_column(3), "MARRIAGE_3");
        assert_eq!(Categorical::Sex.level_name(2), Some("female"));
        assert_eq!(Categorical::Education.level_name(6), None);
    }
}
