//! Feature Registry
//!
//! Catalogue of every feature the deriver produces, with the raw columns it is
//! computed from. Used for documentation output and to explain attributions.

use crate::record::{BILL_COLUMNS, PAYMENT_COLUMNS, REPAYMENT_COLUMNS};

/// Feature categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureCategory {
    /// Account terms (credit limit)
    Account,
    /// Customer demographics (age, categorical indicators)
    Demographic,
    /// Billed amounts
    Billing,
    /// Paid amounts
    Payment,
    /// Repayment-status history
    Delinquency,
    /// Bounded ratios between amounts
    Ratio,
}

impl FeatureCategory {
    /// Display name of the category.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Account => "Account",
            Self::Demographic => "Demographic",
            Self::Billing => "Billing",
            Self::Payment => "Payment",
            Self::Delinquency => "Delinquency",
            Self::Ratio => "Ratio",
        }
    }
}

/// Feature metadata
#[derive(Debug, Clone)]
pub struct FeatureInfo {
    /// Feature name (model column)
    pub name: &'static str,
    /// Feature category
    pub category: FeatureCategory,
    /// Brief description of what the feature measures
    pub description: &'static str,
    /// Raw columns the feature is computed from
    pub source_columns: &'static [&'static str],
}

/// Get all feature info, in default schema order
pub fn available_features() -> Vec<FeatureInfo> {
    vec![
        FeatureInfo {
            name: "LIMIT_BAL",
            category: FeatureCategory::Account,
            description: "Credit limit",
            source_columns: &["LIMIT_BAL"],
        },
        FeatureInfo {
            name: "AGE",
            category: FeatureCategory::Demographic,
            description: "Age in years",
            source_columns: &["AGE"],
        },
        // Billing
        FeatureInfo {
            name: "avg_bill_amt",
            category: FeatureCategory::Billing,
            description: "Mean of the strictly-positive monthly bills (0 if none)",
            source_columns: &BILL_COLUMNS,
        },
        FeatureInfo {
            name: "avg_bill_amt_winz",
            category: FeatureCategory::Billing,
            description: "Average bill capped at 200,000",
            source_columns: &BILL_COLUMNS,
        },
        FeatureInfo {
            name: "avg_bill_amt_log",
            category: FeatureCategory::Billing,
            description: "ln(1 + capped average bill)",
            source_columns: &BILL_COLUMNS,
        },
        // Payments
        FeatureInfo {
            name: "avg_pay_amt",
            category: FeatureCategory::Payment,
            description: "Mean of the monthly payments",
            source_columns: &PAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "avg_pay_amt_winz",
            category: FeatureCategory::Payment,
            description: "Average payment capped at 20,000",
            source_columns: &PAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "avg_pay_amt_log",
            category: FeatureCategory::Payment,
            description: "ln(1 + capped average payment)",
            source_columns: &PAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "pay_ratio",
            category: FeatureCategory::Ratio,
            description: "Capped payment over capped bill + 1, clipped to [0, 5]",
            source_columns: &[
                "BILL_AMT1",
                "BILL_AMT2",
                "BILL_AMT3",
                "BILL_AMT4",
                "BILL_AMT5",
                "BILL_AMT6",
                "PAY_AMT1",
                "PAY_AMT2",
                "PAY_AMT3",
                "PAY_AMT4",
                "PAY_AMT5",
                "PAY_AMT6",
            ],
        },
        // Delinquency
        FeatureInfo {
            name: "months_delayed",
            category: FeatureCategory::Delinquency,
            description: "Months with a positive repayment-status code",
            source_columns: &REPAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "max_delay",
            category: FeatureCategory::Delinquency,
            description: "Worst repayment-status code, floored at 0",
            source_columns: &REPAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "mean_delay",
            category: FeatureCategory::Delinquency,
            description: "Mean of the positive repayment-status codes (0 if none)",
            source_columns: &REPAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "any_delay",
            category: FeatureCategory::Delinquency,
            description: "1 if any month was delinquent",
            source_columns: &REPAYMENT_COLUMNS,
        },
        FeatureInfo {
            name: "credit_utilization",
            category: FeatureCategory::Ratio,
            description: "Capped average bill over credit limit + 1, clipped to [0, 2]",
            source_columns: &[
                "LIMIT_BAL",
                "BILL_AMT1",
                "BILL_AMT2",
                "BILL_AMT3",
                "BILL_AMT4",
                "BILL_AMT5",
                "BILL_AMT6",
            ],
        },
        // Indicators
        FeatureInfo {
            name: "SEX_2",
            category: FeatureCategory::Demographic,
            description: "Female",
            source_columns: &["SEX"],
        },
        FeatureInfo {
            name: "EDUCATION_2",
            category: FeatureCategory::Demographic,
            description: "Education: university",
            source_columns: &["EDUCATION"],
        },
        FeatureInfo {
            name: "EDUCATION_3",
            category: FeatureCategory::Demographic,
            description: "Education: high school",
            source_columns: &["EDUCATION"],
        },
        FeatureInfo {
            name: "EDUCATION_4",
            category: FeatureCategory::Demographic,
            description: "Education: other",
            source_columns: &["EDUCATION"],
        },
        FeatureInfo {
            name: "MARRIAGE_2",
            category: FeatureCategory::Demographic,
            description: "Marital status: single",
            source_columns: &["MARRIAGE"],
        },
        FeatureInfo {
            name: "MARRIAGE_3",
            category: FeatureCategory::Demographic,
            description: "Marital status: other",
            source_columns: &["MARRIAGE"],
        },
    ]
}

/// Get features by category
pub fn features_by_category(category: FeatureCategory) -> Vec<FeatureInfo> {
    available_features()
        .into_iter()
        .filter(|f| f.category == category)
        .collect()
}

/// Get feature info by name
pub fn get_feature_info(name: &str) -> Option<FeatureInfo> {
    available_features().into_iter().find(|f| f.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::REQUIRED_COLUMNS;
    use crate::schema::FeatureSchema;

    #[test]
    fn test_registry_matches_default_schema() {
        let names: Vec<&str> = available_features().iter().map(|f| f.name).collect();
        assert_eq!(names, FeatureSchema::credit_default().names());
    }

    #[test]
    fn test_sources_are_raw_columns() {
        for info in available_features() {
            for source in info.source_columns {
                assert!(
                    REQUIRED_COLUMNS.contains(source),
                    "{} reads unknown column {}",
                    info.name,
                    source
                );
            }
        }
    }

    #[test]
    fn test_lookup() {
        let info = get_feature_info("pay_ratio").unwrap();
        assert_eq!(info.category, FeatureCategory::Ratio);
        assert!(get_feature_info("bill_volatility").is_none());
        assert_eq!(features_by_category(FeatureCategory::Delinquency).len(), 4);
    }
}
