//! Batch CSV ingestion.
//!
//! A batch file has one row per customer and must carry every column in
//! [`REQUIRED_COLUMNS`]. The header is checked before any row is parsed, and a
//! file missing columns is rejected as a whole. Extra columns are ignored; an
//! optional `ID` column becomes the record identifier.

use crate::error::{FeatureError, Result};
use crate::record::{BillingHistory, RawAccountRecord};
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Optional identifier column.
pub const ID_COLUMN: &str = "ID";

/// Raw columns every batch file must provide.
pub const REQUIRED_COLUMNS: [&str; 23] = [
    "LIMIT_BAL",
    "AGE",
    "SEX",
    "EDUCATION",
    "MARRIAGE",
    "PAY_0",
    "PAY_2",
    "PAY_3",
    "PAY_4",
    "PAY_5",
    "PAY_6",
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
];

/// One CSV row, deserialized by header name.
#[derive(Debug, Deserialize)]
struct BatchRow {
    #[serde(rename = "ID", default)]
    id: Option<String>,
    #[serde(rename = "LIMIT_BAL")]
    limit_bal: f64,
    #[serde(rename = "AGE")]
    age: f64,
    #[serde(rename = "SEX")]
    sex: f64,
    #[serde(rename = "EDUCATION")]
    education: f64,
    #[serde(rename = "MARRIAGE")]
    marriage: f64,
    #[serde(rename = "PAY_0")]
    pay_0: f64,
    #[serde(rename = "PAY_2")]
    pay_2: f64,
    #[serde(rename = "PAY_3")]
    pay_3: f64,
    #[serde(rename = "PAY_4")]
    pay_4: f64,
    #[serde(rename = "PAY_5")]
    pay_5: f64,
    #[serde(rename = "PAY_6")]
    pay_6: f64,
    #[serde(rename = "BILL_AMT1")]
    bill_amt1: f64,
    #[serde(rename = "BILL_AMT2")]
    bill_amt2: f64,
    #[serde(rename = "BILL_AMT3")]
    bill_amt3: f64,
    #[serde(rename = "BILL_AMT4")]
    bill_amt4: f64,
    #[serde(rename = "BILL_AMT5")]
    bill_amt5: f64,
    #[serde(rename = "BILL_AMT6")]
    bill_amt6: f64,
    #[serde(rename = "PAY_AMT1")]
    pay_amt1: f64,
    #[serde(rename = "PAY_AMT2")]
    pay_amt2: f64,
    #[serde(rename = "PAY_AMT3")]
    pay_amt3: f64,
    #[serde(rename = "PAY_AMT4")]
    pay_amt4: f64,
    #[serde(rename = "PAY_AMT5")]
    pay_amt5: f64,
    #[serde(rename = "PAY_AMT6")]
    pay_amt6: f64,
}

impl BatchRow {
    fn into_record(self, row: usize) -> Result<RawAccountRecord> {
        let repayment_status = [
            integral(self.pay_0, "PAY_0", row)?,
            integral(self.pay_2, "PAY_2", row)?,
            integral(self.pay_3, "PAY_3", row)?,
            integral(self.pay_4, "PAY_4", row)?,
            integral(self.pay_5, "PAY_5", row)?,
            integral(self.pay_6, "PAY_6", row)?,
        ];

        Ok(RawAccountRecord {
            record_id: self.id.filter(|id| !id.is_empty()),
            limit_bal: self.limit_bal,
            age: integral(self.age, "AGE", row)?,
            sex: integral(self.sex, "SEX", row)?,
            education: integral(self.education, "EDUCATION", row)?,
            marriage: integral(self.marriage, "MARRIAGE", row)?,
            repayment_status,
            history: BillingHistory::Monthly {
                bills: [
                    self.bill_amt1,
                    self.bill_amt2,
                    self.bill_amt3,
                    self.bill_amt4,
                    self.bill_amt5,
                    self.bill_amt6,
                ],
                payments: [
                    self.pay_amt1,
                    self.pay_amt2,
                    self.pay_amt3,
                    self.pay_amt4,
                    self.pay_amt5,
                    self.pay_amt6,
                ],
            },
        })
    }
}

/// Convert a numeric cell to an integer field.
///
/// Integer columns are often written as floats (`24.0`); those are accepted
/// as long as the value is whole and fits the target type.
fn integral<T: TryFrom<i64>>(value: f64, field: &'static str, row: usize) -> Result<T> {
    let invalid = || FeatureError::InvalidField {
        row: Some(row),
        field,
        reason: format!("expected an integer, got {value}"),
    };

    if !value.is_finite() || value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return Err(invalid());
    }
    T::try_from(value as i64).map_err(|_| invalid())
}

/// Required columns absent from `headers`, in canonical order.
pub fn missing_columns<'a>(headers: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let present: Vec<&str> = headers.into_iter().collect();
    REQUIRED_COLUMNS
        .iter()
        .filter(|required| !present.contains(*required))
        .map(|required| (*required).to_string())
        .collect()
}

/// Reject a header row that lacks any required column.
pub fn validate_headers<'a>(headers: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let missing = missing_columns(headers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(FeatureError::MissingColumns { missing })
    }
}

/// Read a batch of raw records from CSV data.
///
/// Values are parsed but not range-checked; the deriver validates each record.
pub fn read_batch<R: Read>(reader: R) -> Result<Vec<RawAccountRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    validate_headers(headers.iter())?;

    let mut records = Vec::new();
    for (i, row) in csv_reader.deserialize::<BatchRow>().enumerate() {
        records.push(row?.into_record(i + 1)?);
    }

    debug!(rows = records.len(), "Read batch records");
    Ok(records)
}

/// Read a batch of raw records from a CSV file.
pub fn read_batch_file<P: AsRef<Path>>(path: P) -> Result<Vec<RawAccountRecord>> {
    let file = File::open(path.as_ref())?;
    read_batch(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "ID,LIMIT_BAL,SEX,EDUCATION,MARRIAGE,AGE,PAY_0,PAY_2,PAY_3,PAY_4,PAY_5,PAY_6,\
BILL_AMT1,BILL_AMT2,BILL_AMT3,BILL_AMT4,BILL_AMT5,BILL_AMT6,\
PAY_AMT1,PAY_AMT2,PAY_AMT3,PAY_AMT4,PAY_AMT5,PAY_AMT6,default_next_month";

    #[test]
    fn test_read_batch() {
        let data = format!(
            "{HEADER}\n\
             7,20000,2,2,1,24,2,2,-1,-1,-2,-2,3913,3102,689,0,0,0,0,689,0,0,0,0,1\n\
             ,120000,2,2,2,26,-1,2,0,0,0,2,2682,1725,2682,3272,3455,3261,0,1000,1000,1000,0,2000,1\n"
        );

        let records = read_batch(data.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);

        let first = &records[0];
        assert_eq!(first.record_id.as_deref(), Some("7"));
        assert_eq!(first.limit_bal, 20_000.0);
        assert_eq!(first.age, 24);
        assert_eq!(first.repayment_status, [2, 2, -1, -1, -2, -2]);
        match &first.history {
            BillingHistory::Monthly { bills, payments } => {
                assert_eq!(bills[0], 3913.0);
                assert_eq!(payments[1], 689.0);
            }
            BillingHistory::Placeholder => panic!("batch rows carry monthly history"),
        }

        assert!(records[1].record_id.is_none());
    }

    #[test]
    fn test_missing_columns_rejects_batch() {
        let data = "LIMIT_BAL,AGE,SEX,EDUCATION,PAY_0\n20000,24,2,2,2\n";
        match read_batch(data.as_bytes()) {
            Err(FeatureError::MissingColumns { missing }) => {
                assert_eq!(missing.len(), 18);
                assert_eq!(missing[0], "MARRIAGE");
                assert!(missing.contains(&"PAY_AMT6".to_string()));
            }
            other => panic!("expected MissingColumns, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_columns_without_rows() {
        assert!(missing_columns(REQUIRED_COLUMNS).is_empty());
        assert_eq!(missing_columns(["ID"]).len(), REQUIRED_COLUMNS.len());
    }

    #[test]
    fn test_negative_age_reports_row() {
        let data = format!(
            "{HEADER}\n\
             1,20000,2,2,1,-4,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0\n"
        );
        let err = read_batch(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::InvalidField {
                row: Some(1),
                field: "AGE",
                ..
            }
        ));
    }

    #[test]
    fn test_integer_columns_written_as_floats() {
        let data = format!(
            "{HEADER}\n\
             1,20000.0,2.0,2.0,1.0,24.0,2.0,2.0,-1.0,-1.0,-2.0,-2.0,3913.0,3102.0,689.0,0.0,0.0,0.0,0.0,689.0,0.0,0.0,0.0,0.0,1.0\n"
        );
        let records = read_batch(data.as_bytes()).unwrap();

        let record = &records[0];
        assert_eq!(record.age, 24);
        assert_eq!(record.sex, 2);
        assert_eq!(record.education, 2);
        assert_eq!(record.marriage, 1);
        assert_eq!(record.repayment_status, [2, 2, -1, -1, -2, -2]);
    }

    #[test]
    fn test_fractional_integer_column_reports_row() {
        let data = format!(
            "{HEADER}\n\
             1,20000,2,2,1,24,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0\n\
             2,20000,2,2.5,1,24,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0\n"
        );
        let err = read_batch(data.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::InvalidField {
                row: Some(2),
                field: "EDUCATION",
                ..
            }
        ));
    }

    #[test]
    fn test_unparseable_value() {
        let data = format!(
            "{HEADER}\n\
             1,lots,2,2,1,30,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0,0\n"
        );
        assert!(matches!(
            read_batch(data.as_bytes()),
            Err(FeatureError::Csv(_))
        ));
    }
}
