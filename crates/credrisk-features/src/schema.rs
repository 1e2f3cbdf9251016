//! Model feature schema and aligned feature tables.
//!
//! A [`FeatureSchema`] is the ordered column list a model consumes. Each column
//! is either a numeric derived feature or an indicator for one level of a
//! categorical field. A [`FeatureTable`] is a matrix of feature rows whose
//! columns carry their names, so consumers can verify the layout before using
//! it positionally.

use crate::derive::DerivedFeatures;
use crate::error::{FeatureError, Result};
use crate::record::Categorical;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Kind of a schema column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// A numeric derived feature
    Numeric,
    /// 1.0 when `source` equals `level`, else 0.0
    Indicator {
        /// Categorical field the indicator encodes
        source: Categorical,
        /// Encoded level
        level: i64,
    },
}

/// One column of a feature schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name as the model knows it
    pub name: String,
    /// Column kind
    pub kind: ColumnKind,
}

impl ColumnSpec {
    /// Numeric column.
    pub fn numeric(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Numeric,
        }
    }

    /// Indicator column for one level of a categorical field.
    pub fn indicator(source: Categorical, level: i64) -> Self {
        Self {
            name: source.indicator_column(level),
            kind: ColumnKind::Indicator { source, level },
        }
    }

    /// Default value for rows where the column is absent after encoding.
    pub const fn fill_value(&self) -> f64 {
        0.0
    }
}

/// Ordered list of columns a model expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<ColumnSpec>,
}

impl FeatureSchema {
    /// Build a schema from column specs.
    pub fn new(columns: Vec<ColumnSpec>) -> Result<Self> {
        for (i, column) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == column.name) {
                return Err(FeatureError::InvalidConfig(format!(
                    "duplicate schema column {}",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// The schema of the credit-default model: every numeric derived feature
    /// followed by indicators for the non-reference trained levels.
    pub fn credit_default() -> Self {
        let numeric = DerivedFeatures::NUMERIC_COLUMNS
            .iter()
            .map(|name| ColumnSpec::numeric(*name));
        let indicators = Categorical::ALL.into_iter().flat_map(|field| {
            field
                .trained_levels()
                .iter()
                .filter(move |&&level| level != field.reference_level())
                .map(move |&level| ColumnSpec::indicator(field, level))
        });

        Self {
            columns: numeric.chain(indicators).collect(),
        }
    }

    /// Build a schema from the feature names a model declares.
    ///
    /// Names of the form `<CATEGORICAL>_<level>` (e.g. `EDUCATION_3`) become
    /// indicators; everything else is numeric.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let columns = names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                parse_indicator(name).map_or_else(
                    || ColumnSpec::numeric(name),
                    |(source, level)| ColumnSpec::indicator(source, level),
                )
            })
            .collect();
        Self::new(columns)
    }

    /// Columns in order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Column names in order.
    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Whether the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Position of a column by name.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Levels of `field` that have an indicator column.
    pub fn indicator_levels(&self, field: Categorical) -> Vec<i64> {
        self.columns
            .iter()
            .filter_map(|c| match c.kind {
                ColumnKind::Indicator { source, level } if source == field => Some(level),
                _ => None,
            })
            .collect()
    }
}

fn parse_indicator(name: &str) -> Option<(Categorical, i64)> {
    let (prefix, level) = name.rsplit_once('_')?;
    let source = Categorical::from_column(prefix)?;
    let level = level.parse().ok()?;
    Some((source, level))
}

/// Feature rows with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    record_ids: Vec<Option<String>>,
    values: Array2<f64>,
}

impl FeatureTable {
    /// Build a table; `values` must have one column per name.
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        let record_ids = vec![None; values.nrows()];
        Self::with_record_ids(columns, record_ids, values)
    }

    /// Build a table carrying an identifier per row.
    pub fn with_record_ids(
        columns: Vec<String>,
        record_ids: Vec<Option<String>>,
        values: Array2<f64>,
    ) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(FeatureError::ShapeMismatch {
                columns: columns.len(),
                width: values.ncols(),
            });
        }
        if record_ids.len() != values.nrows() {
            return Err(FeatureError::InvalidConfig(format!(
                "{} record ids for {} rows",
                record_ids.len(),
                values.nrows()
            )));
        }
        Ok(Self {
            columns,
            record_ids,
            values,
        })
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Per-row identifiers.
    pub fn record_ids(&self) -> &[Option<String>] {
        &self.record_ids
    }

    /// Feature matrix (rows x columns).
    pub const fn values(&self) -> &Array2<f64> {
        &self.values
    }

    /// One feature row.
    pub fn row(&self, index: usize) -> ArrayView1<'_, f64> {
        self.values.row(index)
    }

    /// Value of a named column in one row.
    pub fn get(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.values.get((row, col)).copied()
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }
}
