//! Schema Aligner
//!
//! Produces a feature table with exactly the model's columns, in the model's
//! order, whatever categorical levels a batch happens to contain:
//!
//! 1. build a frame of numeric features plus the raw categorical codes
//! 2. one-hot encode each categorical column over its observed levels
//! 3. add a zero-filled column for every expected column the frame lacks
//! 4. project onto the schema, dropping everything else
//!
//! A code the model was never trained on has no indicator column, so its rows
//! end up with zeros for every level of that field. This is an approximation,
//! not an error; it is logged at debug level.

use crate::derive::DerivedFeatures;
use crate::error::{FeatureError, Result};
use crate::record::Categorical;
use crate::schema::{ColumnKind, FeatureSchema, FeatureTable};
use polars::prelude::*;
use std::collections::BTreeSet;
use tracing::debug;

/// Aligns derived features to a model's declared schema.
#[derive(Debug, Clone)]
pub struct SchemaAligner {
    schema: FeatureSchema,
}

impl Default for SchemaAligner {
    fn default() -> Self {
        Self {
            schema: FeatureSchema::credit_default(),
        }
    }
}

impl SchemaAligner {
    /// Create an aligner for `schema`.
    ///
    /// Every numeric column must be one the deriver produces; only indicator
    /// columns may be zero-filled.
    pub fn new(schema: FeatureSchema) -> Result<Self> {
        let unknown: Vec<&str> = schema
            .columns()
            .iter()
            .filter(|c| {
                c.kind == ColumnKind::Numeric
                    && !DerivedFeatures::NUMERIC_COLUMNS.contains(&c.name.as_str())
            })
            .map(|c| c.name.as_str())
            .collect();

        if !unknown.is_empty() {
            return Err(FeatureError::InvalidConfig(format!(
                "schema expects features that are never derived: {}",
                unknown.join(", ")
            )));
        }

        Ok(Self { schema })
    }

    /// The target schema.
    pub const fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Derived features to an aligned [`FeatureTable`].
    pub fn align_features(&self, features: &[DerivedFeatures]) -> Result<FeatureTable> {
        if features.is_empty() {
            let columns = self.schema.names().into_iter().map(String::from).collect();
            return FeatureTable::new(columns, ndarray::Array2::zeros((0, self.schema.len())));
        }

        let frame = derived_frame(features)?;
        let encoded = self.one_hot_encode(frame)?;
        let aligned = self.align(encoded)?;

        let record_ids = features.iter().map(|f| f.record_id.clone()).collect();
        self.to_table(&aligned, record_ids)
    }

    /// One-hot encode every categorical column over its observed levels.
    ///
    /// Each source column is replaced by `<COLUMN>_<level>` indicator columns,
    /// one per distinct level present, reference levels included.
    pub fn one_hot_encode(&self, mut frame: DataFrame) -> Result<DataFrame> {
        for field in Categorical::ALL {
            let name = field.column();
            if frame.get_column_index(name).is_none() {
                continue;
            }

            let codes: Vec<Option<i64>> = frame
                .column(name)?
                .as_materialized_series()
                .i64()?
                .into_iter()
                .collect();
            let levels: BTreeSet<i64> = codes.iter().flatten().copied().collect();

            self.report_unseen_levels(field, &levels, &codes);

            for level in levels {
                let indicator: Vec<f64> = codes
                    .iter()
                    .map(|code| if *code == Some(level) { 1.0 } else { 0.0 })
                    .collect();
                frame.with_column(Column::new(field.indicator_column(level).into(), indicator))?;
            }

            frame = frame.drop(name)?;
        }

        Ok(frame)
    }

    /// Zero-fill absent schema columns and project onto the schema order.
    pub fn align(&self, mut frame: DataFrame) -> Result<DataFrame> {
        let height = frame.height();
        for column in self.schema.columns() {
            if frame.get_column_index(&column.name).is_none() {
                frame.with_column(Column::new(
                    column.name.as_str().into(),
                    vec![column.fill_value(); height],
                ))?;
            }
        }

        Ok(frame.select(self.schema.names())?)
    }

    fn to_table(&self, aligned: &DataFrame, record_ids: Vec<Option<String>>) -> Result<FeatureTable> {
        let values = aligned.to_ndarray::<Float64Type>(IndexOrder::C)?;
        let columns = self.schema.names().into_iter().map(String::from).collect();
        FeatureTable::with_record_ids(columns, record_ids, values)
    }

    fn report_unseen_levels(&self, field: Categorical, observed: &BTreeSet<i64>, codes: &[Option<i64>]) {
        let encoded = self.schema.indicator_levels(field);
        if encoded.is_empty() {
            return;
        }

        let unseen: Vec<i64> = observed
            .iter()
            .copied()
            .filter(|level| *level != field.reference_level() && !encoded.contains(level))
            .collect();
        if unseen.is_empty() {
            return;
        }

        let rows = codes
            .iter()
            .filter(|code| code.is_some_and(|c| unseen.contains(&c)))
            .count();
        debug!(
            field = field.column(),
            levels = ?unseen,
            rows,
            "Categorical levels outside the trained set; their indicators are all zero"
        );
    }
}

/// Numeric derived features plus raw categorical codes, one row per record.
pub fn derived_frame(features: &[DerivedFeatures]) -> Result<DataFrame> {
    let rows: Vec<[f64; 14]> = features.iter().map(DerivedFeatures::numeric_values).collect();

    let mut columns: Vec<Column> = DerivedFeatures::NUMERIC_COLUMNS
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let values: Vec<f64> = rows.iter().map(|row| row[j]).collect();
            Column::new((*name).into(), values)
        })
        .collect();

    for field in Categorical::ALL {
        let codes: Vec<i64> = features.iter().map(|f| f.categorical(field)).collect();
        columns.push(Column::new(field.column().into(), codes));
    }

    Ok(DataFrame::new(columns)?)
}
