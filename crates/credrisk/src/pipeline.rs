//! Unified scoring pipeline.
//!
//! Raw records flow through the same four stages whichever way they arrive:
//!
//! 1. derive engineered features ([`FeatureDeriver`])
//! 2. align them to the model's schema ([`SchemaAligner`])
//! 3. score and label ([`Scorer`])
//! 4. rank the per-feature contributions ([`Attributor`])
//!
//! The model is loaded once and shared; the pipeline holds no state between
//! calls.

use crate::error::Result;
use crate::settings::{AppConfig, ScoringConfig};
use credrisk_features::{
    FeatureDeriver, FeatureError, FeatureSchema, FeatureTable, InteractiveRecord,
    RawAccountRecord, SchemaAligner,
};
use credrisk_model::{Attributor, CreditModel, DecisionThreshold, Scorer};
use credrisk_output::{BatchReport, ScoreReport};
use std::sync::Arc;
use tracing::debug;

/// Progress of a chunked batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// Records scored so far
    pub processed: usize,
    /// Records in the batch
    pub total: usize,
}

impl BatchProgress {
    /// Whether every record has been scored.
    pub const fn is_complete(&self) -> bool {
        self.processed >= self.total
    }
}

/// Scores raw account records with a shared model.
#[derive(Debug, Clone)]
pub struct ScoringPipeline {
    model: Arc<dyn CreditModel>,
    deriver: FeatureDeriver,
    aligner: SchemaAligner,
    scorer: Scorer,
    attributor: Attributor,
    config: ScoringConfig,
}

impl ScoringPipeline {
    /// Build a pipeline around a loaded model.
    ///
    /// The aligner targets the feature names the model declares, so a model
    /// expecting features the deriver never produces is rejected here.
    pub fn new(model: Arc<dyn CreditModel>, config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let schema = FeatureSchema::from_names(model.feature_names())?;
        let aligner = SchemaAligner::new(schema)?;
        let scorer = Scorer::new(config.scoring.decision_threshold()?)
            .with_parallel(config.scoring.parallel);

        Ok(Self {
            model,
            deriver: FeatureDeriver::new(config.features.clone())?,
            aligner,
            scorer,
            attributor: Attributor::new(config.scoring.top_k)?,
            config: config.scoring.clone(),
        })
    }

    /// The shared model.
    pub const fn model(&self) -> &Arc<dyn CreditModel> {
        &self.model
    }

    /// Schema the records are aligned to.
    pub const fn schema(&self) -> &FeatureSchema {
        self.aligner.schema()
    }

    /// Decision threshold for the labels.
    pub const fn threshold(&self) -> DecisionThreshold {
        self.scorer.threshold()
    }

    /// Maximum attributions per report.
    pub const fn top_k(&self) -> usize {
        self.attributor.top_k()
    }

    /// Derive and align records into a model-ready table.
    pub fn feature_table(&self, records: &[RawAccountRecord]) -> Result<FeatureTable> {
        self.feature_table_from(records, 0)
    }

    fn feature_table_from(
        &self,
        records: &[RawAccountRecord],
        offset: usize,
    ) -> Result<FeatureTable> {
        let features = self
            .deriver
            .derive_batch(records, self.config.parallel)
            .map_err(|e| match e {
                FeatureError::InvalidField { row: Some(row), .. } => e.at_row(row + offset),
                other => other,
            })?;
        Ok(self.aligner.align_features(&features)?)
    }

    /// Score one record.
    ///
    /// A record without an identifier is reported as row `1`.
    pub fn score_record(&self, record: &RawAccountRecord) -> Result<ScoreReport> {
        let features = self.deriver.derive(record)?;
        let placeholder = features.placeholder_history;
        let record_id = features
            .record_id
            .clone()
            .unwrap_or_else(|| "1".to_string());

        let table = self.aligner.align_features(std::slice::from_ref(&features))?;
        Scorer::check_schema(self.model.as_ref(), table.columns())?;

        let row = table.row(0);
        let prediction = self.scorer.score_row(self.model.as_ref(), row);
        let explanation = self.attributor.explain_row(self.model.as_ref(), row);

        Ok(ScoreReport::from_parts(record_id, &prediction, &explanation)
            .with_placeholder_history(placeholder))
    }

    /// Score an interactively entered record.
    ///
    /// Its billing features come from placeholder averages, which the report
    /// notes.
    pub fn score_interactive(&self, record: InteractiveRecord) -> Result<ScoreReport> {
        self.score_record(&record.into())
    }

    /// Score a batch in one pass.
    pub fn score_batch(&self, records: &[RawAccountRecord]) -> Result<BatchReport> {
        self.score_batch_chunked(records, |_| {})
    }

    /// Score a batch `chunk_size` records at a time.
    ///
    /// `on_progress` runs after every chunk. Reports keep the input order and
    /// match those of [`ScoringPipeline::score_batch`]. Records without an
    /// identifier are labelled by their 1-based row number.
    pub fn score_batch_chunked<F>(
        &self,
        records: &[RawAccountRecord],
        mut on_progress: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(BatchProgress),
    {
        let total = records.len();
        let mut reports = Vec::with_capacity(total);

        for (index, chunk) in records.chunks(self.config.chunk_size).enumerate() {
            let offset = reports.len();
            reports.extend(self.score_chunk(chunk, offset)?);

            debug!(
                chunk = index,
                rows = chunk.len(),
                processed = reports.len(),
                total,
                "Scored batch chunk"
            );
            on_progress(BatchProgress {
                processed: reports.len(),
                total,
            });
        }

        Ok(BatchReport::new(reports, self.threshold().value(), self.top_k()))
    }

    fn score_chunk(&self, chunk: &[RawAccountRecord], offset: usize) -> Result<Vec<ScoreReport>> {
        let table = self.feature_table_from(chunk, offset)?;
        let model = self.model.as_ref();

        let predictions = self.scorer.score(model, &table)?;
        let explanations = self.attributor.explain(model, &table, self.config.parallel)?;

        let reports = chunk
            .iter()
            .zip(table.record_ids())
            .zip(predictions.iter().zip(&explanations))
            .enumerate()
            .map(|(i, ((record, id), (prediction, explanation)))| {
                let record_id = id.clone().unwrap_or_else(|| (offset + i + 1).to_string());
                ScoreReport::from_parts(record_id, prediction, explanation)
                    .with_placeholder_history(record.uses_placeholder())
            })
            .collect();
        Ok(reports)
    }
}
