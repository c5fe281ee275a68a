use std::path::Path;
use std::sync::Arc;

use crate::anomaly::{AnomalyModel, FitParams, ScoreOutput};
use crate::config::{ColumnConfig, ServingConfig, TrainingConfig};
use crate::error::Result;
use crate::features::{self, CategoryEncoder, FeatureKind, FeatureSet, Mode};
use crate::ingest::{self, RawTable, TransactionRecord};
use crate::report::{self, AnomalyReport, CategoryGrowth, TrainingSummary};

/// Request-time path: CSV upload -> features -> scores -> report.
/// Holds a shared, read-only model.
#[derive(Clone)]
pub struct ScoringPipeline {
    model: Arc<AnomalyModel>,
    columns: ColumnConfig,
    max_anomalies: usize,
}

impl ScoringPipeline {
    pub fn new(model: Arc<AnomalyModel>, config: &ServingConfig) -> Self {
        Self {
            model,
            columns: config.columns.clone(),
            max_anomalies: config.max_anomalies,
        }
    }

    pub fn model(&self) -> &AnomalyModel {
        &self.model
    }

    pub fn score_csv(&self, bytes: &[u8]) -> Result<AnomalyReport> {
        let table = ingest::read_csv_bytes(bytes)?;
        self.score_table(&table)
    }

    pub fn score_table(&self, table: &RawTable) -> Result<AnomalyReport> {
        let prepared = features::prepare(
            table,
            &self.columns,
            Mode::Serving,
            self.model.feature_set(),
        )?;
        let output = self.model.score(&prepared.matrix)?;
        let report = report::summarize(
            &table.headers,
            &self.columns,
            &prepared.records,
            &output,
            self.max_anomalies,
        )?;

        tracing::info!(
            rows_read = prepared.stats.rows_read,
            rows_scored = report.total_transactions,
            dropped = prepared.stats.dropped(),
            anomalies = report.anomalies_found,
            "Scored upload"
        );
        Ok(report)
    }
}

/// Everything a training run produced, before anything is written.
#[derive(Debug)]
pub struct TrainingOutcome {
    pub model: AnomalyModel,
    pub headers: Vec<String>,
    pub records: Vec<TransactionRecord>,
    pub output: ScoreOutput,
    /// Monthly category sums over every dated row with an amount and a
    /// category, refunds included.
    pub growth: Vec<CategoryGrowth>,
    pub summary: TrainingSummary,
}

/// Fit a model on a historical table.
///
/// Under the categorical feature set the category mapping is fit on the
/// cleaned training rows and stored inside the model.
pub fn train_table(table: &RawTable, config: &TrainingConfig) -> Result<TrainingOutcome> {
    // Categorical cleaning keeps non-positive amounts, so credits net out.
    let (ledger, _) =
        features::clean_rows(table, &config.columns, Mode::Training, FeatureKind::Categorical)?;
    let growth = report::category_growth(&ledger);

    let (records, mut drops) =
        features::clean_rows(table, &config.columns, Mode::Training, config.feature_set)?;

    let feature_set = match config.feature_set {
        FeatureKind::Spending => FeatureSet::Spending,
        FeatureKind::Categorical => FeatureSet::Categorical {
            encoder: CategoryEncoder::fit(records.iter().filter_map(|r| r.category.as_deref())),
        },
    };

    let (records, matrix) = features::derive(records, &feature_set, &mut drops)?;
    tracing::info!(
        rows_read = drops.rows_read,
        rows_used = matrix.nrows(),
        unparsable_date = drops.unparsable_date,
        missing_amount = drops.missing_amount,
        non_positive_amount = drops.non_positive_amount,
        missing_category = drops.missing_category,
        "Prepared training data"
    );

    let model = AnomalyModel::fit(&matrix, feature_set, &FitParams::from(config))?;
    let output = model.score(&matrix)?;

    let summary = TrainingSummary {
        drops,
        rows_used: records.len(),
        anomalies_flagged: output.anomaly_count(),
        offset: model.offset(),
    };

    Ok(TrainingOutcome {
        model,
        headers: table.headers.clone(),
        records,
        output,
        growth,
        summary,
    })
}

/// Full offline run: read the configured CSV, fit, save the artifact to
/// `model_path`, and write side reports into `config.output_dir`.
pub fn run_training(config: &TrainingConfig, model_path: &Path) -> Result<TrainingSummary> {
    let table = ingest::read_csv_path(&config.input_path)?;
    let outcome = train_table(&table, config)?;

    std::fs::create_dir_all(&config.output_dir)?;
    report::write_category_growth(
        &config.output_dir.join("category_growth.csv"),
        &outcome.growth,
    )?;
    report::write_anomalies(
        &config.output_dir.join("anomalies.csv"),
        &outcome.headers,
        &outcome.records,
        &outcome.output,
    )?;

    outcome.model.save(model_path)?;

    tracing::info!(
        rows_used = outcome.summary.rows_used,
        anomalies = outcome.summary.anomalies_flagged,
        offset = outcome.summary.offset,
        "Training complete"
    );
    Ok(outcome.summary)
}
