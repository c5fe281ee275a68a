use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::config::ColumnConfig;
use crate::error::Result;
use crate::ingest::{ColumnIndex, RawTable, TransactionRecord};

use super::encoding::CategoryEncoder;
use super::matrix::{FeatureMatrix, FeatureSchema};
use super::parse::{parse_amount, parse_timestamp};

/// Which cleaning rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Request-time: refunds and credits (`amount <= 0`) are dropped.
    Serving,
    /// Fit-time: category is required on every row.
    Training,
}

/// Feature family without any fitted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Spending,
    Categorical,
}

/// Feature family plus whatever it needs to encode rows. Stored in the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSet {
    Spending,
    Categorical { encoder: CategoryEncoder },
}

impl FeatureSet {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Self::Spending => FeatureKind::Spending,
            Self::Categorical { .. } => FeatureKind::Categorical,
        }
    }

    pub fn schema(&self) -> FeatureSchema {
        match self {
            Self::Spending => FeatureSchema::spending(),
            Self::Categorical { .. } => FeatureSchema::categorical(),
        }
    }
}

/// Why rows were dropped during preparation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DropStats {
    pub rows_read: usize,
    pub unparsable_date: usize,
    pub missing_amount: usize,
    pub non_positive_amount: usize,
    pub missing_category: usize,
    pub unknown_category: usize,
}

impl DropStats {
    pub fn dropped(&self) -> usize {
        self.unparsable_date
            + self.missing_amount
            + self.non_positive_amount
            + self.missing_category
            + self.unknown_category
    }

    pub fn retained(&self) -> usize {
        self.rows_read - self.dropped()
    }
}

/// Cleaned rows with their positionally aligned feature rows.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub records: Vec<TransactionRecord>,
    pub matrix: FeatureMatrix,
    pub stats: DropStats,
}

/// `ln(1 + amount)`; zero maps to zero.
pub fn log_amount(amount: f64) -> f64 {
    amount.ln_1p()
}

/// 1 for Saturday/Sunday (Monday = 0), else 0.
pub fn is_weekend(day_of_week: u32) -> u32 {
    u32::from(matches!(day_of_week, 5 | 6))
}

/// Clean and featurize a table in one step.
pub fn prepare(
    table: &RawTable,
    columns: &ColumnConfig,
    mode: Mode,
    features: &FeatureSet,
) -> Result<Prepared> {
    let (records, mut stats) = clean_rows(table, columns, mode, features.kind())?;
    let (records, matrix) = derive(records, features, &mut stats)?;
    Ok(Prepared {
        records,
        matrix,
        stats,
    })
}

/// Parse and filter rows. Unusable rows are counted and skipped; only a
/// missing required column fails the call.
pub fn clean_rows(
    table: &RawTable,
    columns: &ColumnConfig,
    mode: Mode,
    kind: FeatureKind,
) -> Result<(Vec<TransactionRecord>, DropStats)> {
    let category_required = mode == Mode::Training || kind == FeatureKind::Categorical;
    let positive_required = mode == Mode::Serving || kind == FeatureKind::Spending;

    let index = ColumnIndex {
        date: table.column(&columns.date)?,
        amount: table.column(&columns.amount)?,
        category: if category_required {
            Some(table.column(&columns.category)?)
        } else {
            table.column(&columns.category).ok()
        },
    };

    let mut stats = DropStats {
        rows_read: table.len(),
        ..Default::default()
    };
    let mut records = Vec::with_capacity(table.len());

    for row in &table.rows {
        let Some(timestamp) = parse_timestamp(row.cell(index.date)) else {
            tracing::debug!(line = row.line, value = row.cell(index.date), "Dropping row: unparsable date");
            stats.unparsable_date += 1;
            continue;
        };

        let Some(amount) = parse_amount(row.cell(index.amount)) else {
            tracing::debug!(line = row.line, value = row.cell(index.amount), "Dropping row: missing amount");
            stats.missing_amount += 1;
            continue;
        };

        if positive_required && amount <= 0.0 {
            tracing::debug!(line = row.line, amount, "Dropping row: non-positive amount");
            stats.non_positive_amount += 1;
            continue;
        }

        let category = index
            .category
            .map(|idx| row.cell(idx))
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        if category_required && category.is_none() {
            tracing::debug!(line = row.line, "Dropping row: missing category");
            stats.missing_category += 1;
            continue;
        }

        records.push(TransactionRecord {
            line: row.line,
            timestamp,
            amount,
            category,
            values: row.values.clone(),
        });
    }

    Ok((records, stats))
}

/// Compute feature rows for cleaned records. Order is preserved; under the
/// categorical set, records whose category has no code are dropped.
pub fn derive(
    records: Vec<TransactionRecord>,
    features: &FeatureSet,
    stats: &mut DropStats,
) -> Result<(Vec<TransactionRecord>, FeatureMatrix)> {
    let schema = features.schema();
    let width = schema.len();
    let mut kept = Vec::with_capacity(records.len());
    let mut flat = Vec::with_capacity(records.len() * width);

    for record in records {
        match features {
            FeatureSet::Spending => {
                let dow = record.day_of_week();
                flat.extend_from_slice(&[
                    log_amount(record.amount),
                    f64::from(is_weekend(dow)),
                    f64::from(dow),
                    f64::from(record.month()),
                ]);
            }
            FeatureSet::Categorical { encoder } => {
                let code = record.category.as_deref().and_then(|c| encoder.code(c));
                let Some(code) = code else {
                    tracing::debug!(line = record.line, category = ?record.category, "Dropping row: unknown category");
                    stats.unknown_category += 1;
                    continue;
                };
                flat.extend_from_slice(&[record.amount, code as f64]);
            }
        }
        kept.push(record);
    }

    let data = Array2::from_shape_vec((kept.len(), width), flat)?;
    Ok((kept, FeatureMatrix::from_parts(schema, data)))
}
