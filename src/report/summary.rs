use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::anomaly::ScoreOutput;
use crate::config::ColumnConfig;
use crate::error::{Error, Result};
use crate::ingest::TransactionRecord;

/// Response body for a scored upload.
#[derive(Debug, Clone, Serialize)]
pub struct AnomalyReport {
    pub total_transactions: usize,
    pub anomalies_found: usize,
    pub anomalies: Vec<ScoredRecord>,
}

/// An anomalous row: the original fields plus its score.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub anomaly_score: f64,
    pub is_anomaly: u8,
}

/// Count and list anomalous rows. `anomalies` holds at most `max_anomalies`
/// entries, the earliest in input order.
pub fn summarize(
    headers: &[String],
    columns: &ColumnConfig,
    records: &[TransactionRecord],
    output: &ScoreOutput,
    max_anomalies: usize,
) -> Result<AnomalyReport> {
    if records.len() != output.scores.len() || records.len() != output.labels.len() {
        return Err(Error::MisalignedScores {
            records: records.len(),
            scores: output.scores.len(),
            labels: output.labels.len(),
        });
    }

    let flagged = output.anomaly_indices();
    let anomalies = flagged
        .iter()
        .take(max_anomalies)
        .map(|&i| ScoredRecord {
            fields: record_fields(headers, columns, &records[i]),
            anomaly_score: output.scores[i],
            is_anomaly: 1,
        })
        .collect();

    Ok(AnomalyReport {
        total_transactions: records.len(),
        anomalies_found: flagged.len(),
        anomalies,
    })
}

/// Original cells keyed by header. The date and amount columns carry their
/// parsed values; other numeric-looking cells become JSON numbers and empty
/// cells become null.
pub fn record_fields(
    headers: &[String],
    columns: &ColumnConfig,
    record: &TransactionRecord,
) -> Map<String, Value> {
    let mut fields = Map::new();
    for (idx, header) in headers.iter().enumerate() {
        if header == "anomaly_score" || header == "is_anomaly" {
            continue;
        }
        let raw = record.values.get(idx).map(|v| v.trim()).unwrap_or("");
        let value = if *header == columns.date {
            Value::String(record.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string())
        } else if *header == columns.amount {
            number(record.amount)
        } else if raw.is_empty() {
            Value::Null
        } else {
            match raw.parse::<f64>() {
                Ok(v) if v.is_finite() => number(v),
                _ => Value::String(raw.to_string()),
            }
        };
        fields.insert(header.clone(), value);
    }
    fields
}

fn number(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}
