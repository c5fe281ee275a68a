use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::anomaly::ScoreOutput;
use crate::error::{Error, Result};
use crate::features::DropStats;
use crate::ingest::TransactionRecord;

/// Spend per category per calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryGrowth {
    pub category: String,
    /// Last day of the month the amounts fall in.
    pub date: NaiveDate,
    pub amount: f64,
}

/// What a training run did, for logs and the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    pub drops: DropStats,
    pub rows_used: usize,
    pub anomalies_flagged: usize,
    pub offset: f64,
}

/// Sum amounts by (category, month), sorted by category then month.
/// Records without a category are skipped.
pub fn category_growth(records: &[TransactionRecord]) -> Vec<CategoryGrowth> {
    let mut sums: BTreeMap<(&str, NaiveDate), f64> = BTreeMap::new();
    for record in records {
        let Some(category) = record.category.as_deref() else {
            continue;
        };
        let Some(month_end) = month_end(record.timestamp.date()) else {
            continue;
        };
        *sums.entry((category, month_end)).or_insert(0.0) += record.amount;
    }

    sums.into_iter()
        .map(|((category, date), amount)| CategoryGrowth {
            category: category.to_string(),
            date,
            amount,
        })
        .collect()
}

fn month_end(date: NaiveDate) -> Option<NaiveDate> {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)?.pred_opt()
}

pub fn write_category_growth(path: &Path, rows: &[CategoryGrowth]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "Category growth trends saved");
    Ok(())
}

/// Write the flagged training rows with their original cells and score.
/// Returns the number of rows written.
pub fn write_anomalies(
    path: &Path,
    headers: &[String],
    records: &[TransactionRecord],
    output: &ScoreOutput,
) -> Result<usize> {
    if records.len() != output.len() {
        return Err(Error::MisalignedScores {
            records: records.len(),
            scores: output.scores.len(),
            labels: output.labels.len(),
        });
    }

    let mut writer = csv::WriterBuilder::new().flexible(true).from_path(path)?;
    let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
    header_row.push("anomaly_score");
    writer.write_record(&header_row)?;

    let mut written = 0;
    for idx in output.anomaly_indices() {
        let record = &records[idx];
        let mut row: Vec<String> = (0..headers.len())
            .map(|i| record.values.get(i).cloned().unwrap_or_default())
            .collect();
        row.push(output.scores[idx].to_string());
        writer.write_record(&row)?;
        written += 1;
    }
    writer.flush()?;

    tracing::info!(path = %path.display(), rows = written, "Training anomalies saved");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, amount: f64, category: &str) -> TransactionRecord {
        let timestamp = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        TransactionRecord {
            line: 0,
            timestamp,
            amount,
            category: Some(category.to_string()),
            values: vec![date.to_string(), amount.to_string(), category.to_string()],
        }
    }

    #[test]
    fn test_month_end() {
        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        assert_eq!(month_end(d("2024-02-10")), Some(d("2024-02-29")));
        assert_eq!(month_end(d("2023-12-31")), Some(d("2023-12-31")));
        assert_eq!(month_end(d("2024-04-01")), Some(d("2024-04-30")));
    }

    #[test]
    fn test_category_growth_groups_and_sorts() {
        let records = vec![
            record("2024-02-03", 10.0, "Travel"),
            record("2024-01-15", 5.0, "Food"),
            record("2024-01-20", 7.5, "Food"),
            record("2024-02-01", 1.0, "Food"),
            record("2024-01-31", -2.0, "Travel"),
        ];
        let growth = category_growth(&records);
        let summary: Vec<(String, String, f64)> = growth
            .iter()
            .map(|g| (g.category.clone(), g.date.to_string(), g.amount))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("Food".to_string(), "2024-01-31".to_string(), 12.5),
                ("Food".to_string(), "2024-02-29".to_string(), 1.0),
                ("Travel".to_string(), "2024-01-31".to_string(), -2.0),
                ("Travel".to_string(), "2024-02-29".to_string(), 10.0),
            ]
        );
    }

    #[test]
    fn test_write_reports() {
        let dir = tempfile::tempdir().unwrap();
        let headers = vec!["Date".to_string(), "amount".to_string(), "category".to_string()];
        let records = vec![
            record("2024-01-15", 5.0, "Food"),
            record("2024-01-16", 900.0, "Food"),
        ];
        let output = ScoreOutput {
            scores: vec![0.05, -0.12],
            labels: vec![false, true],
        };

        let anomalies_path = dir.path().join("anomalies.csv");
        let written = write_anomalies(&anomalies_path, &headers, &records, &output).unwrap();
        assert_eq!(written, 1);
        let content = std::fs::read_to_string(&anomalies_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Date,amount,category,anomaly_score");
        assert_eq!(lines[1], "2024-01-16,900,Food,-0.12");
        assert_eq!(lines.len(), 2);

        let growth_path = dir.path().join("category_growth.csv");
        write_category_growth(&growth_path, &category_growth(&records)).unwrap();
        let content = std::fs::read_to_string(&growth_path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "category,date,amount");
        let fields: Vec<&str> = lines[1].split(',').collect();
        assert_eq!(&fields[..2], &["Food", "2024-01-31"]);
        assert_eq!(fields[2].parse::<f64>().unwrap(), 905.0);
    }
}
