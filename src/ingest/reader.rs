use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};

use super::types::{RawRow, RawTable};

/// Read a CSV upload held in memory.
pub fn read_csv_bytes(bytes: &[u8]) -> Result<RawTable> {
    read_table(bytes)
}

/// Read a CSV file from disk.
pub fn read_csv_path(path: impl AsRef<Path>) -> Result<RawTable> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open '{}': {}", path.display(), e),
        ))
    })?;
    let table = read_table(file)?;
    tracing::info!(path = %path.display(), rows = table.len(), "Read CSV file");
    Ok(table)
}

fn read_table<R: Read>(source: R) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        // Blank lines come through as a single empty field.
        if record.iter().all(|v| v.trim().is_empty()) {
            continue;
        }
        rows.push(RawRow {
            line,
            values: record.iter().map(str::to_string).collect(),
        });
    }

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_headers_and_rows_in_order() {
        let csv = "Transaction Date, Total Spent ,Category\n2024-01-06,100,Food\n2024-01-08,20.5,Travel\n";
        let table = read_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["Transaction Date", "Total Spent", "Category"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].cell(1), "100");
        assert_eq!(table.rows[1].cell(2), "Travel");
        assert_eq!(table.rows[1].line, 3);
    }

    #[test]
    fn test_short_rows_yield_empty_cells() {
        let csv = "a,b,c\n1\n";
        let table = read_csv_bytes(csv.as_bytes()).unwrap();
        assert_eq!(table.rows[0].cell(0), "1");
        assert_eq!(table.rows[0].cell(2), "");
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let table = read_csv_bytes(b"date,amount\n2024-01-01,5\n").unwrap();
        assert_eq!(table.column("amount").unwrap(), 1);
        match table.column("Total Spent") {
            Err(Error::Schema { column, available }) => {
                assert_eq!(column, "Total Spent");
                assert_eq!(available, vec!["date", "amount"]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_csv_path("/nonexistent/pulseguard.csv").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
