use chrono::{Datelike, NaiveDateTime};

use crate::error::{Error, Result};

/// A CSV file as read from disk or an upload: one header row plus string cells.
/// Row order is the file order.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// One data row. `line` is the 1-based line number in the source file.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub line: u64,
    pub values: Vec<String>,
}

impl RawRow {
    /// Cell at `idx`, trimmed. Short rows yield an empty string.
    pub fn cell(&self, idx: usize) -> &str {
        self.values.get(idx).map(|v| v.trim()).unwrap_or("")
    }
}

impl RawTable {
    /// Position of a named column. Absent columns are a schema error, never
    /// treated as an all-missing column.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::Schema {
                column: name.to_string(),
                available: self.headers.clone(),
            })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Resolved positions of the columns the feature pipeline reads.
#[derive(Debug, Clone, Copy)]
pub struct ColumnIndex {
    pub date: usize,
    pub amount: usize,
    pub category: Option<usize>,
}

/// A row that survived cleaning, with its parsed fields and the original cells.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRecord {
    pub line: u64,
    pub timestamp: NaiveDateTime,
    pub amount: f64,
    pub category: Option<String>,
    pub values: Vec<String>,
}

impl TransactionRecord {
    /// Day of week with Monday = 0.
    pub fn day_of_week(&self) -> u32 {
        self.timestamp.weekday().num_days_from_monday()
    }

    pub fn month(&self) -> u32 {
        self.timestamp.month()
    }
}
