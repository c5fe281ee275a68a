use std::path::PathBuf;

/// Errors surfaced by the library. Row-level parse failures are not errors;
/// they are tallied in [`crate::features::DropStats`] and the row is skipped.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("required column '{column}' not found in input (available: {available:?})")]
    Schema {
        column: String,
        available: Vec<String>,
    },

    #[error("feature schema mismatch: model expects {expected:?}, got {found:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("model artifact '{}': {reason}", path.display())]
    Artifact { path: PathBuf, reason: String },

    #[error("cannot fit a model on {rows} rows")]
    InsufficientData { rows: usize },

    #[error("score/record misalignment: {records} records, {scores} scores, {labels} labels")]
    MisalignedScores {
        records: usize,
        scores: usize,
        labels: usize,
    },

    #[error("invalid parameter: {0}")]
    InvalidParams(String),

    #[error("feature matrix shape: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("malformed CSV input: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
