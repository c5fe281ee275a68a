//! Raw transaction rows to a fixed-width numeric feature matrix.

pub mod encoding;
pub mod matrix;
pub mod parse;
pub mod pipeline;

pub use encoding::CategoryEncoder;
pub use matrix::{FeatureMatrix, FeatureSchema};
pub use pipeline::{
    clean_rows, derive, is_weekend, log_amount, prepare, DropStats, FeatureKind, FeatureSet,
    Mode, Prepared,
};
