//! PulseGuard: flags unusual personal spending transactions with an
//! isolation forest fit on historical data.

pub mod anomaly;
pub mod api;
pub mod config;
pub mod error;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod report;

pub use error::{Error, Result};
