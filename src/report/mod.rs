pub mod summary;
pub mod training;

pub use summary::{record_fields, summarize, AnomalyReport, ScoredRecord};
pub use training::{
    category_growth, write_anomalies, write_category_growth, CategoryGrowth, TrainingSummary,
};
