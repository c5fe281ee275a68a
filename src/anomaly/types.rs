use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::features::FeatureKind;

/// Per-row scorer output, positionally aligned with the input matrix.
///
/// `scores` are decision values: lower is more anomalous and anything below
/// zero is an outlier under the threshold fixed at fit time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreOutput {
    pub scores: Vec<f64>,
    pub labels: Vec<bool>,
}

impl ScoreOutput {
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn anomaly_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Indices of rows labelled anomalous, in input order.
    pub fn anomaly_indices(&self) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter_map(|(i, &l)| l.then_some(i))
            .collect()
    }
}

/// Descriptive metadata about a loaded model.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub feature_set: FeatureKind,
    pub features: Vec<String>,
    pub categories: Option<Vec<String>>,
    pub contamination: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
    pub offset: f64,
    pub training_rows: usize,
    pub trained_at: DateTime<Utc>,
}
