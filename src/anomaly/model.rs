use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TrainingConfig;
use crate::error::{Error, Result};
use crate::features::{FeatureMatrix, FeatureSchema, FeatureSet};

use super::forest::IsolationForest;
use super::types::{ModelInfo, ScoreOutput};

/// Artifact layout version written by [`AnomalyModel::save`].
pub const FORMAT_VERSION: u32 = 1;

/// Fit-time knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitParams {
    /// Expected outlier fraction; sets the decision offset, not a cap.
    pub contamination: f64,
    pub seed: u64,
    pub n_estimators: usize,
    pub max_samples: usize,
}

impl Default for FitParams {
    fn default() -> Self {
        Self {
            contamination: 0.05,
            seed: 42,
            n_estimators: 100,
            max_samples: 256,
        }
    }
}

impl From<&TrainingConfig> for FitParams {
    fn from(cfg: &TrainingConfig) -> Self {
        Self {
            contamination: cfg.contamination,
            seed: cfg.seed,
            n_estimators: cfg.n_estimators,
            max_samples: cfg.max_samples,
        }
    }
}

impl FitParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(Error::InvalidParams(format!(
                "contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        if self.n_estimators == 0 {
            return Err(Error::InvalidParams("n_estimators must be at least 1".to_string()));
        }
        if self.max_samples < 2 {
            return Err(Error::InvalidParams("max_samples must be at least 2".to_string()));
        }
        Ok(())
    }
}

/// Trained outlier model. Immutable once fit; safe to share across threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyModel {
    pub(super) format_version: u32,
    pub(super) features: FeatureSet,
    pub(super) schema: FeatureSchema,
    pub(super) forest: IsolationForest,
    pub(super) offset: f64,
    pub(super) contamination: f64,
    pub(super) seed: u64,
    pub(super) training_rows: usize,
    pub(super) trained_at: DateTime<Utc>,
}

impl AnomalyModel {
    /// Fit on a training matrix whose schema matches `features`.
    pub fn fit(matrix: &FeatureMatrix, features: FeatureSet, params: &FitParams) -> Result<Self> {
        params.validate()?;

        let schema = features.schema();
        if matrix.schema() != &schema {
            return Err(Error::SchemaMismatch {
                expected: schema.names().to_vec(),
                found: matrix.schema().names().to_vec(),
            });
        }
        if matrix.nrows() < 2 {
            return Err(Error::InsufficientData {
                rows: matrix.nrows(),
            });
        }

        let forest = IsolationForest::fit(
            matrix.data(),
            params.n_estimators,
            params.max_samples,
            params.seed,
        );
        let training_scores = forest.score_samples(matrix.data());
        let offset = percentile(&training_scores, params.contamination * 100.0);

        tracing::info!(
            rows = matrix.nrows(),
            trees = forest.n_estimators(),
            sub_sample = forest.sub_sample(),
            contamination = params.contamination,
            seed = params.seed,
            offset,
            "Fitted isolation forest"
        );

        Ok(Self {
            format_version: FORMAT_VERSION,
            features,
            schema,
            forest,
            offset,
            contamination: params.contamination,
            seed: params.seed,
            training_rows: matrix.nrows(),
            trained_at: Utc::now(),
        })
    }

    /// Score rows against the threshold fixed at fit time. Pure; an empty
    /// matrix yields empty output.
    pub fn score(&self, matrix: &FeatureMatrix) -> Result<ScoreOutput> {
        if matrix.schema() != &self.schema {
            return Err(Error::SchemaMismatch {
                expected: self.schema.names().to_vec(),
                found: matrix.schema().names().to_vec(),
            });
        }
        if matrix.is_empty() {
            return Ok(ScoreOutput::default());
        }

        let scores: Vec<f64> = self
            .forest
            .score_samples(matrix.data())
            .into_iter()
            .map(|s| s - self.offset)
            .collect();
        let labels = scores.iter().map(|&d| d < 0.0).collect();

        Ok(ScoreOutput { scores, labels })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn feature_set(&self) -> &FeatureSet {
        &self.features
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            feature_set: self.features.kind(),
            features: self.schema.names().to_vec(),
            categories: match &self.features {
                FeatureSet::Spending => None,
                FeatureSet::Categorical { encoder } => Some(encoder.categories().to_vec()),
            },
            contamination: self.contamination,
            seed: self.seed,
            n_estimators: self.forest.n_estimators(),
            max_samples: self.forest.sub_sample(),
            offset: self.offset,
            training_rows: self.training_rows,
            trained_at: self.trained_at,
        }
    }
}

/// Linear-interpolated percentile, `q` in `[0, 100]`. `values` must be non-empty.
fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = (q / 100.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::CategoryEncoder;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn spending_matrix(n: usize, seed: u64) -> FeatureMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let rows: Vec<Vec<f64>> = (0..n)
            .map(|_| {
                let dow = rng.gen_range(0..7) as f64;
                vec![
                    rng.gen_range(1.0..500.0f64).ln_1p(),
                    if dow >= 5.0 { 1.0 } else { 0.0 },
                    dow,
                    rng.gen_range(1..=12) as f64,
                ]
            })
            .collect();
        FeatureMatrix::from_rows(FeatureSchema::spending(), &rows).unwrap()
    }

    #[test]
    fn test_percentile_interpolates() {
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 0.0), 1.0);
        assert_eq!(percentile(&[4.0, 1.0, 3.0, 2.0], 100.0), 4.0);
        assert!((percentile(&[1.0, 2.0, 3.0, 4.0], 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_contamination_sets_flagged_fraction() {
        let matrix = spending_matrix(1000, 3);
        let model = AnomalyModel::fit(&matrix, FeatureSet::Spending, &FitParams::default()).unwrap();
        let out = model.score(&matrix).unwrap();
        let flagged = out.anomaly_count();
        assert!((30..=70).contains(&flagged), "flagged {}", flagged);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let train = spending_matrix(300, 11);
        let query = spending_matrix(50, 12);
        let a = AnomalyModel::fit(&train, FeatureSet::Spending, &FitParams::default()).unwrap();
        let b = AnomalyModel::fit(&train, FeatureSet::Spending, &FitParams::default()).unwrap();
        assert_eq!(a.score(&query).unwrap(), b.score(&query).unwrap());
        assert_eq!(a.offset(), b.offset());
    }

    #[test]
    fn test_empty_matrix_scores_empty() {
        let train = spending_matrix(100, 1);
        let model = AnomalyModel::fit(&train, FeatureSet::Spending, &FitParams::default()).unwrap();
        let out = model.score(&FeatureMatrix::empty(FeatureSchema::spending())).unwrap();
        assert!(out.is_empty());
        assert!(out.labels.is_empty());
    }

    #[test]
    fn test_narrow_matrix_rejected_by_wider_model() {
        let train = spending_matrix(100, 1);
        let model = AnomalyModel::fit(&train, FeatureSet::Spending, &FitParams::default()).unwrap();
        let narrow = FeatureMatrix::from_rows(FeatureSchema::categorical(), &[vec![10.0, 1.0]]).unwrap();
        match model.score(&narrow) {
            Err(Error::SchemaMismatch { expected, found }) => {
                assert_eq!(expected.len(), 4);
                assert_eq!(found.len(), 2);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_reordered_columns_rejected() {
        let train = spending_matrix(100, 1);
        let model = AnomalyModel::fit(&train, FeatureSet::Spending, &FitParams::default()).unwrap();
        let reordered = FeatureMatrix::new(
            FeatureSchema::new(["month", "day_of_week", "is_weekend", "log_amount"]),
            Array2::zeros((1, 4)),
        )
        .unwrap();
        assert!(matches!(model.score(&reordered), Err(Error::SchemaMismatch { .. })));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let one_row = spending_matrix(1, 1);
        assert!(matches!(
            AnomalyModel::fit(&one_row, FeatureSet::Spending, &FitParams::default()),
            Err(Error::InsufficientData { rows: 1 })
        ));

        let train = spending_matrix(50, 1);
        let params = FitParams {
            contamination: 0.9,
            ..Default::default()
        };
        assert!(matches!(
            AnomalyModel::fit(&train, FeatureSet::Spending, &params),
            Err(Error::InvalidParams(_))
        ));

        let encoder = CategoryEncoder::fit(["Food"]);
        assert!(matches!(
            AnomalyModel::fit(&train, FeatureSet::Categorical { encoder }, &FitParams::default()),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_obvious_outlier_flagged() {
        let mut rows: Vec<Vec<f64>> = (0..200)
            .map(|i| vec![40.0 + (i % 10) as f64, (i % 3) as f64])
            .collect();
        rows.push(vec![25_000.0, 1.0]);
        let matrix = FeatureMatrix::from_rows(FeatureSchema::categorical(), &rows).unwrap();
        let encoder = CategoryEncoder::fit(["Food", "Rent", "Travel"]);
        let model =
            AnomalyModel::fit(&matrix, FeatureSet::Categorical { encoder }, &FitParams::default())
                .unwrap();
        let out = model.score(&matrix).unwrap();
        assert!(out.labels[200]);
        let min = out.scores.iter().cloned().fold(f64::INFINITY, f64::min);
        assert_eq!(out.scores[200], min);
        assert_eq!(model.info().categories.unwrap().len(), 3);
    }
}
