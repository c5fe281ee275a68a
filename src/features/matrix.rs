use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const LOG_AMOUNT: &str = "log_amount";
pub const IS_WEEKEND: &str = "is_weekend";
pub const DAY_OF_WEEK: &str = "day_of_week";
pub const MONTH: &str = "month";
pub const AMOUNT: &str = "amount";
pub const CATEGORY_CODE: &str = "category_code";

/// Ordered feature column names a matrix carries and a model was fit against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(names.into_iter().map(Into::into).collect())
    }

    /// `[log_amount, is_weekend, day_of_week, month]`
    pub fn spending() -> Self {
        Self::new([LOG_AMOUNT, IS_WEEKEND, DAY_OF_WEEK, MONTH])
    }

    /// `[amount, category_code]`
    pub fn categorical() -> Self {
        Self::new([AMOUNT, CATEGORY_CODE])
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Row-major feature matrix whose column count always equals its schema length.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    schema: FeatureSchema,
    data: Array2<f64>,
}

impl FeatureMatrix {
    pub fn new(schema: FeatureSchema, data: Array2<f64>) -> Result<Self> {
        if data.ncols() != schema.len() {
            return Err(Error::InvalidParams(format!(
                "matrix has {} columns but schema {:?} has {}",
                data.ncols(),
                schema.names(),
                schema.len()
            )));
        }
        Ok(Self { schema, data })
    }

    /// Callers guarantee `data.ncols() == schema.len()`.
    pub(crate) fn from_parts(schema: FeatureSchema, data: Array2<f64>) -> Self {
        debug_assert_eq!(data.ncols(), schema.len());
        Self { schema, data }
    }

    pub fn empty(schema: FeatureSchema) -> Self {
        let width = schema.len();
        Self {
            schema,
            data: Array2::zeros((0, width)),
        }
    }

    /// Build from one `Vec` per row. Every row must be exactly as wide as the schema.
    pub fn from_rows(schema: FeatureSchema, rows: &[Vec<f64>]) -> Result<Self> {
        let width = schema.len();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(Error::InvalidParams(format!(
                "row {} has {} values, schema expects {}",
                idx,
                row.len(),
                width
            )));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let data = Array2::from_shape_vec((rows.len(), width), flat)
            .map_err(|e| Error::InvalidParams(e.to_string()))?;
        Ok(Self { schema, data })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn data(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.data.row(idx)
    }

    /// Values of a named column, if the schema has it.
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.schema
            .names()
            .iter()
            .position(|n| n == name)
            .map(|idx| self.data.column(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_shape() {
        let m = FeatureMatrix::from_rows(
            FeatureSchema::categorical(),
            &[vec![10.0, 0.0], vec![20.0, 1.0]],
        )
        .unwrap();
        assert_eq!(m.nrows(), 2);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m.column(CATEGORY_CODE).unwrap().to_vec(), vec![0.0, 1.0]);
        assert!(m.column(MONTH).is_none());
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = FeatureMatrix::from_rows(FeatureSchema::spending(), &[vec![1.0, 0.0]]);
        assert!(matches!(err, Err(Error::InvalidParams(_))));
    }

    #[test]
    fn test_empty_keeps_width() {
        let m = FeatureMatrix::empty(FeatureSchema::spending());
        assert!(m.is_empty());
        assert_eq!(m.ncols(), 4);
    }
}
