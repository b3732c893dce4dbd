//! The regression capability the pipeline delegates to.
//!
//! [`Regressor`] fits, [`FittedModel`] predicts. The core never looks inside
//! a fitted model; any implementation that satisfies these two traits can be
//! trained and served. [`gbt::GradientBoostedTrees`] is the default.

pub mod artifact;
pub mod context;
pub mod gbt;

pub use artifact::ModelArtifact;
pub use context::ModelContext;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SchemaError};
use crate::features::FeatureVector;
use crate::schema::FeatureSchema;

/// Row-major `f32` design matrix whose columns follow a [`FeatureSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    schema: FeatureSchema,
    data: Vec<f32>,
}

impl DesignMatrix {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            data: Vec::new(),
        }
    }

    /// Appends a vector, laid out in schema order.
    pub fn push(&mut self, vector: &FeatureVector) -> std::result::Result<(), SchemaError> {
        let row = vector.reindex(&self.schema)?;
        self.data.extend_from_slice(&row);
        Ok(())
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn n_cols(&self) -> usize {
        self.schema.len()
    }

    pub fn n_rows(&self) -> usize {
        if self.n_cols() == 0 {
            0
        } else {
            self.data.len() / self.n_cols()
        }
    }

    pub fn row(&self, i: usize) -> &[f32] {
        let n = self.n_cols();
        &self.data[i * n..(i + 1) * n]
    }

    /// Copies the given rows, in the given order, into a new matrix.
    pub fn select(&self, rows: &[usize]) -> Self {
        let mut data = Vec::with_capacity(rows.len() * self.n_cols());
        for &i in rows {
            data.extend_from_slice(self.row(i));
        }
        Self {
            schema: self.schema.clone(),
            data,
        }
    }
}

/// A trained model that scores one feature row at a time.
pub trait FittedModel {
    fn predict(&self, row: &[f32]) -> f64;

    /// Checks that the model can score rows of `width` features.
    ///
    /// Called once when a persisted model is loaded, so `predict` never sees
    /// a row shorter than the model indexes into.
    fn check_input_width(&self, _width: usize) -> std::result::Result<(), String> {
        Ok(())
    }

    fn predict_matrix(&self, x: &DesignMatrix) -> Vec<f64> {
        (0..x.n_rows()).map(|i| self.predict(x.row(i))).collect()
    }
}

/// A learner that produces a [`FittedModel`].
///
/// Fitting is a single blocking call; implementations may parallelize
/// internally.
pub trait Regressor {
    type Model: FittedModel + Serialize + DeserializeOwned;

    fn fit(&self, x: &DesignMatrix, y: &[f32]) -> Result<Self::Model>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::WeatherObservation;

    fn vector(max: f64, min: f64, rh: f64) -> FeatureVector {
        FeatureVector::from_observation(&WeatherObservation::new(max, min, rh).unwrap()).unwrap()
    }

    #[test]
    fn test_rows_follow_schema() {
        let mut x = DesignMatrix::new(FeatureSchema::canonical());
        x.push(&vector(30.0, 20.0, 50.0)).unwrap();
        x.push(&vector(24.0, 18.0, 80.0)).unwrap();

        assert_eq!(x.n_rows(), 2);
        assert_eq!(x.row(0)[1], 30.0);
        assert_eq!(x.row(0)[2], 25.0);
        assert_eq!(x.row(1)[3], 18.0);
        assert_eq!(x.row(1)[4], 80.0);
    }

    #[test]
    fn test_push_rejects_mismatch() {
        let mut x = DesignMatrix::new(FeatureSchema::canonical());
        let bad = FeatureVector::from_entries(vec![("max_temp".into(), 30.0)]);

        let err = x.push(&bad).unwrap_err();
        assert_eq!(err.missing.len(), 4);
        assert_eq!(x.n_rows(), 0);
    }

    #[test]
    fn test_select() {
        let mut x = DesignMatrix::new(FeatureSchema::canonical());
        x.push(&vector(30.0, 20.0, 50.0)).unwrap();
        x.push(&vector(24.0, 18.0, 80.0)).unwrap();
        x.push(&vector(35.0, 26.0, 65.0)).unwrap();

        let picked = x.select(&[2, 0]);
        assert_eq!(picked.n_rows(), 2);
        assert_eq!(picked.row(0), x.row(2));
        assert_eq!(picked.row(1), x.row(0));
    }
}
