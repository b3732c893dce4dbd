//! Single-row inference from three weather readings.

use serde::Serialize;
use tracing::debug;

use crate::error::ValidationError;
use crate::features::{FeatureVector, WeatherObservation};
use crate::model::{FittedModel, ModelContext};
use crate::thermal::round1;

/// Raw string inputs, e.g. CLI arguments or form fields.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictRequest {
    pub max_temp: f64,
    pub min_temp: f64,
    pub mean_humidity: f64,
}

impl PredictRequest {
    /// Parses the three readings, naming the first one that is not a number.
    pub fn parse(max_temp: &str, min_temp: &str, mean_humidity: &str) -> Result<Self, ValidationError> {
        fn field(name: &'static str, raw: &str) -> Result<f64, ValidationError> {
            raw.trim()
                .parse::<f64>()
                .map_err(|_| ValidationError::Unparseable {
                    field: name,
                    value: raw.to_string(),
                })
        }

        Ok(Self {
            max_temp: field("max_temp", max_temp)?,
            min_temp: field("min_temp", min_temp)?,
            mean_humidity: field("mean_humidity", mean_humidity)?,
        })
    }
}

/// Result of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Model output, unrounded.
    pub raw: f64,
    /// Daily mean temperature rounded to 0.1 °C.
    pub avg_temp: f64,
    /// Apparent temperature rounded to 0.1 °C.
    pub apparent_temp: f64,
    /// The exact vector the model scored.
    pub features: FeatureVector,
}

/// Validates readings and scores them against a loaded [`ModelContext`].
pub struct PredictionService<'a, M> {
    ctx: &'a ModelContext<M>,
}

impl<'a, M: FittedModel> PredictionService<'a, M> {
    pub fn new(ctx: &'a ModelContext<M>) -> Self {
        Self { ctx }
    }

    /// Predicts the incident count for one region-day.
    ///
    /// A reversed max/min pair is swapped and humidity is clipped to
    /// `[0, 100]`. Apparent temperature is derived from the daily maximum,
    /// matching how the training rows were built.
    ///
    /// # Errors
    ///
    /// [`ValidationError`] for non-finite input, a non-finite derived value or
    /// a vector that does not match the schema. The model is not called in
    /// any of those cases.
    pub fn predict(
        &self,
        max_temp: f64,
        min_temp: f64,
        mean_humidity: f64,
    ) -> Result<Prediction, ValidationError> {
        for (field, value) in [
            ("max_temp", max_temp),
            ("min_temp", min_temp),
            ("mean_humidity", mean_humidity),
        ] {
            if !value.is_finite() {
                return Err(ValidationError::NonFinite {
                    field: field.to_string(),
                    value,
                });
            }
        }

        let obs = WeatherObservation::new(max_temp, min_temp, mean_humidity)?;
        let derived = obs.derive()?;
        let avg_temp = obs.avg_temp();

        let features = FeatureVector::from_parts(&obs, &derived);
        let row = features.reindex(self.ctx.schema())?;

        // Finite f64 readings can still overflow the f32 row.
        if let Some(pos) = row.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonFinite {
                field: self.ctx.schema().names()[pos].clone(),
                value: f64::from(row[pos]),
            });
        }

        let raw = self.ctx.model().predict(&row);
        debug!(?row, raw, "Prediction computed");

        Ok(Prediction {
            raw,
            avg_temp: round1(avg_temp),
            apparent_temp: round1(derived.apparent_temp),
            features,
        })
    }

    pub fn predict_request(&self, req: &PredictRequest) -> Result<Prediction, ValidationError> {
        self.predict(req.max_temp, req.min_temp, req.mean_humidity)
    }
}
