//! Weather observations and the ordered feature vectors built from them.
//!
//! [`FeatureVector::from_observation`] is the single constructor used by both
//! the training design matrix and inference, so the two paths cannot drift.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::{ComputationError, SchemaError};
use crate::schema::{self, FeatureSchema};
use crate::thermal::{self, DerivedFeatures};

/// One day of weather for one region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeatherObservation {
    max_temp: f64,
    min_temp: f64,
    mean_humidity: f64,
}

impl WeatherObservation {
    /// Validates and normalizes raw readings.
    ///
    /// Humidity is clipped to `[0, 100]` and a reversed max/min pair is
    /// swapped rather than rejected.
    pub fn new(max_temp: f64, min_temp: f64, mean_humidity: f64) -> Result<Self, ComputationError> {
        for (field, value) in [
            ("max_temp", max_temp),
            ("min_temp", min_temp),
            ("mean_humidity", mean_humidity),
        ] {
            if !value.is_finite() {
                return Err(ComputationError { field, value });
            }
        }

        let (max_temp, min_temp) = if max_temp < min_temp {
            (min_temp, max_temp)
        } else {
            (max_temp, min_temp)
        };

        Ok(Self {
            max_temp,
            min_temp,
            mean_humidity: thermal::clip_humidity(mean_humidity),
        })
    }

    pub fn max_temp(&self) -> f64 {
        self.max_temp
    }

    pub fn min_temp(&self) -> f64 {
        self.min_temp
    }

    pub fn mean_humidity(&self) -> f64 {
        self.mean_humidity
    }

    /// Daily mean temperature, unrounded.
    pub fn avg_temp(&self) -> f64 {
        (self.max_temp + self.min_temp) / 2.0
    }

    /// Derived quantities. Apparent temperature uses the daily *maximum*.
    pub fn derive(&self) -> Result<DerivedFeatures, ComputationError> {
        thermal::derive(self.max_temp, self.mean_humidity)
    }
}

/// Ordered `name -> value` pairs fed to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    entries: Vec<(String, f32)>,
}

impl FeatureVector {
    /// Builds the five canonical features from an observation.
    pub fn from_observation(obs: &WeatherObservation) -> Result<Self, ComputationError> {
        let derived = obs.derive()?;
        Ok(Self::from_parts(obs, &derived))
    }

    /// Builds the vector from already derived values.
    pub fn from_parts(obs: &WeatherObservation, derived: &DerivedFeatures) -> Self {
        let entries = vec![
            (schema::APPARENT_TEMP.to_string(), derived.apparent_temp as f32),
            (schema::MAX_TEMP.to_string(), obs.max_temp() as f32),
            (schema::AVG_TEMP.to_string(), obs.avg_temp() as f32),
            (schema::MIN_TEMP.to_string(), obs.min_temp() as f32),
            (schema::MEAN_HUMIDITY.to_string(), obs.mean_humidity() as f32),
        ];
        Self { entries }
    }

    /// Builds a vector from arbitrary pairs, e.g. a row read back from disk.
    pub fn from_entries(entries: Vec<(String, f32)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(String, f32)] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Returns the values laid out in `schema` order.
    ///
    /// # Errors
    ///
    /// [`SchemaError`] listing schema names absent from the vector (`missing`)
    /// and vector names absent from the schema (`extra`). A name repeated in
    /// the vector is listed in `extra` once per repeat. No partial row is
    /// ever returned.
    pub fn reindex(&self, schema: &FeatureSchema) -> Result<Vec<f32>, SchemaError> {
        let missing: Vec<String> = schema
            .names()
            .iter()
            .filter(|name| self.get(name).is_none())
            .cloned()
            .collect();
        let mut seen = HashSet::new();
        let extra: Vec<String> = self
            .entries
            .iter()
            .map(|(name, _)| name)
            .filter(|name| !schema.contains(name) || !seen.insert(name.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() || !extra.is_empty() {
            return Err(SchemaError { missing, extra });
        }

        Ok(schema
            .names()
            .iter()
            .filter_map(|name| self.get(name))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_guard() {
        let obs = WeatherObservation::new(20.0, 30.0, 50.0).unwrap();
        assert_eq!(obs.max_temp(), 30.0);
        assert_eq!(obs.min_temp(), 20.0);
        assert_eq!(obs, WeatherObservation::new(30.0, 20.0, 50.0).unwrap());
    }

    #[test]
    fn test_humidity_clipped_on_construction() {
        let obs = WeatherObservation::new(30.0, 20.0, 150.0).unwrap();
        assert_eq!(obs.mean_humidity(), 100.0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let err = WeatherObservation::new(30.0, f64::NAN, 50.0).unwrap_err();
        assert_eq!(err.field, "min_temp");
    }

    #[test]
    fn test_vector_in_canonical_order() {
        let obs = WeatherObservation::new(30.0, 20.0, 50.0).unwrap();
        let vector = FeatureVector::from_observation(&obs).unwrap();
        let names: Vec<&str> = vector.entries().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, schema::FEATURE_ORDER);
        assert_eq!(vector.get("avg_temp"), Some(25.0));
    }

    #[test]
    fn test_reindex_reorders_to_schema() {
        let vector = FeatureVector::from_entries(vec![
            ("mean_humidity".into(), 5.0),
            ("min_temp".into(), 4.0),
            ("avg_temp".into(), 3.0),
            ("max_temp".into(), 2.0),
            ("apparent_temp".into(), 1.0),
        ]);
        let row = vector.reindex(&FeatureSchema::canonical()).unwrap();
        assert_eq!(row, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_reindex_reports_missing_and_extra() {
        let vector = FeatureVector::from_entries(vec![
            ("apparent_temp".into(), 1.0),
            ("max_temp".into(), 2.0),
            ("min_temp".into(), 4.0),
            ("dew_point".into(), 9.0),
        ]);
        let err = vector.reindex(&FeatureSchema::canonical()).unwrap_err();
        assert_eq!(err.missing, vec!["avg_temp", "mean_humidity"]);
        assert_eq!(err.extra, vec!["dew_point"]);
    }

    #[test]
    fn test_reindex_rejects_repeated_name() {
        let obs = WeatherObservation::new(30.0, 20.0, 50.0).unwrap();
        let mut entries = FeatureVector::from_observation(&obs).unwrap().entries().to_vec();
        entries.push(("max_temp".into(), 99.0));

        let err = FeatureVector::from_entries(entries)
            .reindex(&FeatureSchema::canonical())
            .unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(err.extra, vec!["max_temp"]);
    }

    #[test]
    fn test_reindex_reports_extra_only() {
        let obs = WeatherObservation::new(30.0, 20.0, 50.0).unwrap();
        let mut entries = FeatureVector::from_observation(&obs).unwrap().entries().to_vec();
        entries.push(("wet_bulb_temp".into(), 22.3));

        let err = FeatureVector::from_entries(entries)
            .reindex(&FeatureSchema::canonical())
            .unwrap_err();
        assert!(err.missing.is_empty());
        assert_eq!(err.extra, vec!["wet_bulb_temp"]);
    }
}
