//! The canonical ordered feature list shared by training and inference.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Error, Result};

pub const APPARENT_TEMP: &str = "apparent_temp";
pub const MAX_TEMP: &str = "max_temp";
pub const AVG_TEMP: &str = "avg_temp";
pub const MIN_TEMP: &str = "min_temp";
pub const MEAN_HUMIDITY: &str = "mean_humidity";

/// Canonical feature order. Training design-matrix columns and inference rows
/// are both laid out in exactly this sequence.
pub const FEATURE_ORDER: [&str; 5] = [APPARENT_TEMP, MAX_TEMP, AVG_TEMP, MIN_TEMP, MEAN_HUMIDITY];

/// Number of features every persisted schema must contain.
pub const FEATURE_COUNT: usize = FEATURE_ORDER.len();

/// Immutable ordered list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// The schema written by the training pipeline.
    pub fn canonical() -> Self {
        Self {
            names: FEATURE_ORDER.iter().map(|n| n.to_string()).collect(),
        }
    }

    /// Builds a schema from persisted names, enforcing the length invariant.
    ///
    /// # Errors
    ///
    /// [`ConfigError::SchemaLength`] if there are not exactly
    /// [`FEATURE_COUNT`] names, [`ConfigError::DuplicateFeature`] if a name
    /// repeats.
    pub fn from_names(names: Vec<String>) -> std::result::Result<Self, ConfigError> {
        if names.len() != FEATURE_COUNT {
            return Err(ConfigError::SchemaLength {
                expected: FEATURE_COUNT,
                found: names.len(),
            });
        }

        let mut seen = HashSet::new();
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateFeature(name.clone()));
            }
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Writes the schema as a JSON array of names.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let body = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, body).map_err(|e| Error::io(path, e))?;
        debug!(path = %path.display(), "Feature schema written");
        Ok(())
    }

    /// Reads a schema file. A wrong name count surfaces as [`Error::Config`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let names: Vec<String> = serde_json::from_str(&content)?;
        Ok(Self::from_names(names)?)
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = ConfigError;

    fn try_from(names: Vec<String>) -> std::result::Result<Self, Self::Error> {
        Self::from_names(names)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.names
    }
}
