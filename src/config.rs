//! Pipeline configuration: source locations, artifact paths and booster
//! parameters.
//!
//! Resolution order is defaults, then an optional JSON file, then environment
//! variables, then whatever the CLI overrides explicitly.
//!
//! ```json
//! {
//!   "static_source": "data/ML_static_dataset.csv",
//!   "model_path": "artifacts/trained_model.json",
//!   "booster": { "n_estimators": 300 }
//! }
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};
use crate::model::gbt::BoosterParams;

pub const ENV_STATIC_SOURCE: &str = "HEAT_STATIC_SOURCE";
pub const ENV_DYNAMIC_SOURCE: &str = "HEAT_DYNAMIC_SOURCE";
pub const ENV_MODEL_PATH: &str = "HEAT_MODEL_PATH";
pub const ENV_SCHEMA_PATH: &str = "HEAT_SCHEMA_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Historical dataset. Training cannot run without it.
    pub static_source: String,
    /// Recent or user-recorded observations; optional.
    pub dynamic_source: Option<String>,
    pub model_path: PathBuf,
    pub schema_path: PathBuf,
    /// Seed for the train/test split.
    pub seed: u64,
    pub test_fraction: f64,
    /// Below this many aggregated rows the model is evaluated on its own
    /// training set instead of a holdout.
    pub min_rows_for_holdout: usize,
    pub booster: BoosterParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            static_source: "ML_static_dataset.csv".to_string(),
            dynamic_source: Some("ML_asos_dataset.csv".to_string()),
            model_path: PathBuf::from("trained_model.json"),
            schema_path: PathBuf::from("feature_names.json"),
            seed: 42,
            test_fraction: 0.2,
            min_rows_for_holdout: 20,
            booster: BoosterParams::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file; absent keys keep their defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Self = serde_json::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(config)
    }

    /// Applies `HEAT_*` environment variables on top of `self`.
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    fn with_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup(ENV_STATIC_SOURCE) {
            self.static_source = v;
        }
        if let Some(v) = lookup(ENV_DYNAMIC_SOURCE) {
            self.dynamic_source = if v.is_empty() { None } else { Some(v) };
        }
        if let Some(v) = lookup(ENV_MODEL_PATH) {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_SCHEMA_PATH) {
            self.schema_path = PathBuf::from(v);
        }
        self
    }

    fn validate(&self, path: &str) -> std::result::Result<(), ConfigError> {
        let invalid = |message: &str| ConfigError::Invalid {
            path: path.to_string(),
            message: message.to_string(),
        };

        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(invalid("test_fraction must be in (0, 1)"));
        }
        if self.booster.n_estimators == 0 {
            return Err(invalid("booster.n_estimators must be at least 1"));
        }
        if !(self.booster.subsample > 0.0 && self.booster.subsample <= 1.0)
            || !(self.booster.colsample > 0.0 && self.booster.colsample <= 1.0)
        {
            return Err(invalid("booster sampling ratios must be in (0, 1]"));
        }
        Ok(())
    }
}
