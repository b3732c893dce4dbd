//! Error taxonomy for feature derivation, the schema contract, training and serving.
//!
//! Each failure class has its own type so callers can match on it; [`Error`]
//! is the umbrella returned by the pipeline and loaders.

use std::path::PathBuf;
use thiserror::Error;

/// A derived-feature formula received a value it cannot compute with.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot compute derived feature: {field} = {value} is not a finite number")]
pub struct ComputationError {
    pub field: &'static str,
    pub value: f64,
}

/// Column or feature-name mismatch against an expected set.
///
/// `missing` lists expected names that are absent, `extra` lists names that
/// are present but not expected. Either may be empty, never both.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("schema mismatch: missing {missing:?}, extra {extra:?}")]
pub struct SchemaError {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
}

impl SchemaError {
    pub fn missing(missing: Vec<String>) -> Self {
        Self {
            missing,
            extra: Vec::new(),
        }
    }
}

/// Persisted configuration cannot be used to serve or train.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("feature schema must contain exactly {expected} names, found {found}")]
    SchemaLength { expected: usize, found: usize },

    #[error("feature schema contains duplicate name '{0}'")]
    DuplicateFeature(String),

    #[error("invalid configuration in {path}: {message}")]
    Invalid { path: String, message: String },
}

/// A prediction request that must never reach the model.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} could not be parsed as a number: '{value}'")]
    Unparseable { field: &'static str, value: String },

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: String, value: f64 },

    #[error(transparent)]
    Computation(#[from] ComputationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Umbrella error for the training pipeline and artifact loading.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("primary dataset not found: {0}")]
    MissingSource(String),

    #[error("no usable rows left after aggregation")]
    EmptyDataset,

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{}: existing header {found:?} does not match {expected:?}", path.display())]
    HeaderMismatch {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(String),

    #[error(transparent)]
    Computation(#[from] ComputationError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;
