pub mod config;
pub mod error;
pub mod features;
pub mod fetch;
pub mod model;
pub mod output;
pub mod predict;
pub mod reader;
pub mod schema;
pub mod thermal;
pub mod training;

pub use error::{ComputationError, ConfigError, Error, Result, SchemaError, ValidationError};
