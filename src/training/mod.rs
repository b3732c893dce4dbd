//! Training pipeline: normalize heterogeneous sources, aggregate per region
//! and day, build the design matrix in schema order, fit, evaluate, persist.

pub mod aggregate;
pub mod normalize;
pub mod pipeline;
pub mod split;
pub mod types;
pub mod utility;

pub use pipeline::{load_sources, run, train};
