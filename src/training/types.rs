//! Data types used by the training pipeline.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::{AVG_TEMP, MAX_TEMP, MEAN_HUMIDITY, MIN_TEMP};

pub const DATE: &str = "date";
pub const REGION: &str = "region";
pub const INCIDENTS: &str = "incidents";

/// Columns the aggregator cannot work without.
pub const REQUIRED_COLUMNS: [&str; 7] = [
    DATE,
    REGION,
    MAX_TEMP,
    AVG_TEMP,
    MIN_TEMP,
    MEAN_HUMIDITY,
    INCIDENTS,
];

/// A source row after column canonicalization and type coercion.
///
/// Any field may be missing; rows are only dropped at aggregation time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRecord {
    pub date: Option<NaiveDate>,
    pub region: Option<String>,
    pub apparent_temp: Option<f64>,
    pub max_temp: Option<f64>,
    pub avg_temp: Option<f64>,
    pub min_temp: Option<f64>,
    pub mean_humidity: Option<f64>,
    pub incidents: Option<f64>,
}

/// Normalized rows plus the canonical columns the source actually carried.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    pub columns: BTreeSet<String>,
    pub records: Vec<NormalizedRecord>,
}

impl NormalizedTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains(name)
    }

    /// Appends `other`, taking the union of both column sets.
    pub fn concat(mut self, other: NormalizedTable) -> Self {
        self.columns.extend(other.columns);
        self.records.extend(other.records);
        self
    }
}

/// One aggregated row per (date, region).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub date: NaiveDate,
    pub region: String,
    pub max_temp: f64,
    pub avg_temp: f64,
    pub min_temp: f64,
    pub mean_humidity: f64,
    pub incidents: f64,
}

/// Goodness of fit on one split.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitMetrics {
    pub rows: usize,
    pub r2: f64,
    pub rmse: f64,
}

/// Summary of a completed training run, stored inside the model artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub trained_at: DateTime<Utc>,
    pub source_rows: usize,
    pub aggregated_rows: usize,
    pub features: Vec<String>,
    pub train: SplitMetrics,
    /// `None` when the dataset was too small for a holdout.
    pub test: Option<SplitMetrics>,
}
