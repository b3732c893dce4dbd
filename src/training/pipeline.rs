use chrono::Utc;
use tracing::{error, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::features::{FeatureVector, WeatherObservation};
use crate::fetch::{fetch_bytes, source_exists};
use crate::model::{DesignMatrix, FittedModel, ModelArtifact, Regressor};
use crate::reader::parse_table;
use crate::schema::FeatureSchema;
use crate::training::aggregate::aggregate;
use crate::training::normalize::normalize;
use crate::training::split::train_test_split;
use crate::training::types::{NormalizedTable, SplitMetrics, TrainingRecord, TrainingReport};
use crate::training::utility::{r2_score, rmse};

/// Reads and normalizes one tabular source.
#[tracing::instrument]
pub fn load_source(location: &str) -> Result<NormalizedTable> {
    let bytes = fetch_bytes(location)?;
    let raw = parse_table(&bytes)?;
    let table = normalize(&raw);
    info!(rows = table.len(), columns = ?table.columns, "Source loaded");
    Ok(table)
}

/// Loads the static source and, if present, the dynamic one.
///
/// # Errors
///
/// [`Error::MissingSource`] if the static source does not exist. A missing
/// dynamic source is not an error.
pub fn load_sources(config: &PipelineConfig) -> Result<NormalizedTable> {
    if !source_exists(&config.static_source) {
        error!(source = %config.static_source, "Static dataset not found");
        return Err(Error::MissingSource(config.static_source.clone()));
    }
    let table = load_source(&config.static_source)?;

    match config.dynamic_source.as_deref() {
        Some(dynamic) if source_exists(dynamic) => Ok(table.concat(load_source(dynamic)?)),
        Some(dynamic) => {
            warn!(source = dynamic, "Dynamic dataset not found, training on static data only");
            Ok(table)
        }
        None => {
            info!("No dynamic dataset configured");
            Ok(table)
        }
    }
}

/// Lays training rows out in `schema` order.
///
/// Each row goes through [`FeatureVector::from_observation`], the same
/// constructor inference uses, so `avg_temp` is `(max + min) / 2` and
/// `apparent_temp` is derived from the daily maximum.
pub fn build_design_matrix(
    records: &[TrainingRecord],
    schema: &FeatureSchema,
) -> Result<(DesignMatrix, Vec<f32>)> {
    let mut x = DesignMatrix::new(schema.clone());
    let mut y = Vec::with_capacity(records.len());

    for r in records {
        let obs = WeatherObservation::new(r.max_temp, r.min_temp, r.mean_humidity)?;
        x.push(&FeatureVector::from_observation(&obs)?)?;
        y.push(r.incidents as f32);
    }

    Ok((x, y))
}

fn evaluate<M: FittedModel>(model: &M, x: &DesignMatrix, y: &[f32]) -> SplitMetrics {
    let truth: Vec<f64> = y.iter().map(|&v| f64::from(v)).collect();
    let predicted = model.predict_matrix(x);
    SplitMetrics {
        rows: truth.len(),
        r2: r2_score(&truth, &predicted),
        rmse: rmse(&truth, &predicted),
    }
}

/// Builds the design matrix, splits, fits and evaluates. Performs no I/O.
///
/// Metrics are reported, never used to reject the model.
#[tracing::instrument(skip_all, fields(rows = records.len()))]
pub fn train<R: Regressor>(
    records: &[TrainingRecord],
    source_rows: usize,
    config: &PipelineConfig,
    regressor: &R,
) -> Result<(R::Model, TrainingReport)> {
    if records.is_empty() {
        return Err(Error::EmptyDataset);
    }

    let schema = FeatureSchema::canonical();
    let (x, y) = build_design_matrix(records, &schema)?;

    let split = train_test_split(
        x.n_rows(),
        config.test_fraction,
        config.min_rows_for_holdout,
        config.seed,
    );
    if split.is_resubstitution {
        warn!(
            rows = x.n_rows(),
            min_rows = config.min_rows_for_holdout,
            "Too few rows for a holdout, reporting training metrics only"
        );
    }

    let x_train = x.select(&split.train);
    let y_train: Vec<f32> = split.train.iter().map(|&i| y[i]).collect();

    let model = regressor.fit(&x_train, &y_train)?;

    let train_metrics = evaluate(&model, &x_train, &y_train);
    info!(
        r2 = train_metrics.r2,
        rmse = train_metrics.rmse,
        rows = train_metrics.rows,
        "Train metrics"
    );

    let test_metrics = if split.is_resubstitution {
        None
    } else {
        let x_test = x.select(&split.test);
        let y_test: Vec<f32> = split.test.iter().map(|&i| y[i]).collect();
        let m = evaluate(&model, &x_test, &y_test);
        info!(r2 = m.r2, rmse = m.rmse, rows = m.rows, "Test metrics");
        Some(m)
    };

    let report = TrainingReport {
        trained_at: Utc::now(),
        source_rows,
        aggregated_rows: records.len(),
        features: schema.names().to_vec(),
        train: train_metrics,
        test: test_metrics,
    };

    Ok((model, report))
}

/// Runs the whole pipeline and persists the model artifact and schema.
///
/// Stops at the first error; nothing is written unless fitting succeeded.
#[tracing::instrument(skip_all, fields(static_source = %config.static_source))]
pub fn run<R: Regressor>(config: &PipelineConfig, regressor: &R) -> Result<TrainingReport> {
    let table = load_sources(config)?;
    let records = aggregate(&table)?;

    let (model, report) = train(&records, table.len(), config, regressor)?;

    ModelArtifact::new(model, report.clone()).save(&config.model_path)?;
    FeatureSchema::canonical().save(&config.schema_path)?;

    info!(
        model = %config.model_path.display(),
        schema = %config.schema_path.display(),
        features = ?report.features,
        "Artifacts saved"
    );
    Ok(report)
}
