use chrono::NaiveDate;
use heat_illness_forecast::config::PipelineConfig;
use heat_illness_forecast::model::gbt::{BoostedModel, BoosterParams, GradientBoostedTrees};
use heat_illness_forecast::model::{DesignMatrix, FittedModel, ModelContext, Regressor};
use heat_illness_forecast::output::{ObservationRow, append_record};
use heat_illness_forecast::predict::PredictionService;
use heat_illness_forecast::schema::FeatureSchema;
use heat_illness_forecast::training::aggregate::aggregate;
use heat_illness_forecast::training::{self, load_sources};
use heat_illness_forecast::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const STATIC_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/static_dataset.csv");
const LEGACY_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/legacy_dataset.csv");

fn config_in(dir: &Path, static_source: &str, dynamic_source: Option<String>) -> PipelineConfig {
    PipelineConfig {
        static_source: static_source.to_string(),
        dynamic_source,
        model_path: dir.join("trained_model.json"),
        schema_path: dir.join("feature_names.json"),
        booster: BoosterParams {
            n_estimators: 60,
            max_depth: 3,
            ..Default::default()
        },
        ..Default::default()
    }
}

fn observation(date: (i32, u32, u32), region: &str, max: f64, min: f64, incidents: f64) -> ObservationRow {
    ObservationRow {
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        region: region.to_string(),
        max_temp: max,
        min_temp: min,
        mean_humidity: 60.0,
        incidents,
    }
}

/// Always predicts the largest training target.
#[derive(Serialize, Deserialize)]
struct PeakModel(f64);

impl FittedModel for PeakModel {
    fn predict(&self, _row: &[f32]) -> f64 {
        self.0
    }
}

struct PeakRegressor;

impl Regressor for PeakRegressor {
    type Model = PeakModel;

    fn fit(&self, x: &DesignMatrix, y: &[f32]) -> heat_illness_forecast::Result<PeakModel> {
        assert_eq!(x.n_rows(), y.len());
        assert_eq!(x.n_cols(), 5);
        Ok(PeakModel(y.iter().copied().fold(0.0f32, f32::max).into()))
    }
}

#[test]
fn test_train_then_predict_with_stub_regressor() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), STATIC_FIXTURE, None);

    let report = training::run(&config, &PeakRegressor).unwrap();
    assert_eq!(report.train.rows, 32);

    let ctx: ModelContext<PeakModel> =
        ModelContext::load(&config.model_path, &config.schema_path).unwrap();
    let peak = ctx.model().0;
    assert!(peak > 0.0 && peak <= 19.0);

    let p = PredictionService::new(&ctx).predict(30.0, 20.0, 50.0).unwrap();
    assert_eq!(p.raw, peak);
    assert_eq!(p.avg_temp, 25.0);
    assert_eq!(p.apparent_temp, 29.5);
}

#[test]
fn test_train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), STATIC_FIXTURE, None);

    let report = training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap();
    assert_eq!(report.source_rows, 40);
    assert_eq!(report.aggregated_rows, 40);
    assert_eq!(report.features, FeatureSchema::canonical().names());
    assert_eq!(report.test.map(|m| m.rows), Some(8));
    assert!(report.train.r2 > 0.9, "train r2 {}", report.train.r2);

    let saved = fs::read_to_string(&config.schema_path).unwrap();
    let names: Vec<String> = serde_json::from_str(&saved).unwrap();
    assert_eq!(
        names,
        ["apparent_temp", "max_temp", "avg_temp", "min_temp", "mean_humidity"]
    );

    let ctx: ModelContext<BoostedModel> =
        ModelContext::load(&config.model_path, &config.schema_path).unwrap();
    assert!(ctx.report().is_some());
    let service = PredictionService::new(&ctx);

    let reference = service.predict(30.0, 20.0, 50.0).unwrap();
    assert!(reference.raw.is_finite());
    assert_eq!(reference.avg_temp, 25.0);
    assert_eq!(reference.apparent_temp, 29.5);

    let hot = service.predict(35.5, 27.0, 65.0).unwrap();
    let cool = service.predict(23.0, 15.0, 65.0).unwrap();
    assert!(hot.raw > cool.raw, "hot {} cool {}", hot.raw, cool.raw);

    // Swapped extremes score the same row.
    assert_eq!(service.predict(20.0, 30.0, 50.0).unwrap(), reference);
}

#[test]
fn test_short_schema_file_refuses_to_serve() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), STATIC_FIXTURE, None);
    training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap();

    fs::write(
        &config.schema_path,
        r#"["apparent_temp", "max_temp", "avg_temp", "min_temp"]"#,
    )
    .unwrap();

    let err = ModelContext::<BoostedModel>::load(&config.model_path, &config.schema_path).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::SchemaLength {
            expected: 5,
            found: 4
        })
    ));
}

#[test]
fn test_reordered_schema_file_refuses_to_serve() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), STATIC_FIXTURE, None);
    training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap();

    let reordered = FeatureSchema::from_names(
        ["max_temp", "apparent_temp", "avg_temp", "min_temp", "mean_humidity"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    )
    .unwrap();
    reordered.save(&config.schema_path).unwrap();

    let err = ModelContext::<BoostedModel>::load(&config.model_path, &config.schema_path).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::Invalid { .. })));
}

#[test]
fn test_missing_dynamic_source_trains_on_static() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("ML_asos_dataset.csv");
    let config = config_in(
        dir.path(),
        STATIC_FIXTURE,
        Some(missing.to_string_lossy().into_owned()),
    );

    let report = training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap();
    assert_eq!(report.aggregated_rows, 40);
    assert!(config.model_path.exists());
}

#[test]
fn test_missing_static_source_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("ML_static_dataset.csv");
    let config = config_in(dir.path(), &missing.to_string_lossy(), None);

    let err = training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap_err();
    assert!(matches!(err, Error::MissingSource(_)));
    assert!(!config.model_path.exists());
    assert!(!config.schema_path.exists());
}

#[test]
fn test_recorded_observations_merge_with_static() {
    let dir = tempfile::tempdir().unwrap();
    let dynamic = dir.path().join("ML_asos_dataset.csv");
    let dynamic_path = dynamic.to_str().unwrap();

    // Same region-day as a static row, plus a new one.
    append_record(dynamic_path, &observation((2023, 7, 1), "서울", 24.6, 16.6, 5.0)).unwrap();
    append_record(dynamic_path, &observation((2023, 8, 1), "서울", 33.0, 25.0, 12.0)).unwrap();

    let config = config_in(dir.path(), STATIC_FIXTURE, Some(dynamic_path.to_string()));
    let table = load_sources(&config).unwrap();
    assert_eq!(table.len(), 42);

    let records = aggregate(&table).unwrap();
    assert_eq!(records.len(), 41);

    let merged = records
        .iter()
        .find(|r| r.date == NaiveDate::from_ymd_opt(2023, 7, 1).unwrap() && r.region == "서울")
        .unwrap();
    assert!((merged.max_temp - 23.6).abs() < 1e-9);
    assert!((merged.min_temp - 15.6).abs() < 1e-9);
    assert_eq!(merged.incidents, 5.0);

    assert_eq!(records.last().unwrap().date, NaiveDate::from_ymd_opt(2023, 8, 1).unwrap());

    let report = training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap();
    assert_eq!(report.source_rows, 42);
    assert_eq!(report.aggregated_rows, 41);
}

#[test]
fn test_legacy_export_with_serial_dates() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), LEGACY_FIXTURE, None);

    let records = aggregate(&load_sources(&config).unwrap()).unwrap();
    assert_eq!(records.len(), 6);

    let first = &records[0];
    assert_eq!(first.date, NaiveDate::from_ymd_opt(2023, 7, 1).unwrap());
    assert_eq!(first.region, "대구");
    assert_eq!(first.max_temp, 28.5);
    assert_eq!(first.avg_temp, 24.5);
    assert_eq!(first.mean_humidity, 61.0);
    assert_eq!(first.incidents, 3.0);

    // Six region-days is below the holdout threshold.
    let report = training::run(&config, &GradientBoostedTrees::new(config.booster)).unwrap();
    assert!(report.test.is_none());
}
