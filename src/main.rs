//! CLI entry point for the heat-illness forecaster.
//!
//! Provides subcommands for training a model from historical datasets,
//! predicting incident counts from a weather forecast, computing derived
//! temperatures, and recording observed days into the dynamic dataset.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heat_illness_forecast::{
    config::PipelineConfig,
    model::{ModelContext, gbt::BoostedModel, gbt::GradientBoostedTrees},
    output::{
        DerivedRecord, ObservationRow, PredictionRecord, append_record, print_derived, print_json,
        print_pretty,
    },
    predict::{PredictRequest, PredictionService},
    thermal,
    training,
    training::normalize::parse_date,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "heat_illness_forecast")]
#[command(about = "Predict daily heat-illness incidents from weather", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model from the static and (optional) dynamic datasets
    Train {
        /// JSON config file; flags and HEAT_* variables override it
        #[arg(short, long)]
        config: Option<String>,

        /// Path or URL of the historical dataset
        #[arg(long = "static", value_name = "FILE_OR_URL")]
        static_source: Option<String>,

        /// Path or URL of the recent-observations dataset
        #[arg(long = "dynamic", value_name = "FILE_OR_URL")]
        dynamic_source: Option<String>,

        /// Train on the static dataset only
        #[arg(long, default_value_t = false)]
        no_dynamic: bool,

        /// Where to write the model artifact
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Where to write the feature schema
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },
    /// Predict the incident count for one region-day
    Predict {
        /// Daily maximum temperature (°C)
        #[arg(allow_negative_numbers = true)]
        max_temp: String,

        /// Daily minimum temperature (°C)
        #[arg(allow_negative_numbers = true)]
        min_temp: String,

        /// Mean relative humidity (%)
        #[arg(allow_negative_numbers = true)]
        mean_humidity: String,

        /// Model artifact to load
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Feature schema to load
        #[arg(short, long)]
        schema: Option<PathBuf>,

        /// Print the full result as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,

        /// CSV file to append the prediction to
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compute wet-bulb and apparent temperature
    Derive {
        /// Air temperature (°C)
        #[arg(allow_negative_numbers = true)]
        air_temp: f64,

        /// Relative humidity (%)
        #[arg(allow_negative_numbers = true)]
        rel_humidity: f64,

        /// Print the result as JSON on stdout
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Append an observed day to the dynamic dataset
    Record {
        /// Observation date (e.g. 2024-08-03)
        date: String,

        /// Region name
        region: String,

        #[arg(allow_negative_numbers = true)]
        max_temp: f64,

        #[arg(allow_negative_numbers = true)]
        min_temp: f64,

        mean_humidity: f64,

        /// Observed incident count
        incidents: f64,

        /// Dataset to append to (defaults to the configured dynamic source)
        #[arg(short, long)]
        dataset: Option<String>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = std::env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "logs/heat_illness_forecast.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("heat_illness_forecast.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            static_source,
            dynamic_source,
            no_dynamic,
            model,
            schema,
        } => {
            let mut config = base_config(config.as_deref())?;
            if let Some(source) = static_source {
                config.static_source = source;
            }
            if no_dynamic {
                config.dynamic_source = None;
            } else if let Some(source) = dynamic_source {
                config.dynamic_source = Some(source);
            }
            if let Some(path) = model {
                config.model_path = path;
            }
            if let Some(path) = schema {
                config.schema_path = path;
            }

            let regressor = GradientBoostedTrees::new(config.booster);
            let report = training::run(&config, &regressor)?;

            info!(
                aggregated_rows = report.aggregated_rows,
                train_r2 = report.train.r2,
                test_r2 = report.test.map(|m| m.r2),
                "Training finished"
            );
        }
        Commands::Predict {
            max_temp,
            min_temp,
            mean_humidity,
            model,
            schema,
            json,
            output,
        } => {
            let config = base_config(None)?;
            let model_path = model.unwrap_or(config.model_path);
            let schema_path = schema.unwrap_or(config.schema_path);

            let ctx: ModelContext<BoostedModel> = ModelContext::load(&model_path, &schema_path)
                .with_context(|| format!("cannot serve predictions from {}", model_path.display()))?;
            let service = PredictionService::new(&ctx);

            let request = PredictRequest::parse(&max_temp, &min_temp, &mean_humidity)?;
            let prediction = service.predict_request(&request)?;

            print_pretty(&prediction);
            let body = print_json(&prediction)?;
            if json {
                println!("{body}");
            }

            if let Some(path) = output {
                append_record(&path, &PredictionRecord::new(&request, &prediction))?;
            }
        }
        Commands::Derive {
            air_temp,
            rel_humidity,
            json,
        } => {
            let derived = thermal::derive(air_temp, rel_humidity)?;
            let body = print_derived(&DerivedRecord::new(air_temp, rel_humidity, &derived))?;
            if json {
                println!("{body}");
            }
        }
        Commands::Record {
            date,
            region,
            max_temp,
            min_temp,
            mean_humidity,
            incidents,
            dataset,
        } => {
            let date = parse_date(&date).with_context(|| format!("unrecognized date '{date}'"))?;
            if incidents < 0.0 {
                anyhow::bail!("incident count cannot be negative: {incidents}");
            }
            if max_temp < min_temp {
                warn!(max_temp, min_temp, "Maximum below minimum, storing as given");
            }

            let path = match dataset {
                Some(path) => path,
                None => base_config(None)?
                    .dynamic_source
                    .context("no dynamic dataset configured; pass --dataset")?,
            };

            let row = ObservationRow {
                date,
                region,
                max_temp,
                min_temp,
                mean_humidity,
                incidents,
            };
            append_record(&path, &row)?;
            info!(path = %path, date = %row.date, region = %row.region, "Observation recorded");
        }
    }

    Ok(())
}

/// Defaults, then an optional config file, then `HEAT_*` environment variables.
fn base_config(path: Option<&str>) -> Result<PipelineConfig> {
    let config = match path {
        Some(p) => PipelineConfig::load(p)?,
        None => PipelineConfig::default(),
    };
    Ok(config.with_env())
}
