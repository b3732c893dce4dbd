//! Output formatting and persistence for predictions and recorded observations.
//!
//! Supports pretty-printing, JSON serialization, and CSV append.

use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::predict::{PredictRequest, Prediction};
use crate::thermal::{DerivedFeatures, clip_humidity, round1};

/// One logged prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub max_temp: f64,
    pub min_temp: f64,
    pub mean_humidity: f64,
    pub avg_temp: f64,
    pub apparent_temp: f64,
    pub predicted_incidents: f64,
}

impl PredictionRecord {
    pub fn new(request: &PredictRequest, prediction: &Prediction) -> Self {
        Self {
            timestamp: Utc::now(),
            max_temp: request.max_temp,
            min_temp: request.min_temp,
            mean_humidity: request.mean_humidity,
            avg_temp: prediction.avg_temp,
            apparent_temp: prediction.apparent_temp,
            predicted_incidents: prediction.raw,
        }
    }
}

/// Derived temperatures for one (temperature, humidity) pair, rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedRecord {
    pub air_temp: f64,
    pub rel_humidity: f64,
    pub wet_bulb_temp: f64,
    pub apparent_temp: f64,
}

impl DerivedRecord {
    pub fn new(air_temp: f64, rel_humidity: f64, derived: &DerivedFeatures) -> Self {
        Self {
            air_temp,
            rel_humidity: clip_humidity(rel_humidity),
            wet_bulb_temp: round1(derived.wet_bulb_temp),
            apparent_temp: round1(derived.apparent_temp),
        }
    }
}

/// An observed region-day, in the column layout the normalizer reads back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    #[serde(serialize_with = "iso_date")]
    pub date: NaiveDate,
    pub region: String,
    pub max_temp: f64,
    pub min_temp: f64,
    pub mean_humidity: f64,
    pub incidents: f64,
}

fn iso_date<S: serde::Serializer>(date: &NaiveDate, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(&date.format("%Y-%m-%d"))
}

/// Logs a prediction using Rust's debug pretty-print format.
pub fn print_pretty(prediction: &Prediction) {
    debug!("{:#?}", prediction);
}

/// Logs a prediction summary and returns it as pretty-printed JSON.
pub fn print_json(prediction: &Prediction) -> Result<String> {
    let json = serde_json::to_string_pretty(prediction)?;
    info!(
        predicted_incidents = prediction.raw,
        avg_temp = prediction.avg_temp,
        apparent_temp = prediction.apparent_temp,
        "Prediction"
    );
    Ok(json)
}

/// Logs derived temperatures and returns them as pretty-printed JSON.
pub fn print_derived(record: &DerivedRecord) -> Result<String> {
    let json = serde_json::to_string_pretty(record)?;
    info!(
        air_temp = record.air_temp,
        rel_humidity = record.rel_humidity,
        wet_bulb_temp = record.wet_bulb_temp,
        apparent_temp = record.apparent_temp,
        "Derived temperatures"
    );
    Ok(json)
}

/// Header row `record` serializes to.
fn header_of<T: Serialize>(path: &str, record: &T) -> Result<Vec<String>> {
    let mut buf = WriterBuilder::new().from_writer(Vec::new());
    buf.serialize(record)?;
    let bytes = buf.into_inner().map_err(|e| Error::io(path, e.into_error()))?;

    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(bytes.as_slice());
    Ok(rdr.headers()?.iter().map(str::to_string).collect())
}

/// Header row of an existing CSV file, or `None` if the file is empty.
fn existing_header(path: &str) -> Result<Option<Vec<String>>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut first = csv::ByteRecord::new();
    if !rdr.read_byte_record(&mut first)? {
        return Ok(None);
    }
    Ok(Some(
        first
            .iter()
            .map(|cell| String::from_utf8_lossy(cell).trim_start_matches('\u{feff}').to_string())
            .collect(),
    ))
}

/// Appends a serializable record as a row to a CSV file.
///
/// Creates the file with headers if it does not exist or is empty. An
/// existing file must carry exactly the record's header, in order;
/// otherwise nothing is written and [`Error::HeaderMismatch`] is returned.
pub fn append_record<T: Serialize>(path: &str, record: &T) -> Result<()> {
    let file_exists = Path::new(path).exists();
    let expected = header_of(path, record)?;

    let found = if file_exists { existing_header(path)? } else { None };

    let write_header = match found {
        Some(found) if found != expected => {
            return Err(Error::HeaderMismatch {
                path: path.into(),
                expected,
                found,
            });
        }
        Some(_) => false,
        None => true,
    };
    debug!(path, file_exists, write_header, "Appending CSV record");

    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .map_err(|e| Error::io(path, e))?;

    let mut writer = WriterBuilder::new()
        .has_headers(write_header) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush().map_err(|e| Error::io(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureVector, WeatherObservation};
    use std::fs;

    fn prediction() -> Prediction {
        let obs = WeatherObservation::new(30.0, 20.0, 50.0).unwrap();
        Prediction {
            raw: 4.2,
            avg_temp: 25.0,
            apparent_temp: 29.5,
            features: FeatureVector::from_observation(&obs).unwrap(),
        }
    }

    fn observation(region: &str) -> ObservationRow {
        ObservationRow {
            date: NaiveDate::from_ymd_opt(2024, 8, 3).unwrap(),
            region: region.into(),
            max_temp: 35.1,
            min_temp: 26.4,
            mean_humidity: 68.0,
            incidents: 9.0,
        }
    }

    #[test]
    fn test_print_pretty_does_not_panic() {
        print_pretty(&prediction());
    }

    #[test]
    fn test_print_json_contains_features() {
        let json = print_json(&prediction()).unwrap();
        assert!(json.contains("\"raw\": 4.2"));
        assert!(json.contains("apparent_temp"));
    }

    #[test]
    fn test_print_derived() {
        let derived = crate::thermal::derive(30.0, 150.0).unwrap();
        let record = DerivedRecord::new(30.0, 150.0, &derived);
        assert_eq!(record.rel_humidity, 100.0);

        let value: serde_json::Value = serde_json::from_str(&print_derived(&record).unwrap()).unwrap();
        assert_eq!(value["air_temp"], 30.0);
        assert_eq!(value["wet_bulb_temp"], round1(derived.wet_bulb_temp));
        assert_eq!(value["apparent_temp"], round1(derived.apparent_temp));
    }

    #[test]
    fn test_append_record_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ML_asos_dataset.csv");
        let path = path.to_str().unwrap();

        append_record(path, &observation("서울")).unwrap();
        append_record(path, &observation("부산")).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "date,region,max_temp,min_temp,mean_humidity,incidents"
        );
        assert_eq!(lines[1], "2024-08-03,서울,35.1,26.4,68.0,9.0");
    }

    #[test]
    fn test_append_refuses_foreign_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ML_asos_dataset.csv");
        let header = "일자,지역,최고기온,평균기온,최저기온,평균상대습도,환자수\n";
        let original = format!("{header}2023-08-01,서울,34.0,29.0,25.0,71,12\n");
        fs::write(&path, &original).unwrap();
        let path = path.to_str().unwrap();

        let err = append_record(path, &observation("서울")).unwrap_err();
        match err {
            Error::HeaderMismatch { expected, found, .. } => {
                assert_eq!(expected[0], "date");
                assert_eq!(found[0], "일자");
                assert_eq!(found.len(), 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(fs::read_to_string(path).unwrap(), original);
    }

    #[test]
    fn test_append_to_empty_file_writes_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ML_asos_dataset.csv");
        fs::write(&path, "").unwrap();
        let path = path.to_str().unwrap();

        append_record(path, &observation("대구")).unwrap();
        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("date,region,"));
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_prediction_record_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let path = path.to_str().unwrap();

        let req = PredictRequest::parse("30", "20", "50").unwrap();
        append_record(path, &PredictionRecord::new(&req, &prediction())).unwrap();

        let content = fs::read_to_string(path).unwrap();
        assert!(content.starts_with("timestamp,max_temp,min_temp"));
        assert!(content.lines().nth(1).unwrap().ends_with(",25.0,29.5,4.2"));
    }
}
