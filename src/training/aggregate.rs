use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::SchemaError;
use crate::training::types::{NormalizedRecord, NormalizedTable, REQUIRED_COLUMNS, TrainingRecord};
use crate::training::utility::mean;

/// Running sums for one (date, region) group.
#[derive(Default)]
struct Group {
    max_temp: Vec<f64>,
    avg_temp: Vec<f64>,
    min_temp: Vec<f64>,
    mean_humidity: Vec<f64>,
    incidents: f64,
}

/// Returns the row's key and values if every required field is present.
fn complete(
    r: &NormalizedRecord,
) -> Option<((NaiveDate, String), [f64; 5])> {
    Some((
        (r.date?, r.region.clone()?),
        [
            r.max_temp?,
            r.avg_temp?,
            r.min_temp?,
            r.mean_humidity?,
            r.incidents?,
        ],
    ))
}

/// Collapses normalized rows into one [`TrainingRecord`] per (date, region).
///
/// Weather fields are averaged across the group so that multiple stations do
/// not weight a region-day more heavily; incident counts are summed.
/// Output is sorted by date, then region.
///
/// # Errors
///
/// [`SchemaError`] naming every required column absent from the table.
#[tracing::instrument(skip(table), fields(rows = table.len()))]
pub fn aggregate(table: &NormalizedTable) -> Result<Vec<TrainingRecord>, SchemaError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !table.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError::missing(missing));
    }

    let mut groups: BTreeMap<(NaiveDate, String), Group> = BTreeMap::new();
    let mut dropped = 0usize;

    for record in &table.records {
        let Some((key, [max_temp, avg_temp, min_temp, mean_humidity, incidents])) =
            complete(record)
        else {
            dropped += 1;
            continue;
        };

        let group = groups.entry(key).or_default();
        group.max_temp.push(max_temp);
        group.avg_temp.push(avg_temp);
        group.min_temp.push(min_temp);
        group.mean_humidity.push(mean_humidity);
        group.incidents += incidents;
    }

    if dropped > 0 {
        debug!(dropped, "Dropped incomplete rows");
    }

    let rows: Vec<TrainingRecord> = groups
        .into_iter()
        .map(|((date, region), g)| TrainingRecord {
            date,
            region,
            max_temp: mean(&g.max_temp),
            avg_temp: mean(&g.avg_temp),
            min_temp: mean(&g.min_temp),
            mean_humidity: mean(&g.mean_humidity),
            incidents: g.incidents,
        })
        .collect();

    info!(
        input_rows = table.len(),
        dropped,
        output_rows = rows.len(),
        "Aggregation complete"
    );
    Ok(rows)
}
