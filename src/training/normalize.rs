//! Canonicalizes heterogeneous source tables.
//!
//! Historical exports and the live ASOS extract disagree on column names,
//! date representation and region field. Everything downstream sees only
//! [`NormalizedTable`].

use std::collections::BTreeSet;

use chrono::{NaiveDate, TimeDelta};
use tracing::debug;

use crate::reader::{RawRecord, RawTable};
use crate::schema::{APPARENT_TEMP, AVG_TEMP, MAX_TEMP, MEAN_HUMIDITY, MIN_TEMP};
use crate::thermal::clip_humidity;
use crate::training::types::{DATE, INCIDENTS, NormalizedRecord, NormalizedTable, REGION};

/// Source column names (after whitespace cleanup) and their canonical names.
static COLUMN_ALIASES: &[(&str, &str)] = &[
    ("일자", DATE),
    ("지역", REGION),
    ("최고체감온도(°C)", APPARENT_TEMP),
    ("최고기온(°C)", MAX_TEMP),
    ("평균기온(°C)", AVG_TEMP),
    ("최저기온(°C)", MIN_TEMP),
    ("평균상대습도(%)", MEAN_HUMIDITY),
    ("환자수", INCIDENTS),
];

/// Legacy timestamp column used when no `date` column exists.
const LEGACY_DATETIME: &str = "일시";

/// Legacy region columns, in priority order.
static LEGACY_REGIONS: &[&str] = &["광역자치단체", "시도"];

/// Numeric columns coerced to `f64`.
static NUMERIC_COLUMNS: &[&str] = &[
    APPARENT_TEMP,
    MAX_TEMP,
    AVG_TEMP,
    MIN_TEMP,
    MEAN_HUMIDITY,
    INCIDENTS,
];

/// Removes surrounding whitespace, line breaks, interior spaces and a stray BOM.
pub fn clean_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{feff}')
        .collect()
}

fn canonical_name(cleaned: &str) -> &str {
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == cleaned)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(cleaned)
}

/// Parses a cell as a finite number. Empty, `NaN` and garbage become `None`.
pub fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Converts a spreadsheet serial day number (days since 1899-12-30).
pub fn date_from_serial(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = TimeDelta::try_days(serial.floor() as i64)?;
    epoch.checked_add_signed(days)
}

/// Forgiving date parser.
///
/// Accepts `YYYYMMDD`, year-first dates with any separator
/// (`2023-08-01`, `2023/8/1`, `2023. 8. 1.`), month-first US dates
/// (`08/01/2023`), and any of those followed by a time of day.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let groups: Vec<&str> = cell
        .split(|c: char| !c.is_ascii_digit())
        .filter(|g| !g.is_empty())
        .collect();

    fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
    }

    match groups.as_slice() {
        &[compact, ..] if compact.len() == 8 => {
            ymd(&compact[..4], &compact[4..6], &compact[6..8])
        }
        &[y, m, d, ..] if y.len() == 4 => ymd(y, m, d),
        &[m, d, y, ..] if y.len() == 4 => ymd(y, m, d),
        _ => None,
    }
}

/// Builds the `date` value for every row.
///
/// A canonical `date` column wins. Otherwise the legacy timestamp column is
/// used: if every non-empty cell is numeric the column is a spreadsheet
/// serial, else each cell is parsed as free-form text.
fn derive_dates(rows: &[RawRecord], columns: &BTreeSet<String>) -> Option<Vec<Option<NaiveDate>>> {
    if columns.contains(DATE) {
        return Some(
            rows.iter()
                .map(|r| r.get(DATE).and_then(|c| parse_date(c)))
                .collect(),
        );
    }

    if !columns.contains(LEGACY_DATETIME) {
        return None;
    }

    let numeric = rows
        .iter()
        .filter_map(|r| r.get(LEGACY_DATETIME))
        .filter(|c| !c.trim().is_empty())
        .all(|c| c.trim().parse::<f64>().is_ok());
    debug!(numeric, "Deriving date from legacy timestamp column");

    Some(
        rows.iter()
            .map(|r| {
                let cell = r.get(LEGACY_DATETIME)?;
                if numeric {
                    parse_number(cell).and_then(date_from_serial)
                } else {
                    parse_date(cell)
                }
            })
            .collect(),
    )
}

/// First present region column, canonical before legacy.
fn region_column(columns: &BTreeSet<String>) -> Option<&'static str> {
    std::iter::once(REGION)
        .chain(LEGACY_REGIONS.iter().copied())
        .find(|c| columns.contains(*c))
}

/// Canonicalizes a raw table.
///
/// Rows with missing date or region are kept; the aggregator drops them.
#[tracing::instrument(skip(raw), fields(rows = raw.len()))]
pub fn normalize(raw: &RawTable) -> NormalizedTable {
    // Rename columns; the first source column claiming a canonical name wins.
    let mut renames: Vec<(String, String)> = Vec::new();
    let mut columns = BTreeSet::new();
    for header in &raw.headers {
        let canonical = canonical_name(&clean_column_name(header)).to_string();
        if columns.insert(canonical.clone()) {
            renames.push((header.clone(), canonical));
        }
    }

    let rows: Vec<RawRecord> = raw
        .records
        .iter()
        .map(|record| {
            renames
                .iter()
                .filter_map(|(from, to)| record.get(from).map(|v| (to.clone(), v.clone())))
                .collect()
        })
        .collect();

    let dates = derive_dates(&rows, &columns);
    let region_col = region_column(&columns);

    let mut out = BTreeSet::new();
    if dates.is_some() {
        out.insert(DATE.to_string());
    }
    if region_col.is_some() {
        out.insert(REGION.to_string());
    }
    for col in NUMERIC_COLUMNS {
        if columns.contains(*col) {
            out.insert(col.to_string());
        }
    }
    if out.contains(MAX_TEMP) && out.contains(MIN_TEMP) {
        out.insert(AVG_TEMP.to_string());
    }

    let records = rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let number = |col: &str| row.get(col).and_then(|c| parse_number(c));

            let max_temp = number(MAX_TEMP);
            let min_temp = number(MIN_TEMP);
            let avg_temp = number(AVG_TEMP).or(match (max_temp, min_temp) {
                (Some(max), Some(min)) => Some((max + min) / 2.0),
                _ => None,
            });

            NormalizedRecord {
                date: dates.as_ref().and_then(|d| d[i]),
                region: region_col
                    .and_then(|col| row.get(col))
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty()),
                apparent_temp: number(APPARENT_TEMP),
                max_temp,
                avg_temp,
                min_temp,
                mean_humidity: number(MEAN_HUMIDITY).map(clip_humidity),
                // A negative count is treated as missing.
                incidents: number(INCIDENTS).filter(|n| *n >= 0.0),
            }
        })
        .collect();

    let dropped: Vec<&String> = columns.iter().filter(|c| !out.contains(*c)).collect();
    debug!(columns = ?out, ?dropped, "Table normalized");

    NormalizedTable {
        columns: out,
        records,
    }
}
