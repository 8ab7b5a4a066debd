//! Activity manifest (`activities.csv`) parsing.
//!
//! Columns are looked up by header name. Strava exports repeat some headers
//! (two "Distance" columns, for instance), so the first match wins.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use log::{debug, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{HeatmapError, Result};
use crate::ActivityMeta;

pub const COLUMN_ID: &str = "Activity ID";
pub const COLUMN_DATE: &str = "Activity Date";
pub const COLUMN_TYPE: &str = "Activity Type";
pub const COLUMN_GEAR: &str = "Activity Gear";
pub const COLUMN_FILENAME: &str = "Filename";

/// Datetime formats tried in order
const DATETIME_FORMATS: &[&str] = &[
    "%b %d, %Y, %I:%M:%S %p",
    "%b %e, %Y, %I:%M:%S %p",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
];

/// One manifest row
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestEntry {
    pub meta: ActivityMeta,
    /// Track file relative to the export directory, if the activity has GPS data
    pub filename: Option<String>,
}

/// Parse an activity date in the Strava export format or ISO-8601.
pub fn parse_activity_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Read the manifest at `path`.
pub fn load_manifest(path: &Path) -> Result<Vec<ManifestEntry>> {
    let file = File::open(path)?;
    let entries = parse_manifest(file)?;
    debug!(
        "[Manifest] {} contains {} activities",
        path.display(),
        entries.len()
    );
    Ok(entries)
}

/// Parse manifest CSV from any reader. Rows with an unreadable date are skipped.
pub fn parse_manifest<R: Read>(reader: R) -> Result<Vec<ManifestEntry>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let required = |name: &str| {
        column(&headers, name)
            .ok_or_else(|| HeatmapError::Manifest(format!("missing column '{}'", name)))
    };
    let id_col = required(COLUMN_ID)?;
    let date_col = required(COLUMN_DATE)?;
    let type_col = required(COLUMN_TYPE)?;
    let gear_col = column(&headers, COLUMN_GEAR);
    let file_col = column(&headers, COLUMN_FILENAME);

    let mut entries = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record = record?;
        let id = field(&record, Some(id_col)).unwrap_or_default();
        let Some(date_text) = field(&record, Some(date_col)) else {
            warn!("[Manifest] Row {} ({}) has no date, skipping", line + 2, id);
            continue;
        };
        let Some(date) = parse_activity_date(&date_text) else {
            warn!(
                "[Manifest] Row {} ({}) has unreadable date '{}', skipping",
                line + 2,
                id,
                date_text
            );
            continue;
        };

        let mut meta = ActivityMeta::new(
            id,
            date,
            field(&record, Some(type_col)).unwrap_or_default(),
        );
        meta.gear = field(&record, gear_col);

        entries.push(ManifestEntry {
            meta,
            filename: field(&record, file_col),
        });
    }
    Ok(entries)
}

fn column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Trimmed, non-empty field value
fn field(record: &StringRecord, index: Option<usize>) -> Option<String> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
