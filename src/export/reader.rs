//! Track file decoding: GPX, FIT and their gzip-compressed variants.

use flate2::read::GzDecoder;
use fitparser::profile::MesgNum;
use fitparser::Value;
use log::{debug, info, warn};
use std::io::{Cursor, Read};
use std::path::Path;

use super::manifest::ManifestEntry;
use crate::error::{HeatmapError, Result};
use crate::{GpsPoint, Track};

/// Convert a FIT semicircle value to degrees.
#[inline]
pub fn semicircles_to_degrees(value: f64) -> f64 {
    value * 180.0 / 2_f64.powi(31)
}

/// Read the GPS points of one track file.
pub fn read_track_file(path: &Path) -> Result<Vec<GpsPoint>> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_track_bytes(&bytes, &name)
}

/// Decode track file contents. The format is chosen by `name`'s extension;
/// `.gz` is decompressed and the inner extension decides.
pub fn parse_track_bytes(bytes: &[u8], name: &str) -> Result<Vec<GpsPoint>> {
    let path = Path::new(name);
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "gpx" => parse_gpx(bytes, name),
        "fit" => parse_fit(bytes, name),
        "gz" => {
            let mut inflated = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut inflated)
                .map_err(|e| decode_error(name, e))?;
            let inner = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            parse_track_bytes(&inflated, &inner)
        }
        _ => Err(HeatmapError::UnsupportedFormat(name.to_string())),
    }
}

fn parse_gpx(bytes: &[u8], name: &str) -> Result<Vec<GpsPoint>> {
    let gpx = gpx::read(Cursor::new(bytes)).map_err(|e| decode_error(name, e))?;

    let points = gpx
        .tracks
        .iter()
        .flat_map(|track| track.segments.iter())
        .flat_map(|segment| segment.points.iter())
        .map(|waypoint| {
            let point = waypoint.point();
            GpsPoint::new(point.y(), point.x())
        })
        .collect();
    Ok(points)
}

fn parse_fit(bytes: &[u8], name: &str) -> Result<Vec<GpsPoint>> {
    let records = fitparser::de::from_bytes(bytes).map_err(|e| decode_error(name, e))?;

    let mut points = Vec::new();
    for record in records {
        if record.kind() != MesgNum::Record {
            continue;
        }
        let mut lat = None;
        let mut lon = None;
        for field in record.fields() {
            match field.name() {
                "position_lat" => lat = fit_value_to_f64(field.value()),
                "position_long" => lon = fit_value_to_f64(field.value()),
                _ => {}
            }
        }
        // Records without a fix (indoor, GPS warm-up) have no position fields
        if let (Some(lat), Some(lon)) = (lat, lon) {
            points.push(GpsPoint::new(
                semicircles_to_degrees(lat),
                semicircles_to_degrees(lon),
            ));
        }
    }
    Ok(points)
}

fn fit_value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::SInt32(v) => Some(*v as f64),
        Value::SInt64(v) => Some(*v as f64),
        Value::UInt32(v) => Some(*v as f64),
        Value::Float32(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

fn decode_error(name: &str, err: impl std::fmt::Display) -> HeatmapError {
    HeatmapError::TrackDecode {
        path: name.to_string(),
        message: err.to_string(),
    }
}

/// Load the track of every manifest entry that has a readable file.
///
/// Entries without a filename, unreadable files and tracks without points
/// are logged and skipped.
pub fn load_tracks(export_dir: &Path, entries: &[ManifestEntry]) -> Vec<Track> {
    let mut tracks = Vec::with_capacity(entries.len());
    let mut skipped = 0usize;

    for entry in entries {
        let Some(filename) = &entry.filename else {
            debug!(
                "[Export] Activity {} has no track file",
                entry.meta.activity_id
            );
            skipped += 1;
            continue;
        };

        let path = export_dir.join(filename);
        match read_track_file(&path) {
            Ok(points) if points.is_empty() => {
                debug!("[Export] {} has no GPS points", path.display());
                skipped += 1;
            }
            Ok(points) => tracks.push(Track::new(entry.meta.clone(), points)),
            Err(e) => {
                warn!("[Export] Skipping {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    info!(
        "[Export] Loaded {} tracks, skipped {} of {} activities",
        tracks.len(),
        skipped,
        entries.len()
    );
    tracks
}
