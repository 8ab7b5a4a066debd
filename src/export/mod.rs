//! Strava bulk export reading.
//!
//! An export directory holds `activities.csv` and an `activities/` folder of
//! track files. The manifest supplies the metadata the filters need; the track
//! files supply the points.

pub mod manifest;
pub mod reader;

pub use manifest::{load_manifest, parse_activity_date, parse_manifest, ManifestEntry};
pub use reader::{load_tracks, parse_track_bytes, read_track_file, semicircles_to_degrees};

use std::path::Path;

use crate::error::Result;
use crate::Track;

/// Load every track referenced by the manifest at `manifest_path`.
///
/// Track file names are resolved relative to the manifest's directory.
pub fn load_export(manifest_path: &Path) -> Result<Vec<Track>> {
    let entries = load_manifest(manifest_path)?;
    let export_dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    Ok(load_tracks(export_dir, &entries))
}
