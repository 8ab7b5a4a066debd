//! # trackheat
//!
//! Local heatmaps from GPS activity logs.
//!
//! This library provides:
//! - Spherical Mercator projection onto a fixed pixel grid
//! - Per-track deduplicated density accumulation
//! - Separable Gaussian smoothing
//! - Percentile (CDF) colour mapping onto a dark background
//! - One image for all activities, or one per calendar month
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use trackheat::{ActivityMeta, FilterCriteria, GpsPoint, HeatmapConfig, Track, BoundingBox};
//!
//! let date = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap();
//! let track = Track::new(
//!     ActivityMeta::new("1", date, "Ride"),
//!     vec![GpsPoint::new(48.8566, 2.3522), GpsPoint::new(48.8570, 2.3530)],
//! );
//!
//! let config = HeatmapConfig {
//!     zoom: 14,
//!     bounds: BoundingBox::new(48.8466, 48.8666, 2.3422, 2.3622).unwrap(),
//!     ..HeatmapConfig::default()
//! };
//!
//! let passes = trackheat::generate_heatmaps(&[track], &FilterCriteria::default(), &config).unwrap();
//! assert_eq!(passes.len(), 1);
//! ```

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{HeatmapError, Result};

// Web Mercator projection onto the output grid
pub mod projection;
pub use projection::{BoundingBox, Projector, MAX_LATITUDE, MAX_ZOOM, TILE_SIZE};

// Track selection by date, activity type and gear
pub mod filter;
pub use filter::{select, FilterCriteria, MonthFilter, MonthRange};

// Density accumulation
pub mod density;
pub use density::{accumulate, AccumulationStats, DensityGrid};

// Gaussian smoothing
pub mod smoothing;
pub use smoothing::{smooth, SmoothedField};

// Percentile colour mapping
pub mod colormap;
pub use colormap::{render, ColorRamp};

// Pass orchestration
pub mod heatmap;
pub use heatmap::{
    generate_heatmaps, ExtentMode, HeatmapConfig, HeatmapImage, HeatmapPass, PassLabel,
};

// Strava export reading (manifest + track files)
pub mod export;
pub use export::{load_export, load_manifest, load_tracks, ManifestEntry};

// PNG output and file naming
pub mod output;
pub use output::{output_path, output_stem, save_png};

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trackheat::GpsPoint;
/// let point = GpsPoint::new(48.8566, 2.3522); // Paris
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// Per-activity metadata taken from the export manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityMeta {
    pub activity_id: String,
    /// Local start time of the activity
    pub date: NaiveDateTime,
    /// Activity type label (e.g., "Ride", "Run")
    pub activity_type: String,
    /// Gear name, if the activity had one
    pub gear: Option<String>,
}

impl ActivityMeta {
    pub fn new(
        activity_id: impl Into<String>,
        date: NaiveDateTime,
        activity_type: impl Into<String>,
    ) -> Self {
        Self {
            activity_id: activity_id.into(),
            date,
            activity_type: activity_type.into(),
            gear: None,
        }
    }

    /// Same metadata with a gear label attached.
    pub fn with_gear(mut self, gear: impl Into<String>) -> Self {
        self.gear = Some(gear.into());
        self
    }
}

/// One recorded activity: ordered GPS points plus metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub meta: ActivityMeta,
    pub points: Vec<GpsPoint>,
}

impl Track {
    pub fn new(meta: ActivityMeta, points: Vec<GpsPoint>) -> Self {
        Self { meta, points }
    }

    pub fn year(&self) -> i32 {
        self.meta.date.year()
    }

    /// Calendar month, 1-12.
    pub fn month(&self) -> u32 {
        self.meta.date.month()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
