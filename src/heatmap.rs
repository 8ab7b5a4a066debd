//! Heatmap pass orchestration.
//!
//! A pass runs accumulate -> smooth -> render over one set of tracks. The
//! "all" mode runs a single pass; the month split mode runs one pass per
//! calendar month present in the filtered tracks, in parallel, all sharing the
//! same pixel frame so the images line up.

use geo::{BoundingRect, MultiPoint, Point};
use image::RgbImage;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::colormap::{render, ColorRamp};
use crate::density::{accumulate_with, AccumulationStats};
use crate::error::{HeatmapError, Result};
use crate::filter::{select, FilterCriteria};
use crate::projection::{validate_zoom, BoundingBox, Projector, TILE_SIZE};
use crate::smoothing::{kernel_radius, smooth, validate_sigma};
use crate::Track;

/// Default pixel budget for one grid (64 Mpx)
pub const DEFAULT_MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Which geographic window the output grid covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtentMode {
    /// Exactly the configured bounding box
    Bounds,
    /// The bounding box of the selected points (clipped to the configured
    /// bounds, padded by the blur radius)
    #[default]
    Data,
}

/// Configuration for heatmap generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatmapConfig {
    /// Web-map zoom level (0-19)
    pub zoom: u8,
    /// Geographic window; points outside are ignored
    pub bounds: BoundingBox,
    /// Gaussian blur sigma in pixels
    pub sigma: f64,
    pub ramp: ColorRamp,
    pub extent: ExtentMode,
    /// Connect consecutive points of a track
    pub fill_gaps: bool,
    /// Largest grid a pass may allocate
    pub max_pixels: u64,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            zoom: 10,
            bounds: BoundingBox::WORLD,
            sigma: 1.0,
            ramp: ColorRamp::default(),
            extent: ExtentMode::default(),
            fill_gaps: false,
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl HeatmapConfig {
    /// Reject configurations no pass could run with.
    pub fn validate(&self) -> Result<()> {
        validate_zoom(self.zoom)?;
        self.bounds.validate()?;
        validate_sigma(self.sigma)?;
        self.ramp.validate()?;
        Ok(())
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: HeatmapConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}

/// Which tracks a pass covered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PassLabel {
    /// Every selected track
    All,
    /// Selected tracks from one calendar month (1-12)
    Month(u32),
}

impl fmt::Display for PassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassLabel::All => write!(f, "all"),
            PassLabel::Month(m) => write!(f, "month {:02}", m),
        }
    }
}

/// Output of one successful pass
#[derive(Debug, Clone)]
pub struct HeatmapImage {
    pub image: RgbImage,
    /// Geographic window the image covers
    pub bounds: BoundingBox,
    /// Tracks that went into the pass
    pub track_count: usize,
    pub stats: AccumulationStats,
}

/// One pass and its outcome. A failed pass does not affect the others.
#[derive(Debug)]
pub struct HeatmapPass {
    pub label: PassLabel,
    pub result: Result<HeatmapImage>,
}

/// Generate the heatmap image(s) for the tracks matching `criteria`.
///
/// Returns one pass in "all" mode and one pass per month present when the
/// month filter splits. Configuration errors fail the whole call before any
/// pass runs.
pub fn generate_heatmaps(
    tracks: &[Track],
    criteria: &FilterCriteria,
    config: &HeatmapConfig,
) -> Result<Vec<HeatmapPass>> {
    config.validate()?;
    let base = Projector::new(&config.bounds, config.zoom)?;
    let selected: Vec<&Track> = select(tracks, criteria).collect();

    let frame = match config.extent {
        ExtentMode::Bounds => base,
        ExtentMode::Data => data_frame(
            &base,
            &selected,
            kernel_radius(config.sigma),
            config.max_pixels,
        ),
    };
    if frame.pixel_count() > config.max_pixels {
        return Err(HeatmapError::GridTooLarge {
            width: frame.width() as u64,
            height: frame.height() as u64,
            max_pixels: config.max_pixels,
        });
    }

    info!(
        "[Heatmap] {} of {} tracks selected, zoom {}, {}x{} grid",
        selected.len(),
        tracks.len(),
        config.zoom,
        frame.width(),
        frame.height()
    );

    if !criteria.month.is_split() {
        let result = run_pass(PassLabel::All, &selected, &frame, config);
        return Ok(vec![HeatmapPass {
            label: PassLabel::All,
            result,
        }]);
    }

    let mut by_month: BTreeMap<u32, Vec<&Track>> = BTreeMap::new();
    for track in &selected {
        by_month.entry(track.month()).or_default().push(*track);
    }
    if by_month.is_empty() {
        warn!("[Heatmap] No activities match {:?}", criteria);
    }

    // Passes only read shared state, results keep month order
    let months: Vec<(u32, Vec<&Track>)> = by_month.into_iter().collect();
    let passes: Vec<HeatmapPass> = months
        .into_par_iter()
        .map(|(month, month_tracks)| {
            let label = PassLabel::Month(month);
            let result = run_pass(label, &month_tracks, &frame, config);
            if let Err(e) = &result {
                warn!("[Heatmap] Pass {} failed: {}", label, e);
            }
            HeatmapPass { label, result }
        })
        .collect();

    Ok(passes)
}

/// Accumulate, smooth and render one set of tracks on `frame`.
pub fn run_pass(
    label: PassLabel,
    tracks: &[&Track],
    frame: &Projector,
    config: &HeatmapConfig,
) -> Result<HeatmapImage> {
    let grid = accumulate_with(tracks.iter().copied(), frame, config.fill_gaps);
    let field = smooth(&grid, config.sigma)?;
    let image = render(&field, &config.ramp);

    info!(
        "[Heatmap] Pass {}: {} tracks, {} cells visited",
        label,
        tracks.len(),
        grid.nonzero_cells()
    );

    Ok(HeatmapImage {
        image,
        bounds: *frame.bounds(),
        track_count: tracks.len(),
        stats: *grid.stats(),
    })
}

/// Window of `base` framing every selected point inside its bounds, padded by
/// `padding` pixels.
///
/// Without such points the result is `base`, or its central tile when `base`
/// exceeds `max_pixels`.
pub fn data_frame(
    base: &Projector,
    tracks: &[&Track],
    padding: usize,
    max_pixels: u64,
) -> Projector {
    let bounds = base.bounds();
    let points: Vec<Point<f64>> = tracks
        .iter()
        .flat_map(|t| t.points.iter())
        .filter(|p| p.is_valid() && bounds.contains(p.latitude, p.longitude))
        .map(|p| Point::new(p.longitude, p.latitude))
        .collect();

    let Some(rect) = MultiPoint::from(points).bounding_rect() else {
        debug!("[Heatmap] No points inside bounds, framing the bounding box");
        return empty_frame(base, max_pixels);
    };

    // Rect x is longitude, y is latitude; north-west is the pixel origin
    let (x0, y0) = base.project(rect.max().y, rect.min().x);
    let (x1, y1) = base.project(rect.min().y, rect.max().x);

    let pad = padding as f64;
    let max_x = base.width() as f64;
    let max_y = base.height() as f64;
    let col0 = (x0.floor() - pad).clamp(0.0, max_x - 1.0);
    let row0 = (y0.floor() - pad).clamp(0.0, max_y - 1.0);
    let col1 = (x1.floor() + 1.0 + pad).clamp(col0 + 1.0, max_x);
    let row1 = (y1.floor() + 1.0 + pad).clamp(row0 + 1.0, max_y);

    base.window(
        row0 as u32,
        col0 as u32,
        (col1 - col0) as u32,
        (row1 - row0) as u32,
    )
}

/// `base` when it fits the budget, otherwise its central tile.
fn empty_frame(base: &Projector, max_pixels: u64) -> Projector {
    if base.pixel_count() <= max_pixels {
        return base.clone();
    }
    let budget_side = (max_pixels as f64).sqrt().floor() as u32;
    let width = TILE_SIZE.min(budget_side).min(base.width()).max(1);
    let height = TILE_SIZE.min(budget_side).min(base.height()).max(1);

    let col = (base.width() - width) / 2;
    let row = (base.height() - height) / 2;
    base.window(row, col, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{MonthFilter, MonthRange};
    use crate::{ActivityMeta, GpsPoint};
    use chrono::NaiveDate;

    fn track(month: u32, points: Vec<(f64, f64)>) -> Track {
        let date = NaiveDate::from_ymd_opt(2021, month, 10)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();
        Track::new(
            ActivityMeta::new(format!("m{}", month), date, "Ride"),
            points
                .into_iter()
                .map(|(lat, lon)| GpsPoint::new(lat, lon))
                .collect(),
        )
    }

    fn paris_config() -> HeatmapConfig {
        HeatmapConfig {
            zoom: 14,
            bounds: BoundingBox::new(48.8466, 48.8666, 2.3422, 2.3622).unwrap(),
            extent: ExtentMode::Bounds,
            ..HeatmapConfig::default()
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(HeatmapConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_errors_are_fatal() {
        let tracks = vec![track(1, vec![(48.8566, 2.3522)])];
        let criteria = FilterCriteria::default();

        let config = HeatmapConfig {
            sigma: 0.0,
            ..paris_config()
        };
        assert!(matches!(
            generate_heatmaps(&tracks, &criteria, &config),
            Err(HeatmapError::InvalidSigma(_))
        ));

        let config = HeatmapConfig {
            zoom: 25,
            ..paris_config()
        };
        assert!(generate_heatmaps(&tracks, &criteria, &config).is_err());
    }

    #[test]
    fn test_grid_budget() {
        let config = HeatmapConfig {
            extent: ExtentMode::Bounds,
            ..HeatmapConfig::default()
        };
        let result = generate_heatmaps(&[], &FilterCriteria::default(), &config);
        assert!(matches!(result, Err(HeatmapError::GridTooLarge { .. })));
    }

    #[test]
    fn test_data_frame_fits_points() {
        let config = HeatmapConfig {
            extent: ExtentMode::Data,
            ..HeatmapConfig::default()
        };
        let tracks = vec![track(
            5,
            vec![(48.8566, 2.3522), (48.8600, 2.3600), (48.8500, 2.3400)],
        )];
        let passes = generate_heatmaps(&tracks, &FilterCriteria::default(), &config).unwrap();
        let image = passes[0].result.as_ref().unwrap();

        let b = image.bounds;
        assert!(b.lat_min <= 48.85 && b.lat_max >= 48.86);
        assert!(b.lon_min <= 2.34 && b.lon_max >= 2.36);
        // At zoom 10 the padded frame is a few dozen pixels across
        assert!(image.image.width() < 64 && image.image.height() < 64);
    }

    #[test]
    fn test_empty_data_frame_fits_budget() {
        let base = Projector::new(&BoundingBox::WORLD, 10).unwrap();
        let frame = data_frame(&base, &[], 4, DEFAULT_MAX_PIXELS);
        assert_eq!((frame.width(), frame.height()), (TILE_SIZE, TILE_SIZE));
        // Central tile of the world sits on null island
        let (lat, lon) = frame.unproject(128.0, 128.0);
        assert!(lat.abs() < 1e-6 && lon.abs() < 1e-6);

        let tiny = data_frame(&base, &[], 4, 100);
        assert_eq!((tiny.width(), tiny.height()), (10, 10));

        let small = Projector::new(&paris_config().bounds, 14).unwrap();
        assert_eq!(data_frame(&small, &[], 4, DEFAULT_MAX_PIXELS), small);
    }

    #[test]
    fn test_split_by_month() {
        let tracks = vec![
            track(1, vec![(48.8566, 2.3522)]),
            track(3, vec![(48.8500, 2.3500)]),
            track(3, vec![(48.8600, 2.3550)]),
            track(8, vec![(48.8520, 2.3450)]),
        ];
        let criteria = FilterCriteria {
            month: MonthFilter::Split(MonthRange::FULL),
            ..Default::default()
        };
        let passes = generate_heatmaps(&tracks, &criteria, &paris_config()).unwrap();

        let labels: Vec<PassLabel> = passes.iter().map(|p| p.label).collect();
        assert_eq!(
            labels,
            vec![PassLabel::Month(1), PassLabel::Month(3), PassLabel::Month(8)]
        );
        let counts: Vec<usize> = passes
            .iter()
            .map(|p| p.result.as_ref().unwrap().track_count)
            .collect();
        assert_eq!(counts, vec![1, 2, 1]);
    }

    #[test]
    fn test_split_with_no_tracks() {
        let criteria = FilterCriteria {
            month: MonthFilter::Split(MonthRange::FULL),
            ..Default::default()
        };
        let passes = generate_heatmaps(&[], &criteria, &paris_config()).unwrap();
        assert!(passes.is_empty());
    }

    #[test]
    fn test_config_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heatmap.json");
        std::fs::write(&path, r#"{ "zoom": 12, "sigma": 2.5, "extent": "Bounds" }"#).unwrap();

        let config = HeatmapConfig::from_json_file(&path).unwrap();
        assert_eq!(config.zoom, 12);
        assert_eq!(config.sigma, 2.5);
        assert_eq!(config.extent, ExtentMode::Bounds);
        assert_eq!(config.bounds, BoundingBox::WORLD);

        std::fs::write(&path, r#"{ "zoom": 30 }"#).unwrap();
        assert!(HeatmapConfig::from_json_file(&path).is_err());
    }
}
