//! Web Mercator projection onto the heatmap pixel grid.
//!
//! Global pixel coordinates follow the slippy-map convention: the world is
//! `256 * 2^zoom` pixels wide, x grows east from the antimeridian and y grows
//! south from the northern projection limit. A [`Projector`] translates them so
//! the top-left corner of a bounding box lands on pixel (0, 0).

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{HeatmapError, Result};

/// Tile size in pixels (standard web-map tiles)
pub const TILE_SIZE: u32 = 256;

/// Highest supported zoom level
pub const MAX_ZOOM: u8 = 19;

/// Latitude limit of the square web-map world. Points beyond are clamped.
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Geographic window rendered by a heatmap, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// The whole world.
    pub const WORLD: BoundingBox = BoundingBox {
        lat_min: -90.0,
        lat_max: 90.0,
        lon_min: -180.0,
        lon_max: 180.0,
    };

    /// Create a validated bounding box.
    pub fn new(lat_min: f64, lat_max: f64, lon_min: f64, lon_max: f64) -> Result<Self> {
        let bounds = Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    /// Check min < max on both axes and that both axes stay on the globe.
    pub fn validate(&self) -> Result<()> {
        let values = [self.lat_min, self.lat_max, self.lon_min, self.lon_max];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(HeatmapError::InvalidBounds(format!(
                "non-finite coordinate in {:?}",
                values
            )));
        }
        if self.lat_min >= self.lat_max {
            return Err(HeatmapError::InvalidBounds(format!(
                "lat_min {} must be below lat_max {}",
                self.lat_min, self.lat_max
            )));
        }
        if self.lon_min >= self.lon_max {
            return Err(HeatmapError::InvalidBounds(format!(
                "lon_min {} must be below lon_max {}",
                self.lon_min, self.lon_max
            )));
        }
        if self.lat_min < -90.0 || self.lat_max > 90.0 {
            return Err(HeatmapError::InvalidBounds(format!(
                "latitude range {}..{} outside -90..90",
                self.lat_min, self.lat_max
            )));
        }
        if self.lon_min < -180.0 || self.lon_max > 180.0 {
            return Err(HeatmapError::InvalidBounds(format!(
                "longitude range {}..{} outside -180..180",
                self.lon_min, self.lon_max
            )));
        }
        Ok(())
    }

    /// Inclusive containment test.
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.lat_min
            && latitude <= self.lat_max
            && longitude >= self.lon_min
            && longitude <= self.lon_max
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::WORLD
    }
}

/// Check a zoom level against the supported range.
pub fn validate_zoom(zoom: u8) -> Result<()> {
    if zoom > MAX_ZOOM {
        return Err(HeatmapError::InvalidZoom(zoom));
    }
    Ok(())
}

// ============================================================================
// Web Mercator Math
// ============================================================================

/// World width (and height) in pixels at a zoom level
#[inline]
pub fn world_size(zoom: u8) -> f64 {
    TILE_SIZE as f64 * 2.0_f64.powi(zoom as i32)
}

/// Clamp a latitude into the range the projection is defined on
#[inline]
pub fn clamp_latitude(lat: f64) -> f64 {
    lat.clamp(-MAX_LATITUDE, MAX_LATITUDE)
}

/// Convert longitude to global pixel X at given zoom
#[inline]
pub fn lon_to_pixel_x(lon: f64, zoom: u8) -> f64 {
    (lon + 180.0) / 360.0 * world_size(zoom)
}

/// Convert latitude to global pixel Y at given zoom (latitude is clamped)
#[inline]
pub fn lat_to_pixel_y(lat: f64, zoom: u8) -> f64 {
    let lat_rad = clamp_latitude(lat).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * world_size(zoom)
}

/// Convert global pixel X to longitude
#[inline]
pub fn pixel_x_to_lon(x: f64, zoom: u8) -> f64 {
    x / world_size(zoom) * 360.0 - 180.0
}

/// Convert global pixel Y to latitude
#[inline]
pub fn pixel_y_to_lat(y: f64, zoom: u8) -> f64 {
    let lat_rad = (PI * (1.0 - 2.0 * y / world_size(zoom))).sinh().atan();
    lat_rad.to_degrees()
}

// ============================================================================
// Projector
// ============================================================================

/// Maps geographic coordinates onto the pixel grid of one bounding box.
///
/// Grid cells are addressed as `(row, col)`: rows follow the latitude axis
/// (row 0 is the northern edge), columns the longitude axis (column 0 is the
/// western edge). Cell indices are the floor of the projected coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Projector {
    zoom: u8,
    bounds: BoundingBox,
    origin_x: f64,
    origin_y: f64,
    width: u32,
    height: u32,
}

impl Projector {
    /// Build the projector for a bounding box at a zoom level.
    pub fn new(bounds: &BoundingBox, zoom: u8) -> Result<Self> {
        validate_zoom(zoom)?;
        bounds.validate()?;

        let origin_x = lon_to_pixel_x(bounds.lon_min, zoom);
        let origin_y = lat_to_pixel_y(bounds.lat_max, zoom);
        let extent_x = lon_to_pixel_x(bounds.lon_max, zoom) - origin_x;
        let extent_y = lat_to_pixel_y(bounds.lat_min, zoom) - origin_y;

        Ok(Self {
            zoom,
            bounds: *bounds,
            origin_x,
            origin_y,
            width: (extent_x.round() as u32).max(1),
            height: (extent_y.round() as u32).max(1),
        })
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    /// Grid width in pixels (longitude axis)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels (latitude axis)
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Fractional pixel coordinates `(x, y)` relative to the grid origin.
    ///
    /// Points outside the box yield coordinates outside `[0, width) x [0, height)`.
    #[inline]
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        (
            lon_to_pixel_x(lon, self.zoom) - self.origin_x,
            lat_to_pixel_y(lat, self.zoom) - self.origin_y,
        )
    }

    /// Inverse of [`Projector::project`].
    #[inline]
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        (
            pixel_y_to_lat(y + self.origin_y, self.zoom),
            pixel_x_to_lon(x + self.origin_x, self.zoom),
        )
    }

    /// Grid cell `(row, col)` containing a geographic point, if inside the grid.
    #[inline]
    pub fn cell(&self, lat: f64, lon: f64) -> Option<(usize, usize)> {
        let (x, y) = self.project(lat, lon);
        self.cell_at(x, y)
    }

    /// Grid cell `(row, col)` containing fractional pixel coordinates.
    #[inline]
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        // Also rejects NaN
        if !(x >= 0.0 && y >= 0.0) {
            return None;
        }
        let col = x.floor() as u64;
        let row = y.floor() as u64;
        if col >= self.width as u64 || row >= self.height as u64 {
            return None;
        }
        Some((row as usize, col as usize))
    }

    /// Sub-window of this grid starting at `(row, col)`, sharing pixel alignment.
    ///
    /// The window is clipped to the grid; it is never empty.
    pub fn window(&self, row: u32, col: u32, width: u32, height: u32) -> Projector {
        let col = col.min(self.width - 1);
        let row = row.min(self.height - 1);
        let width = width.clamp(1, self.width - col);
        let height = height.clamp(1, self.height - row);

        let origin_x = self.origin_x + col as f64;
        let origin_y = self.origin_y + row as f64;
        let lon_min = pixel_x_to_lon(origin_x, self.zoom);
        let lon_max = pixel_x_to_lon(origin_x + width as f64, self.zoom);
        let lat_max = pixel_y_to_lat(origin_y, self.zoom);
        let lat_min = pixel_y_to_lat(origin_y + height as f64, self.zoom);

        Projector {
            zoom: self.zoom,
            bounds: BoundingBox {
                lat_min: lat_min.max(self.bounds.lat_min),
                lat_max: lat_max.min(self.bounds.lat_max),
                lon_min: lon_min.max(self.bounds.lon_min),
                lon_max: lon_max.min(self.bounds.lon_max),
            },
            origin_x,
            origin_y,
            width,
            height,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
