//! Percentile colour mapping of the smoothed density field.
//!
//! Linear min-max scaling lets a handful of very dense cells (the street in
//! front of home) flatten everything else to near-black. Instead each cell is
//! mapped to the fraction of non-zero cells at or below its own value, then
//! coloured through a ramp and screen-blended onto a dark background.
//!
//! The default ramp is matplotlib's "hot" (black, red, yellow, white) on a
//! `#12121C` background.

use image::{Rgb, RgbImage};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{HeatmapError, Result};
use crate::smoothing::SmoothedField;

/// Background behind zero-density pixels in the default ramp
pub const DEFAULT_BACKGROUND: [u8; 3] = [0x12, 0x12, 0x1c];

/// A ramp colour at a position in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    pub position: f64,
    pub color: [u8; 3],
}

impl ColorStop {
    pub const fn new(position: f64, color: [u8; 3]) -> Self {
        Self { position, color }
    }
}

/// Piecewise-linear colour ramp plus background colour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRamp {
    stops: Vec<ColorStop>,
    background: [u8; 3],
}

impl ColorRamp {
    /// Create a ramp from stops sorted by position, spanning 0 to 1.
    pub fn new(stops: Vec<ColorStop>, background: [u8; 3]) -> Result<Self> {
        let ramp = Self { stops, background };
        ramp.validate()?;
        Ok(ramp)
    }

    /// Black, red, yellow, white.
    pub fn hot() -> Self {
        Self {
            stops: vec![
                ColorStop::new(0.0, [0, 0, 0]),
                ColorStop::new(0.365, [255, 0, 0]),
                ColorStop::new(0.746, [255, 255, 0]),
                ColorStop::new(1.0, [255, 255, 255]),
            ],
            background: DEFAULT_BACKGROUND,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stops.len() < 2 {
            return Err(HeatmapError::InvalidColorRamp(format!(
                "need at least 2 stops, got {}",
                self.stops.len()
            )));
        }
        if self
            .stops
            .iter()
            .any(|s| !s.position.is_finite() || !(0.0..=1.0).contains(&s.position))
        {
            return Err(HeatmapError::InvalidColorRamp(
                "stop positions must lie in [0, 1]".to_string(),
            ));
        }
        if self
            .stops
            .windows(2)
            .any(|pair| pair[0].position >= pair[1].position)
        {
            return Err(HeatmapError::InvalidColorRamp(
                "stop positions must be strictly ascending".to_string(),
            ));
        }
        Ok(())
    }

    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    pub fn background(&self) -> [u8; 3] {
        self.background
    }

    /// Ramp colour at `t`, channels in [0, 1]. Clamps outside the stop range.
    pub fn color_at(&self, t: f64) -> [f64; 3] {
        let first = self.stops[0];
        let last = self.stops[self.stops.len() - 1];
        let (lo, hi) = if t <= first.position {
            (first, first)
        } else if t >= last.position {
            (last, last)
        } else {
            let upper = self.stops.partition_point(|s| s.position <= t);
            (self.stops[upper - 1], self.stops[upper])
        };

        let span = hi.position - lo.position;
        let f = if span > 0.0 { (t - lo.position) / span } else { 0.0 };
        let mut out = [0.0; 3];
        for (c, value) in out.iter_mut().enumerate() {
            let a = lo.color[c] as f64;
            let b = hi.color[c] as f64;
            *value = (a + (b - a) * f) / 255.0;
        }
        out
    }

    /// Final pixel colour for an intensity. Zero intensity is the background.
    pub fn composite(&self, intensity: f64) -> [u8; 3] {
        if intensity <= 0.0 {
            return self.background;
        }
        let color = self.color_at(intensity.min(1.0));
        let mut out = [0u8; 3];
        for c in 0..3 {
            let bg = self.background[c] as f64 / 255.0;
            // Screen blend
            let value = color[c] + (1.0 - color[c]) * bg;
            out[c] = (value * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        out
    }
}

impl Default for ColorRamp {
    fn default() -> Self {
        Self::hot()
    }
}

/// Percentile intensity per cell, row-major.
///
/// A non-zero cell gets the fraction of non-zero cells whose value is at most
/// its own, so the densest cell is 1 and ties share an intensity. Zero cells
/// stay 0. An all-zero field maps to all zeros.
pub fn normalize(field: &SmoothedField) -> Vec<f64> {
    let values = field.values();
    let mut sorted: Vec<f64> = values.iter().copied().filter(|&v| v > 0.0).collect();
    if sorted.is_empty() {
        return vec![0.0; values.len()];
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len() as f64;

    values
        .iter()
        .map(|&v| {
            if v > 0.0 {
                sorted.partition_point(|&s| s <= v) as f64 / n
            } else {
                0.0
            }
        })
        .collect()
}

/// Render the field to an RGB image of the same dimensions.
pub fn render(field: &SmoothedField, ramp: &ColorRamp) -> RgbImage {
    let width = field.width();
    let height = field.height();
    let mut img = RgbImage::from_pixel(width, height, Rgb(ramp.background()));

    if field.is_zero() {
        debug!("[Colormap] Empty field, {}x{} background image", width, height);
        return img;
    }

    let intensities = normalize(field);
    for (idx, &intensity) in intensities.iter().enumerate() {
        if intensity > 0.0 {
            let col = (idx % width as usize) as u32;
            let row = (idx / width as usize) as u32;
            img.put_pixel(col, row, Rgb(ramp.composite(intensity)));
        }
    }
    img
}
