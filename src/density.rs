//! Per-pixel visit density accumulation.
//!
//! Every track adds at most 1 to each cell it touches, however many points it
//! recorded there. A rider waiting at a traffic light for two minutes weighs
//! the same as one passing through.
//!
//! Cell indices are the floor of the projected coordinates (see
//! [`Projector::cell`]); the grid is row-major with rows along the latitude axis.

use log::debug;
use std::collections::HashSet;

use crate::projection::Projector;
use crate::Track;

/// Longest segment, in pixels, bridged when gap filling is enabled. Longer
/// jumps are recording gaps (tunnels, paused recordings) and stay unconnected.
pub const MAX_FILL_PIXELS: f64 = 64.0;

/// Counters gathered while accumulating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccumulationStats {
    /// Tracks visited
    pub tracks: usize,
    /// Points visited
    pub points: usize,
    /// Points dropped for falling outside the grid or being non-finite
    pub discarded_points: usize,
}

/// Visit counts, one cell per output pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct DensityGrid {
    width: u32,
    height: u32,
    counts: Vec<u32>,
    stats: AccumulationStats,
}

impl DensityGrid {
    /// Zero-initialized grid.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            counts: vec![0; width as usize * height as usize],
            stats: AccumulationStats::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Count at `(row, col)`.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.counts[row * self.width as usize + col]
    }

    /// Row-major counts.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn stats(&self) -> &AccumulationStats {
        &self.stats
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    pub fn max(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    pub fn nonzero_cells(&self) -> usize {
        self.counts.iter().filter(|&&c| c > 0).count()
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        row * self.width as usize + col
    }
}

/// Accumulate tracks onto the projector's grid, one count per track per cell.
pub fn accumulate<'a, I>(tracks: I, projector: &Projector) -> DensityGrid
where
    I: IntoIterator<Item = &'a Track>,
{
    accumulate_with(tracks, projector, false)
}

/// Like [`accumulate`], optionally also counting the cells crossed between
/// consecutive points (segments up to [`MAX_FILL_PIXELS`] long).
pub fn accumulate_with<'a, I>(tracks: I, projector: &Projector, fill_gaps: bool) -> DensityGrid
where
    I: IntoIterator<Item = &'a Track>,
{
    let mut grid = DensityGrid::new(projector.width(), projector.height());
    let mut stats = AccumulationStats::default();
    let mut visited: HashSet<usize> = HashSet::new();

    for track in tracks {
        stats.tracks += 1;
        visited.clear();
        let mut prev: Option<(f64, f64)> = None;

        for point in &track.points {
            stats.points += 1;
            if !point.latitude.is_finite() || !point.longitude.is_finite() {
                stats.discarded_points += 1;
                prev = None;
                continue;
            }

            let (x, y) = projector.project(point.latitude, point.longitude);
            match projector.cell_at(x, y) {
                Some((row, col)) => {
                    visited.insert(grid.index(row, col));
                }
                None => stats.discarded_points += 1,
            }

            if fill_gaps {
                if let Some((px, py)) = prev {
                    fill_segment(&grid, projector, (px, py), (x, y), &mut visited);
                }
                prev = Some((x, y));
            }
        }

        for &idx in &visited {
            grid.counts[idx] += 1;
        }
    }

    grid.stats = stats;
    debug!(
        "[Density] {} tracks, {} points ({} discarded), {} cells hit on {}x{} grid",
        stats.tracks,
        stats.points,
        stats.discarded_points,
        grid.nonzero_cells(),
        grid.width,
        grid.height
    );
    grid
}

/// Mark the cells strictly between two projected points, sampled at half-pixel steps.
fn fill_segment(
    grid: &DensityGrid,
    projector: &Projector,
    (x0, y0): (f64, f64),
    (x1, y1): (f64, f64),
    visited: &mut HashSet<usize>,
) {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let length = dx.abs().max(dy.abs());
    if length <= 1.0 || length > MAX_FILL_PIXELS {
        return;
    }

    let steps = (length * 2.0).ceil() as usize;
    for i in 1..steps {
        let t = i as f64 / steps as f64;
        if let Some((row, col)) = projector.cell_at(x0 + dx * t, y0 + dy * t) {
            visited.insert(grid.index(row, col));
        }
    }
}
