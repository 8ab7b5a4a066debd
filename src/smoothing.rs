//! Separable Gaussian smoothing of the density grid.
//!
//! The kernel is truncated at 4 sigma and normalized over its support. Cells
//! beyond the grid edge count as zero, so mass near the border leaks out
//! instead of piling up.

use crate::density::DensityGrid;
use crate::error::{HeatmapError, Result};

/// Kernel half-width in units of sigma
pub const TRUNCATE_SIGMAS: f64 = 4.0;

/// Smoothed density, same layout as [`DensityGrid`].
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothedField {
    width: u32,
    height: u32,
    values: Vec<f64>,
}

impl SmoothedField {
    /// Field from row-major values.
    ///
    /// Returns `None` when `values` does not hold `width * height` entries.
    pub fn from_values(width: u32, height: u32, values: Vec<f64>) -> Option<Self> {
        (values.len() == width as usize * height as usize).then_some(Self {
            width,
            height,
            values,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.values[row * self.width as usize + col]
    }

    /// Row-major values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|&v| v == 0.0)
    }
}

/// Check sigma defines a Gaussian.
pub fn validate_sigma(sigma: f64) -> Result<()> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(HeatmapError::InvalidSigma(sigma));
    }
    Ok(())
}

/// Kernel half-width in cells for a sigma. Saturates for huge sigmas.
pub fn kernel_radius(sigma: f64) -> usize {
    (TRUNCATE_SIGMAS * sigma).ceil() as usize
}

/// Normalized 1D Gaussian kernel of length `2 * radius + 1`.
///
/// A sigma too small for `2 * sigma^2` to be representable gives the identity
/// kernel.
pub fn gaussian_kernel(sigma: f64, radius: usize) -> Vec<f64> {
    let two_sigma_sq = 2.0 * sigma * sigma;
    if !(two_sigma_sq > 0.0) {
        let mut kernel = vec![0.0; 2 * radius + 1];
        kernel[radius] = 1.0;
        return kernel;
    }

    let center = radius as f64;
    let mut kernel: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / two_sigma_sq).exp()
        })
        .collect();
    // The centre tap is 1, so the sum is never zero
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Blur the grid with a Gaussian of standard deviation `sigma` pixels.
pub fn smooth(grid: &DensityGrid, sigma: f64) -> Result<SmoothedField> {
    validate_sigma(sigma)?;

    let width = grid.width() as usize;
    let height = grid.height() as usize;
    // Taps beyond the longest grid axis never land on a cell
    let radius = kernel_radius(sigma).min(width.max(height));
    let kernel = gaussian_kernel(sigma, radius);

    let input: Vec<f64> = grid.counts().iter().map(|&c| c as f64).collect();

    // Horizontal pass (along columns of each row)
    let mut horizontal = vec![0.0; input.len()];
    for row in 0..height {
        let src = &input[row * width..(row + 1) * width];
        let dst = &mut horizontal[row * width..(row + 1) * width];
        convolve_line(src, dst, 1, width, &kernel, radius);
    }

    // Vertical pass, strided by one row
    let mut values = vec![0.0; input.len()];
    for col in 0..width {
        convolve_strided(&horizontal, &mut values, col, width, height, &kernel, radius);
    }

    Ok(SmoothedField {
        width: grid.width(),
        height: grid.height(),
        values,
    })
}

/// Scatter each non-zero source cell into `dst`. Out-of-range taps are dropped.
fn convolve_line(src: &[f64], dst: &mut [f64], stride: usize, len: usize, kernel: &[f64], radius: usize) {
    for i in 0..len {
        let value = src[i * stride];
        if value == 0.0 {
            continue;
        }
        let lo = i.saturating_sub(radius);
        let hi = (i + radius).min(len - 1);
        for j in lo..=hi {
            dst[j * stride] += value * kernel[j + radius - i];
        }
    }
}

fn convolve_strided(
    src: &[f64],
    dst: &mut [f64],
    col: usize,
    width: usize,
    height: usize,
    kernel: &[f64],
    radius: usize,
) {
    convolve_line(&src[col..], &mut dst[col..], width, height, kernel, radius);
}
