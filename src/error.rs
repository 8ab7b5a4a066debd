//! Unified error handling for trackheat.
//!
//! Configuration problems are caught before any pass runs. Everything raised
//! during a pass (decoding, encoding, I/O) is scoped to that pass.

use thiserror::Error;

/// Unified error type for trackheat operations.
#[derive(Debug, Error)]
pub enum HeatmapError {
    /// Bounding box violates min < max or leaves the valid coordinate range
    #[error("Invalid bounding box: {0}")]
    InvalidBounds(String),

    /// Zoom outside the web-map range
    #[error("Invalid zoom level {0}, expected 0-19")]
    InvalidZoom(u8),

    /// Gaussian kernel is undefined for sigma <= 0
    #[error("Invalid sigma {0}, must be a finite value > 0")]
    InvalidSigma(f64),

    /// Month filter text that is neither "all", a range nor a month number
    #[error("Invalid month filter '{0}'")]
    InvalidMonth(String),

    /// Year filter text that is neither "all" nor a year
    #[error("Invalid year filter '{0}'")]
    InvalidYear(String),

    /// Colour ramp stops are missing, unsorted or outside [0, 1]
    #[error("Invalid colour ramp: {0}")]
    InvalidColorRamp(String),

    /// Output grid would exceed the configured pixel budget
    #[error("Grid {width}x{height} exceeds the {max_pixels} pixel limit, lower the zoom or shrink the bounds")]
    GridTooLarge {
        width: u64,
        height: u64,
        max_pixels: u64,
    },

    /// Activity manifest is missing a column or has an unreadable row
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Track file could not be decoded
    #[error("Failed to decode track {path}: {message}")]
    TrackDecode { path: String, message: String },

    /// Track file extension not handled by the reader
    #[error("Unsupported track format: {0}")]
    UnsupportedFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config file error: {0}")]
    ConfigFile(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HeatmapError {
    /// True for errors that make every pass fail (bad configuration).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            HeatmapError::InvalidBounds(_)
                | HeatmapError::InvalidZoom(_)
                | HeatmapError::InvalidSigma(_)
                | HeatmapError::InvalidMonth(_)
                | HeatmapError::InvalidYear(_)
                | HeatmapError::InvalidColorRamp(_)
                | HeatmapError::GridTooLarge { .. }
        )
    }
}

/// Result type alias for trackheat operations.
pub type Result<T> = std::result::Result<T, HeatmapError>;
