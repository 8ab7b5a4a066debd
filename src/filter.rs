//! Track selection by year, month, activity type and gear.
//!
//! Filters are resolved once into [`FilterCriteria`] and applied lazily;
//! tracks are only borrowed and keep their original order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{HeatmapError, Result};
use crate::Track;

/// Inclusive range of calendar months (1-12).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub first: u32,
    pub last: u32,
}

impl MonthRange {
    /// January to December.
    pub const FULL: MonthRange = MonthRange { first: 1, last: 12 };

    pub fn contains(&self, month: u32) -> bool {
        month >= self.first && month <= self.last
    }

    /// Parse `"a-b"`.
    ///
    /// Malformed halves fall back to the full year, reversed bounds are swapped
    /// and out-of-range months are clamped into 1-12.
    pub fn parse(text: &str) -> Result<Self> {
        let parts: Vec<&str> = text.trim().split('-').collect();
        let (first, last) = match (parts.first(), parts.last()) {
            (Some(first), Some(last)) if parts.len() >= 2 && !first.is_empty() && !last.is_empty() => {
                (*first, *last)
            }
            _ => return Ok(Self::FULL),
        };

        let parse = |value: &str| {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| HeatmapError::InvalidMonth(text.to_string()))
        };
        let (mut start, mut stop) = (parse(first)?, parse(last)?);
        if start > stop {
            std::mem::swap(&mut start, &mut stop);
        }

        Ok(Self {
            first: start.clamp(1, 12) as u32,
            last: stop.clamp(1, 12) as u32,
        })
    }
}

impl Default for MonthRange {
    fn default() -> Self {
        Self::FULL
    }
}

/// How the month of an activity is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonthFilter {
    /// No month filtering, one heatmap
    #[default]
    All,
    /// Only activities from this month (1-12)
    Only(u32),
    /// One heatmap per month present within the range
    Split(MonthRange),
}

impl MonthFilter {
    pub fn is_split(&self) -> bool {
        matches!(self, MonthFilter::Split(_))
    }

    pub fn accepts(&self, month: u32) -> bool {
        match self {
            MonthFilter::All => true,
            MonthFilter::Only(m) => *m == month,
            MonthFilter::Split(range) => range.contains(month),
        }
    }
}

impl FromStr for MonthFilter {
    type Err = HeatmapError;

    /// `"all"`, a month number, `"0"` for every month separately, or a
    /// range `"a-b"` of months rendered separately.
    fn from_str(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(MonthFilter::All);
        }
        if trimmed.contains('-') {
            return MonthRange::parse(trimmed).map(MonthFilter::Split);
        }
        match trimmed.parse::<u32>() {
            Ok(0) => Ok(MonthFilter::Split(MonthRange::FULL)),
            Ok(m) if m <= 12 => Ok(MonthFilter::Only(m)),
            _ => Err(HeatmapError::InvalidMonth(text.to_string())),
        }
    }
}

impl fmt::Display for MonthFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonthFilter::All => write!(f, "all"),
            MonthFilter::Only(m) => write!(f, "{}", m),
            MonthFilter::Split(range) => write!(f, "{}-{}", range.first, range.last),
        }
    }
}

/// Parse a year filter: `"all"` or a calendar year.
pub fn parse_year(text: &str) -> Result<Option<i32>> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|_| HeatmapError::InvalidYear(text.to_string()))
}

/// Which tracks take part in a heatmap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Exact year, or all years
    pub year: Option<i32>,
    pub month: MonthFilter,
    /// Exact, case-sensitive activity type (e.g. "Ride")
    pub activity_type: Option<String>,
    /// Exact, case-sensitive gear name
    pub gear: Option<String>,
}

impl FilterCriteria {
    pub fn matches(&self, track: &Track) -> bool {
        if let Some(year) = self.year {
            if track.year() != year {
                return false;
            }
        }
        if !self.month.accepts(track.month()) {
            return false;
        }
        if let Some(activity_type) = &self.activity_type {
            if &track.meta.activity_type != activity_type {
                return false;
            }
        }
        if let Some(gear) = &self.gear {
            if track.meta.gear.as_ref() != Some(gear) {
                return false;
            }
        }
        true
    }
}

/// Lazily select the tracks matching `criteria`, in input order.
pub fn select<'a>(
    tracks: &'a [Track],
    criteria: &'a FilterCriteria,
) -> impl Iterator<Item = &'a Track> + 'a {
    tracks.iter().filter(move |track| criteria.matches(track))
}
