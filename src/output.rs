//! PNG output and file naming.

use image::RgbImage;
use log::debug;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::filter::{FilterCriteria, MonthFilter};
use crate::heatmap::PassLabel;

/// File stem for a pass: `<base>_<year|all>_<month|all>`, months two-digit.
pub fn output_stem(base: &str, criteria: &FilterCriteria, label: PassLabel) -> String {
    let year = criteria
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "all".to_string());
    let month = match (label, criteria.month) {
        (PassLabel::Month(m), _) | (PassLabel::All, MonthFilter::Only(m)) => format!("{:02}", m),
        _ => "all".to_string(),
    };
    format!("{}_{}_{}", base, year, month)
}

/// Path of the PNG for a pass inside `dir`.
pub fn output_path(dir: &Path, base: &str, criteria: &FilterCriteria, label: PassLabel) -> PathBuf {
    dir.join(format!("{}.png", output_stem(base, criteria, label)))
}

/// Encode `image` as PNG at `path`, creating parent directories.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    image.save_with_format(path, image::ImageFormat::Png)?;
    debug!(
        "[Output] Wrote {}x{} image to {}",
        image.width(),
        image.height(),
        path.display()
    );
    Ok(())
}
