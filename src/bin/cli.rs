//! trackheat CLI - Local heatmaps from a Strava bulk export
//!
//! Usage:
//!   trackheat --activity-csv <export>/activities.csv [--year 2020] [--month 0]
//!             [--bound LAT_MIN LAT_MAX LON_MIN LON_MAX] [--zoom 12] [--sigma 2]
//!
//! `--month 0` writes one image per month, `--month 3-9` one per month from
//! March to September.
//!
//! Exits with 1 when loading or a heatmap pass fails, 2 on invalid options.

use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use trackheat::filter::parse_year;
use trackheat::{
    generate_heatmaps, load_export, output_path, save_png, BoundingBox, ExtentMode,
    FilterCriteria, HeatmapConfig, HeatmapError, MonthFilter, Result,
};

#[derive(Parser)]
#[command(name = "trackheat")]
#[command(about = "Generate a local heatmap from a Strava data export", long_about = None)]
struct Cli {
    /// The activities.csv that comes with the Strava export
    #[arg(long)]
    activity_csv: PathBuf,

    /// Year filter, e.g. 2020, or "all"
    #[arg(long, default_value = "all")]
    year: String,

    /// Month filter: "all", a month number, 0 for every month separately,
    /// or a range like 3-9 rendered month by month
    #[arg(long, default_value = "all")]
    month: String,

    /// Bounding box as LAT_MIN LAT_MAX LON_MIN LON_MAX (default: whole world)
    #[arg(
        long,
        num_args = 4,
        allow_negative_numbers = true,
        value_names = ["LAT_MIN", "LAT_MAX", "LON_MIN", "LON_MAX"]
    )]
    bound: Option<Vec<f64>>,

    /// Output name; year, month and .png are appended
    #[arg(long, default_value = "heatmap")]
    output: String,

    /// Directory the images are written to
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Zoom level 0-19 (default: 10)
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=19))]
    zoom: Option<u8>,

    /// Gaussian kernel sigma in pixels (default: 1)
    #[arg(long)]
    sigma: Option<f64>,

    /// Only activities with this gear
    #[arg(long)]
    gear: Option<String>,

    /// Only activities of this type (e.g., "Ride", "Run")
    #[arg(long)]
    activity: Option<String>,

    /// Frame the configured bounds or just the data inside them
    #[arg(long, value_enum)]
    extent: Option<ExtentArg>,

    /// Connect consecutive points of each track
    #[arg(long)]
    fill_gaps: bool,

    /// JSON file with a heatmap configuration; flags override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExtentArg {
    Bounds,
    Data,
}

impl From<ExtentArg> for ExtentMode {
    fn from(arg: ExtentArg) -> Self {
        match arg {
            ExtentArg::Bounds => ExtentMode::Bounds,
            ExtentArg::Data => ExtentMode::Data,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            error!("{} heatmap pass(es) failed", failed);
            ExitCode::FAILURE
        }
        Err(e) => exit_code(&e),
    }
}

/// 2 for bad configuration, 1 for anything else.
fn exit_code(err: &HeatmapError) -> ExitCode {
    if err.is_config_error() {
        error!("Invalid configuration: {}", err);
        ExitCode::from(2)
    } else {
        error!("{}", err);
        ExitCode::FAILURE
    }
}

/// Returns the number of failed passes.
fn run(cli: &Cli) -> Result<usize> {
    let config = build_config(cli)?;
    let criteria = FilterCriteria {
        year: parse_year(&cli.year)?,
        month: cli.month.parse::<MonthFilter>()?,
        activity_type: cli.activity.clone(),
        gear: cli.gear.clone(),
    };

    let tracks = load_export(&cli.activity_csv)?;
    let passes = generate_heatmaps(&tracks, &criteria, &config)?;
    if passes.is_empty() {
        warn!(
            "No activities matching activity {:?} and gear {:?} in month {} of {}",
            cli.activity, cli.gear, criteria.month, cli.year
        );
    }

    let mut failed = 0;
    for pass in passes {
        let path = output_path(&cli.output_dir, &cli.output, &criteria, pass.label);
        let written = pass
            .result
            .and_then(|heatmap| save_png(&heatmap.image, &path).map(|_| heatmap.track_count));
        match written {
            Ok(track_count) => info!(
                "Saved {} ({} activities) to {}",
                pass.label,
                track_count,
                path.display()
            ),
            Err(e) => {
                error!("Heatmap {} failed: {}", pass.label, e);
                failed += 1;
            }
        }
    }
    Ok(failed)
}

fn build_config(cli: &Cli) -> Result<HeatmapConfig> {
    let mut config = match &cli.config {
        Some(path) => HeatmapConfig::from_json_file(Path::new(path))?,
        None => HeatmapConfig::default(),
    };

    if let Some(bound) = &cli.bound {
        // clap guarantees exactly four values
        config.bounds = BoundingBox::new(bound[0], bound[1], bound[2], bound[3])?;
    }
    if let Some(zoom) = cli.zoom {
        config.zoom = zoom;
    }
    if let Some(sigma) = cli.sigma {
        config.sigma = sigma;
    }
    if let Some(extent) = cli.extent {
        config.extent = extent.into();
    }
    if cli.fill_gaps {
        config.fill_gaps = true;
    }

    config.validate()?;
    Ok(config)
}
