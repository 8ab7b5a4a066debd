//! End-to-end tests for the projection -> density -> smoothing -> colormap pipeline

use chrono::NaiveDate;
use trackheat::colormap::normalize;
use trackheat::*;

const PARIS: (f64, f64) = (48.8566, 2.3522);

fn make_track(id: &str, month: u32, points: Vec<(f64, f64)>) -> Track {
    let date = NaiveDate::from_ymd_opt(2020, month, 12)
        .unwrap()
        .and_hms_opt(9, 30, 0)
        .unwrap();
    Track::new(
        ActivityMeta::new(id, date, "Ride"),
        points
            .iter()
            .map(|(lat, lon)| GpsPoint::new(*lat, *lon))
            .collect(),
    )
}

/// East-west line of `n` points starting at `start`
fn line(start: (f64, f64), n: usize, step: f64) -> Vec<(f64, f64)> {
    (0..n).map(|i| (start.0, start.1 + i as f64 * step)).collect()
}

fn paris_bounds() -> BoundingBox {
    BoundingBox::new(
        PARIS.0 - 0.01,
        PARIS.0 + 0.01,
        PARIS.1 - 0.01,
        PARIS.1 + 0.01,
    )
    .unwrap()
}

fn paris_config() -> HeatmapConfig {
    HeatmapConfig {
        zoom: 14,
        bounds: paris_bounds(),
        sigma: 1.0,
        extent: ExtentMode::Bounds,
        ..HeatmapConfig::default()
    }
}

fn single_image(tracks: &[Track], config: &HeatmapConfig) -> HeatmapImage {
    let mut passes = generate_heatmaps(tracks, &FilterCriteria::default(), config).unwrap();
    assert_eq!(passes.len(), 1);
    passes.remove(0).result.unwrap()
}

/// Sum of channel values above the background over the whole image
fn brightness(image: &HeatmapImage, background: [u8; 3]) -> u64 {
    image
        .image
        .pixels()
        .map(|p| {
            (0..3)
                .map(|c| p.0[c].saturating_sub(background[c]) as u64)
                .sum::<u64>()
        })
        .sum()
}

#[test]
fn test_projection_round_trip() {
    let projector = Projector::new(&BoundingBox::WORLD, 12).unwrap();
    let mut lat = -80.0;
    while lat <= 80.0 {
        let mut lon = -179.0;
        while lon <= 179.0 {
            let (x, y) = projector.project(lat, lon);
            let (lat2, lon2) = projector.unproject(x, y);
            assert!((lat - lat2).abs() < 1e-9, "lat {} -> {}", lat, lat2);
            assert!((lon - lon2).abs() < 1e-9, "lon {} -> {}", lon, lon2);
            lon += 7.3;
        }
        lat += 4.1;
    }
}

#[test]
fn test_one_count_per_track_per_cell() {
    let projector = Projector::new(&paris_bounds(), 14).unwrap();
    let sparse = make_track("sparse", 4, vec![PARIS; 10]);
    let dense = make_track("dense", 4, vec![PARIS; 10_000]);

    let a = accumulate([&sparse], &projector);
    let b = accumulate([&dense], &projector);
    assert_eq!(a.counts(), b.counts());
    assert_eq!(a.total(), 1);

    // Three tracks over the same cell give a count of three, no matter their length
    let tracks = vec![sparse, dense, make_track("third", 4, vec![PARIS; 3])];
    let grid = accumulate(&tracks, &projector);
    let (row, col) = projector.cell(PARIS.0, PARIS.1).unwrap();
    assert_eq!(grid.get(row, col), 3);
    assert_eq!(grid.max(), 3);
    assert_eq!(grid.stats().points, 10_013);
}

#[test]
fn test_empty_input_is_background() {
    let config = paris_config();
    let projector = Projector::new(&config.bounds, config.zoom).unwrap();

    let first = single_image(&[], &config);
    let second = single_image(&[], &config);

    assert_eq!(
        first.image.dimensions(),
        (projector.width(), projector.height())
    );
    assert!(first
        .image
        .pixels()
        .all(|p| p.0 == config.ramp.background()));
    assert_eq!(first.image, second.image);
    assert_eq!(first.track_count, 0);
}

#[test]
fn test_no_match_with_default_config() {
    let config = HeatmapConfig::default();
    let tracks = vec![make_track("1", 5, vec![PARIS; 3])];
    let criteria = FilterCriteria {
        year: Some(1999),
        ..Default::default()
    };

    for input in [&tracks[..], &[]] {
        let passes = generate_heatmaps(input, &criteria, &config).unwrap();
        assert_eq!(passes.len(), 1);
        let heatmap = passes[0].result.as_ref().unwrap();
        assert_eq!(heatmap.track_count, 0);
        assert_eq!(heatmap.image.dimensions(), (TILE_SIZE, TILE_SIZE));
        assert!(heatmap
            .image
            .pixels()
            .all(|p| p.0 == config.ramp.background()));
    }
}

#[test]
fn test_smoothing_conserves_interior_mass() {
    let projector = Projector::new(&paris_bounds(), 14).unwrap();
    let track = make_track("1", 6, line(PARIS, 5, 0.0002));
    let grid = accumulate([&track], &projector);

    for sigma in [0.5, 1.0, 2.5] {
        let field = smooth(&grid, sigma).unwrap();
        assert!(
            (field.total() - grid.total() as f64).abs() < 1e-6,
            "sigma {}: {} vs {}",
            sigma,
            field.total(),
            grid.total()
        );
    }
}

#[test]
fn test_normalization_is_monotonic() {
    let projector = Projector::new(&paris_bounds(), 14).unwrap();
    let tracks: Vec<Track> = (0..4)
        .map(|i| make_track(&i.to_string(), 6, line(PARIS, 10 + i * 10, 0.0002)))
        .collect();
    let field = smooth(&accumulate(&tracks, &projector), 1.5).unwrap();
    let intensities = normalize(&field);

    let mut pairs: Vec<(f64, f64)> = field
        .values()
        .iter()
        .copied()
        .zip(intensities.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    for w in pairs.windows(2) {
        assert!(w[0].1 <= w[1].1);
    }
    assert!(intensities.iter().all(|&t| (0.0..=1.0).contains(&t)));
    assert_eq!(intensities.iter().cloned().fold(0.0, f64::max), 1.0);
}

#[test]
fn test_paris_single_point() {
    let config = paris_config();
    let projector = Projector::new(&config.bounds, config.zoom).unwrap();
    let track = make_track("1", 5, vec![PARIS; 100]);

    let heatmap = single_image(&[track], &config);
    let (row, col) = projector.cell(PARIS.0, PARIS.1).unwrap();

    // Peak cell is the top of the ramp
    assert_eq!(
        heatmap.image.get_pixel(col as u32, row as u32).0,
        [255, 255, 255]
    );
    // Far corner stays background
    assert_eq!(heatmap.image.get_pixel(0, 0).0, config.ramp.background());
    assert_eq!(heatmap.stats.points, 100);
}

#[test]
fn test_paris_segments_cluster() {
    let config = paris_config();
    let background = config.ramp.background();
    let projector = Projector::new(&config.bounds, config.zoom).unwrap();
    let segment = vec![PARIS, (PARIS.0 + 0.0001, PARIS.1 + 0.0001)];
    let tracks: Vec<Track> = (0..3)
        .map(|i| make_track(&i.to_string(), 5, segment.clone()))
        .collect();

    let heatmap = single_image(&tracks, &config);
    let (row, col) = projector.cell(PARIS.0, PARIS.1).unwrap();

    // Brightest pixel sits within a couple of pixels of Paris
    let (bx, by, _) = heatmap
        .image
        .enumerate_pixels()
        .max_by_key(|(_, _, p)| p.0.iter().map(|&c| c as u32).sum::<u32>())
        .unwrap();
    assert!((bx as i64 - col as i64).abs() <= 2, "x {} vs {}", bx, col);
    assert!((by as i64 - row as i64).abs() <= 2, "y {} vs {}", by, row);

    // Non-background pixels stay inside the kernel footprint
    let radius = smoothing::kernel_radius(config.sigma) as i64 + 2;
    for (x, y, p) in heatmap.image.enumerate_pixels() {
        if p.0 != background {
            assert!((x as i64 - col as i64).abs() <= radius);
            assert!((y as i64 - row as i64).abs() <= radius);
        }
    }

    // Stacking the same segment never dims the image
    let one = brightness(&single_image(&tracks[..1], &config), background);
    let two = brightness(&single_image(&tracks[..2], &config), background);
    let three = brightness(&single_image(&tracks[..3], &config), background);
    assert!(one > 0);
    assert!(one <= two && two <= three);
}

#[test]
fn test_more_tracks_brighter() {
    let config = paris_config();
    let background = config.ramp.background();
    // Parallel lines far enough apart that their kernels do not overlap
    let tracks: Vec<Track> = (0..3)
        .map(|i| {
            let start = (PARIS.0 - 0.004 + i as f64 * 0.003, PARIS.1 - 0.005);
            make_track(&i.to_string(), 5, line(start, 40, 0.00025))
        })
        .collect();

    let one = brightness(&single_image(&tracks[..1], &config), background);
    let two = brightness(&single_image(&tracks[..2], &config), background);
    let three = brightness(&single_image(&tracks[..3], &config), background);
    assert!(one > 0);
    assert!(one < two, "{} < {}", one, two);
    assert!(two < three, "{} < {}", two, three);
}

#[test]
fn test_months_are_isolated() {
    let config = paris_config();
    let projector = Projector::new(&config.bounds, config.zoom).unwrap();
    let feb = (PARIS.0 - 0.006, PARIS.1 - 0.006);
    let may = (PARIS.0 + 0.006, PARIS.1 + 0.006);
    let sep = (PARIS.0 - 0.006, PARIS.1 + 0.006);

    let tracks = vec![
        make_track("feb", 2, vec![feb]),
        make_track("may", 5, vec![may]),
        make_track("sep", 9, vec![sep]),
    ];
    let criteria = FilterCriteria {
        month: MonthFilter::Split(MonthRange::FULL),
        ..Default::default()
    };

    let passes = generate_heatmaps(&tracks, &criteria, &config).unwrap();
    let labels: Vec<PassLabel> = passes.iter().map(|p| p.label).collect();
    assert_eq!(
        labels,
        vec![PassLabel::Month(2), PassLabel::Month(5), PassLabel::Month(9)]
    );

    let may_image = &passes[1].result.as_ref().unwrap().image;
    let (row, col) = projector.cell(feb.0, feb.1).unwrap();
    assert_eq!(
        may_image.get_pixel(col as u32, row as u32).0,
        config.ramp.background()
    );
    let (row, col) = projector.cell(may.0, may.1).unwrap();
    assert_eq!(may_image.get_pixel(col as u32, row as u32).0, [255, 255, 255]);

    // Dropping February leaves May untouched
    let without_feb = generate_heatmaps(&tracks[1..], &criteria, &config).unwrap();
    assert_eq!(without_feb.len(), 2);
    assert_eq!(&without_feb[0].result.as_ref().unwrap().image, may_image);
}

#[test]
fn test_month_range_and_filters() {
    let config = paris_config();
    let mut tracks = vec![
        make_track("jan", 1, vec![PARIS]),
        make_track("apr", 4, vec![PARIS]),
        make_track("jun", 6, vec![PARIS]),
    ];
    tracks[1].meta.activity_type = "Run".to_string();

    let criteria = FilterCriteria {
        month: "3-9".parse().unwrap(),
        ..Default::default()
    };
    let passes = generate_heatmaps(&tracks, &criteria, &config).unwrap();
    let labels: Vec<PassLabel> = passes.iter().map(|p| p.label).collect();
    assert_eq!(labels, vec![PassLabel::Month(4), PassLabel::Month(6)]);

    let criteria = FilterCriteria {
        activity_type: Some("Ride".to_string()),
        ..Default::default()
    };
    let heatmap = single_image(&tracks, &config);
    assert_eq!(heatmap.track_count, 3);
    let passes = generate_heatmaps(&tracks, &criteria, &config).unwrap();
    assert_eq!(passes[0].result.as_ref().unwrap().track_count, 2);
}
