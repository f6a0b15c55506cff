//! End-to-end scenarios for the pixel pipeline.
//!
//! Every scenario starts from raw 552-sample series built with the
//! `simulation` module and checks the 48-band output of the public entry
//! points.

use phenofit_core::simulation::{reference_season, SeriesSimulator, SENTINEL};
use phenofit_core::{
    analyze_pixel, extract_batch, extract_pixel, DoubleLogistic, Metric, PhenologyConfig,
    PhenologyError, PhenologyResult, PixelCube,
};

// ─── Helpers ────────────────────────────────────────────────────────────────

fn assert_vec_close(actual: &[f64], expected: &[f64], tol: f64, label: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{}: length mismatch: {} vs {}",
        label,
        actual.len(),
        expected.len()
    );
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert!(
            (a - e).abs() <= tol,
            "{}: element {} differs: {} vs {} (tol {})",
            label,
            i,
            a,
            e,
            tol
        );
    }
}

fn same_bands(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}

fn clean_pixel(config: &PhenologyConfig) -> Vec<f64> {
    SeriesSimulator::new(reference_season(), config).series()
}

// ─── Reference scenario ─────────────────────────────────────────────────────

#[test]
fn twelve_identical_seasons_recover_reference_metrics() {
    let config = PhenologyConfig::default();
    let result = extract_pixel(&clean_pixel(&config), &config);

    assert_vec_close(&result.sos, &[100.0; 12], 5.0, "SOS");
    assert_vec_close(&result.eos, &[260.0; 12], 5.0, "EOS");
    assert_vec_close(&result.pos, &[180.0; 12], 5.0, "POS");
    assert_vec_close(&result.pop, &[0.8; 12], 0.04, "POP");
}

#[test]
fn reference_bands_follow_layout() {
    let config = PhenologyConfig::default();
    let bands = extract_pixel(&clean_pixel(&config), &config).to_bands();
    assert_eq!(bands.len(), 48);

    for year in 0..12 {
        assert!((bands[Metric::Sos.band(year, 12)] - 100.0).abs() <= 5.0);
        assert!((bands[Metric::Eos.band(year, 12)] - 260.0).abs() <= 5.0);
        assert!((bands[Metric::Pos.band(year, 12)] - 180.0).abs() <= 5.0);
        assert!((bands[Metric::Pop.band(year, 12)] - 0.8).abs() <= 0.04);
    }
    // Day-of-year metrics are whole days
    assert!(bands[..36].iter().all(|v| v.fract() == 0.0));
}

#[test]
fn shifted_years_track_their_own_peaks() {
    let config = PhenologyConfig::default();
    let seasons: Vec<DoubleLogistic> = (0..12)
        .map(|k| reference_season().shifted(if k % 2 == 0 { -12.0 } else { 12.0 }))
        .collect();
    let raw = SeriesSimulator::with_seasons(seasons, &config).series();
    let pixel = analyze_pixel(&raw, &config).unwrap();

    for year in 0..12 {
        let expected = if year % 2 == 0 { 168.0 } else { 192.0 };
        assert!(
            (pixel.result.pos[year] - expected).abs() <= 5.0,
            "year {year}: pos {}",
            pixel.result.pos[year]
        );
    }
    // Peaks are aligned before averaging, so the composite peaks at their mean
    assert!((pixel.composite.anchor_doy as f64 - 180.0).abs() <= 1.0);
}

// ─── Degraded inputs ────────────────────────────────────────────────────────

#[test]
fn all_missing_input_yields_nan_bands() {
    let config = PhenologyConfig::default();
    let result = extract_pixel(&vec![f64::NAN; 552], &config);
    let bands = result.to_bands();
    assert_eq!(bands.len(), 48);
    assert!(bands.iter().all(|v| v.is_nan()));

    assert!(matches!(
        analyze_pixel(&vec![f64::NAN; 552], &config),
        Err(PhenologyError::InsufficientInput { valid: 0, .. })
    ));
}

#[test]
fn sentinel_input_yields_nan_bands() {
    let config = PhenologyConfig::default();
    let result = extract_pixel(&vec![SENTINEL; 552], &config);
    assert!(result.is_all_nan());
}

#[test]
fn short_input_yields_nan_bands() {
    let config = PhenologyConfig::default();
    let raw = clean_pixel(&config);
    let result = extract_pixel(&raw[..500], &config);
    assert!(result.is_all_nan());
    assert_eq!(result.to_bands().len(), 48);
}

#[test]
fn longer_input_uses_first_twelve_years() {
    let config = PhenologyConfig::default();
    let mut raw = clean_pixel(&config);
    raw.extend(std::iter::repeat(f64::NAN).take(46));
    let long = extract_pixel(&raw, &config);
    let exact = extract_pixel(&raw[..552], &config);
    assert!(same_bands(&long.to_bands(), &exact.to_bands()));
}

#[test]
fn noisy_cloudy_pixel_keeps_metric_order() {
    let config = PhenologyConfig::default();
    let raw = SeriesSimulator::new(reference_season(), &config)
        .noise(0.02)
        .clouds(0.1)
        .missing(0.1)
        .sentinels(0.02)
        .seed(2024)
        .series();
    let result = extract_pixel(&raw, &config);
    assert_eq!(result.to_bands().len(), 48);

    let mut defined = 0;
    for year in 0..12 {
        let (sos, pos, eos) = (result.sos[year], result.pos[year], result.eos[year]);
        if sos.is_finite() && pos.is_finite() && eos.is_finite() {
            defined += 1;
            assert!(sos <= pos && pos <= eos, "year {year}: {sos} {pos} {eos}");
            assert!((pos - 180.0).abs() <= 15.0, "year {year}: pos {pos}");
        }
    }
    assert!(defined >= 6, "only {defined} years defined");
}

#[test]
fn unfittable_year_only_loses_that_year() {
    let config = PhenologyConfig::default();
    let mut raw = clean_pixel(&config);
    for v in raw.iter_mut().skip(4 * 46).take(46) {
        *v = f64::NAN;
    }
    let pixel = analyze_pixel(&raw, &config).unwrap();
    let r = &pixel.result;

    for year in (0..12).filter(|&y| y != 4) {
        assert!((r.pos[year] - 180.0).abs() <= 5.0, "year {year}");
        assert!((r.sos[year] - 100.0).abs() <= 5.0, "year {year}");
    }
    // The year fails its fit, so all four of its metrics are missing
    assert!(r.sos[4].is_nan());
    assert!(r.eos[4].is_nan());
    assert!(r.pos[4].is_nan());
    assert!(r.pop[4].is_nan());
    assert!(pixel.curve_for_year(4).is_none());
    assert!(pixel
        .failures
        .iter()
        .any(|e| matches!(e, PhenologyError::FitFailure { year: 4, .. })));
    assert_eq!(pixel.composite.contributors, 11);
}

// ─── Batch ──────────────────────────────────────────────────────────────────

#[test]
fn batch_rows_equal_single_pixel_results() {
    let config = PhenologyConfig::default();
    let mut rows: Vec<Vec<f64>> = (0..5)
        .map(|k| {
            SeriesSimulator::new(reference_season(), &config)
                .noise(0.015)
                .seed(500 + k)
                .series()
        })
        .collect();
    rows[2] = vec![f64::NAN; 552];

    let from_slice = extract_batch(rows.as_slice(), &config);
    let cube = PixelCube::from_rows(&rows).unwrap();
    let from_cube = extract_batch(&cube, &config);

    assert_eq!(from_slice.shape(), (5, 48));
    assert_eq!(from_cube.shape(), (5, 48));
    for (p, raw) in rows.iter().enumerate() {
        let single = extract_pixel(raw, &config).to_bands();
        assert!(same_bands(from_slice.row(p), &single), "slice row {p}");
        assert!(same_bands(from_cube.row(p), &single), "cube row {p}");
    }
    assert!(from_cube.row(2).iter().all(|v| v.is_nan()));

    let back = PhenologyResult::from_bands(from_cube.row(0)).unwrap();
    assert_eq!(back.years(), 12);
    assert!(same_bands(&back.pos, &from_cube.row(0)[24..36]));
    let pos_year3 = from_cube.metric(Metric::Pos, 3);
    for p in 0..5 {
        assert!(same_bands(&pos_year3[p..=p], &from_cube.row(p)[27..28]));
    }
}

#[test]
fn empty_batch_is_empty_stack() {
    let config = PhenologyConfig::default();
    let stack = extract_batch(&PixelCube::empty(552), &config);
    assert_eq!(stack.shape(), (0, 48));
}

// ─── Configuration ──────────────────────────────────────────────────────────

#[test]
fn partial_json_config_changes_threshold() {
    let config = PhenologyConfig::from_json_str(r#"{ "threshold_ratio": 0.5 }"#).unwrap();
    assert_eq!(config.years, 12);

    let raw = clean_pixel(&config);
    let half = extract_pixel(&raw, &config);
    let default = extract_pixel(&raw, &PhenologyConfig::default());

    // A higher threshold narrows every season
    for year in 0..12 {
        assert!(half.sos[year] > default.sos[year], "year {year}");
        assert!(half.eos[year] < default.eos[year], "year {year}");
        assert_eq!(half.pos[year], default.pos[year]);
    }
}

#[test]
fn invalid_json_config_is_rejected() {
    assert!(matches!(
        PhenologyConfig::from_json_str(r#"{ "threshold_ratio": 1.5 }"#),
        Err(PhenologyError::InvalidConfig(_))
    ));
    assert!(PhenologyConfig::from_json_str("not json").is_err());
}
