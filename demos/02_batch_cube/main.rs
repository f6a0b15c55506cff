//! Example 02: Batch Extraction over a Pixel Cube
//!
//! Demonstrates the raster workflow: build a pixel × time cube, load a
//! partial JSON configuration, extract all pixels into a band stack and
//! read individual metric bands back out.

use phenofit_core::simulation::{reference_season, SeriesSimulator, SENTINEL};
use phenofit_core::{extract_batch, Metric, PhenologyConfig, PixelCube};
use std::time::Instant;

fn band_summary(label: &str, values: &[f64]) {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        println!("  {label}: no valid pixels");
        return;
    }
    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    println!(
        "  {label}: {}/{} valid, min={min:.1}, max={max:.1}, mean={mean:.2}",
        finite.len(),
        values.len()
    );
}

fn main() {
    println!("=== Example 02: Batch Extraction over a Pixel Cube ===\n");

    // --- Section 1: Configuration ---
    println!("--- Configuration ---");
    let config = match PhenologyConfig::from_json_str(
        r#"{ "threshold_ratio": 0.3, "outlier": { "n_sigma": 2.5 } }"#,
    ) {
        Ok(config) => config,
        Err(err) => {
            println!("  Invalid configuration: {err}");
            return;
        }
    };
    println!(
        "  years={}, periods/year={}, threshold ratio={}, outlier n_sigma={}",
        config.years, config.periods_per_year, config.threshold_ratio, config.outlier.n_sigma
    );

    // --- Section 2: Build a cube ---
    println!("\n--- Pixel Cube ---");
    let n_pixels = 64;
    let sim = SeriesSimulator::new(reference_season(), &config)
        .noise(0.02)
        .clouds(0.05)
        .missing(0.05);
    let mut rows: Vec<Vec<f64>> = (0..n_pixels as u64)
        .map(|k| sim.clone().seed(2001 + k).series())
        .collect();
    // A few water / no-data pixels
    for row in rows.iter_mut().step_by(16) {
        row.iter_mut().for_each(|v| *v = SENTINEL);
    }
    let Some(cube) = PixelCube::from_rows(&rows) else {
        println!("  Ragged rows");
        return;
    };
    println!("  Shape: {:?} (pixels x samples)", cube.shape());

    // --- Section 3: Extract ---
    println!("\n--- Extraction ---");
    let start = Instant::now();
    let stack = extract_batch(&cube, &config);
    println!("  {} in {:.2?}", stack, start.elapsed());

    // --- Section 4: Read bands ---
    println!("\n--- Band Summaries (year {}) ---", config.first_year + 5);
    for metric in Metric::ALL {
        let band = metric.band(5, config.years);
        band_summary(
            &format!("{} (band {})", metric.name(), band + 1),
            &stack.band(band),
        );
    }

    let rejected = (0..stack.n_pixels())
        .filter(|&p| stack.row(p).iter().all(|v| v.is_nan()))
        .count();
    println!("\n  Rejected pixels: {rejected}/{}", stack.n_pixels());

    println!("\n=== Done ===");
}
