//! Example 01: Phenology of a Single Pixel
//!
//! Demonstrates the detailed pipeline on one synthetic pixel:
//! simulate → clean → segment → fit per year → composite threshold →
//! SOS/EOS/POS/POP. Prints what every stage produced.

use phenofit_core::curve::DoubleLogistic;
use phenofit_core::simulation::{reference_season, SeriesSimulator};
use phenofit_core::{analyze_pixel, extract_pixel, PhenologyConfig};

fn print_params(label: &str, p: &DoubleLogistic) {
    println!(
        "  {label}: mn={:.3}, mx={:.3}, sos={:.1}, rsp={:.3}, eos={:.1}, rau={:.3}",
        p.mn, p.mx, p.sos, p.rsp, p.eos, p.rau
    );
}

fn main() {
    println!("=== Example 01: Phenology of a Single Pixel ===\n");

    let config = PhenologyConfig::default();

    // --- Section 1: Simulate a degraded pixel ---
    println!("--- Simulated Series ---");
    let truth = reference_season();
    print_params("True season (DOY)", &truth);
    let raw = SeriesSimulator::new(truth, &config)
        .noise(0.02)
        .clouds(0.08)
        .missing(0.1)
        .seed(42)
        .series();
    let missing = raw.iter().filter(|v| v.is_nan()).count();
    println!(
        "  {} samples ({} years x {} composites), {missing} missing",
        raw.len(),
        config.years,
        config.periods_per_year
    );

    // --- Section 2: Detailed analysis ---
    println!("\n--- Pipeline Stages ---");
    let pixel = match analyze_pixel(&raw, &config) {
        Ok(pixel) => pixel,
        Err(err) => {
            println!("  Pixel rejected: {err}");
            return;
        }
    };
    println!("  Outliers replaced: {}", pixel.outliers_replaced);
    println!("  Season windows: {}", pixel.windows.len());
    for w in pixel.windows.iter().take(3) {
        println!(
            "    {}: samples {}..{} (peak at {})",
            w.label, w.start, w.end, w.peak
        );
    }
    println!(
        "  Yearly fits: {} ok, {} failed",
        pixel.curves.len(),
        pixel.failures.len()
    );
    for err in &pixel.failures {
        println!("    {err}");
    }
    if let Some(curve) = pixel.curve_for_year(0) {
        print_params("Year 0 fit (absolute days)", &curve.params);
    }
    println!(
        "  Composite: {} contributors, aligned at DOY {}, {} days gap-filled",
        pixel.composite.contributors, pixel.composite.anchor_doy, pixel.composite.filled_days
    );
    println!(
        "  Global threshold: {:.4} (composite DOY {})",
        pixel.threshold.value, pixel.threshold.doy
    );

    // --- Section 3: Per-year metrics ---
    println!("\n--- Metrics ---");
    println!("  {:>6} {:>6} {:>6} {:>6} {:>7}", "year", "SOS", "POS", "EOS", "POP");
    let r = &pixel.result;
    for year in 0..r.years() {
        println!(
            "  {:>6} {:>6} {:>6} {:>6} {:>7.4}",
            config.first_year + year as i32,
            r.sos[year],
            r.pos[year],
            r.eos[year],
            r.pop[year]
        );
    }

    // --- Section 4: Total entry point ---
    println!("\n--- Band Vector ---");
    let bands = extract_pixel(&raw, &config).to_bands();
    println!(
        "  {} bands, {} NaN",
        bands.len(),
        bands.iter().filter(|v| v.is_nan()).count()
    );

    let rejected = extract_pixel(&vec![f64::NAN; config.series_len()], &config).to_bands();
    println!(
        "  All-missing pixel: {} bands, all NaN = {}",
        rejected.len(),
        rejected.iter().all(|v| v.is_nan())
    );

    println!("\n=== Done ===");
}
