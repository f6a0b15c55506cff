//! Per-pixel pipeline driver and batch extraction.
//!
//! [`analyze_pixel`] runs every stage and reports the first pixel-fatal
//! error. [`extract_pixel`] is the total entry point used for rasters: it
//! never fails and never panics outward, always returning one
//! [`PhenologyResult`] of the configured length. [`extract_batch`] maps it
//! over a [`PixelSource`].

use crate::composite::{build_composite, derive_threshold, CompositeCurve, GlobalThreshold};
use crate::config::PhenologyConfig;
use crate::cube::{BandStack, PixelSource};
use crate::curve::{fit_season, FittedCurve};
use crate::error::{PhenologyError, Result};
use crate::iter_maybe_parallel;
use crate::metrics::{peak_metrics, season_bounds};
use crate::outliers::filter_outliers;
use crate::result::PhenologyResult;
use crate::season::{segment_seasons, SeasonWindow};
use crate::series::preprocess;
use log::{debug, warn};
#[cfg(feature = "parallel")]
use rayon::iter::ParallelIterator;
use std::panic::{self, AssertUnwindSafe};

/// Detailed outcome of one pixel.
#[derive(Debug, Clone)]
pub struct PixelPhenology {
    pub result: PhenologyResult,
    /// Points replaced by the outlier filter
    pub outliers_replaced: usize,
    /// Accepted season windows, one per year at most
    pub windows: Vec<SeasonWindow>,
    /// Successful yearly fits
    pub curves: Vec<FittedCurve>,
    /// Yearly fit failures (always [`PhenologyError::FitFailure`])
    pub failures: Vec<PhenologyError>,
    pub composite: CompositeCurve,
    pub threshold: GlobalThreshold,
}

impl PixelPhenology {
    /// Fitted curve of calendar year `year`, if its fit succeeded.
    pub fn curve_for_year(&self, year: usize) -> Option<&FittedCurve> {
        self.curves.iter().find(|c| c.year == year)
    }
}

/// Record POS/POP of every fitted year.
fn assign_peaks(result: &mut PhenologyResult, curves: &[FittedCurve]) {
    let years = result.years();
    for curve in curves.iter().filter(|c| c.year < years) {
        if let Some(peak) = peak_metrics(&curve.y_fit) {
            result.set_peak(curve.year, peak);
        }
    }
}

/// Record SOS/EOS of every fitted year against the global threshold.
fn assign_bounds(
    result: &mut PhenologyResult,
    curves: &[FittedCurve],
    threshold: f64,
    min_valid_days: usize,
) {
    let years = result.years();
    for curve in curves.iter().filter(|c| c.year < years) {
        match season_bounds(&curve.y_fit, threshold, min_valid_days) {
            Some(bounds) => result.set_bounds(curve.year, bounds),
            None => debug!("year {}: no season bounds at threshold {threshold:.4}", curve.year),
        }
    }
}

/// Run the full pipeline on one raw series.
///
/// # Errors
/// Any pixel-fatal [`PhenologyError`]: invalid configuration, insufficient
/// input, failed segmentation or failed threshold derivation. Per-year fit
/// failures are collected in [`PixelPhenology::failures`] instead.
///
/// # Examples
///
/// ```
/// use phenofit_core::config::PhenologyConfig;
/// use phenofit_core::pixel::analyze_pixel;
/// use phenofit_core::simulation::{reference_season, SeriesSimulator};
///
/// let config = PhenologyConfig::default();
/// let raw = SeriesSimulator::new(reference_season(), &config).seed(1).series();
/// let pixel = analyze_pixel(&raw, &config).unwrap();
/// assert_eq!(pixel.windows.len(), 12);
/// assert!((pixel.result.pos[0] - 180.0).abs() <= 5.0);
/// ```
pub fn analyze_pixel(raw: &[f64], config: &PhenologyConfig) -> Result<PixelPhenology> {
    config.validate()?;

    let mut series = preprocess(raw, config)?;
    let outliers_replaced = filter_outliers(&mut series, &config.outlier);
    if outliers_replaced > 0 {
        debug!("outlier filter replaced {outliers_replaced} points");
    }

    let segmentation = segment_seasons(&series, config)?;
    debug!("{} season windows accepted", segmentation.windows.len());

    let mut curves = Vec::with_capacity(segmentation.windows.len());
    let mut failures = Vec::new();
    for window in &segmentation.windows {
        match fit_season(&series, window, config) {
            Ok(curve) => curves.push(curve),
            Err(err) => {
                debug!("{err}");
                failures.push(err);
            }
        }
    }

    let mut result = PhenologyResult::nan(config.years);
    assign_peaks(&mut result, &curves);

    let composite = build_composite(&curves, config.days_per_year)?;
    let threshold = derive_threshold(&composite, config)?;
    debug!(
        "global threshold {:.4} at DOY {} from {} years",
        threshold.value, threshold.doy, composite.contributors
    );

    assign_bounds(&mut result, &curves, threshold.value, config.min_valid_days);

    Ok(PixelPhenology {
        result,
        outliers_replaced,
        windows: segmentation.windows,
        curves,
        failures,
        composite,
        threshold,
    })
}

/// Phenology metrics of one pixel, NaN-filled on any failure.
///
/// Always returns `config.years` values per metric.
pub fn extract_pixel(raw: &[f64], config: &PhenologyConfig) -> PhenologyResult {
    match panic::catch_unwind(AssertUnwindSafe(|| analyze_pixel(raw, config))) {
        Ok(Ok(pixel)) => pixel.result,
        Ok(Err(err)) => {
            debug!("pixel rejected: {err}");
            PhenologyResult::nan(config.years)
        }
        Err(_) => {
            warn!("pixel computation panicked, emitting NaN result");
            PhenologyResult::nan(config.years)
        }
    }
}

/// Metrics of every pixel of `source`, in input order.
///
/// Pixels are processed in parallel with the `parallel` feature.
pub fn extract_batch<S>(source: &S, config: &PhenologyConfig) -> BandStack
where
    S: PixelSource + Sync + ?Sized,
{
    let n = source.n_pixels();
    let results: Vec<PhenologyResult> = iter_maybe_parallel!(0..n)
        .map(|i| extract_pixel(source.pixel(i), config))
        .collect();

    let mut stack = BandStack::nan(n, config.years);
    for (i, r) in results.iter().enumerate() {
        stack.set_row(i, r);
    }
    stack
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::daily_values;
    use crate::result::Metric;
    use crate::simulation::{reference_season, SeriesSimulator};

    fn config() -> PhenologyConfig {
        PhenologyConfig::default()
    }

    fn reference_curve(year: usize, domain: (f64, f64)) -> FittedCurve {
        let params = reference_season().shifted((year * 365) as f64 - 1.0);
        FittedCurve {
            year,
            params,
            domain,
            y_fit: daily_values(&params, year, 365, domain),
        }
    }

    // ============== Assembly tests ==============

    #[test]
    fn test_short_year_loses_only_its_bounds() {
        let full = |k: usize| ((k * 365) as f64 - 60.0, (k * 365) as f64 + 425.0);
        let curves = vec![
            reference_curve(0, full(0)),
            // Only 200 fitted days in year 1
            reference_curve(1, (365.0 + 80.0, 365.0 + 279.0)),
            reference_curve(2, full(2)),
        ];
        let mut result = PhenologyResult::nan(12);
        assign_peaks(&mut result, &curves);
        assign_bounds(&mut result, &curves, 0.31, 300);

        for year in [0, 2] {
            assert!((result.sos[year] - 100.0).abs() <= 1.0);
            assert!((result.eos[year] - 260.0).abs() <= 1.0);
            assert_eq!(result.pos[year], 180.0);
        }
        assert!(result.sos[1].is_nan());
        assert!(result.eos[1].is_nan());
        // POS/POP need no minimum coverage
        assert_eq!(result.pos[1], 180.0);
        assert!(result.pop[1].is_finite());
        assert!(result.sos[3..].iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_curves_beyond_years_ignored() {
        let curves = vec![reference_curve(12, (4300.0, 4800.0))];
        let mut result = PhenologyResult::nan(12);
        assign_peaks(&mut result, &curves);
        assign_bounds(&mut result, &curves, 0.31, 300);
        assert!(result.is_all_nan());
    }

    // ============== Pixel driver tests ==============

    #[test]
    fn test_clean_pixel_metrics() {
        let cfg = config();
        let raw = SeriesSimulator::new(reference_season(), &cfg).series();
        let pixel = analyze_pixel(&raw, &cfg).unwrap();

        assert!(pixel.failures.is_empty());
        assert_eq!(pixel.curves.len(), 12);
        assert_eq!(pixel.composite.contributors, 12);
        let r = &pixel.result;
        for year in 0..12 {
            assert!((r.sos[year] - 100.0).abs() <= 5.0, "sos {}", r.sos[year]);
            assert!((r.eos[year] - 260.0).abs() <= 5.0, "eos {}", r.eos[year]);
            assert!((r.pos[year] - 180.0).abs() <= 5.0, "pos {}", r.pos[year]);
            assert!((r.pop[year] - 0.8).abs() <= 0.04, "pop {}", r.pop[year]);
        }
    }

    #[test]
    fn test_metric_ordering_on_noisy_pixel() {
        let cfg = config();
        let raw = SeriesSimulator::new(reference_season(), &cfg)
            .noise(0.02)
            .clouds(0.05)
            .seed(3)
            .series();
        let r = extract_pixel(&raw, &cfg);
        assert_eq!(r.to_bands().len(), 48);
        for year in 0..12 {
            let (sos, pos, eos) = (r.sos[year], r.pos[year], r.eos[year]);
            if sos.is_finite() && pos.is_finite() && eos.is_finite() {
                assert!(sos <= pos && pos <= eos, "year {year}: {sos} {pos} {eos}");
            }
        }
    }

    #[test]
    fn test_insufficient_input_is_all_nan() {
        let cfg = config();
        let mut raw = SeriesSimulator::new(reference_season(), &cfg).series();
        // 275 valid of 552, one short of half
        for v in raw.iter_mut().take(275) {
            *v = f64::NAN;
        }
        raw[300] = -5.0;
        raw[301] = f64::INFINITY;
        assert_eq!(crate::series::count_valid(&raw, &cfg), 275);
        assert!(matches!(
            analyze_pixel(&raw, &cfg),
            Err(PhenologyError::InsufficientInput { .. })
        ));
        let r = extract_pixel(&raw, &cfg);
        assert!(r.is_all_nan());
        assert_eq!(r.years(), 12);
    }

    #[test]
    fn test_garbage_inputs_yield_fixed_length() {
        let cfg = config();
        let inputs: Vec<Vec<f64>> = vec![
            Vec::new(),
            vec![f64::NAN; 552],
            vec![0.0; 552],
            vec![f64::INFINITY; 600],
            vec![1e300; 552],
            (0..552).map(|i| if i % 2 == 0 { 1.0 } else { -0.5 }).collect(),
            vec![-3000.0; 552],
        ];
        for raw in &inputs {
            let r = extract_pixel(raw, &cfg);
            assert_eq!(r.to_bands().len(), 48);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config();
        cfg.threshold_ratio = 2.0;
        let raw = SeriesSimulator::new(reference_season(), &cfg).series();
        assert!(matches!(
            analyze_pixel(&raw, &cfg),
            Err(PhenologyError::InvalidConfig(_))
        ));
        assert!(extract_pixel(&raw, &cfg).is_all_nan());
    }

    // ============== Batch tests ==============

    #[test]
    fn test_batch_matches_per_pixel() {
        let cfg = config();
        let cube = SeriesSimulator::new(reference_season(), &cfg)
            .noise(0.01)
            .seed(21)
            .cube(4);
        let stack = extract_batch(&cube, &cfg);
        assert_eq!(stack.shape(), (4, 48));

        for p in 0..4 {
            let single = extract_pixel(cube.row(p), &cfg).to_bands();
            for (b, (x, y)) in stack.row(p).iter().zip(&single).enumerate() {
                assert!(x == y || (x.is_nan() && y.is_nan()), "pixel {p} band {b}");
            }
        }
        let pos = stack.metric(Metric::Pos, 5);
        assert!(pos.iter().all(|v| (v - 180.0).abs() <= 5.0));
    }
}
