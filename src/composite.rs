//! Multi-year composite curve and the global amplitude threshold.
//!
//! Yearly fitted curves are shifted so that their peaks coincide, averaged
//! day by day and gap-filled into one dense 365-day curve. The composite is
//! refit with the double-logistic model and the day where it first reaches a
//! fixed fraction of its amplitude defines a single threshold value shared by
//! all years.

use crate::config::PhenologyConfig;
use crate::curve::{fit_double_logistic, DoubleLogistic, FittedCurve, SeasonAnchors};
use crate::error::{PhenologyError, Result};
use crate::helpers::{fill_forward_backward, nan_argmax, nan_argmin_in};
use crate::metrics::peak_metrics;

/// Peak-aligned multi-year average curve, dense after gap filling.
#[derive(Debug, Clone)]
pub struct CompositeCurve {
    /// Daily values, `values[j]` is day-of-year `j + 1`
    pub values: Vec<f64>,
    /// Day-of-year the yearly peaks were aligned to
    pub anchor_doy: usize,
    /// Number of yearly curves that contributed
    pub contributors: usize,
    /// Days that received no contribution before filling
    pub filled_days: usize,
}

/// Threshold shared by all years.
#[derive(Debug, Clone, Copy)]
pub struct GlobalThreshold {
    /// Day-of-year of the threshold crossing on the composite
    pub doy: usize,
    /// Composite value on that day
    pub value: f64,
    /// Parameters of the composite refit (day 0 = DOY 1)
    pub params: DoubleLogistic,
}

/// Average all yearly fits onto one peak-aligned calendar.
///
/// # Errors
/// [`PhenologyError::ThresholdDerivationFailure`] when no curve has a defined
/// peak or no day receives a value.
pub fn build_composite(curves: &[FittedCurve], days_per_year: usize) -> Result<CompositeCurve> {
    let peaked: Vec<(&FittedCurve, usize)> = curves
        .iter()
        .filter_map(|c| peak_metrics(&c.y_fit).map(|m| (c, m.pos)))
        .collect();
    if peaked.is_empty() {
        return Err(PhenologyError::ThresholdDerivationFailure(
            "no yearly curve has a defined peak".to_string(),
        ));
    }

    let mean_pos = peaked.iter().map(|&(_, pos)| pos as f64).sum::<f64>() / peaked.len() as f64;
    let anchor = mean_pos.round() as i64;

    let mut sum = vec![0.0; days_per_year];
    let mut count = vec![0usize; days_per_year];
    for &(curve, pos) in &peaked {
        let offset = pos as i64 - anchor;
        for d in 0..days_per_year {
            let src = d as i64 + offset;
            if src < 0 || src >= curve.y_fit.len() as i64 {
                continue;
            }
            let v = curve.y_fit[src as usize];
            if v.is_finite() {
                sum[d] += v;
                count[d] += 1;
            }
        }
    }

    let mut values: Vec<f64> = sum
        .iter()
        .zip(&count)
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { f64::NAN })
        .collect();
    let filled_days = count.iter().filter(|&&c| c == 0).count();

    if !fill_forward_backward(&mut values) {
        return Err(PhenologyError::ThresholdDerivationFailure(
            "composite curve received no values".to_string(),
        ));
    }

    Ok(CompositeCurve {
        values,
        anchor_doy: anchor.max(1) as usize,
        contributors: peaked.len(),
        filled_days,
    })
}

/// Refit the composite and derive the global threshold value.
///
/// # Errors
/// [`PhenologyError::ThresholdDerivationFailure`] when the refit fails or its
/// rising limb never reaches the threshold level.
pub fn derive_threshold(composite: &CompositeCurve, config: &PhenologyConfig) -> Result<GlobalThreshold> {
    let fail = |reason: &str| PhenologyError::ThresholdDerivationFailure(reason.to_string());

    let y = &composite.values;
    let n = y.len();
    let t: Vec<f64> = (0..n).map(|d| d as f64).collect();
    let w = vec![1.0; n];

    let (peak, _) = nan_argmax(y).ok_or_else(|| fail("empty composite"))?;
    let left = nan_argmin_in(y, 0..peak + 1).unwrap_or(0);
    let right = nan_argmin_in(y, peak..n).unwrap_or(n - 1);
    let anchors = SeasonAnchors {
        left: left as f64,
        peak: peak as f64,
        right: right as f64,
    };

    let fit = fit_double_logistic(&t, y, &w, anchors, 1, &config.fit)
        .map_err(|err| fail(&format!("composite refit: {err}")))?;
    let refit: Vec<f64> = t.iter().map(|&d| fit.params.eval(d)).collect();

    let (pk, top) = nan_argmax(&refit).ok_or_else(|| fail("refit is not finite"))?;
    let base = refit[..=pk].iter().copied().fold(f64::INFINITY, f64::min);
    let level = base + config.threshold_ratio * (top - base);

    let day = refit[..=pk]
        .iter()
        .position(|&v| v >= level)
        .ok_or_else(|| fail("no threshold crossing on the rising limb"))?;

    Ok(GlobalThreshold {
        doy: day + 1,
        value: y[day],
        params: fit.params,
    })
}
