//! Growing-season segmentation of a multi-year series.
//!
//! The weighted series is smoothed, local maxima are located, one dominant
//! peak is kept per calendar year, and each peak is bounded by the troughs on
//! either side. Candidates whose shape falls outside the configured
//! tolerances are dropped individually; only a series without any acceptable
//! season fails.

use crate::config::PhenologyConfig;
use crate::error::{PhenologyError, Result};
use crate::helpers::{nan_argmin_in, NUMERICAL_EPS};
use crate::series::WeightedSeries;
use crate::smoothing::weighted_local_linear;
use log::debug;
use std::ops::Range;

/// One detected growing season.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonWindow {
    /// Calendar year index (0-based)
    pub year: usize,
    /// Calendar year label
    pub label: i32,
    /// First sample of the window (left trough)
    pub start: usize,
    /// Sample of the dominant smoothed peak
    pub peak: usize,
    /// One past the last sample (right trough)
    pub end: usize,
    /// Requested extension on each side, in months
    pub extend_months: f64,
}

impl SeasonWindow {
    /// Sample range `[start, end)`.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Segmentation output: accepted windows (ordered by year) and the smoothed
/// series they were derived from.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub windows: Vec<SeasonWindow>,
    pub smoothed: Vec<f64>,
}

impl Segmentation {
    /// Window of calendar year `year`, if one was accepted.
    pub fn window_for_year(&self, year: usize) -> Option<&SeasonWindow> {
        self.windows.iter().find(|w| w.year == year)
    }
}

/// Try to add a peak, respecting minimum distance. Replaces previous peak if closer but higher.
fn try_add_peak(peaks: &mut Vec<usize>, candidate: usize, signal: &[f64], min_distance: usize) {
    match peaks.last_mut() {
        Some(last) if candidate - *last < min_distance => {
            if signal[candidate] > signal[*last] {
                *last = candidate;
            }
        }
        _ => peaks.push(candidate),
    }
}

/// Find local maxima in a 1D signal, returning indices.
///
/// The left edge of a plateau counts as a maximum.
pub fn find_local_peaks(signal: &[f64], min_distance: usize) -> Vec<usize> {
    let n = signal.len();
    if n < 3 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    for i in 1..(n - 1) {
        if signal[i] > signal[i - 1] && signal[i] >= signal[i + 1] {
            try_add_peak(&mut peaks, i, signal, min_distance.max(1));
        }
    }
    peaks
}

/// Highest peak of each calendar year, in year order.
fn dominant_peaks(series: &WeightedSeries, smoothed: &[f64], peaks: &[usize]) -> Vec<usize> {
    let mut best: Vec<(usize, usize)> = Vec::new(); // (year, peak)
    for &pk in peaks {
        let year = series.year_of(pk);
        match best.last_mut() {
            Some((y, current)) if *y == year => {
                if smoothed[pk] > smoothed[*current] {
                    *current = pk;
                }
            }
            _ => best.push((year, pk)),
        }
    }
    best.into_iter().map(|(_, pk)| pk).collect()
}

/// Left and right trough of every candidate peak.
///
/// Neighbouring peaks no more than two years apart share the trough between
/// them; otherwise each side looks back or ahead at most one year.
fn troughs(smoothed: &[f64], candidates: &[usize], p: usize) -> Vec<(usize, usize)> {
    let n = smoothed.len();
    let shared = |a: usize, b: usize| b - a <= 2 * p;

    candidates
        .iter()
        .enumerate()
        .map(|(k, &pk)| {
            let left_range = match k.checked_sub(1).map(|j| candidates[j]) {
                Some(prev) if shared(prev, pk) => (prev + 1)..pk,
                _ => pk.saturating_sub(p)..pk,
            };
            let right_range = match candidates.get(k + 1) {
                Some(&next) if shared(pk, next) => (pk + 1)..next,
                _ => (pk + 1)..(pk + p + 1).min(n),
            };
            let left = nan_argmin_in(smoothed, left_range).unwrap_or(pk);
            let right = nan_argmin_in(smoothed, right_range).unwrap_or(pk);
            (left, right)
        })
        .collect()
}

/// Detect yearly growing-season windows.
///
/// # Errors
/// [`PhenologyError::SegmentationFailure`] when the smoothed series is flat
/// or no candidate season passes the shape tolerances.
pub fn segment_seasons(series: &WeightedSeries, config: &PhenologyConfig) -> Result<Segmentation> {
    let seg = &config.segment;
    let p = config.periods_per_year;

    let smoothed = weighted_local_linear(&series.t, &series.y, &series.w, seg.smooth_bandwidth_days);

    let (lo, hi) = smoothed
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let amplitude = hi - lo;
    if !amplitude.is_finite() || amplitude <= NUMERICAL_EPS {
        return Err(PhenologyError::SegmentationFailure(
            "smoothed series is flat".to_string(),
        ));
    }

    let peaks = find_local_peaks(&smoothed, config.min_peak_separation());
    let candidates = dominant_peaks(series, &smoothed, &peaks);
    let bounds = troughs(&smoothed, &candidates, p);

    let mut windows = Vec::with_capacity(candidates.len());
    for (&pk, &(left, right)) in candidates.iter().zip(&bounds) {
        let year = series.year_of(pk);
        if year >= config.years {
            continue;
        }

        let rise = smoothed[pk] - smoothed[left];
        let fall = smoothed[pk] - smoothed[right];
        let trough = smoothed[left].max(smoothed[right]) - lo;
        let asymmetry = rise.max(fall) / rise.min(fall).max(NUMERICAL_EPS * amplitude);

        let reason = if rise < seg.rise_ratio_min * amplitude {
            Some("weak green-up")
        } else if fall < seg.fall_ratio_min * amplitude {
            Some("weak senescence")
        } else if asymmetry > seg.max_asymmetry {
            Some("asymmetric season")
        } else if trough > seg.trough_ratio_max * amplitude {
            Some("shallow trough")
        } else {
            None
        };

        if let Some(reason) = reason {
            debug!("season candidate in year {year} at sample {pk} rejected: {reason}");
            continue;
        }

        windows.push(SeasonWindow {
            year,
            label: config.first_year + year as i32,
            start: left,
            peak: pk,
            end: right,
            extend_months: seg.extend_months,
        });
    }

    if windows.is_empty() {
        return Err(PhenologyError::SegmentationFailure(format!(
            "no acceptable season among {} candidates",
            candidates.len()
        )));
    }

    Ok(Segmentation { windows, smoothed })
}
