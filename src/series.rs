//! Raw pixel series cleaning.
//!
//! Turns the raw composite values of one pixel into a [`WeightedSeries`]:
//! every sample gets an absolute timestamp, a non-negative value and a
//! confidence weight. Individual bad samples never fail; only the aggregate
//! valid-sample check rejects a pixel.

use crate::config::PhenologyConfig;
use crate::error::{PhenologyError, Result};

/// Per-point provenance of a weighted sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointFlag {
    /// Observed value, full weight.
    Trusted,
    /// Negative observation clipped to zero.
    Clipped,
    /// Missing or sentinel observation imputed as zero.
    Missing,
    /// Replaced by its phase-group mean.
    Outlier,
}

/// Series-level quality tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesQuality {
    /// Fresh from preprocessing.
    Good,
    /// The outlier filter replaced at least one point.
    OutliersReplaced,
}

/// Cleaned single-pixel series.
#[derive(Debug, Clone)]
pub struct WeightedSeries {
    /// Absolute day of each sample, counted from the start of the first year
    pub t: Vec<f64>,
    /// Values, never NaN and never negative
    pub y: Vec<f64>,
    /// Confidence weights in [0, 1]
    pub w: Vec<f64>,
    pub flags: Vec<PointFlag>,
    pub quality: SeriesQuality,
    /// Composites per year, the phase-group modulus.
    pub periods_per_year: usize,
}

impl WeightedSeries {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    /// Calendar year index of sample `i`.
    #[inline]
    pub fn year_of(&self, i: usize) -> usize {
        i / self.periods_per_year
    }
}

/// Absolute day (0-based) of sample `i`.
pub fn sample_day(i: usize, config: &PhenologyConfig) -> f64 {
    let p = config.periods_per_year;
    ((i / p) * config.days_per_year) as f64 + (i % p) as f64 * config.cadence_days
}

/// Whether a raw value counts as observed.
#[inline]
pub fn is_valid_sample(v: f64, config: &PhenologyConfig) -> bool {
    v.is_finite() && v > config.invalid_floor
}

/// Number of valid samples in the span used for processing.
pub fn count_valid(raw: &[f64], config: &PhenologyConfig) -> usize {
    raw.iter()
        .take(config.series_len())
        .filter(|&&v| is_valid_sample(v, config))
        .count()
}

/// Clean a raw series into a [`WeightedSeries`].
///
/// Only the first `years * periods_per_year` samples are used.
///
/// # Errors
/// [`PhenologyError::InsufficientInput`] when the series is shorter than
/// `years * periods_per_year` or has fewer than `min_valid_fraction` valid
/// samples.
pub fn preprocess(raw: &[f64], config: &PhenologyConfig) -> Result<WeightedSeries> {
    let len = config.series_len();
    let required = (config.min_valid_fraction * len as f64).ceil() as usize;
    let valid = count_valid(raw, config);

    if raw.len() < len || valid < required {
        return Err(PhenologyError::InsufficientInput {
            valid,
            required: required.max(1),
            len: raw.len(),
        });
    }

    let mut t = Vec::with_capacity(len);
    let mut y = Vec::with_capacity(len);
    let mut w = Vec::with_capacity(len);
    let mut flags = Vec::with_capacity(len);

    for (i, &v) in raw.iter().take(len).enumerate() {
        t.push(sample_day(i, config));
        if !is_valid_sample(v, config) {
            y.push(0.0);
            w.push(config.missing_weight);
            flags.push(PointFlag::Missing);
        } else if v < 0.0 {
            y.push(0.0);
            w.push(config.clipped_weight);
            flags.push(PointFlag::Clipped);
        } else {
            y.push(v);
            w.push(1.0);
            flags.push(PointFlag::Trusted);
        }
    }

    Ok(WeightedSeries {
        t,
        y,
        w,
        flags,
        quality: SeriesQuality::Good,
        periods_per_year: config.periods_per_year,
    })
}
