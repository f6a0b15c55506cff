//! Parameter surface of the phenology pipeline.
//!
//! [`PhenologyConfig::default()`] reproduces the reference configuration
//! (12 years of 46 eight-day composites). All structs deserialize with
//! `#[serde(default)]`, so a JSON document only needs the fields it overrides:
//!
//! ```
//! use phenofit_core::PhenologyConfig;
//!
//! let config = PhenologyConfig::from_json_str(r#"{ "years": 10, "fit": { "iterations": 2 } }"#).unwrap();
//! assert_eq!(config.years, 10);
//! assert_eq!(config.fit.iterations, 2);
//! assert_eq!(config.periods_per_year, 46);
//! ```

use crate::error::{PhenologyError, Result};
use serde::{Deserialize, Serialize};

/// Phase-group outlier rejection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// Half-width of the acceptance band in standard deviations.
    pub n_sigma: f64,
    /// Weight given to replaced outliers.
    pub weight: f64,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            n_sigma: 3.0,
            weight: 0.2,
        }
    }
}

/// Season segmentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Minimum number of samples between two peaks. `None` uses a third of
    /// the periods per year.
    pub min_peak_separation: Option<usize>,
    /// Gaussian kernel bandwidth of the segmentation smoother, in days.
    pub smooth_bandwidth_days: f64,
    /// Months added on each side of a trough-to-trough window for fitting.
    pub extend_months: f64,
    /// Minimum rising amplitude as a fraction of the series amplitude.
    pub rise_ratio_min: f64,
    /// Minimum falling amplitude as a fraction of the series amplitude.
    pub fall_ratio_min: f64,
    /// Maximum ratio between the larger and the smaller half amplitude.
    pub max_asymmetry: f64,
    /// Maximum height of the higher trough above the series minimum, as a
    /// fraction of the series amplitude.
    pub trough_ratio_max: f64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_peak_separation: None,
            smooth_bandwidth_days: 16.0,
            extend_months: 2.0,
            rise_ratio_min: 0.1,
            fall_ratio_min: 0.1,
            max_asymmetry: 10.0,
            trough_ratio_max: 0.6,
        }
    }
}

/// Double-logistic fitting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Number of reweighted fitting passes.
    pub iterations: usize,
    /// Lower bound on the window extension, in months.
    pub min_extend_months: f64,
    /// Upper bound on the window extension, in months.
    pub max_extend_months: f64,
    /// Minimum fraction of well-weighted points required to attempt a fit.
    pub min_valid_fraction: f64,
    /// Weight at or above which a point counts as well-weighted.
    pub valid_weight: f64,
    /// Largest sample distance between the well-weighted points that bracket
    /// a limb's half-amplitude crossing.
    pub max_crossing_gap: usize,
    /// Floor applied to reweighted point weights.
    pub weight_floor: f64,
    /// Levenberg-Marquardt iteration cap per pass.
    pub max_lm_iterations: usize,
    /// Relative cost decrease below which a pass is considered converged.
    pub tolerance: f64,
    /// Lower bound of the green-up and senescence slopes (1/day).
    pub slope_min: f64,
    /// Upper bound of the green-up and senescence slopes (1/day).
    pub slope_max: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            iterations: 3,
            min_extend_months: 1.0,
            max_extend_months: 3.0,
            min_valid_fraction: 0.4,
            valid_weight: 0.5,
            max_crossing_gap: 6,
            weight_floor: 0.05,
            max_lm_iterations: 200,
            tolerance: 1e-10,
            slope_min: 1e-3,
            slope_max: 1.0,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhenologyConfig {
    /// Composites per calendar year.
    pub periods_per_year: usize,
    /// Years per pixel series.
    pub years: usize,
    /// Days between composites.
    pub cadence_days: f64,
    /// Days in the output calendar year.
    pub days_per_year: usize,
    /// Calendar label of the first year.
    pub first_year: i32,
    /// Values at or below this are treated as missing.
    pub invalid_floor: f64,
    /// Minimum fraction of valid raw samples for a pixel to be processed.
    pub min_valid_fraction: f64,
    /// Weight of negative values clipped to zero.
    pub clipped_weight: f64,
    /// Weight of missing values imputed as zero.
    pub missing_weight: f64,
    pub outlier: OutlierConfig,
    pub segment: SegmentConfig,
    pub fit: FitConfig,
    /// Relative amplitude at which the composite curve defines the threshold.
    pub threshold_ratio: f64,
    /// Minimum number of finite daily fitted values for SOS/EOS.
    pub min_valid_days: usize,
}

impl Default for PhenologyConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 46,
            years: 12,
            cadence_days: 8.0,
            days_per_year: 365,
            first_year: 2001,
            invalid_floor: -1.0,
            min_valid_fraction: 0.5,
            clipped_weight: 0.5,
            missing_weight: 0.01,
            outlier: OutlierConfig::default(),
            segment: SegmentConfig::default(),
            fit: FitConfig::default(),
            threshold_ratio: 0.30,
            min_valid_days: 300,
        }
    }
}

fn check(ok: bool, what: &str) -> Result<()> {
    if ok {
        Ok(())
    } else {
        Err(PhenologyError::InvalidConfig(what.to_string()))
    }
}

fn in_unit(x: f64) -> bool {
    (0.0..=1.0).contains(&x)
}

impl PhenologyConfig {
    /// Parse a (possibly partial) JSON configuration and validate it.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| PhenologyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PhenologyError::InvalidConfig(e.to_string()))
    }

    /// Number of raw samples a pixel series must provide.
    pub fn series_len(&self) -> usize {
        self.years * self.periods_per_year
    }

    /// Number of values in the flattened per-pixel output.
    pub fn n_bands(&self) -> usize {
        4 * self.years
    }

    /// Minimum peak separation in samples.
    pub fn min_peak_separation(&self) -> usize {
        self.segment
            .min_peak_separation
            .unwrap_or(self.periods_per_year / 3)
            .max(1)
    }

    /// Samples per month at the configured cadence.
    pub fn samples_per_month(&self) -> f64 {
        self.periods_per_year as f64 / 12.0
    }

    /// Check that every parameter is in range.
    pub fn validate(&self) -> Result<()> {
        check(self.periods_per_year >= 4, "periods_per_year must be >= 4")?;
        check(self.years >= 1, "years must be >= 1")?;
        check(
            self.cadence_days.is_finite() && self.cadence_days > 0.0,
            "cadence_days must be positive",
        )?;
        check(self.days_per_year >= 28, "days_per_year must be >= 28")?;
        check(self.invalid_floor < 0.0, "invalid_floor must be negative")?;
        check(
            in_unit(self.min_valid_fraction),
            "min_valid_fraction must be in [0, 1]",
        )?;
        check(in_unit(self.clipped_weight), "clipped_weight must be in [0, 1]")?;
        check(in_unit(self.missing_weight), "missing_weight must be in [0, 1]")?;
        check(
            self.outlier.n_sigma.is_finite() && self.outlier.n_sigma > 0.0,
            "outlier.n_sigma must be positive",
        )?;
        check(in_unit(self.outlier.weight), "outlier.weight must be in [0, 1]")?;
        check(
            self.segment.smooth_bandwidth_days > 0.0,
            "segment.smooth_bandwidth_days must be positive",
        )?;
        check(
            self.segment.extend_months >= 0.0,
            "segment.extend_months must be non-negative",
        )?;
        check(
            in_unit(self.segment.rise_ratio_min) && in_unit(self.segment.fall_ratio_min),
            "segment rise/fall ratios must be in [0, 1]",
        )?;
        check(
            self.segment.max_asymmetry >= 1.0,
            "segment.max_asymmetry must be >= 1",
        )?;
        check(
            self.segment.trough_ratio_max > 0.0,
            "segment.trough_ratio_max must be positive",
        )?;
        check(self.fit.iterations >= 1, "fit.iterations must be >= 1")?;
        check(
            self.fit.min_extend_months >= 0.0
                && self.fit.min_extend_months <= self.fit.max_extend_months,
            "fit extension bounds must satisfy 0 <= min <= max",
        )?;
        check(
            in_unit(self.fit.min_valid_fraction),
            "fit.min_valid_fraction must be in [0, 1]",
        )?;
        check(in_unit(self.fit.valid_weight), "fit.valid_weight must be in [0, 1]")?;
        check(in_unit(self.fit.weight_floor), "fit.weight_floor must be in [0, 1]")?;
        check(
            self.fit.max_crossing_gap >= 1,
            "fit.max_crossing_gap must be >= 1",
        )?;
        check(
            self.fit.max_lm_iterations >= 1,
            "fit.max_lm_iterations must be >= 1",
        )?;
        check(
            self.fit.slope_min > 0.0 && self.fit.slope_min < self.fit.slope_max,
            "fit slope bounds must satisfy 0 < min < max",
        )?;
        check(
            self.threshold_ratio > 0.0 && self.threshold_ratio < 1.0,
            "threshold_ratio must be in (0, 1)",
        )?;
        check(
            self.min_valid_days <= self.days_per_year,
            "min_valid_days must not exceed days_per_year",
        )?;
        Ok(())
    }
}
