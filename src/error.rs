//! Error types for the phenology pipeline.
//!
//! Every stage of the per-pixel pipeline reports failure through
//! [`PhenologyError`]. None of these errors escape [`crate::pixel::extract_pixel`]:
//! the driver turns them into the all-NaN fallback result.

use thiserror::Error;

/// Failure of one pipeline stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhenologyError {
    /// Too few valid samples in the raw series (or the series is too short).
    #[error("insufficient input: {valid} valid samples of {len}, need at least {required}")]
    InsufficientInput {
        valid: usize,
        required: usize,
        len: usize,
    },
    /// No season structure could be resolved for the whole series.
    #[error("season segmentation failed: {0}")]
    SegmentationFailure(String),
    /// The curve fit for one year failed. Isolated to that year.
    #[error("curve fit failed for year {year}: {reason}")]
    FitFailure { year: usize, reason: String },
    /// The multi-year composite curve could not be built or fit.
    #[error("threshold derivation failed: {0}")]
    ThresholdDerivationFailure(String),
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PhenologyError {
    /// Whether this error rejects the whole pixel (as opposed to one year).
    pub fn is_pixel_fatal(&self) -> bool {
        !matches!(self, PhenologyError::FitFailure { .. })
    }
}

/// Failure of a single double-logistic fit, before any year context.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CurveFitError {
    #[error("too few points ({0})")]
    TooFewPoints(usize),
    #[error("sample, time and weight lengths differ")]
    LengthMismatch,
    #[error("non-finite samples")]
    NonFiniteSamples,
    #[error("fit did not converge in pass {0}")]
    NotConverged(usize),
    #[error("non-positive amplitude")]
    NonPositiveAmplitude,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PhenologyError>;
