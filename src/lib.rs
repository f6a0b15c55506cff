//! # phenofit-core
//!
//! Per-pixel vegetation phenology extraction in Rust.
//!
//! Given a multi-year vegetation-index series sampled every 8 days (46
//! composites per year), this crate derives four metrics for each year:
//! - SOS: start of season (day-of-year)
//! - EOS: end of season (day-of-year)
//! - POS: peak of season (day-of-year)
//! - POP: peak value
//!
//! The pipeline cleans the raw series, filters per-phase outliers, segments
//! it into growing seasons, fits a double-logistic curve to each season with
//! iteratively reweighted Levenberg-Marquardt, and thresholds every yearly
//! curve against one amplitude level derived from a peak-aligned multi-year
//! composite.
//!
//! ## Data Layout
//!
//! - Input series: `raw[i]` is composite `i % 46` of year `i / 46`
//! - Output bands: `SOS(years) ‖ EOS(years) ‖ POS(years) ‖ POP(years)`, NaN
//!   where a year could not be computed
//! - Cubes: row-major, one contiguous row per pixel
//!
//! ## Example
//!
//! ```
//! use phenofit_core::{extract_pixel, PhenologyConfig};
//! use phenofit_core::simulation::{reference_season, SeriesSimulator};
//!
//! let config = PhenologyConfig::default();
//! let raw = SeriesSimulator::new(reference_season(), &config)
//!     .noise(0.01)
//!     .seed(7)
//!     .series();
//! let bands = extract_pixel(&raw, &config).to_bands();
//! assert_eq!(bands.len(), 48);
//! ```

#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]

pub mod parallel;

pub mod composite;
pub mod config;
pub mod cube;
pub mod curve;
pub mod error;
pub mod helpers;
pub mod metrics;
pub mod outliers;
pub mod pixel;
pub mod result;
pub mod season;
pub mod series;
pub mod simulation;
pub mod smoothing;

// Re-export commonly used items
pub use config::{FitConfig, OutlierConfig, PhenologyConfig, SegmentConfig};
pub use error::{CurveFitError, PhenologyError, Result};
pub use helpers::NUMERICAL_EPS;

// Re-export pipeline entry points
pub use pixel::{analyze_pixel, extract_batch, extract_pixel, PixelPhenology};

// Re-export data types
pub use cube::{BandStack, PixelCube, PixelSource};
pub use curve::{DoubleLogistic, FittedCurve};
pub use result::{Metric, PhenologyResult};
pub use season::SeasonWindow;
pub use series::{PointFlag, SeriesQuality, WeightedSeries};
