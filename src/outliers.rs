//! Phase-group outlier rejection.
//!
//! Samples sharing the same position within the year (`index mod P`) form a
//! phase group. Within each group, values further than `n_sigma` standard
//! deviations from the group mean are replaced by the mean and their weight is
//! lowered. The cadence is kept fixed: nothing is removed.

use crate::config::OutlierConfig;
use crate::helpers::mean_std;
use crate::series::{PointFlag, SeriesQuality, WeightedSeries};

/// Bounds of one phase group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBounds {
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Mean and acceptance bounds of the phase group `phase`.
///
/// Returns `None` for an empty group.
pub fn phase_bounds(series: &WeightedSeries, phase: usize, n_sigma: f64) -> Option<PhaseBounds> {
    let p = series.periods_per_year;
    let values: Vec<f64> = (phase..series.len()).step_by(p).map(|i| series.y[i]).collect();
    let (mean, sd) = mean_std(&values)?;
    Some(PhaseBounds {
        mean,
        lower: mean - n_sigma * sd,
        upper: mean + n_sigma * sd,
    })
}

/// Filter outliers in place and return the number of replaced points.
///
/// Points already flagged as outliers are not tested again, so running the
/// filter on its own output changes nothing.
pub fn filter_outliers(series: &mut WeightedSeries, config: &OutlierConfig) -> usize {
    let p = series.periods_per_year;
    if p == 0 {
        return 0;
    }

    let mut replaced = 0;
    for phase in 0..p.min(series.len()) {
        let Some(bounds) = phase_bounds(series, phase, config.n_sigma) else {
            continue;
        };

        for i in (phase..series.len()).step_by(p) {
            if series.flags[i] == PointFlag::Outlier {
                continue;
            }
            let v = series.y[i];
            if v < bounds.lower || v > bounds.upper {
                series.y[i] = bounds.mean.max(0.0);
                series.w[i] = series.w[i].min(config.weight);
                series.flags[i] = PointFlag::Outlier;
                replaced += 1;
            }
        }
    }

    if replaced > 0 {
        series.quality = SeriesQuality::OutliersReplaced;
    }
    replaced
}
