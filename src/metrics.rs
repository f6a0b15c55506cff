//! Per-year phenology metrics read off fitted daily curves.
//!
//! POS/POP come straight from each yearly fit. SOS/EOS need the global
//! threshold from [`crate::composite`].

/// Peak of one yearly fitted curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakMetrics {
    /// Day-of-year of the maximum (first occurrence on ties)
    pub pos: usize,
    /// Fitted value at the maximum
    pub pop: f64,
}

/// Threshold crossings of one yearly fitted curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonBounds {
    /// Day-of-year of the first day above the threshold
    pub sos: usize,
    /// Day-of-year of the last day above the threshold
    pub eos: usize,
}

/// POS and POP of a daily fitted curve; `None` when no day is finite.
pub fn peak_metrics(y_fit: &[f64]) -> Option<PeakMetrics> {
    crate::helpers::nan_argmax(y_fit).map(|(idx, pop)| PeakMetrics { pos: idx + 1, pop })
}

/// SOS and EOS of a daily fitted curve against the global threshold.
///
/// Returns `None` when the curve has fewer than `min_valid_days` finite days
/// or never exceeds the threshold.
pub fn season_bounds(y_fit: &[f64], threshold: f64, min_valid_days: usize) -> Option<SeasonBounds> {
    if crate::helpers::count_finite(y_fit) < min_valid_days {
        return None;
    }
    let above = |v: &f64| v.is_finite() && *v > threshold;
    let first = y_fit.iter().position(above)?;
    let last = y_fit.iter().rposition(above)?;
    Some(SeasonBounds {
        sos: first + 1,
        eos: last + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tent(n: usize, peak: usize) -> Vec<f64> {
        (0..n)
            .map(|j| 1.0 - (j as f64 - peak as f64).abs() / n as f64)
            .collect()
    }

    #[test]
    fn test_peak_metrics_first_tie() {
        let mut y = vec![0.1; 365];
        y[99] = 0.7;
        y[150] = 0.7;
        let m = peak_metrics(&y).unwrap();
        assert_eq!(m.pos, 100);
        assert_eq!(m.pop, 0.7);
        assert!(peak_metrics(&[f64::NAN; 10]).is_none());
    }

    #[test]
    fn test_season_bounds_crossings() {
        let y = tent(365, 179);
        let b = season_bounds(&y, 0.81, 300).unwrap();
        // 1 - |j - 179| / 365 > 0.81  <=>  |j - 179| <= 69
        assert_eq!(b.sos, 110 + 1);
        assert_eq!(b.eos, 248 + 1);
        let peak = peak_metrics(&y).unwrap();
        assert!(b.sos <= peak.pos && peak.pos <= b.eos);
    }

    #[test]
    fn test_season_bounds_requires_valid_days() {
        let mut y = tent(365, 179);
        for v in y.iter_mut().take(70) {
            *v = f64::NAN;
        }
        assert!(season_bounds(&y, 0.8, 300).is_none());
        assert!(season_bounds(&y, 0.8, 295).is_some());
    }

    #[test]
    fn test_season_bounds_never_exceeded() {
        let y = vec![0.2; 365];
        assert!(season_bounds(&y, 0.2, 300).is_none());
    }
}
