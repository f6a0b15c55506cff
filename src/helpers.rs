//! NaN-aware numeric helpers shared by the pipeline stages.

use std::ops::Range;

/// Small epsilon for numerical comparisons (e.g., avoiding division by zero).
pub const NUMERICAL_EPS: f64 = 1e-10;

/// Mean and population standard deviation of a set of values.
///
/// Returns `None` for an empty input.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    // Two-pass variance
    let var = values.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.max(0.0).sqrt()))
}

/// Median of a set of values (NaN entries skipped).
pub fn median(values: &[f64]) -> Option<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    }
}

/// Index and value of the largest finite entry. Ties keep the first index.
pub fn nan_argmax(values: &[f64]) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best
}

/// Index of the smallest finite entry inside `range`. Ties keep the first index.
pub fn nan_argmin_in(values: &[f64], range: Range<usize>) -> Option<usize> {
    let end = range.end.min(values.len());
    let mut best: Option<(usize, f64)> = None;
    for i in range.start..end {
        let v = values[i];
        if !v.is_finite() {
            continue;
        }
        match best {
            Some((_, b)) if v >= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Number of finite entries.
pub fn count_finite(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_finite()).count()
}

/// Fill non-finite entries in place, first by carrying the last finite value
/// forward, then by carrying the first finite value backward over any
/// leading gap.
///
/// Returns `false` (leaving the slice untouched) when no entry is finite.
pub fn fill_forward_backward(values: &mut [f64]) -> bool {
    let Some(first) = values.iter().position(|v| v.is_finite()) else {
        return false;
    };

    let mut last = values[first];
    for v in values.iter_mut().skip(first) {
        if v.is_finite() {
            last = *v;
        } else {
            *v = last;
        }
    }

    let lead = values[first];
    for v in values.iter_mut().take(first) {
        *v = lead;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_std_population() {
        let (mean, sd) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((mean - 5.0).abs() < NUMERICAL_EPS);
        assert!((sd - 2.0).abs() < NUMERICAL_EPS);
        assert!(mean_std(&[]).is_none());
    }

    #[test]
    fn test_median_skips_nan() {
        assert_eq!(median(&[3.0, f64::NAN, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[f64::NAN]), None);
    }

    #[test]
    fn test_nan_argmax_first_tie() {
        let values = [f64::NAN, 1.0, 3.0, 3.0, 2.0];
        assert_eq!(nan_argmax(&values), Some((2, 3.0)));
        assert_eq!(nan_argmax(&[f64::NAN, f64::NAN]), None);
    }

    #[test]
    fn test_nan_argmin_in_range() {
        let values = [0.0, 5.0, 1.0, 1.0, 4.0, 0.5];
        assert_eq!(nan_argmin_in(&values, 1..5), Some(2));
        assert_eq!(nan_argmin_in(&values, 1..100), Some(5));
        assert_eq!(nan_argmin_in(&values, 3..3), None);
    }

    #[test]
    fn test_fill_forward_backward() {
        let mut values = [f64::NAN, f64::NAN, 1.0, f64::NAN, 3.0, f64::NAN];
        assert!(fill_forward_backward(&mut values));
        assert_eq!(values, [1.0, 1.0, 1.0, 1.0, 3.0, 3.0]);

        let mut empty = [f64::NAN; 4];
        assert!(!fill_forward_backward(&mut empty));
        assert_eq!(count_finite(&empty), 0);
    }
}
