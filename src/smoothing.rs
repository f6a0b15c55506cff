//! Kernel smoothing of weighted series.
//!
//! A Gaussian local-linear smoother where each sample's kernel weight is
//! multiplied by its confidence weight, so imputed and outlier points barely
//! pull the curve.

/// Kernel support in bandwidths; contributions beyond are below 1e-7.
const KERNEL_CUTOFF: f64 = 6.0;

/// Gaussian kernel function (unnormalized; the smoother normalizes).
#[inline]
fn gaussian_kernel(u: f64) -> f64 {
    (-0.5 * u * u).exp()
}

/// Weighted local linear regression smoother.
///
/// # Arguments
/// * `x` - Predictor values, sorted ascending
/// * `y` - Response values
/// * `w` - Confidence weights
/// * `bandwidth` - Kernel bandwidth in units of `x`
///
/// # Returns
/// Smoothed values at `x`. Where the local system is degenerate the weighted
/// mean is used; where no weight reaches a point the raw value is kept.
pub fn weighted_local_linear(x: &[f64], y: &[f64], w: &[f64], bandwidth: f64) -> Vec<f64> {
    let n = x.len();
    if n == 0 || y.len() != n || w.len() != n || bandwidth.is_nan() || bandwidth <= 0.0 {
        return y.to_vec();
    }

    let reach = KERNEL_CUTOFF * bandwidth;
    let mut out = Vec::with_capacity(n);
    let mut lo = 0;

    for (i, &x0) in x.iter().enumerate() {
        while lo < n && x[lo] < x0 - reach {
            lo += 1;
        }

        let mut s0 = 0.0;
        let mut s1 = 0.0;
        let mut s2 = 0.0;
        let mut t0 = 0.0;
        let mut t1 = 0.0;

        for j in lo..n {
            let d = x[j] - x0;
            if d > reach {
                break;
            }
            let k = gaussian_kernel(d / bandwidth) * w[j];
            s0 += k;
            s1 += k * d;
            s2 += k * d * d;
            t0 += k * y[j];
            t1 += k * y[j] * d;
        }

        let det = s0 * s2 - s1 * s1;
        let value = if det.abs() > 1e-10 * (s0 * s2).abs().max(1e-300) {
            (s2 * t0 - s1 * t1) / det
        } else if s0 > 1e-10 {
            t0 / s0
        } else {
            y[i]
        };

        out.push(if value.is_finite() { value } else { y[i] });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 8.0).collect()
    }

    #[test]
    fn test_linear_signal_reproduced() {
        let x = grid(50);
        let y: Vec<f64> = x.iter().map(|&t| 0.1 + 0.002 * t).collect();
        let w = vec![1.0; 50];
        let smooth = weighted_local_linear(&x, &y, &w, 16.0);
        for (s, v) in smooth.iter().zip(&y) {
            assert!((s - v).abs() < 1e-9);
        }
    }

    #[test]
    fn test_low_weight_spike_suppressed() {
        let x = grid(40);
        let mut y = vec![0.5; 40];
        let mut w = vec![1.0; 40];
        y[20] = 0.0;
        w[20] = 0.01;
        let smooth = weighted_local_linear(&x, &y, &w, 16.0);
        assert!((smooth[20] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_zero_weights_keep_raw_values() {
        let x = grid(10);
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let w = vec![0.0; 10];
        let smooth = weighted_local_linear(&x, &y, &w, 16.0);
        assert_eq!(smooth, y);
    }

    #[test]
    fn test_invalid_bandwidth_passthrough() {
        let x = grid(5);
        let y = vec![1.0, 2.0, 3.0, 2.0, 1.0];
        let w = vec![1.0; 5];
        assert_eq!(weighted_local_linear(&x, &y, &w, 0.0), y);
        assert_eq!(weighted_local_linear(&x, &y, &w, f64::NAN), y);
    }
}
