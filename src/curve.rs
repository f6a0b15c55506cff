//! Double-logistic season curves and their robust fitting.
//!
//! The seasonal model (Beck et al. 2006) is
//!
//! ```text
//! f(t) = mn + (mx - mn) * (1 / (1 + exp(-rsp (t - sos))) + 1 / (1 + exp(rau (t - eos))) - 1)
//! ```
//!
//! fit by weighted Levenberg-Marquardt least squares inside an iteratively
//! reweighted loop: after each pass, points lying below the curve (clouds,
//! snow, residual noise) are down-weighted with a bisquare function and the
//! fit is redone.

use crate::config::{FitConfig, PhenologyConfig};
use crate::error::{CurveFitError, PhenologyError, Result};
use crate::helpers::{median, NUMERICAL_EPS};
use crate::season::SeasonWindow;
use crate::series::WeightedSeries;
use nalgebra::{Matrix6, Vector6};
use std::ops::Range;

/// Fewest points a fit is attempted with (parameters + 1).
pub const MIN_FIT_POINTS: usize = 7;

/// Initial Levenberg-Marquardt damping.
const LM_LAMBDA_INIT: f64 = 1e-3;
/// Damping beyond which a pass gives up looking for a better step.
const LM_LAMBDA_MAX: f64 = 1e10;

// ============================================================================
// Model
// ============================================================================

/// Parameters of a double-logistic season curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DoubleLogistic {
    /// Baseline (dormant season level)
    pub mn: f64,
    /// Peak level
    pub mx: f64,
    /// Green-up inflection day
    pub sos: f64,
    /// Green-up slope (1/day)
    pub rsp: f64,
    /// Senescence inflection day
    pub eos: f64,
    /// Senescence slope (1/day)
    pub rau: f64,
}

#[inline]
fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

impl DoubleLogistic {
    /// Curve value at day `t`.
    #[inline]
    pub fn eval(&self, t: f64) -> f64 {
        let s1 = logistic(self.rsp * (t - self.sos));
        let s2 = logistic(-self.rau * (t - self.eos));
        self.mn + (self.mx - self.mn) * (s1 + s2 - 1.0)
    }

    /// Curve value and gradient with respect to `(mn, mx, sos, rsp, eos, rau)`.
    fn eval_with_gradient(&self, t: f64) -> (f64, Vector6<f64>) {
        let a = self.mx - self.mn;
        let s1 = logistic(self.rsp * (t - self.sos));
        let s2 = logistic(-self.rau * (t - self.eos));
        let g = s1 + s2 - 1.0;
        let d1 = s1 * (1.0 - s1);
        let d2 = s2 * (1.0 - s2);

        let grad = Vector6::new(
            1.0 - g,
            g,
            -a * self.rsp * d1,
            a * (t - self.sos) * d1,
            a * self.rau * d2,
            -a * (t - self.eos) * d2,
        );
        (self.mn + a * g, grad)
    }

    /// Peak level above baseline.
    pub fn amplitude(&self) -> f64 {
        self.mx - self.mn
    }

    /// Same curve moved `dt` days later.
    pub fn shifted(&self, dt: f64) -> Self {
        Self {
            sos: self.sos + dt,
            eos: self.eos + dt,
            ..*self
        }
    }

    pub fn is_finite(&self) -> bool {
        self.to_vector().iter().all(|v| v.is_finite())
    }

    fn to_vector(self) -> Vector6<f64> {
        Vector6::new(self.mn, self.mx, self.sos, self.rsp, self.eos, self.rau)
    }

    fn from_vector(v: &Vector6<f64>) -> Self {
        Self {
            mn: v[0],
            mx: v[1],
            sos: v[2],
            rsp: v[3],
            eos: v[4],
            rau: v[5],
        }
    }
}

/// Box constraints applied after every step.
#[derive(Debug, Clone, Copy)]
struct ParamBounds {
    t_min: f64,
    t_max: f64,
    slope_min: f64,
    slope_max: f64,
}

impl ParamBounds {
    fn project(&self, p: &mut DoubleLogistic) {
        p.rsp = p.rsp.clamp(self.slope_min, self.slope_max);
        p.rau = p.rau.clamp(self.slope_min, self.slope_max);
        p.sos = p.sos.clamp(self.t_min, self.t_max);
        p.eos = p.eos.clamp(self.t_min, self.t_max);
        if p.eos < p.sos {
            let mid = 0.5 * (p.sos + p.eos);
            p.sos = mid;
            p.eos = mid;
        }
    }
}

// ============================================================================
// Levenberg-Marquardt
// ============================================================================

fn weighted_cost(t: &[f64], y: &[f64], w: &[f64], p: &DoubleLogistic) -> f64 {
    t.iter()
        .zip(y)
        .zip(w)
        .map(|((&ti, &yi), &wi)| wi * (yi - p.eval(ti)).powi(2))
        .sum()
}

/// Accumulate `J'WJ` and `J'Wr`.
fn normal_equations(
    t: &[f64],
    y: &[f64],
    w: &[f64],
    p: &DoubleLogistic,
) -> (Matrix6<f64>, Vector6<f64>) {
    let mut h = Matrix6::zeros();
    let mut g = Vector6::zeros();
    for ((&ti, &yi), &wi) in t.iter().zip(y).zip(w) {
        let (fi, grad) = p.eval_with_gradient(ti);
        h += grad * grad.transpose() * wi;
        g += grad * (wi * (yi - fi));
    }
    (h, g)
}

/// One weighted least-squares pass. Returns the fitted parameters and cost.
fn levenberg_marquardt(
    t: &[f64],
    y: &[f64],
    w: &[f64],
    init: DoubleLogistic,
    bounds: &ParamBounds,
    config: &FitConfig,
) -> Option<(DoubleLogistic, f64)> {
    let mut p = init;
    bounds.project(&mut p);
    let mut cost = weighted_cost(t, y, w, &p);
    if !cost.is_finite() {
        return None;
    }

    let mut lambda = LM_LAMBDA_INIT;
    for _ in 0..config.max_lm_iterations {
        let (h, g) = normal_equations(t, y, w, &p);
        let mut improved = false;
        let mut converged = false;

        while lambda < LM_LAMBDA_MAX {
            let mut a = h;
            for i in 0..6 {
                a[(i, i)] += lambda * h[(i, i)].max(1e-12);
            }
            let Some(delta) = a.cholesky().map(|c| c.solve(&g)) else {
                lambda *= 10.0;
                continue;
            };

            let mut trial = DoubleLogistic::from_vector(&(p.to_vector() + delta));
            bounds.project(&mut trial);
            let trial_cost = weighted_cost(t, y, w, &trial);

            if trial_cost.is_finite() && trial_cost < cost {
                converged = (cost - trial_cost) <= config.tolerance * cost.max(f64::MIN_POSITIVE);
                p = trial;
                cost = trial_cost;
                lambda = (lambda / 10.0).max(1e-12);
                improved = true;
                break;
            }
            lambda *= 10.0;
        }

        if !improved || converged {
            break;
        }
    }

    (p.is_finite() && cost.is_finite()).then_some((p, cost))
}

// ============================================================================
// Initial guess and reweighting
// ============================================================================

/// Day positions that seed a fit: the two troughs and the peak.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonAnchors {
    pub left: f64,
    pub peak: f64,
    pub right: f64,
}

/// Time of the first sample in `idx` order whose value reaches `level`.
fn first_reach(t: &[f64], y: &[f64], idx: &[usize], level: f64) -> Option<f64> {
    idx.iter().find(|&&i| y[i] >= level).map(|&i| t[i])
}

/// Data-driven starting point for the fit.
///
/// Baseline and peak come from the well-weighted values; inflections from the
/// half-amplitude crossings on each limb, falling back to trough-peak
/// midpoints; slopes from the quarter-to-three-quarter rise time.
pub fn initial_guess(
    t: &[f64],
    y: &[f64],
    w: &[f64],
    anchors: SeasonAnchors,
    config: &FitConfig,
) -> DoubleLogistic {
    let trusted: Vec<usize> = (0..y.len()).filter(|&i| w[i] >= config.valid_weight).collect();
    let pool: Vec<usize> = if trusted.len() >= MIN_FIT_POINTS {
        trusted
    } else {
        (0..y.len()).collect()
    };

    let (mn, mx) = pool.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
        (lo.min(y[i]), hi.max(y[i]))
    });
    let amp = (mx - mn).max(NUMERICAL_EPS);
    let level = |frac: f64| mn + frac * amp;

    let rising: Vec<usize> = pool.iter().copied().filter(|&i| t[i] <= anchors.peak).collect();
    let falling: Vec<usize> = pool
        .iter()
        .rev()
        .copied()
        .filter(|&i| t[i] >= anchors.peak)
        .collect();

    let sos = first_reach(t, y, &rising, level(0.5)).unwrap_or(0.5 * (anchors.left + anchors.peak));
    let eos = first_reach(t, y, &falling, level(0.5)).unwrap_or(0.5 * (anchors.peak + anchors.right));

    let slope = |lo: Option<f64>, hi: Option<f64>, fallback: f64| -> f64 {
        let raw = match (lo, hi) {
            (Some(a), Some(b)) if (b - a).abs() > NUMERICAL_EPS => 9f64.ln() / (b - a).abs(),
            _ => 4.0 / fallback.max(1.0),
        };
        raw.clamp(config.slope_min, config.slope_max)
    };
    let rsp = slope(
        first_reach(t, y, &rising, level(0.25)),
        first_reach(t, y, &rising, level(0.75)),
        anchors.peak - anchors.left,
    );
    let rau = slope(
        first_reach(t, y, &falling, level(0.25)),
        first_reach(t, y, &falling, level(0.75)),
        anchors.right - anchors.peak,
    );

    DoubleLogistic {
        mn,
        mx,
        sos,
        rsp,
        eos,
        rau,
    }
}

/// Bisquare weights that only penalize points below the curve.
///
/// Returns `None` when the residual scale vanishes (nothing left to reweight).
fn bisquare_weights(y: &[f64], fitted: &[f64], w0: &[f64], floor: f64) -> Option<Vec<f64>> {
    let residuals: Vec<f64> = y.iter().zip(fitted).map(|(a, b)| a - b).collect();
    let abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    let scale = 6.0 * median(&abs)?;
    if scale <= NUMERICAL_EPS {
        return None;
    }

    Some(
        residuals
            .iter()
            .zip(w0)
            .map(|(&r, &wi)| {
                let bisq = if r < 0.0 {
                    let u = r / scale;
                    if u.abs() < 1.0 {
                        (1.0 - u * u).powi(2)
                    } else {
                        0.0
                    }
                } else {
                    1.0
                };
                (wi * bisq).max(floor.min(wi))
            })
            .collect(),
    )
}

/// Result of a robust fit on arbitrary samples.
#[derive(Debug, Clone)]
pub struct CurveFit {
    pub params: DoubleLogistic,
    /// Weights used by the last pass
    pub weights: Vec<f64>,
    /// Weighted residual sum of squares of the last pass
    pub cost: f64,
    /// Number of passes actually run
    pub passes: usize,
}

/// Fit a double-logistic curve with `passes` rounds of reweighting.
///
/// `t` should be in a local frame (close to zero) for good conditioning.
///
/// # Errors
/// [`CurveFitError`] on unusable samples, a diverging pass or a flat result.
pub fn fit_double_logistic(
    t: &[f64],
    y: &[f64],
    w: &[f64],
    anchors: SeasonAnchors,
    passes: usize,
    config: &FitConfig,
) -> std::result::Result<CurveFit, CurveFitError> {
    let n = t.len();
    if y.len() != n || w.len() != n {
        return Err(CurveFitError::LengthMismatch);
    }
    if n < MIN_FIT_POINTS {
        return Err(CurveFitError::TooFewPoints(n));
    }
    if y.iter().chain(w).any(|v| !v.is_finite()) {
        return Err(CurveFitError::NonFiniteSamples);
    }

    let (t_min, t_max) = (t[0].min(t[n - 1]), t[0].max(t[n - 1]));
    let bounds = ParamBounds {
        t_min,
        t_max,
        slope_min: config.slope_min,
        slope_max: config.slope_max,
    };

    let mut params = initial_guess(t, y, w, anchors, config);
    let mut weights = w.to_vec();
    let mut cost = f64::NAN;
    let mut done = 0;

    for pass in 0..passes.max(1) {
        let (p, c) = levenberg_marquardt(t, y, &weights, params, &bounds, config)
            .ok_or(CurveFitError::NotConverged(pass + 1))?;
        params = p;
        cost = c;
        done = pass + 1;

        if done == passes {
            break;
        }
        let fitted: Vec<f64> = t.iter().map(|&ti| params.eval(ti)).collect();
        match bisquare_weights(y, &fitted, w, config.weight_floor) {
            Some(next) => weights = next,
            None => break,
        }
    }

    if params.amplitude() <= NUMERICAL_EPS {
        return Err(CurveFitError::NonPositiveAmplitude);
    }

    Ok(CurveFit {
        params,
        weights,
        cost,
        passes: done,
    })
}

// ============================================================================
// Per-year season fitting
// ============================================================================

/// A fitted yearly season.
#[derive(Debug, Clone)]
pub struct FittedCurve {
    /// Calendar year index
    pub year: usize,
    /// Parameters in absolute days
    pub params: DoubleLogistic,
    /// Absolute-day span the fit borrowed points from
    pub domain: (f64, f64),
    /// Daily fitted values of the calendar year, NaN outside the domain.
    /// `y_fit[j]` is day-of-year `j + 1`.
    pub y_fit: Vec<f64>,
}

/// Sample gap across the half-amplitude crossing of one limb.
///
/// `order` walks the limb from its trough toward the peak. Returns the index
/// distance between the first well-weighted sample above `mid` and the last
/// well-weighted sample at or below `mid` before it, or `None` when either
/// side of the crossing has no well-weighted sample.
fn crossing_gap(
    y: &[f64],
    w: &[f64],
    order: impl Iterator<Item = usize>,
    mid: f64,
    valid_weight: f64,
) -> Option<usize> {
    let mut below = None;
    for i in order.filter(|&i| w[i] >= valid_weight) {
        if y[i] > mid {
            return below.map(|b: usize| b.abs_diff(i));
        }
        below = Some(i);
    }
    None
}

/// Check that both limbs of a window are observed where they cross
/// half amplitude.
fn check_limbs(
    series: &WeightedSeries,
    window: &SeasonWindow,
    fc: &FitConfig,
) -> std::result::Result<(), String> {
    let last = series.len().saturating_sub(1);
    let start = window.start.min(last);
    let peak = window.peak.clamp(start, last);
    let end = window.end.clamp(peak, last);
    let (lo, hi) = (start..=end)
        .filter(|&i| series.w[i] >= fc.valid_weight)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), i| {
            (lo.min(series.y[i]), hi.max(series.y[i]))
        });
    if hi - lo <= NUMERICAL_EPS {
        return Err("no well-weighted points in window".to_string());
    }
    let mid = lo + 0.5 * (hi - lo);

    let (y, w) = (&series.y, &series.w);
    let limbs = [
        ("green-up", crossing_gap(y, w, start..=peak, mid, fc.valid_weight)),
        ("senescence", crossing_gap(y, w, (peak..=end).rev(), mid, fc.valid_weight)),
    ];
    for (name, gap) in limbs {
        match gap {
            Some(g) if g <= fc.max_crossing_gap => {}
            Some(g) => return Err(format!("{name} crossing spans {g} samples")),
            None => return Err(format!("{name} crossing not observed")),
        }
    }
    Ok(())
}

/// Sample range a window's fit borrows points from.
pub fn borrowed_range(window: &SeasonWindow, n: usize, config: &PhenologyConfig) -> Range<usize> {
    let months = window
        .extend_months
        .clamp(config.fit.min_extend_months, config.fit.max_extend_months);
    let extra = (months * config.samples_per_month()).round() as usize;
    let start = window.start.saturating_sub(extra);
    let end = (window.end + extra + 1).min(n);
    start..end
}

/// Daily values of `params` over calendar year `year`, NaN outside `domain`.
pub fn daily_values(
    params: &DoubleLogistic,
    year: usize,
    days_per_year: usize,
    domain: (f64, f64),
) -> Vec<f64> {
    let offset = (year * days_per_year) as f64;
    (0..days_per_year)
        .map(|j| {
            let t = offset + j as f64;
            if t >= domain.0 && t <= domain.1 {
                params.eval(t)
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Fit the double-logistic curve of one season window.
///
/// # Errors
/// [`PhenologyError::FitFailure`] when the borrowed range has too few
/// well-weighted points, a limb's half-amplitude crossing falls in a data
/// gap or the fit fails. Other years are unaffected.
pub fn fit_season(
    series: &WeightedSeries,
    window: &SeasonWindow,
    config: &PhenologyConfig,
) -> Result<FittedCurve> {
    let fail = |reason: String| PhenologyError::FitFailure {
        year: window.year,
        reason,
    };
    let fc = &config.fit;

    let range = borrowed_range(window, series.len(), config);
    let n = range.len();
    if n < MIN_FIT_POINTS {
        return Err(fail(format!("{n} points in window")));
    }
    let valid = series.w[range.clone()]
        .iter()
        .filter(|&&w| w >= fc.valid_weight)
        .count();
    let fraction = valid as f64 / n as f64;
    if fraction < fc.min_valid_fraction {
        return Err(fail(format!(
            "valid fraction {fraction:.2} below {:.2}",
            fc.min_valid_fraction
        )));
    }

    check_limbs(series, window, fc).map_err(fail)?;

    // Local time frame for conditioning
    let t0 = series.t[range.start];
    let t: Vec<f64> = series.t[range.clone()].iter().map(|&v| v - t0).collect();
    let y = &series.y[range.clone()];
    let w = &series.w[range.clone()];
    let anchors = SeasonAnchors {
        left: series.t[window.start] - t0,
        peak: series.t[window.peak] - t0,
        right: series.t[window.end.min(series.len() - 1)] - t0,
    };

    let fit = fit_double_logistic(&t, y, w, anchors, fc.iterations, fc)
        .map_err(|err| fail(err.to_string()))?;

    let params = fit.params.shifted(t0);
    let domain = (series.t[range.start], series.t[range.end - 1]);
    let y_fit = daily_values(&params, window.year, config.days_per_year, domain);

    Ok(FittedCurve {
        year: window.year,
        params,
        domain,
        y_fit,
    })
}
