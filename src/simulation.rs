//! Synthetic pixel series.
//!
//! Generates multi-year 8-day composite series from double-logistic season
//! curves, with optional Gaussian noise, cloud drops and missing samples.
//! Season parameters are given in day-of-year coordinates: a sample at
//! position `k` within its year is evaluated at DOY `1 + k * cadence`.
//!
//! All randomness goes through a seeded [`StdRng`] so tests and benchmarks
//! are reproducible; without a seed the generator draws from entropy.

use crate::config::PhenologyConfig;
use crate::cube::PixelCube;
use crate::curve::DoubleLogistic;
use rand::prelude::*;
use rand_distr::Normal;

/// Sentinel written for invalid samples by [`SeriesSimulator::sentinels`].
pub const SENTINEL: f64 = -3000.0;

/// A season with SOS = 100, POS = 180, EOS = 260 at a 30 % amplitude
/// threshold and a peak value close to 0.8.
///
/// The inflection days sit `ln(7/3) / rate` inside the threshold days so the
/// curve crosses `mn + 0.3 (mx - mn)` exactly at DOY 100 and 260.
pub fn reference_season() -> DoubleLogistic {
    let rate = 0.1;
    let shift = (7.0f64 / 3.0).ln() / rate;
    DoubleLogistic {
        mn: 0.1,
        mx: 0.8,
        sos: 100.0 + shift,
        rsp: rate,
        eos: 260.0 - shift,
        rau: rate,
    }
}

/// Builder for synthetic single-pixel series.
#[derive(Debug, Clone)]
pub struct SeriesSimulator {
    seasons: Vec<DoubleLogistic>,
    periods_per_year: usize,
    years: usize,
    cadence_days: f64,
    noise_sd: f64,
    cloud_fraction: f64,
    missing_fraction: f64,
    sentinel_fraction: f64,
    seed: Option<u64>,
}

impl SeriesSimulator {
    /// Identical seasons in every year.
    pub fn new(season: DoubleLogistic, config: &PhenologyConfig) -> Self {
        Self::with_seasons(vec![season; config.years], config)
    }

    /// One season per year. Years beyond `seasons.len()` reuse the last one.
    pub fn with_seasons(seasons: Vec<DoubleLogistic>, config: &PhenologyConfig) -> Self {
        Self {
            seasons,
            periods_per_year: config.periods_per_year,
            years: config.years,
            cadence_days: config.cadence_days,
            noise_sd: 0.0,
            cloud_fraction: 0.0,
            missing_fraction: 0.0,
            sentinel_fraction: 0.0,
            seed: None,
        }
    }

    /// Additive Gaussian noise with standard deviation `sd`.
    pub fn noise(mut self, sd: f64) -> Self {
        self.noise_sd = sd.max(0.0);
        self
    }

    /// Fraction of samples dropped to 30-60 % of their value.
    pub fn clouds(mut self, fraction: f64) -> Self {
        self.cloud_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Fraction of samples replaced by NaN.
    pub fn missing(mut self, fraction: f64) -> Self {
        self.missing_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Fraction of samples replaced by [`SENTINEL`].
    pub fn sentinels(mut self, fraction: f64) -> Self {
        self.sentinel_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn season(&self, year: usize) -> Option<&DoubleLogistic> {
        self.seasons.get(year).or_else(|| self.seasons.last())
    }

    /// Noise-free value of sample `i`.
    pub fn clean_value(&self, i: usize) -> f64 {
        let p = self.periods_per_year.max(1);
        let doy = 1.0 + (i % p) as f64 * self.cadence_days;
        self.season(i / p).map_or(f64::NAN, |s| s.eval(doy))
    }

    /// Generate one series of `years * periods_per_year` samples.
    pub fn series(&self) -> Vec<f64> {
        let mut rng = match self.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        self.generate(&mut rng)
    }

    fn generate(&self, rng: &mut StdRng) -> Vec<f64> {
        let n = self.years * self.periods_per_year;
        let normal = Normal::new(0.0, self.noise_sd).ok();

        (0..n)
            .map(|i| {
                let mut v = self.clean_value(i);
                if let Some(normal) = normal.filter(|_| self.noise_sd > 0.0) {
                    v += rng.sample::<f64, _>(normal);
                }
                if rng.gen::<f64>() < self.cloud_fraction {
                    v *= rng.gen_range(0.3..0.6);
                }
                let u = rng.gen::<f64>();
                if u < self.missing_fraction {
                    f64::NAN
                } else if u < self.missing_fraction + self.sentinel_fraction {
                    SENTINEL
                } else {
                    v
                }
            })
            .collect()
    }

    /// Generate `n_pixels` independent series as a cube.
    ///
    /// With a seed, pixel `k` is identical to a single series generated with
    /// seed `seed + k`.
    pub fn cube(&self, n_pixels: usize) -> PixelCube {
        let rows: Vec<Vec<f64>> = (0..n_pixels)
            .map(|k| {
                let mut rng = match self.seed {
                    Some(s) => StdRng::seed_from_u64(s.wrapping_add(k as u64)),
                    None => StdRng::from_entropy(),
                };
                self.generate(&mut rng)
            })
            .collect();
        PixelCube::from_rows(&rows).unwrap_or_else(|| PixelCube::empty(self.years * self.periods_per_year))
    }
}
