//! The per-pixel output unit and its band layout.

use crate::metrics::{PeakMetrics, SeasonBounds};

/// One of the four phenology metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Start of season (day-of-year)
    Sos,
    /// End of season (day-of-year)
    Eos,
    /// Peak of season (day-of-year)
    Pos,
    /// Peak value
    Pop,
}

impl Metric {
    /// Metrics in output band order.
    pub const ALL: [Metric; 4] = [Metric::Sos, Metric::Eos, Metric::Pos, Metric::Pop];

    /// Position of this metric's block in the band stack.
    pub fn block(self) -> usize {
        match self {
            Metric::Sos => 0,
            Metric::Eos => 1,
            Metric::Pos => 2,
            Metric::Pop => 3,
        }
    }

    /// 0-based band index of `year` for this metric.
    pub fn band(self, year: usize, years: usize) -> usize {
        self.block() * years + year
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Sos => "SOS",
            Metric::Eos => "EOS",
            Metric::Pos => "POS",
            Metric::Pop => "POP",
        }
    }
}

/// Four per-year metric sequences of one pixel, NaN where unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct PhenologyResult {
    pub sos: Vec<f64>,
    pub eos: Vec<f64>,
    pub pos: Vec<f64>,
    pub pop: Vec<f64>,
}

impl PhenologyResult {
    /// All-NaN result for `years` years.
    pub fn nan(years: usize) -> Self {
        Self {
            sos: vec![f64::NAN; years],
            eos: vec![f64::NAN; years],
            pos: vec![f64::NAN; years],
            pop: vec![f64::NAN; years],
        }
    }

    pub fn years(&self) -> usize {
        self.sos.len()
    }

    /// Sequence of one metric.
    pub fn metric(&self, metric: Metric) -> &[f64] {
        match metric {
            Metric::Sos => &self.sos,
            Metric::Eos => &self.eos,
            Metric::Pos => &self.pos,
            Metric::Pop => &self.pop,
        }
    }

    /// Record the peak of `year`.
    pub fn set_peak(&mut self, year: usize, peak: PeakMetrics) {
        self.pos[year] = peak.pos as f64;
        self.pop[year] = peak.pop;
    }

    /// Record the season bounds of `year`.
    pub fn set_bounds(&mut self, year: usize, bounds: SeasonBounds) {
        self.sos[year] = bounds.sos as f64;
        self.eos[year] = bounds.eos as f64;
    }

    /// Whether every value is NaN.
    pub fn is_all_nan(&self) -> bool {
        Metric::ALL
            .iter()
            .all(|&m| self.metric(m).iter().all(|v| v.is_nan()))
    }

    /// Flatten to `SOS ‖ EOS ‖ POS ‖ POP`.
    pub fn to_bands(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(4 * self.years());
        for m in Metric::ALL {
            out.extend_from_slice(self.metric(m));
        }
        out
    }

    /// Inverse of [`to_bands`](Self::to_bands). `None` unless the length is a
    /// multiple of four.
    pub fn from_bands(bands: &[f64]) -> Option<Self> {
        if bands.len() % 4 != 0 {
            return None;
        }
        let years = bands.len() / 4;
        let block = |m: Metric| bands[m.block() * years..(m.block() + 1) * years].to_vec();
        Some(Self {
            sos: block(Metric::Sos),
            eos: block(Metric::Eos),
            pos: block(Metric::Pos),
            pop: block(Metric::Pop),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_layout() {
        assert_eq!(Metric::Sos.band(0, 12), 0);
        assert_eq!(Metric::Eos.band(0, 12), 12);
        assert_eq!(Metric::Pos.band(11, 12), 35);
        assert_eq!(Metric::Pop.band(11, 12), 47);
    }

    #[test]
    fn test_to_bands_order() {
        let mut result = PhenologyResult::nan(12);
        result.set_peak(
            3,
            PeakMetrics {
                pos: 180,
                pop: 0.8,
            },
        );
        result.set_bounds(3, SeasonBounds { sos: 100, eos: 260 });

        let bands = result.to_bands();
        assert_eq!(bands.len(), 48);
        assert_eq!(bands[Metric::Sos.band(3, 12)], 100.0);
        assert_eq!(bands[Metric::Eos.band(3, 12)], 260.0);
        assert_eq!(bands[Metric::Pos.band(3, 12)], 180.0);
        assert_eq!(bands[Metric::Pop.band(3, 12)], 0.8);
        assert_eq!(bands.iter().filter(|v| v.is_finite()).count(), 4);

        let back = PhenologyResult::from_bands(&bands).unwrap();
        assert_eq!(back.sos[3], 100.0);
        assert_eq!(back.pop[3], 0.8);
        assert!(back.sos[0].is_nan());
        assert!(PhenologyResult::from_bands(&[0.0; 5]).is_none());
    }

    #[test]
    fn test_nan_result() {
        let result = PhenologyResult::nan(12);
        assert!(result.is_all_nan());
        assert_eq!(result.to_bands().len(), 48);
    }
}
