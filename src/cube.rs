//! In-memory raster cube types.
//!
//! [`PixelCube`] holds the input: one raw time series per pixel. [`BandStack`]
//! holds the output: one row of metric bands per pixel. Both store a flat
//! `Vec<f64>` in row-major layout so that a pixel's series (or bands) is one
//! contiguous slice, and carry their dimensions alongside the data.

use crate::result::{Metric, PhenologyResult};

/// Anything that can hand out raw per-pixel series to the batch driver.
pub trait PixelSource {
    /// Number of pixels.
    fn n_pixels(&self) -> usize;

    /// Series length of pixel `index`.
    fn series_len(&self, index: usize) -> usize {
        self.pixel(index).len()
    }

    /// Raw series of pixel `index`.
    ///
    /// # Panics
    /// May panic if `index >= n_pixels()`.
    fn pixel(&self, index: usize) -> &[f64];
}

/// Pixel × time cube, row-major.
///
/// Element `(pixel, sample)` is at index `pixel * series_len + sample`.
///
/// # Examples
///
/// ```
/// use phenofit_core::cube::PixelCube;
///
/// let cube = PixelCube::from_flat(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 2, 3).unwrap();
/// assert_eq!(cube.shape(), (2, 3));
/// assert_eq!(cube.row(1), &[0.4, 0.5, 0.6]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct PixelCube {
    data: Vec<f64>,
    n_pixels: usize,
    series_len: usize,
}

impl PixelCube {
    /// Create from flat row-major data.
    ///
    /// Returns `None` if `data.len() != n_pixels * series_len`.
    pub fn from_flat(data: Vec<f64>, n_pixels: usize, series_len: usize) -> Option<Self> {
        if data.len() != n_pixels * series_len {
            return None;
        }
        Some(Self {
            data,
            n_pixels,
            series_len,
        })
    }

    /// Create from per-pixel series (copies the data).
    ///
    /// Returns `None` if the rows differ in length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Option<Self> {
        let series_len = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != series_len) {
            return None;
        }
        Some(Self {
            data: rows.concat(),
            n_pixels: rows.len(),
            series_len,
        })
    }

    /// A cube without pixels.
    pub fn empty(series_len: usize) -> Self {
        Self {
            data: Vec::new(),
            n_pixels: 0,
            series_len,
        }
    }

    #[inline]
    pub fn n_pixels(&self) -> usize {
        self.n_pixels
    }

    #[inline]
    pub fn series_len(&self) -> usize {
        self.series_len
    }

    /// Dimensions as `(n_pixels, series_len)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_pixels, self.series_len)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.n_pixels == 0
    }

    /// Series of one pixel (zero-copy).
    ///
    /// # Panics
    /// Panics if `pixel >= n_pixels`.
    #[inline]
    pub fn row(&self, pixel: usize) -> &[f64] {
        let start = pixel * self.series_len;
        &self.data[start..start + self.series_len]
    }

    /// Mutable series of one pixel.
    #[inline]
    pub fn row_mut(&mut self, pixel: usize) -> &mut [f64] {
        let start = pixel * self.series_len;
        &mut self.data[start..start + self.series_len]
    }

    /// Element at `(pixel, sample)` with bounds checking.
    #[inline]
    pub fn get(&self, pixel: usize, sample: usize) -> Option<f64> {
        if pixel < self.n_pixels && sample < self.series_len {
            Some(self.data[pixel * self.series_len + sample])
        } else {
            None
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

impl PixelSource for PixelCube {
    fn n_pixels(&self) -> usize {
        self.n_pixels
    }

    fn series_len(&self, _index: usize) -> usize {
        self.series_len
    }

    fn pixel(&self, index: usize) -> &[f64] {
        self.row(index)
    }
}

impl PixelSource for [Vec<f64>] {
    fn n_pixels(&self) -> usize {
        self.len()
    }

    fn pixel(&self, index: usize) -> &[f64] {
        &self[index]
    }
}

impl PixelSource for Vec<Vec<f64>> {
    fn n_pixels(&self) -> usize {
        self.len()
    }

    fn pixel(&self, index: usize) -> &[f64] {
        &self[index]
    }
}

/// Pixel × band output stack, row-major.
///
/// With `years` years, band `b` (0-based) of a row holds metric
/// `Metric::ALL[b / years]` of year `b % years`.
#[derive(Debug, Clone, PartialEq)]
pub struct BandStack {
    data: Vec<f64>,
    n_pixels: usize,
    years: usize,
}

impl BandStack {
    /// All-NaN stack for `n_pixels` pixels over `years` years.
    pub fn nan(n_pixels: usize, years: usize) -> Self {
        Self {
            data: vec![f64::NAN; n_pixels * 4 * years],
            n_pixels,
            years,
        }
    }

    /// Stack per-pixel results; every result must cover `years` years.
    ///
    /// Returns `None` on a year-count mismatch.
    pub fn from_results(results: &[PhenologyResult], years: usize) -> Option<Self> {
        let mut stack = Self::nan(results.len(), years);
        for (pixel, r) in results.iter().enumerate() {
            if !stack.set_row(pixel, r) {
                return None;
            }
        }
        Some(stack)
    }

    /// Write the bands of one pixel. Returns `false` (leaving the row
    /// untouched) when the pixel is out of range or the year count differs.
    pub fn set_row(&mut self, pixel: usize, result: &PhenologyResult) -> bool {
        if pixel >= self.n_pixels || result.years() != self.years {
            return false;
        }
        let nb = self.n_bands();
        self.data[pixel * nb..(pixel + 1) * nb].copy_from_slice(&result.to_bands());
        true
    }

    #[inline]
    pub fn n_pixels(&self) -> usize {
        self.n_pixels
    }

    #[inline]
    pub fn n_bands(&self) -> usize {
        4 * self.years
    }

    #[inline]
    pub fn years(&self) -> usize {
        self.years
    }

    /// Dimensions as `(n_pixels, n_bands)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_pixels, self.n_bands())
    }

    /// Bands of one pixel (zero-copy).
    ///
    /// # Panics
    /// Panics if `pixel >= n_pixels`.
    #[inline]
    pub fn row(&self, pixel: usize) -> &[f64] {
        let nb = self.n_bands();
        &self.data[pixel * nb..(pixel + 1) * nb]
    }

    /// One band across all pixels as a new `Vec<f64>`.
    ///
    /// This is O(n_pixels) because bands are not contiguous in row-major
    /// layout.
    pub fn band(&self, band: usize) -> Vec<f64> {
        let nb = self.n_bands();
        (0..self.n_pixels).map(|p| self.data[p * nb + band]).collect()
    }

    /// One metric of one year across all pixels.
    pub fn metric(&self, metric: Metric, year: usize) -> Vec<f64> {
        self.band(metric.band(year, self.years))
    }

    /// Element at `(pixel, band)` with bounds checking.
    #[inline]
    pub fn get(&self, pixel: usize, band: usize) -> Option<f64> {
        let nb = self.n_bands();
        if pixel < self.n_pixels && band < nb {
            Some(self.data[pixel * nb + band])
        } else {
            None
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }
}

impl std::fmt::Display for BandStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BandStack({} pixels x {} bands)", self.n_pixels, self.n_bands())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============== PixelCube tests ==============

    #[test]
    fn test_from_flat_validates_shape() {
        assert!(PixelCube::from_flat(vec![0.0; 6], 2, 3).is_some());
        assert!(PixelCube::from_flat(vec![0.0; 5], 2, 3).is_none());
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]];
        let cube = PixelCube::from_rows(&rows).unwrap();
        assert_eq!(cube.shape(), (3, 2));
        assert_eq!(cube.row(2), &[5.0, 6.0]);
        assert_eq!(cube.get(1, 0), Some(3.0));
        assert_eq!(cube.get(3, 0), None);

        let ragged = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(PixelCube::from_rows(&ragged).is_none());
        assert!(PixelCube::from_rows(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_row_mut() {
        let mut cube = PixelCube::from_flat(vec![0.0; 4], 2, 2).unwrap();
        cube.row_mut(1)[0] = 7.0;
        assert_eq!(cube.as_slice(), &[0.0, 0.0, 7.0, 0.0]);
    }

    #[test]
    fn test_pixel_source_impls() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![4.0]];
        assert_eq!(rows.n_pixels(), 2);
        assert_eq!(PixelSource::series_len(&rows, 1), 1);
        assert_eq!(rows.as_slice().pixel(0), &[1.0, 2.0, 3.0]);

        let cube = PixelCube::from_flat(vec![1.0, 2.0, 3.0, 4.0], 2, 2).unwrap();
        assert_eq!(PixelSource::n_pixels(&cube), 2);
        assert_eq!(cube.pixel(1), &[3.0, 4.0]);
    }

    // ============== BandStack tests ==============

    #[test]
    fn test_band_stack_layout() {
        let mut a = PhenologyResult::nan(2);
        a.sos = vec![100.0, 101.0];
        a.pop = vec![0.7, 0.8];
        let b = PhenologyResult::nan(2);

        let stack = BandStack::from_results(&[a, b], 2).unwrap();
        assert_eq!(stack.shape(), (2, 8));
        assert_eq!(stack.row(0)[..2], [100.0, 101.0]);
        assert_eq!(stack.get(0, 7), Some(0.8));
        assert!(stack.get(1, 0).unwrap().is_nan());
        assert_eq!(stack.get(2, 0), None);

        let sos_year1 = stack.metric(Metric::Sos, 1);
        assert_eq!(sos_year1[0], 101.0);
        assert!(sos_year1[1].is_nan());
        assert_eq!(stack.band(6)[0], 0.7);
    }

    #[test]
    fn test_band_stack_rejects_mismatch() {
        let results = vec![PhenologyResult::nan(2), PhenologyResult::nan(3)];
        assert!(BandStack::from_results(&results, 2).is_none());

        let mut stack = BandStack::nan(1, 2);
        assert!(!stack.set_row(1, &PhenologyResult::nan(2)));
        assert!(!stack.set_row(0, &PhenologyResult::nan(3)));
        assert!(stack.set_row(0, &PhenologyResult::nan(2)));
    }

    #[test]
    fn test_display() {
        let stack = BandStack::from_results(&[PhenologyResult::nan(12)], 12).unwrap();
        assert_eq!(format!("{}", stack), "BandStack(1 pixels x 48 bands)");
    }
}
