use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::{FREQ_STEP, MAX_FREQ, MIN_FREQ};

/// A struct to hold frequency and SPL data.
///
/// Frequencies are expected in ascending order. Transformations never mutate
/// a curve in place: they return a new curve on the same frequency grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    /// Frequency points in Hz
    pub freq: Array1<f64>,
    /// Sound Pressure Level in dB
    pub spl: Array1<f64>,
}

impl Curve {
    /// Build a curve from matching frequency and SPL arrays
    pub fn new(freq: Array1<f64>, spl: Array1<f64>) -> Self {
        debug_assert_eq!(freq.len(), spl.len());
        Self { freq, spl }
    }

    /// Build a curve from `(freq, spl)` pairs
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (freq, spl): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
        Self {
            freq: Array1::from(freq),
            spl: Array1::from(spl),
        }
    }

    /// Curve with the same level at every frequency
    pub fn flat(freq: &Array1<f64>, level_db: f64) -> Self {
        Self {
            freq: freq.clone(),
            spl: Array1::from_elem(freq.len(), level_db),
        }
    }

    pub fn len(&self) -> usize {
        self.freq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.freq.is_empty()
    }

    /// Iterate over `(freq, spl)` pairs
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.freq.iter().copied().zip(self.spl.iter().copied())
    }

    /// Index of the grid point closest to `freq`, if it lies within `tolerance` Hz
    ///
    /// Ties resolve to the lower frequency.
    pub fn nearest_index(&self, freq: f64, tolerance: f64) -> Option<usize> {
        let n = self.freq.len();
        if n == 0 || !freq.is_finite() {
            return None;
        }

        // First index whose frequency is >= freq
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = (lo + hi) / 2;
            if self.freq[mid] < freq {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }

        let mut best = None;
        let mut best_dist = f64::INFINITY;
        for idx in [lo.checked_sub(1), (lo < n).then_some(lo)]
            .into_iter()
            .flatten()
        {
            let dist = (self.freq[idx] - freq).abs();
            if dist < best_dist {
                best_dist = dist;
                best = Some(idx);
            }
        }

        best.filter(|_| best_dist <= tolerance)
    }

    /// SPL at the grid point closest to `freq` within `tolerance` Hz
    pub fn value_near(&self, freq: f64, tolerance: f64) -> Option<f64> {
        self.nearest_index(freq, tolerance).map(|i| self.spl[i])
    }

    /// Mean SPL over `[f_min, f_max]`, with the number of points used
    pub fn band_mean(&self, f_min: f64, f_max: f64) -> Option<(f64, usize)> {
        let mut sum = 0.0;
        let mut count = 0usize;
        for (f, spl) in self.points() {
            if f >= f_min && f <= f_max {
                sum += spl;
                count += 1;
            }
        }
        (count > 0).then(|| (sum / count as f64, count))
    }

    /// New curve shifted by a constant level
    pub fn shifted(&self, offset_db: f64) -> Curve {
        Curve {
            freq: self.freq.clone(),
            spl: &self.spl + offset_db,
        }
    }

    /// New curve with `f(freq, spl)` applied to every point
    pub fn map_points<F>(&self, mut f: F) -> Curve
    where
        F: FnMut(f64, f64) -> f64,
    {
        let spl = self.points().map(|(freq, spl)| f(freq, spl)).collect();
        Curve {
            freq: self.freq.clone(),
            spl: Array1::from_vec(spl),
        }
    }
}

/// The fixed simulation grid: 20 to 300 Hz inclusive in 1 Hz steps
pub fn analysis_frequencies() -> Array1<f64> {
    let count = ((MAX_FREQ - MIN_FREQ) / FREQ_STEP).round() as usize + 1;
    Array1::from_iter((0..count).map(|i| MIN_FREQ + i as f64 * FREQ_STEP))
}
