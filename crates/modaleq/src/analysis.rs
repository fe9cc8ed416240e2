//! Error analysis between two frequency responses.
//!
//! Copyright (C) 2025 Pierre Aubert pierre(at)spinorama(dot)org
//!
//! This program is free software: you can redistribute it and/or modify
//! it under the terms of the GNU General Public License as published by
//! the Free Software Foundation, either version 3 of the License, or
//! (at your option) any later version.
//!
//! This program is distributed in the hope that it will be useful,
//! but WITHOUT ANY WARRANTY; without even the implied warranty of
//! MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//! GNU General Public License for more details.
//!
//! You should have received a copy of the GNU General Public License
//! along with this program.  If not, see <https://www.gnu.org/licenses/>.
//!
//! Points of the two curves are matched by nearest frequency within
//! [`FREQUENCY_TOLERANCE_HZ`]. A positive error means the response is louder
//! than the target at that frequency.

use log::debug;
use serde::Serialize;

use crate::Curve;

/// Maximum distance between matched points of two curves (Hz)
pub const FREQUENCY_TOLERANCE_HZ: f64 = 1.0;

/// Lower bound of the level-alignment window (Hz)
pub const OFFSET_LOW_FREQ: f64 = 80.0;

/// Upper bound of the level-alignment window (Hz)
pub const OFFSET_HIGH_FREQ: f64 = 200.0;

/// Fewer points than this in the alignment window yield a zero offset
pub const MIN_OFFSET_POINTS: usize = 5;

/// Range of an aligned target level (dB)
pub const OFFSET_RANGE: (f64, f64) = (60.0, 95.0);

/// Error at one matched frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyError {
    pub freq: f64,
    /// `current_db - target_db`
    pub error: f64,
    pub current_db: f64,
    pub target_db: f64,
}

/// Summary of the deviation between a response and its target
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ErrorAnalysis {
    /// Root mean square of the errors (dB)
    pub rms_error: f64,
    /// Largest absolute error (dB)
    pub max_error: f64,
    /// Mean absolute error (dB)
    pub avg_error: f64,
    pub per_frequency: Vec<FrequencyError>,
}

impl ErrorAnalysis {
    /// Error at the matched point closest to `freq`
    pub fn error_near(&self, freq: f64, tolerance: f64) -> Option<f64> {
        self.per_frequency
            .iter()
            .filter(|e| (e.freq - freq).abs() <= tolerance)
            .min_by(|a, b| (a.freq - freq).abs().total_cmp(&(b.freq - freq).abs()))
            .map(|e| e.error)
    }
}

/// Compare `current` against `target`
///
/// Every point of `current` with a `target` point within 1 Hz contributes.
/// An empty overlap yields an all-zero analysis.
pub fn analyze_error(current: &Curve, target: &Curve) -> ErrorAnalysis {
    let per_frequency: Vec<FrequencyError> = current
        .points()
        .filter_map(|(freq, current_db)| {
            target
                .value_near(freq, FREQUENCY_TOLERANCE_HZ)
                .map(|target_db| FrequencyError {
                    freq,
                    error: current_db - target_db,
                    current_db,
                    target_db,
                })
        })
        .collect();

    if per_frequency.is_empty() {
        return ErrorAnalysis::default();
    }

    let n = per_frequency.len() as f64;
    let sum_sq: f64 = per_frequency.iter().map(|e| e.error * e.error).sum();
    let sum_abs: f64 = per_frequency.iter().map(|e| e.error.abs()).sum();
    let max_error = per_frequency
        .iter()
        .map(|e| e.error.abs())
        .fold(0.0_f64, f64::max);

    ErrorAnalysis {
        rms_error: (sum_sq / n).sqrt(),
        max_error,
        avg_error: sum_abs / n,
        per_frequency,
    }
}

/// Level offset aligning a preference curve with a response
///
/// Difference of the two curves' means over 80-200 Hz, clamped to
/// [60, 95] dB and rounded to 0.5 dB. Returns 0 when either curve has fewer
/// than [`MIN_OFFSET_POINTS`] points in the window.
pub fn calculate_optimal_offset(response: &Curve, target: &Curve) -> f64 {
    let window = |curve: &Curve| {
        curve
            .band_mean(OFFSET_LOW_FREQ, OFFSET_HIGH_FREQ)
            .filter(|&(_, count)| count >= MIN_OFFSET_POINTS)
            .map(|(mean, _)| mean)
    };

    match (window(response), window(target)) {
        (Some(response_mean), Some(target_mean)) => {
            let offset = (response_mean - target_mean).clamp(OFFSET_RANGE.0, OFFSET_RANGE.1);
            let rounded = (offset * 2.0).round() / 2.0;
            debug!(
                "target offset: response {:.2} dB, target {:.2} dB -> {:.1} dB",
                response_mean, target_mean, rounded
            );
            rounded
        }
        _ => 0.0,
    }
}

/// Shift a response so its 80-200 Hz mean sits at `level_db`
///
/// The simulator reports relative levels; this places them at a listening
/// level before the preference curve is aligned. Curves without points in the
/// window are returned unchanged.
pub fn align_level(curve: &Curve, level_db: f64) -> Curve {
    match curve.band_mean(OFFSET_LOW_FREQ, OFFSET_HIGH_FREQ) {
        Some((mean, _)) => curve.shifted(level_db - mean),
        None => curve.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modaleq_roomsim::analysis_frequencies;

    #[test]
    fn test_analyze_error_identical_curves() {
        let freqs = analysis_frequencies();
        let curve = Curve::flat(&freqs, 75.0);
        let analysis = analyze_error(&curve, &curve);
        assert_eq!(analysis.per_frequency.len(), freqs.len());
        assert_eq!(analysis.rms_error, 0.0);
        assert_eq!(analysis.max_error, 0.0);
    }

    #[test]
    fn test_analyze_error_sign_and_stats() {
        let current = Curve::from_points(vec![(50.0, 80.0), (51.0, 72.0)]);
        let target = Curve::from_points(vec![(50.0, 76.0), (51.0, 76.0)]);
        let analysis = analyze_error(&current, &target);
        assert_eq!(analysis.per_frequency[0].error, 4.0);
        assert_eq!(analysis.per_frequency[1].error, -4.0);
        assert_eq!(analysis.rms_error, 4.0);
        assert_eq!(analysis.max_error, 4.0);
        assert_eq!(analysis.avg_error, 4.0);
        assert_eq!(analysis.error_near(51.2, 0.5), Some(-4.0));
    }

    #[test]
    fn test_analyze_error_tolerance() {
        let current = Curve::from_points(vec![(50.0, 80.0), (60.0, 80.0)]);
        let target = Curve::from_points(vec![(50.6, 70.0), (62.0, 70.0)]);
        let analysis = analyze_error(&current, &target);
        // Only 50 Hz has a target point within 1 Hz
        assert_eq!(analysis.per_frequency.len(), 1);
        assert_eq!(analysis.per_frequency[0].freq, 50.0);
    }

    #[test]
    fn test_analyze_error_no_overlap() {
        let current = Curve::from_points(vec![(50.0, 80.0)]);
        let target = Curve::from_points(vec![(100.0, 70.0)]);
        assert_eq!(analyze_error(&current, &target), ErrorAnalysis::default());
    }

    #[test]
    fn test_optimal_offset_rounded_and_clamped() {
        let freqs = analysis_frequencies();
        let target = Curve::flat(&freqs, 0.0);

        let response = Curve::flat(&freqs, 75.2);
        assert_eq!(calculate_optimal_offset(&response, &target), 75.0);

        let response = Curve::flat(&freqs, 75.3);
        assert_eq!(calculate_optimal_offset(&response, &target), 75.5);

        let quiet = Curve::flat(&freqs, 20.0);
        assert_eq!(calculate_optimal_offset(&quiet, &target), 60.0);

        let loud = Curve::flat(&freqs, 120.0);
        assert_eq!(calculate_optimal_offset(&loud, &target), 95.0);
    }

    #[test]
    fn test_optimal_offset_insufficient_points() {
        let response = Curve::from_points(vec![(100.0, 80.0), (110.0, 80.0)]);
        let target = Curve::from_points(vec![(100.0, 0.0), (110.0, 0.0)]);
        assert_eq!(calculate_optimal_offset(&response, &target), 0.0);
    }

    #[test]
    fn test_align_level() {
        let freqs = analysis_frequencies();
        let curve = Curve::flat(&freqs, 12.0);
        let aligned = align_level(&curve, 75.0);
        let (mean, _) = aligned.band_mean(80.0, 200.0).unwrap();
        assert!((mean - 75.0).abs() < 1e-9);
    }
}
