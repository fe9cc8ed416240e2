//! Peak and dip detection in a frequency response.
//!
//! The response is first smoothed with a short moving average to suppress
//! numerical noise, then scanned for strict local extrema. Each extremum is
//! kept only if it stands out from its neighbourhood by more than a
//! zone-dependent prominence threshold.

use ndarray::Array1;
use serde::Serialize;

use crate::Curve;

/// Half-width of the moving average, in points
pub const SMOOTHING_HALF_WINDOW: usize = 3;

/// Half-width of the extremum neighbourhood, in points
pub const NEIGHBORHOOD: usize = 3;

/// Level drop defining a feature's width (dB)
pub const WIDTH_DROP_DB: f64 = 3.0;

/// Minimum prominence of a peak below / at-or-above the Schroeder frequency
const PEAK_PROMINENCE: (f64, f64) = (1.0, 0.8);

/// Minimum prominence of a dip below / at-or-above the Schroeder frequency
const DIP_PROMINENCE: (f64, f64) = (1.5, 1.0);

/// What a detected feature most likely is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    /// Peak below the Schroeder frequency
    Mode,
    /// Peak at or above the Schroeder frequency
    Resonance,
    Dip,
}

/// A peak or dip found in a response
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedFeature {
    /// Centre frequency in Hz
    pub frequency: f64,
    /// Response level at the centre (dB)
    pub amplitude: f64,
    /// Height above (or depth below) the neighbourhood (dB)
    pub prominence: f64,
    /// Width between the 3 dB crossings (Hz)
    pub width: f64,
    pub kind: FeatureKind,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Extremum {
    Peak,
    Dip,
}

/// Symmetric moving average, truncated at the edges
fn moving_average(values: &Array1<f64>, half_window: usize) -> Vec<f64> {
    let n = values.len();
    (0..n)
        .map(|i| {
            let start = i.saturating_sub(half_window);
            let end = (i + half_window + 1).min(n);
            let sum: f64 = values.slice(ndarray::s![start..end]).sum();
            sum / (end - start) as f64
        })
        .collect()
}

fn crossing(f_a: f64, v_a: f64, f_b: f64, v_b: f64, level: f64) -> f64 {
    if (v_b - v_a).abs() < f64::EPSILON {
        return f_a;
    }
    let t = ((level - v_a) / (v_b - v_a)).clamp(0.0, 1.0);
    f_a + t * (f_b - f_a)
}

/// Frequency where the curve crosses `level` walking outward from `center`,
/// interpolated between the bracketing samples
fn walk_to_crossing(
    freqs: &Array1<f64>,
    values: &[f64],
    center: usize,
    level: f64,
    extremum: Extremum,
    forward: bool,
) -> f64 {
    let inside = |v: f64| match extremum {
        Extremum::Peak => v > level,
        Extremum::Dip => v < level,
    };

    let mut j = center;
    loop {
        let next = if forward {
            if j + 1 >= values.len() {
                return freqs[j];
            }
            j + 1
        } else {
            if j == 0 {
                return freqs[0];
            }
            j - 1
        };

        if !inside(values[next]) {
            return crossing(freqs[j], values[j], freqs[next], values[next], level);
        }
        j = next;
    }
}

fn feature_width(freqs: &Array1<f64>, smoothed: &[f64], center: usize, extremum: Extremum) -> f64 {
    let level = match extremum {
        Extremum::Peak => smoothed[center] - WIDTH_DROP_DB,
        Extremum::Dip => smoothed[center] + WIDTH_DROP_DB,
    };
    let left = walk_to_crossing(freqs, smoothed, center, level, extremum, false);
    let right = walk_to_crossing(freqs, smoothed, center, level, extremum, true);
    (right - left).max(0.0)
}

/// Find peaks and dips in `response`
///
/// # Arguments
/// * `response` - Response to scan
/// * `schroeder_freq` - Boundary between the modal and statistical regions
///
/// # Returns
/// Detected features sorted by descending prominence
pub fn detect_features(response: &Curve, schroeder_freq: f64) -> Vec<DetectedFeature> {
    let n = response.len();
    if n < 2 * NEIGHBORHOOD + 1 {
        return Vec::new();
    }

    let smoothed = moving_average(&response.spl, SMOOTHING_HALF_WINDOW);
    let mut features = Vec::new();

    for i in NEIGHBORHOOD..n - NEIGHBORHOOD {
        let window = &smoothed[i - NEIGHBORHOOD..=i + NEIGHBORHOOD];
        let center = smoothed[i];
        let neighbours = || {
            window
                .iter()
                .enumerate()
                .filter(|&(k, _)| k != NEIGHBORHOOD)
                .map(|(_, &v)| v)
        };

        let freq = response.freq[i];
        let below_schroeder = freq < schroeder_freq;

        if neighbours().all(|v| center > v) {
            let lowest = neighbours().fold(f64::INFINITY, f64::min);
            let prominence = center - lowest;
            let threshold = if below_schroeder {
                PEAK_PROMINENCE.0
            } else {
                PEAK_PROMINENCE.1
            };
            if prominence > threshold {
                features.push(DetectedFeature {
                    frequency: freq,
                    amplitude: response.spl[i],
                    prominence,
                    width: feature_width(&response.freq, &smoothed, i, Extremum::Peak),
                    kind: if below_schroeder {
                        FeatureKind::Mode
                    } else {
                        FeatureKind::Resonance
                    },
                });
            }
        } else if neighbours().all(|v| center < v) {
            let highest = neighbours().fold(f64::NEG_INFINITY, f64::max);
            let prominence = highest - center;
            let threshold = if below_schroeder {
                DIP_PROMINENCE.0
            } else {
                DIP_PROMINENCE.1
            };
            if prominence > threshold {
                features.push(DetectedFeature {
                    frequency: freq,
                    amplitude: response.spl[i],
                    prominence,
                    width: feature_width(&response.freq, &smoothed, i, Extremum::Dip),
                    kind: FeatureKind::Dip,
                });
            }
        }
    }

    features.sort_by(|a, b| b.prominence.total_cmp(&a.prominence));
    features
}

/// Find narrow deep nulls in the unsmoothed `response`
///
/// Every local minimum is measured against the lower of the two maxima
/// reached by walking uphill on each side, and its width is taken at half
/// that depth. Smoothing would fill in the sharp notches left by destructive
/// interference, so the raw levels are used.
///
/// # Returns
/// Dips at least `min_depth` dB deep and at most `max_width` Hz wide, sorted
/// by descending depth
pub fn detect_nulls(response: &Curve, min_depth: f64, max_width: f64) -> Vec<DetectedFeature> {
    let values = response.spl.to_vec();
    let n = values.len();
    let mut nulls = Vec::new();

    for i in 1..n.saturating_sub(1) {
        if !(values[i] < values[i - 1] && values[i] <= values[i + 1]) {
            continue;
        }

        let mut left = i;
        while left > 0 && values[left - 1] >= values[left] {
            left -= 1;
        }
        let mut right = i;
        while right + 1 < n && values[right + 1] >= values[right] {
            right += 1;
        }

        let depth = values[left].min(values[right]) - values[i];
        if !(depth >= min_depth) {
            continue;
        }

        let level = values[i] + depth / 2.0;
        let width = walk_to_crossing(&response.freq, &values, i, level, Extremum::Dip, true)
            - walk_to_crossing(&response.freq, &values, i, level, Extremum::Dip, false);
        if width <= max_width {
            nulls.push(DetectedFeature {
                frequency: response.freq[i],
                amplitude: values[i],
                prominence: depth,
                width,
                kind: FeatureKind::Dip,
            });
        }
    }

    nulls.sort_by(|a, b| b.prominence.total_cmp(&a.prominence));
    nulls
}
