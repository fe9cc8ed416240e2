//! Preference target curve for in-room subwoofer response.
//!
//! The curve is a piecewise-linear bass shelf: +7 dB at 20 Hz and below,
//! +4 dB at 60 Hz, 0 dB at 200 Hz, -1 dB at 300 Hz and flat beyond. Its shape
//! never depends on the room; only a level offset aligns it with a measured
//! or simulated response (see [`crate::analysis::calculate_optimal_offset`]).

use ndarray::Array1;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Curve;

/// Breakpoints of the preference curve as `(freq, dB)`
const TARGET_BREAKPOINTS: [(f64, f64); 4] = [(20.0, 7.0), (60.0, 4.0), (200.0, 0.0), (300.0, -1.0)];

/// Low-frequency roll-off below a corner frequency
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rolloff {
    /// Corner frequency in Hz
    pub frequency: f64,
    /// Attenuation slope in dB per octave below the corner
    #[serde(default = "default_rolloff_slope")]
    pub slope_db_per_octave: f64,
}

fn default_rolloff_slope() -> f64 {
    12.0
}

impl Rolloff {
    pub fn new(frequency: f64, slope_db_per_octave: f64) -> Self {
        Self {
            frequency,
            slope_db_per_octave,
        }
    }

    /// Attenuation in dB at `freq` (0 at or above the corner)
    pub fn attenuation_db(&self, freq: f64) -> f64 {
        if freq <= 0.0 || self.frequency <= 0.0 || freq >= self.frequency {
            return 0.0;
        }
        self.slope_db_per_octave * (self.frequency / freq).log2()
    }
}

/// Level of the preference curve at `freq`, in dB relative to its 200 Hz point
///
/// # Arguments
/// * `freq` - Frequency in Hz
/// * `rolloff` - Optional low-frequency roll-off subtracted from the curve
pub fn target_db(freq: f64, rolloff: Option<&Rolloff>) -> f64 {
    let (first_freq, first_db) = TARGET_BREAKPOINTS[0];
    let (last_freq, last_db) = TARGET_BREAKPOINTS[TARGET_BREAKPOINTS.len() - 1];

    let base = if freq <= first_freq {
        first_db
    } else if freq >= last_freq {
        last_db
    } else {
        TARGET_BREAKPOINTS
            .windows(2)
            .find(|w| freq <= w[1].0)
            .map(|w| {
                let (f1, db1) = w[0];
                let (f2, db2) = w[1];
                db1 + (db2 - db1) * (freq - f1) / (f2 - f1)
            })
            .unwrap_or(last_db)
    };

    base - rolloff.map(|r| r.attenuation_db(freq)).unwrap_or(0.0)
}

/// Sample the preference curve on `freqs`, shifted by `offset_db`
pub fn target_curve(freqs: &Array1<f64>, rolloff: Option<&Rolloff>, offset_db: f64) -> Curve {
    let spl = freqs.mapv(|f| target_db(f, rolloff) + offset_db);
    Curve::new(freqs.clone(), spl)
}

/// Apply a low-frequency roll-off to any response
pub fn apply_rolloff(curve: &Curve, rolloff: &Rolloff) -> Curve {
    curve.map_points(|f, spl| spl - rolloff.attenuation_db(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use modaleq_roomsim::analysis_frequencies;

    #[test]
    fn test_breakpoints_exact() {
        assert_eq!(target_db(20.0, None), 7.0);
        assert_eq!(target_db(60.0, None), 4.0);
        assert_eq!(target_db(200.0, None), 0.0);
        assert_eq!(target_db(300.0, None), -1.0);
    }

    #[test]
    fn test_flat_outside_range() {
        assert_eq!(target_db(10.0, None), 7.0);
        assert_eq!(target_db(1000.0, None), -1.0);
    }

    #[test]
    fn test_linear_between_breakpoints() {
        assert!((target_db(40.0, None) - 5.5).abs() < 1e-12);
        assert!((target_db(130.0, None) - 2.0).abs() < 1e-12);
        assert!((target_db(250.0, None) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rolloff_one_octave_below_corner() {
        let rolloff = Rolloff::new(40.0, 12.0);
        // 20 Hz is one octave below 40 Hz
        assert!((target_db(20.0, Some(&rolloff)) - (7.0 - 12.0)).abs() < 1e-12);
        // No effect at or above the corner
        assert_eq!(target_db(40.0, Some(&rolloff)), target_db(40.0, None));
        assert_eq!(target_db(100.0, Some(&rolloff)), target_db(100.0, None));
    }

    #[test]
    fn test_target_curve_offset() {
        let freqs = analysis_frequencies();
        let curve = target_curve(&freqs, None, 75.0);
        assert_eq!(curve.len(), freqs.len());
        assert_eq!(curve.value_near(200.0, 0.5), Some(75.0));
        assert_eq!(curve.value_near(20.0, 0.5), Some(82.0));
    }

    #[test]
    fn test_apply_rolloff_to_response() {
        let freqs = analysis_frequencies();
        let flat = Curve::flat(&freqs, 80.0);
        let rolled = apply_rolloff(&flat, &Rolloff::new(30.0, 24.0));
        assert!((rolled.value_near(30.0, 0.5).unwrap() - 80.0).abs() < 1e-12);
        let expected_20 = 80.0 - 24.0 * (30.0_f64 / 20.0).log2();
        assert!((rolled.value_near(20.0, 0.5).unwrap() - expected_20).abs() < 1e-9);
        assert_eq!(flat.spl[0], 80.0);
    }
}
