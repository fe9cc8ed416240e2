//! Parametric EQ bands and their application to a response.
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

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Curve;

/// Range of a single band's contribution (dB)
const BAND_CLAMP_DB: (f64, f64) = (-50.0, 20.0);

/// Range of an equalized response level (dB)
const OUTPUT_CLAMP_DB: (f64, f64) = (-80.0, 130.0);

/// Filter shape of an EQ band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BandType {
    /// Bell (peaking) filter
    #[default]
    Peak,
}

impl BandType {
    /// Short name used in REW filter files
    pub fn short_name(&self) -> &'static str {
        match self {
            BandType::Peak => "PK",
        }
    }
}

/// One parametric EQ band
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EqBand {
    /// Centre frequency in Hz
    pub frequency: f64,
    /// Gain in dB, positive for a boost
    pub gain: f64,
    pub q: f64,
    #[serde(default, rename = "type")]
    pub band_type: BandType,
}

impl EqBand {
    pub fn peak(frequency: f64, gain: f64, q: f64) -> Self {
        Self {
            frequency,
            gain,
            q,
            band_type: BandType::Peak,
        }
    }

    pub fn is_boost(&self) -> bool {
        self.gain > 0.0
    }
}

/// A complete set of EQ bands as produced by the generator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EqSettings {
    /// Bands sorted by frequency
    pub bands: Vec<EqBand>,
    pub enabled: bool,
    /// Boost ceiling in dB
    pub max_boost: f64,
    /// Cut ceiling in dB
    pub max_cut: f64,
    /// Gain damping factor in [0, 1]
    pub smoothing: f64,
}

impl EqSettings {
    /// Settings that leave a response untouched
    pub fn disabled() -> Self {
        Self {
            bands: Vec::new(),
            enabled: false,
            max_boost: 0.0,
            max_cut: 0.0,
            smoothing: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.enabled && !self.bands.is_empty()
    }
}

impl Default for EqSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Contribution of one bell band at `freq`, in dB
///
/// Invalid intermediate values (non-finite, or a non-positive magnitude)
/// contribute 0 dB. The result is clamped to [-50, 20] dB.
pub fn band_response_db(band: &EqBand, freq: f64) -> f64 {
    let f0 = band.frequency;
    let detune = band.q * (freq / f0 - f0 / freq);
    let h = 1.0 + (10f64.powf(band.gain / 20.0) - 1.0) / (1.0 + detune * detune);

    if !h.is_finite() || h <= 0.0 {
        return 0.0;
    }
    let db = 20.0 * h.log10();
    if !db.is_finite() {
        return 0.0;
    }
    db.clamp(BAND_CLAMP_DB.0, BAND_CLAMP_DB.1)
}

/// Summed contribution of `bands` at `freq`, in dB
pub fn bands_response_db(bands: &[EqBand], freq: f64) -> f64 {
    bands.iter().map(|band| band_response_db(band, freq)).sum()
}

/// Apply `bands` to `response` regardless of an enabled flag
pub fn apply_bands(response: &Curve, bands: &[EqBand]) -> Curve {
    if bands.is_empty() {
        return response.clone();
    }
    response.map_points(|f, spl| {
        (spl + bands_response_db(bands, f)).clamp(OUTPUT_CLAMP_DB.0, OUTPUT_CLAMP_DB.1)
    })
}

/// Equalize `response` with `settings`
///
/// Disabled or bandless settings return the response unchanged.
pub fn apply(response: &Curve, settings: &EqSettings) -> Curve {
    if !settings.is_active() {
        return response.clone();
    }
    apply_bands(response, &settings.bands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modaleq_roomsim::analysis_frequencies;

    #[test]
    fn test_band_gain_at_centre() {
        for gain in [-12.0, -3.0, 4.5, 10.0] {
            let band = EqBand::peak(63.0, gain, 4.0);
            let db = band_response_db(&band, 63.0);
            assert!((db - gain).abs() < 0.05, "gain {} -> {}", gain, db);
        }
    }

    #[test]
    fn test_band_fades_away_from_centre() {
        let band = EqBand::peak(100.0, -10.0, 5.0);
        assert!(band_response_db(&band, 300.0).abs() < 0.5);
        assert!(band_response_db(&band, 20.0).abs() < 0.5);
    }

    #[test]
    fn test_invalid_band_contributes_nothing() {
        let zero_freq = EqBand::peak(0.0, 6.0, 2.0);
        assert_eq!(band_response_db(&zero_freq, 50.0), 0.0);

        let nan_gain = EqBand::peak(50.0, f64::NAN, 2.0);
        assert_eq!(band_response_db(&nan_gain, 50.0), 0.0);
    }

    #[test]
    fn test_band_contribution_clamped() {
        let huge = EqBand::peak(50.0, 60.0, 2.0);
        assert_eq!(band_response_db(&huge, 50.0), 20.0);
    }

    #[test]
    fn test_disabled_settings_leave_response_unchanged() {
        let freqs = analysis_frequencies();
        let response = Curve::flat(&freqs, 70.0);

        let mut settings = EqSettings::disabled();
        settings.bands.push(EqBand::peak(50.0, -6.0, 3.0));
        assert_eq!(apply(&response, &settings), response);

        let empty = EqSettings {
            enabled: true,
            ..EqSettings::disabled()
        };
        assert_eq!(apply(&response, &empty), response);
    }

    #[test]
    fn test_apply_sums_bands_and_clamps_output() {
        let freqs = analysis_frequencies();
        let response = Curve::flat(&freqs, 70.0);
        let settings = EqSettings {
            bands: vec![EqBand::peak(50.0, -6.0, 3.0), EqBand::peak(150.0, 3.0, 3.0)],
            enabled: true,
            max_boost: 6.0,
            max_cut: 12.0,
            smoothing: 0.0,
        };
        let eq = apply(&response, &settings);
        let at_50 = eq.value_near(50.0, 0.5).unwrap();
        assert!((at_50 - 64.0).abs() < 0.2, "{}", at_50);

        let loud = Curve::flat(&freqs, 128.0);
        let boosted = apply(
            &loud,
            &EqSettings {
                bands: vec![EqBand::peak(100.0, 10.0, 1.0)],
                ..settings
            },
        );
        assert_eq!(boosted.value_near(100.0, 0.5), Some(130.0));
    }
}
