//! Configuration of the multi-pass EQ generator.

use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModalEqError, Result};

/// Problems found while checking a configuration
///
/// Errors abort EQ generation. Warnings are only logged.
#[derive(Debug, Clone, Default)]
pub struct ConfigCheck {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigCheck {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    pub fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }

    /// Append the findings of a nested section (`eq` inside a pipeline config)
    pub fn absorb(&mut self, nested: ConfigCheck) {
        self.errors.extend(nested.errors);
        self.warnings.extend(nested.warnings);
    }

    /// Warnings go to the log, errors become [`ModalEqError::InvalidConfig`]
    pub fn into_result(self) -> Result<()> {
        self.warnings.iter().for_each(|w| warn!("{}", w));
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(ModalEqError::InvalidConfig {
            errors: self.errors,
        })
    }
}

/// Empirical constants of the generator
///
/// These thresholds were tuned by listening and measurement, not derived.
/// They are exposed so that they can be recalibrated without code changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EqCalibration {
    /// Overshoot at the midpoint of two boosts that counts as an artifact (dB)
    pub interaction_threshold_db: f64,
    /// Overshoot at a boost centre that counts as an artifact (dB)
    pub direct_overshoot_db: f64,
    /// Maximum distance between two interacting boosts (Hz)
    pub interaction_window_hz: f64,
    /// Fraction of an artifact's severity removed by its corrective cut
    pub correction_factor: f64,
    /// Q of a cut correcting an interaction peak
    pub interaction_q: f64,
    /// Q of a cut correcting a direct overshoot
    pub direct_q: f64,
    /// Mean low-frequency cut that triggers balance compensation (dB)
    pub balance_cut_threshold_db: f64,
    /// Mean 150-280 Hz excess that triggers balance compensation (dB)
    pub balance_excess_threshold_db: f64,
    /// Fraction of the excess removed by the compensation band
    pub balance_factor: f64,
    pub balance_frequency: f64,
    pub balance_q: f64,
    /// Low-frequency errors above this are placed first (dB)
    pub priority_threshold_db: f64,
    /// Upper limit of the priority region (Hz)
    pub priority_max_freq: f64,
    /// Bands with a smaller absolute gain are dropped (dB)
    pub min_band_gain_db: f64,
    /// Maximum boost into a narrow deep null (dB)
    pub null_boost_limit_db: f64,
    /// Minimum prominence of a dip treated as a null (dB)
    pub null_min_depth_db: f64,
    /// Maximum width of a dip treated as a null (Hz)
    pub null_max_width_hz: f64,
}

impl Default for EqCalibration {
    fn default() -> Self {
        Self {
            interaction_threshold_db: 2.0,
            direct_overshoot_db: 3.0,
            interaction_window_hz: 80.0,
            correction_factor: 0.95,
            interaction_q: 3.5,
            direct_q: 2.5,
            balance_cut_threshold_db: 2.0,
            balance_excess_threshold_db: 1.5,
            balance_factor: 0.8,
            balance_frequency: 200.0,
            balance_q: 0.8,
            priority_threshold_db: 2.5,
            priority_max_freq: 80.0,
            min_band_gain_db: 0.2,
            null_boost_limit_db: 3.0,
            null_min_depth_db: 6.0,
            null_max_width_hz: 20.0,
        }
    }
}

/// EQ generator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EqConfig {
    /// Total number of bands across all passes
    #[serde(default = "default_num_bands")]
    pub num_bands: usize,

    /// Boost ceiling in dB
    #[serde(default = "default_max_boost")]
    pub max_boost: f64,

    /// Cut ceiling in dB
    #[serde(default = "default_max_cut")]
    pub max_cut: f64,

    /// Gain damping factor in [0, 1]; 0 applies the full correction
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,

    /// Minimum Q factor
    #[serde(default = "default_min_q")]
    pub min_q: f64,

    /// Maximum Q factor
    #[serde(default = "default_max_q")]
    pub max_q: f64,

    /// Schroeder frequency of the room in Hz
    #[serde(default = "default_schroeder_freq")]
    pub schroeder_freq: f64,

    #[serde(default)]
    pub calibration: EqCalibration,
}

// Default values for EqConfig
fn default_num_bands() -> usize {
    20
}
fn default_max_boost() -> f64 {
    6.0
}
fn default_max_cut() -> f64 {
    12.0
}
fn default_smoothing() -> f64 {
    0.1
}
fn default_min_q() -> f64 {
    0.5
}
fn default_max_q() -> f64 {
    15.0
}
fn default_schroeder_freq() -> f64 {
    200.0
}

impl Default for EqConfig {
    fn default() -> Self {
        Self {
            num_bands: default_num_bands(),
            max_boost: default_max_boost(),
            max_cut: default_max_cut(),
            smoothing: default_smoothing(),
            min_q: default_min_q(),
            max_q: default_max_q(),
            schroeder_freq: default_schroeder_freq(),
            calibration: EqCalibration::default(),
        }
    }
}

/// Largest accepted band budget
pub const MAX_BANDS: usize = 64;

impl EqConfig {
    /// Check every parameter and collect all problems at once
    pub fn validation(&self) -> ConfigCheck {
        let mut result = ConfigCheck::default();

        if !(1..=MAX_BANDS).contains(&self.num_bands) {
            result.error(format!(
                "num_bands ({}) must be between 1 and {}",
                self.num_bands, MAX_BANDS
            ));
        }

        if !(0.0..=24.0).contains(&self.max_boost) {
            result.error(format!(
                "max_boost ({}) must be between 0 and 24 dB",
                self.max_boost
            ));
        } else if self.max_boost > 12.0 {
            result.warn(format!(
                "max_boost ({}) above 12 dB costs a lot of amplifier headroom",
                self.max_boost
            ));
        }

        if !(0.0..=36.0).contains(&self.max_cut) {
            result.error(format!(
                "max_cut ({}) must be between 0 and 36 dB",
                self.max_cut
            ));
        }

        if !(0.0..=1.0).contains(&self.smoothing) {
            result.error(format!(
                "smoothing ({}) must be between 0 and 1",
                self.smoothing
            ));
        } else if self.smoothing == 1.0 {
            result.warn("smoothing is 1, every band gain will be zero".to_string());
        }

        if !(self.min_q > 0.0) {
            result.error(format!("min_q ({}) must be positive", self.min_q));
        }

        if !(self.min_q <= self.max_q) {
            result.error(format!(
                "min_q ({}) must be less than or equal to max_q ({})",
                self.min_q, self.max_q
            ));
        }

        if !(self.schroeder_freq > 0.0) {
            result.error(format!(
                "schroeder_freq ({}) must be positive",
                self.schroeder_freq
            ));
        } else if !(20.0..=300.0).contains(&self.schroeder_freq) {
            result.warn(format!(
                "schroeder_freq ({} Hz) is outside the 20-300 Hz analysis band",
                self.schroeder_freq
            ));
        }

        validate_calibration(&self.calibration, &mut result);

        result
    }

    /// Validate once, returning all errors together
    pub fn validate(&self) -> Result<()> {
        self.validation().into_result()
    }
}

fn validate_calibration(calibration: &EqCalibration, result: &mut ConfigCheck) {
    if !(calibration.correction_factor > 0.0 && calibration.correction_factor <= 1.0) {
        result.error(format!(
            "calibration.correction_factor ({}) must be in (0, 1]",
            calibration.correction_factor
        ));
    }

    let positive = [
        ("interaction_q", calibration.interaction_q),
        ("direct_q", calibration.direct_q),
        ("balance_q", calibration.balance_q),
        ("balance_frequency", calibration.balance_frequency),
    ];
    for (name, value) in positive {
        if !(value > 0.0) {
            result.error(format!("calibration.{} ({}) must be positive", name, value));
        }
    }

    if !(calibration.null_boost_limit_db >= 0.0) {
        result.error(format!(
            "calibration.null_boost_limit_db ({}) must not be negative",
            calibration.null_boost_limit_db
        ));
    }

    if !(calibration.min_band_gain_db >= 0.0) {
        result.error(format!(
            "calibration.min_band_gain_db ({}) must not be negative",
            calibration.min_band_gain_db
        ));
    }
}
