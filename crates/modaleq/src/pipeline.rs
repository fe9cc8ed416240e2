//! End-to-end run: simulate, align a target, generate and apply EQ.
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

use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use modaleq_roomsim::{
    Curve, MAX_FREQ, ModalSimulator, Point3D, RoomAcoustics, RoomDimensions, RoomMode,
    calculate_room_acoustics, room_modes,
};

use crate::analysis::{ErrorAnalysis, align_level, analyze_error, calculate_optimal_offset};
use crate::directivity::DirectivityTable;
use crate::eq::{ConfigCheck, EqConfig, PassObserver, generate_with_observer};
use crate::error::{ModalEqError, Result};
use crate::features::{DetectedFeature, detect_features};
use crate::filter_bank::{EqSettings, apply};
use crate::target::{Rolloff, apply_rolloff, target_curve};

/// Modal simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SimulationConfig {
    /// Highest mode index along each axis
    #[serde(default = "default_max_mode_order")]
    pub max_mode_order: u32,

    /// Base quality factor of every mode
    #[serde(default = "default_base_q")]
    pub base_q: f64,

    /// Low-frequency roll-off of the subwoofer itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rolloff: Option<Rolloff>,
}

/// Target curve parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TargetConfig {
    /// Low-frequency roll-off of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolloff: Option<Rolloff>,

    /// Level of the simulated response over 80-200 Hz (dB)
    #[serde(default = "default_listening_level")]
    pub listening_level: f64,
}

/// Room surface parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AcousticsConfig {
    /// Average absorption coefficient of the room surfaces
    #[serde(default = "default_average_absorption")]
    pub average_absorption: f64,
}

/// Speaker directivity curve applied to the simulated response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DirectivityRef {
    /// Path to a JSON directivity table
    pub path: PathBuf,
    /// Name of the curve to use
    pub curve: String,
}

/// Complete run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunConfig {
    pub room: RoomDimensions,
    /// Subwoofer position
    pub source: Point3D,
    /// Listening position
    pub listener: Point3D,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub acoustics: AcousticsConfig,

    #[serde(default)]
    pub eq: EqConfig,

    /// Schroeder frequency in Hz; estimated from the room when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schroeder_freq: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directivity: Option<DirectivityRef>,
}

// Default values for the run configuration
fn default_max_mode_order() -> u32 {
    10
}
fn default_base_q() -> f64 {
    10.0
}
fn default_listening_level() -> f64 {
    75.0
}
fn default_average_absorption() -> f64 {
    0.3
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_mode_order: default_max_mode_order(),
            base_q: default_base_q(),
            source_rolloff: None,
        }
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            rolloff: None,
            listening_level: default_listening_level(),
        }
    }
}

impl Default for AcousticsConfig {
    fn default() -> Self {
        Self {
            average_absorption: default_average_absorption(),
        }
    }
}

impl RunConfig {
    /// Configuration with default parameters for a room and two positions
    pub fn new(room: RoomDimensions, source: Point3D, listener: Point3D) -> Self {
        Self {
            room,
            source,
            listener,
            simulation: SimulationConfig::default(),
            target: TargetConfig::default(),
            acoustics: AcousticsConfig::default(),
            eq: EqConfig::default(),
            schroeder_freq: None,
            directivity: None,
        }
    }

    /// Read a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ModalEqError::FileOperation {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Check the whole configuration, EQ parameters included
    pub fn validation(&self) -> ConfigCheck {
        let mut result = ConfigCheck::default();

        for (name, value) in [
            ("length", self.room.length),
            ("width", self.room.width),
            ("height", self.room.height),
        ] {
            if !(value > 0.0) {
                result.error(format!("room {} ({}) must be positive", name, value));
            }
        }

        for (name, point) in [("source", &self.source), ("listener", &self.listener)] {
            if !self.room.contains(point) {
                result.warn(format!(
                    "{} ({:.2}, {:.2}, {:.2}) is outside the room",
                    name, point.x, point.y, point.z
                ));
            }
        }

        if self.simulation.max_mode_order == 0 {
            result.error("simulation.max_mode_order must be at least 1".to_string());
        } else if self.simulation.max_mode_order > 20 {
            result.warn(format!(
                "simulation.max_mode_order ({}) is high, simulation will be slow",
                self.simulation.max_mode_order
            ));
        }

        if !(self.simulation.base_q > 0.0) {
            result.error(format!(
                "simulation.base_q ({}) must be positive",
                self.simulation.base_q
            ));
        }

        let alpha = self.acoustics.average_absorption;
        if !(alpha > 0.0 && alpha < 1.0) {
            result.error(format!(
                "acoustics.average_absorption ({}) must be between 0 and 1",
                alpha
            ));
        }

        if !self.target.listening_level.is_finite() {
            result.error("target.listening_level must be finite".to_string());
        }

        if let Some(freq) = self.schroeder_freq
            && !(freq > 0.0)
        {
            result.error(format!("schroeder_freq ({}) must be positive", freq));
        }

        result.absorb(self.eq.validation());
        result
    }

    pub fn validate(&self) -> Result<()> {
        self.validation().into_result()
    }
}

/// Everything computed by [`run_pipeline`]
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub acoustics: RoomAcoustics,
    /// Schroeder frequency used by the EQ generator (Hz)
    pub schroeder_freq: f64,
    /// Room modes inside the simulated band
    pub modes: Vec<RoomMode>,
    /// Simulated response at the listening level
    pub response: Curve,
    /// Target aligned with the response
    pub target: Curve,
    /// Offset applied to the target shape (dB)
    pub target_offset: f64,
    /// Peaks and dips of the response
    pub features: Vec<DetectedFeature>,
    pub settings: EqSettings,
    /// Response with the EQ applied
    pub corrected: Curve,
    pub before: ErrorAnalysis,
    pub after: ErrorAnalysis,
}

/// Simulate the room, align the target and compute the EQ
///
/// # Arguments
/// * `config` - Room, positions and generator parameters
/// * `simulator` - Caching simulator, shared between runs
/// * `observer` - Receives per-pass progress of the EQ generator
pub fn run_pipeline(
    config: &RunConfig,
    simulator: &ModalSimulator,
    observer: &mut dyn PassObserver,
) -> Result<PipelineResult> {
    config.validate()?;

    let mut raw = simulator.simulate(
        &config.source,
        &config.listener,
        &config.room,
        config.simulation.max_mode_order,
        config.simulation.base_q,
    );
    if let Some(rolloff) = &config.simulation.source_rolloff {
        raw = apply_rolloff(&raw, rolloff);
    }
    if let Some(directivity) = &config.directivity {
        let table = DirectivityTable::load(&directivity.path)?;
        raw = table.apply(&directivity.curve, &raw)?;
    }

    let response = align_level(&raw, config.target.listening_level);
    let shape = target_curve(&response.freq, config.target.rolloff.as_ref(), 0.0);
    let target_offset = calculate_optimal_offset(&response, &shape);
    let target = shape.shifted(target_offset);

    let acoustics = calculate_room_acoustics(&config.room, config.acoustics.average_absorption);
    let schroeder_freq = config
        .schroeder_freq
        .unwrap_or(acoustics.schroeder_frequency);
    info!(
        "room {:.2} x {:.2} x {:.2} m: RT60 {:.2} s, Schroeder {:.0} Hz, target offset {:.1} dB",
        config.room.length,
        config.room.width,
        config.room.height,
        acoustics.rt60_eyring,
        schroeder_freq,
        target_offset
    );

    let features = detect_features(&response, schroeder_freq);
    debug!("{} features detected", features.len());

    let eq_config = EqConfig {
        schroeder_freq,
        ..config.eq.clone()
    };
    let settings = generate_with_observer(&response, &target, eq_config, observer)?;

    let corrected = apply(&response, &settings);
    let before = analyze_error(&response, &target);
    let after = analyze_error(&corrected, &target);
    info!(
        "RMS error {:.2} -> {:.2} dB with {} bands",
        before.rms_error,
        after.rms_error,
        settings.bands.len()
    );

    Ok(PipelineResult {
        modes: room_modes(&config.room, MAX_FREQ, config.simulation.max_mode_order),
        acoustics,
        schroeder_freq,
        response,
        target,
        target_offset,
        features,
        settings,
        corrected,
        before,
        after,
    })
}
