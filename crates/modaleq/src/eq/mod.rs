//! Multi-pass parametric EQ generation.
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
//! Correction runs in four cumulative passes. Each pass analyzes the response
//! as corrected by the previous ones, so later passes only see what is left.
//! Thresholds drop, filters narrow and gains soften from one pass to the next.
//!
//! [`MultiPassEq`] exposes the passes one at a time so that an interactive
//! caller can redraw or yield between them; [`generate`] simply runs them all.

pub mod artifacts;
pub mod config;
pub mod passes;
pub mod progress;
pub mod zones;

pub use config::{ConfigCheck, EqCalibration, EqConfig};
pub use passes::PassKind;
pub use progress::{LogObserver, NoopObserver, PassObserver};

use log::{debug, info};

use crate::Curve;
use crate::analysis::analyze_error;
use crate::error::Result;
use crate::features::{DetectedFeature, detect_nulls};
use crate::filter_bank::{EqBand, EqSettings};

use passes::{PassInput, run_pass};

/// Outcome of one pass
#[derive(Debug, Clone)]
pub struct PassResult {
    /// 1-based pass number
    pub pass_number: usize,
    pub kind: PassKind,
    /// Bands added by this pass
    pub bands: Vec<EqBand>,
    /// Frequencies whose error exceeded the pass thresholds
    pub active_frequencies: Vec<f64>,
    /// Original response with every band placed so far
    pub corrected: Curve,
    /// RMS error of `corrected` against the target (dB)
    pub rms_error: f64,
}

/// Pass-by-pass EQ generator
#[derive(Debug, Clone)]
pub struct MultiPassEq {
    original: Curve,
    target: Curve,
    config: EqConfig,
    nulls: Vec<DetectedFeature>,
    bands: Vec<EqBand>,
    current: Curve,
    rms_error: f64,
    /// Index of the next pass in [`PassKind::ALL`]
    pass_index: usize,
    /// Set when the input is empty: no pass runs
    degenerate: bool,
}

impl MultiPassEq {
    /// Prepare a generator correcting `room` towards `target`
    ///
    /// Fails only if `config` is invalid. An empty response or target gives a
    /// generator that runs no pass and finishes with disabled settings.
    pub fn new(room: &Curve, target: &Curve, config: EqConfig) -> Result<Self> {
        config.validate()?;

        let degenerate = room.is_empty() || target.is_empty();
        let (nulls, rms_error) = if degenerate {
            debug!("empty response or target, EQ disabled");
            (Vec::new(), 0.0)
        } else {
            (
                find_nulls(room, &config),
                analyze_error(room, target).rms_error,
            )
        };

        Ok(Self {
            original: room.clone(),
            target: target.clone(),
            config,
            nulls,
            bands: Vec::new(),
            current: room.clone(),
            rms_error,
            pass_index: 0,
            degenerate,
        })
    }

    /// Kind of the pass [`Self::next_pass`] would run
    pub fn upcoming_pass(&self) -> Option<PassKind> {
        if self.degenerate {
            return None;
        }
        PassKind::ALL.get(self.pass_index).copied()
    }

    /// Run the next pass, or return `None` when all passes are done
    pub fn next_pass(&mut self) -> Option<PassResult> {
        let kind = self.upcoming_pass()?;
        let pass_number = self.pass_index + 1;
        let budget = kind.budget(self.config.num_bands, self.bands.len());

        let output = run_pass(&PassInput {
            kind,
            original: &self.original,
            current: &self.current,
            target: &self.target,
            config: &self.config,
            prior: &self.bands,
            nulls: &self.nulls,
            budget,
            previous_rms: self.rms_error,
        });

        info!(
            "pass {} ({}): {} bands of {} allowed, RMS {:.2} -> {:.2} dB",
            pass_number,
            kind.name(),
            output.bands.len(),
            budget,
            self.rms_error,
            output.rms_error
        );

        self.bands.extend_from_slice(&output.bands);
        self.current = output.corrected.clone();
        self.rms_error = output.rms_error;
        self.pass_index += 1;

        Some(PassResult {
            pass_number,
            kind,
            bands: output.bands,
            active_frequencies: output.active_frequencies,
            corrected: output.corrected,
            rms_error: output.rms_error,
        })
    }

    /// Bands placed so far, in placement order
    pub fn bands(&self) -> &[EqBand] {
        &self.bands
    }

    /// Original response with every band placed so far
    pub fn corrected(&self) -> &Curve {
        &self.current
    }

    /// Current RMS error against the target (dB)
    pub fn rms_error(&self) -> f64 {
        self.rms_error
    }

    /// Run the remaining passes and return the settings, sorted by frequency
    pub fn finish(mut self) -> EqSettings {
        while self.next_pass().is_some() {}

        if self.degenerate {
            return EqSettings::disabled();
        }

        let mut bands = self.bands;
        bands.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
        EqSettings {
            bands,
            enabled: true,
            max_boost: self.config.max_boost,
            max_cut: self.config.max_cut,
            smoothing: self.config.smoothing,
        }
    }
}

impl Iterator for MultiPassEq {
    type Item = PassResult;

    fn next(&mut self) -> Option<PassResult> {
        self.next_pass()
    }
}

/// Narrow, deep dips that boosts cannot fill economically
fn find_nulls(room: &Curve, config: &EqConfig) -> Vec<DetectedFeature> {
    let calibration = &config.calibration;
    let nulls = detect_nulls(
        room,
        calibration.null_min_depth_db,
        calibration.null_max_width_hz,
    );
    if !nulls.is_empty() {
        debug!(
            "nulls limiting boosts: {:?}",
            nulls.iter().map(|n| n.frequency).collect::<Vec<_>>()
        );
    }
    nulls
}

/// Generate EQ settings correcting `room` towards `target`
pub fn generate(room: &Curve, target: &Curve, config: EqConfig) -> Result<EqSettings> {
    generate_with_observer(room, target, config, &mut NoopObserver)
}

/// Same as [`generate`], notifying `observer` around every pass
pub fn generate_with_observer(
    room: &Curve,
    target: &Curve,
    config: EqConfig,
    observer: &mut dyn PassObserver,
) -> Result<EqSettings> {
    let mut eq = MultiPassEq::new(room, target, config)?;

    while let Some(kind) = eq.upcoming_pass() {
        observer.on_pass_start(eq.pass_index + 1, kind.name());
        let Some(result) = eq.next_pass() else {
            break;
        };
        observer.on_bands_generated(
            result.pass_number,
            &result.bands,
            &result.active_frequencies,
        );
        observer.on_pass_complete(result.pass_number, eq.bands().len(), &result.corrected);
    }

    let settings = eq.finish();
    observer.on_progress_update(&format!(
        "EQ generation complete: {} bands",
        settings.bands.len()
    ));
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter_bank::apply;
    use modaleq_roomsim::analysis_frequencies;

    fn bell(f: f64, f0: f64, gain: f64, q: f64) -> f64 {
        crate::filter_bank::band_response_db(&EqBand::peak(f0, gain, q), f)
    }

    fn peaky_room() -> Curve {
        let freqs = analysis_frequencies();
        let spl = freqs.mapv(|f| 75.0 + bell(f, 100.0, 10.0, 6.0));
        Curve::new(freqs, spl)
    }

    #[test]
    fn test_empty_input_gives_disabled_settings() {
        let empty = Curve::from_points(Vec::<(f64, f64)>::new());
        let target = Curve::flat(&analysis_frequencies(), 75.0);

        let settings = generate(&empty, &target, EqConfig::default()).unwrap();
        assert_eq!(settings, EqSettings::disabled());

        let mut eq = MultiPassEq::new(&target, &empty, EqConfig::default()).unwrap();
        assert!(eq.next_pass().is_none());
        assert!(!eq.finish().enabled);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let room = peaky_room();
        let config = EqConfig {
            num_bands: 0,
            ..EqConfig::default()
        };
        let err = generate(&room, &room, config).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_cuts_isolated_peak() {
        let room = peaky_room();
        let target = Curve::flat(&room.freq, 75.0);
        let config = EqConfig::default();
        let settings = generate(&room, &target, config.clone()).unwrap();

        assert!(settings.enabled);
        assert!(settings.bands.len() <= config.num_bands);
        let cut = settings
            .bands
            .iter()
            .find(|b| (b.frequency - 100.0).abs() <= 10.0 && b.gain < 0.0)
            .expect("cut near 100 Hz");
        assert!(cut.gain.abs() <= config.max_cut);

        let before = analyze_error(&room, &target).rms_error;
        let after = analyze_error(&apply(&room, &settings), &target).rms_error;
        assert!(after < before, "{} -> {}", before, after);
    }

    #[test]
    fn test_passes_never_increase_rms() {
        let room = peaky_room();
        let target = Curve::flat(&room.freq, 75.0);
        let eq = MultiPassEq::new(&room, &target, EqConfig::default()).unwrap();
        let initial = eq.rms_error();

        let mut previous = initial;
        let mut count = 0;
        for result in eq {
            count += 1;
            assert_eq!(result.pass_number, count);
            if result.bands.is_empty() {
                assert_eq!(result.rms_error, previous);
            } else {
                assert!(result.rms_error < previous);
            }
            previous = result.rms_error;
        }
        assert_eq!(count, 4);
    }

    #[test]
    fn test_flat_response_needs_no_bands() {
        let freqs = analysis_frequencies();
        let room = Curve::flat(&freqs, 75.0);
        let settings = generate(&room, &room, EqConfig::default()).unwrap();
        assert!(settings.enabled);
        assert!(settings.bands.is_empty());
    }

    #[derive(Default)]
    struct Recorder {
        started: Vec<(usize, String)>,
        completed: Vec<usize>,
        messages: usize,
    }

    impl PassObserver for Recorder {
        fn on_pass_start(&mut self, pass: usize, name: &str) {
            self.started.push((pass, name.to_string()));
        }

        fn on_pass_complete(&mut self, pass: usize, _total_bands: usize, _corrected: &Curve) {
            self.completed.push(pass);
        }

        fn on_progress_update(&mut self, _message: &str) {
            self.messages += 1;
        }
    }

    #[test]
    fn test_observer_sees_every_pass() {
        let room = peaky_room();
        let target = Curve::flat(&room.freq, 75.0);
        let mut recorder = Recorder::default();
        generate_with_observer(&room, &target, EqConfig::default(), &mut recorder).unwrap();

        assert_eq!(recorder.completed, vec![1, 2, 3, 4]);
        assert_eq!(recorder.started[0], (1, "Broad correction".to_string()));
        assert_eq!(recorder.started[3].1, "Ultra-fine correction");
        assert_eq!(recorder.messages, 1);
    }
}
