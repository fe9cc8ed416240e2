//! One refinement pass of the EQ generator.
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
//! A pass looks at the response as corrected by all earlier passes, picks the
//! frequencies that still deviate most from the target, and places bands on
//! them. Later passes use lower thresholds, narrower filters and gentler
//! gains.

use log::debug;

use crate::Curve;
use crate::analysis::{FrequencyError, analyze_error};
use crate::features::DetectedFeature;
use crate::filter_bank::{EqBand, apply_bands};

use super::artifacts::detect_artifacts;
use super::config::EqConfig;
use super::zones::{ModalZone, Zone, base_q, frequency_weight};

/// Candidates above this frequency are never corrected (Hz)
const MAX_CORRECTION_FREQ: f64 = 300.0;

/// Smallest spacing between two bands (Hz)
const MIN_SPACING_HZ: f64 = 2.0;

/// Gain scale at and above the Schroeder frequency
const STATISTICAL_GAIN_SCALE: f64 = 0.8;

/// Upper edge of the cuts considered by balance compensation (Hz)
const BALANCE_CUT_MAX_FREQ: f64 = 120.0;

/// Region checked for relative loudness after low-frequency cuts (Hz)
const BALANCE_REGION: (f64, f64) = (150.0, 280.0);

/// Budgets at or below this get gentler, evenly spread correction
pub const SMALL_BUDGET: usize = 12;

/// The four passes, from coarse to fine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    Broad,
    Medium,
    Fine,
    UltraFine,
}

impl PassKind {
    pub const ALL: [PassKind; 4] = [
        PassKind::Broad,
        PassKind::Medium,
        PassKind::Fine,
        PassKind::UltraFine,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PassKind::Broad => "Broad correction",
            PassKind::Medium => "Medium correction",
            PassKind::Fine => "Fine correction",
            PassKind::UltraFine => "Ultra-fine correction",
        }
    }

    /// Share of the total budget; `None` takes whatever is left
    pub fn budget_share(self) -> Option<f64> {
        match self {
            PassKind::Broad => Some(0.30),
            PassKind::Medium => Some(0.30),
            PassKind::Fine => Some(0.25),
            PassKind::UltraFine => None,
        }
    }

    /// Scale applied to every gain of the pass
    pub fn aggressiveness(self) -> f64 {
        match self {
            PassKind::Broad => 0.95,
            PassKind::Medium => 0.85,
            PassKind::Fine => 0.70,
            PassKind::UltraFine => 0.55,
        }
    }

    /// Significant-error thresholds per [`ModalZone`] (dB)
    pub fn thresholds(self) -> [f64; 5] {
        match self {
            PassKind::Broad => [0.4, 0.5, 0.7, 1.0, 1.5],
            PassKind::Medium => [0.3, 0.35, 0.5, 0.7, 1.0],
            PassKind::Fine => [0.2, 0.25, 0.35, 0.5, 0.6],
            PassKind::UltraFine => [0.1, 0.15, 0.2, 0.25, 0.3],
        }
    }

    /// Minimum band spacing as a fraction of an octave
    pub fn spacing_octaves(self) -> f64 {
        match self {
            PassKind::Broad => 1.0 / 3.0,
            PassKind::Medium => 1.0 / 4.0,
            PassKind::Fine => 1.0 / 6.0,
            PassKind::UltraFine => 1.0 / 8.0,
        }
    }

    fn q_multiplier(self) -> f64 {
        match self {
            PassKind::Broad => 0.6,
            PassKind::Medium => 1.0,
            PassKind::Fine => 1.5,
            PassKind::UltraFine => 2.2,
        }
    }

    /// Number of bands this pass may place
    pub fn budget(self, total_bands: usize, used: usize) -> usize {
        let remaining = total_bands.saturating_sub(used);
        match self.budget_share() {
            Some(share) => ((total_bands as f64 * share).round() as usize).min(remaining),
            None => remaining,
        }
    }

    /// Minimum distance from a band at `freq` to any other band (Hz)
    pub fn min_spacing(self, freq: f64) -> f64 {
        (freq * (2f64.powf(self.spacing_octaves()) - 1.0)).max(MIN_SPACING_HZ)
    }
}

/// A frequency that deviates enough from the target to deserve a band
#[derive(Debug, Clone, Copy)]
struct Candidate {
    freq: f64,
    error: f64,
    weighted: f64,
}

/// Everything a pass reads
pub struct PassInput<'a> {
    pub kind: PassKind,
    /// Response before any EQ
    pub original: &'a Curve,
    /// Response corrected by the earlier passes
    pub current: &'a Curve,
    pub target: &'a Curve,
    pub config: &'a EqConfig,
    /// Bands placed by the earlier passes
    pub prior: &'a [EqBand],
    /// Narrow deep dips of the original response
    pub nulls: &'a [DetectedFeature],
    /// Bands this pass may add
    pub budget: usize,
    /// RMS error of `current` against the target
    pub previous_rms: f64,
}

/// Bands chosen by a pass
#[derive(Debug, Clone)]
pub struct PassOutput {
    pub bands: Vec<EqBand>,
    /// Frequencies whose error exceeded the pass thresholds
    pub active_frequencies: Vec<f64>,
    pub corrected: Curve,
    pub rms_error: f64,
}

/// Run one pass
pub fn run_pass(input: &PassInput<'_>) -> PassOutput {
    let config = input.config;
    let kind = input.kind;

    let errors = analyze_error(input.current, input.target);
    let candidates = find_candidates(input, &errors.per_frequency);
    let mut active_frequencies: Vec<f64> = candidates.iter().map(|c| c.freq).collect();
    active_frequencies.sort_by(f64::total_cmp);

    let mut bands = place_bands(input, &distribute(input, &candidates, input.budget));

    // The balance cut is sized from the tentative low cuts, then gets a slot
    // of its own
    if kind == PassKind::Broad
        && config.num_bands <= SMALL_BUDGET
        && let Some(balance) = balance_compensation(input, &bands, &errors.per_frequency)
        && (bands.len() < input.budget || input.budget >= 2)
    {
        if bands.len() >= input.budget {
            bands = place_bands(input, &distribute(input, &candidates, input.budget - 1));
        }
        debug!(
            "balance compensation: {:.1} dB at {:.0} Hz",
            balance.gain, balance.frequency
        );
        bands.push(balance);
    }

    correct_artifacts(input, &mut bands);

    let (bands, corrected, rms_error) = refine(input, bands);

    PassOutput {
        bands,
        active_frequencies,
        corrected,
        rms_error,
    }
}

fn find_candidates(input: &PassInput<'_>, errors: &[FrequencyError]) -> Vec<Candidate> {
    let schroeder = input.config.schroeder_freq;
    let thresholds = input.kind.thresholds();

    let mut candidates: Vec<Candidate> = errors
        .iter()
        .filter(|e| e.freq <= MAX_CORRECTION_FREQ && e.error.is_finite())
        .filter(|e| e.error.abs() > thresholds[ModalZone::of(e.freq, schroeder).index()])
        .map(|e| Candidate {
            freq: e.freq,
            error: e.error,
            weighted: e.error.abs() * frequency_weight(e.freq, schroeder),
        })
        .collect();

    candidates.sort_by(|a, b| b.weighted.total_cmp(&a.weighted));
    candidates
}

/// Pick up to `budget` candidates zone by zone, keeping bands apart
fn distribute(input: &PassInput<'_>, candidates: &[Candidate], budget: usize) -> Vec<Candidate> {
    let calibration = &input.config.calibration;
    let caps = Zone::caps(input.config.num_bands, budget);
    let mut used = [0usize; 5];
    let mut placed: Vec<f64> = input.prior.iter().map(|b| b.frequency).collect();
    let mut selected: Vec<Candidate> = Vec::new();

    let far_enough = |placed: &[f64], freq: f64| {
        let spacing = input.kind.min_spacing(freq);
        placed.iter().all(|&p| (p - freq).abs() >= spacing)
    };

    // Strong low-frequency modes go first, regardless of zone caps
    for c in candidates.iter().filter(|c| {
        c.freq < calibration.priority_max_freq && c.error.abs() > calibration.priority_threshold_db
    }) {
        if selected.len() >= budget {
            break;
        }
        if far_enough(&placed, c.freq) {
            used[Zone::of(c.freq).index()] += 1;
            placed.push(c.freq);
            selected.push(*c);
        }
    }

    for c in candidates {
        if selected.len() >= budget {
            break;
        }
        let zone = Zone::of(c.freq).index();
        if used[zone] >= caps[zone] || !far_enough(&placed, c.freq) {
            continue;
        }
        used[zone] += 1;
        placed.push(c.freq);
        selected.push(*c);
    }

    debug!(
        "{}: {} candidates, {} selected, zone usage {:?} of caps {:?}",
        input.kind.name(),
        candidates.len(),
        selected.len(),
        used,
        caps
    );
    selected
}

fn band_q(input: &PassInput<'_>, freq: f64, error: f64) -> f64 {
    let config = input.config;
    let mut q = base_q(freq) * input.kind.q_multiplier();
    if config.num_bands <= SMALL_BUDGET {
        q *= 0.6;
    }

    let magnitude = error.abs();
    q *= if magnitude >= 8.0 {
        1.2
    } else if magnitude >= 5.0 {
        1.1
    } else if magnitude >= 2.0 {
        1.05
    } else if magnitude < 0.5 {
        0.8
    } else {
        1.0
    };

    let (low, high) = ModalZone::of(freq, config.schroeder_freq).q_window();
    q.clamp(low, high).clamp(config.min_q, config.max_q)
}

fn in_null(nulls: &[DetectedFeature], freq: f64) -> bool {
    nulls
        .iter()
        .any(|null| (null.frequency - freq).abs() <= (null.width / 2.0).max(MIN_SPACING_HZ))
}

/// Turn the selected candidates into bands
///
/// Gains and widths follow the error measured at the start of the pass.
fn place_bands(input: &PassInput<'_>, selected: &[Candidate]) -> Vec<EqBand> {
    let config = input.config;
    let calibration = &config.calibration;
    let scale = input.kind.aggressiveness();
    let mut bands: Vec<EqBand> = Vec::with_capacity(selected.len());

    for c in selected {
        let freq_scale = if c.freq < config.schroeder_freq {
            1.0
        } else {
            STATISTICAL_GAIN_SCALE
        };
        let mut gain = (-c.error * (1.0 - config.smoothing) * scale * freq_scale)
            .clamp(-config.max_cut * scale, config.max_boost * scale);

        if gain > calibration.null_boost_limit_db && in_null(input.nulls, c.freq) {
            debug!(
                "limiting boost into null at {:.0} Hz: {:.1} -> {:.1} dB",
                c.freq, gain, calibration.null_boost_limit_db
            );
            gain = calibration.null_boost_limit_db;
        }

        if !gain.is_finite() || gain.abs() < calibration.min_band_gain_db {
            continue;
        }

        let q = band_q(input, c.freq, c.error);
        bands.push(EqBand::peak(c.freq, gain, q));
    }
    bands
}

/// Broad cut restoring balance after heavy low-frequency cuts
///
/// Cutting the lowest modes hard makes the untouched upper bass sound
/// relatively loud. When that region also sits above target, a wide cut
/// pulls it back.
fn balance_compensation(
    input: &PassInput<'_>,
    bands: &[EqBand],
    errors: &[FrequencyError],
) -> Option<EqBand> {
    let config = input.config;
    let calibration = &config.calibration;

    let low_cuts: Vec<f64> = bands
        .iter()
        .filter(|b| b.frequency < BALANCE_CUT_MAX_FREQ && b.gain < 0.0)
        .map(|b| b.gain.abs())
        .collect();
    if low_cuts.is_empty() {
        return None;
    }
    let mean_cut = low_cuts.iter().sum::<f64>() / low_cuts.len() as f64;

    let region: Vec<f64> = errors
        .iter()
        .filter(|e| e.freq >= BALANCE_REGION.0 && e.freq <= BALANCE_REGION.1)
        .map(|e| e.error)
        .collect();
    if region.is_empty() {
        return None;
    }
    let excess = region.iter().sum::<f64>() / region.len() as f64;

    if mean_cut < calibration.balance_cut_threshold_db
        || excess < calibration.balance_excess_threshold_db
    {
        return None;
    }

    let scale = input.kind.aggressiveness();
    let gain = (-excess * calibration.balance_factor).max(-config.max_cut * scale);
    if gain.abs() < calibration.min_band_gain_db {
        return None;
    }
    let q = calibration.balance_q.clamp(config.min_q, config.max_q);
    Some(EqBand::peak(calibration.balance_frequency, gain, q))
}

/// Add cuts for the overshoots the pass bands create
///
/// A cut landing on a band of this pass is folded into it; a boost lowered
/// below the minimum gain is dropped. Cuts landing on a band of an earlier
/// pass are skipped. New cuts stay within the pass budget.
fn correct_artifacts(input: &PassInput<'_>, bands: &mut Vec<EqBand>) {
    let config = input.config;
    let calibration = &config.calibration;
    let limit = config.max_cut * calibration.correction_factor;

    let artifacts = detect_artifacts(
        input.original,
        input.target,
        input.prior,
        bands.as_slice(),
        calibration,
    );
    for artifact in artifacts {
        let mut cut = artifact.corrective_band(calibration, config.max_cut);
        if !(cut.gain.abs() >= calibration.min_band_gain_db) {
            continue;
        }
        cut.q = cut.q.clamp(config.min_q, config.max_q);

        let coincides = |band: &EqBand| (band.frequency - cut.frequency).abs() < MIN_SPACING_HZ;
        if input.prior.iter().any(coincides) {
            continue;
        }

        if let Some(index) = bands.iter().position(coincides) {
            let existing = bands[index];
            let merged = (existing.gain + cut.gain).max(-limit);
            debug!(
                "{:?} artifact at {:.1} Hz ({:.1} dB over target), band {:.1} -> {:.1} dB",
                artifact.kind, artifact.frequency, artifact.severity, existing.gain, merged
            );
            let keep = if existing.is_boost() {
                merged >= calibration.min_band_gain_db
            } else {
                merged.abs() >= calibration.min_band_gain_db
            };
            if keep {
                bands[index].gain = merged;
            } else {
                bands.remove(index);
            }
            continue;
        }

        if bands.len() >= input.budget {
            continue;
        }
        debug!(
            "{:?} artifact at {:.1} Hz ({:.1} dB over target), adding {:.1} dB cut",
            artifact.kind, artifact.frequency, artifact.severity, cut.gain
        );
        bands.push(cut);
    }
}

fn corrected_rms(input: &PassInput<'_>, bands: &[EqBand]) -> (Curve, f64) {
    let all: Vec<EqBand> = input.prior.iter().chain(bands).copied().collect();
    let corrected = apply_bands(input.original, &all);
    let rms = analyze_error(&corrected, input.target).rms_error;
    (corrected, rms)
}

/// Drop bands until the pass improves on the previous RMS error
fn refine(input: &PassInput<'_>, mut bands: Vec<EqBand>) -> (Vec<EqBand>, Curve, f64) {
    let (mut corrected, mut rms) = corrected_rms(input, &bands);

    while !bands.is_empty() && rms >= input.previous_rms {
        let mut best: Option<(usize, Curve, f64)> = None;
        for i in 0..bands.len() {
            let mut trial = bands.clone();
            trial.remove(i);
            let (trial_corrected, trial_rms) = corrected_rms(input, &trial);
            if best.as_ref().is_none_or(|(_, _, r)| trial_rms < *r) {
                best = Some((i, trial_corrected, trial_rms));
            }
        }
        let Some((index, trial_corrected, trial_rms)) = best else {
            break;
        };
        debug!(
            "{}: dropping band at {:.0} Hz, RMS {:.3} -> {:.3} dB",
            input.kind.name(),
            bands[index].frequency,
            rms,
            trial_rms
        );
        bands.remove(index);
        corrected = trial_corrected;
        rms = trial_rms;
    }

    if bands.is_empty() {
        return (bands, input.current.clone(), input.previous_rms);
    }
    (bands, corrected, rms)
}
