//! Detection of overshoots created by the EQ itself.
//!
//! Two nearby boosts add up between their centres, and a boost can overshoot
//! its own target when the skirt of a neighbouring band already lifts the
//! response. Both are found by applying the cumulative correction to the
//! original response and comparing it with the target.

use crate::Curve;
use crate::analysis::FREQUENCY_TOLERANCE_HZ;
use crate::filter_bank::{EqBand, apply_bands};

use super::config::EqCalibration;

/// How an artifact was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Overshoot between two boosts
    Interaction,
    /// Overshoot at the centre of a boost
    Direct,
}

/// An overshoot of the corrected response above target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Artifact {
    pub frequency: f64,
    /// Overshoot above target (dB)
    pub severity: f64,
    pub kind: ArtifactKind,
}

impl Artifact {
    /// Cut that removes most of the overshoot
    pub fn corrective_band(&self, calibration: &EqCalibration, max_cut: f64) -> EqBand {
        let limit = max_cut * calibration.correction_factor;
        let gain = (-self.severity * calibration.correction_factor).max(-limit);
        let q = match self.kind {
            ArtifactKind::Interaction => calibration.interaction_q,
            ArtifactKind::Direct => calibration.direct_q,
        };
        EqBand::peak(self.frequency, gain, q)
    }
}

fn overshoot(corrected: &Curve, target: &Curve, freq: f64) -> Option<f64> {
    let current = corrected.value_near(freq, FREQUENCY_TOLERANCE_HZ)?;
    let wanted = target.value_near(freq, FREQUENCY_TOLERANCE_HZ)?;
    Some(current - wanted)
}

/// Find boost artifacts of `tentative` bands on top of `prior` ones
///
/// Only artifacts involving at least one tentative band are reported, so a
/// pass never re-corrects what an earlier pass already handled. The result
/// holds at most one artifact per frequency and is sorted by decreasing
/// severity.
pub fn detect_artifacts(
    original: &Curve,
    target: &Curve,
    prior: &[EqBand],
    tentative: &[EqBand],
    calibration: &EqCalibration,
) -> Vec<Artifact> {
    let all: Vec<EqBand> = prior.iter().chain(tentative).copied().collect();
    let corrected = apply_bands(original, &all);

    let boosts: Vec<(EqBand, bool)> = prior
        .iter()
        .map(|b| (*b, false))
        .chain(tentative.iter().map(|b| (*b, true)))
        .filter(|(b, _)| b.is_boost())
        .collect();

    let mut artifacts: Vec<Artifact> = Vec::new();

    for (i, (a, a_new)) in boosts.iter().enumerate() {
        for (b, b_new) in &boosts[i + 1..] {
            if !(*a_new || *b_new) {
                continue;
            }
            let distance = (a.frequency - b.frequency).abs();
            if distance == 0.0 || distance > calibration.interaction_window_hz {
                continue;
            }
            let midpoint = (a.frequency + b.frequency) / 2.0;
            if let Some(excess) = overshoot(&corrected, target, midpoint)
                && excess > calibration.interaction_threshold_db
            {
                artifacts.push(Artifact {
                    frequency: midpoint,
                    severity: excess,
                    kind: ArtifactKind::Interaction,
                });
            }
        }
    }

    for band in tentative.iter().filter(|b| b.is_boost()) {
        if let Some(excess) = overshoot(&corrected, target, band.frequency)
            && excess > calibration.direct_overshoot_db
        {
            artifacts.push(Artifact {
                frequency: band.frequency,
                severity: excess,
                kind: ArtifactKind::Direct,
            });
        }
    }

    artifacts.sort_by(|a, b| b.severity.total_cmp(&a.severity));
    let mut unique: Vec<Artifact> = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let duplicate = unique
            .iter()
            .any(|kept| (kept.frequency - artifact.frequency).abs() < FREQUENCY_TOLERANCE_HZ);
        if !duplicate {
            unique.push(artifact);
        }
    }
    unique
}
