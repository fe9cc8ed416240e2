//! Modal sound pressure between a source and a listener.
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
//! The pressure field of a rectangular room is represented as a sum of
//! standing wave modes:
//!
//! p(f) = Σ Ψ(source) · Ψ(listener) · H(f, f_nml)
//!
//! where Ψ(r) = cos(nπx/L) · cos(mπy/W) · cos(lπz/H) is the mode shape and
//! H is the response of a second-order resonator tuned to the mode frequency
//! f_nml = (c/2) · sqrt((n/L)² + (m/W)² + (l/H)²).
//!
//! Contributions are summed as complex numbers before the magnitude is taken,
//! so destructive interference between modes shows up as nulls.

use log::debug;
use num_complex::Complex64;
use rayon::prelude::*;
use serde::Serialize;
use std::f64::consts::PI;

use crate::{Curve, Point3D, RoomDimensions, SPEED_OF_SOUND, analysis_frequencies};

/// Stand-in for a zero room dimension in divisions
pub const DIMENSION_EPSILON: f64 = 1e-6;

/// Modes whose source/listener coupling is below this are skipped
pub const MIN_COUPLING: f64 = 1e-9;

/// Lowest level ever reported (dB)
pub const FLOOR_DB: f64 = -100.0;

/// Modes are pruned once all three indices exceed this order
pub const PRUNE_ORDER: u32 = 3;

/// A mode with its natural frequency and source/listener coupling
#[derive(Debug, Clone, Copy)]
struct CoupledMode {
    frequency: f64,
    coupling: f64,
}

/// Number of mode indices usable along an axis
fn axis_order(dimension: f64, max_order: u32) -> u32 {
    if dimension > DIMENSION_EPSILON {
        max_order
    } else {
        0
    }
}

fn safe_dimension(dimension: f64) -> f64 {
    dimension.max(DIMENSION_EPSILON)
}

/// Natural frequency of mode `(n, m, l)` in Hz
pub fn mode_frequency(room: &RoomDimensions, n: u32, m: u32, l: u32) -> f64 {
    let nx = n as f64 / safe_dimension(room.length);
    let my = m as f64 / safe_dimension(room.width);
    let lz = l as f64 / safe_dimension(room.height);
    (SPEED_OF_SOUND / 2.0) * (nx * nx + my * my + lz * lz).sqrt()
}

/// Mode shape of `(n, m, l)` at a point
///
/// The x coordinate is measured from the far wall (`x_eff = L - x`).
pub fn pressure_term(point: &Point3D, room: &RoomDimensions, n: u32, m: u32, l: u32) -> f64 {
    let length = safe_dimension(room.length);
    let width = safe_dimension(room.width);
    let height = safe_dimension(room.height);
    let x_eff = length - point.x;

    (n as f64 * PI * x_eff / length).cos()
        * (m as f64 * PI * point.y / width).cos()
        * (l as f64 * PI * point.z / height).cos()
}

/// Modal damping used for a mode at `mode_frequency`
///
/// Low-frequency modes ring longer in real rooms, so the base Q is raised
/// below 150 Hz. Never below 1.
pub fn effective_q(base_q: f64, mode_frequency: f64) -> f64 {
    let multiplier = if mode_frequency < 80.0 {
        2.0
    } else if mode_frequency < 150.0 {
        1.5
    } else {
        1.0
    };
    (base_q * multiplier).max(1.0)
}

/// Complex response of a second-order resonator at `frequency`
fn resonance(frequency: f64, mode_frequency: f64, q: f64) -> Complex64 {
    let r = frequency / mode_frequency;
    let real_part = 1.0 - r * r;
    let damping = r / q;
    let amplitude = 1.0 / (real_part * real_part + damping * damping).sqrt();
    let phase = (-damping).atan2(real_part);
    Complex64::from_polar(amplitude, phase)
}

fn coupled_modes(
    source: &Point3D,
    listener: &Point3D,
    room: &RoomDimensions,
    max_mode_order: u32,
) -> Vec<CoupledMode> {
    let max_n = axis_order(room.length, max_mode_order);
    let max_m = axis_order(room.width, max_mode_order);
    let max_l = axis_order(room.height, max_mode_order);

    let mut modes = Vec::new();
    for n in 0..=max_n {
        for m in 0..=max_m {
            for l in 0..=max_l {
                // DC mode carries no AC pressure
                if n == 0 && m == 0 && l == 0 {
                    continue;
                }
                if n > PRUNE_ORDER && m > PRUNE_ORDER && l > PRUNE_ORDER {
                    continue;
                }

                let coupling = pressure_term(source, room, n, m, l)
                    * pressure_term(listener, room, n, m, l);
                if coupling.abs() < MIN_COUPLING {
                    continue;
                }

                modes.push(CoupledMode {
                    frequency: mode_frequency(room, n, m, l),
                    coupling,
                });
            }
        }
    }
    modes
}

fn modal_spl(frequency: f64, modes: &[CoupledMode], base_q: f64) -> f64 {
    let sum = modes.iter().fold(Complex64::new(0.0, 0.0), |acc, mode| {
        let q = effective_q(base_q, mode.frequency);
        acc + resonance(frequency, mode.frequency, q) * mode.coupling
    });

    let magnitude = sum.norm();
    if magnitude > 0.0 && magnitude.is_finite() {
        (20.0 * magnitude.log10()).max(FLOOR_DB)
    } else {
        FLOOR_DB
    }
}

/// Simulate the modal response between `source` and `listener`
///
/// Evaluates every mode up to `max_mode_order` along each axis on the 20-300 Hz
/// grid. Never fails: degenerate rooms produce the -100 dB floor rather than
/// NaN.
///
/// # Arguments
/// * `source` - Source (subwoofer) position
/// * `listener` - Listening position
/// * `room` - Room dimensions
/// * `max_mode_order` - Highest mode index along each axis
/// * `base_q` - Modal Q before the low-frequency multiplier
pub fn simulate(
    source: &Point3D,
    listener: &Point3D,
    room: &RoomDimensions,
    max_mode_order: u32,
    base_q: f64,
) -> Curve {
    let modes = coupled_modes(source, listener, room, max_mode_order);
    debug!(
        "modal simulation: {} coupled modes (order {}, Q {:.2})",
        modes.len(),
        max_mode_order,
        base_q
    );

    let freq = analysis_frequencies();
    let spl: Vec<f64> = freq
        .to_vec()
        .into_par_iter()
        .map(|f| modal_spl(f, &modes, base_q))
        .collect();

    Curve::new(freq, spl.into())
}

/// Classification of a room mode by the number of walls involved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeKind {
    /// Between one pair of parallel walls
    Axial,
    /// Between two pairs of walls
    Tangential,
    /// Between all three pairs of walls
    Oblique,
}

/// Represents a room resonant mode
#[derive(Debug, Clone, Serialize)]
pub struct RoomMode {
    /// Resonant frequency in Hz
    pub frequency: f64,
    /// Mode indices (n, m, l) for x, y, z dimensions
    pub indices: [u32; 3],
    pub kind: ModeKind,
}

/// List room modes up to `max_frequency`, sorted by frequency
///
/// Axes with a zero dimension carry no modes.
pub fn room_modes(room: &RoomDimensions, max_frequency: f64, max_order: u32) -> Vec<RoomMode> {
    let max_n = axis_order(room.length, max_order);
    let max_m = axis_order(room.width, max_order);
    let max_l = axis_order(room.height, max_order);

    let mut modes = Vec::new();
    for n in 0..=max_n {
        for m in 0..=max_m {
            for l in 0..=max_l {
                if n == 0 && m == 0 && l == 0 {
                    continue;
                }

                let frequency = mode_frequency(room, n, m, l);
                if frequency > max_frequency {
                    continue;
                }

                let kind = match [n, m, l].iter().filter(|&&i| i == 0).count() {
                    2 => ModeKind::Axial,
                    1 => ModeKind::Tangential,
                    _ => ModeKind::Oblique,
                };

                modes.push(RoomMode {
                    frequency,
                    indices: [n, m, l],
                    kind,
                });
            }
        }
    }

    modes.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
    modes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_room() -> RoomDimensions {
        RoomDimensions::new(4.8, 4.8, 2.7)
    }

    fn reference_source() -> Point3D {
        Point3D::new(0.38, 0.25, 0.83)
    }

    fn reference_listener() -> Point3D {
        Point3D::new(2.0, 3.70, 0.55)
    }

    #[test]
    fn test_simulate_grid_and_floor() {
        let response = simulate(
            &reference_source(),
            &reference_listener(),
            &reference_room(),
            10,
            10.0,
        );
        assert_eq!(response.len(), 281);
        assert_eq!(response.freq[0], 20.0);
        assert_eq!(response.freq[280], 300.0);
        for &db in response.spl.iter() {
            assert!(db.is_finite());
            assert!(db >= FLOOR_DB);
        }
    }

    #[test]
    fn test_simulate_is_symmetric() {
        let room = reference_room();
        let a = simulate(&reference_source(), &reference_listener(), &room, 10, 10.0);
        let b = simulate(&reference_listener(), &reference_source(), &room, 10, 10.0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_simulate_zero_dimension_degrades_gracefully() {
        let room = RoomDimensions::new(5.0, 0.0, 2.5);
        let response = simulate(
            &Point3D::new(0.5, 0.0, 0.5),
            &Point3D::new(3.0, 0.0, 1.2),
            &room,
            6,
            8.0,
        );
        assert_eq!(response.len(), 281);
        assert!(response.spl.iter().all(|db| db.is_finite() && *db >= FLOOR_DB));
    }

    #[test]
    fn test_simulate_empty_room_hits_floor() {
        let room = RoomDimensions::new(0.0, 0.0, 0.0);
        let p = Point3D::new(0.0, 0.0, 0.0);
        let response = simulate(&p, &p, &room, 10, 10.0);
        assert!(response.spl.iter().all(|&db| db == FLOOR_DB));
    }

    #[test]
    fn test_first_axial_mode_shows_as_peak() {
        // Source and listener in opposite corners couple every mode strongly
        let room = RoomDimensions::new(5.0, 4.0, 2.5);
        let response = simulate(
            &Point3D::new(0.0, 0.0, 0.0),
            &Point3D::new(5.0, 4.0, 2.5),
            &room,
            4,
            10.0,
        );
        // (1,0,0) at 343 / 10 = 34.3 Hz
        let at_mode = response.value_near(34.0, 1.0).unwrap();
        let below = response.value_near(25.0, 1.0).unwrap();
        assert!(at_mode > below + 6.0, "mode {at_mode} vs below {below}");
    }

    #[test]
    fn test_effective_q_multipliers() {
        assert_eq!(effective_q(10.0, 50.0), 20.0);
        assert_eq!(effective_q(10.0, 100.0), 15.0);
        assert_eq!(effective_q(10.0, 200.0), 10.0);
        assert_eq!(effective_q(0.2, 200.0), 1.0);
        assert_eq!(effective_q(f64::NAN, 200.0), 1.0);
    }

    #[test]
    fn test_pressure_term_mirrors_x() {
        let room = RoomDimensions::new(4.0, 3.0, 2.5);
        // x = 0 maps to the far wall: cos(π) for n = 1
        let term = pressure_term(&Point3D::new(0.0, 0.0, 0.0), &room, 1, 0, 0);
        assert!((term + 1.0).abs() < 1e-12);
        let term = pressure_term(&Point3D::new(1.0, 0.0, 0.0), &room, 1, 0, 0);
        let expected = (PI * 3.0 / 4.0).cos();
        assert!((term - expected).abs() < 1e-12);
    }

    #[test]
    fn test_room_modes_sorted_and_classified() {
        let room = RoomDimensions::new(5.0, 4.0, 2.5);
        let modes = room_modes(&room, 120.0, 10);
        assert!(!modes.is_empty());
        assert!(
            modes
                .windows(2)
                .all(|w| w[0].frequency <= w[1].frequency)
        );
        let first = &modes[0];
        assert_eq!(first.indices, [1, 0, 0]);
        assert_eq!(first.kind, ModeKind::Axial);
        assert!((first.frequency - 34.3).abs() < 1e-9);
        assert!(modes.iter().all(|m| m.frequency <= 120.0));
    }

    #[test]
    fn test_room_modes_skip_flat_axis() {
        let room = RoomDimensions::new(5.0, 4.0, 0.0);
        let modes = room_modes(&room, 300.0, 5);
        assert!(modes.iter().all(|m| m.indices[2] == 0));
    }
}
