//! Reverberation time and Schroeder frequency estimates.
//!
//! The EQ generator treats the Schroeder frequency as the boundary between
//! the modal region (individual room modes dominate) and the statistical
//! region above it. When no measured value is available it is estimated from
//! the room volume and an average absorption coefficient.

use serde::Serialize;

use crate::RoomDimensions;

/// Schroeder frequency used when the room cannot provide one (Hz)
pub const DEFAULT_SCHROEDER_FREQ: f64 = 200.0;

/// Room acoustics metrics
#[derive(Debug, Clone, Serialize)]
pub struct RoomAcoustics {
    /// Sabine RT60 in seconds
    pub rt60_sabine: f64,
    /// Eyring RT60 in seconds (more accurate for absorptive rooms)
    pub rt60_eyring: f64,
    /// Room volume in cubic metres
    pub volume: f64,
    /// Total surface area in square metres
    pub surface_area: f64,
    /// Average absorption coefficient
    pub average_alpha: f64,
    /// Transition from modal to statistical behaviour (Hz)
    pub schroeder_frequency: f64,
}

/// Decay constant shared by the Sabine and Eyring models (s/m)
const DECAY_CONSTANT: f64 = 0.161;

/// Sabine reverberation time in seconds, `total_absorption` in metric sabins
pub fn rt60_sabine(volume: f64, total_absorption: f64) -> f64 {
    match total_absorption {
        a if a > 0.0 => DECAY_CONSTANT * volume / a,
        _ => f64::INFINITY,
    }
}

/// Eyring reverberation time in seconds
///
/// Sabine's model with the absorption area replaced by `-S·ln(1 - α)`,
/// so the two agree for a nearly reflective room and Eyring falls to zero
/// as `average_alpha` reaches 1.
pub fn rt60_eyring(volume: f64, surface_area: f64, average_alpha: f64) -> f64 {
    if average_alpha >= 1.0 {
        return 0.0;
    }
    let absorption_area = -surface_area * (1.0 - average_alpha).ln();
    rt60_sabine(volume, absorption_area)
}

/// Schroeder frequency: 2000 · sqrt(RT60 / V)
///
/// Falls back to [`DEFAULT_SCHROEDER_FREQ`] when the inputs are degenerate.
pub fn schroeder_frequency(volume: f64, rt60: f64) -> f64 {
    if volume <= 0.0 || !rt60.is_finite() || rt60 <= 0.0 {
        return DEFAULT_SCHROEDER_FREQ;
    }
    2000.0 * (rt60 / volume).sqrt()
}

/// Estimate the room's acoustics from its dimensions and average absorption
pub fn calculate_room_acoustics(room: &RoomDimensions, average_alpha: f64) -> RoomAcoustics {
    let volume = room.volume();
    let surface_area = room.surface_area();
    let total_absorption = average_alpha * surface_area;

    let rt60_sab = rt60_sabine(volume, total_absorption);
    let rt60_eyr = rt60_eyring(volume, surface_area, average_alpha);

    RoomAcoustics {
        rt60_sabine: rt60_sab,
        rt60_eyring: rt60_eyr,
        volume,
        surface_area,
        average_alpha,
        schroeder_frequency: schroeder_frequency(volume, rt60_eyr),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rt60_sabine() {
        let rt60 = rt60_sabine(100.0, 16.1);
        assert!((rt60 - 1.0).abs() < 1e-12);
        assert!(rt60_sabine(100.0, 0.0).is_infinite());
    }

    #[test]
    fn test_eyring_limits() {
        // 0.161 * 100 / (-50 * ln(0.9))
        let rt60 = rt60_eyring(100.0, 50.0, 0.1);
        assert!((rt60 - 3.0562).abs() < 1e-3);
        assert!(rt60_eyring(100.0, 50.0, 1.0) == 0.0);
        assert!(rt60_eyring(100.0, 50.0, 0.0).is_infinite());
        assert!(rt60_eyring(100.0, 50.0, -0.2).is_infinite());
        assert!(rt60_eyring(100.0, 50.0, f64::NAN).is_infinite());
    }

    #[test]
    fn test_eyring_shorter_than_sabine() {
        let room = RoomDimensions::new(6.0, 5.0, 2.7);
        let acoustics = calculate_room_acoustics(&room, 0.3);
        assert!(acoustics.rt60_eyring < acoustics.rt60_sabine);
    }

    #[test]
    fn test_schroeder_frequency_typical_room() {
        // 4.8 x 4.8 x 2.7 m living room, moderately damped
        let room = RoomDimensions::new(4.8, 4.8, 2.7);
        let acoustics = calculate_room_acoustics(&room, 0.3);
        assert!(acoustics.schroeder_frequency > 80.0);
        assert!(acoustics.schroeder_frequency < 250.0);
    }

    #[test]
    fn test_schroeder_frequency_fallback() {
        assert_eq!(schroeder_frequency(0.0, 0.5), DEFAULT_SCHROEDER_FREQ);
        assert_eq!(schroeder_frequency(50.0, f64::INFINITY), DEFAULT_SCHROEDER_FREQ);
    }
}
