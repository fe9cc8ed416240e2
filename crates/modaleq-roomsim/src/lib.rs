//! Modal room simulation for subwoofer placement studies
//!
//! This crate estimates the low-frequency sound pressure response of a
//! rectangular room between a source and a listener by summing the room's
//! standing-wave modes. It provides:
//! - the [`Curve`] frequency response container shared with the EQ crate
//! - the modal simulator ([`modal::simulate`]) on a fixed 20-300 Hz grid
//! - a bounded memoization cache wrapped in the [`ModalSimulator`] service
//! - room mode listing and RT60 / Schroeder frequency estimates
//!
//! # Example
//!
//! ```
//! use modaleq_roomsim::{ModalSimulator, Point3D, RoomDimensions};
//!
//! let simulator = ModalSimulator::new();
//! let room = RoomDimensions::new(4.8, 4.8, 2.7);
//! let response = simulator.simulate(
//!     &Point3D::new(0.38, 0.25, 0.83),
//!     &Point3D::new(2.0, 3.7, 0.55),
//!     &room,
//!     10,
//!     10.0,
//! );
//! assert_eq!(response.len(), 281);
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// RT60 and Schroeder frequency estimates
pub mod acoustics;
/// Bounded response cache and the caching simulator service
pub mod cache;
/// Frequency response container
pub mod curve;
/// Modal sound pressure summation
pub mod modal;

pub use acoustics::{RoomAcoustics, calculate_room_acoustics, schroeder_frequency};
pub use cache::{CacheStats, ModalSimulator, ResponseCache};
pub use curve::{Curve, analysis_frequencies};
pub use modal::{ModeKind, RoomMode, room_modes, simulate};

/// Speed of sound in air (m/s)
pub const SPEED_OF_SOUND: f64 = 343.0;

/// Lowest simulated frequency (Hz)
pub const MIN_FREQ: f64 = 20.0;

/// Highest simulated frequency (Hz)
pub const MAX_FREQ: f64 = 300.0;

/// Spacing of the simulation grid (Hz)
pub const FREQ_STEP: f64 = 1.0;

/// 3D point in space, in metres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Point3D) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Inner dimensions of a rectangular room, in metres
///
/// `length` runs along x, `width` along y and `height` along z. A dimension
/// that is not strictly positive carries no modes along its axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RoomDimensions {
    /// Room length (x dimension)
    pub length: f64,
    /// Room width (y dimension)
    pub width: f64,
    /// Room height (z dimension)
    pub height: f64,
}

impl RoomDimensions {
    pub fn new(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Room volume in cubic metres
    pub fn volume(&self) -> f64 {
        self.length.max(0.0) * self.width.max(0.0) * self.height.max(0.0)
    }

    /// Total boundary surface in square metres
    pub fn surface_area(&self) -> f64 {
        let (l, w, h) = (
            self.length.max(0.0),
            self.width.max(0.0),
            self.height.max(0.0),
        );
        2.0 * (l * w + l * h + w * h)
    }

    /// Dimensions as an `[x, y, z]` array
    pub fn as_array(&self) -> [f64; 3] {
        [self.length, self.width, self.height]
    }

    /// Whether a point lies inside the room (boundaries included)
    pub fn contains(&self, point: &Point3D) -> bool {
        (0.0..=self.length).contains(&point.x)
            && (0.0..=self.width).contains(&point.y)
            && (0.0..=self.height).contains(&point.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_volume_and_surface() {
        let room = RoomDimensions::new(5.0, 4.0, 2.5);
        assert!((room.volume() - 50.0).abs() < 1e-12);
        assert!((room.surface_area() - 85.0).abs() < 1e-12);
    }

    #[test]
    fn test_room_contains() {
        let room = RoomDimensions::new(5.0, 4.0, 2.5);
        assert!(room.contains(&Point3D::new(0.0, 2.0, 1.0)));
        assert!(!room.contains(&Point3D::new(5.1, 2.0, 1.0)));
        assert!(!room.contains(&Point3D::new(1.0, -0.1, 1.0)));
    }

    #[test]
    fn test_point_distance() {
        let a = Point3D::new(0.0, 0.0, 0.0);
        let b = Point3D::new(3.0, 4.0, 0.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-12);
    }
}
