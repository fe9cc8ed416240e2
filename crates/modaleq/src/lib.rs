#![doc = include_str!("../README.md")]

// Re-export the simulation crate
pub use modaleq_roomsim as roomsim;

// Re-export the types shared with the simulation crate
pub use modaleq_roomsim::{Curve, ModalSimulator, Point3D, RoomDimensions};

/// Error types for modaleq operations.
pub mod error;
pub use error::{ModalEqError, Result};

/// Error analysis between a response and its target
pub mod analysis;
/// Speaker directivity lookup tables
pub mod directivity;
/// Multi-pass EQ generation
pub mod eq;
/// Text and JSON exports of EQ settings
pub mod export;
/// Peak and dip detection
pub mod features;
/// Parametric bands and their application
pub mod filter_bank;
/// End-to-end simulation and correction
pub mod pipeline;
/// Preference target curve
pub mod target;

// Re-export commonly used items
pub use analysis::{ErrorAnalysis, analyze_error, calculate_optimal_offset};
pub use eq::{
    EqConfig, LogObserver, MultiPassEq, NoopObserver, PassObserver, PassResult, generate,
    generate_with_observer,
};
pub use features::{DetectedFeature, FeatureKind, detect_features};
pub use filter_bank::{EqBand, EqSettings, apply};
pub use pipeline::{PipelineResult, RunConfig, run_pipeline};
pub use target::{Rolloff, target_curve};
