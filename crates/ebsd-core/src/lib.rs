//! Geometry kernels for EBSD pattern simulation.
//!
//! This crate holds everything needed to turn a master pattern, a detector
//! and a set of crystal orientations into simulated patterns, plus the
//! pattern statistics used to compare them with observations. It knows
//! nothing about optimization; see `ebsd-refinement` for that.

mod detector;
mod direction_cosines;
mod error;
mod lambert;
mod logger;
mod master_pattern;
mod pattern;
mod phase;
mod projection;
mod rotation;

pub use detector::{EbsdDetector, EmsoftPc, DEFAULT_PC};
pub use direction_cosines::{direction_cosines_into, unmasked_count, DirectionCosines};
pub use error::GeometryError;
pub use lambert::{
    lambert_interpolation_parameters, lambert_scale, vector_to_xy, xy_to_vector,
    LambertInterpolation, LAMBERT_HALF_SIDE,
};
pub use master_pattern::{EnergyAxis, Hemisphere, MasterPattern, MasterPatternSlice};
pub use pattern::{min_max, ncc_with_prepared, prepare_pattern, rescale_into, rescale_with_min_max};
pub use phase::{Atom, Lattice, Phase, PhaseEquality, PhaseMismatch, Structure};
pub use projection::{
    project_patterns_fixed_pc, project_patterns_varying_pc, project_single_pattern,
    ProjectionScratch, SimulatedPatterns, SimulationParams,
};
pub use rotation::{euler_from_quaternion, quaternion_from_euler, rotate_vectors, rotate_vectors_varying};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, init_with_levels, LogLevels};
