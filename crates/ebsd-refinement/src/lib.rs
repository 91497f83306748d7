//! Orientation and projection-center refinement of EBSD patterns.
//!
//! Every navigation point is refined on its own: a simulated pattern is
//! projected from the master pattern for the current parameters and compared
//! with the observed pattern by normalized cross-correlation. The optimizer
//! minimizes `1 - NCC` over Euler angles, the projection center, or both.
//!
//! Work is split into navigation chunks that run in parallel with `rayon`.
//! Setting [`RefineParams::compute`] to `false` returns a
//! [`DeferredRefinement`] instead, whose shape and chunking can be inspected
//! before anything is optimized.
//!
//! Methods come from `ebsd-optim`: `minimize` (Nelder-Mead or Powell) is
//! always available, `ln_neldermead` needs the `bounded` feature and the
//! global methods need `global`.

mod config;
mod crystal_map;
mod deferred;
mod driver;
mod error;
mod method;
mod objective;
mod pattern_stack;

pub use config::RefineConfig;
pub use crystal_map::CrystalMap;
pub use deferred::{DeferredRefinement, RefinementTable};
pub use driver::{
    refine_orientation, refine_orientation_projection_center, refine_projection_center,
    PcRefinement, RefineInputs, RefineOutcome, RefineParams,
};
pub use error::{RefineError, RefineIoError};
pub use method::{Method, SUPPORTED_METHODS};
pub use objective::{RefineTarget, RefinementObjective};
pub use pattern_stack::{ChunkConfig, Mask, PatternStack};
