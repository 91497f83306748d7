//! High-level facade crate for the `ebsd-*` workspace.
//!
//! Re-exports the geometry kernels, the optimizers and the refinement driver
//! under one roof, and (feature `tracing`) installs a subscriber that also
//! captures `log` records from the library crates.
//!
//! ## Quickstart
//!
//! ```no_run
//! use ebsd::refinement::{refine_orientation, RefineConfig, RefineInputs};
//! # fn run(inputs: RefineInputs<'_>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = RefineConfig::load_json("refine.json")?;
//! let params = config.build_params(None, None);
//! let xmap = refine_orientation(&inputs, &params)?.into_result()?;
//! println!("mean score: {:?}", xmap.prop("scores"));
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `ebsd::core`: rotations, square Lambert projection, detector, direction
//!   cosines, master pattern and pattern projection.
//! - `ebsd::optim`: derivative-free local and global minimizers.
//! - `ebsd::refinement`: orientation / projection-center refinement, crystal
//!   map, pattern stack, JSON run config.

pub use ebsd_core as core;
pub use ebsd_optim as optim;
pub use ebsd_refinement as refinement;

pub use ebsd_core::{EbsdDetector, MasterPattern, Phase};
pub use ebsd_refinement::{
    refine_orientation, refine_orientation_projection_center, refine_projection_center,
    CrystalMap, PatternStack, RefineConfig, RefineError, RefineInputs, RefineParams,
};

/// Install the stderr logger from `ebsd-core` at `level`.
pub fn init_logging(level: log::LevelFilter) -> Result<(), log::SetLoggerError> {
    ebsd_core::init_with_level(level)
}

/// Install the stderr logger with a quieter (or louder) optimizer level.
pub fn init_logging_with(levels: ebsd_core::LogLevels) -> Result<(), log::SetLoggerError> {
    ebsd_core::init_with_levels(levels)
}

/// Route `log` records into `tracing` and install the fmt subscriber.
///
/// Errors from an already installed logger or subscriber are ignored.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let _ = tracing_log::LogTracer::init();
    ebsd_core::init_tracing(json);
}
