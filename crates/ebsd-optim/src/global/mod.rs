//! Global minimizers. All of them draw from a seeded ChaCha generator, so a
//! given configuration always returns the same result.

mod basinhopping;
mod differential_evolution;
mod dual_annealing;
mod sampling;
mod shgo;

pub use basinhopping::BasinHopping;
pub use differential_evolution::{DifferentialEvolution, Mutation};
pub use dual_annealing::DualAnnealing;
pub use sampling::{halton, sobol, SamplingMethod};
pub use shgo::Shgo;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seed used when a configuration does not name one.
pub const DEFAULT_SEED: u64 = 42;

pub(crate) fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}
