//! Derivative-free minimizers for small, noisy, box-constrained problems.
//!
//! Every method implements [`Minimizer`]: it takes a scalar objective, an
//! initial guess and optional [`Bounds`], and returns an [`OptimizeResult`].
//! Objective values of `NaN` are ranked worse than any number, so a method
//! never settles on an undefined point.
//!
//! Local methods ([`NelderMead`], [`Powell`]) are always available. The
//! bounded simplex with an exact evaluation budget lives behind the
//! `bounded` feature, the stochastic and sampling-based global methods
//! behind `global`. Both are on by default.
//!
//! ```
//! use ebsd_optim::{Bounds, Minimizer, NelderMead};
//!
//! let bounds = Bounds::new(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
//! let mut f = |x: &[f64]| (x[0] - 0.25).powi(2) + (x[1] + 0.5).powi(2);
//! let res = NelderMead::default()
//!     .with_tol(1e-8)
//!     .minimize(&mut f, &[0.0, 0.0], Some(&bounds))
//!     .unwrap();
//! assert!((res.x[0] - 0.25).abs() < 1e-3);
//! ```

mod bounds;
mod error;
mod line_search;
mod local;
mod nelder_mead;
mod objective;
mod powell;

#[cfg(feature = "bounded")]
mod bounded_nelder_mead;
#[cfg(feature = "global")]
mod global;

pub use bounds::Bounds;
pub use error::OptimizeError;
pub use local::LocalMethod;
pub use nelder_mead::NelderMead;
pub use objective::rank;
pub use powell::Powell;

#[cfg(feature = "bounded")]
pub use bounded_nelder_mead::{BoundedNelderMead, DEFAULT_MAXEVAL_PER_PARAM};
#[cfg(feature = "global")]
pub use global::{
    halton, sobol, BasinHopping, DifferentialEvolution, DualAnnealing, Mutation, SamplingMethod,
    Shgo, DEFAULT_SEED,
};

/// Outcome of a minimization.
#[derive(Clone, Debug, PartialEq)]
pub struct OptimizeResult {
    /// Best parameters found.
    pub x: Vec<f64>,
    /// Objective at `x`; `+inf` when only `NaN` values were seen.
    pub fun: f64,
    /// Objective evaluations spent.
    pub n_evals: usize,
    pub n_iter: usize,
    /// Whether the method met its own stopping tolerance rather than a limit.
    pub converged: bool,
}

/// A scalar minimizer over `R^n`.
pub trait Minimizer: Send + Sync {
    /// Method name as accepted by configuration.
    fn name(&self) -> &'static str;

    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> Result<OptimizeResult, OptimizeError>;
}
