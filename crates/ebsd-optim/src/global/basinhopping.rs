use crate::bounds::check_problem;
use crate::global::{rng, DEFAULT_SEED};
use crate::objective::Counted;
use crate::{Bounds, LocalMethod, Minimizer, OptimizeError, OptimizeResult};
use rand::Rng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

const ADAPT_INTERVAL: usize = 50;
const TARGET_ACCEPT_RATE: f64 = 0.5;
const STEP_FACTOR: f64 = 0.9;

/// Basin hopping: random hops followed by local minimization, accepted by
/// the Metropolis criterion.
///
/// The hop size adapts every 50 hops towards a 50% acceptance rate. Bounds
/// are optional and only forwarded to the local minimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasinHopping {
    pub niter: usize,
    #[serde(rename = "T")]
    pub temperature: f64,
    pub stepsize: f64,
    pub minimizer: LocalMethod,
    pub seed: u64,
}

impl Default for BasinHopping {
    fn default() -> Self {
        Self {
            niter: 100,
            temperature: 1.0,
            stepsize: 0.5,
            minimizer: LocalMethod::default(),
            seed: DEFAULT_SEED,
        }
    }
}

impl Minimizer for BasinHopping {
    fn name(&self) -> &'static str {
        "basinhopping"
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip_all, fields(method = self.name(), n = x0.len()))
    )]
    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> Result<OptimizeResult, OptimizeError> {
        check_problem(x0, bounds)?;
        if !(self.stepsize > 0.0) {
            return Err(OptimizeError::InvalidParameter {
                name: "stepsize",
                reason: format!("must be positive, got {}", self.stepsize),
            });
        }
        let mut rng = rng(self.seed);
        let mut obj = Counted::new(f);

        let first = self.minimizer.run(&mut obj, x0, bounds);
        let (mut x, mut fx) = (first.x, first.fun);
        let (mut best_x, mut best_f) = (x.clone(), fx);
        let mut stepsize = self.stepsize;
        let mut accepted = 0usize;

        for hop in 1..=self.niter {
            let trial: Vec<f64> = x
                .iter()
                .map(|v| v + rng.gen_range(-stepsize..=stepsize))
                .collect();
            let local = self.minimizer.run(&mut obj, &trial, bounds);

            let accept = if local.fun < fx {
                true
            } else if self.temperature > 0.0 && local.fun.is_finite() {
                let w = (-(local.fun - fx) / self.temperature).exp();
                w >= rng.gen::<f64>()
            } else {
                false
            };
            if accept {
                accepted += 1;
                x = local.x;
                fx = local.fun;
                if fx < best_f {
                    best_f = fx;
                    best_x = x.clone();
                }
            }

            if hop % ADAPT_INTERVAL == 0 {
                let rate = accepted as f64 / hop as f64;
                if rate > TARGET_ACCEPT_RATE {
                    stepsize /= STEP_FACTOR;
                } else {
                    stepsize *= STEP_FACTOR;
                }
            }
        }
        log::trace!("basinhopping accepted {accepted}/{} hops", self.niter);

        Ok(OptimizeResult {
            x: best_x,
            fun: best_f,
            n_evals: obj.n_evals(),
            n_iter: self.niter,
            converged: true,
        })
    }
}
