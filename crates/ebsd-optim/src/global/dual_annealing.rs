use crate::bounds::{check_problem, require_finite};
use crate::global::{rng, DEFAULT_SEED};
use crate::objective::Counted;
use crate::{Bounds, Minimizer, NelderMead, OptimizeError, OptimizeResult};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;
use std::f64::consts::PI;

const TAIL_LIMIT: f64 = 1e8;
const MIN_VISIT_BOUND: f64 = 1e-10;

/// Generalized simulated annealing (Tsallis visiting distribution) with a
/// bounded simplex local search after every improving Markov chain.
///
/// Requires finite bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DualAnnealing {
    pub maxiter: usize,
    pub initial_temp: f64,
    pub restart_temp_ratio: f64,
    /// Visiting distribution parameter, in `(1, 3)`.
    pub visit: f64,
    /// Acceptance distribution parameter, negative.
    pub accept: f64,
    pub maxfun: usize,
    pub no_local_search: bool,
    pub seed: u64,
}

impl Default for DualAnnealing {
    fn default() -> Self {
        Self {
            maxiter: 1000,
            initial_temp: 5230.0,
            restart_temp_ratio: 2e-5,
            visit: 2.62,
            accept: -5.0,
            maxfun: 10_000_000,
            no_local_search: false,
            seed: DEFAULT_SEED,
        }
    }
}

/// Samples steps from the distorted Cauchy-Lorentz visiting distribution.
struct Visitor {
    qv: f64,
    factor4_p: f64,
    factor6: f64,
}

impl Visitor {
    fn new(qv: f64) -> Self {
        let factor2 = ((4.0 - qv) * (qv - 1.0).ln()).exp();
        let factor3 = ((2.0 - qv) * 2f64.ln() / (qv - 1.0)).exp();
        let factor4_p = PI.sqrt() * factor2 / (factor3 * (3.0 - qv));
        let factor5 = 1.0 / (qv - 1.0) - 0.5;
        let d1 = 2.0 - factor5;
        let factor6 = PI * (1.0 - factor5) / (PI * (1.0 - factor5)).sin() / ln_gamma(d1).exp();
        Self {
            qv,
            factor4_p,
            factor6,
        }
    }

    fn step(&self, rng: &mut ChaCha8Rng, temperature: f64) -> f64 {
        let factor1 = (temperature.ln() / (self.qv - 1.0)).exp();
        let factor4 = self.factor4_p * factor1;
        let sigmax = (-(self.qv - 1.0) * (self.factor6 / factor4).ln() / (3.0 - self.qv)).exp();
        let x: f64 = sigmax * rng.sample::<f64, _>(StandardNormal);
        let y: f64 = rng.sample(StandardNormal);
        let den = ((self.qv - 1.0) * y.abs().ln() / (3.0 - self.qv)).exp();
        let v = x / den;
        if v > TAIL_LIMIT {
            TAIL_LIMIT * rng.gen::<f64>()
        } else if v < -TAIL_LIMIT {
            -TAIL_LIMIT * rng.gen::<f64>()
        } else if v.is_nan() {
            0.0
        } else {
            v
        }
    }
}

impl DualAnnealing {
    fn validate(&self) -> Result<(), OptimizeError> {
        if !(self.visit > 1.0 && self.visit < 3.0) {
            return Err(OptimizeError::InvalidParameter {
                name: "visit",
                reason: format!("must lie in (1, 3), got {}", self.visit),
            });
        }
        if !(self.accept < 0.0) {
            return Err(OptimizeError::InvalidParameter {
                name: "accept",
                reason: format!("must be negative, got {}", self.accept),
            });
        }
        if !(self.initial_temp > 0.0) {
            return Err(OptimizeError::InvalidParameter {
                name: "initial_temp",
                reason: format!("must be positive, got {}", self.initial_temp),
            });
        }
        Ok(())
    }
}

/// Wrap `v` into `[lo, lo + range)`, nudging values that land on the edge.
fn wrap(v: f64, lo: f64, range: f64) -> f64 {
    if range <= 0.0 {
        return lo;
    }
    let a = v - lo;
    let b = a % range + range;
    let mut w = b % range + lo;
    if (w - lo).abs() < MIN_VISIT_BOUND {
        w += 1e-10;
    }
    w
}

struct Chain<'b> {
    bounds: &'b Bounds,
    current: Vec<f64>,
    current_f: f64,
    best: Vec<f64>,
    best_f: f64,
}

impl Minimizer for DualAnnealing {
    fn name(&self) -> &'static str {
        "dual_annealing"
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
        let bounds = require_finite(bounds, self.name())?;
        self.validate()?;

        let n = x0.len();
        let mut rng = rng(self.seed);
        let mut obj = Counted::with_budget(f, self.maxfun);
        let visitor = Visitor::new(self.visit);
        let local = NelderMead {
            maxfev: Some((6 * n).clamp(100, 1000)),
            ..NelderMead::default()
        };

        let mut start = x0.to_vec();
        bounds.clip(&mut start);
        let f0 = obj.eval(&start);
        let mut chain = Chain {
            bounds,
            current: start.clone(),
            current_f: f0,
            best: start,
            best_f: f0,
        };

        let t1 = ((self.visit - 1.0) * 2f64.ln()).exp() - 1.0;
        let restart_temp = self.initial_temp * self.restart_temp_ratio;
        let mut iteration = 0;
        'outer: while iteration < self.maxiter {
            for i in 0..self.maxiter {
                let s = i as f64 + 2.0;
                let t2 = ((self.visit - 1.0) * s.ln()).exp() - 1.0;
                let temperature = self.initial_temp * t1 / t2;
                if iteration >= self.maxiter {
                    break 'outer;
                }
                if temperature < restart_temp {
                    // restart from a random point
                    chain.current = (0..n)
                        .map(|k| bounds.lower()[k] + rng.gen::<f64>() * bounds.width(k))
                        .collect();
                    match obj.try_eval(&chain.current) {
                        Some(v) => chain.current_f = v,
                        None => break 'outer,
                    }
                    break;
                }

                let improved = self.run_chain(&mut chain, &mut obj, &mut rng, &visitor, i, temperature);
                if obj.exhausted() {
                    break 'outer;
                }
                if improved && !self.no_local_search {
                    let res = local.run(&mut obj, &chain.best, Some(bounds));
                    if res.fun < chain.best_f {
                        chain.best_f = res.fun;
                        chain.best = res.x.clone();
                        chain.current_f = res.fun;
                        chain.current = res.x;
                    }
                }
                iteration += 1;
            }
        }

        Ok(OptimizeResult {
            x: chain.best,
            fun: chain.best_f,
            n_evals: obj.n_evals(),
            n_iter: iteration,
            converged: !obj.exhausted(),
        })
    }
}

impl DualAnnealing {
    /// One Markov chain of `2 n` visits. Returns whether the best point moved.
    fn run_chain(
        &self,
        chain: &mut Chain<'_>,
        obj: &mut Counted<'_>,
        rng: &mut ChaCha8Rng,
        visitor: &Visitor,
        step: usize,
        temperature: f64,
    ) -> bool {
        let n = chain.current.len();
        let temperature_step = temperature / (step as f64 + 1.0);
        let mut improved = step == 0;
        let bounds = chain.bounds;

        for j in 0..2 * n {
            let mut x_visit = chain.current.clone();
            if j < n {
                for (k, v) in x_visit.iter_mut().enumerate() {
                    *v = wrap(*v + visitor.step(rng, temperature), bounds.lower()[k], bounds.width(k));
                }
            } else {
                let k = j - n;
                x_visit[k] = wrap(
                    x_visit[k] + visitor.step(rng, temperature),
                    bounds.lower()[k],
                    bounds.width(k),
                );
            }

            let Some(e) = obj.try_eval(&x_visit) else { break };
            if e < chain.current_f {
                chain.current_f = e;
                chain.current = x_visit;
                if e < chain.best_f {
                    chain.best_f = e;
                    chain.best = chain.current.clone();
                    improved = true;
                }
            } else {
                let r: f64 = rng.gen();
                let pqv_temp = 1.0 - (1.0 - self.accept) * (e - chain.current_f) / temperature_step;
                let pqv = if pqv_temp <= 0.0 {
                    0.0
                } else {
                    (pqv_temp.ln() / (1.0 - self.accept)).exp()
                };
                if r <= pqv {
                    chain.current_f = e;
                    chain.current = x_visit;
                }
            }
        }
        improved
    }
}

/// Natural log of the gamma function (Lanczos, g = 7).
fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        // reflection
        return (PI / (PI * x).sin()).abs().ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + 7.5;
    let series = COEF[1..]
        .iter()
        .enumerate()
        .fold(COEF[0], |acc, (i, c)| acc + c / (x + i as f64 + 1.0));
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + series.ln()
}
