use crate::bounds::{check_problem, require_finite};
use crate::global::{rng, DEFAULT_SEED};
use crate::objective::Counted;
use crate::{Bounds, LocalMethod, Minimizer, NelderMead, OptimizeError, OptimizeResult};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Differential weight, fixed or dithered per generation within `[lo, hi)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Mutation {
    Constant(f64),
    Dither(f64, f64),
}

impl Mutation {
    fn sample(self, rng: &mut impl Rng) -> f64 {
        match self {
            Mutation::Constant(f) => f,
            Mutation::Dither(lo, hi) if hi > lo => rng.gen_range(lo..hi),
            Mutation::Dither(lo, _) => lo,
        }
    }
}

/// Differential evolution, `best/1/bin` strategy with immediate updating.
///
/// The population is seeded by Latin hypercube sampling of the bounds with
/// `x0` as its first member. Requires finite bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifferentialEvolution {
    pub maxiter: usize,
    /// Population size multiplier; the population holds `popsize * n` members.
    pub popsize: usize,
    pub mutation: Mutation,
    pub recombination: f64,
    /// Relative convergence tolerance on the spread of population values.
    pub tol: f64,
    pub atol: f64,
    /// Finish with a bounded local simplex search from the best member.
    pub polish: bool,
    pub seed: u64,
}

impl Default for DifferentialEvolution {
    fn default() -> Self {
        Self {
            maxiter: 1000,
            popsize: 15,
            mutation: Mutation::Dither(0.5, 1.0),
            recombination: 0.7,
            tol: 0.01,
            atol: 0.0,
            polish: true,
            seed: DEFAULT_SEED,
        }
    }
}

impl Minimizer for DifferentialEvolution {
    fn name(&self) -> &'static str {
        "differential_evolution"
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
        let n = x0.len();
        let size = (self.popsize * n).max(5);
        let mut rng = rng(self.seed);
        let mut obj = Counted::new(f);

        // Latin hypercube in the unit cube
        let mut population: Vec<Vec<f64>> = vec![vec![0.0; n]; size];
        for j in 0..n {
            let mut strata: Vec<usize> = (0..size).collect();
            strata.shuffle(&mut rng);
            for (member, s) in population.iter_mut().zip(strata) {
                member[j] = (s as f64 + rng.gen::<f64>()) / size as f64;
            }
        }
        population[0] = to_unit(bounds, x0);

        let mut energies: Vec<f64> = population
            .iter()
            .map(|u| obj.eval(&bounds.from_unit(u)))
            .collect();
        let mut best = argmin(&energies);

        let mut generations = 0;
        let mut converged = false;
        for _ in 0..self.maxiter {
            generations += 1;
            let scale = self.mutation.sample(&mut rng);
            for i in 0..size {
                let (r1, r2) = pick_two(&mut rng, size, i);
                let fill = rng.gen_range(0..n);
                let trial: Vec<f64> = (0..n)
                    .map(|j| {
                        if j == fill || rng.gen::<f64>() < self.recombination {
                            let v = population[best][j] + scale * (population[r1][j] - population[r2][j]);
                            if (0.0..=1.0).contains(&v) {
                                v
                            } else {
                                rng.gen::<f64>()
                            }
                        } else {
                            population[i][j]
                        }
                    })
                    .collect();
                let e = obj.eval(&bounds.from_unit(&trial));
                if e <= energies[i] {
                    population[i] = trial;
                    energies[i] = e;
                    if e < energies[best] {
                        best = i;
                    }
                }
            }

            let (mean, std) = mean_std(&energies);
            if mean.is_finite() && std <= self.atol + self.tol * mean.abs() {
                converged = true;
                break;
            }
        }

        let mut x = bounds.from_unit(&population[best]);
        let mut fun = energies[best];
        if self.polish {
            let local = LocalMethod::NelderMead(NelderMead::default()).run(&mut obj, &x, Some(bounds));
            if local.fun < fun {
                x = local.x;
                fun = local.fun;
            }
        }

        Ok(OptimizeResult {
            x,
            fun,
            n_evals: obj.n_evals(),
            n_iter: generations,
            converged,
        })
    }
}

fn to_unit(bounds: &Bounds, x: &[f64]) -> Vec<f64> {
    x.iter()
        .enumerate()
        .map(|(i, v)| {
            let w = bounds.width(i);
            if w > 0.0 {
                ((v - bounds.lower()[i]) / w).clamp(0.0, 1.0)
            } else {
                0.0
            }
        })
        .collect()
}

fn pick_two(rng: &mut impl Rng, size: usize, exclude: usize) -> (usize, usize) {
    let mut draw = |other: Option<usize>| loop {
        let k = rng.gen_range(0..size);
        if k != exclude && Some(k) != other {
            return k;
        }
    };
    let a = draw(None);
    let b = draw(Some(a));
    (a, b)
}

pub(crate) fn argmin(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i)
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}
