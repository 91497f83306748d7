use crate::bounds::{check_problem, require_finite};
use crate::global::differential_evolution::argmin;
use crate::global::SamplingMethod;
use crate::objective::Counted;
use crate::{Bounds, LocalMethod, Minimizer, OptimizeError, OptimizeResult};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Sampling-based global search in the spirit of simplicial homology
/// optimization.
///
/// The box is covered with a low-discrepancy sample. Every sample that is no
/// worse than its `2 n` nearest neighbours is a local-minimum candidate, and
/// a local minimization is started from each candidate, best first. The
/// initial guess is always part of the sample.
///
/// Requires finite bounds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Shgo {
    /// Sample points per iteration.
    pub n: usize,
    /// Sampling iterations; each adds `n` points.
    pub iters: usize,
    pub sampling_method: SamplingMethod,
    /// Evaluation budget; checked between local searches.
    pub maxfev: Option<usize>,
    /// Known global minimum, stops the search once reached within `f_tol`.
    pub f_min: Option<f64>,
    pub f_tol: f64,
    pub minimizer: LocalMethod,
}

impl Default for Shgo {
    fn default() -> Self {
        Self {
            n: 128,
            iters: 1,
            sampling_method: SamplingMethod::Sobol,
            maxfev: None,
            f_min: None,
            f_tol: 1e-4,
            minimizer: LocalMethod::default(),
        }
    }
}

impl Shgo {
    fn reached_target(&self, fun: f64) -> bool {
        match self.f_min {
            Some(target) if target != 0.0 => (fun - target) / target.abs() <= self.f_tol,
            Some(_) => fun <= self.f_tol,
            None => false,
        }
    }
}

/// Samples no worse than any of their `k` nearest neighbours.
fn minimizer_candidates(points: &[Vec<f64>], values: &[f64], k: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut dists: Vec<(f64, usize)> = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        dists.clear();
        dists.extend(points.iter().enumerate().filter(|(j, _)| *j != i).map(|(j, q)| {
            let d: f64 = p.iter().zip(q).map(|(a, b)| (a - b).powi(2)).sum();
            (d, j)
        }));
        dists.sort_by(|a, b| a.0.total_cmp(&b.0));
        if dists.iter().take(k).all(|&(_, j)| values[i] <= values[j]) {
            out.push(i);
        }
    }
    out.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
    out
}

impl Minimizer for Shgo {
    fn name(&self) -> &'static str {
        "shgo"
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
        if self.n == 0 {
            return Err(OptimizeError::InvalidParameter {
                name: "n",
                reason: "at least one sample point is needed".to_string(),
            });
        }
        let dim = x0.len();
        let mut obj = match self.maxfev {
            Some(m) => Counted::with_budget(f, m),
            None => Counted::new(f),
        };

        let mut start = x0.to_vec();
        bounds.clip(&mut start);
        let mut points = Vec::new();
        let mut values = Vec::new();
        if let Some(v) = obj.try_eval(&start) {
            points.push(start.clone());
            values.push(v);
        }

        let mut searched: Vec<usize> = Vec::new();
        let mut best_x = start;
        let mut best_f = values.first().copied().unwrap_or(f64::INFINITY);
        let mut iterations = 0;
        let mut done = false;

        for it in 0..self.iters.max(1) {
            iterations += 1;
            for u in self.sampling_method.points(dim, it * self.n, self.n)? {
                let x = bounds.from_unit(&u);
                let Some(v) = obj.try_eval(&x) else { break };
                points.push(x);
                values.push(v);
            }
            if points.is_empty() {
                break;
            }
            let i = argmin(&values);
            if values[i] < best_f {
                best_f = values[i];
                best_x = points[i].clone();
            }

            for c in minimizer_candidates(&points, &values, 2 * dim) {
                if self.reached_target(best_f) || obj.exhausted() {
                    done = true;
                    break;
                }
                if searched.contains(&c) {
                    continue;
                }
                searched.push(c);
                let local = self.minimizer.run(&mut obj, &points[c], Some(bounds));
                if local.fun < best_f {
                    best_f = local.fun;
                    best_x = local.x;
                }
            }
            log::trace!(
                "shgo iteration {it}: {} samples, {} local searches, best {best_f}",
                points.len(),
                searched.len()
            );
            if done || self.reached_target(best_f) || obj.exhausted() {
                break;
            }
        }

        Ok(OptimizeResult {
            x: best_x,
            fun: best_f,
            n_evals: obj.n_evals(),
            n_iter: iterations,
            converged: !obj.exhausted(),
        })
    }
}
