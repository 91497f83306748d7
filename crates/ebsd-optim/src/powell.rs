//! Powell's conjugate-direction method.

use crate::bounds::check_problem;
use crate::line_search::{bracket, feasible_step_range, golden_section_minimize};
use crate::objective::Counted;
use crate::{Bounds, Minimizer, OptimizeError, OptimizeResult};
use serde::{Deserialize, Serialize};

const LINE_SEARCH_EVALS: usize = 60;

/// Powell minimizer with golden-section line searches.
///
/// With bounds, each line search is restricted to the feasible segment of its
/// direction, so iterates never leave the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Powell {
    /// Iteration limit, `1000 * n` when neither limit is set.
    pub maxiter: Option<usize>,
    /// Evaluation limit, `1000 * n` when neither limit is set.
    pub maxfev: Option<usize>,
    /// Line-search tolerance is `100 * xtol`.
    pub xtol: f64,
    /// Relative decrease per iteration accepted as converged.
    pub ftol: f64,
}

impl Default for Powell {
    fn default() -> Self {
        Self {
            maxiter: None,
            maxfev: None,
            xtol: 1e-4,
            ftol: 1e-4,
        }
    }
}

impl Powell {
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.xtol = tol;
        self.ftol = tol;
        self
    }

    fn limits(&self, n: usize) -> (usize, usize) {
        match (self.maxiter, self.maxfev) {
            (None, None) => (1000 * n, 1000 * n),
            (Some(it), None) => (it, usize::MAX),
            (None, Some(fev)) => (usize::MAX, fev),
            (Some(it), Some(fev)) => (it, fev),
        }
    }

    fn line_search(
        &self,
        obj: &mut Counted<'_>,
        stop_at: usize,
        x: &[f64],
        d: &[f64],
        fx: f64,
        bounds: Option<&Bounds>,
    ) -> (Vec<f64>, f64) {
        let along = |t: f64| -> Vec<f64> {
            let mut p: Vec<f64> = x.iter().zip(d).map(|(xi, di)| xi + t * di).collect();
            if let Some(b) = bounds {
                b.clip(&mut p);
            }
            p
        };
        let tol = 100.0 * self.xtol;

        // points past the budget are not evaluated and never win
        let mut eval_along = |t: f64| match budgeted_eval(obj, stop_at, &along(t)) {
            Some(v) => v,
            None => f64::INFINITY,
        };
        let (lo, hi) = match bounds {
            Some(b) => feasible_step_range(x, d, b.lower(), b.upper()),
            None => bracket(&mut eval_along, fx),
        };
        if hi - lo <= f64::EPSILON {
            return (x.to_vec(), fx);
        }
        let (t, ft) = golden_section_minimize(&mut eval_along, lo, hi, tol, LINE_SEARCH_EVALS);
        if ft < fx {
            (along(t), ft)
        } else {
            (x.to_vec(), fx)
        }
    }

    pub(crate) fn run(&self, obj: &mut Counted<'_>, x0: &[f64], bounds: Option<&Bounds>) -> OptimizeResult {
        let n = x0.len();
        let (maxiter, maxfev) = self.limits(n);
        let start_evals = obj.n_evals();
        let stop_at = start_evals.saturating_add(maxfev);

        let mut x = x0.to_vec();
        if let Some(b) = bounds {
            b.clip(&mut x);
        }
        let mut fval = obj.eval(&x);
        let mut dirs: Vec<Vec<f64>> = (0..n)
            .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();

        let mut iterations = 0;
        let mut converged = false;
        loop {
            let x_start = x.clone();
            let f_start = fval;
            let mut biggest = 0;
            let mut delta = 0.0;
            for (i, d) in dirs.iter().enumerate() {
                let before = fval;
                (x, fval) = self.line_search(obj, stop_at, &x, d, fval, bounds);
                if before - fval > delta {
                    delta = before - fval;
                    biggest = i;
                }
            }
            iterations += 1;

            if 2.0 * (f_start - fval) <= self.ftol * (f_start.abs() + fval.abs()) + 1e-20 {
                converged = true;
                break;
            }
            if !fval.is_finite() || obj.n_evals() >= stop_at || obj.exhausted() || iterations >= maxiter {
                break;
            }

            let direction: Vec<f64> = x.iter().zip(&x_start).map(|(a, b)| a - b).collect();
            let mut extrapolated: Vec<f64> = x.iter().zip(&x_start).map(|(a, b)| 2.0 * a - b).collect();
            if let Some(b) = bounds {
                b.clip(&mut extrapolated);
            }
            let Some(f_extra) = budgeted_eval(obj, stop_at, &extrapolated) else {
                break;
            };
            if f_start > f_extra {
                let mut t = 2.0 * (f_start + f_extra - 2.0 * fval);
                t *= (f_start - fval - delta).powi(2);
                t -= delta * (f_start - f_extra).powi(2);
                if t < 0.0 {
                    (x, fval) = self.line_search(obj, stop_at, &x, &direction, fval, bounds);
                    if direction.iter().any(|v| *v != 0.0) {
                        dirs[biggest] = dirs[n - 1].clone();
                        dirs[n - 1] = direction;
                    }
                }
            }
        }

        OptimizeResult {
            x,
            fun: fval,
            n_evals: obj.n_evals() - start_evals,
            n_iter: iterations,
            converged,
        }
    }
}

/// Evaluate unless `stop_at` evaluations or the outer budget are spent.
fn budgeted_eval(obj: &mut Counted<'_>, stop_at: usize, x: &[f64]) -> Option<f64> {
    if obj.n_evals() >= stop_at {
        None
    } else {
        obj.try_eval(x)
    }
}

impl Minimizer for Powell {
    fn name(&self) -> &'static str {
        "Powell"
    }

    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> Result<OptimizeResult, OptimizeError> {
        check_problem(x0, bounds)?;
        let mut obj = Counted::new(f);
        Ok(self.run(&mut obj, x0, bounds))
    }
}
