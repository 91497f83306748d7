//! Simplex search with box constraints and a hard evaluation budget.
//!
//! Trial points are pinned onto the box and the search stops the moment the
//! budget is spent, so `n_evals` never exceeds `maxeval`. Without an explicit
//! budget the search gets [`DEFAULT_MAXEVAL_PER_PARAM`] evaluations per
//! parameter.

use crate::bounds::check_problem;
use crate::nelder_mead::{centroid, sort_simplex};
use crate::objective::Counted;
use crate::{Bounds, Minimizer, OptimizeError, OptimizeResult};
use serde::{Deserialize, Serialize};

/// Evaluations per free parameter when `maxeval` is `None`.
pub const DEFAULT_MAXEVAL_PER_PARAM: usize = 1000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundedNelderMead {
    /// Initial simplex edge per parameter; one value is broadcast. Empty
    /// picks a step from `x0` and the bounds.
    pub initial_step: Vec<f64>,
    /// Stop when the simplex values agree to this relative tolerance.
    pub ftol_rel: f64,
    /// Evaluation budget, `DEFAULT_MAXEVAL_PER_PARAM * n` when `None`.
    pub maxeval: Option<usize>,
}

impl Default for BoundedNelderMead {
    fn default() -> Self {
        Self {
            initial_step: Vec::new(),
            ftol_rel: 1e-4,
            maxeval: None,
        }
    }
}

impl BoundedNelderMead {
    fn steps(&self, x0: &[f64], bounds: Option<&Bounds>) -> Result<Vec<f64>, OptimizeError> {
        let n = x0.len();
        match self.initial_step.len() {
            0 => Ok((0..n)
                .map(|i| {
                    let step = if x0[i] != 0.0 { 0.1 * x0[i].abs() } else { 1.0 };
                    match bounds {
                        Some(b) if b.width(i).is_finite() && b.width(i) > 0.0 => step.min(0.25 * b.width(i)),
                        _ => step,
                    }
                })
                .collect()),
            1 => Ok(vec![self.initial_step[0]; n]),
            len if len == n => Ok(self.initial_step.clone()),
            len => Err(OptimizeError::InvalidParameter {
                name: "initial_step",
                reason: format!("expected 1 or {n} values, got {len}"),
            }),
        }
    }

    fn run(&self, obj: &mut Counted<'_>, x0: &[f64], steps: &[f64], bounds: Option<&Bounds>) -> OptimizeResult {
        let n = x0.len();
        let pin = |x: &mut Vec<f64>| {
            if let Some(b) = bounds {
                b.clip(x);
            }
        };

        let mut start = x0.to_vec();
        pin(&mut start);
        let mut sim = vec![start.clone()];
        for (i, &step) in steps.iter().enumerate() {
            let mut y = start.clone();
            y[i] += step;
            if let Some(b) = bounds {
                if y[i] > b.upper()[i] {
                    y[i] = start[i] - step;
                }
            }
            pin(&mut y);
            sim.push(y);
        }

        let mut fsim = Vec::with_capacity(n + 1);
        for x in &sim {
            match obj.try_eval(x) {
                Some(v) => fsim.push(v),
                None => break,
            }
        }
        if fsim.len() < sim.len() {
            sim.truncate(fsim.len());
            sort_simplex(&mut sim, &mut fsim);
            return finish(sim, fsim, obj, 0, false);
        }
        sort_simplex(&mut sim, &mut fsim);

        let mut iterations = 0;
        let mut converged = false;
        'outer: loop {
            let (fl, fh) = (fsim[0], fsim[n]);
            // every vertex is NaN-ranked: nothing left to compare
            if !fl.is_finite() {
                break;
            }
            if fh == fl || (fh - fl).abs() <= self.ftol_rel * 0.5 * (fh.abs() + fl.abs()) {
                converged = true;
                break;
            }
            iterations += 1;

            let c = centroid(&sim[..n]);
            let worst = sim[n].clone();
            let toward = |k: f64| -> Vec<f64> {
                let mut p: Vec<f64> = c.iter().zip(&worst).map(|(ci, wi)| ci + k * (ci - wi)).collect();
                pin(&mut p);
                p
            };

            let xr = toward(1.0);
            let Some(fr) = obj.try_eval(&xr) else { break };
            if fr < fl {
                let xe = toward(2.0);
                let Some(fe) = obj.try_eval(&xe) else {
                    sim[n] = xr;
                    fsim[n] = fr;
                    break;
                };
                if fe < fr {
                    sim[n] = xe;
                    fsim[n] = fe;
                } else {
                    sim[n] = xr;
                    fsim[n] = fr;
                }
            } else if fr < fsim[n - 1] {
                sim[n] = xr;
                fsim[n] = fr;
            } else {
                let xc = if fr < fh { toward(0.5) } else { toward(-0.5) };
                let Some(fc) = obj.try_eval(&xc) else { break };
                if fc < fr.min(fh) {
                    sim[n] = xc;
                    fsim[n] = fc;
                } else {
                    let best = sim[0].clone();
                    for j in 1..=n {
                        let mut p: Vec<f64> = best.iter().zip(&sim[j]).map(|(b, s)| b + 0.5 * (s - b)).collect();
                        pin(&mut p);
                        match obj.try_eval(&p) {
                            Some(v) => {
                                sim[j] = p;
                                fsim[j] = v;
                            }
                            None => {
                                sort_simplex(&mut sim, &mut fsim);
                                break 'outer;
                            }
                        }
                    }
                }
            }
            sort_simplex(&mut sim, &mut fsim);
        }
        sort_simplex(&mut sim, &mut fsim);
        finish(sim, fsim, obj, iterations, converged)
    }
}

fn finish(
    mut sim: Vec<Vec<f64>>,
    fsim: Vec<f64>,
    obj: &Counted<'_>,
    n_iter: usize,
    converged: bool,
) -> OptimizeResult {
    let fun = fsim.first().copied().unwrap_or(f64::INFINITY);
    OptimizeResult {
        x: if sim.is_empty() { Vec::new() } else { sim.swap_remove(0) },
        fun,
        n_evals: obj.n_evals(),
        n_iter,
        converged,
    }
}

impl Minimizer for BoundedNelderMead {
    fn name(&self) -> &'static str {
        "ln_neldermead"
    }

    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> Result<OptimizeResult, OptimizeError> {
        check_problem(x0, bounds)?;
        let steps = self.steps(x0, bounds)?;
        let budget = self.maxeval.unwrap_or(DEFAULT_MAXEVAL_PER_PARAM * x0.len());
        let mut obj = Counted::with_budget(f, budget);
        let mut res = self.run(&mut obj, x0, &steps, bounds);
        if res.x.is_empty() {
            // zero budget: nothing evaluated
            res.x = x0.to_vec();
            if let Some(b) = bounds {
                b.clip(&mut res.x);
            }
        }
        Ok(res)
    }
}
