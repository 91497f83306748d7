//! Downhill simplex with optional box clipping.

use crate::bounds::check_problem;
use crate::objective::Counted;
use crate::{Bounds, Minimizer, OptimizeError, OptimizeResult};
use serde::{Deserialize, Serialize};

const NONZERO_DELTA: f64 = 0.05;
const ZERO_DELTA: f64 = 0.000_25;

/// Nelder-Mead simplex minimizer.
///
/// The initial simplex perturbs each coordinate by 5% (or by `0.00025` when
/// it is zero). With bounds, every trial point is clipped onto the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    /// Iteration limit, `200 * n` when neither limit is set.
    pub maxiter: Option<usize>,
    /// Evaluation limit, `200 * n` when neither limit is set.
    pub maxfev: Option<usize>,
    /// Absolute spread of the simplex vertices accepted as converged.
    pub xatol: f64,
    /// Absolute spread of the simplex values accepted as converged.
    pub fatol: f64,
    /// Dimension-dependent coefficients (Gao and Han).
    pub adaptive: bool,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            maxiter: None,
            maxfev: None,
            xatol: 1e-4,
            fatol: 1e-4,
            adaptive: false,
        }
    }
}

impl NelderMead {
    /// Set both absolute tolerances.
    pub fn with_tol(mut self, tol: f64) -> Self {
        self.xatol = tol;
        self.fatol = tol;
        self
    }

    fn limits(&self, n: usize) -> (usize, usize) {
        match (self.maxiter, self.maxfev) {
            (None, None) => (200 * n, 200 * n),
            (Some(it), None) => (it, usize::MAX),
            (None, Some(fev)) => (usize::MAX, fev),
            (Some(it), Some(fev)) => (it, fev),
        }
    }

    pub(crate) fn run(&self, obj: &mut Counted<'_>, x0: &[f64], bounds: Option<&Bounds>) -> OptimizeResult {
        let n = x0.len();
        let nf = n as f64;
        let (rho, chi, psi, sigma) = if self.adaptive {
            (1.0, 1.0 + 2.0 / nf, 0.75 - 1.0 / (2.0 * nf), 1.0 - 1.0 / nf)
        } else {
            (1.0, 2.0, 0.5, 0.5)
        };
        let (maxiter, maxfev) = self.limits(n);
        let clip = |x: &mut Vec<f64>| {
            if let Some(b) = bounds {
                b.clip(x);
            }
        };

        let mut start = x0.to_vec();
        clip(&mut start);
        let mut sim = Vec::with_capacity(n + 1);
        sim.push(start.clone());
        for k in 0..n {
            let mut y = start.clone();
            y[k] = if y[k] != 0.0 {
                (1.0 + NONZERO_DELTA) * y[k]
            } else {
                ZERO_DELTA
            };
            clip(&mut y);
            sim.push(y);
        }
        let mut fsim: Vec<f64> = sim.iter().map(|x| obj.eval(x)).collect();
        sort_simplex(&mut sim, &mut fsim);

        let mut iterations = 1;
        let mut converged = false;
        let start_evals = obj.n_evals();
        while obj.n_evals() - start_evals < maxfev && iterations < maxiter {
            if simplex_converged(&sim, &fsim, self.xatol, self.fatol) {
                converged = true;
                break;
            }
            if !fsim[0].is_finite() {
                break;
            }

            let xbar = centroid(&sim[..n]);
            let worst = sim[n].clone();
            let point = |a: f64, b: f64| -> Vec<f64> {
                let mut p: Vec<f64> = xbar.iter().zip(&worst).map(|(c, w)| a * c + b * w).collect();
                clip(&mut p);
                p
            };

            let xr = point(1.0 + rho, -rho);
            let fxr = obj.eval(&xr);
            let mut shrink = false;

            if fxr < fsim[0] {
                let xe = point(1.0 + rho * chi, -rho * chi);
                let fxe = obj.eval(&xe);
                if fxe < fxr {
                    sim[n] = xe;
                    fsim[n] = fxe;
                } else {
                    sim[n] = xr;
                    fsim[n] = fxr;
                }
            } else if fxr < fsim[n - 1] {
                sim[n] = xr;
                fsim[n] = fxr;
            } else if fxr < fsim[n] {
                let xc = point(1.0 + psi * rho, -psi * rho);
                let fxc = obj.eval(&xc);
                if fxc <= fxr {
                    sim[n] = xc;
                    fsim[n] = fxc;
                } else {
                    shrink = true;
                }
            } else {
                let xcc = point(1.0 - psi, psi);
                let fxcc = obj.eval(&xcc);
                if fxcc < fsim[n] {
                    sim[n] = xcc;
                    fsim[n] = fxcc;
                } else {
                    shrink = true;
                }
            }

            if shrink {
                let best = sim[0].clone();
                for j in 1..=n {
                    let mut p: Vec<f64> = best
                        .iter()
                        .zip(&sim[j])
                        .map(|(b, s)| b + sigma * (s - b))
                        .collect();
                    clip(&mut p);
                    fsim[j] = obj.eval(&p);
                    sim[j] = p;
                }
            }

            sort_simplex(&mut sim, &mut fsim);
            iterations += 1;
        }

        OptimizeResult {
            x: sim.swap_remove(0),
            fun: fsim[0],
            n_evals: obj.n_evals() - start_evals,
            n_iter: iterations,
            converged,
        }
    }
}

impl Minimizer for NelderMead {
    fn name(&self) -> &'static str {
        "Nelder-Mead"
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

pub(crate) fn centroid(points: &[Vec<f64>]) -> Vec<f64> {
    let n = points.len() as f64;
    let mut c = vec![0.0; points.first().map_or(0, Vec::len)];
    for p in points {
        for (ci, pi) in c.iter_mut().zip(p) {
            *ci += pi;
        }
    }
    c.iter_mut().for_each(|v| *v /= n);
    c
}

/// Sort vertices by ascending value.
pub(crate) fn sort_simplex(sim: &mut Vec<Vec<f64>>, fsim: &mut Vec<f64>) {
    let mut order: Vec<usize> = (0..fsim.len()).collect();
    order.sort_by(|&a, &b| fsim[a].total_cmp(&fsim[b]));
    let sorted_sim = order.iter().map(|&i| sim[i].clone()).collect();
    let sorted_f = order.iter().map(|&i| fsim[i]).collect();
    *sim = sorted_sim;
    *fsim = sorted_f;
}

fn simplex_converged(sim: &[Vec<f64>], fsim: &[f64], xatol: f64, fatol: f64) -> bool {
    let best = &sim[0];
    let x_spread = sim[1..]
        .iter()
        .flat_map(|v| v.iter().zip(best).map(|(a, b)| (a - b).abs()))
        .fold(0.0, f64::max);
    let f_spread = fsim[1..]
        .iter()
        .map(|f| (f - fsim[0]).abs())
        .fold(0.0, f64::max);
    x_spread <= xatol && f_spread <= fatol
}
