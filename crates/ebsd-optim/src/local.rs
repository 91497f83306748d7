use crate::objective::Counted;
use crate::{Bounds, Minimizer, NelderMead, OptimizeError, OptimizeResult, Powell};
use serde::{Deserialize, Serialize};

/// Local minimizer used on its own or inside the global methods.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum LocalMethod {
    #[serde(rename = "Nelder-Mead")]
    NelderMead(NelderMead),
    #[serde(rename = "Powell")]
    Powell(Powell),
}

impl Default for LocalMethod {
    fn default() -> Self {
        LocalMethod::NelderMead(NelderMead::default())
    }
}

impl LocalMethod {
    /// Local method by its name, case-insensitive.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "nelder-mead" | "neldermead" => Some(LocalMethod::NelderMead(NelderMead::default())),
            "powell" => Some(LocalMethod::Powell(Powell::default())),
            _ => None,
        }
    }

    /// Apply a scalar tolerance to every tolerance the method has.
    pub fn with_tol(self, tol: f64) -> Self {
        match self {
            LocalMethod::NelderMead(nm) => LocalMethod::NelderMead(nm.with_tol(tol)),
            LocalMethod::Powell(p) => LocalMethod::Powell(p.with_tol(tol)),
        }
    }

    pub(crate) fn run(&self, obj: &mut Counted<'_>, x0: &[f64], bounds: Option<&Bounds>) -> OptimizeResult {
        match self {
            LocalMethod::NelderMead(nm) => nm.run(obj, x0, bounds),
            LocalMethod::Powell(p) => p.run(obj, x0, bounds),
        }
    }
}

impl Minimizer for LocalMethod {
    fn name(&self) -> &'static str {
        match self {
            LocalMethod::NelderMead(nm) => nm.name(),
            LocalMethod::Powell(p) => p.name(),
        }
    }

    fn minimize(
        &self,
        f: &mut dyn FnMut(&[f64]) -> f64,
        x0: &[f64],
        bounds: Option<&Bounds>,
    ) -> Result<OptimizeResult, OptimizeError> {
        match self {
            LocalMethod::NelderMead(nm) => nm.minimize(f, x0, bounds),
            LocalMethod::Powell(p) => p.minimize(f, x0, bounds),
        }
    }
}
