//! Optimization method names and solver construction from JSON options.

use crate::RefineError;
use ebsd_optim::{LocalMethod, Minimizer, NelderMead};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Names accepted by [`Method::from_str`].
pub const SUPPORTED_METHODS: &[&str] = &[
    "minimize",
    "ln_neldermead",
    "basinhopping",
    "differential_evolution",
    "dual_annealing",
    "shgo",
];

/// Optimization strategy used per navigation point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    /// Local derivative-free minimization (`Nelder-Mead` or `Powell`).
    Minimize,
    /// Bounded simplex with an exact evaluation budget.
    LnNelderMead,
    BasinHopping,
    DifferentialEvolution,
    DualAnnealing,
    Shgo,
}

impl FromStr for Method {
    type Err = RefineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minimize" => Ok(Method::Minimize),
            "ln_neldermead" => Ok(Method::LnNelderMead),
            "basinhopping" => Ok(Method::BasinHopping),
            "differential_evolution" => Ok(Method::DifferentialEvolution),
            "dual_annealing" => Ok(Method::DualAnnealing),
            "shgo" => Ok(Method::Shgo),
            _ => Err(RefineError::UnsupportedMethod {
                method: s.to_string(),
                supported: SUPPORTED_METHODS,
            }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::Minimize => "minimize",
            Method::LnNelderMead => "ln_neldermead",
            Method::BasinHopping => "basinhopping",
            Method::DifferentialEvolution => "differential_evolution",
            Method::DualAnnealing => "dual_annealing",
            Method::Shgo => "shgo",
        }
    }

    /// Cargo feature that provides the method, if any.
    pub fn feature(self) -> Option<&'static str> {
        match self {
            Method::Minimize => None,
            Method::LnNelderMead => Some("bounded"),
            _ => Some("global"),
        }
    }

    /// Whether the method was compiled in.
    pub fn is_available(self) -> bool {
        match self.feature() {
            Some("bounded") => cfg!(feature = "bounded"),
            Some(_) => cfg!(feature = "global"),
            None => true,
        }
    }

    /// Methods that sample the whole search box.
    pub fn requires_trust_region(self) -> bool {
        matches!(
            self,
            Method::DifferentialEvolution | Method::DualAnnealing | Method::Shgo
        )
    }

    pub(crate) fn check_available(self) -> Result<(), RefineError> {
        match self.feature() {
            Some(feature) if !self.is_available() => Err(RefineError::BackendUnavailable {
                method: self.name(),
                feature,
            }),
            _ => Ok(()),
        }
    }
}

/// Settings of the bounded simplex that do not come from `method_kwargs`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct BoundedSettings {
    /// Per-parameter initial step in optimization units; empty picks a default.
    pub initial_step: Vec<f64>,
    pub rtol: f64,
    pub maxeval: Option<usize>,
}

fn parse<T: DeserializeOwned + Default>(value: &Value, method: &'static str) -> Result<T, RefineError> {
    if value.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(value.clone()).map_err(|source| RefineError::MethodKwargs { method, source })
}

#[cfg(feature = "global")]
fn field<'v>(value: &'v Value, key: &str) -> &'v Value {
    value.get(key).unwrap_or(&Value::Null)
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocalKwargs {
    method: Option<String>,
    tol: Option<f64>,
    options: serde_json::Map<String, Value>,
}

/// Local method from `{"method": ..., "tol": ..., "options": {...}}`.
///
/// `tol` sets every tolerance of the method; entries in `options` override
/// single fields afterwards.
fn local_method(kwargs: &Value, owner: &'static str) -> Result<LocalMethod, RefineError> {
    let kw: LocalKwargs = parse(kwargs, owner)?;
    let name = kw.method.as_deref().unwrap_or("Nelder-Mead");
    let mut local = LocalMethod::from_name(name).ok_or_else(|| RefineError::UnsupportedLocalMethod {
        method: name.to_string(),
    })?;
    if let Some(tol) = kw.tol {
        local = local.with_tol(tol);
    }
    if kw.options.is_empty() {
        return Ok(local);
    }

    let json_err = |source| RefineError::MethodKwargs { method: owner, source };
    let mut merged = serde_json::to_value(&local).map_err(json_err)?;
    if let Value::Object(map) = &mut merged {
        for (k, v) in kw.options {
            if k != "method" {
                map.insert(k, v);
            }
        }
    }
    serde_json::from_value(merged).map_err(json_err)
}

/// Build the per-point minimizer for `method`.
pub(crate) fn build_minimizer(
    method: Method,
    kwargs: &Value,
    bounded: &BoundedSettings,
) -> Result<Arc<dyn Minimizer>, RefineError> {
    method.check_available()?;
    match method {
        Method::Minimize => Ok(Arc::new(local_method(kwargs, method.name())?)),
        Method::LnNelderMead => build_bounded(bounded),
        _ => build_global(method, kwargs),
    }
}

#[cfg(feature = "bounded")]
fn build_bounded(bounded: &BoundedSettings) -> Result<Arc<dyn Minimizer>, RefineError> {
    Ok(Arc::new(ebsd_optim::BoundedNelderMead {
        initial_step: bounded.initial_step.clone(),
        ftol_rel: bounded.rtol,
        maxeval: bounded.maxeval,
    }))
}

#[cfg(not(feature = "bounded"))]
fn build_bounded(_bounded: &BoundedSettings) -> Result<Arc<dyn Minimizer>, RefineError> {
    Err(RefineError::BackendUnavailable {
        method: Method::LnNelderMead.name(),
        feature: "bounded",
    })
}

#[cfg(feature = "global")]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ShgoOptions {
    maxfev: Option<usize>,
    f_min: Option<f64>,
    f_tol: Option<f64>,
}

#[cfg(feature = "global")]
fn build_global(method: Method, kwargs: &Value) -> Result<Arc<dyn Minimizer>, RefineError> {
    use ebsd_optim::{BasinHopping, DifferentialEvolution, DualAnnealing, Shgo};

    let name = method.name();
    Ok(match method {
        Method::BasinHopping => {
            let mut bh: BasinHopping = parse(kwargs, name)?;
            bh.minimizer = local_method(field(kwargs, "minimizer_kwargs"), name)?;
            Arc::new(bh)
        }
        Method::DifferentialEvolution => Arc::new(parse::<DifferentialEvolution>(kwargs, name)?),
        Method::DualAnnealing => Arc::new(parse::<DualAnnealing>(kwargs, name)?),
        Method::Shgo => {
            let mut shgo: Shgo = parse(kwargs, name)?;
            let options: ShgoOptions = parse(field(kwargs, "options"), name)?;
            shgo.maxfev = options.maxfev.or(shgo.maxfev);
            shgo.f_min = options.f_min.or(shgo.f_min);
            shgo.f_tol = options.f_tol.unwrap_or(shgo.f_tol);
            shgo.minimizer = local_method(field(kwargs, "minimizer_kwargs"), name)?;
            Arc::new(shgo)
        }
        // local methods are handled by the caller
        Method::Minimize | Method::LnNelderMead => Arc::new(NelderMead::default()),
    })
}

#[cfg(not(feature = "global"))]
fn build_global(method: Method, _kwargs: &Value) -> Result<Arc<dyn Minimizer>, RefineError> {
    match method {
        Method::Minimize | Method::LnNelderMead => Ok(Arc::new(NelderMead::default())),
        _ => Err(RefineError::BackendUnavailable {
            method: method.name(),
            feature: "global",
        }),
    }
}
