use ebsd_core::{GeometryError, PhaseMismatch};
use ebsd_optim::OptimizeError;

/// Errors raised while validating or running a refinement.
#[derive(thiserror::Error, Debug)]
pub enum RefineError {
    #[error("Detector shape {detector:?} and signal shape {signal:?} must be equal")]
    DetectorShape {
        detector: (usize, usize),
        signal: (usize, usize),
    },
    #[error(
        "Detector must have exactly one projection center or one per pattern, \
         got PC navigation shape {detector:?} for navigation shape {navigation:?}"
    )]
    DetectorNavigationShape {
        detector: Vec<usize>,
        navigation: Vec<usize>,
    },
    #[error("Method '{method}' not in the list of supported methods {supported:?}")]
    UnsupportedMethod {
        method: String,
        supported: &'static [&'static str],
    },
    #[error("Local method '{method}' not in the list of supported methods [\"Nelder-Mead\", \"Powell\"]")]
    UnsupportedLocalMethod { method: String },
    #[error("Method '{method}' requires the `{feature}` feature of ebsd-refinement")]
    BackendUnavailable {
        method: &'static str,
        feature: &'static str,
    },
    #[error("Signal mask shape {mask:?} and detector shape {detector:?} must be equal")]
    SignalMaskShape {
        mask: Vec<usize>,
        detector: (usize, usize),
    },
    #[error("Navigation mask shape {mask:?} and navigation shape {navigation:?} must be equal")]
    NavigationMaskShape {
        mask: Vec<usize>,
        navigation: Vec<usize>,
    },
    #[error("Crystal map shape {xmap:?} and navigation shape {navigation:?} must be equal")]
    CrystalMapShape {
        xmap: Vec<usize>,
        navigation: Vec<usize>,
    },
    #[error("Points in data in crystal map must have only one phase, got phase IDs {phase_ids:?}")]
    MultiplePhases { phase_ids: Vec<i32> },
    #[error(
        "Master pattern phase '{master_pattern}' and phase of points in crystal map \
         '{xmap}' must be the same, but have different {reason}"
    )]
    PhaseMismatch {
        master_pattern: String,
        xmap: String,
        reason: PhaseMismatch,
    },
    #[error("Trust region must have {expected} values, got {got}")]
    TrustRegionLength { expected: usize, got: usize },
    #[error("Method '{method}' needs a trust region to bound its search")]
    TrustRegionRequired { method: &'static str },
    #[error("The initial step must be a single number, got {got} values")]
    InitialStepNotScalar { got: usize },
    #[error("The initial step must be a single number or two numbers, got {got} values")]
    InitialStepLength { got: usize },
    #[error("invalid options for method '{method}': {source}")]
    MethodKwargs {
        method: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("crystal map {what} has {got} entries, expected {expected}")]
    CrystalMapData {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    #[error("pattern data has {got} values, expected {expected} for navigation shape {navigation:?} and signal shape {signal:?}")]
    PatternDataSize {
        got: usize,
        expected: usize,
        navigation: Vec<usize>,
        signal: (usize, usize),
    },
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Optimize(#[from] OptimizeError),
}

/// Errors reading or writing a JSON refinement config.
#[derive(thiserror::Error, Debug)]
pub enum RefineIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
