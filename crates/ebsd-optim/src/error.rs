#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum OptimizeError {
    #[error("initial guess must have at least one parameter")]
    EmptyInitialGuess,
    #[error("initial guess has {x0} parameters but bounds have {bounds}")]
    DimensionMismatch { x0: usize, bounds: usize },
    #[error("lower bound {lower} exceeds upper bound {upper} for parameter {index}")]
    InvertedBounds { index: usize, lower: f64, upper: f64 },
    #[error("{method} requires finite bounds on every parameter")]
    BoundsRequired { method: &'static str },
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
