/// Errors raised when building or combining geometry containers.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("detector shape must be at least 1x1, got ({rows}, {cols})")]
    EmptyDetector { rows: usize, cols: usize },
    #[error("detector has {pcs} projection centers but navigation shape {nav_shape:?} holds {expected}")]
    ProjectionCenterCount {
        pcs: usize,
        nav_shape: Vec<usize>,
        expected: usize,
    },
    #[error("detector holds {pcs} projection centers, need 1 or {expected} (one per pattern)")]
    ProjectionCentersPerPattern { pcs: usize, expected: usize },
    #[error("master pattern data has {got} values, expected {expected} for shape {shape:?}")]
    MasterPatternSize {
        got: usize,
        expected: usize,
        shape: [usize; 4],
    },
    #[error("master pattern must be square in the Lambert projection, got npx={npx}, npy={npy}")]
    NonSquareMasterPattern { npx: usize, npy: usize },
    #[error("master pattern with hemisphere {hemisphere} must have {expected} hemisphere layer(s), got {got}")]
    HemisphereCount {
        hemisphere: String,
        expected: usize,
        got: usize,
    },
    #[error("energy {energy} keV is outside the master pattern energy range [{min}, {max}]")]
    EnergyOutOfRange { energy: f64, min: f64, max: f64 },
}
