use crate::OptimizeError;

/// Axis-aligned box constraints.
#[derive(Clone, Debug, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, OptimizeError> {
        if lower.len() != upper.len() {
            return Err(OptimizeError::DimensionMismatch {
                x0: lower.len(),
                bounds: upper.len(),
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if !(lo <= hi) {
                return Err(OptimizeError::InvertedBounds {
                    index,
                    lower: lo,
                    upper: hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    /// Box `center -/+ half_widths`.
    pub fn around(center: &[f64], half_widths: &[f64]) -> Result<Self, OptimizeError> {
        if center.len() != half_widths.len() {
            return Err(OptimizeError::DimensionMismatch {
                x0: center.len(),
                bounds: half_widths.len(),
            });
        }
        let lower = center.iter().zip(half_widths).map(|(c, h)| c - h.abs()).collect();
        let upper = center.iter().zip(half_widths).map(|(c, h)| c + h.abs()).collect();
        Self::new(lower, upper)
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    #[inline]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    #[inline]
    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    pub fn is_finite(&self) -> bool {
        self.lower.iter().chain(&self.upper).all(|v| v.is_finite())
    }

    /// Project `x` onto the box in place.
    pub fn clip(&self, x: &mut [f64]) {
        for ((v, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *v = v.clamp(*lo, *hi);
        }
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .all(|((v, lo), hi)| *v >= *lo && *v <= *hi)
    }

    /// Map unit-cube coordinates `u in [0, 1]^n` into the box.
    pub fn from_unit(&self, u: &[f64]) -> Vec<f64> {
        u.iter()
            .enumerate()
            .map(|(i, t)| self.lower[i] + t * self.width(i))
            .collect()
    }
}

/// Check the common preconditions shared by every minimizer.
pub(crate) fn check_problem(x0: &[f64], bounds: Option<&Bounds>) -> Result<(), OptimizeError> {
    if x0.is_empty() {
        return Err(OptimizeError::EmptyInitialGuess);
    }
    if let Some(b) = bounds {
        if b.dim() != x0.len() {
            return Err(OptimizeError::DimensionMismatch {
                x0: x0.len(),
                bounds: b.dim(),
            });
        }
    }
    Ok(())
}

/// Bounds that must exist and be finite.
pub(crate) fn require_finite<'a>(
    bounds: Option<&'a Bounds>,
    method: &'static str,
) -> Result<&'a Bounds, OptimizeError> {
    match bounds {
        Some(b) if b.is_finite() => Ok(b),
        _ => Err(OptimizeError::BoundsRequired { method }),
    }
}
