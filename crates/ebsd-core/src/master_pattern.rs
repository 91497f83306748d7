//! Square Lambert master patterns with an energy axis.

use crate::{GeometryError, Phase};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which hemispheres a master pattern stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hemisphere {
    Upper,
    Lower,
    Both,
}

impl Hemisphere {
    /// Number of stored hemisphere layers.
    pub fn layers(self) -> usize {
        match self {
            Hemisphere::Both => 2,
            Hemisphere::Upper | Hemisphere::Lower => 1,
        }
    }
}

impl fmt::Display for Hemisphere {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Hemisphere::Upper => "upper",
            Hemisphere::Lower => "lower",
            Hemisphere::Both => "both",
        })
    }
}

/// Uniform beam-energy axis in keV: `offset + i * scale`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnergyAxis {
    pub offset: f64,
    pub scale: f64,
}

impl EnergyAxis {
    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    /// Index of the axis value nearest to `energy`.
    ///
    /// Energies further than half a step outside the axis are rejected.
    pub fn nearest_index(&self, energy: f64, size: usize) -> Result<usize, GeometryError> {
        let last = self.offset + self.scale * (size.saturating_sub(1)) as f64;
        let (min, max) = if last < self.offset {
            (last, self.offset)
        } else {
            (self.offset, last)
        };
        let slack = 0.5 * self.scale.abs();
        if size == 0 || !(energy >= min - slack && energy <= max + slack) {
            return Err(GeometryError::EnergyOutOfRange { energy, min, max });
        }
        if self.scale == 0.0 {
            return Ok(0);
        }
        let idx = ((energy - self.offset) / self.scale).round().max(0.0) as usize;
        Ok(idx.min(size - 1))
    }
}

impl Default for EnergyAxis {
    fn default() -> Self {
        Self::new(20.0, 1.0)
    }
}

/// Master pattern of shape `(n_hemispheres, n_energies, npy, npx)`, row-major.
#[derive(Clone, Debug)]
pub struct MasterPattern {
    hemisphere: Hemisphere,
    n_energies: usize,
    npx: usize,
    npy: usize,
    energy: EnergyAxis,
    data: Vec<f32>,
    phase: Phase,
}

/// Both hemisphere layers of a master pattern at one energy.
#[derive(Clone, Copy, Debug)]
pub struct MasterPatternSlice<'a> {
    pub upper: &'a [f32],
    pub lower: &'a [f32],
    pub npx: usize,
    pub npy: usize,
    /// `(npx - 1) / 2`.
    pub scale: f64,
}

impl MasterPattern {
    /// Build a master pattern from flat data.
    ///
    /// `shape` is `(n_hemispheres, n_energies, npy, npx)`; the layer count
    /// must agree with `hemisphere` and the Lambert grid must be square.
    pub fn new(
        data: Vec<f32>,
        shape: [usize; 4],
        hemisphere: Hemisphere,
        energy: EnergyAxis,
        phase: Phase,
    ) -> Result<Self, GeometryError> {
        let [n_hemi, n_energies, npy, npx] = shape;
        if n_hemi != hemisphere.layers() {
            return Err(GeometryError::HemisphereCount {
                hemisphere: hemisphere.to_string(),
                expected: hemisphere.layers(),
                got: n_hemi,
            });
        }
        let expected = shape.iter().product();
        if data.len() != expected || expected == 0 {
            return Err(GeometryError::MasterPatternSize {
                got: data.len(),
                expected,
                shape,
            });
        }
        if npx != npy {
            return Err(GeometryError::NonSquareMasterPattern { npx, npy });
        }
        Ok(Self {
            hemisphere,
            n_energies,
            npx,
            npy,
            energy,
            data,
            phase,
        })
    }

    /// Two-hemisphere master pattern at a single energy.
    pub fn from_hemispheres(
        upper: &[f32],
        lower: &[f32],
        npx: usize,
        energy: f64,
        phase: Phase,
    ) -> Result<Self, GeometryError> {
        let mut data = Vec::with_capacity(upper.len() + lower.len());
        data.extend_from_slice(upper);
        data.extend_from_slice(lower);
        Self::new(
            data,
            [2, 1, npx, npx],
            Hemisphere::Both,
            EnergyAxis::new(energy, 1.0),
            phase,
        )
    }

    #[inline]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[inline]
    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    #[inline]
    pub fn energy_axis(&self) -> EnergyAxis {
        self.energy
    }

    #[inline]
    pub fn n_energies(&self) -> usize {
        self.n_energies
    }

    /// Lambert grid size `(npx, npy)`.
    #[inline]
    pub fn pixels(&self) -> (usize, usize) {
        (self.npx, self.npy)
    }

    /// `(n_hemispheres, n_energies, npy, npx)`.
    pub fn shape(&self) -> [usize; 4] {
        [self.hemisphere.layers(), self.n_energies, self.npy, self.npx]
    }

    /// Upper and lower layers at the energy nearest to `energy`.
    ///
    /// A single stored hemisphere serves both look-ups.
    pub fn slice_at_energy(&self, energy: f64) -> Result<MasterPatternSlice<'_>, GeometryError> {
        let e = self.energy.nearest_index(energy, self.n_energies)?;
        let layer = self.npx * self.npy;
        let at = |h: usize| {
            let start = (h * self.n_energies + e) * layer;
            &self.data[start..start + layer]
        };
        let (upper, lower) = match self.hemisphere {
            Hemisphere::Both => (at(0), at(1)),
            Hemisphere::Upper | Hemisphere::Lower => (at(0), at(0)),
        };
        Ok(MasterPatternSlice {
            upper,
            lower,
            npx: self.npx,
            npy: self.npy,
            scale: crate::lambert_scale(self.npx),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layered(n_hemi: usize, n_e: usize, npx: usize) -> Vec<f32> {
        (0..n_hemi * n_e * npx * npx).map(|k| k as f32).collect()
    }

    #[test]
    fn slices_pick_nearest_energy_and_hemisphere() {
        let mp = MasterPattern::new(
            layered(2, 3, 4),
            [2, 3, 4, 4],
            Hemisphere::Both,
            EnergyAxis::new(10.0, 5.0),
            Phase::new("ni"),
        )
        .unwrap();
        let s = mp.slice_at_energy(16.0).unwrap();
        // energy index 1 of hemisphere 0 starts at layer 1, hemisphere 1 at layer 4
        assert_eq!(s.upper[0], 16.0);
        assert_eq!(s.lower[0], 64.0);
        assert_eq!(s.scale, 1.5);
        assert_eq!(mp.slice_at_energy(20.0).unwrap().upper[0], 32.0);
    }

    #[test]
    fn energy_outside_axis_is_rejected() {
        let mp = MasterPattern::new(
            layered(2, 3, 4),
            [2, 3, 4, 4],
            Hemisphere::Both,
            EnergyAxis::new(10.0, 5.0),
            Phase::default(),
        )
        .unwrap();
        assert!(matches!(
            mp.slice_at_energy(30.0),
            Err(GeometryError::EnergyOutOfRange { min, max, .. }) if min == 10.0 && max == 20.0
        ));
        assert!(mp.slice_at_energy(7.0).is_err());
    }

    #[test]
    fn single_hemisphere_serves_both_lookups() {
        let mp = MasterPattern::new(
            layered(1, 1, 3),
            [1, 1, 3, 3],
            Hemisphere::Upper,
            EnergyAxis::new(20.0, 1.0),
            Phase::default(),
        )
        .unwrap();
        let s = mp.slice_at_energy(20.0).unwrap();
        assert_eq!(s.upper, s.lower);
    }

    #[test]
    fn construction_errors() {
        let hemi = MasterPattern::new(
            layered(1, 1, 3),
            [1, 1, 3, 3],
            Hemisphere::Both,
            EnergyAxis::default(),
            Phase::default(),
        );
        assert!(matches!(hemi, Err(GeometryError::HemisphereCount { expected: 2, got: 1, .. })));

        let size = MasterPattern::new(
            vec![0.0; 10],
            [2, 1, 3, 3],
            Hemisphere::Both,
            EnergyAxis::default(),
            Phase::default(),
        );
        assert!(matches!(size, Err(GeometryError::MasterPatternSize { got: 10, expected: 18, .. })));

        let square = MasterPattern::new(
            vec![0.0; 24],
            [2, 1, 3, 4],
            Hemisphere::Both,
            EnergyAxis::default(),
            Phase::default(),
        );
        assert!(matches!(square, Err(GeometryError::NonSquareMasterPattern { npx: 4, npy: 3 })));
    }
}
