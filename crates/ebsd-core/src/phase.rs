//! Crystallographic phase description and phase comparison.

use serde::{Deserialize, Serialize};
use std::fmt;

const POSITION_TOL: f64 = 1e-6;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub element: String,
    /// Fractional coordinates.
    pub xyz: [f64; 3],
    pub occupancy: f64,
}

impl Atom {
    pub fn new(element: impl Into<String>, xyz: [f64; 3]) -> Self {
        Self {
            element: element.into(),
            xyz,
            occupancy: 1.0,
        }
    }

    pub fn with_occupancy(mut self, occupancy: f64) -> Self {
        self.occupancy = occupancy;
        self
    }

    fn approx_eq(&self, other: &Atom) -> bool {
        self.element == other.element
            && close(self.occupancy, other.occupancy)
            && self.xyz.iter().zip(&other.xyz).all(|(a, b)| close(*a, *b))
    }
}

/// Lattice parameters, lengths in nm and angles in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lattice {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
}

impl Lattice {
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
        }
    }

    fn parameters(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }
}

impl Default for Lattice {
    fn default() -> Self {
        Self::new(1.0, 1.0, 1.0, 90.0, 90.0, 90.0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub lattice: Lattice,
    pub atoms: Vec<Atom>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Phase {
    pub name: String,
    pub space_group: Option<u32>,
    pub point_group: Option<String>,
    pub structure: Structure,
}

/// First property found to differ between two phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseMismatch {
    Names,
    SpaceGroups,
    PointGroups,
    NumberOfAtoms,
    Atoms,
    LatticeParameters,
}

impl fmt::Display for PhaseMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PhaseMismatch::Names => "names",
            PhaseMismatch::SpaceGroups => "space groups",
            PhaseMismatch::PointGroups => "point groups",
            PhaseMismatch::NumberOfAtoms => "number of atoms",
            PhaseMismatch::Atoms => "atoms",
            PhaseMismatch::LatticeParameters => "lattice parameters",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseEquality {
    pub equal: bool,
    pub reason: Option<PhaseMismatch>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_space_group(mut self, space_group: u32) -> Self {
        self.space_group = Some(space_group);
        self
    }

    pub fn with_point_group(mut self, point_group: impl Into<String>) -> Self {
        self.point_group = Some(point_group.into());
        self
    }

    pub fn with_structure(mut self, structure: Structure) -> Self {
        self.structure = structure;
        self
    }

    /// Compare two phases. Properties are checked in a fixed order and the
    /// first mismatch is reported.
    pub fn equals(&self, other: &Phase) -> PhaseEquality {
        match self.first_mismatch(other) {
            Some(reason) => PhaseEquality {
                equal: false,
                reason: Some(reason),
            },
            None => PhaseEquality {
                equal: true,
                reason: None,
            },
        }
    }

    fn first_mismatch(&self, other: &Phase) -> Option<PhaseMismatch> {
        if self.name != other.name {
            return Some(PhaseMismatch::Names);
        }
        if self.space_group != other.space_group {
            return Some(PhaseMismatch::SpaceGroups);
        }
        if self.point_group != other.point_group {
            return Some(PhaseMismatch::PointGroups);
        }
        let (sa, oa) = (&self.structure.atoms, &other.structure.atoms);
        if sa.len() != oa.len() {
            return Some(PhaseMismatch::NumberOfAtoms);
        }
        if !sa.iter().zip(oa).all(|(a, b)| a.approx_eq(b)) {
            return Some(PhaseMismatch::Atoms);
        }
        let (sl, ol) = (
            self.structure.lattice.parameters(),
            other.structure.lattice.parameters(),
        );
        if !sl.iter().zip(&ol).all(|(a, b)| close(*a, *b)) {
            return Some(PhaseMismatch::LatticeParameters);
        }
        None
    }
}

#[inline]
fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= POSITION_TOL * (1.0 + b.abs())
}
