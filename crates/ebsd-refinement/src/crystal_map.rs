//! Minimal crystal map: per-point orientations, phases and properties.

use crate::RefineError;
use ebsd_core::{rotate_vectors_varying, Phase};
use nalgebra::{UnitQuaternion, Vector3};
use std::collections::BTreeMap;

/// Orientation map over a 1D or 2D navigation grid.
///
/// Every point carries `rotations_per_point` candidate rotations (the first
/// is the best match), a phase ID into the phase list and an in-data flag.
/// Scalar per-point properties such as `"scores"` live in a name-keyed store.
#[derive(Clone, Debug)]
pub struct CrystalMap {
    shape: Vec<usize>,
    rotations: Vec<UnitQuaternion<f64>>,
    rotations_per_point: usize,
    phase_id: Vec<i32>,
    phases: BTreeMap<i32, Phase>,
    is_in_data: Vec<bool>,
    props: BTreeMap<String, Vec<f64>>,
}

impl CrystalMap {
    /// Build a map with every point in data.
    ///
    /// `rotations` holds `rotations_per_point` consecutive candidates per
    /// point in row-major navigation order.
    pub fn new(
        shape: Vec<usize>,
        rotations: Vec<UnitQuaternion<f64>>,
        rotations_per_point: usize,
        phase_id: Vec<i32>,
        phases: BTreeMap<i32, Phase>,
    ) -> Result<Self, RefineError> {
        let n: usize = shape.iter().product();
        let rotations_per_point = rotations_per_point.max(1);
        if rotations.len() != n * rotations_per_point {
            return Err(RefineError::CrystalMapData {
                what: "rotations",
                got: rotations.len(),
                expected: n * rotations_per_point,
            });
        }
        if phase_id.len() != n {
            return Err(RefineError::CrystalMapData {
                what: "phase IDs",
                got: phase_id.len(),
                expected: n,
            });
        }
        Ok(Self {
            shape,
            rotations,
            rotations_per_point,
            phase_id,
            phases,
            is_in_data: vec![true; n],
            props: BTreeMap::new(),
        })
    }

    /// Single-phase map (phase ID 0) with one rotation per point.
    pub fn single_phase(
        shape: Vec<usize>,
        rotations: Vec<UnitQuaternion<f64>>,
        phase: Phase,
    ) -> Result<Self, RefineError> {
        let n = shape.iter().product();
        Self::new(shape, rotations, 1, vec![0; n], BTreeMap::from([(0, phase)]))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of navigation points, in data or not.
    pub fn nav_size(&self) -> usize {
        self.phase_id.len()
    }

    /// Number of points in data.
    pub fn size(&self) -> usize {
        self.is_in_data.iter().filter(|&&v| v).count()
    }

    pub fn rotations_per_point(&self) -> usize {
        self.rotations_per_point
    }

    /// All rotation candidates, `rotations_per_point` per point.
    pub fn rotations(&self) -> &[UnitQuaternion<f64>] {
        &self.rotations
    }

    /// Best rotation of point `i`.
    pub fn rotation(&self, i: usize) -> &UnitQuaternion<f64> {
        &self.rotations[i * self.rotations_per_point]
    }

    /// Rotate one vector per point by that point's best rotation.
    ///
    /// Maps crystal directions into the sample frame, or sample directions
    /// into the crystal frame with `inverse`.
    pub fn rotate_per_point(&self, vectors: &[Vector3<f64>], inverse: bool) -> Result<Vec<Vector3<f64>>, RefineError> {
        if vectors.len() != self.nav_size() {
            return Err(RefineError::CrystalMapData {
                what: "vectors",
                got: vectors.len(),
                expected: self.nav_size(),
            });
        }
        let best: Vec<UnitQuaternion<f64>> = (0..self.nav_size())
            .map(|i| if inverse { self.rotation(i).inverse() } else { *self.rotation(i) })
            .collect();
        let mut out = vec![Vector3::zeros(); vectors.len()];
        rotate_vectors_varying(&best, vectors, &mut out);
        Ok(out)
    }

    pub fn phase_id(&self) -> &[i32] {
        &self.phase_id
    }

    pub fn phases(&self) -> &BTreeMap<i32, Phase> {
        &self.phases
    }

    /// Add or replace phase `id`.
    pub fn add_phase(&mut self, id: i32, phase: Phase) {
        self.phases.insert(id, phase);
    }

    pub fn set_phase_id(&mut self, point: usize, id: i32) {
        self.phase_id[point] = id;
    }

    pub fn is_in_data(&self) -> &[bool] {
        &self.is_in_data
    }

    /// Mark points in or out of data.
    pub fn set_in_data(&mut self, is_in_data: Vec<bool>) -> Result<(), RefineError> {
        if is_in_data.len() != self.nav_size() {
            return Err(RefineError::CrystalMapData {
                what: "in-data flags",
                got: is_in_data.len(),
                expected: self.nav_size(),
            });
        }
        self.is_in_data = is_in_data;
        Ok(())
    }

    /// Sorted, deduplicated phase IDs of points in data.
    pub fn phase_ids_in_data(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self
            .phase_id
            .iter()
            .zip(&self.is_in_data)
            .filter(|(_, &in_data)| in_data)
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    pub fn prop(&self, name: &str) -> Option<&[f64]> {
        self.props.get(name).map(Vec::as_slice)
    }

    /// Store a per-point property; values shorter or longer than the map are
    /// rejected.
    pub fn insert_prop(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<(), RefineError> {
        if values.len() != self.nav_size() {
            return Err(RefineError::CrystalMapData {
                what: "property values",
                got: values.len(),
                expected: self.nav_size(),
            });
        }
        self.props.insert(name.into(), values);
        Ok(())
    }

    /// Copy of the map with new rotations, one per point, and no properties.
    pub(crate) fn with_rotations(&self, rotations: Vec<UnitQuaternion<f64>>) -> Self {
        Self {
            shape: self.shape.clone(),
            rotations,
            rotations_per_point: 1,
            phase_id: self.phase_id.clone(),
            phases: self.phases.clone(),
            is_in_data: self.is_in_data.clone(),
            props: BTreeMap::new(),
        }
    }
}
