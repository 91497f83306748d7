//! Per-point refinement objective: `1 - NCC(simulated, observed)`.

use ebsd_core::{
    direction_cosines_into, ncc_with_prepared, prepare_pattern, project_single_pattern,
    quaternion_from_euler, unmasked_count, EbsdDetector, MasterPatternSlice, ProjectionScratch,
};
use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Which parameters are free during refinement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineTarget {
    /// `x = (phi1, Phi, phi2)` in radians.
    Orientation,
    /// `x = (pcx, pcy, pcz)`, Bruker convention.
    ProjectionCenter,
    /// `x = (phi1, Phi, phi2, pcx, pcy, pcz)`.
    OrientationProjectionCenter,
}

impl RefineTarget {
    /// Number of free parameters.
    pub fn n_params(self) -> usize {
        match self {
            RefineTarget::OrientationProjectionCenter => 6,
            _ => 3,
        }
    }

    /// Result fields per navigation point.
    ///
    /// Orientation: score and three Euler angles. Projection center: score,
    /// three PC values and the evaluation count. Both: score, three angles,
    /// three PC values and the evaluation count.
    pub fn n_fields(self) -> usize {
        match self {
            RefineTarget::Orientation => 4,
            RefineTarget::ProjectionCenter => 5,
            RefineTarget::OrientationProjectionCenter => 8,
        }
    }

    pub fn refines_orientation(self) -> bool {
        self != RefineTarget::ProjectionCenter
    }

    pub fn refines_pc(self) -> bool {
        self != RefineTarget::Orientation
    }

    /// Offset of the PC values in `x`.
    fn pc_offset(self) -> usize {
        if self.refines_orientation() {
            3
        } else {
            0
        }
    }
}

/// Objective for one navigation point.
///
/// The observed pattern is masked and prepared once at construction; every
/// evaluation projects one simulated pattern over the unmasked pixels and
/// correlates it with the prepared pattern. When the PC is free the
/// direction cosines are rebuilt in place on every call.
pub struct RefinementObjective<'a> {
    target: RefineTarget,
    mp: MasterPatternSlice<'a>,
    detector: &'a EbsdDetector,
    signal_mask: Option<&'a [bool]>,
    prepared: Vec<f32>,
    squared_norm: f64,
    rotation: UnitQuaternion<f64>,
    direction_cosines: Cow<'a, [Vector3<f64>]>,
    scratch: ProjectionScratch,
    simulated: Vec<f32>,
    n_evals: usize,
}

impl<'a> RefinementObjective<'a> {
    /// `pattern` covers the full detector; pixels with `signal_mask == true`
    /// are dropped. `rescale` maps the pattern onto `[-1, 1]` before
    /// centering.
    pub fn new(
        target: RefineTarget,
        mp: MasterPatternSlice<'a>,
        detector: &'a EbsdDetector,
        signal_mask: Option<&'a [bool]>,
        pattern: &[f32],
        rescale: bool,
    ) -> Self {
        let n = unmasked_count(detector.size(), signal_mask);
        let kept: Vec<f32> = match signal_mask {
            Some(mask) => pattern
                .iter()
                .zip(mask)
                .filter(|(_, &excluded)| !excluded)
                .map(|(&v, _)| v)
                .collect(),
            None => pattern.to_vec(),
        };
        let (prepared, squared_norm) = prepare_pattern(&kept, rescale);
        Self {
            target,
            mp,
            detector,
            signal_mask,
            prepared,
            squared_norm,
            rotation: UnitQuaternion::identity(),
            direction_cosines: Cow::Owned(vec![Vector3::zeros(); n]),
            scratch: ProjectionScratch::new(n),
            simulated: vec![0.0; n],
            n_evals: 0,
        }
    }

    /// Fixed direction cosines (unmasked pixels only) for orientation-only
    /// refinement.
    pub fn with_direction_cosines(mut self, direction_cosines: &'a [Vector3<f64>]) -> Self {
        self.direction_cosines = Cow::Borrowed(direction_cosines);
        self
    }

    /// Direction cosines computed from a fixed PC.
    pub fn with_pc(mut self, pc: [f64; 3]) -> Self {
        let dc = self.direction_cosines.to_mut();
        direction_cosines_into(self.detector, pc, self.signal_mask, dc);
        self
    }

    /// Fixed orientation for PC-only refinement.
    pub fn with_rotation(mut self, rotation: UnitQuaternion<f64>) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn target(&self) -> RefineTarget {
        self.target
    }

    pub fn n_evals(&self) -> usize {
        self.n_evals
    }

    /// `1 - NCC` at `x`. A constant simulated pattern yields `NaN`.
    pub fn value(&mut self, x: &[f64]) -> f64 {
        self.n_evals += 1;
        let rotation = if self.target.refines_orientation() {
            quaternion_from_euler(x[0], x[1], x[2])
        } else {
            self.rotation
        };
        if self.target.refines_pc() {
            let k = self.target.pc_offset();
            let pc = [x[k], x[k + 1], x[k + 2]];
            direction_cosines_into(self.detector, pc, self.signal_mask, self.direction_cosines.to_mut());
        }
        project_single_pattern(
            &rotation,
            &self.direction_cosines,
            &self.mp,
            None,
            &mut self.scratch,
            &mut self.simulated,
        );
        1.0 - ncc_with_prepared(&self.prepared, self.squared_norm, &self.simulated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{random_master_pattern, rotation};
    use approx::assert_relative_eq;
    use ebsd_core::{euler_from_quaternion, SimulationParams};

    #[test]
    fn own_simulation_scores_perfectly() {
        let mp = random_master_pattern(7, 11);
        let det = EbsdDetector::new(6, 5).unwrap().with_single_pc([0.45, 0.55, 0.6]);
        let q = rotation(0.4, 0.9, 1.7);
        let sim = mp
            .simulate_patterns(&[q], &det, 20.0, &SimulationParams::default())
            .unwrap();
        let slice = mp.slice_at_energy(20.0).unwrap();
        let euler = euler_from_quaternion(&q);

        let mut obj = RefinementObjective::new(RefineTarget::Orientation, slice, &det, None, sim.pattern(0), false)
            .with_pc(det.pc()[0]);
        assert_relative_eq!(obj.value(&euler), 0.0, epsilon = 1e-5);

        let mut both = RefinementObjective::new(
            RefineTarget::OrientationProjectionCenter,
            slice,
            &det,
            None,
            sim.pattern(0),
            false,
        );
        let x = [euler[0], euler[1], euler[2], 0.45, 0.55, 0.6];
        assert_relative_eq!(both.value(&x), 0.0, epsilon = 1e-5);

        let mut pc = RefinementObjective::new(RefineTarget::ProjectionCenter, slice, &det, None, sim.pattern(0), false)
            .with_rotation(q);
        assert_relative_eq!(pc.value(&[0.45, 0.55, 0.6]), 0.0, epsilon = 1e-5);
        assert!(pc.value(&[0.3, 0.4, 0.7]) > 1e-4);
        assert_eq!(pc.n_evals(), 2);
    }

    #[test]
    fn signal_mask_changes_the_objective() {
        let mp = random_master_pattern(9, 3);
        let det = EbsdDetector::new(4, 4).unwrap();
        let slice = mp.slice_at_energy(20.0).unwrap();
        let pattern: Vec<f32> = (0..16).map(|i| ((i * 7) % 5) as f32).collect();
        let mut mask = vec![false; 16];
        mask[0] = true;
        mask[5] = true;
        mask[10] = true;
        let x = [0.3, 0.6, 0.9];

        let mut full = RefinementObjective::new(RefineTarget::Orientation, slice, &det, None, &pattern, false)
            .with_pc(det.pc()[0]);
        let mut masked = RefinementObjective::new(RefineTarget::Orientation, slice, &det, Some(&mask), &pattern, false)
            .with_pc(det.pc()[0]);
        assert_ne!(full.value(&x), masked.value(&x));
    }

    #[test]
    fn field_counts() {
        assert_eq!(RefineTarget::Orientation.n_fields(), 4);
        assert_eq!(RefineTarget::ProjectionCenter.n_fields(), 5);
        assert_eq!(RefineTarget::OrientationProjectionCenter.n_fields(), 8);
        assert_eq!(RefineTarget::OrientationProjectionCenter.n_params(), 6);
    }
}
