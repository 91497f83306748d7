//! Projection of master-pattern intensities onto the detector.

use crate::direction_cosines::DirectionCosines;
use crate::lambert::{lambert_interpolation_parameters, LambertInterpolation};
use crate::master_pattern::{MasterPattern, MasterPatternSlice};
use crate::pattern::{min_max, rescale_into};
use crate::rotation::rotate_vectors;
use crate::{EbsdDetector, GeometryError};
use nalgebra::{UnitQuaternion, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Options for [`MasterPattern::simulate_patterns`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Rescale every pattern to `(out_min, out_max)` from its own range.
    pub rescale: Option<(f64, f64)>,
}

/// `nav_size` simulated patterns of `sig_shape`, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatedPatterns {
    pub nav_size: usize,
    pub sig_shape: (usize, usize),
    pub data: Vec<f32>,
}

impl SimulatedPatterns {
    #[inline]
    pub fn sig_size(&self) -> usize {
        self.sig_shape.0 * self.sig_shape.1
    }

    pub fn pattern(&self, i: usize) -> &[f32] {
        let n = self.sig_size();
        &self.data[i * n..(i + 1) * n]
    }
}

/// Per-thread buffers reused across single-pattern projections.
#[derive(Clone, Debug, Default)]
pub struct ProjectionScratch {
    rotated: Vec<Vector3<f64>>,
    params: Vec<LambertInterpolation>,
    raw: Vec<f32>,
}

impl ProjectionScratch {
    pub fn new(n_pixels: usize) -> Self {
        Self {
            rotated: vec![Vector3::zeros(); n_pixels],
            params: vec![LambertInterpolation::default(); n_pixels],
            raw: vec![0.0; n_pixels],
        }
    }

    fn ensure(&mut self, n_pixels: usize) {
        if self.rotated.len() < n_pixels {
            self.rotated.resize(n_pixels, Vector3::zeros());
            self.params.resize(n_pixels, LambertInterpolation::default());
            self.raw.resize(n_pixels, 0.0);
        }
    }
}

/// Project one pattern into `out`.
///
/// `direction_cosines` and `out` have one entry per (unmasked) pixel. Each
/// rotated vector reads from the upper layer when its `z >= 0`, otherwise
/// from the lower one.
pub fn project_single_pattern(
    rotation: &UnitQuaternion<f64>,
    direction_cosines: &[Vector3<f64>],
    mp: &MasterPatternSlice<'_>,
    rescale: Option<(f64, f64)>,
    scratch: &mut ProjectionScratch,
    out: &mut [f32],
) {
    let n = direction_cosines.len();
    scratch.ensure(n);
    let rotated = &mut scratch.rotated[..n];
    rotate_vectors(rotation, direction_cosines, rotated);
    let params = &mut scratch.params[..n];
    lambert_interpolation_parameters(rotated, mp.npx, mp.npy, mp.scale, params);

    let dst: &mut [f32] = if rescale.is_some() {
        &mut scratch.raw[..n]
    } else {
        &mut out[..n]
    };
    for ((d, v), p) in dst.iter_mut().zip(rotated.iter()).zip(params.iter()) {
        let layer = if v.z >= 0.0 { mp.upper } else { mp.lower };
        *d = p.blend(layer, mp.npx) as f32;
    }

    if let Some((out_min, out_max)) = rescale {
        let raw = &scratch.raw[..n];
        let (lo, hi) = min_max(raw).unwrap_or((0.0, 0.0));
        rescale_into(raw, out, lo as f64, hi as f64, out_min, out_max);
    }
}

/// Project one pattern per rotation sharing a single direction-cosine set.
pub fn project_patterns_fixed_pc(
    rotations: &[UnitQuaternion<f64>],
    direction_cosines: &[Vector3<f64>],
    mp: &MasterPatternSlice<'_>,
    rescale: Option<(f64, f64)>,
) -> Vec<f32> {
    let n = direction_cosines.len();
    let mut data = vec![0.0f32; rotations.len() * n];
    if n == 0 {
        return data;
    }
    data.par_chunks_mut(n).zip(rotations.par_iter()).for_each_init(
        || ProjectionScratch::new(n),
        |scratch, (out, q)| project_single_pattern(q, direction_cosines, mp, rescale, scratch, out),
    );
    data
}

/// Project one pattern per rotation, each with its own direction-cosine set.
pub fn project_patterns_varying_pc(
    rotations: &[UnitQuaternion<f64>],
    direction_cosines: &DirectionCosines,
    mp: &MasterPatternSlice<'_>,
    rescale: Option<(f64, f64)>,
) -> Vec<f32> {
    let n = direction_cosines.n_pixels;
    let mut data = vec![0.0f32; rotations.len() * n];
    if n == 0 {
        return data;
    }
    data.par_chunks_mut(n)
        .zip(rotations.par_iter())
        .enumerate()
        .for_each_init(
            || ProjectionScratch::new(n),
            |scratch, (i, (out, q))| {
                project_single_pattern(q, direction_cosines.for_pc(i), mp, rescale, scratch, out)
            },
        );
    data
}

impl MasterPattern {
    /// Simulate one pattern per rotation on `detector` at `energy` (keV).
    ///
    /// The detector must hold one PC or one PC per rotation.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, rotations, detector, params), fields(n = rotations.len()))
    )]
    pub fn simulate_patterns(
        &self,
        rotations: &[UnitQuaternion<f64>],
        detector: &EbsdDetector,
        energy: f64,
        params: &SimulationParams,
    ) -> Result<SimulatedPatterns, GeometryError> {
        let n_pc = detector.navigation_size();
        if n_pc != 1 && n_pc != rotations.len() {
            return Err(GeometryError::ProjectionCentersPerPattern {
                pcs: n_pc,
                expected: rotations.len(),
            });
        }
        let slice = self.slice_at_energy(energy)?;
        let dc = DirectionCosines::from_detector(detector);
        log::debug!(
            "simulating {} patterns of shape {:?} from {} PC(s)",
            rotations.len(),
            detector.shape(),
            n_pc
        );
        let data = if dc.is_fixed() {
            project_patterns_fixed_pc(rotations, dc.for_pc(0), &slice, params.rescale)
        } else {
            project_patterns_varying_pc(rotations, &dc, &slice, params.rescale)
        };
        Ok(SimulatedPatterns {
            nav_size: rotations.len(),
            sig_shape: detector.shape(),
            data,
        })
    }
}
