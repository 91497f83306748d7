//! Validation, scheduling and result assembly for the three refinements.

use crate::deferred::{DeferredRefinement, RefinementTable};
use crate::method::{build_minimizer, BoundedSettings, Method};
use crate::pattern_stack::{chunk_ranges, ChunkConfig, Mask};
use crate::{CrystalMap, PatternStack, RefineError, RefineTarget, RefinementObjective};
use ebsd_core::{
    euler_from_quaternion, quaternion_from_euler, DirectionCosines, EbsdDetector, MasterPattern,
    MasterPatternSlice, PhaseMismatch,
};
use ebsd_optim::{Bounds, Minimizer};
use nalgebra::UnitQuaternion;
use rayon::prelude::*;
use serde_json::Value;
use std::ops::Range;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Data a refinement reads from.
///
/// Patterns and master pattern are shared through `Arc` so a deferred
/// refinement can outlive the call that scheduled it.
#[derive(Clone, Debug)]
pub struct RefineInputs<'a> {
    pub patterns: Arc<PatternStack>,
    pub xmap: &'a CrystalMap,
    pub detector: &'a EbsdDetector,
    pub master_pattern: Arc<MasterPattern>,
    /// Beam energy in keV, matched to the nearest master-pattern energy.
    pub energy: f64,
}

/// How to refine.
#[derive(Clone, Debug, PartialEq)]
pub struct RefineParams {
    /// One of [`SUPPORTED_METHODS`](crate::SUPPORTED_METHODS), any case.
    pub method: String,
    /// Method options as JSON, e.g. `{"method": "Powell", "options": {"maxfev": 50}}`.
    pub method_kwargs: Value,
    /// Half-widths of the search box around the initial guess: degrees for
    /// Euler angles, PC units for the projection center.
    pub trust_region: Option<Vec<f64>>,
    /// `ln_neldermead` initial simplex step, degrees / PC units.
    pub initial_step: Option<Vec<f64>>,
    /// `ln_neldermead` relative function tolerance.
    pub rtol: f64,
    /// `ln_neldermead` evaluation budget per point; `None` allows 1000 per
    /// free parameter.
    pub maxeval: Option<usize>,
    /// Detector-shaped; `true` pixels are ignored.
    pub signal_mask: Option<Mask>,
    /// Navigation-shaped; `true` points are not refined.
    pub navigation_mask: Option<Mask>,
    /// Run now, or return a [`DeferredRefinement`].
    pub compute: bool,
    /// Rechunk with `chunk` instead of using the pattern stack chunks.
    pub rechunk: bool,
    pub chunk: ChunkConfig,
}

impl Default for RefineParams {
    fn default() -> Self {
        Self {
            method: Method::Minimize.name().to_string(),
            method_kwargs: Value::Null,
            trust_region: None,
            initial_step: None,
            rtol: 1e-4,
            maxeval: None,
            signal_mask: None,
            navigation_mask: None,
            compute: true,
            rechunk: false,
            chunk: ChunkConfig::default(),
        }
    }
}

/// Result of a refinement call.
#[derive(Debug)]
pub enum RefineOutcome<T> {
    Computed(T),
    Deferred(DeferredRefinement<T>),
}

impl<T> RefineOutcome<T> {
    pub fn computed(self) -> Option<T> {
        match self {
            RefineOutcome::Computed(v) => Some(v),
            RefineOutcome::Deferred(_) => None,
        }
    }

    pub fn deferred(self) -> Option<DeferredRefinement<T>> {
        match self {
            RefineOutcome::Computed(_) => None,
            RefineOutcome::Deferred(d) => Some(d),
        }
    }

    /// The result, computing it first if deferred.
    pub fn into_result(self) -> Result<T, RefineError> {
        match self {
            RefineOutcome::Computed(v) => Ok(v),
            RefineOutcome::Deferred(d) => d.finish(),
        }
    }
}

/// Projection-center refinement result.
#[derive(Clone, Debug)]
pub struct PcRefinement {
    /// Navigation-shaped, `NaN` for excluded points.
    pub scores: Vec<f64>,
    /// Detector with one refined PC per navigation point.
    pub detector: EbsdDetector,
    pub num_evals: Vec<usize>,
}

/// Everything a chunk needs, shared read-only between threads.
pub(crate) struct RefineTask {
    target: RefineTarget,
    patterns: Arc<PatternStack>,
    master_pattern: Arc<MasterPattern>,
    energy: f64,
    detector: EbsdDetector,
    signal_mask: Option<Vec<bool>>,
    direction_cosines: Option<DirectionCosines>,
    rotations: Vec<UnitQuaternion<f64>>,
    active: Vec<bool>,
    half_widths: Option<Vec<f64>>,
    minimizer: Arc<dyn Minimizer>,
}

impl RefineTask {
    pub(crate) fn target(&self) -> RefineTarget {
        self.target
    }

    pub(crate) fn n_points(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn master_pattern_slice(&self) -> Result<MasterPatternSlice<'_>, RefineError> {
        Ok(self.master_pattern.slice_at_energy(self.energy)?)
    }

    fn pc(&self, i: usize) -> [f64; 3] {
        let pcs = self.detector.pc();
        if pcs.len() == 1 {
            pcs[0]
        } else {
            pcs[i]
        }
    }

    fn initial_guess(&self, i: usize) -> Vec<f64> {
        let mut x = Vec::with_capacity(self.target.n_params());
        if self.target.refines_orientation() {
            x.extend(euler_from_quaternion(&self.rotations[i]));
        }
        if self.target.refines_pc() {
            x.extend(self.pc(i));
        }
        x
    }

    fn row(&self, score: f64, x: &[f64], n_evals: usize) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.target.n_fields());
        row.push(score);
        row.extend_from_slice(x);
        if self.target != RefineTarget::Orientation {
            row.push(n_evals as f64);
        }
        row
    }

    fn refine_point(&self, slice: &MasterPatternSlice<'_>, i: usize) -> Result<Vec<f64>, RefineError> {
        let x0 = self.initial_guess(i);
        if !self.active[i] {
            return Ok(self.row(f64::NAN, &x0, 0));
        }

        let obj = RefinementObjective::new(
            self.target,
            *slice,
            &self.detector,
            self.signal_mask.as_deref(),
            self.patterns.pattern(i),
            self.patterns.is_integer_source(),
        );
        let mut obj = match self.target {
            RefineTarget::Orientation => match &self.direction_cosines {
                Some(dc) => obj.with_direction_cosines(dc.for_pc(i)),
                None => obj.with_pc(self.pc(i)),
            },
            RefineTarget::ProjectionCenter => obj.with_rotation(self.rotations[i]),
            RefineTarget::OrientationProjectionCenter => obj,
        };
        let bounds = match &self.half_widths {
            Some(hw) => Some(Bounds::around(&x0, hw)?),
            None => None,
        };

        let res = self.minimizer.minimize(&mut |x: &[f64]| obj.value(x), &x0, bounds.as_ref())?;
        let score = if res.fun.is_finite() { 1.0 - res.fun } else { f64::NAN };
        Ok(self.row(score, &res.x, obj.n_evals()))
    }

    /// Rows of the points in `range`, concatenated.
    pub(crate) fn run_chunk(&self, slice: &MasterPatternSlice<'_>, range: Range<usize>) -> Result<Vec<f64>, RefineError> {
        let rows: Vec<Vec<f64>> = range
            .into_par_iter()
            .map(|i| self.refine_point(slice, i))
            .collect::<Result<_, _>>()?;
        Ok(rows.concat())
    }
}

/// Validate inputs and parameters, in a fixed order, and build the task.
fn prepare(
    target: RefineTarget,
    inputs: &RefineInputs<'_>,
    params: &RefineParams,
) -> Result<(Arc<RefineTask>, Vec<Range<usize>>), RefineError> {
    let patterns = &inputs.patterns;
    let detector = inputs.detector;
    let nav_shape = patterns.nav_shape().to_vec();

    if detector.shape() != patterns.sig_shape() {
        return Err(RefineError::DetectorShape {
            detector: detector.shape(),
            signal: patterns.sig_shape(),
        });
    }
    if !(detector.navigation_size() == 1 || detector.navigation_shape() == nav_shape.as_slice()) {
        return Err(RefineError::DetectorNavigationShape {
            detector: detector.navigation_shape().to_vec(),
            navigation: nav_shape,
        });
    }

    let method: Method = params.method.parse()?;
    method.check_available()?;

    let (rows, cols) = detector.shape();
    if let Some(mask) = &params.signal_mask {
        if !mask.fits(&[rows, cols]) {
            return Err(RefineError::SignalMaskShape {
                mask: mask.shape.clone(),
                detector: (rows, cols),
            });
        }
    }
    if let Some(mask) = &params.navigation_mask {
        if !mask.fits(&nav_shape) {
            return Err(RefineError::NavigationMaskShape {
                mask: mask.shape.clone(),
                navigation: nav_shape,
            });
        }
    }

    let xmap = inputs.xmap;
    if xmap.shape() != nav_shape.as_slice() {
        return Err(RefineError::CrystalMapShape {
            xmap: xmap.shape().to_vec(),
            navigation: nav_shape,
        });
    }
    let phase_ids = xmap.phase_ids_in_data();
    if phase_ids.len() > 1 {
        return Err(RefineError::MultiplePhases { phase_ids });
    }
    let mp_phase = inputs.master_pattern.phase();
    if let Some(&id) = phase_ids.first() {
        // an ID without a registered phase has no name to match
        let mismatch = match xmap.phases().get(&id) {
            Some(xmap_phase) => mp_phase
                .equals(xmap_phase)
                .reason
                .map(|reason| (xmap_phase.name.clone(), reason)),
            None => Some((format!("<unregistered phase ID {id}>"), PhaseMismatch::Names)),
        };
        if let Some((xmap_name, reason)) = mismatch {
            return Err(RefineError::PhaseMismatch {
                master_pattern: mp_phase.name.clone(),
                xmap: xmap_name,
                reason,
            });
        }
    }

    let n_params = target.n_params();
    let half_widths = match &params.trust_region {
        Some(tr) if tr.len() != n_params => {
            return Err(RefineError::TrustRegionLength {
                expected: n_params,
                got: tr.len(),
            })
        }
        Some(tr) => Some(to_optimization_units(target, tr)),
        None if method.requires_trust_region() => {
            return Err(RefineError::TrustRegionRequired { method: method.name() })
        }
        None => None,
    };
    let initial_step = initial_step(target, params.initial_step.as_deref().unwrap_or(&[]))?;

    inputs.master_pattern.slice_at_energy(inputs.energy)?;

    let minimizer = build_minimizer(
        method,
        &params.method_kwargs,
        &BoundedSettings {
            initial_step,
            rtol: params.rtol,
            maxeval: params.maxeval,
        },
    )?;

    let nav_size = patterns.nav_size();
    let active: Vec<bool> = (0..nav_size)
        .map(|i| {
            let masked = params.navigation_mask.as_ref().is_some_and(|m| m.data[i]);
            xmap.is_in_data()[i] && !masked
        })
        .collect();
    if !active.iter().any(|&a| a) {
        log::warn!("no navigation points left to refine after masking");
    }

    let signal_mask = params.signal_mask.as_ref().map(|m| m.data.clone());
    let direction_cosines = (target == RefineTarget::Orientation)
        .then(|| DirectionCosines::from_detector_masked(detector, signal_mask.as_deref()));

    let chunks = if params.rechunk {
        chunk_ranges(nav_size, params.chunk.chunk_len(patterns.sig_size()))
    } else {
        patterns.chunks()
    };
    log::info!(
        "refining {target:?} of {} points with {} in {} chunk(s)",
        active.iter().filter(|&&a| a).count(),
        minimizer.name(),
        chunks.len()
    );

    let task = RefineTask {
        target,
        patterns: Arc::clone(patterns),
        master_pattern: Arc::clone(&inputs.master_pattern),
        energy: inputs.energy,
        detector: detector.clone(),
        signal_mask,
        direction_cosines,
        rotations: (0..nav_size).map(|i| *xmap.rotation(i)).collect(),
        active,
        half_widths,
        minimizer,
    };
    Ok((Arc::new(task), chunks))
}

/// Degrees to radians for the Euler-angle entries.
fn to_optimization_units(target: RefineTarget, values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .enumerate()
        .map(|(k, v)| {
            if target.refines_orientation() && k < 3 {
                v.to_radians()
            } else {
                *v
            }
        })
        .collect()
}

/// Per-parameter `ln_neldermead` step from the user value(s).
fn initial_step(target: RefineTarget, step: &[f64]) -> Result<Vec<f64>, RefineError> {
    match target {
        RefineTarget::Orientation | RefineTarget::ProjectionCenter => {
            if step.len() > 1 {
                return Err(RefineError::InitialStepNotScalar { got: step.len() });
            }
            Ok(to_optimization_units(target, step))
        }
        RefineTarget::OrientationProjectionCenter => {
            let (rot, pc) = match step {
                [] => return Ok(Vec::new()),
                [v] => (*v, *v),
                [r, p] => (*r, *p),
                _ => return Err(RefineError::InitialStepLength { got: step.len() }),
            };
            Ok(to_optimization_units(target, &[rot, rot, rot, pc, pc, pc]))
        }
    }
}

fn run<T>(
    target: RefineTarget,
    inputs: &RefineInputs<'_>,
    params: &RefineParams,
    assemble: Box<dyn FnOnce(RefinementTable) -> Result<T, RefineError> + Send>,
) -> Result<RefineOutcome<T>, RefineError> {
    let (task, chunks) = prepare(target, inputs, params)?;
    let deferred = DeferredRefinement::new(task, chunks, assemble);
    if params.compute {
        Ok(RefineOutcome::Computed(deferred.finish()?))
    } else {
        Ok(RefineOutcome::Deferred(deferred))
    }
}

fn refined_rotations(table: &RefinementTable, xmap: &CrystalMap) -> Vec<UnitQuaternion<f64>> {
    (0..table.n_points)
        .map(|i| {
            let row = table.row(i);
            if row[0].is_nan() {
                *xmap.rotation(i)
            } else {
                quaternion_from_euler(row[1], row[2], row[3])
            }
        })
        .collect()
}

fn in_data(table: &RefinementTable) -> Vec<bool> {
    table.scores().iter().map(|s| !s.is_nan()).collect()
}

fn refined_pcs(table: &RefinementTable, offset: usize) -> Vec<[f64; 3]> {
    (0..table.n_points)
        .map(|i| {
            let r = table.row(i);
            [r[offset], r[offset + 1], r[offset + 2]]
        })
        .collect()
}

/// Refine the orientation of every point against simulated patterns.
///
/// Returns a new crystal map with one refined rotation per point and a
/// `"scores"` property. Excluded points keep their input rotation, get a
/// `NaN` score and are not in data.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(method = %params.method, n = inputs.patterns.nav_size()))
)]
pub fn refine_orientation(
    inputs: &RefineInputs<'_>,
    params: &RefineParams,
) -> Result<RefineOutcome<CrystalMap>, RefineError> {
    let xmap = inputs.xmap.clone();
    run(
        RefineTarget::Orientation,
        inputs,
        params,
        Box::new(move |table: RefinementTable| -> Result<CrystalMap, RefineError> {
            let mut out = xmap.with_rotations(refined_rotations(&table, &xmap));
            out.set_in_data(in_data(&table))?;
            out.insert_prop("scores", table.scores())?;
            Ok(out)
        }),
    )
}

/// Refine the projection center of every point with the orientation fixed.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(method = %params.method, n = inputs.patterns.nav_size()))
)]
pub fn refine_projection_center(
    inputs: &RefineInputs<'_>,
    params: &RefineParams,
) -> Result<RefineOutcome<PcRefinement>, RefineError> {
    let detector = inputs.detector.clone();
    let nav_shape = inputs.patterns.nav_shape().to_vec();
    run(
        RefineTarget::ProjectionCenter,
        inputs,
        params,
        Box::new(move |table: RefinementTable| -> Result<PcRefinement, RefineError> {
            Ok(PcRefinement {
                scores: table.scores(),
                detector: detector.with_pc(refined_pcs(&table, 1), &nav_shape)?,
                num_evals: table.num_evals(),
            })
        }),
    )
}

/// Refine orientation and projection center together.
///
/// The crystal map carries `"scores"` and `"num_evals"` properties; the
/// detector holds one PC per navigation point.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(method = %params.method, n = inputs.patterns.nav_size()))
)]
pub fn refine_orientation_projection_center(
    inputs: &RefineInputs<'_>,
    params: &RefineParams,
) -> Result<RefineOutcome<(CrystalMap, EbsdDetector)>, RefineError> {
    let xmap = inputs.xmap.clone();
    let detector = inputs.detector.clone();
    let nav_shape = inputs.patterns.nav_shape().to_vec();
    run(
        RefineTarget::OrientationProjectionCenter,
        inputs,
        params,
        Box::new(move |table: RefinementTable| -> Result<(CrystalMap, EbsdDetector), RefineError> {
            let mut out = xmap.with_rotations(refined_rotations(&table, &xmap));
            out.set_in_data(in_data(&table))?;
            out.insert_prop("scores", table.scores())?;
            out.insert_prop("num_evals", table.num_evals().into_iter().map(|n| n as f64).collect())?;
            let detector = detector.with_pc(refined_pcs(&table, 4), &nav_shape)?;
            Ok((out, detector))
        }),
    )
}
