#![allow(dead_code)]

use ebsd_core::{quaternion_from_euler, EbsdDetector, EnergyAxis, Hemisphere, MasterPattern, Phase};
use ebsd_refinement::{CrystalMap, PatternStack, RefineInputs};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::f64::consts::{PI, TAU};
use std::sync::Arc;

pub const ENERGY: f64 = 20.0;

pub fn phase() -> Phase {
    Phase::new("a").with_space_group(225)
}

/// Random `(2, 5, npx, npx)` master pattern, energies 16..=20 keV.
pub fn master_pattern(seed: u64, npx: usize) -> MasterPattern {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let data = (0..2 * 5 * npx * npx).map(|_| rng.gen::<f32>()).collect();
    MasterPattern::new(
        data,
        [2, 5, npx, npx],
        Hemisphere::Both,
        EnergyAxis::new(16.0, 1.0),
        phase(),
    )
    .unwrap()
}

pub fn random_patterns(seed: u64, nav_shape: &[usize], sig_shape: (usize, usize)) -> PatternStack {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = nav_shape.iter().product::<usize>() * sig_shape.0 * sig_shape.1;
    PatternStack::new(nav_shape.to_vec(), sig_shape, (0..n).map(|_| rng.gen::<f32>()).collect()).unwrap()
}

pub fn random_u8_patterns(seed: u64, nav_shape: &[usize], sig_shape: (usize, usize)) -> PatternStack {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n = nav_shape.iter().product::<usize>() * sig_shape.0 * sig_shape.1;
    let data: Vec<u8> = (0..n).map(|_| rng.gen()).collect();
    PatternStack::from_u8(nav_shape.to_vec(), sig_shape, &data).unwrap()
}

pub fn random_xmap(seed: u64, nav_shape: &[usize]) -> CrystalMap {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let n: usize = nav_shape.iter().product();
    let rotations = (0..n)
        .map(|_| {
            quaternion_from_euler(
                rng.gen_range(0.0..TAU),
                rng.gen_range(0.1..PI - 0.1),
                rng.gen_range(0.0..TAU),
            )
        })
        .collect();
    CrystalMap::single_phase(nav_shape.to_vec(), rotations, phase()).unwrap()
}

/// Detector of `sig_shape` with one PC, or one per point of `pc_nav_shape`.
pub fn detector(sig_shape: (usize, usize), pc_nav_shape: &[usize]) -> EbsdDetector {
    let det = EbsdDetector::new(sig_shape.0, sig_shape.1).unwrap();
    let n: usize = pc_nav_shape.iter().product();
    if n == 1 {
        det.with_single_pc([0.5, 0.5, 0.5])
    } else {
        let pcs = (0..n).map(|i| [0.5 + 0.001 * i as f64, 0.5, 0.5]).collect();
        det.with_pc(pcs, pc_nav_shape).unwrap()
    }
}

pub struct Fixture {
    pub patterns: Arc<PatternStack>,
    pub xmap: CrystalMap,
    pub detector: EbsdDetector,
    pub master_pattern: Arc<MasterPattern>,
}

impl Fixture {
    pub fn new(nav_shape: &[usize], sig_shape: (usize, usize), pc_nav_shape: &[usize]) -> Self {
        Self {
            patterns: Arc::new(random_patterns(1, nav_shape, sig_shape)),
            xmap: random_xmap(2, nav_shape),
            detector: detector(sig_shape, pc_nav_shape),
            master_pattern: Arc::new(master_pattern(3, 5)),
        }
    }

    pub fn inputs(&self) -> RefineInputs<'_> {
        RefineInputs {
            patterns: Arc::clone(&self.patterns),
            xmap: &self.xmap,
            detector: &self.detector,
            master_pattern: Arc::clone(&self.master_pattern),
            energy: ENERGY,
        }
    }
}

/// Whether any rotation moved by more than `1e-8` in any component.
pub fn rotations_differ(a: &CrystalMap, b: &CrystalMap) -> bool {
    (0..a.nav_size()).any(|i| {
        let (qa, qb) = (a.rotation(i), b.rotation(i));
        (qa.coords - qb.coords).abs().max() > 1e-8 && (qa.coords + qb.coords).abs().max() > 1e-8
    })
}
