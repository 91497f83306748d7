mod common;

use approx::assert_relative_eq;
use common::{master_pattern, random_u8_patterns, rotations_differ, Fixture, ENERGY};
use ebsd_core::SimulationParams;
use ebsd_refinement::{
    refine_orientation, refine_orientation_projection_center, refine_projection_center, CrystalMap,
    Mask, PatternStack, RefineParams,
};
use serde_json::json;
use std::sync::Arc;

fn nelder_mead(maxfev: usize) -> RefineParams {
    RefineParams {
        method_kwargs: json!({"method": "Nelder-Mead", "options": {"maxfev": maxfev}}),
        ..RefineParams::default()
    }
}

/// Patterns simulated from the fixture's own rotations and detector.
fn self_simulated(fx: &mut Fixture) {
    let sim = fx
        .master_pattern
        .simulate_patterns(fx.xmap.rotations(), &fx.detector, ENERGY, &SimulationParams::default())
        .expect("simulate");
    let stack = PatternStack::new(fx.patterns.nav_shape().to_vec(), sim.sig_shape, sim.data).expect("stack");
    fx.patterns = Arc::new(stack);
}

#[test]
fn orientation_refinement_updates_every_point() {
    let fx = Fixture::new(&[2], (2, 3), &[2]);
    let xmap = refine_orientation(&fx.inputs(), &nelder_mead(10))
        .expect("refine")
        .computed()
        .expect("computed");

    assert_eq!(xmap.shape(), fx.xmap.shape());
    assert_eq!(xmap.rotations_per_point(), 1);
    assert!(rotations_differ(&xmap, &fx.xmap));
    let scores = xmap.prop("scores").expect("scores");
    assert_eq!(scores.len(), 2);
    assert!(scores.iter().all(|s| s.is_finite() && *s <= 1.0 + 1e-6));
}

#[test]
fn powell_within_trust_region_on_integer_patterns() {
    let mut fx = Fixture::new(&[3, 2], (2, 3), &[1]);
    fx.patterns = Arc::new(random_u8_patterns(5, &[3, 2], (2, 3)));
    let params = RefineParams {
        method_kwargs: json!({"method": "Powell", "options": {"maxfev": 30}}),
        trust_region: Some(vec![1.0, 1.0, 1.0]),
        ..RefineParams::default()
    };
    let xmap = refine_orientation(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");
    assert_eq!(xmap.shape(), &[3, 2]);

    // one degree in each angle bounds how far a rotation can move
    for i in 0..xmap.nav_size() {
        let angle = xmap.rotation(i).angle_to(fx.xmap.rotation(i));
        assert!(angle <= 3f64.to_radians() + 1e-9, "point {i} moved {angle}");
    }
}

#[test]
fn simulated_patterns_keep_a_perfect_score() {
    let mut fx = Fixture::new(&[3], (6, 5), &[1]);
    fx.master_pattern = Arc::new(master_pattern(3, 11));
    self_simulated(&mut fx);

    let xmap = refine_orientation(&fx.inputs(), &nelder_mead(20))
        .expect("refine")
        .computed()
        .expect("computed");
    for &s in xmap.prop("scores").expect("scores") {
        assert_relative_eq!(s, 1.0, epsilon = 1e-4);
    }
}

#[test]
fn navigation_mask_skips_points() {
    let fx = Fixture::new(&[2, 2], (2, 3), &[1]);
    let params = RefineParams {
        navigation_mask: Some(Mask::excluding(vec![2, 2], &[1])),
        ..nelder_mead(10)
    };
    let xmap = refine_orientation(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");

    let scores = xmap.prop("scores").expect("scores");
    assert!(scores[1].is_nan());
    assert!(scores.iter().enumerate().all(|(i, s)| i == 1 || s.is_finite()));
    assert_eq!(xmap.rotation(1), fx.xmap.rotation(1));
    assert_eq!(xmap.is_in_data(), &[true, false, true, true]);
    assert_eq!(xmap.size(), 3);
}

#[test]
fn signal_mask_changes_the_result() {
    let fx = Fixture::new(&[2], (4, 4), &[1]);
    let unmasked = refine_orientation(&fx.inputs(), &nelder_mead(10))
        .expect("refine")
        .computed()
        .expect("computed");
    let params = RefineParams {
        signal_mask: Some(Mask::excluding(vec![4, 4], &[0, 5, 10, 15])),
        ..nelder_mead(10)
    };
    let masked = refine_orientation(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");
    assert_ne!(unmasked.prop("scores"), masked.prop("scores"));
    assert!(rotations_differ(&unmasked, &masked));
}

#[test]
fn projection_center_refinement() {
    let fx = Fixture::new(&[2, 2], (3, 4), &[1]);
    let pc = refine_projection_center(&fx.inputs(), &nelder_mead(10))
        .expect("refine")
        .computed()
        .expect("computed");

    assert_eq!(pc.scores.len(), 4);
    assert_eq!(pc.detector.navigation_shape(), &[2, 2]);
    assert_eq!(pc.detector.pc().len(), 4);
    assert_eq!(pc.detector.shape(), fx.detector.shape());
    assert!(pc.detector.pc().iter().any(|p| *p != [0.5, 0.5, 0.5]));
    // a simplex iteration may overshoot maxfev by n + 1
    assert!(pc.num_evals.iter().all(|&n| n > 0 && n <= 10 + 4));
}

/// Replace pattern `i` with a flat one, which has no defined correlation.
fn flatten_pattern(fx: &mut Fixture, i: usize) {
    let stack = &fx.patterns;
    let data: Vec<f32> = (0..stack.nav_size())
        .flat_map(|k| {
            let p = stack.pattern(k);
            if k == i {
                vec![0.5; p.len()]
            } else {
                p.to_vec()
            }
        })
        .collect();
    let flat = PatternStack::new(stack.nav_shape().to_vec(), stack.sig_shape(), data).expect("stack");
    fx.patterns = Arc::new(flat);
}

fn assert_flat_point_untouched(xmap: &CrystalMap, fx: &Fixture, method: &str) {
    let scores = xmap.prop("scores").expect("scores");
    assert!(scores[1].is_nan(), "{method}: score {}", scores[1]);
    assert!(scores[0].is_finite() && scores[2].is_finite(), "{method}: {scores:?}");
    assert_eq!(xmap.rotation(1), fx.xmap.rotation(1), "{method}");
    assert_eq!(xmap.is_in_data(), &[true, false, true], "{method}");
}

#[test]
fn flat_pattern_gets_nan_score_and_keeps_its_rotation() {
    let mut fx = Fixture::new(&[3], (3, 4), &[1]);
    flatten_pattern(&mut fx, 1);

    let powell = RefineParams {
        method_kwargs: json!({"method": "Powell", "options": {"maxfev": 30}}),
        ..RefineParams::default()
    };
    for (name, params) in [("Nelder-Mead", nelder_mead(10)), ("Powell", powell)] {
        let xmap = refine_orientation(&fx.inputs(), &params)
            .expect("refine")
            .computed()
            .expect("computed");
        assert_flat_point_untouched(&xmap, &fx, name);
    }
}

#[cfg(feature = "bounded")]
#[test]
fn flat_pattern_stops_ln_neldermead_without_a_budget() {
    let mut fx = Fixture::new(&[3], (3, 4), &[1]);
    flatten_pattern(&mut fx, 1);
    let params = RefineParams {
        method: "ln_neldermead".to_string(),
        maxeval: None,
        ..RefineParams::default()
    };

    let xmap = refine_orientation(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");
    assert_flat_point_untouched(&xmap, &fx, "ln_neldermead");

    // only the initial simplex is evaluated
    let pc = refine_projection_center(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");
    assert!(pc.scores[1].is_nan());
    assert_eq!(pc.num_evals[1], 4);
}

#[cfg(feature = "bounded")]
#[test]
fn ln_neldermead_spends_its_whole_budget() {
    let fx = Fixture::new(&[3], (3, 4), &[1]);
    let params = RefineParams {
        method: "LN_NELDERMEAD".to_string(),
        maxeval: Some(10),
        rtol: 0.0,
        ..RefineParams::default()
    };
    let pc = refine_projection_center(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");
    assert_eq!(pc.num_evals, vec![10; 3]);
}

#[test]
fn orientation_and_projection_center_together() {
    let fx = Fixture::new(&[3], (3, 4), &[3]);
    let params = RefineParams {
        trust_region: Some(vec![2.0, 2.0, 2.0, 0.05, 0.05, 0.05]),
        ..nelder_mead(15)
    };
    let (xmap, detector) = refine_orientation_projection_center(&fx.inputs(), &params)
        .expect("refine")
        .computed()
        .expect("computed");

    assert!(rotations_differ(&xmap, &fx.xmap));
    let num_evals = xmap.prop("num_evals").expect("num_evals");
    assert!(num_evals.iter().all(|&n| n > 0.0 && n <= 15.0 + 7.0));
    assert_eq!(detector.navigation_shape(), &[3]);
    for (new, old) in detector.pc().iter().zip(fx.detector.pc()) {
        for k in 0..3 {
            assert!((new[k] - old[k]).abs() <= 0.05 + 1e-12);
        }
    }
}

#[cfg(feature = "global")]
#[test]
fn global_methods_move_rotations() {
    let fx = Fixture::new(&[2], (3, 3), &[1]);
    let cases = [
        ("basinhopping", json!({"niter": 1, "minimizer_kwargs": {"method": "Nelder-Mead", "options": {"maxfev": 10}}})),
        ("differential_evolution", json!({"maxiter": 1, "popsize": 3, "polish": false})),
        ("dual_annealing", json!({"maxiter": 5, "no_local_search": true})),
        ("shgo", json!({"n": 16, "options": {"maxfev": 60}})),
    ];
    for (method, kwargs) in cases {
        let params = RefineParams {
            method: method.to_string(),
            method_kwargs: kwargs,
            trust_region: Some(vec![0.5, 0.5, 0.5]),
            ..RefineParams::default()
        };
        let xmap = refine_orientation(&fx.inputs(), &params)
            .unwrap_or_else(|e| panic!("{method}: {e}"))
            .computed()
            .expect("computed");
        assert!(rotations_differ(&xmap, &fx.xmap), "{method} kept the input rotations");
    }
}
