mod common;

use common::{master_pattern, random_patterns, random_xmap, Fixture};
use ebsd_core::{EbsdDetector, Phase, PhaseMismatch};
use ebsd_refinement::{
    refine_orientation, refine_orientation_projection_center, refine_projection_center, CrystalMap,
    Mask, RefineError, RefineParams,
};
use serde_json::json;
use std::sync::Arc;

fn nelder_mead(maxfev: usize) -> RefineParams {
    RefineParams {
        method_kwargs: json!({"method": "Nelder-Mead", "options": {"maxfev": maxfev}}),
        ..RefineParams::default()
    }
}

#[test]
fn detector_and_signal_shapes_must_match() {
    let mut fx = Fixture::new(&[2], (2, 3), &[1]);
    fx.detector = EbsdDetector::new(2, 3).unwrap();
    fx.patterns = Arc::new(random_patterns(1, &[2], (3, 4)));
    let err = refine_orientation(&fx.inputs(), &nelder_mead(5)).unwrap_err();
    assert!(matches!(err, RefineError::DetectorShape { .. }));
    assert!(err.to_string().starts_with("Detector shape (2, 3) and signal shape (3, 4)"));
}

#[test]
fn detector_needs_one_pc_or_one_per_pattern() {
    let fx = Fixture::new(&[3], (2, 3), &[2]);
    let err = refine_orientation(&fx.inputs(), &nelder_mead(5)).unwrap_err();
    assert!(matches!(err, RefineError::DetectorNavigationShape { .. }));
    assert!(err
        .to_string()
        .starts_with("Detector must have exactly one projection center or one per pattern"));
}

#[test]
fn unknown_method_is_rejected() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let params = RefineParams {
        method: "a".to_string(),
        ..RefineParams::default()
    };
    for err in [
        refine_orientation(&fx.inputs(), &params).unwrap_err(),
        refine_projection_center(&fx.inputs(), &params).unwrap_err(),
        refine_orientation_projection_center(&fx.inputs(), &params).unwrap_err(),
    ] {
        assert!(err
            .to_string()
            .starts_with("Method 'a' not in the list of supported methods"));
    }
}

#[test]
fn signal_mask_must_match_detector() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let params = RefineParams {
        signal_mask: Some(Mask::none(vec![10, 20])),
        ..nelder_mead(5)
    };
    let err = refine_orientation(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::SignalMaskShape { .. }));
    assert!(err
        .to_string()
        .starts_with("Signal mask shape [10, 20] and detector shape (2, 3)"));
}

#[test]
fn navigation_mask_must_match_navigation() {
    let fx = Fixture::new(&[3, 3], (2, 3), &[1]);
    let params = RefineParams {
        navigation_mask: Some(Mask::none(vec![2, 2])),
        ..nelder_mead(5)
    };
    let err = refine_projection_center(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::NavigationMaskShape { .. }));
    assert!(err
        .to_string()
        .starts_with("Navigation mask shape [2, 2] and navigation shape [3, 3]"));
}

#[test]
fn crystal_map_must_match_navigation() {
    let mut fx = Fixture::new(&[4], (2, 3), &[1]);
    fx.xmap = random_xmap(2, &[2, 2]);
    let err = refine_orientation(&fx.inputs(), &nelder_mead(5)).unwrap_err();
    assert!(matches!(err, RefineError::CrystalMapShape { .. }));
}

#[test]
fn crystal_map_with_several_phases_in_data() {
    let mut fx = Fixture::new(&[3], (2, 3), &[1]);
    fx.xmap.add_phase(1, Phase::new("b"));
    fx.xmap.set_phase_id(2, 1);
    let err = refine_orientation(&fx.inputs(), &nelder_mead(5)).unwrap_err();
    assert!(matches!(err, RefineError::MultiplePhases { ref phase_ids } if phase_ids == &[0, 1]));
    assert!(err
        .to_string()
        .starts_with("Points in data in crystal map must have only one phase"));

    // points outside the data do not count
    fx.xmap.set_in_data(vec![true, true, false]).unwrap();
    assert!(refine_orientation(&fx.inputs(), &nelder_mead(2)).is_ok());
}

#[test]
fn master_pattern_phase_must_match_crystal_map() {
    let mut fx = Fixture::new(&[2], (2, 3), &[1]);
    let rotations = fx.xmap.rotations().to_vec();
    fx.xmap = CrystalMap::single_phase(vec![2], rotations, Phase::new("b").with_space_group(225)).unwrap();
    let err = refine_orientation(&fx.inputs(), &nelder_mead(5)).unwrap_err();
    assert!(matches!(err, RefineError::PhaseMismatch { .. }));
    let msg = err.to_string();
    assert!(msg.starts_with("Master pattern phase 'a' and phase of points in crystal map 'b'"));
    assert!(msg.ends_with("names"));
}

#[test]
fn unregistered_phase_id_is_a_phase_mismatch() {
    let mut fx = Fixture::new(&[2], (2, 3), &[1]);
    fx.xmap.set_phase_id(0, 7);
    fx.xmap.set_phase_id(1, 7);
    let err = refine_orientation(&fx.inputs(), &nelder_mead(5)).unwrap_err();
    assert!(matches!(
        err,
        RefineError::PhaseMismatch { reason: PhaseMismatch::Names, ref xmap, .. } if xmap.contains('7')
    ));
    assert!(err.to_string().starts_with("Master pattern phase 'a'"));
}

#[test]
fn energy_outside_master_pattern_range() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let mut inputs = fx.inputs();
    inputs.energy = 30.0;
    let err = refine_orientation(&inputs, &nelder_mead(5)).unwrap_err();
    assert!(matches!(err, RefineError::Geometry(_)));

    // nearest energy within half a step is accepted
    inputs.energy = 20.4;
    assert!(refine_orientation(&inputs, &nelder_mead(2)).is_ok());
}

#[test]
fn trust_region_length_follows_the_target() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let params = RefineParams {
        trust_region: Some(vec![1.0, 1.0, 1.0]),
        ..nelder_mead(5)
    };
    let err = refine_orientation_projection_center(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::TrustRegionLength { expected: 6, got: 3 }));
}

#[cfg(feature = "global")]
#[test]
fn global_methods_need_a_trust_region() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    for method in ["differential_evolution", "dual_annealing", "shgo"] {
        let params = RefineParams {
            method: method.to_string(),
            ..RefineParams::default()
        };
        let err = refine_orientation(&fx.inputs(), &params).unwrap_err();
        assert!(matches!(err, RefineError::TrustRegionRequired { .. }), "{method}: {err}");
    }
}

#[cfg(not(feature = "global"))]
#[test]
fn global_methods_need_the_global_feature() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let params = RefineParams {
        method: "basinhopping".to_string(),
        ..RefineParams::default()
    };
    let err = refine_orientation(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::BackendUnavailable { feature: "global", .. }));
}

#[test]
fn initial_step_shape_is_checked() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let params = RefineParams {
        initial_step: Some(vec![1.0, 1.0]),
        ..RefineParams::default()
    };
    let err = refine_orientation(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::InitialStepNotScalar { got: 2 }));

    let params = RefineParams {
        initial_step: Some(vec![1.0, 1.0, 1.0]),
        ..params
    };
    let err = refine_orientation_projection_center(&fx.inputs(), &params).unwrap_err();
    assert!(err.to_string().starts_with("The initial step must be a single number"));
}

#[test]
fn method_is_checked_before_masks() {
    let fx = Fixture::new(&[2], (2, 3), &[1]);
    let params = RefineParams {
        method: "a".to_string(),
        signal_mask: Some(Mask::none(vec![10, 20])),
        navigation_mask: Some(Mask::none(vec![7])),
        ..RefineParams::default()
    };
    let err = refine_orientation(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::UnsupportedMethod { .. }));

    let params = RefineParams {
        method: "minimize".to_string(),
        ..params
    };
    let err = refine_orientation(&fx.inputs(), &params).unwrap_err();
    assert!(matches!(err, RefineError::SignalMaskShape { .. }));
}

#[test]
fn master_pattern_shape_does_not_depend_on_detector() {
    let mut fx = Fixture::new(&[2], (4, 3), &[1]);
    fx.master_pattern = Arc::new(master_pattern(11, 7));
    assert!(refine_orientation(&fx.inputs(), &nelder_mead(3)).is_ok());
}
