use approx::assert_relative_eq;
use nalgebra::Vector3;

use magswim::constants::LIGHTVEL;
use magswim::{
    Frame, StateVector, SwimError, SwimOutcome, SwimParams, Swimmer, UniformField, ZeroField,
};

mod common;
use common::assert_state_close;

#[test]
fn test_neutral_particle_is_exactly_straight() {
    // Charge 0 swum to z = 100 through any field: expected (0, 0, 100, 0, 0).
    let probe = UniformField(Vector3::new(3.0, -12.0, 7.0));
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 0.0, Frame::Tilted);

    let out = swimmer.swim_to_z(&start, 100.0).unwrap();
    assert_eq!(out.outcome, SwimOutcome::ReachedTarget);
    assert!(out.trajectory.is_complete());

    let end = out.trajectory.last().unwrap();
    assert_eq!(end.x, 0.0);
    assert_eq!(end.y, 0.0);
    assert_eq!(end.z, 100.0);
    assert_eq!(end.tx, 0.0);
    assert_eq!(end.ty, 0.0);
    // No integration happened.
    assert_eq!(out.stats.rhs_evals, 0);
}

#[test]
fn test_zero_field_straight_line_with_slopes() {
    let probe = ZeroField;
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(1.0, -2.0, 10.0, 0.2, -0.1, 0.8, Frame::Sector);

    let out = swimmer.swim_to_z(&start, 60.0).unwrap();
    let end = out.trajectory.last().unwrap();

    // x(z) = x0 + tx (z - z0), idem y.
    assert_relative_eq!(end.x, 1.0 + 0.2 * 50.0, epsilon = 1e-12);
    assert_relative_eq!(end.y, -2.0 - 0.1 * 50.0, epsilon = 1e-12);
    assert_relative_eq!(end.z, 60.0, epsilon = 1e-12);
    assert_eq!(end.tx, start.tx);
    assert_eq!(end.ty, start.ty);
}

#[test]
fn test_swim_matches_analytic_helix() {
    // Uniform By with ty = 0: the trajectory is a circular arc in the (x, z)
    // plane, x(z) = (sqrt(1 - (a z)^2) - 1) / a with a = q·C·By.
    let by = -10.0;
    let probe = UniformField::along_y(by);
    let q = 1.0; // 1 GeV/c, unit charge
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(0.0, 0.0, 0.0, 0.0, 0.0, q, Frame::Tilted);

    let target_z = 100.0;
    let out = swimmer.swim_to_z(&start, target_z).unwrap();
    let end = out.trajectory.last().unwrap();

    let a = q * LIGHTVEL * by;
    let x_exact = ((1.0 - (a * target_z).powi(2)).sqrt() - 1.0) / a;
    let tx_exact = -a * target_z / (1.0 - (a * target_z).powi(2)).sqrt();

    assert_relative_eq!(end.x, x_exact, epsilon = 1e-3);
    assert_relative_eq!(end.tx, tx_exact, epsilon = 1e-4);
    assert_relative_eq!(end.y, 0.0, epsilon = 1e-9);
    assert!((end.z - target_z).abs() <= swimmer.params().z_accuracy);
}

#[test]
fn test_driver_lands_within_accuracy_without_overshoot() {
    let probe = UniformField(Vector3::new(2.0, -18.0, 4.0));
    let params = SwimParams::builder().z_accuracy(1.0e-3).build().unwrap();
    let swimmer = Swimmer::new(&probe, params);
    let start = StateVector::new(0.0, 0.0, 0.0, 0.1, -0.05, 0.5, Frame::Tilted);

    let target_z = 150.0;
    let out = swimmer.swim_to_z(&start, target_z).unwrap();
    assert_eq!(out.outcome, SwimOutcome::ReachedTarget);

    let end = out.trajectory.last().unwrap();
    assert!((end.z - target_z).abs() <= 1.0e-3);

    // No accepted state ever overshoots the target plane.
    for state in &out.trajectory {
        assert!(
            state.z <= target_z + 1.0e-3,
            "accepted state at z = {} overshot the target",
            state.z
        );
    }

    // Path length is monotonically increasing along the trajectory.
    for pair in out.trajectory.states().windows(2) {
        assert!(pair[1].path_length > pair[0].path_length);
    }
}

#[test]
fn test_retrace_reproduces_start_state() {
    // Swim forward, then swim back with charge and pz sign flipped: the
    // original state must be reproduced within tolerance.
    let probe = UniformField(Vector3::new(1.5, -14.0, 3.0));
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(2.0, 1.0, 0.0, 0.15, -0.08, 0.6, Frame::Tilted);

    let forward = swimmer.swim_to_z(&start, 120.0).unwrap();
    let end = *forward.trajectory.last().unwrap();

    let mut back_start = end.backward();
    back_start.q = -end.q;
    back_start.path_length = 0.0;

    let backward = swimmer.swim_to_z(&back_start, 0.0).unwrap();
    let retraced = backward.trajectory.last().unwrap();

    assert_state_close(retraced, &start, 1.0e-3);
}

#[test]
fn test_tolerance_not_met_reports_partial() {
    // An unreachable tolerance forces rejections until h < h_min.
    let probe = UniformField::along_y(-20.0);
    let params = SwimParams::builder()
        .tolerance([1e-300; 6])
        .build()
        .unwrap();
    let swimmer = Swimmer::new(&probe, params);
    let start = StateVector::new(0.0, 0.0, 0.0, 0.0, 0.0, 1.0, Frame::Tilted);

    match swimmer.swim_to_z(&start, 100.0) {
        Err(SwimError::ToleranceNotMet {
            step,
            min_step,
            partial,
            ..
        }) => {
            assert!(step < min_step);
            assert!(!partial.is_complete());
            // The start state is retained even when no step was accepted.
            assert!(!partial.is_empty());
        }
        other => panic!("expected ToleranceNotMet, got {other:?}"),
    }
}

#[test]
fn test_streaming_steps_match_collected_trajectory() {
    let probe = UniformField::along_y(-15.0);
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(0.0, 0.0, 0.0, 0.05, 0.0, 1.2, Frame::Tilted);

    let collected = swimmer.swim_to_z(&start, 80.0).unwrap();
    let streamed: Vec<_> = swimmer
        .steps(&start, 80.0)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    // swim_to_z prepends the start state; the streamed states follow it.
    assert_eq!(collected.trajectory.len(), streamed.len() + 1);
    assert_state_close(
        collected.trajectory.last().unwrap(),
        streamed.last().unwrap(),
        1e-14,
    );
}

#[test]
fn test_both_parameterizations_agree() {
    // The adaptive path-length swim and the fixed-z uniform swim must produce
    // physically equivalent trajectories for the same input.
    let probe = UniformField(Vector3::new(1.0, -16.0, 2.5));
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(0.5, -1.0, 0.0, 0.12, 0.04, 0.9, Frame::Tilted);

    let adaptive = swimmer.swim_to_z(&start, 90.0).unwrap();
    let plane = swimmer.swim_plane(&start, 90.0, 0.5).unwrap();

    assert_state_close(
        plane.trajectory.last().unwrap(),
        adaptive.trajectory.last().unwrap(),
        1.0e-3,
    );
}

#[test]
fn test_backward_swim_reaches_negative_target() {
    let probe = UniformField::along_y(-10.0);
    let swimmer = Swimmer::new(&probe, SwimParams::default());
    let start = StateVector::new(0.0, 0.0, 50.0, 0.0, 0.0, 0.8, Frame::Tilted).backward();

    let out = swimmer.swim_to_z(&start, -50.0).unwrap();
    assert_eq!(out.outcome, SwimOutcome::ReachedTarget);
    assert!((out.trajectory.last().unwrap().z + 50.0).abs() <= 1.0e-3);
}
