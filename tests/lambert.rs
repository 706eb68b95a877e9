use orbital_maneuvers::impulsive::lambert::{self, LambertProblem, LambertSolverError, TransferPath};

const MU_EARTH: f64 = 398_600.4418; // km^3 / s^2
const MU_SUN: f64 = 1.327_124_400_18e11; // km^3 / s^2
const AU_KM: f64 = 149_597_870.7; // km

fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[test]
fn half_period_transfer_reproduces_circular_speed() {
    let radius = 10_000.0;
    let circular_speed = (MU_EARTH / radius).sqrt();
    let half_period = std::f64::consts::PI * (radius.powi(3) / MU_EARTH).sqrt();

    let problem = LambertProblem {
        mu: MU_EARTH,
        r1: [radius, 0.0, 0.0],
        v1: [0.0, circular_speed, 0.0],
        r2: [-radius, 0.0, 0.0],
        v2: [0.0, -circular_speed, 0.0],
        tof: half_period,
        revolutions: 0,
        path: TransferPath::Short,
    };
    let transfer = problem.solve().expect("180 degree transfer");

    assert!((norm(&transfer.departure_velocity) - circular_speed).abs() < 1e-6 * circular_speed);
    assert!((norm(&transfer.arrival_velocity) - circular_speed).abs() < 1e-6 * circular_speed);
    assert!(norm(&transfer.departure_delta_v) < 1e-5, "{:?}", transfer.departure_delta_v);
    assert!(norm(&transfer.arrival_delta_v) < 1e-5, "{:?}", transfer.arrival_delta_v);
}

#[test]
fn quarter_orbit_is_tangential() {
    let r1 = [AU_KM, 0.0, 0.0];
    let r2 = [0.0, AU_KM, 0.0];
    let tof = (std::f64::consts::PI / 2.0) * (AU_KM.powi(3) / MU_SUN).sqrt();

    let (v1, v2) = lambert::solve(MU_SUN, &r1, &r2, tof, 0, TransferPath::Short).expect("lambert solve");
    let expected_speed = (MU_SUN / AU_KM).sqrt();

    assert!((v1[1] / norm(&v1)) > 0.999_999, "departure not tangential: {:?}", v1);
    assert!((-v2[0] / norm(&v2)) > 0.999_999, "arrival not tangential: {:?}", v2);
    assert!((norm(&v1) - expected_speed).abs() < 1e-6 * expected_speed);
    assert!((norm(&v2) - expected_speed).abs() < 1e-6 * expected_speed);
}

#[test]
fn long_path_goes_the_other_way_round() {
    let r1 = [AU_KM, 0.0, 0.0];
    let r2 = [0.0, AU_KM, 0.0];
    let tof = 200.0 * 86_400.0;
    let (short, _) = lambert::solve(MU_SUN, &r1, &r2, tof, 0, TransferPath::Short).expect("short path");
    let (long, _) = lambert::solve(MU_SUN, &r1, &r2, tof, 0, TransferPath::Long).expect("long path");
    assert!(short[1] > 0.0);
    assert!(long[1] < 0.0);
}

#[test]
fn colinear_positions_without_plane_hint_are_degenerate() {
    let err = lambert::solve(MU_EARTH, &[7_000.0, 0.0, 0.0], &[-9_000.0, 0.0, 0.0], 4_000.0, 0, TransferPath::Short)
        .unwrap_err();
    assert_eq!(err, LambertSolverError::DegenerateGeometry);
    assert_eq!(err.kind(), orbital_maneuvers::ErrorKind::DegenerateGeometry);
}

#[test]
fn non_positive_time_of_flight_is_invalid() {
    let err = lambert::solve(MU_EARTH, &[7_000.0, 0.0, 0.0], &[0.0, 9_000.0, 0.0], 0.0, 0, TransferPath::Short)
        .unwrap_err();
    assert_eq!(err.kind(), orbital_maneuvers::ErrorKind::InvalidInput);
}
