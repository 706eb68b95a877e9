use orbital_maneuvers::Burn;
use orbital_maneuvers::impulsive::maneuvers::{
    delta_v_and_time_to_match_planes_ascending, delta_v_to_change_apoapsis, delta_v_to_change_inclination,
    delta_v_to_circularize,
};
use orbital_maneuvers::orbits::{Orbit, OrbitalElements};

const MU_EARTH: f64 = 398_600.4418; // km^3 / s^2

fn orbit(a: f64, e: f64, inclination: f64, nu: f64) -> Orbit {
    Orbit::from_elements(
        MU_EARTH,
        &OrbitalElements {
            semi_major_axis: a,
            eccentricity: e,
            inclination,
            longitude_of_ascending_node: 0.4,
            argument_of_periapsis: 1.1,
            true_anomaly: nu,
        },
        0.0,
    )
    .expect("orbit from elements")
}

/// Eccentricity of the orbit rebuilt from the state shortly after the burn.
fn eccentricity_after(orbit: &Orbit, burn: Burn) -> f64 {
    let after = orbit.after_burn(&burn).expect("apply burn");
    let later = after.state_at(burn.epoch + 1.0).expect("state after burn");
    Orbit::from_state(MU_EARTH, &later).expect("rebuilt orbit").eccentricity()
}

#[test]
fn circularize_elliptic_orbit() {
    let elliptic = orbit(12_000.0, 0.3, 0.5, 2.0);
    let t = 1_234.0;
    let burn = Burn::new(delta_v_to_circularize(&elliptic, t).expect("circularize"), t);
    assert!(eccentricity_after(&elliptic, burn) < 1e-8);
}

#[test]
fn circularize_hyperbolic_orbit() {
    let hyperbolic = orbit(-20_000.0, 1.4, 0.2, 0.6);
    let t = 300.0;
    let burn = Burn::new(delta_v_to_circularize(&hyperbolic, t).expect("circularize"), t);
    assert!(eccentricity_after(&hyperbolic, burn) < 1e-8);
}

#[test]
fn circularize_is_idempotent() {
    let elliptic = orbit(9_000.0, 0.15, 0.9, 0.3);
    let t = 500.0;
    let circular = elliptic
        .after_burn(&Burn::new(delta_v_to_circularize(&elliptic, t).expect("first burn"), t))
        .expect("circular orbit");
    let second = delta_v_to_circularize(&circular, t + 10.0).expect("second burn");
    let magnitude = (second[0].powi(2) + second[1].powi(2) + second[2].powi(2)).sqrt();
    assert!(magnitude < 1e-9, "second circularization needed {magnitude} km/s");
}

#[test]
fn apoapsis_change_at_periapsis_hits_requested_radius() {
    let parking = orbit(7_000.0, 0.01, 0.0, 0.0);
    let t = parking.next_periapsis_time(0.0).expect("periapsis time");
    let burn = Burn::new(delta_v_to_change_apoapsis(&parking, t, 20_000.0).expect("raise apoapsis"), t);
    let raised = parking.after_burn(&burn).expect("raised orbit");
    let apoapsis = raised.apoapsis().expect("closed orbit");
    assert!((apoapsis - 20_000.0).abs() < 1e-6 * 20_000.0, "apoapsis {apoapsis}");
}

#[test]
fn inclination_change_reaches_target_inclination() {
    let tilted = orbit(8_000.0, 0.0, 0.3, 0.0);
    let t = tilted.time_of_true_anomaly(-tilted.argument_of_periapsis(), 0.0).expect("node time");
    let burn = Burn::new(delta_v_to_change_inclination(&tilted, t, 0.6).expect("plane change"), t);
    let changed = tilted.after_burn(&burn).expect("changed orbit");
    assert!((changed.inclination() - 0.6).abs() < 1e-6, "inclination {}", changed.inclination());
}

#[test]
fn matching_planes_aligns_normals() {
    let vessel = orbit(8_000.0, 0.05, 0.4, 0.0);
    let target = Orbit::from_elements(
        MU_EARTH,
        &OrbitalElements {
            semi_major_axis: 9_000.0,
            eccentricity: 0.0,
            inclination: 0.9,
            longitude_of_ascending_node: 1.3,
            argument_of_periapsis: 0.0,
            true_anomaly: 0.0,
        },
        0.0,
    )
    .expect("target orbit");
    let burn = delta_v_and_time_to_match_planes_ascending(&vessel, &target, 0.0).expect("plane match");
    assert!(burn.epoch >= 0.0);
    let matched = vessel.after_burn(&burn).expect("matched orbit");
    assert!(matched.relative_inclination(&target) < 1e-7);
}

#[test]
fn coplanar_orbits_have_no_node() {
    let vessel = orbit(8_000.0, 0.05, 0.4, 0.0);
    let other = orbit(12_000.0, 0.1, 0.4, 1.0);
    let err = delta_v_and_time_to_match_planes_ascending(&vessel, &other, 0.0).unwrap_err();
    assert_eq!(err.kind(), orbital_maneuvers::ErrorKind::MissingReferenceNode);
}
