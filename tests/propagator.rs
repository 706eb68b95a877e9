use orbital_maneuvers::orbits::kepler;

const MU_EARTH: f64 = 398_600.4418; // km^3 / s^2

fn assert_round_trip(r0: [f64; 3], v0: [f64; 3], dt: f64) {
    let (r1, v1) = kepler::propagate(MU_EARTH, dt, &r0, &v0).expect("forward propagation");
    let (r2, v2) = kepler::propagate(MU_EARTH, -dt, &r1, &v1).expect("backward propagation");

    let r_scale = norm(&r0);
    let v_scale = norm(&v0);
    for i in 0..3 {
        assert!(
            (r2[i] - r0[i]).abs() <= 1e-9 * r_scale,
            "position drift {:?} vs {:?} (dt = {dt})",
            r2,
            r0
        );
        assert!(
            (v2[i] - v0[i]).abs() <= 1e-9 * v_scale,
            "velocity drift {:?} vs {:?} (dt = {dt})",
            v2,
            v0
        );
    }
}

fn norm(v: &[f64; 3]) -> f64 {
    (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt()
}

#[test]
fn elliptic_round_trip_over_several_periods() {
    let r0 = [7_000.0, -1_200.0, 300.0];
    let v0 = [1.1, 7.3, 0.9];
    for dt in [60.0, 2_500.0, 17_000.0, 86_400.0] {
        assert_round_trip(r0, v0, dt);
    }
}

#[test]
fn parabolic_round_trip() {
    let r0 = [8_000.0, 0.0, 0.0];
    let escape = (2.0 * MU_EARTH / 8_000.0).sqrt();
    let v0 = [0.0, escape, 0.0];
    for dt in [100.0, 5_000.0, 40_000.0] {
        assert_round_trip(r0, v0, dt);
    }
}

#[test]
fn hyperbolic_round_trip() {
    let r0 = [-6_800.0, 2_000.0, 1_000.0];
    let v0 = [-2.0, -11.5, 1.5];
    for dt in [300.0, 7_200.0, 50_000.0] {
        assert_round_trip(r0, v0, dt);
    }
}

#[test]
fn circular_orbit_returns_after_one_period() {
    let radius = 42_164.0;
    let speed = (MU_EARTH / radius).sqrt();
    let period = 2.0 * std::f64::consts::PI * (radius.powi(3) / MU_EARTH).sqrt();
    let (r, v) = kepler::propagate(MU_EARTH, period, &[radius, 0.0, 0.0], &[0.0, speed, 0.0])
        .expect("propagate one period");
    assert!((r[0] - radius).abs() < 1e-6 * radius);
    assert!(r[1].abs() < 1e-6 * radius);
    assert!((v[1] - speed).abs() < 1e-9 * speed * 1e3);
}

#[test]
fn invalid_inputs_are_rejected() {
    let err = kepler::propagate(-1.0, 10.0, &[7_000.0, 0.0, 0.0], &[0.0, 7.5, 0.0]).unwrap_err();
    assert_eq!(err.kind(), orbital_maneuvers::ErrorKind::InvalidInput);
    assert!(kepler::propagate(MU_EARTH, 10.0, &[0.0; 3], &[0.0, 7.5, 0.0]).is_err());
}
