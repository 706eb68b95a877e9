use orbital_maneuvers::impulsive::lambert::TransferPath;
use orbital_maneuvers::impulsive::{WindowSearchSettings, hohmann, hohmann_window};
use orbital_maneuvers::orbits::{Orbit, OrbitalElements};
use orbital_maneuvers::transfer::{
    AnnealingSettings, TransferBounds, TransferConstraints, TransferProblem, global_search,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

const MU_EARTH: f64 = 398_600.0; // km^3 / s^2
const R_LOW: f64 = 6_671.0;
const R_HIGH: f64 = 26_571.0;

fn circular(radius: f64, anomaly: f64) -> Orbit {
    Orbit::from_elements(
        MU_EARTH,
        &OrbitalElements {
            semi_major_axis: radius,
            eccentricity: 0.0,
            inclination: 0.0,
            longitude_of_ascending_node: 0.0,
            argument_of_periapsis: 0.0,
            true_anomaly: anomaly,
        },
        0.0,
    )
    .expect("circular orbit")
}

#[test]
fn analytic_hohmann_is_symmetric_in_time() {
    let up = hohmann(R_LOW, R_HIGH, MU_EARTH).expect("outbound");
    let down = hohmann(R_HIGH, R_LOW, MU_EARTH).expect("inbound");
    assert!((up.total_delta_v - down.total_delta_v).abs() < 1e-9);
    assert!((up.transfer_time - down.transfer_time).abs() < 1e-6);
    assert!(up.departure_delta_v > 0.0 && down.departure_delta_v < 0.0);
    assert!((up.departure_delta_v - 2.0436).abs() < 1e-3);
}

#[test]
fn window_search_departure_matches_analytic_value() {
    let analytic = hohmann(R_LOW, R_HIGH, MU_EARTH).expect("analytic");
    let vessel = circular(R_LOW, 0.0);
    let target = circular(R_HIGH, 2.5);

    let window = hohmann_window(&vessel, &target, 0.0, &WindowSearchSettings::default()).expect("window");
    let departure = window.burn.magnitude();
    assert!(
        (departure - analytic.departure_delta_v).abs() < 0.01 * analytic.departure_delta_v,
        "window burn {departure} vs analytic {}",
        analytic.departure_delta_v
    );
    assert!((window.transfer_time - analytic.transfer_time).abs() < 0.01 * analytic.transfer_time);

    let arrival = target.position_at(window.arrival_epoch).expect("target position");
    let after_burn = vessel.after_burn(&window.burn).expect("transfer orbit");
    let reached = after_burn.position_at(window.arrival_epoch).expect("vessel position");
    let miss = ((arrival[0] - reached[0]).powi(2) + (arrival[1] - reached[1]).powi(2)).sqrt();
    assert!(miss < 0.01 * R_HIGH, "missed the target by {miss} km");
}

#[test]
fn global_search_finds_the_hohmann_transfer() {
    let analytic = hohmann(R_LOW, R_HIGH, MU_EARTH).expect("analytic");
    let vessel = circular(R_LOW, 0.0);
    let target = circular(R_HIGH, analytic.phase_angle);
    let problem = TransferProblem::new(
        MU_EARTH,
        *vessel.reference_state(),
        *target.reference_state(),
    )
    .expect("problem");

    let bounds = TransferBounds {
        min_offset: 0.0,
        max_offset: 0.0,
        min_transfer_time: 0.9 * analytic.transfer_time,
        max_transfer_time: 1.1 * analytic.transfer_time,
        max_total: f64::INFINITY,
    };
    let constraints = TransferConstraints {
        burn_now: true,
        ..TransferConstraints::default()
    };
    let settings = AnnealingSettings {
        max_iterations: 60,
        cooling_rate: 0.9,
        ..AnnealingSettings::default()
    };
    let mut rng = StdRng::seed_from_u64(2024);
    let outcome = global_search(&problem, bounds, constraints, &settings, &mut rng).expect("search");

    let best = outcome.best;
    let departure = (best.delta_v1[0].powi(2) + best.delta_v1[1].powi(2) + best.delta_v1[2].powi(2)).sqrt();
    assert!(
        (departure - analytic.departure_delta_v).abs() < 0.01 * analytic.departure_delta_v,
        "departure {departure} vs analytic {}",
        analytic.departure_delta_v
    );
    assert!(best.cost >= analytic.total_delta_v * 0.999);
    assert!(best.cost < analytic.total_delta_v * 1.02);
    assert!(matches!(best.path, TransferPath::Short | TransferPath::Long));
}
