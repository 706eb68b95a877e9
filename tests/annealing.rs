use orbital_maneuvers::StateVector;
use orbital_maneuvers::transfer::{
    Annealer, AnnealingSettings, TransferBounds, TransferConstraints, TransferMode, TransferProblem, global_search,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

const MU_EARTH: f64 = 398_600.0; // km^3 / s^2

fn circular(radius: f64, angle: f64, inclination: f64) -> StateVector {
    let speed = (MU_EARTH / radius).sqrt();
    let (sin_i, cos_i) = inclination.sin_cos();
    StateVector::new(
        [radius * angle.cos(), radius * angle.sin() * cos_i, radius * angle.sin() * sin_i],
        [-speed * angle.sin(), speed * angle.cos() * cos_i, speed * angle.cos() * sin_i],
        0.0,
    )
}

fn problem() -> TransferProblem {
    TransferProblem::new(MU_EARTH, circular(7_000.0, 0.0, 0.0), circular(11_000.0, 2.2, 0.1)).expect("problem")
}

fn bounds() -> TransferBounds {
    TransferBounds {
        min_offset: 0.0,
        max_offset: 20_000.0,
        min_transfer_time: 900.0,
        max_transfer_time: 12_000.0,
        max_total: 30_000.0,
    }
}

fn settings() -> AnnealingSettings {
    AnnealingSettings {
        max_iterations: 80,
        cooling_rate: 0.93,
        ..AnnealingSettings::default()
    }
}

#[test]
fn best_cost_never_regresses() {
    let problem = problem();
    let mut rng = StdRng::seed_from_u64(17);
    let outcome =
        global_search(&problem, bounds(), TransferConstraints::default(), &settings(), &mut rng).expect("search");

    assert_eq!(outcome.best_history.len(), outcome.iterations + 1);
    for pair in outcome.best_history.windows(2) {
        assert!(pair[1] <= pair[0], "best cost regressed: {} -> {}", pair[0], pair[1]);
    }
    let last = *outcome.best_history.last().expect("history");
    assert_eq!(last, outcome.best.cost);
    assert!(outcome.best.cost < 10.0, "no reasonable transfer found: {}", outcome.best.cost);
}

#[test]
fn same_seed_reproduces_the_same_search() {
    let problem = problem().with_mode(TransferMode::InterceptOnly);
    let run = |seed: u64| {
        let mut rng = StdRng::seed_from_u64(seed);
        global_search(&problem, bounds(), TransferConstraints::default(), &settings(), &mut rng).expect("search")
    };
    let first = run(99);
    let second = run(99);
    assert_eq!(first.best_history, second.best_history);
    assert_eq!(first.best, second.best);
}

#[test]
fn best_candidate_respects_bounds_and_deadlines() {
    let problem = problem();
    let constraints = TransferConstraints {
        source_valid_until: Some(4_000.0),
        target_valid_until: Some(9_000.0),
        burn_now: false,
    };
    let mut rng = StdRng::seed_from_u64(5);
    let outcome = global_search(&problem, bounds(), constraints, &settings(), &mut rng).expect("search");
    let best = outcome.best;
    assert!(best.burn_offset >= 0.0 && best.burn_offset <= 4_000.0 + 1e-6);
    assert!(best.transfer_time >= 900.0 - 1e-6);
    assert!(best.burn_offset + best.transfer_time <= 9_000.0 + 1e-6);
}

#[test]
fn search_can_be_stopped_early() {
    let problem = problem();
    let mut rng = StdRng::seed_from_u64(1);
    let mut annealer = Annealer::new(&problem, bounds(), TransferConstraints::default(), settings(), &mut rng)
        .expect("annealer");
    let seeded = annealer.best().cost;
    for _ in 0..3 {
        annealer.step();
    }
    assert!(annealer.best().cost <= seeded);
    assert!(annealer.temperature() < settings().initial_temperature);
    let outcome = annealer.finish();
    assert_eq!(outcome.iterations, 3);
}
