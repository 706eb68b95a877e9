//! Planning entry points that turn two orbits into a concrete burn plan.

use std::time::Duration;

use maneuver_config::PlannerConfig;
use maneuver_core::Burn;
use maneuver_impulsive::{
    CourseCorrectionSettings, CourseTarget, HohmannWindow, LambertSettings, TransferPath, WindowSearchSettings,
    cheapest_course_correction, hohmann_window,
};
use maneuver_numeric::{LevenbergMarquardtSettings, RootFinderSettings};
use maneuver_orbits::{BodyId, BodySystem, Orbit, Patch, PatchSettings, PropagatorSettings, first_encounter, predict_patches};
use rand::Rng;
use tracing::{debug, info, warn};

use crate::TransferError;
use crate::annealing::{AnnealingSettings, TransferConstraints, global_search};
use crate::optimizer::{OptimizerSettings, TransferBounds, TransferMode, TransferProblem};

/// Settings of every planner stage, usually derived from a [`PlannerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlannerSettings {
    pub propagator: PropagatorSettings,
    pub lambert: LambertSettings,
    pub root_finder: RootFinderSettings,
    pub window_search: WindowSearchSettings,
    pub course_correction: CourseCorrectionSettings,
    pub optimizer: OptimizerSettings,
    pub annealing: AnnealingSettings,
    pub patches: PatchSettings,
    pub seed: Option<u64>,
}

impl PlannerSettings {
    pub fn from_config(config: &PlannerConfig) -> Self {
        let propagator = PropagatorSettings {
            tolerance: config.propagator.tolerance,
            max_iterations: config.propagator.max_iterations,
        };
        let lambert = LambertSettings {
            tolerance: config.lambert.tolerance,
            max_iterations: config.lambert.max_iterations,
        };
        let root_finder = RootFinderSettings {
            tolerance: config.root_finder.tolerance,
            max_iterations: config.root_finder.max_iterations,
            time_budget: config.root_finder.time_budget_ms.map(Duration::from_millis),
        };
        let optimizer = OptimizerSettings {
            levenberg_marquardt: LevenbergMarquardtSettings {
                max_iterations: config.optimizer.max_iterations,
                cost_tolerance: config.optimizer.cost_tolerance,
                step_tolerance: config.optimizer.step_tolerance,
                ..LevenbergMarquardtSettings::default()
            },
            infeasible_cost: config.optimizer.infeasible_cost,
        };
        Self {
            propagator,
            lambert,
            root_finder,
            window_search: WindowSearchSettings {
                scan_subdivisions: config.window_search.scan_subdivisions,
                immediate_window: config.window_search.immediate_window_deg.to_radians(),
                root_finder,
            },
            course_correction: CourseCorrectionSettings {
                samples: config.course_correction.samples,
                latest_burn_fraction: config.course_correction.latest_burn_fraction,
                infeasible_cost: config.optimizer.infeasible_cost,
                lambert,
                ..CourseCorrectionSettings::default()
            },
            optimizer,
            annealing: AnnealingSettings {
                initial_temperature: config.annealing.initial_temperature,
                cooling_rate: config.annealing.cooling_rate,
                min_temperature: config.annealing.min_temperature,
                max_iterations: config.annealing.max_iterations,
                optimizer,
            },
            patches: PatchSettings {
                max_patches: config.patches.max_patches,
                samples_per_orbit: config.patches.samples_per_orbit,
                max_samples: config.patches.max_samples,
                root_finder,
            },
            seed: config.annealing.seed,
        }
    }
}

/// Caller choices for a two-burn transfer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferRequest {
    pub mode: TransferMode,
    pub burn_now: bool,
    /// Latest burn, in seconds after the planning epoch. Defaults to one synodic period.
    pub max_burn_offset: Option<f64>,
    /// Admissible transfer times in seconds. Defaults to a range around the Hohmann time.
    pub transfer_time_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferPlan {
    pub departure: Burn,
    /// Velocity-matching burn; absent for intercept-only plans.
    pub arrival: Option<Burn>,
    pub cost: f64,
    pub transfer_time: f64,
    pub path: TransferPath,
    pub iterations: usize,
    pub best_history: Vec<f64>,
}

impl TransferPlan {
    pub fn arrival_epoch(&self) -> f64 {
        self.departure.epoch + self.transfer_time
    }
}

/// Search for the cheapest two-burn transfer from `source` to `target` departing
/// at or after `after`.
///
/// Bounds come from the orbit periods and their validity intervals; see
/// [`TransferRequest`] to override them. The returned cost must be checked by the
/// caller: the search always yields its best candidate, however poor.
pub fn plan_transfer<R: Rng>(
    source: &Orbit,
    target: &Orbit,
    after: f64,
    request: &TransferRequest,
    settings: &PlannerSettings,
    rng: &mut R,
) -> Result<TransferPlan, TransferError> {
    let mu = source.mu();
    if (target.mu() - mu).abs() > 1e-9 * mu {
        return Err(TransferError::InvalidInput(format!(
            "source and target orbit different bodies (mu {mu} vs {})",
            target.mu()
        )));
    }
    let source_state = source.state_at(after)?;
    let target_state = target.state_at(after)?;
    let mut problem = TransferProblem::new(mu, source_state, target_state)?.with_mode(request.mode);
    problem.propagator = settings.propagator;
    problem.lambert = settings.lambert;

    let bounds = default_bounds(source, target, &source_state, &target_state, request)?;
    let constraints = TransferConstraints {
        source_valid_until: finite_offset(source.end_time(), after),
        target_valid_until: finite_offset(target.end_time(), after),
        burn_now: request.burn_now,
    };
    debug!(?bounds, ?constraints, "planning transfer");

    let outcome = global_search(&problem, bounds, constraints, &settings.annealing, rng)?;
    let best = outcome.best;
    if best.cost >= settings.optimizer.infeasible_cost {
        warn!(cost = best.cost, "global search found no feasible transfer");
    }

    let departure = Burn::new(best.delta_v1, after + best.burn_offset);
    let arrival = match request.mode {
        TransferMode::Rendezvous => Some(Burn::new(best.delta_v2, departure.epoch + best.transfer_time)),
        TransferMode::InterceptOnly => None,
    };
    info!(
        cost = best.cost,
        departure = departure.epoch,
        transfer_time = best.transfer_time,
        path = ?best.path,
        "transfer planned"
    );
    Ok(TransferPlan {
        departure,
        arrival,
        cost: best.cost,
        transfer_time: best.transfer_time,
        path: best.path,
        iterations: outcome.iterations,
        best_history: outcome.best_history,
    })
}

/// Next Hohmann-style departure from `vessel` towards `target`, using the configured
/// window search.
pub fn plan_hohmann_window(
    vessel: &Orbit,
    target: &Orbit,
    after: f64,
    settings: &PlannerSettings,
) -> Result<HohmannWindow, TransferError> {
    let window = hohmann_window(vessel, target, after, &settings.window_search)?;
    info!(
        burn = window.burn.epoch,
        delta_v = window.burn.magnitude(),
        arrival = window.arrival_epoch,
        "Hohmann window planned"
    );
    Ok(window)
}

/// Cheapest correction burn after `after` that meets `target` at `closest_approach`,
/// using the configured course-correction search.
pub fn plan_course_correction(
    orbit: &Orbit,
    after: f64,
    target: &CourseTarget,
    closest_approach: f64,
    settings: &PlannerSettings,
) -> Result<Burn, TransferError> {
    let burn = cheapest_course_correction(orbit, after, target, closest_approach, &settings.course_correction)?;
    info!(epoch = burn.epoch, delta_v = burn.magnitude(), "course correction planned");
    Ok(burn)
}

/// Apply `burn` to `orbit` about `body` and check that the patched-conic trajectory
/// enters `target`'s sphere of influence before `horizon`.
pub fn verify_encounter(
    system: &BodySystem,
    body: BodyId,
    orbit: &Orbit,
    burn: &Burn,
    target: BodyId,
    horizon: f64,
    settings: &PatchSettings,
) -> Result<Patch, TransferError> {
    let after_burn = orbit.after_burn(burn)?.with_body(body);
    let patches = predict_patches(system, body, &after_burn, horizon, Some(target), settings)?;
    let encounter = first_encounter(&patches, target)?.clone();
    debug!(patches = patches.len(), epoch = encounter.end_epoch, "encounter verified");
    Ok(encounter)
}

fn finite_offset(end: f64, after: f64) -> Option<f64> {
    end.is_finite().then_some(end - after)
}

fn default_bounds(
    source: &Orbit,
    target: &Orbit,
    source_state: &maneuver_core::StateVector,
    target_state: &maneuver_core::StateVector,
    request: &TransferRequest,
) -> Result<TransferBounds, TransferError> {
    let mu = source.mu();
    let mean_radius = 0.5 * (source_state.radius() + target_state.radius());
    let hohmann_time = std::f64::consts::PI * (mean_radius.powi(3) / mu).sqrt();

    let (min_tof, max_tof) = request
        .transfer_time_range
        .unwrap_or((0.1 * hohmann_time, 2.0 * hohmann_time));
    if !(min_tof > 0.0 && max_tof >= min_tof) {
        return Err(TransferError::InvalidInput(format!(
            "invalid transfer time range [{min_tof}, {max_tof}]"
        )));
    }
    let max_offset = match request.max_burn_offset {
        Some(offset) => offset,
        None => source
            .synodic_period(target)
            .or_else(|| source.period())
            .or_else(|| target.period())
            .unwrap_or(2.0 * hohmann_time),
    };
    if !(max_offset >= 0.0) {
        return Err(TransferError::InvalidInput(format!(
            "latest burn offset must be non-negative, got {max_offset}"
        )));
    }
    Ok(TransferBounds {
        min_offset: 0.0,
        max_offset,
        min_transfer_time: min_tof,
        max_transfer_time: max_tof,
        max_total: f64::INFINITY,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maneuver_config::PlannerConfig;
    use maneuver_orbits::OrbitalElements;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const MU: f64 = 398_600.0;

    fn circular(radius: f64, anomaly: f64) -> Orbit {
        Orbit::from_elements(
            MU,
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
        .unwrap()
    }

    #[test]
    fn settings_follow_config() {
        let mut config = PlannerConfig::default();
        config.window_search.immediate_window_deg = 1.0;
        config.root_finder.time_budget_ms = Some(250);
        config.annealing.seed = Some(9);
        let settings = PlannerSettings::from_config(&config);
        assert!((settings.window_search.immediate_window - 1f64.to_radians()).abs() < 1e-15);
        assert_eq!(settings.patches.root_finder.time_budget, Some(Duration::from_millis(250)));
        assert_eq!(settings.seed, Some(9));
    }

    #[test]
    fn intercept_plans_have_no_arrival_burn() {
        let mut settings = PlannerSettings::default();
        settings.annealing.max_iterations = 10;
        let request = TransferRequest {
            mode: TransferMode::InterceptOnly,
            ..TransferRequest::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let plan = plan_transfer(&circular(7_000.0, 0.0), &circular(9_000.0, 1.0), 0.0, &request, &settings, &mut rng)
            .unwrap();
        assert!(plan.arrival.is_none());
        assert!(plan.cost.is_finite());
        assert_eq!(plan.arrival_epoch(), plan.departure.epoch + plan.transfer_time);
    }

    #[test]
    fn window_search_follows_configured_immediate_window() {
        let vessel = circular(6_671.0, 0.0);
        let reference = maneuver_impulsive::hohmann(6_671.0, 26_571.0, MU).unwrap();
        // One degree past the window: too late by default, close enough with a 2 deg allowance.
        let target = circular(26_571.0, reference.phase_angle - 1f64.to_radians());

        let default = plan_hohmann_window(&vessel, &target, 0.0, &PlannerSettings::default()).unwrap();
        assert!(default.burn.epoch > 1_000.0);

        let mut config = PlannerConfig::default();
        config.window_search.immediate_window_deg = 2.0;
        let relaxed = plan_hohmann_window(&vessel, &target, 0.0, &PlannerSettings::from_config(&config)).unwrap();
        assert_eq!(relaxed.burn.epoch, 0.0);
    }

    #[test]
    fn course_correction_follows_configured_latest_burn() {
        let mut config = PlannerConfig::default();
        config.course_correction.latest_burn_fraction = 1e-6;
        let settings = PlannerSettings::from_config(&config);
        let burn = plan_course_correction(
            &circular(7_000.0, 0.0),
            50.0,
            &CourseTarget::Vessel(circular(9_000.0, 1.0)),
            3_000.0,
            &settings,
        )
        .unwrap();
        assert!((burn.epoch - 50.0).abs() < 0.01, "burn at {}", burn.epoch);
        assert!(burn.magnitude() > 0.0);
    }

    #[test]
    fn different_central_bodies_are_rejected() {
        let moon_orbit = Orbit::from_elements(
            4_902.8,
            &OrbitalElements {
                semi_major_axis: 2_000.0,
                eccentricity: 0.0,
                inclination: 0.0,
                longitude_of_ascending_node: 0.0,
                argument_of_periapsis: 0.0,
                true_anomaly: 0.0,
            },
            0.0,
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = plan_transfer(
            &circular(7_000.0, 0.0),
            &moon_orbit,
            0.0,
            &TransferRequest::default(),
            &PlannerSettings::default(),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::InvalidInput(_)));
    }
}
