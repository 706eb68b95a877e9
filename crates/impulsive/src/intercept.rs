//! Single-burn transfer and intercept solvers built on the Lambert solver and the
//! bracketed root finder.

use std::f64::consts::PI;

use maneuver_core::vector::{self, Vector3};
use maneuver_core::{Burn, StateVector};
use maneuver_numeric::{RootFinderSettings, find_root, minimize_scalar};
use maneuver_orbits::Orbit;
use tracing::{debug, warn};

use crate::ManeuverError;
use crate::lambert::{self, LambertProblem, LambertSettings, LambertTransfer, TransferPath};
use crate::maneuvers::{delta_v_to_change_apoapsis, delta_v_to_change_periapsis};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSearchSettings {
    /// Uniform samples across one synodic period before root refinement.
    pub scan_subdivisions: usize,
    /// Phase error (radians) below which a receding error means "burn now".
    pub immediate_window: f64,
    pub root_finder: RootFinderSettings,
}

impl Default for WindowSearchSettings {
    fn default() -> Self {
        Self {
            scan_subdivisions: 100,
            immediate_window: 0.5_f64.to_radians(),
            root_finder: RootFinderSettings {
                tolerance: 1e-3,
                max_iterations: 100,
                time_budget: None,
            },
        }
    }
}

/// A Hohmann-style departure and its predicted arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HohmannWindow {
    pub burn: Burn,
    pub transfer_time: f64,
    pub arrival_epoch: f64,
    /// Radius of the target orbit at the arrival direction.
    pub arrival_radius: f64,
}

struct PhaseSample {
    error: f64,
    transfer_time: f64,
    arrival_radius: f64,
}

/// Angle from the transfer's arrival point to the target's position at arrival, for a
/// burn at `t`.
fn phase_error(orbit: &Orbit, target: &Orbit, t: f64) -> Result<PhaseSample, ManeuverError> {
    let state = orbit.state_at(t)?;
    let arrival_direction = vector::scale(&state.position, -1.0);
    let nu = target.true_anomaly_of_direction(&arrival_direction);
    let arrival_radius = target.radius_at_true_anomaly(nu).ok_or_else(|| {
        ManeuverError::InvalidInput("target orbit does not cross the arrival direction".into())
    })?;
    let semi_major_axis = 0.5 * (state.radius() + arrival_radius);
    let transfer_time = PI * (semi_major_axis.powi(3) / orbit.mu()).sqrt();
    let target_position = target.position_at(t + transfer_time)?;
    Ok(PhaseSample {
        error: vector::signed_angle(&arrival_direction, &target_position, &orbit.normal()),
        transfer_time,
        arrival_radius,
    })
}

/// Find the next burn epoch after `after` at which a tangential burn sends the vessel to
/// meet `target` at the opposite side of its orbit.
///
/// If the phase error is already within `immediate_window` and growing, the window has
/// just passed and the burn is placed at `after`. The departure burn comes from an apsis
/// change rather than a Lambert solve: the transfer spans exactly 180°, where the
/// transfer plane is undefined for Lambert, and for coplanar orbits the half-ellipse is
/// the Lambert solution.
pub fn hohmann_window(
    orbit: &Orbit,
    target: &Orbit,
    after: f64,
    settings: &WindowSearchSettings,
) -> Result<HohmannWindow, ManeuverError> {
    let span = orbit
        .synodic_period(target)
        .or_else(|| Some(2.0 * orbit.period()?.max(target.period()?)))
        .ok_or_else(|| ManeuverError::InvalidInput("window search needs closed orbits".into()))?;
    let subdivisions = settings.scan_subdivisions.max(2);
    let step = span / subdivisions as f64;

    let error_at = |t: f64| phase_error(orbit, target, t).map(|sample| sample.error).ok();

    // The error is only receding if its local rate shares the sign of the error itself.
    let nudge = step * 1e-4;
    let first = error_at(after);
    let burn_epoch = match (first, error_at(after + nudge)) {
        (Some(e0), Some(e1)) if e0.abs() < settings.immediate_window && e0 * (e1 - e0) > 0.0 => Some(after),
        _ => None,
    };

    let burn_epoch = match burn_epoch {
        Some(t) => t,
        None => {
            let mut previous = first.map(|error| (after, error));
            let mut bracket = None;
            for i in 1..=subdivisions {
                let t = after + step * i as f64;
                let current = error_at(t).map(|error| (t, error));
                if let (Some((t0, e0)), Some((t1, e1))) = (previous, current) {
                    if e0 * e1 <= 0.0 && (e1 - e0).abs() < PI {
                        bracket = Some((t0, t1));
                        break;
                    }
                }
                previous = current;
            }
            let Some((lo, hi)) = bracket else {
                return Err(ManeuverError::NoTransferWindowFound);
            };
            find_root(
                |t| error_at(t).unwrap_or(f64::NAN),
                lo,
                hi,
                &settings.root_finder,
            )
            .map_err(|err| {
                warn!(%err, lo, hi, "phase-error refinement failed");
                ManeuverError::NoTransferWindowFound
            })?
        }
    };

    let sample = phase_error(orbit, target, burn_epoch)?;
    let radius = orbit.state_at(burn_epoch)?.radius();
    let delta_v = if sample.arrival_radius >= radius {
        delta_v_to_change_apoapsis(orbit, burn_epoch, sample.arrival_radius)?
    } else {
        delta_v_to_change_periapsis(orbit, burn_epoch, sample.arrival_radius)?
    };
    debug!(burn_epoch, transfer_time = sample.transfer_time, "Hohmann window located");

    Ok(HohmannWindow {
        burn: Burn::new(delta_v, burn_epoch),
        transfer_time: sample.transfer_time,
        arrival_epoch: burn_epoch + sample.transfer_time,
        arrival_radius: sample.arrival_radius,
    })
}

/// Outbound burn and optional matching burn of a direct intercept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterceptPlan {
    pub departure: Burn,
    pub arrival: Option<Burn>,
    pub transfer: LambertTransfer,
}

/// Two-point boundary-value intercept departing at `departure` and arriving after `tof`.
pub fn direct_intercept(
    source: &Orbit,
    target: &Orbit,
    departure: f64,
    tof: f64,
    match_velocity: bool,
    settings: &LambertSettings,
) -> Result<InterceptPlan, ManeuverError> {
    let start = source.state_at(departure)?;
    let end = target.state_at(departure + tof)?;
    let problem = LambertProblem {
        mu: source.mu(),
        r1: start.position,
        v1: start.velocity,
        r2: end.position,
        v2: end.velocity,
        tof,
        revolutions: 0,
        path: TransferPath::prograde(&start.position, &end.position, &source.normal()),
    };
    let transfer = problem.solve_with(settings)?;
    Ok(InterceptPlan {
        departure: Burn::new(transfer.departure_delta_v, departure),
        arrival: match_velocity.then(|| Burn::new(transfer.arrival_delta_v, departure + tof)),
        transfer,
    })
}

/// What a course correction aims at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CourseTarget {
    /// Hit the vessel's position at closest approach.
    Vessel(Orbit),
    /// Pass a body at `periapsis` km from its centre once inside its sphere of influence.
    Body {
        orbit: Orbit,
        mu: f64,
        soi_radius: f64,
        periapsis: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CourseCorrectionSettings {
    /// Burn epochs evaluated by the coarse line search.
    pub samples: usize,
    /// Latest burn as a fraction of the time to closest approach.
    pub latest_burn_fraction: f64,
    pub refine_iterations: usize,
    /// Cost assigned to burn epochs whose Lambert solve fails.
    pub infeasible_cost: f64,
    pub lambert: LambertSettings,
}

impl Default for CourseCorrectionSettings {
    fn default() -> Self {
        Self {
            samples: 20,
            latest_burn_fraction: 0.8,
            refine_iterations: 40,
            infeasible_cost: 1e6,
            lambert: LambertSettings::default(),
        }
    }
}

/// Impact parameter that yields periapsis `periapsis` for a hyperbolic excess speed
/// `v_infinity_sq.sqrt()`.
fn impact_parameter(mu: f64, periapsis: f64, v_infinity_sq: f64) -> f64 {
    if v_infinity_sq > 0.0 {
        periapsis * (1.0 + 2.0 * mu / (periapsis * v_infinity_sq)).sqrt()
    } else {
        periapsis
    }
}

fn correction_at(
    orbit: &Orbit,
    target: &CourseTarget,
    closest_approach: f64,
    t: f64,
    settings: &CourseCorrectionSettings,
) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let tof = closest_approach - t;
    let solve_to = |aim: &Vector3| -> Result<(Vector3, Vector3), ManeuverError> {
        let path = TransferPath::prograde(&state.position, aim, &orbit.normal());
        Ok(lambert::solve_with(orbit.mu(), &state.position, aim, tof, 0, path, &settings.lambert)?)
    };

    let aim = match target {
        CourseTarget::Vessel(target_orbit) => target_orbit.position_at(closest_approach)?,
        CourseTarget::Body {
            orbit: body_orbit,
            mu,
            soi_radius,
            periapsis,
        } => {
            let body = body_orbit.state_at(closest_approach)?;
            let (_, arrival) = solve_to(&body.position)?;
            let relative = vector::sub(&arrival, &body.velocity);
            let v_infinity_sq = vector::dot(&relative, &relative) - 2.0 * mu / soi_radius;
            let b = impact_parameter(*mu, *periapsis, v_infinity_sq);
            let miss = vector::sub(&orbit.position_at(closest_approach)?, &body.position);
            let offset = vector::normalize(&vector::reject(&miss, &relative))
                .or_else(|| vector::normalize(&vector::cross(&relative, &orbit.normal())))
                .ok_or_else(|| ManeuverError::InvalidInput("approach velocity is degenerate".into()))?;
            vector::add(&body.position, &vector::scale(&offset, b))
        }
    };

    let (departure, _) = solve_to(&aim)?;
    Ok(vector::sub(&departure, &state.velocity))
}

/// Cheapest burn after `after` that puts the vessel on target at `closest_approach`.
///
/// Burn epochs are sampled uniformly up to `latest_burn_fraction` of the remaining time,
/// and the best sample is refined by golden-section search between its neighbours.
pub fn cheapest_course_correction(
    orbit: &Orbit,
    after: f64,
    target: &CourseTarget,
    closest_approach: f64,
    settings: &CourseCorrectionSettings,
) -> Result<Burn, ManeuverError> {
    if !(closest_approach > after) {
        return Err(ManeuverError::InvalidInput(format!(
            "closest approach {closest_approach} must follow the search start {after}"
        )));
    }
    let latest = after + settings.latest_burn_fraction.clamp(0.0, 1.0) * (closest_approach - after);
    let samples = settings.samples.max(2);
    let step = (latest - after) / (samples - 1) as f64;

    let cost = |t: f64| match correction_at(orbit, target, closest_approach, t, settings) {
        Ok(delta_v) => vector::norm(&delta_v),
        Err(_) => settings.infeasible_cost,
    };

    let (best_index, best_cost) = (0..samples)
        .map(|i| (i, cost(after + step * i as f64)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .ok_or(ManeuverError::NoTransferWindowFound)?;
    if best_cost >= settings.infeasible_cost {
        return Err(ManeuverError::NoTransferWindowFound);
    }

    let lo = after + step * best_index.saturating_sub(1) as f64;
    let hi = (after + step * (best_index + 1) as f64).min(latest);
    let (refined, refined_cost) = minimize_scalar(cost, lo, hi, settings.refine_iterations)?;
    let burn_epoch = if refined_cost <= best_cost {
        refined
    } else {
        after + step * best_index as f64
    };

    let delta_v = correction_at(orbit, target, closest_approach, burn_epoch, settings)?;
    Ok(Burn::new(delta_v, burn_epoch))
}

/// Escape burn from a parking orbit about a planet that leaves on the planet's Hohmann
/// transfer towards `target`.
///
/// The parent-frame departure burn of the planet's own window fixes the required excess
/// velocity; the burn is placed on the parking orbit so that the escape hyperbola's
/// outgoing asymptote points along it.
pub fn interplanetary_ejection(
    vessel: &Orbit,
    planet: &Orbit,
    target: &Orbit,
    after: f64,
    settings: &WindowSearchSettings,
) -> Result<Burn, ManeuverError> {
    let Some(period) = vessel.period() else {
        return Err(ManeuverError::InvalidInput("ejection needs a closed parking orbit".into()));
    };
    let window = hohmann_window(planet, target, after, settings)?;
    let excess = window.burn.delta_v;
    let excess_sq = vector::dot(&excess, &excess);
    let asymptote = vector::normalize(&vector::reject(&excess, &vessel.normal()))
        .ok_or_else(|| ManeuverError::InvalidInput("excess velocity is normal to the parking orbit".into()))?;

    let mu = vessel.mu();
    let search_from = (window.burn.epoch - 0.5 * period).max(after);
    let radius = vessel.state_at(search_from)?.radius();
    let eccentricity = 1.0 + radius * excess_sq / mu;
    let asymptote_anomaly = (-1.0 / eccentricity).acos();
    let burn_direction = vector::rotate_about(&asymptote, &vessel.normal(), -asymptote_anomaly);
    let nu = vessel.true_anomaly_of_direction(&burn_direction);
    let burn_epoch = vessel.time_of_true_anomaly(nu, search_from)?;

    let state: StateVector = vessel.state_at(burn_epoch)?;
    let up = vector::scale(&state.position, 1.0 / state.radius());
    let horizontal = vector::normalize(&vector::cross(&vessel.normal(), &up))
        .ok_or_else(|| ManeuverError::InvalidInput("degenerate parking orbit".into()))?;
    let speed = (excess_sq + 2.0 * mu / state.radius()).sqrt();
    let delta_v = vector::sub(&vector::scale(&horizontal, speed), &state.velocity);
    debug!(burn_epoch, excess = excess_sq.sqrt(), "ejection burn placed");
    Ok(Burn::new(delta_v, burn_epoch))
}
