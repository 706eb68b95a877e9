//! Closed-form single-burn maneuvers.
//!
//! Each function evaluates the vessel state at the burn epoch and returns the velocity
//! change that reshapes the orbit. Apsis and eccentricity changes burn horizontally and
//! leave the radial velocity untouched.

use std::f64::consts::TAU;

use maneuver_core::vector::{self, Vector3};
use maneuver_core::{Burn, StateVector};
use maneuver_orbits::{Orbit, OrbitError};

use crate::ManeuverError;

/// Local horizon frame at a state: radial-out, prograde-horizontal, and the
/// horizontal part of the velocity split into radial/tangential speeds.
struct LocalFrame {
    radius: f64,
    up: Vector3,
    horizontal: Vector3,
    radial_speed: f64,
    tangential_speed: f64,
}

impl LocalFrame {
    fn new(state: &StateVector) -> Result<Self, ManeuverError> {
        let radius = state.radius();
        let up = vector::normalize(&state.position)
            .ok_or_else(|| ManeuverError::InvalidInput("position vector has zero length".into()))?;
        let h = state.angular_momentum();
        let horizontal = vector::normalize(&vector::cross(&h, &up))
            .ok_or_else(|| ManeuverError::InvalidInput("purely radial velocity has no horizontal direction".into()))?;
        Ok(Self {
            radius,
            up,
            horizontal,
            radial_speed: vector::dot(&state.velocity, &up),
            tangential_speed: vector::dot(&state.velocity, &horizontal),
        })
    }

    fn velocity(&self, radial: f64, tangential: f64) -> Vector3 {
        vector::add(&vector::scale(&self.up, radial), &vector::scale(&self.horizontal, tangential))
    }
}

/// East and north unit vectors at `up` relative to the reference pole.
fn east_north(up: &Vector3) -> Result<(Vector3, Vector3), ManeuverError> {
    let east = vector::normalize(&vector::cross(&vector::UNIT_Z, up))
        .ok_or_else(|| ManeuverError::InvalidInput("burn position lies on the reference pole".into()))?;
    Ok((east, vector::cross(up, &east)))
}

/// Burn at `t` that makes the orbit circular at the current radius.
pub fn delta_v_to_circularize(orbit: &Orbit, t: f64) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let frame = LocalFrame::new(&state)?;
    let desired = vector::scale(&frame.horizontal, (orbit.mu() / frame.radius).sqrt());
    Ok(vector::sub(&desired, &state.velocity))
}

/// Tangential speed that places the opposite apsis at `apsis`, keeping the radial speed.
///
/// `apsis` may be negative to name the formal apoapsis of a hyperbola.
fn tangential_speed_for_apsis(mu: f64, frame: &LocalFrame, apsis: f64) -> Result<f64, ManeuverError> {
    let r = frame.radius;
    let numerator = frame.radial_speed.powi(2) + 2.0 * mu * (1.0 / apsis - 1.0 / r);
    let denominator = (r / apsis).powi(2) - 1.0;
    let speed_sq = numerator / denominator;
    if !(speed_sq > 0.0) || !speed_sq.is_finite() {
        return Err(ManeuverError::InvalidInput(format!(
            "apsis {apsis} km is not reachable with a horizontal burn at radius {r} km"
        )));
    }
    Ok(speed_sq.sqrt())
}

fn clamp_periapsis(periapsis: f64, radius: f64) -> f64 {
    periapsis.clamp(radius * 1e-6, radius * (1.0 - 1e-9))
}

fn clamp_apoapsis(apoapsis: f64, radius: f64) -> f64 {
    if apoapsis < 0.0 { apoapsis } else { apoapsis.max(radius * (1.0 + 1e-9)) }
}

/// Horizontal burn at `t` that moves the periapsis to `periapsis` (clamped into `(0, r)`).
pub fn delta_v_to_change_periapsis(orbit: &Orbit, t: f64, periapsis: f64) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let frame = LocalFrame::new(&state)?;
    let target = clamp_periapsis(periapsis, frame.radius);
    let speed = tangential_speed_for_apsis(orbit.mu(), &frame, target)?;
    Ok(vector::scale(&frame.horizontal, speed - frame.tangential_speed))
}

/// Horizontal burn at `t` that moves the apoapsis to `apoapsis`.
///
/// Positive values are clamped to at least the current radius; a negative value requests
/// the hyperbola whose formal apoapsis `a(1 + e)` equals it.
pub fn delta_v_to_change_apoapsis(orbit: &Orbit, t: f64, apoapsis: f64) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let frame = LocalFrame::new(&state)?;
    let target = clamp_apoapsis(apoapsis, frame.radius);
    let speed = tangential_speed_for_apsis(orbit.mu(), &frame, target)?;
    Ok(vector::scale(&frame.horizontal, speed - frame.tangential_speed))
}

/// Burn at `t` that sets both apsides at once, keeping the sign of the radial velocity.
///
/// The periapsis is clamped strictly inside `(0, r)` and a positive apoapsis strictly
/// above `r`.
pub fn delta_v_to_ellipticize(
    orbit: &Orbit,
    t: f64,
    periapsis: f64,
    apoapsis: f64,
) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let frame = LocalFrame::new(&state)?;
    let r = frame.radius;
    let pe = clamp_periapsis(periapsis, r);
    let ap = clamp_apoapsis(apoapsis, r);
    if ap < 0.0 && -ap <= pe {
        return Err(ManeuverError::InvalidInput(format!(
            "hyperbolic apoapsis {ap} km must exceed the periapsis {pe} km in magnitude"
        )));
    }

    let mu = orbit.mu();
    let semi_major_axis = 0.5 * (pe + ap);
    let semi_latus_rectum = 2.0 * pe * ap / (pe + ap);
    let speed_sq = mu * (2.0 / r - 1.0 / semi_major_axis);
    let tangential = (mu * semi_latus_rectum).sqrt() / r;
    let radial_sq = (speed_sq - tangential * tangential).max(0.0);
    let radial = radial_sq.sqrt().copysign(if frame.radial_speed < 0.0 { -1.0 } else { 1.0 });

    Ok(vector::sub(&frame.velocity(radial, tangential), &state.velocity))
}

/// Horizontal burn at `t` that sets the eccentricity to `eccentricity`.
///
/// Of the two tangential speeds that produce the requested eccentricity, the one closer
/// to the current speed is used. If the radial velocity makes the target unreachable the
/// burn goes to the minimum reachable eccentricity.
pub fn delta_v_to_change_eccentricity(orbit: &Orbit, t: f64, eccentricity: f64) -> Result<Vector3, ManeuverError> {
    if !(eccentricity >= 0.0) {
        return Err(ManeuverError::InvalidInput(format!(
            "eccentricity must be non-negative, got {eccentricity}"
        )));
    }
    let state = orbit.state_at(t)?;
    let frame = LocalFrame::new(&state)?;
    let mu = orbit.mu();
    let r = frame.radius;

    // u = v_t² solves u² + (v_r² − 2μ/r)·u + μ²(1 − e²)/r² = 0.
    let b = frame.radial_speed.powi(2) - 2.0 * mu / r;
    let c = (mu / r).powi(2) * (1.0 - eccentricity * eccentricity);
    let discriminant = b * b - 4.0 * c;
    let current = frame.tangential_speed.powi(2);
    let u = if discriminant <= 0.0 {
        -0.5 * b
    } else {
        let root = discriminant.sqrt();
        [0.5 * (-b + root), 0.5 * (-b - root)]
            .into_iter()
            .filter(|u| *u > 0.0)
            .min_by(|a, b| (a - current).abs().total_cmp(&(b - current).abs()))
            .ok_or_else(|| {
                ManeuverError::InvalidInput(format!("eccentricity {eccentricity} is not reachable at this epoch"))
            })?
    };
    Ok(vector::scale(&frame.horizontal, u.sqrt() - frame.tangential_speed))
}

/// Compass heading (radians from north towards east) of a launch azimuth that reaches
/// `inclination` from `latitude`.
///
/// When the inclination cannot be reached from the latitude, due north or due south is
/// returned, whichever is closer.
pub fn heading_for_inclination(inclination: f64, latitude: f64) -> f64 {
    let cos_angle = inclination.cos() / latitude.cos();
    if cos_angle.abs() > 1.0 {
        if (latitude - inclination).abs() < (latitude + inclination).abs() {
            0.0
        } else {
            std::f64::consts::PI
        }
    } else {
        let angle_from_east = cos_angle.acos();
        (std::f64::consts::FRAC_PI_2 - angle_from_east).rem_euclid(TAU)
    }
}

/// Horizontal burn at `t` that rotates the orbit plane to `inclination`.
///
/// Of the two headings through the burn point that give the inclination, the one that
/// keeps the current north/south direction of travel is used. A negative inclination
/// deliberately selects the other heading.
pub fn delta_v_to_change_inclination(orbit: &Orbit, t: f64, inclination: f64) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let up = vector::normalize(&state.position)
        .ok_or_else(|| ManeuverError::InvalidInput("position vector has zero length".into()))?;
    let (east, north) = east_north(&up)?;
    let latitude = up[2].clamp(-1.0, 1.0).asin();
    let heading = heading_for_inclination(inclination, latitude);

    let actual_horizontal = vector::reject(&state.velocity, &up);
    let speed = vector::norm(&actual_horizontal);
    let east_component = vector::scale(&east, speed * heading.sin());
    let mut north_component = vector::scale(&north, speed * heading.cos());
    if vector::dot(&actual_horizontal, &north_component) < 0.0 {
        north_component = vector::scale(&north_component, -1.0);
    }
    if maneuver_core::angles::wrap_pi(inclination) < 0.0 {
        north_component = vector::scale(&north_component, -1.0);
    }
    let desired_horizontal = vector::add(&east_component, &north_component);
    Ok(vector::sub(&desired_horizontal, &actual_horizontal))
}

/// Rotate the horizontal velocity at `t` into the plane with unit normal `normal`.
fn plane_change_at(orbit: &Orbit, t: f64, normal: &Vector3) -> Result<Burn, ManeuverError> {
    let state = orbit.state_at(t)?;
    let up = vector::normalize(&state.position)
        .ok_or_else(|| ManeuverError::InvalidInput("position vector has zero length".into()))?;
    let actual_horizontal = vector::reject(&state.velocity, &up);
    let direction = vector::normalize(&vector::cross(normal, &up)).ok_or(OrbitError::MissingReferenceNode)?;
    let desired = vector::scale(&direction, vector::norm(&actual_horizontal));
    Ok(Burn::new(vector::sub(&desired, &actual_horizontal), t))
}

/// Plane-matching burn at the next ascending node relative to `target`.
pub fn delta_v_and_time_to_match_planes_ascending(
    orbit: &Orbit,
    target: &Orbit,
    after: f64,
) -> Result<Burn, ManeuverError> {
    let t = orbit.time_of_ascending_node(target, after)?;
    plane_change_at(orbit, t, &target.normal())
}

/// Plane-matching burn at the next descending node relative to `target`.
pub fn delta_v_and_time_to_match_planes_descending(
    orbit: &Orbit,
    target: &Orbit,
    after: f64,
) -> Result<Burn, ManeuverError> {
    let t = orbit.time_of_descending_node(target, after)?;
    plane_change_at(orbit, t, &target.normal())
}

/// Burn that moves the longitude of the ascending node to `lan`, keeping the inclination.
///
/// The burn happens at whichever of the two intersections with the new plane is cheaper.
pub fn delta_v_and_time_to_shift_node_longitude(orbit: &Orbit, after: f64, lan: f64) -> Result<Burn, ManeuverError> {
    let inclination = orbit.inclination();
    if inclination.sin().abs() < 1e-9 {
        return Err(OrbitError::MissingReferenceNode.into());
    }
    let target_normal = [
        inclination.sin() * lan.sin(),
        -inclination.sin() * lan.cos(),
        inclination.cos(),
    ];
    let Some(line) = vector::normalize(&vector::cross(&orbit.normal(), &target_normal))
        .filter(|_| vector::angle_between(&orbit.normal(), &target_normal) > 1e-12)
    else {
        return Err(OrbitError::MissingReferenceNode.into());
    };

    let mut best: Option<Burn> = None;
    for direction in [line, vector::scale(&line, -1.0)] {
        let nu = orbit.true_anomaly_of_direction(&direction);
        let Ok(t) = orbit.time_of_true_anomaly(nu, after) else {
            continue;
        };
        if t < after {
            continue;
        }
        let burn = plane_change_at(orbit, t, &target_normal)?;
        if best.is_none_or(|current| burn.magnitude() < current.magnitude()) {
            best = Some(burn);
        }
    }
    best.ok_or_else(|| OrbitError::MissingReferenceNode.into())
}

/// Prograde/retrograde burn at `t` that sets the semi-major axis.
pub fn delta_v_for_semi_major_axis(orbit: &Orbit, t: f64, semi_major_axis: f64) -> Result<Vector3, ManeuverError> {
    let state = orbit.state_at(t)?;
    let r = state.radius();
    let speed_sq = orbit.mu() * (2.0 / r - 1.0 / semi_major_axis);
    if !(speed_sq >= 0.0) || semi_major_axis == 0.0 {
        return Err(ManeuverError::InvalidInput(format!(
            "semi-major axis {semi_major_axis} km is not reachable from radius {r} km"
        )));
    }
    let prograde = vector::normalize(&state.velocity)
        .ok_or_else(|| ManeuverError::InvalidInput("velocity vector has zero length".into()))?;
    Ok(vector::scale(&prograde, speed_sq.sqrt() - state.speed()))
}

/// Burn at `t` that makes the period `numerator / denominator` times the current one.
pub fn delta_v_for_resonant_orbit(
    orbit: &Orbit,
    t: f64,
    numerator: u32,
    denominator: u32,
) -> Result<Vector3, ManeuverError> {
    let Some(period) = orbit.period() else {
        return Err(ManeuverError::InvalidInput("resonant orbits need a closed orbit".into()));
    };
    if numerator == 0 || denominator == 0 {
        return Err(ManeuverError::InvalidInput("resonance ratio must be positive".into()));
    }
    let target_period = period * numerator as f64 / denominator as f64;
    let semi_major_axis = (orbit.mu() * (target_period / TAU).powi(2)).cbrt();
    delta_v_for_semi_major_axis(orbit, t, semi_major_axis)
}

/// Burn at `t` that matches the velocity of `target` at the same epoch.
pub fn delta_v_to_match_velocities(orbit: &Orbit, t: f64, target: &Orbit) -> Result<Vector3, ManeuverError> {
    Ok(vector::sub(&target.velocity_at(t)?, &orbit.velocity_at(t)?))
}
