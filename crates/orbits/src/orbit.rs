//! Value-typed Keplerian orbit derived from a reference state vector.
//!
//! An [`Orbit`] keeps the state it was built from together with the classical elements
//! derived from it. Every query that needs a position at another epoch goes through the
//! universal-variable propagator, so elliptic, parabolic and hyperbolic orbits share one
//! code path. Orbits are never mutated; applying a burn yields a new value.

use std::f64::consts::{PI, TAU};

use maneuver_core::angles::wrap_two_pi;
use maneuver_core::vector::{self, Vector3};
use maneuver_core::{Burn, StateVector};
use serde::{Deserialize, Serialize};

use crate::OrbitError;
use crate::bodies::BodyId;
use crate::kepler;

/// Eccentricity below which the periapsis direction is taken from the node line.
const CIRCULAR_TOLERANCE: f64 = 1e-10;
/// Band around `e = 1` treated as exactly parabolic.
const PARABOLIC_TOLERANCE: f64 = 1e-10;

/// Classical elements. Angles in radians, semi-major axis in km (negative for hyperbolae).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitalElements {
    pub semi_major_axis: f64,
    pub eccentricity: f64,
    pub inclination: f64,
    pub longitude_of_ascending_node: f64,
    pub argument_of_periapsis: f64,
    pub true_anomaly: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    mu: f64,
    reference: StateVector,
    semi_major_axis: f64,
    eccentricity: f64,
    semi_latus_rectum: f64,
    inclination: f64,
    longitude_of_ascending_node: f64,
    argument_of_periapsis: f64,
    true_anomaly_at_epoch: f64,
    periapsis_direction: Vector3,
    normal: Vector3,
    time_of_periapsis: f64,
    start_time: f64,
    end_time: f64,
    body: Option<BodyId>,
}

impl Orbit {
    /// Derive an orbit from a state vector about a body with gravitational parameter `mu`.
    pub fn from_state(mu: f64, state: &StateVector) -> Result<Self, OrbitError> {
        if !(mu > 0.0) || !mu.is_finite() {
            return Err(OrbitError::InvalidInput(format!(
                "gravitational parameter must be positive, got {mu}"
            )));
        }
        if !vector::is_finite(&state.position)
            || !vector::is_finite(&state.velocity)
            || !state.epoch.is_finite()
        {
            return Err(OrbitError::InvalidInput("non-finite state vector".into()));
        }
        let r = state.radius();
        if r == 0.0 {
            return Err(OrbitError::InvalidInput("position vector has zero length".into()));
        }
        let h = state.angular_momentum();
        let h_norm = vector::norm(&h);
        let Some(normal) = vector::normalize(&h) else {
            return Err(OrbitError::InvalidInput("rectilinear trajectories have no orbital plane".into()));
        };

        let v_sq = vector::dot(&state.velocity, &state.velocity);
        let r_dot_v = vector::dot(&state.position, &state.velocity);
        let e_vec = vector::scale(
            &vector::sub(
                &vector::scale(&state.position, v_sq - mu / r),
                &vector::scale(&state.velocity, r_dot_v),
            ),
            1.0 / mu,
        );
        let eccentricity = vector::norm(&e_vec);
        let semi_latus_rectum = h_norm * h_norm / mu;
        let semi_major_axis = if (eccentricity - 1.0).abs() < PARABOLIC_TOLERANCE {
            f64::INFINITY
        } else {
            semi_latus_rectum / (1.0 - eccentricity * eccentricity)
        };

        let inclination = (h[2] / h_norm).clamp(-1.0, 1.0).acos();
        let node = vector::cross(&vector::UNIT_Z, &h);
        let (node_direction, longitude_of_ascending_node) =
            match vector::normalize(&node).filter(|_| vector::norm(&node) > 1e-12 * h_norm) {
                Some(direction) => (direction, wrap_two_pi(direction[1].atan2(direction[0]))),
                None => ([1.0, 0.0, 0.0], 0.0),
            };

        let periapsis_direction = if eccentricity > CIRCULAR_TOLERANCE {
            vector::scale(&e_vec, 1.0 / eccentricity)
        } else {
            node_direction
        };
        let argument_of_periapsis =
            wrap_two_pi(vector::signed_angle(&node_direction, &periapsis_direction, &normal));

        let q = vector::cross(&normal, &periapsis_direction);
        let true_anomaly_at_epoch = vector::dot(&state.position, &q)
            .atan2(vector::dot(&state.position, &periapsis_direction));

        let mut orbit = Self {
            mu,
            reference: *state,
            semi_major_axis,
            eccentricity,
            semi_latus_rectum,
            inclination,
            longitude_of_ascending_node,
            argument_of_periapsis,
            true_anomaly_at_epoch,
            periapsis_direction,
            normal,
            time_of_periapsis: 0.0,
            start_time: f64::NEG_INFINITY,
            end_time: f64::INFINITY,
            body: None,
        };
        orbit.time_of_periapsis = state.epoch - orbit.time_since_periapsis(true_anomaly_at_epoch);
        Ok(orbit)
    }

    /// Build an orbit from classical elements at `epoch`.
    ///
    /// Exactly parabolic orbits have no finite semi-major axis and must be built with
    /// [`Orbit::from_state`].
    pub fn from_elements(mu: f64, elements: &OrbitalElements, epoch: f64) -> Result<Self, OrbitError> {
        let OrbitalElements {
            semi_major_axis: a,
            eccentricity: e,
            inclination,
            longitude_of_ascending_node: raan,
            argument_of_periapsis: argp,
            true_anomaly: nu,
        } = *elements;

        if !(e >= 0.0) || !a.is_finite() || a == 0.0 {
            return Err(OrbitError::InvalidInput(format!(
                "unsupported element set a = {a}, e = {e}"
            )));
        }
        if (e - 1.0).abs() < PARABOLIC_TOLERANCE {
            return Err(OrbitError::InvalidInput(
                "parabolic orbits must be built from a state vector".into(),
            ));
        }
        if (e < 1.0) != (a > 0.0) {
            return Err(OrbitError::InvalidInput(
                "semi-major axis sign does not match eccentricity".into(),
            ));
        }

        let p = a * (1.0 - e * e);
        let denominator = 1.0 + e * nu.cos();
        if denominator <= 0.0 {
            return Err(OrbitError::InvalidInput(
                "true anomaly lies beyond the hyperbolic asymptote".into(),
            ));
        }
        let r = p / denominator;
        let speed_factor = (mu / p).sqrt();
        let position_pf = [r * nu.cos(), r * nu.sin(), 0.0];
        let velocity_pf = [-speed_factor * nu.sin(), speed_factor * (e + nu.cos()), 0.0];

        let (sin_o, cos_o) = raan.sin_cos();
        let (sin_i, cos_i) = inclination.sin_cos();
        let (sin_w, cos_w) = argp.sin_cos();
        let rotation = [
            [cos_o * cos_w - sin_o * sin_w * cos_i, -cos_o * sin_w - sin_o * cos_w * cos_i, sin_o * sin_i],
            [sin_o * cos_w + cos_o * sin_w * cos_i, -sin_o * sin_w + cos_o * cos_w * cos_i, -cos_o * sin_i],
            [sin_w * sin_i, cos_w * sin_i, cos_i],
        ];
        let rotate = |v: &Vector3| -> Vector3 {
            [
                vector::dot(&rotation[0], v),
                vector::dot(&rotation[1], v),
                vector::dot(&rotation[2], v),
            ]
        };

        Self::from_state(
            mu,
            &StateVector::new(rotate(&position_pf), rotate(&velocity_pf), epoch),
        )
    }

    /// Restrict the orbit to `[start, end)`, e.g. between two SOI transitions.
    pub fn with_validity(mut self, start: f64, end: f64) -> Self {
        self.start_time = start;
        self.end_time = end;
        self
    }

    pub fn with_body(mut self, body: BodyId) -> Self {
        self.body = Some(body);
        self
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// The state this orbit was derived from.
    pub fn reference_state(&self) -> &StateVector {
        &self.reference
    }

    pub fn epoch(&self) -> f64 {
        self.reference.epoch
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    pub fn body(&self) -> Option<BodyId> {
        self.body
    }

    pub fn semi_major_axis(&self) -> f64 {
        self.semi_major_axis
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity
    }

    pub fn semi_latus_rectum(&self) -> f64 {
        self.semi_latus_rectum
    }

    pub fn inclination(&self) -> f64 {
        self.inclination
    }

    pub fn longitude_of_ascending_node(&self) -> f64 {
        self.longitude_of_ascending_node
    }

    pub fn argument_of_periapsis(&self) -> f64 {
        self.argument_of_periapsis
    }

    pub fn time_of_periapsis(&self) -> f64 {
        self.time_of_periapsis
    }

    /// Unit orbit normal (direction of `r × v`).
    pub fn normal(&self) -> Vector3 {
        self.normal
    }

    pub fn periapsis_direction(&self) -> Vector3 {
        self.periapsis_direction
    }

    pub fn elements(&self) -> OrbitalElements {
        OrbitalElements {
            semi_major_axis: self.semi_major_axis,
            eccentricity: self.eccentricity,
            inclination: self.inclination,
            longitude_of_ascending_node: self.longitude_of_ascending_node,
            argument_of_periapsis: self.argument_of_periapsis,
            true_anomaly: wrap_two_pi(self.true_anomaly_at_epoch),
        }
    }

    pub fn is_elliptic(&self) -> bool {
        self.eccentricity < 1.0 - PARABOLIC_TOLERANCE
    }

    pub fn is_hyperbolic(&self) -> bool {
        self.eccentricity > 1.0 + PARABOLIC_TOLERANCE
    }

    pub fn periapsis(&self) -> f64 {
        self.semi_latus_rectum / (1.0 + self.eccentricity)
    }

    /// Apoapsis radius; `None` for open orbits.
    pub fn apoapsis(&self) -> Option<f64> {
        self.is_elliptic()
            .then(|| self.semi_latus_rectum / (1.0 - self.eccentricity))
    }

    pub fn period(&self) -> Option<f64> {
        self.is_elliptic()
            .then(|| TAU * (self.semi_major_axis.powi(3) / self.mu).sqrt())
    }

    /// Mean motion in rad/s. Parabolic orbits use the Barker normalisation `2·√(μ/p³)`.
    pub fn mean_motion(&self) -> f64 {
        if self.semi_major_axis.is_finite() {
            (self.mu / self.semi_major_axis.abs().powi(3)).sqrt()
        } else {
            2.0 * (self.mu / self.semi_latus_rectum.powi(3)).sqrt()
        }
    }

    /// Speed at radius `r` from the vis-viva equation.
    pub fn speed_at_radius(&self, r: f64) -> f64 {
        let inverse_a = if self.semi_major_axis.is_finite() {
            1.0 / self.semi_major_axis
        } else {
            0.0
        };
        (self.mu * (2.0 / r - inverse_a)).max(0.0).sqrt()
    }

    pub fn state_at(&self, t: f64) -> Result<StateVector, OrbitError> {
        if t == self.reference.epoch {
            return Ok(self.reference);
        }
        let (position, velocity) = kepler::propagate(
            self.mu,
            t - self.reference.epoch,
            &self.reference.position,
            &self.reference.velocity,
        )?;
        Ok(StateVector::new(position, velocity, t))
    }

    pub fn position_at(&self, t: f64) -> Result<Vector3, OrbitError> {
        Ok(self.state_at(t)?.position)
    }

    pub fn velocity_at(&self, t: f64) -> Result<Vector3, OrbitError> {
        Ok(self.state_at(t)?.velocity)
    }

    pub fn true_anomaly_at(&self, t: f64) -> Result<f64, OrbitError> {
        Ok(self.true_anomaly_of_direction(&self.position_at(t)?))
    }

    /// True anomaly of the in-plane projection of `direction`, in `(-π, π]`.
    pub fn true_anomaly_of_direction(&self, direction: &Vector3) -> f64 {
        let q = vector::cross(&self.normal, &self.periapsis_direction);
        vector::dot(direction, &q).atan2(vector::dot(direction, &self.periapsis_direction))
    }

    /// Unit vector from the focus towards true anomaly `nu`.
    pub fn direction_at_true_anomaly(&self, nu: f64) -> Vector3 {
        let q = vector::cross(&self.normal, &self.periapsis_direction);
        vector::add(
            &vector::scale(&self.periapsis_direction, nu.cos()),
            &vector::scale(&q, nu.sin()),
        )
    }

    /// Orbital radius at true anomaly `nu`; `None` beyond a hyperbola's asymptotes.
    pub fn radius_at_true_anomaly(&self, nu: f64) -> Option<f64> {
        let denominator = 1.0 + self.eccentricity * nu.cos();
        (denominator > 1e-12).then(|| self.semi_latus_rectum / denominator)
    }

    /// First epoch at or after `after` at which the orbit passes true anomaly `nu`.
    ///
    /// Open orbits pass each anomaly once; if that pass lies before `after` the epoch
    /// returned is still the single pass, which callers compare against `after`.
    pub fn time_of_true_anomaly(&self, nu: f64, after: f64) -> Result<f64, OrbitError> {
        if self.radius_at_true_anomaly(nu).is_none() {
            return Err(OrbitError::InvalidInput(format!(
                "true anomaly {nu} is not reached by an open orbit with e = {}",
                self.eccentricity
            )));
        }
        let t = self.time_of_periapsis + self.time_since_periapsis(nu);
        Ok(match self.period() {
            Some(period) => after + (t - after).rem_euclid(period),
            None => t,
        })
    }

    pub fn next_periapsis_time(&self, after: f64) -> Result<f64, OrbitError> {
        self.time_of_true_anomaly(0.0, after)
    }

    pub fn next_apoapsis_time(&self, after: f64) -> Option<f64> {
        self.is_elliptic()
            .then(|| self.time_of_true_anomaly(PI, after).ok())
            .flatten()
    }

    /// Direction of the ascending node of this orbit relative to `other`'s plane.
    pub fn ascending_node_direction(&self, other: &Orbit) -> Result<Vector3, OrbitError> {
        let line = vector::cross(&other.normal, &self.normal);
        if vector::norm(&line) < 1e-12 {
            return Err(OrbitError::MissingReferenceNode);
        }
        vector::normalize(&line).ok_or(OrbitError::MissingReferenceNode)
    }

    pub fn time_of_ascending_node(&self, other: &Orbit, after: f64) -> Result<f64, OrbitError> {
        let direction = self.ascending_node_direction(other)?;
        self.time_of_node(&direction, after)
    }

    pub fn time_of_descending_node(&self, other: &Orbit, after: f64) -> Result<f64, OrbitError> {
        let direction = vector::scale(&self.ascending_node_direction(other)?, -1.0);
        self.time_of_node(&direction, after)
    }

    fn time_of_node(&self, direction: &Vector3, after: f64) -> Result<f64, OrbitError> {
        let nu = self.true_anomaly_of_direction(direction);
        if self.radius_at_true_anomaly(nu).is_none() {
            return Err(OrbitError::MissingReferenceNode);
        }
        let t = self.time_of_true_anomaly(nu, after)?;
        if t < after {
            return Err(OrbitError::MissingReferenceNode);
        }
        Ok(t)
    }

    /// Angle between the two orbit normals, in `[0, π]`.
    pub fn relative_inclination(&self, other: &Orbit) -> f64 {
        vector::angle_between(&self.normal, &other.normal)
    }

    /// Time between successive alignments with `other`; `None` for open or equal-period orbits.
    pub fn synodic_period(&self, other: &Orbit) -> Option<f64> {
        let (p1, p2) = (self.period()?, other.period()?);
        let rate = (1.0 / p1 - 1.0 / p2).abs();
        (rate > 1e-15).then(|| 1.0 / rate)
    }

    /// First epoch at or after `after` when the orbit crosses `radius` moving outward.
    ///
    /// Returns `Some(after)` when the orbit is already outside `radius` and receding, and
    /// `None` when the orbit never reaches `radius`.
    pub fn next_time_at_radius_outbound(&self, radius: f64, after: f64) -> Result<Option<f64>, OrbitError> {
        if self.apoapsis().is_some_and(|apoapsis| apoapsis < radius) {
            return Ok(None);
        }
        let state = self.state_at(after)?;
        let receding = vector::dot(&state.position, &state.velocity) >= 0.0;
        if state.radius() >= radius && (receding || self.periapsis() >= radius) {
            return Ok(Some(after));
        }
        if self.eccentricity < CIRCULAR_TOLERANCE {
            return Ok(None);
        }
        let cos_nu = (self.semi_latus_rectum / radius - 1.0) / self.eccentricity;
        let nu = cos_nu.clamp(-1.0, 1.0).acos();
        let t = self.time_of_true_anomaly(nu, after)?;
        Ok(Some(t.max(after)))
    }

    /// The orbit that results from applying `burn` at its epoch.
    pub fn after_burn(&self, burn: &Burn) -> Result<Orbit, OrbitError> {
        let state = self.state_at(burn.epoch)?.with_delta_v(&burn.delta_v);
        let mut orbit = Orbit::from_state(self.mu, &state)?.with_validity(burn.epoch, f64::INFINITY);
        orbit.body = self.body;
        Ok(orbit)
    }

    /// Time from periapsis to true anomaly `nu`; in `[0, P)` for closed orbits.
    fn time_since_periapsis(&self, nu: f64) -> f64 {
        let e = self.eccentricity;
        let half = 0.5 * nu;
        if self.is_elliptic() {
            let eccentric =
                2.0 * ((1.0 - e).sqrt() * half.sin()).atan2((1.0 + e).sqrt() * half.cos());
            let mean = wrap_two_pi(eccentric - e * eccentric.sin());
            mean / self.mean_motion()
        } else if self.is_hyperbolic() {
            let hyperbolic = 2.0 * (((e - 1.0) / (e + 1.0)).sqrt() * half.tan()).atanh();
            (e * hyperbolic.sinh() - hyperbolic) / self.mean_motion()
        } else {
            let d = half.tan();
            0.5 * (self.semi_latus_rectum.powi(3) / self.mu).sqrt() * (d + d.powi(3) / 3.0)
        }
    }
}
