//! Celestial body catalog arranged as a sphere-of-influence hierarchy.

use serde::{Deserialize, Serialize};

use crate::OrbitError;
use crate::orbit::Orbit;

/// Index of a body inside a [`BodySystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub usize);

#[derive(Debug, Clone)]
pub struct CelestialBody {
    pub name: String,
    pub mu: f64,
    pub radius: f64,
    /// Infinite for the root of the hierarchy.
    pub soi_radius: f64,
    pub parent: Option<BodyId>,
    /// Orbit about the parent body; `None` for the root.
    pub orbit: Option<Orbit>,
}

/// Laplace sphere-of-influence radius `a·(μ/μ_parent)^(2/5)`.
pub fn laplace_soi_radius(semi_major_axis: f64, mu: f64, parent_mu: f64) -> f64 {
    semi_major_axis.abs() * (mu / parent_mu).powf(0.4)
}

#[derive(Debug, Clone, Default)]
pub struct BodySystem {
    bodies: Vec<CelestialBody>,
}

impl BodySystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a body with no parent; its sphere of influence is unbounded.
    pub fn add_root(&mut self, name: impl Into<String>, mu: f64, radius: f64) -> Result<BodyId, OrbitError> {
        validate_body(mu, radius)?;
        let id = BodyId(self.bodies.len());
        self.bodies.push(CelestialBody {
            name: name.into(),
            mu,
            radius,
            soi_radius: f64::INFINITY,
            parent: None,
            orbit: None,
        });
        Ok(id)
    }

    /// Add a body orbiting `parent`. The SOI radius defaults to the Laplace radius.
    pub fn add_child(
        &mut self,
        name: impl Into<String>,
        mu: f64,
        radius: f64,
        soi_radius: Option<f64>,
        parent: BodyId,
        orbit: Orbit,
    ) -> Result<BodyId, OrbitError> {
        validate_body(mu, radius)?;
        let parent_mu = self.body(parent)?.mu;
        if (orbit.mu() - parent_mu).abs() > 1e-9 * parent_mu {
            return Err(OrbitError::InvalidInput(format!(
                "orbit gravitational parameter {} does not match parent {}",
                orbit.mu(),
                parent_mu
            )));
        }
        let soi_radius = match soi_radius {
            Some(value) if value > radius => value,
            Some(value) => {
                return Err(OrbitError::InvalidInput(format!(
                    "sphere of influence {value} km lies inside the body radius {radius} km"
                )));
            }
            None => laplace_soi_radius(orbit.semi_major_axis(), mu, parent_mu),
        };
        let id = BodyId(self.bodies.len());
        self.bodies.push(CelestialBody {
            name: name.into(),
            mu,
            radius,
            soi_radius,
            parent: Some(parent),
            orbit: Some(orbit.with_body(parent)),
        });
        Ok(id)
    }

    pub fn get(&self, id: BodyId) -> Option<&CelestialBody> {
        self.bodies.get(id.0)
    }

    pub fn body(&self, id: BodyId) -> Result<&CelestialBody, OrbitError> {
        self.get(id)
            .ok_or_else(|| OrbitError::InvalidInput(format!("unknown body id {}", id.0)))
    }

    /// Look a body up by name, ignoring ASCII case.
    pub fn find(&self, name: &str) -> Option<BodyId> {
        self.bodies
            .iter()
            .position(|body| body.name.eq_ignore_ascii_case(name))
            .map(BodyId)
    }

    pub fn children(&self, id: BodyId) -> impl Iterator<Item = (BodyId, &CelestialBody)> {
        self.bodies
            .iter()
            .enumerate()
            .filter(move |(_, body)| body.parent == Some(id))
            .map(|(index, body)| (BodyId(index), body))
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }
}

fn validate_body(mu: f64, radius: f64) -> Result<(), OrbitError> {
    if !(mu > 0.0) || !mu.is_finite() {
        return Err(OrbitError::InvalidInput(format!(
            "gravitational parameter must be positive, got {mu}"
        )));
    }
    if !(radius >= 0.0) || !radius.is_finite() {
        return Err(OrbitError::InvalidInput(format!("invalid body radius {radius}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::OrbitalElements;
    use maneuver_core::constants::{AU_KM, MU_EARTH, MU_SUN};

    #[test]
    fn earth_soi_defaults_to_laplace_radius() {
        let mut system = BodySystem::new();
        let sun = system.add_root("Sun", MU_SUN, 695_700.0).unwrap();
        let orbit = Orbit::from_elements(
            MU_SUN,
            &OrbitalElements {
                semi_major_axis: AU_KM,
                eccentricity: 0.0167,
                inclination: 0.0,
                longitude_of_ascending_node: 0.0,
                argument_of_periapsis: 0.0,
                true_anomaly: 0.0,
            },
            0.0,
        )
        .unwrap();
        let earth = system
            .add_child("Earth", MU_EARTH, 6_378.0, None, sun, orbit)
            .unwrap();
        let soi = system.body(earth).unwrap().soi_radius;
        assert!((soi - 924_000.0).abs() < 5_000.0, "soi = {soi}");
        assert_eq!(system.find("earth"), Some(earth));
        assert_eq!(system.children(sun).count(), 1);
    }
}
