//! Runtime form of a [`ScenarioConfig`]: a body tree plus the vessel and target orbits.

use maneuver_config::{BodyConfig, OrbitConfig, ScenarioConfig};
use maneuver_orbits::{BodyId, BodySystem, Orbit, OrbitalElements};
use tracing::debug;

use crate::TransferError;
use crate::facade::PlannerSettings;

#[derive(Debug, Clone)]
pub struct Scenario {
    pub system: BodySystem,
    pub vessel_body: BodyId,
    pub vessel: Orbit,
    pub target_body: BodyId,
    pub target: Orbit,
    pub epoch: f64,
    pub settings: PlannerSettings,
}

impl Scenario {
    /// Build the body tree parents-first, then place the vessel and target orbits.
    pub fn from_config(config: &ScenarioConfig) -> Result<Self, TransferError> {
        let system = build_system(&config.bodies, config.epoch)?;
        let (vessel_body, vessel) = place(&system, &config.vessel.body, &config.vessel.orbit, config.epoch)?;
        let (target_body, target) = place(&system, &config.target.body, &config.target.orbit, config.epoch)?;
        debug!(bodies = system.len(), ?vessel_body, ?target_body, "scenario built");
        Ok(Self {
            system,
            vessel_body,
            vessel,
            target_body,
            target,
            epoch: config.epoch,
            settings: PlannerSettings::from_config(&config.planner),
        })
    }

    pub fn body_name(&self, id: BodyId) -> &str {
        self.system.get(id).map(|body| body.name.as_str()).unwrap_or("?")
    }
}

/// Convert degree-based configured elements into an [`Orbit`] about a body with `mu`.
pub fn orbit_from_config(mu: f64, config: &OrbitConfig, default_epoch: f64) -> Result<Orbit, TransferError> {
    let elements = config.elements_rad();
    let orbit = Orbit::from_elements(
        mu,
        &OrbitalElements {
            semi_major_axis: elements.semi_major_axis,
            eccentricity: elements.eccentricity,
            inclination: elements.inclination,
            longitude_of_ascending_node: elements.longitude_of_ascending_node,
            argument_of_periapsis: elements.argument_of_periapsis,
            true_anomaly: elements.true_anomaly,
        },
        config.epoch.unwrap_or(default_epoch),
    )?;
    Ok(orbit)
}

fn build_system(bodies: &[BodyConfig], epoch: f64) -> Result<BodySystem, TransferError> {
    let mut system = BodySystem::new();
    let mut pending: Vec<&BodyConfig> = bodies.iter().collect();
    while !pending.is_empty() {
        let before = pending.len();
        let mut deferred = Vec::new();
        for body in pending {
            match &body.parent {
                None => {
                    system.add_root(body.name.clone(), body.mu_km3_s2, body.radius_km)?;
                }
                Some(parent_name) => {
                    let Some(parent) = system.find(parent_name) else {
                        deferred.push(body);
                        continue;
                    };
                    let Some(orbit_config) = &body.orbit else {
                        return Err(TransferError::InvalidInput(format!(
                            "body '{}' has a parent but no orbit",
                            body.name
                        )));
                    };
                    let orbit = orbit_from_config(system.body(parent)?.mu, orbit_config, epoch)?;
                    system.add_child(
                        body.name.clone(),
                        body.mu_km3_s2,
                        body.radius_km,
                        body.soi_radius_km,
                        parent,
                        orbit,
                    )?;
                }
            }
        }
        if deferred.len() == before {
            let names: Vec<&str> = deferred.iter().map(|body| body.name.as_str()).collect();
            return Err(TransferError::InvalidInput(format!(
                "bodies with unresolved parents: {}",
                names.join(", ")
            )));
        }
        pending = deferred;
    }
    Ok(system)
}

fn place(system: &BodySystem, name: &str, orbit: &OrbitConfig, epoch: f64) -> Result<(BodyId, Orbit), TransferError> {
    let id = system
        .find(name)
        .ok_or_else(|| TransferError::InvalidInput(format!("unknown body '{name}'")))?;
    let orbit = orbit_from_config(system.body(id)?.mu, orbit, epoch)?.with_body(id);
    Ok((id, orbit))
}
