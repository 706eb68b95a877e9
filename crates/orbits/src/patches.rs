//! Patched-conic trajectory stepping across sphere-of-influence boundaries.
//!
//! Starting from an orbit about some body, the stepper repeatedly finds the next SOI
//! transition: escape to the parent (solved analytically from the conic) or entry into a
//! child body's sphere (found by sampling the separation and refining with Brent). Each
//! transition re-expresses the state about the new central body and opens a new
//! [`Patch`].

use maneuver_core::vector;
use maneuver_core::{ErrorKind, StateVector};
use maneuver_numeric::{RootFinderSettings, find_root, minimize_scalar};
use thiserror::Error;
use tracing::debug;

use crate::OrbitError;
use crate::bodies::{BodyId, BodySystem, CelestialBody};
use crate::orbit::Orbit;

/// How a patch ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchTransition {
    /// Leaves the central body's sphere of influence into the parent's.
    Escape,
    /// Enters the sphere of influence of the given child body.
    Encounter(BodyId),
    /// Reached the end of the search horizon.
    EndOfWindow,
    /// No further transition is possible.
    Final,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub body: BodyId,
    pub orbit: Orbit,
    pub start_epoch: f64,
    pub end_epoch: f64,
    pub transition: PatchTransition,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchSettings {
    pub max_patches: usize,
    /// Separation samples per orbital period when scanning for encounters.
    pub samples_per_orbit: usize,
    /// Upper bound on separation samples per patch.
    pub max_samples: usize,
    pub root_finder: RootFinderSettings,
}

impl Default for PatchSettings {
    fn default() -> Self {
        Self {
            max_patches: 8,
            samples_per_orbit: 72,
            max_samples: 4_000,
            root_finder: RootFinderSettings {
                tolerance: 1e-3,
                max_iterations: 100,
                time_budget: None,
            },
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatchError {
    #[error("target body {target:?} was not reached within the search horizon")]
    SearchHorizonExceeded { target: BodyId },
    #[error("search horizon {horizon} precedes trajectory start {start}")]
    InvalidHorizon { start: f64, horizon: f64 },
    #[error(transparent)]
    Orbit(#[from] OrbitError),
}

impl PatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PatchError::SearchHorizonExceeded { .. } => ErrorKind::SearchHorizonExceeded,
            PatchError::InvalidHorizon { .. } => ErrorKind::InvalidInput,
            PatchError::Orbit(err) => err.kind(),
        }
    }
}

/// Predict the sequence of conic patches followed by `orbit` about `body` until
/// `horizon_end`.
///
/// Stepping stops when `target` (if given) is entered, when the horizon is reached, when
/// no transition is possible, or after `settings.max_patches` patches.
pub fn predict_patches(
    system: &BodySystem,
    body: BodyId,
    orbit: &Orbit,
    horizon_end: f64,
    target: Option<BodyId>,
    settings: &PatchSettings,
) -> Result<Vec<Patch>, PatchError> {
    let mut start = if orbit.start_time().is_finite() {
        orbit.start_time()
    } else {
        orbit.epoch()
    };
    if horizon_end < start {
        return Err(PatchError::InvalidHorizon {
            start,
            horizon: horizon_end,
        });
    }

    let mut patches = Vec::new();
    let mut central_id = body;
    let mut current = orbit.with_body(body);

    while patches.len() < settings.max_patches {
        let central = system.body(central_id)?;
        let escape = match (central.parent, central.soi_radius.is_finite()) {
            (Some(_), true) => current
                .next_time_at_radius_outbound(central.soi_radius, start)?
                .filter(|t| *t <= horizon_end),
            _ => None,
        };
        let search_end = escape.unwrap_or(horizon_end);
        let encounter = earliest_encounter(system, central_id, &current, start, search_end, settings)?;

        let (end, transition) = match (encounter, escape) {
            (Some((child, t)), _) => (t, PatchTransition::Encounter(child)),
            (None, Some(t)) => (t, PatchTransition::Escape),
            (None, None) => {
                let can_escape = central.parent.is_some()
                    && current
                        .next_time_at_radius_outbound(central.soi_radius, start)?
                        .is_some();
                if !can_escape && system.children(central_id).next().is_none() {
                    (f64::INFINITY, PatchTransition::Final)
                } else {
                    (horizon_end, PatchTransition::EndOfWindow)
                }
            }
        };

        debug!(body = central.name.as_str(), start, end, ?transition, "patch closed");
        patches.push(Patch {
            body: central_id,
            orbit: current.with_validity(start, end),
            start_epoch: start,
            end_epoch: end,
            transition,
        });

        match transition {
            PatchTransition::Encounter(child) => {
                if target == Some(child) {
                    break;
                }
                let child_body = system.body(child)?;
                let state = relative_state(&current, child_body, end, -1.0)?;
                current = Orbit::from_state(child_body.mu, &state)?.with_body(child);
                central_id = child;
                start = end;
            }
            PatchTransition::Escape => {
                let Some(parent) = central.parent else { break };
                let parent_mu = system.body(parent)?.mu;
                let state = relative_state(&current, central, end, 1.0)?;
                current = Orbit::from_state(parent_mu, &state)?.with_body(parent);
                central_id = parent;
                start = end;
            }
            PatchTransition::EndOfWindow | PatchTransition::Final => break,
        }
    }

    Ok(patches)
}

/// The first patch that ends by entering `target`'s sphere of influence.
pub fn first_encounter(patches: &[Patch], target: BodyId) -> Result<&Patch, PatchError> {
    patches
        .iter()
        .find(|patch| patch.transition == PatchTransition::Encounter(target))
        .ok_or(PatchError::SearchHorizonExceeded { target })
}

/// Vessel state at `t` shifted by `sign` times the body's state about its parent.
fn relative_state(vessel: &Orbit, body: &CelestialBody, t: f64, sign: f64) -> Result<StateVector, OrbitError> {
    let Some(body_orbit) = body.orbit.as_ref() else {
        return Err(OrbitError::InvalidInput(format!("body {} has no orbit", body.name)));
    };
    let vessel_state = vessel.state_at(t)?;
    let body_state = body_orbit.state_at(t)?;
    Ok(StateVector::new(
        vector::add(&vessel_state.position, &vector::scale(&body_state.position, sign)),
        vector::add(&vessel_state.velocity, &vector::scale(&body_state.velocity, sign)),
        t,
    ))
}

fn soi_margin(vessel: &Orbit, child_orbit: &Orbit, soi: f64, t: f64) -> Result<f64, OrbitError> {
    let separation = vector::sub(&vessel.position_at(t)?, &child_orbit.position_at(t)?);
    Ok(vector::norm(&separation) - soi)
}

fn earliest_encounter(
    system: &BodySystem,
    central: BodyId,
    vessel: &Orbit,
    start: f64,
    end: f64,
    settings: &PatchSettings,
) -> Result<Option<(BodyId, f64)>, OrbitError> {
    let span = end - start;
    if !(span > 0.0) || !span.is_finite() {
        return Ok(None);
    }
    let children: Vec<_> = system
        .children(central)
        .filter_map(|(id, body)| body.orbit.as_ref().map(|orbit| (id, orbit, body.soi_radius)))
        .collect();
    if children.is_empty() {
        return Ok(None);
    }

    let per_orbit = settings.samples_per_orbit.max(4) as f64;
    let step = children
        .iter()
        .filter_map(|(_, orbit, _)| orbit.period())
        .chain(vessel.period())
        .map(|period| period / per_orbit)
        .fold(span, f64::min);
    let count = ((span / step).ceil() as usize).clamp(2, settings.max_samples.max(2));
    let times: Vec<f64> = (0..=count)
        .map(|i| start + span * i as f64 / count as f64)
        .collect();

    let mut best: Option<(BodyId, f64)> = None;
    for (id, child_orbit, soi) in children {
        let margin = |t: f64| soi_margin(vessel, child_orbit, soi, t).unwrap_or(f64::NAN);
        let samples = times
            .iter()
            .map(|&t| soi_margin(vessel, child_orbit, soi, t))
            .collect::<Result<Vec<_>, _>>()?;

        let Some(crossing) = first_crossing(&times, &samples, margin, settings) else {
            continue;
        };
        if best.is_none_or(|(_, t)| crossing < t) {
            best = Some((id, crossing));
        }
    }
    Ok(best)
}

fn first_crossing<F>(times: &[f64], samples: &[f64], margin: F, settings: &PatchSettings) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    for i in 1..samples.len() {
        let (t0, t1) = (times[i - 1], times[i]);
        if samples[i - 1] > 0.0 && samples[i] <= 0.0 {
            return Some(find_root(&margin, t0, t1, &settings.root_finder).unwrap_or(t1));
        }
        // A grazing pass can dip inside the sphere between two samples.
        if i >= 2 && samples[i - 2] > samples[i - 1] && samples[i - 1] < samples[i] && samples[i - 1] > 0.0 {
            let left = times[i - 2];
            if let Ok((t_min, value)) = minimize_scalar(&margin, left, t1, 60) {
                if value <= 0.0 {
                    return Some(find_root(&margin, left, t_min, &settings.root_finder).unwrap_or(t_min));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::OrbitalElements;

    const MU_PARENT: f64 = 1.0e6;

    fn system() -> (BodySystem, BodyId, BodyId) {
        let mut system = BodySystem::new();
        let root = system.add_root("Primary", MU_PARENT, 500.0).unwrap();
        let moon_orbit = Orbit::from_elements(
            MU_PARENT,
            &OrbitalElements {
                semi_major_axis: 50_000.0,
                eccentricity: 0.0,
                inclination: 0.0,
                longitude_of_ascending_node: 0.0,
                argument_of_periapsis: 0.0,
                true_anomaly: 0.0,
            },
            0.0,
        )
        .unwrap();
        let moon = system
            .add_child("Moon", 1.0e4, 100.0, Some(5_000.0), root, moon_orbit)
            .unwrap();
        (system, root, moon)
    }

    #[test]
    fn hyperbolic_escape_from_moon_ends_with_escape() {
        let (system, _, moon) = system();
        let escape = Orbit::from_state(
            1.0e4,
            &StateVector::new([200.0, 0.0, 0.0], [0.0, 12.0, 0.0], 0.0),
        )
        .unwrap();
        let patches = predict_patches(&system, moon, &escape, 1.0e6, None, &PatchSettings::default()).unwrap();
        assert_eq!(patches[0].transition, PatchTransition::Escape);
        let exit = patches[0].end_epoch;
        let r = escape.position_at(exit).unwrap();
        assert!((vector::norm(&r) - 5_000.0).abs() < 1e-3);
        assert_eq!(patches[1].body, BodyId(0));
    }

    #[test]
    fn patch_count_never_exceeds_cap() {
        let (system, root, _) = system();
        let bounce = Orbit::from_elements(
            MU_PARENT,
            &OrbitalElements {
                semi_major_axis: 50_000.0,
                eccentricity: 0.2,
                inclination: 0.0,
                longitude_of_ascending_node: 0.0,
                argument_of_periapsis: 0.0,
                true_anomaly: 3.0,
            },
            0.0,
        )
        .unwrap();
        let settings = PatchSettings {
            max_patches: 2,
            ..PatchSettings::default()
        };
        let patches = predict_patches(&system, root, &bounce, 1.0e8, None, &settings).unwrap();
        assert!(patches.len() <= 2);
    }
}
