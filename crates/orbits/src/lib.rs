//! Two-body conics and their patched-conic composition.
//!
//! - [`kepler`]: universal-variable state propagation.
//! - [`orbit`]: the [`Orbit`] value type and its element/epoch queries.
//! - [`bodies`]: a catalog of celestial bodies arranged as a sphere-of-influence tree.
//! - [`patches`]: the patched-conic stepper that walks a trajectory across SOI boundaries.

pub mod bodies;
pub mod kepler;
pub mod orbit;
pub mod patches;

use maneuver_core::ErrorKind;
use thiserror::Error;

pub use bodies::{BodyId, BodySystem, CelestialBody, laplace_soi_radius};
pub use kepler::{PropagatorSettings, propagate, propagate_with};
pub use orbit::{Orbit, OrbitalElements};
pub use patches::{Patch, PatchError, PatchSettings, PatchTransition, first_encounter, predict_patches};

/// Errors raised by conic propagation and orbit queries.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrbitError {
    #[error("invalid orbit input: {0}")]
    InvalidInput(String),
    #[error("conic propagation did not converge after {iterations} iterations")]
    PropagationDidNotConverge { iterations: usize },
    #[error("the requested node does not exist for this orbit geometry")]
    MissingReferenceNode,
}

impl OrbitError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrbitError::InvalidInput(_) => ErrorKind::InvalidInput,
            OrbitError::PropagationDidNotConverge { .. } => ErrorKind::NoConvergence,
            OrbitError::MissingReferenceNode => ErrorKind::MissingReferenceNode,
        }
    }
}
