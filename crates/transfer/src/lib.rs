//! Transfer crate: two-burn optimisation, annealed global search and the planning
//! façade that ties them to orbits, body catalogs and configuration.

pub mod annealing;
pub mod optimizer;
pub mod scenario;

use maneuver_core::ErrorKind;
use maneuver_impulsive::{LambertSolverError, ManeuverError};
use maneuver_numeric::OptimizerError;
use maneuver_orbits::{OrbitError, PatchError};
use thiserror::Error;

pub use annealing::{
    Annealer, AnnealingSettings, SearchOutcome, TransferCandidate, TransferConstraints, global_search,
};
pub use facade::*;
pub use maneuver_impulsive as impulsive;
pub use optimizer::{
    OptimizedTransfer, OptimizerSettings, TransferBounds, TransferEvaluation, TransferMode, TransferProblem,
    optimize,
};
pub use scenario::Scenario;

mod facade;

/// Errors surfaced by transfer planning.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransferError {
    #[error("invalid transfer input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Optimizer(#[from] OptimizerError),
    #[error(transparent)]
    Orbit(#[from] OrbitError),
    #[error(transparent)]
    Lambert(#[from] LambertSolverError),
    #[error(transparent)]
    Maneuver(#[from] ManeuverError),
    #[error(transparent)]
    Patch(#[from] PatchError),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransferError::InvalidInput(_) => ErrorKind::InvalidInput,
            TransferError::Optimizer(err) => err.kind(),
            TransferError::Orbit(err) => err.kind(),
            TransferError::Lambert(err) => err.kind(),
            TransferError::Maneuver(err) => err.kind(),
            TransferError::Patch(err) => err.kind(),
        }
    }
}
