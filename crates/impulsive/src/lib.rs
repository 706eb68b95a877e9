//! Impulsive maneuver utilities: Lambert solver, analytic transfers, closed-form
//! maneuvers and the single-burn window/intercept solvers.

pub mod intercept;
pub mod lambert;
pub mod maneuvers;
pub mod transfers;

use maneuver_core::ErrorKind;
use maneuver_numeric::{LineSearchError, RootFindError};
use maneuver_orbits::OrbitError;
use thiserror::Error;

pub use intercept::{
    CourseCorrectionSettings, CourseTarget, HohmannWindow, InterceptPlan, WindowSearchSettings,
    cheapest_course_correction, direct_intercept, hohmann_window, interplanetary_ejection,
};
pub use lambert::{
    LambertBranch, LambertProblem, LambertSettings, LambertSolution, LambertSolverError,
    LambertTransfer, TransferPath, solve as lambert_solve, solve_all as lambert_solve_all,
};
pub use transfers::{HohmannResult, hohmann};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ManeuverError {
    #[error("invalid maneuver input: {0}")]
    InvalidInput(String),
    #[error("window search found no sign change of the phase error")]
    NoTransferWindowFound,
    #[error(transparent)]
    Orbit(#[from] OrbitError),
    #[error(transparent)]
    Lambert(#[from] LambertSolverError),
    #[error(transparent)]
    RootFind(#[from] RootFindError),
    #[error(transparent)]
    LineSearch(#[from] LineSearchError),
}

impl ManeuverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManeuverError::InvalidInput(_) => ErrorKind::InvalidInput,
            ManeuverError::NoTransferWindowFound => ErrorKind::NoTransferWindowFound,
            ManeuverError::Orbit(err) => err.kind(),
            ManeuverError::Lambert(err) => err.kind(),
            ManeuverError::RootFind(err) => err.kind(),
            ManeuverError::LineSearch(err) => err.kind(),
        }
    }
}
