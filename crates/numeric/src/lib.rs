//! Numerical building blocks shared by the window searches and transfer optimizers.
//!
//! Everything here takes the function under study as a closure so callers can capture
//! their own orbits and settings without global dispatch.

pub mod brent;
pub mod levenberg;
pub mod line_search;

pub use brent::{RootFindError, RootFinderSettings, find_root};
pub use levenberg::{
    Bounds, LevenbergMarquardtSettings, LinearConstraint, Minimization, OptimizerError,
    Termination, minimize,
};
pub use line_search::{LineSearchError, minimize_scalar};
