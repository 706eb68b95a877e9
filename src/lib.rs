//! Impulsive orbital maneuver planning.
//!
//! The workspace crates are re-exported here under short names so front-ends and
//! integration tests depend on a single package.

pub use maneuver_config as config;
pub use maneuver_core as common;
pub use maneuver_export as export;
pub use maneuver_impulsive as impulsive;
pub use maneuver_numeric as numeric;
pub use maneuver_orbits as orbits;
pub use maneuver_transfer as transfer;

pub use maneuver_core::{Burn, ErrorKind, StateVector, Vector3};

/// Returns the version of the library for smoke tests.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
