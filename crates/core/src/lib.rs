//! Core units, constants, and shared primitives for the maneuver planner workspace.

/// Physical constants expressed in kilometre/second units (unless stated otherwise).
pub mod constants {
    /// Earth gravitational parameter (km³/s²).
    pub const MU_EARTH: f64 = 398_600.441_8;
    /// Sun gravitational parameter (km³/s²).
    pub const MU_SUN: f64 = 1.327_124_400_18e11;
    /// Kilometres per astronomical unit.
    pub const AU_KM: f64 = 149_597_870.7;
    /// Seconds per Julian day.
    pub const SECONDS_PER_DAY: f64 = 86_400.0;
}

/// Lightweight time utilities shared across crates.
pub mod time {
    use super::constants::SECONDS_PER_DAY;

    /// Convert days to seconds.
    #[inline]
    pub fn days_to_seconds(days: f64) -> f64 {
        days * SECONDS_PER_DAY
    }
}

/// Angle wrapping helpers.
pub mod angles {
    use std::f64::consts::{PI, TAU};

    /// Wrap an angle into `[0, 2π)`.
    #[inline]
    pub fn wrap_two_pi(angle: f64) -> f64 {
        let wrapped = angle.rem_euclid(TAU);
        if wrapped >= TAU { 0.0 } else { wrapped }
    }

    /// Wrap an angle into `(-π, π]`.
    #[inline]
    pub fn wrap_pi(angle: f64) -> f64 {
        let wrapped = wrap_two_pi(angle);
        if wrapped > PI { wrapped - TAU } else { wrapped }
    }
}

/// Minimal vector helpers to avoid ad-hoc `[f64; 3]` math everywhere.
pub mod vector {
    /// Alias for a 3D vector in kilometres or km/s depending on context.
    pub type Vector3 = [f64; 3];

    /// The zero vector.
    pub const ZERO: Vector3 = [0.0, 0.0, 0.0];
    /// Unit vector along the reference pole.
    pub const UNIT_Z: Vector3 = [0.0, 0.0, 1.0];

    /// Euclidean norm of a vector.
    #[inline]
    pub fn norm(v: &Vector3) -> f64 {
        dot(v, v).sqrt()
    }

    /// Dot product of two vectors.
    #[inline]
    pub fn dot(a: &Vector3, b: &Vector3) -> f64 {
        a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
    }

    /// Right-handed cross product.
    #[inline]
    pub fn cross(a: &Vector3, b: &Vector3) -> Vector3 {
        [
            a[1] * b[2] - a[2] * b[1],
            a[2] * b[0] - a[0] * b[2],
            a[0] * b[1] - a[1] * b[0],
        ]
    }

    /// Vector addition.
    #[inline]
    pub fn add(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
    }

    /// Vector subtraction.
    #[inline]
    pub fn sub(a: &Vector3, b: &Vector3) -> Vector3 {
        [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
    }

    /// Scale a vector by a scalar.
    #[inline]
    pub fn scale(v: &Vector3, s: f64) -> Vector3 {
        [v[0] * s, v[1] * s, v[2] * s]
    }

    /// Unit vector in the direction of `v`, or `None` for a (near) zero vector.
    #[inline]
    pub fn normalize(v: &Vector3) -> Option<Vector3> {
        let n = norm(v);
        if n > f64::MIN_POSITIVE && n.is_finite() {
            Some(scale(v, 1.0 / n))
        } else {
            None
        }
    }

    /// Component of `v` perpendicular to `axis`.
    pub fn reject(v: &Vector3, axis: &Vector3) -> Vector3 {
        let axis_sq = dot(axis, axis);
        if axis_sq == 0.0 {
            return *v;
        }
        sub(v, &scale(axis, dot(v, axis) / axis_sq))
    }

    /// Unsigned angle between two vectors in `[0, π]`.
    pub fn angle_between(a: &Vector3, b: &Vector3) -> f64 {
        norm(&cross(a, b)).atan2(dot(a, b))
    }

    /// Angle from `a` to `b` measured counter-clockwise about `axis`, in `(-π, π]`.
    ///
    /// Both vectors are projected onto the plane normal to `axis` first.
    pub fn signed_angle(a: &Vector3, b: &Vector3, axis: &Vector3) -> f64 {
        let a = reject(a, axis);
        let b = reject(b, axis);
        let Some(k) = normalize(axis) else {
            return angle_between(&a, &b);
        };
        dot(&cross(&a, &b), &k).atan2(dot(&a, &b))
    }

    /// Rotate `v` by `angle` radians about `axis` (Rodrigues' formula).
    pub fn rotate_about(v: &Vector3, axis: &Vector3, angle: f64) -> Vector3 {
        let Some(k) = normalize(axis) else {
            return *v;
        };
        let (sin, cos) = angle.sin_cos();
        let k_cross_v = cross(&k, v);
        let k_dot_v = dot(&k, v);
        [
            v[0] * cos + k_cross_v[0] * sin + k[0] * k_dot_v * (1.0 - cos),
            v[1] * cos + k_cross_v[1] * sin + k[1] * k_dot_v * (1.0 - cos),
            v[2] * cos + k_cross_v[2] * sin + k[2] * k_dot_v * (1.0 - cos),
        ]
    }

    /// True when every component is finite.
    #[inline]
    pub fn is_finite(v: &Vector3) -> bool {
        v.iter().all(|c| c.is_finite())
    }
}

/// Immutable value types exchanged between the solvers and their callers.
pub mod state {
    use serde::{Deserialize, Serialize};

    use super::vector::{self, Vector3};

    /// Body-centred inertial position/velocity snapshot at an epoch.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct StateVector {
        pub position: Vector3,
        pub velocity: Vector3,
        pub epoch: f64,
    }

    impl StateVector {
        pub fn new(position: Vector3, velocity: Vector3, epoch: f64) -> Self {
            Self {
                position,
                velocity,
                epoch,
            }
        }

        pub fn radius(&self) -> f64 {
            vector::norm(&self.position)
        }

        pub fn speed(&self) -> f64 {
            vector::norm(&self.velocity)
        }

        /// Specific angular momentum vector `r × v`.
        pub fn angular_momentum(&self) -> Vector3 {
            vector::cross(&self.position, &self.velocity)
        }

        /// A new snapshot with `delta_v` added to the velocity.
        pub fn with_delta_v(&self, delta_v: &Vector3) -> Self {
            Self {
                velocity: vector::add(&self.velocity, delta_v),
                ..*self
            }
        }
    }

    /// An idealised impulsive burn.
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Burn {
        pub delta_v: Vector3,
        pub epoch: f64,
    }

    impl Burn {
        pub fn new(delta_v: Vector3, epoch: f64) -> Self {
            Self { delta_v, epoch }
        }

        pub fn magnitude(&self) -> f64 {
            vector::norm(&self.delta_v)
        }
    }
}

/// Failure taxonomy shared by every solver crate.
pub mod error {
    use std::fmt;

    /// Coarse classification every crate-specific error maps onto.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum ErrorKind {
        /// Malformed or physically invalid inputs.
        InvalidInput,
        /// Colinear Lambert geometry with no defined transfer plane.
        DegenerateGeometry,
        /// Valid inputs, but an iterative method ran out of budget.
        NoConvergence,
        /// A window scan exhausted its interval without bracketing a root.
        NoTransferWindowFound,
        /// A required ascending/descending node does not exist.
        MissingReferenceNode,
        /// Patched-conic stepping did not reach the target within the horizon.
        SearchHorizonExceeded,
    }

    impl fmt::Display for ErrorKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let label = match self {
                ErrorKind::InvalidInput => "invalid input",
                ErrorKind::DegenerateGeometry => "degenerate geometry",
                ErrorKind::NoConvergence => "no convergence",
                ErrorKind::NoTransferWindowFound => "no transfer window found",
                ErrorKind::MissingReferenceNode => "missing reference node",
                ErrorKind::SearchHorizonExceeded => "search horizon exceeded",
            };
            f.write_str(label)
        }
    }
}

pub use error::ErrorKind;
pub use state::{Burn, StateVector};
pub use vector::Vector3;
