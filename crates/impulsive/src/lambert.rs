//! Lambert boundary-value solver.
//!
//! Izzo's formulation ("Revisiting Lambert's problem", 2014): the problem is reduced to a
//! single non-dimensional time-of-flight equation in `x`, solved with Householder
//! iterations. Multi-revolution solutions come in left/right pairs; the minimum
//! time-of-flight for a given revolution count is located with Halley's method.

use std::f64::consts::PI;

use maneuver_core::ErrorKind;
use maneuver_core::vector::{self, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LambertSolverError {
    #[error("invalid Lambert input: {0}")]
    InvalidInput(String),
    #[error("position vectors are colinear; the transfer plane is undefined")]
    DegenerateGeometry,
    #[error("Lambert iteration did not converge after {iterations} iterations")]
    DidNotConverge { iterations: usize },
    #[error("{requested} revolutions requested but the time of flight admits at most {max}")]
    InfeasibleRevolutions { requested: u32, max: u32 },
}

impl LambertSolverError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LambertSolverError::InvalidInput(_) | LambertSolverError::InfeasibleRevolutions { .. } => {
                ErrorKind::InvalidInput
            }
            LambertSolverError::DegenerateGeometry => ErrorKind::DegenerateGeometry,
            LambertSolverError::DidNotConverge { .. } => ErrorKind::NoConvergence,
        }
    }
}

/// Direction-of-motion branch: short way (transfer angle below π about `r1 × r2`) or
/// long way (above π).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPath {
    Short,
    Long,
}

impl TransferPath {
    /// The branch that moves prograde about `reference_normal`.
    pub fn prograde(r1: &Vector3, r2: &Vector3, reference_normal: &Vector3) -> Self {
        if vector::dot(&vector::cross(r1, r2), reference_normal) >= 0.0 {
            TransferPath::Short
        } else {
            TransferPath::Long
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            TransferPath::Short => TransferPath::Long,
            TransferPath::Long => TransferPath::Short,
        }
    }
}

/// Which multi-revolution solution a velocity pair belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LambertBranch {
    /// The unique zero-revolution solution.
    Single,
    /// Multi-revolution solution seeded from the left of the minimum-time point.
    Left,
    /// Multi-revolution solution seeded from the right of the minimum-time point.
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertSettings {
    /// Absolute tolerance on Izzo's `x` variable.
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for LambertSettings {
    fn default() -> Self {
        Self {
            tolerance: 1e-11,
            max_iterations: 35,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertSolution {
    pub v1: Vector3,
    pub v2: Vector3,
    pub revolutions: u32,
    pub branch: LambertBranch,
}

/// Velocities at `r1` and `r2` for a conic that connects them in `tof` seconds.
///
/// For `revolutions > 0` the left-branch solution is returned; see [`solve_all`] for both.
pub fn solve(
    mu: f64,
    r1: &Vector3,
    r2: &Vector3,
    tof: f64,
    revolutions: u32,
    path: TransferPath,
) -> Result<(Vector3, Vector3), LambertSolverError> {
    solve_with(mu, r1, r2, tof, revolutions, path, &LambertSettings::default())
}

pub fn solve_with(
    mu: f64,
    r1: &Vector3,
    r2: &Vector3,
    tof: f64,
    revolutions: u32,
    path: TransferPath,
    settings: &LambertSettings,
) -> Result<(Vector3, Vector3), LambertSolverError> {
    let normal = plane_normal(r1, r2)?;
    let geometry = Geometry::new(mu, r1, r2, tof, path, &normal)?;
    let x = geometry.solve_revolution(revolutions, LambertBranch::Left, settings)?;
    Ok(geometry.velocities(x))
}

/// Every zero- and multi-revolution solution admitted by `tof`, zero-revolution first.
pub fn solve_all(
    mu: f64,
    r1: &Vector3,
    r2: &Vector3,
    tof: f64,
    path: TransferPath,
    settings: &LambertSettings,
) -> Result<Vec<LambertSolution>, LambertSolverError> {
    let normal = plane_normal(r1, r2)?;
    let geometry = Geometry::new(mu, r1, r2, tof, path, &normal)?;
    let max = geometry.max_revolutions(settings)?;

    let mut solutions = Vec::with_capacity(1 + 2 * max as usize);
    let x = geometry.solve_revolution(0, LambertBranch::Single, settings)?;
    let (v1, v2) = geometry.velocities(x);
    solutions.push(LambertSolution {
        v1,
        v2,
        revolutions: 0,
        branch: LambertBranch::Single,
    });
    for revolutions in 1..=max {
        for branch in [LambertBranch::Left, LambertBranch::Right] {
            let x = geometry.solve_revolution(revolutions, branch, settings)?;
            let (v1, v2) = geometry.velocities(x);
            solutions.push(LambertSolution {
                v1,
                v2,
                revolutions,
                branch,
            });
        }
    }
    Ok(solutions)
}

/// A Lambert problem posed between two trajectories, carrying the velocities the
/// vessel has before departure and needs after arrival.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertProblem {
    pub mu: f64,
    pub r1: Vector3,
    pub v1: Vector3,
    pub r2: Vector3,
    pub v2: Vector3,
    pub tof: f64,
    pub revolutions: u32,
    pub path: TransferPath,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LambertTransfer {
    pub departure_velocity: Vector3,
    pub arrival_velocity: Vector3,
    /// Burn at `r1` onto the transfer conic.
    pub departure_delta_v: Vector3,
    /// Burn at `r2` from the transfer conic onto the target velocity.
    pub arrival_delta_v: Vector3,
}

impl LambertProblem {
    /// Solve the problem. Exactly colinear positions take their plane from `r1 × v1`.
    pub fn solve(&self) -> Result<LambertTransfer, LambertSolverError> {
        self.solve_with(&LambertSettings::default())
    }

    pub fn solve_with(&self, settings: &LambertSettings) -> Result<LambertTransfer, LambertSolverError> {
        let normal = match plane_normal(&self.r1, &self.r2) {
            Ok(normal) => normal,
            Err(LambertSolverError::DegenerateGeometry) => {
                vector::normalize(&vector::cross(&self.r1, &self.v1))
                    .ok_or(LambertSolverError::DegenerateGeometry)?
            }
            Err(err) => return Err(err),
        };
        let geometry = Geometry::new(self.mu, &self.r1, &self.r2, self.tof, self.path, &normal)?;
        let x = geometry.solve_revolution(self.revolutions, LambertBranch::Left, settings)?;
        let (departure_velocity, arrival_velocity) = geometry.velocities(x);
        Ok(LambertTransfer {
            departure_velocity,
            arrival_velocity,
            departure_delta_v: vector::sub(&departure_velocity, &self.v1),
            arrival_delta_v: vector::sub(&self.v2, &arrival_velocity),
        })
    }
}

fn plane_normal(r1: &Vector3, r2: &Vector3) -> Result<Vector3, LambertSolverError> {
    let (n1, n2) = (vector::norm(r1), vector::norm(r2));
    let h = vector::cross(r1, r2);
    if vector::norm(&h) <= 1e-12 * n1 * n2 {
        return Err(if n1 == 0.0 || n2 == 0.0 {
            LambertSolverError::InvalidInput("position vector has zero length".into())
        } else {
            LambertSolverError::DegenerateGeometry
        });
    }
    vector::normalize(&h).ok_or(LambertSolverError::DegenerateGeometry)
}

/// Non-dimensional geometry shared by every revolution count.
struct Geometry {
    r1: Vector3,
    r2: Vector3,
    r1_norm: f64,
    r2_norm: f64,
    lambda: f64,
    /// Non-dimensional time of flight.
    t: f64,
    gamma: f64,
    rho: f64,
    sigma: f64,
    it1: Vector3,
    it2: Vector3,
}

impl Geometry {
    fn new(
        mu: f64,
        r1: &Vector3,
        r2: &Vector3,
        tof: f64,
        path: TransferPath,
        normal: &Vector3,
    ) -> Result<Self, LambertSolverError> {
        if !(mu > 0.0) || !mu.is_finite() {
            return Err(LambertSolverError::InvalidInput(format!(
                "gravitational parameter must be positive, got {mu}"
            )));
        }
        if !(tof > 0.0) || !tof.is_finite() {
            return Err(LambertSolverError::InvalidInput(format!(
                "time of flight must be positive, got {tof}"
            )));
        }
        if !vector::is_finite(r1) || !vector::is_finite(r2) {
            return Err(LambertSolverError::InvalidInput("non-finite position vector".into()));
        }
        let r1_norm = vector::norm(r1);
        let r2_norm = vector::norm(r2);
        if r1_norm == 0.0 || r2_norm == 0.0 {
            return Err(LambertSolverError::InvalidInput("position vector has zero length".into()));
        }
        let c = vector::norm(&vector::sub(r2, r1));
        if c == 0.0 {
            return Err(LambertSolverError::InvalidInput("departure and arrival positions coincide".into()));
        }

        let s = 0.5 * (r1_norm + r2_norm + c);
        let ir1 = vector::scale(r1, 1.0 / r1_norm);
        let ir2 = vector::scale(r2, 1.0 / r2_norm);

        let mut lambda = (1.0 - c / s).max(0.0).sqrt();
        let (it1, it2) = match path {
            TransferPath::Short => (vector::cross(normal, &ir1), vector::cross(normal, &ir2)),
            TransferPath::Long => {
                lambda = -lambda;
                (vector::cross(&ir1, normal), vector::cross(&ir2, normal))
            }
        };

        let rho = (r1_norm - r2_norm) / c;
        Ok(Self {
            r1: *r1,
            r2: *r2,
            r1_norm,
            r2_norm,
            lambda,
            t: tof * (2.0 * mu / s.powi(3)).sqrt(),
            gamma: (mu * s / 2.0).sqrt(),
            rho,
            sigma: (1.0 - rho * rho).max(0.0).sqrt(),
            it1,
            it2,
        })
    }

    fn t00(&self) -> f64 {
        let lambda = self.lambda;
        lambda.acos() + lambda * (1.0 - lambda * lambda).sqrt()
    }

    fn max_revolutions(&self, settings: &LambertSettings) -> Result<u32, LambertSolverError> {
        let mut m_max = (self.t / PI).floor() as u32;
        if m_max > 0 && self.t < self.t00() + m_max as f64 * PI {
            let t_min = self.minimum_time(m_max, settings)?;
            if self.t < t_min {
                m_max -= 1;
            }
        }
        Ok(m_max)
    }

    /// Minimum non-dimensional time of flight admitting `m` revolutions.
    fn minimum_time(&self, m: u32, settings: &LambertSettings) -> Result<f64, LambertSolverError> {
        let lambda = self.lambda;
        if lambda == 1.0 {
            return Ok(time_of_flight(0.0, compute_y(0.0, lambda), lambda, m));
        }
        if m == 0 {
            return Ok(0.0);
        }
        // Start at x > 0 to stay clear of the λ = -1 singularity.
        let mut x0 = 0.1;
        for _ in 0..settings.max_iterations {
            let y = compute_y(x0, lambda);
            let t = time_of_flight(x0, y, lambda, m);
            let d1 = dtof(x0, y, t, lambda);
            let d2 = d2tof(x0, y, t, d1, lambda);
            if d2 == 0.0 {
                break;
            }
            let d3 = d3tof(x0, y, d1, d2, lambda);
            let x = x0 - 2.0 * d1 * d2 / (2.0 * d2 * d2 - d1 * d3);
            if (x - x0).abs() < settings.tolerance {
                return Ok(time_of_flight(x, compute_y(x, lambda), lambda, m));
            }
            x0 = x;
        }
        Err(LambertSolverError::DidNotConverge {
            iterations: settings.max_iterations,
        })
    }

    fn solve_revolution(
        &self,
        revolutions: u32,
        branch: LambertBranch,
        settings: &LambertSettings,
    ) -> Result<f64, LambertSolverError> {
        let max = self.max_revolutions(settings)?;
        if revolutions > max {
            return Err(LambertSolverError::InfeasibleRevolutions {
                requested: revolutions,
                max,
            });
        }

        let (lambda, t) = (self.lambda, self.t);
        let x0 = if revolutions == 0 {
            let t00 = self.t00();
            let t1 = 2.0 / 3.0 * (1.0 - lambda.powi(3));
            if t >= t00 {
                (t00 / t).powf(2.0 / 3.0) - 1.0
            } else if t < t1 {
                2.5 * t1 / t * (t1 - t) / (1.0 - lambda.powi(5)) + 1.0
            } else {
                (2f64.ln() * (t / t00).ln() / (t1 / t00).ln()).exp() - 1.0
            }
        } else {
            let m = revolutions as f64;
            match branch {
                LambertBranch::Right => {
                    let k = (8.0 * t / (m * PI)).powf(2.0 / 3.0);
                    (k - 1.0) / (k + 1.0)
                }
                LambertBranch::Left | LambertBranch::Single => {
                    let k = ((m * PI + PI) / (8.0 * t)).powf(2.0 / 3.0);
                    (k - 1.0) / (k + 1.0)
                }
            }
        };

        householder(x0, t, lambda, revolutions, settings)
    }

    fn velocities(&self, x: f64) -> (Vector3, Vector3) {
        let (lambda, gamma, rho, sigma) = (self.lambda, self.gamma, self.rho, self.sigma);
        let y = compute_y(x, lambda);
        let vr1 = gamma * ((lambda * y - x) - rho * (lambda * y + x)) / self.r1_norm;
        let vr2 = -gamma * ((lambda * y - x) + rho * (lambda * y + x)) / self.r2_norm;
        let vt1 = gamma * sigma * (y + lambda * x) / self.r1_norm;
        let vt2 = gamma * sigma * (y + lambda * x) / self.r2_norm;

        let v1 = vector::add(
            &vector::scale(&self.r1, vr1 / self.r1_norm),
            &vector::scale(&self.it1, vt1),
        );
        let v2 = vector::add(
            &vector::scale(&self.r2, vr2 / self.r2_norm),
            &vector::scale(&self.it2, vt2),
        );
        (v1, v2)
    }
}

fn householder(
    mut x0: f64,
    target: f64,
    lambda: f64,
    m: u32,
    settings: &LambertSettings,
) -> Result<f64, LambertSolverError> {
    for _ in 0..settings.max_iterations {
        let y = compute_y(x0, lambda);
        let t = time_of_flight(x0, y, lambda, m);
        let f = t - target;
        let d1 = dtof(x0, y, t, lambda);
        let d2 = d2tof(x0, y, t, d1, lambda);
        let d3 = d3tof(x0, y, d1, d2, lambda);

        let x = x0
            - f * ((d1 * d1 - f * d2 / 2.0) / (d1 * (d1 * d1 - f * d2) + d3 * f * f / 6.0));
        if !x.is_finite() {
            break;
        }
        if (x - x0).abs() < settings.tolerance {
            return Ok(x);
        }
        x0 = x;
    }
    Err(LambertSolverError::DidNotConverge {
        iterations: settings.max_iterations,
    })
}

fn compute_y(x: f64, lambda: f64) -> f64 {
    (1.0 - lambda * lambda * (1.0 - x * x)).sqrt()
}

fn compute_psi(x: f64, y: f64, lambda: f64) -> f64 {
    if (-1.0..1.0).contains(&x) {
        (x * y + lambda * (1.0 - x * x)).clamp(-1.0, 1.0).acos()
    } else if x > 1.0 {
        ((y - x * lambda) * (x * x - 1.0).sqrt()).asinh()
    } else {
        0.0
    }
}

/// Non-dimensional time of flight `T(x)` for `m` complete revolutions.
fn time_of_flight(x: f64, y: f64, lambda: f64, m: u32) -> f64 {
    if m == 0 && x > 0.6f64.sqrt() && x < 1.4f64.sqrt() {
        // Series form near the parabola, where the closed form loses precision.
        let eta = y - lambda * x;
        let s1 = 0.5 * (1.0 - lambda - x * eta);
        let q = 4.0 / 3.0 * hypergeometric(s1);
        0.5 * (eta.powi(3) * q + 4.0 * lambda * eta)
    } else {
        let one_minus_x2 = 1.0 - x * x;
        ((compute_psi(x, y, lambda) + m as f64 * PI) / one_minus_x2.abs().sqrt() - x + lambda * y)
            / one_minus_x2
    }
}

fn dtof(x: f64, y: f64, t: f64, lambda: f64) -> f64 {
    (3.0 * t * x - 2.0 + 2.0 * lambda.powi(3) * x / y) / (1.0 - x * x)
}

fn d2tof(x: f64, y: f64, t: f64, d1: f64, lambda: f64) -> f64 {
    (3.0 * t + 5.0 * x * d1 + 2.0 * (1.0 - lambda * lambda) * lambda.powi(3) / y.powi(3))
        / (1.0 - x * x)
}

fn d3tof(x: f64, y: f64, d1: f64, d2: f64, lambda: f64) -> f64 {
    (7.0 * x * d2 + 8.0 * d1 - 6.0 * (1.0 - lambda * lambda) * lambda.powi(5) * x / y.powi(5))
        / (1.0 - x * x)
}

/// Gauss hypergeometric `₂F₁(3, 1; 5/2; z)` by direct summation.
fn hypergeometric(z: f64) -> f64 {
    if z >= 1.0 {
        return f64::INFINITY;
    }
    let mut sum = 1.0;
    let mut term = 1.0;
    for i in 0..500 {
        let i = i as f64;
        term *= (3.0 + i) * (1.0 + i) / (2.5 + i) * z / (i + 1.0);
        let next = sum + term;
        if next == sum {
            break;
        }
        sum = next;
    }
    sum
}
