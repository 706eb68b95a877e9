//! Levenberg–Marquardt least squares with box bounds and linear inequality constraints.
//!
//! The solver minimises `½‖r(x)‖²` for a residual closure `r`. Each trial step is
//! projected back onto the feasible set (box first, then every violated half-space
//! `c·x ≤ u`, alternating until consistent), so iterates never leave the admissible
//! region. The Jacobian is formed by forward differences that step inward at an upper
//! bound.

use maneuver_core::ErrorKind;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;
use tracing::debug;

const PROJECTION_PASSES: usize = 32;
const MAX_DAMPING: f64 = 1e20;
const FEASIBILITY_TOLERANCE: f64 = 1e-9;

/// Inclusive box bounds per variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, OptimizerError> {
        if lower.len() != upper.len() {
            return Err(OptimizerError::DimensionMismatch {
                expected: lower.len(),
                found: upper.len(),
            });
        }
        for (index, (lo, hi)) in lower.iter().zip(&upper).enumerate() {
            if lo.is_nan() || hi.is_nan() || lo > hi {
                return Err(OptimizerError::InvalidBounds {
                    index,
                    lower: *lo,
                    upper: *hi,
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    fn clamp(&self, x: &mut [f64]) {
        for ((value, lo), hi) in x.iter_mut().zip(&self.lower).zip(&self.upper) {
            *value = value.clamp(*lo, *hi);
        }
    }

    fn is_fixed(&self, index: usize) -> bool {
        self.lower[index] == self.upper[index]
    }
}

/// Half-space constraint `coefficients · x ≤ upper`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub coefficients: Vec<f64>,
    pub upper: f64,
}

impl LinearConstraint {
    fn violation(&self, x: &[f64]) -> f64 {
        let lhs: f64 = self.coefficients.iter().zip(x).map(|(c, v)| c * v).sum();
        lhs - self.upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevenbergMarquardtSettings {
    pub max_iterations: usize,
    /// Relative decrease of the cost below which the run is considered converged.
    pub cost_tolerance: f64,
    /// Relative step length below which the run is considered converged.
    pub step_tolerance: f64,
    pub initial_damping: f64,
    /// Relative finite-difference step for the Jacobian.
    pub diff_step: f64,
}

impl Default for LevenbergMarquardtSettings {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            cost_tolerance: 1e-10,
            step_tolerance: 1e-10,
            initial_damping: 1e-3,
            diff_step: 1e-6,
        }
    }
}

/// Why a minimisation run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CostTolerance,
    StepTolerance,
    /// No damping level produced a decrease; the iterate is a (constrained) local minimum.
    Stalled,
    MaxIterations,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimization {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    /// `½‖r(x)‖²`
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

impl Minimization {
    pub fn converged(&self) -> bool {
        self.termination != Termination::MaxIterations
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OptimizerError {
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("invalid bounds for variable {index}: [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },
    #[error("constraints admit no point inside the bounds")]
    Infeasible,
    #[error("residual function returned no residuals")]
    EmptyResiduals,
}

impl OptimizerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::InvalidInput
    }
}

/// Minimise `½‖residuals(x)‖²` subject to `bounds` and `constraints`, starting at `x0`.
///
/// The run is best-effort: hitting the iteration cap still returns the best iterate,
/// flagged with [`Termination::MaxIterations`]. Errors are reserved for malformed input.
pub fn minimize<F>(
    mut residuals: F,
    x0: &[f64],
    bounds: &Bounds,
    constraints: &[LinearConstraint],
    settings: &LevenbergMarquardtSettings,
) -> Result<Minimization, OptimizerError>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let n = bounds.dimension();
    if x0.len() != n {
        return Err(OptimizerError::DimensionMismatch {
            expected: n,
            found: x0.len(),
        });
    }
    if let Some(bad) = constraints.iter().find(|c| c.coefficients.len() != n) {
        return Err(OptimizerError::DimensionMismatch {
            expected: n,
            found: bad.coefficients.len(),
        });
    }

    let mut x = x0.to_vec();
    project(&mut x, bounds, constraints);
    if constraints
        .iter()
        .any(|c| c.violation(&x) > FEASIBILITY_TOLERANCE * c.upper.abs().max(1.0))
    {
        return Err(OptimizerError::Infeasible);
    }

    let mut r = residuals(&x);
    if r.is_empty() {
        return Err(OptimizerError::EmptyResiduals);
    }
    let mut cost = half_squared_norm(&r);
    let mut lambda = settings.initial_damping;

    for iteration in 1..=settings.max_iterations {
        if cost == 0.0 {
            return Ok(finish(x, r, cost, iteration - 1, Termination::CostTolerance));
        }

        let jacobian = forward_difference_jacobian(&mut residuals, &x, &r, bounds, settings.diff_step);
        let residual_vec = DVector::from_column_slice(&r);
        let jtj = jacobian.transpose() * &jacobian;
        let gradient = jacobian.transpose() * residual_vec;

        let mut accepted = None;
        while lambda <= MAX_DAMPING {
            let Some(step) = damped_step(&jtj, &gradient, lambda, bounds) else {
                lambda *= 10.0;
                continue;
            };

            let mut candidate: Vec<f64> = x.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            project(&mut candidate, bounds, constraints);

            let candidate_r = residuals(&candidate);
            let candidate_cost = half_squared_norm(&candidate_r);
            if candidate_cost < cost {
                lambda = (lambda / 10.0).max(1e-15);
                accepted = Some((candidate, candidate_r, candidate_cost));
                break;
            }
            lambda *= 10.0;
        }

        let Some((candidate, candidate_r, candidate_cost)) = accepted else {
            debug!(iteration, cost, "levenberg-marquardt stalled");
            return Ok(finish(x, r, cost, iteration, Termination::Stalled));
        };

        let decrease = cost - candidate_cost;
        let step_norm = distance(&x, &candidate);
        let x_norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();

        x = candidate;
        r = candidate_r;
        let previous = cost;
        cost = candidate_cost;

        if decrease <= settings.cost_tolerance * previous {
            return Ok(finish(x, r, cost, iteration, Termination::CostTolerance));
        }
        if step_norm <= settings.step_tolerance * (x_norm + settings.step_tolerance) {
            return Ok(finish(x, r, cost, iteration, Termination::StepTolerance));
        }
    }

    debug!(cost, "levenberg-marquardt reached its iteration cap");
    Ok(finish(x, r, cost, settings.max_iterations, Termination::MaxIterations))
}

fn finish(x: Vec<f64>, residuals: Vec<f64>, cost: f64, iterations: usize, termination: Termination) -> Minimization {
    Minimization {
        x,
        residuals,
        cost,
        iterations,
        termination,
    }
}

fn half_squared_norm(r: &[f64]) -> f64 {
    let sum: f64 = r.iter().map(|v| v * v).sum();
    if sum.is_finite() { 0.5 * sum } else { f64::INFINITY }
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt()
}

fn project(x: &mut [f64], bounds: &Bounds, constraints: &[LinearConstraint]) {
    for _ in 0..PROJECTION_PASSES {
        bounds.clamp(x);
        let mut satisfied = true;
        for constraint in constraints {
            let violation = constraint.violation(x);
            if violation > 0.0 {
                satisfied = false;
                let norm_sq: f64 = constraint.coefficients.iter().map(|c| c * c).sum();
                if norm_sq == 0.0 {
                    continue;
                }
                for (value, c) in x.iter_mut().zip(&constraint.coefficients) {
                    *value -= violation / norm_sq * c;
                }
            }
        }
        if satisfied {
            return;
        }
    }
    bounds.clamp(x);
}

fn forward_difference_jacobian<F>(
    residuals: &mut F,
    x: &[f64],
    r: &[f64],
    bounds: &Bounds,
    diff_step: f64,
) -> DMatrix<f64>
where
    F: FnMut(&[f64]) -> Vec<f64>,
{
    let mut jacobian = DMatrix::zeros(r.len(), x.len());
    for j in 0..x.len() {
        if bounds.is_fixed(j) {
            continue;
        }
        let mut h = diff_step * x[j].abs().max(1.0);
        if x[j] + h > bounds.upper[j] {
            h = -h;
        }
        let mut perturbed = x.to_vec();
        perturbed[j] += h;
        let shifted = residuals(&perturbed);
        for (i, (shifted_i, base_i)) in shifted.iter().zip(r).enumerate() {
            let derivative = (shifted_i - base_i) / h;
            jacobian[(i, j)] = if derivative.is_finite() { derivative } else { 0.0 };
        }
    }
    jacobian
}

fn damped_step(
    jtj: &DMatrix<f64>,
    gradient: &DVector<f64>,
    lambda: f64,
    bounds: &Bounds,
) -> Option<DVector<f64>> {
    let n = jtj.nrows();
    let mut system = jtj.clone();
    let mut rhs = -gradient.clone();
    for j in 0..n {
        if bounds.is_fixed(j) {
            system.row_mut(j).fill(0.0);
            system.column_mut(j).fill(0.0);
            system[(j, j)] = 1.0;
            rhs[j] = 0.0;
            continue;
        }
        let diagonal = if jtj[(j, j)] > 0.0 { jtj[(j, j)] } else { 1.0 };
        system[(j, j)] += lambda * diagonal;
    }
    let step = system.cholesky()?.solve(&rhs);
    step.iter().all(|v| v.is_finite()).then_some(step)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rosenbrock_residuals_converge() {
        let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
        let result = minimize(
            |x| vec![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]],
            &[-1.2, 1.0],
            &bounds,
            &[],
            &LevenbergMarquardtSettings::default(),
        )
        .unwrap();
        assert!((result.x[0] - 1.0).abs() < 1e-4, "{:?}", result);
        assert!((result.x[1] - 1.0).abs() < 1e-4, "{:?}", result);
    }

    #[test]
    fn linear_constraint_is_respected() {
        let bounds = Bounds::new(vec![0.0, 0.0], vec![10.0, 10.0]).unwrap();
        let sum = LinearConstraint {
            coefficients: vec![1.0, 1.0],
            upper: 4.0,
        };
        let result = minimize(
            |x| vec![x[0] - 3.0, x[1] - 3.0],
            &[0.5, 0.5],
            &bounds,
            &[sum],
            &LevenbergMarquardtSettings::default(),
        )
        .unwrap();
        assert!(result.x[0] + result.x[1] <= 4.0 + 1e-9);
        assert!((result.x[0] - 2.0).abs() < 1e-3, "{:?}", result);
        assert!((result.x[1] - 2.0).abs() < 1e-3, "{:?}", result);
    }

    #[test]
    fn iteration_cap_keeps_best_iterate() {
        let bounds = Bounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]).unwrap();
        let rosenbrock = |x: &[f64]| vec![10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]];
        let settings = LevenbergMarquardtSettings {
            max_iterations: 2,
            ..LevenbergMarquardtSettings::default()
        };
        let result = minimize(rosenbrock, &[-1.2, 1.0], &bounds, &[], &settings).unwrap();
        assert_eq!(result.termination, Termination::MaxIterations);
        assert!(!result.converged());
        assert_eq!(result.iterations, 2);
        assert!(result.cost < 12.1, "{result:?}");
        assert_eq!(result.residuals, rosenbrock(&result.x));
        assert!((result.cost - half_squared_norm(&result.residuals)).abs() < 1e-15);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        assert!(matches!(
            Bounds::new(vec![1.0], vec![0.0]),
            Err(OptimizerError::InvalidBounds { index: 0, .. })
        ));
    }
}
