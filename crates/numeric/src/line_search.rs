//! Derivative-free one-dimensional minimisation on top of `argmin`'s golden-section solver.

use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::goldensectionsearch::GoldenSectionSearch;
use maneuver_core::ErrorKind;
use thiserror::Error;

/// Relative bracket width at which the golden-section search stops early.
const BRACKET_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LineSearchError {
    #[error("invalid line search interval [{lo}, {hi}]")]
    InvalidInterval { lo: f64, hi: f64 },
    #[error("golden-section search failed: {0}")]
    Solver(String),
}

impl LineSearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LineSearchError::InvalidInterval { .. } => ErrorKind::InvalidInput,
            LineSearchError::Solver(_) => ErrorKind::NoConvergence,
        }
    }
}

struct Scalar<F>(F);

impl<F> CostFunction for Scalar<F>
where
    F: Fn(f64) -> f64,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, x: &f64) -> Result<f64, Error> {
        let value = (self.0)(*x);
        Ok(if value.is_finite() { value } else { f64::INFINITY })
    }
}

/// Golden-section search for a minimum of `f` on `[lo, hi]`.
///
/// Runs at most `iterations` interval reductions and returns the best abscissa seen
/// with its value. Non-finite evaluations count as `+∞`, so infeasible points are never
/// preferred over feasible ones.
pub fn minimize_scalar<F>(f: F, lo: f64, hi: f64, iterations: usize) -> Result<(f64, f64), LineSearchError>
where
    F: Fn(f64) -> f64,
{
    if !lo.is_finite() || !hi.is_finite() {
        return Err(LineSearchError::InvalidInterval { lo, hi });
    }
    let (a, b) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let problem = Scalar(f);
    if a == b {
        let value = problem.cost(&a).map_err(|err| LineSearchError::Solver(err.to_string()))?;
        return Ok((a, value));
    }

    let midpoint = 0.5 * (a + b);
    let solver = GoldenSectionSearch::new(a, b)
        .and_then(|solver| solver.with_tolerance(BRACKET_TOLERANCE))
        .map_err(|err| LineSearchError::Solver(err.to_string()))?;
    let result = Executor::new(problem, solver)
        .configure(|state| state.param(midpoint).max_iters(iterations as u64))
        .run()
        .map_err(|err| LineSearchError::Solver(err.to_string()))?;

    let state = result.state();
    match state.get_best_param() {
        Some(x) => Ok((*x, state.get_best_cost())),
        None => Ok((midpoint, f64::INFINITY)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parabola_vertex() {
        let (x, fx) = minimize_scalar(|x| (x - 1.25).powi(2) + 3.0, -10.0, 10.0, 80).unwrap();
        assert!((x - 1.25).abs() < 1e-4, "{x}");
        assert!((fx - 3.0).abs() < 1e-8);
    }

    #[test]
    fn infeasible_points_are_never_chosen() {
        let (x, fx) = minimize_scalar(|x| if x < 2.0 { f64::NAN } else { x }, 0.0, 5.0, 60).unwrap();
        assert!(fx.is_finite());
        assert!((x - 2.0).abs() < 1e-3, "{x}");
    }

    #[test]
    fn degenerate_interval_evaluates_once() {
        assert_eq!(minimize_scalar(|x| x * x, 3.0, 3.0, 10).unwrap(), (3.0, 9.0));
        assert!(matches!(
            minimize_scalar(|x| x, f64::NAN, 1.0, 10),
            Err(LineSearchError::InvalidInterval { .. })
        ));
    }
}
