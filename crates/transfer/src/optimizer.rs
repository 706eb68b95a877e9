//! Local refinement of a two-burn transfer over (burn offset, transfer time).
//!
//! The cost is `‖Δv₁‖ + ‖Δv₂‖`, or `‖Δv₁‖` alone for intercepts. Each burn enters the
//! bounded Levenberg–Marquardt minimiser as the residual `√‖Δvᵢ‖`, so the least-squares
//! objective `½‖r‖²` is exactly half the cost. Lambert or propagation failures inside
//! the search map to a large finite cost so the optimiser steers away from them
//! instead of aborting.

use maneuver_core::vector::{self, Vector3};
use maneuver_core::StateVector;
use maneuver_impulsive::lambert::{LambertProblem, LambertSettings, TransferPath};
use maneuver_numeric::{Bounds, LevenbergMarquardtSettings, LinearConstraint, minimize};
use maneuver_orbits::kepler::{self, PropagatorSettings};
use tracing::{debug, warn};

use crate::TransferError;

/// Whether the arrival burn that matches the target velocity is part of the cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferMode {
    #[default]
    Rendezvous,
    InterceptOnly,
}

/// Two trajectories about the same body, each given by a state at its own epoch.
///
/// Burn offsets are measured from the source state's epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferProblem {
    pub mu: f64,
    pub source: StateVector,
    pub target: StateVector,
    pub mode: TransferMode,
    pub propagator: PropagatorSettings,
    pub lambert: LambertSettings,
}

/// Burns and cost of one (offset, transfer time, path) choice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferEvaluation {
    pub delta_v1: Vector3,
    pub delta_v2: Vector3,
    pub cost: f64,
}

impl TransferProblem {
    pub fn new(mu: f64, source: StateVector, target: StateVector) -> Result<Self, TransferError> {
        if !(mu > 0.0) || !mu.is_finite() {
            return Err(TransferError::InvalidInput(format!(
                "gravitational parameter must be positive, got {mu}"
            )));
        }
        if source.radius() == 0.0 || target.radius() == 0.0 {
            return Err(TransferError::InvalidInput("position vector has zero length".into()));
        }
        Ok(Self {
            mu,
            source,
            target,
            mode: TransferMode::Rendezvous,
            propagator: PropagatorSettings::default(),
            lambert: LambertSettings::default(),
        })
    }

    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn reference_epoch(&self) -> f64 {
        self.source.epoch
    }

    /// Cost of departing `burn_offset` after the reference epoch and arriving
    /// `transfer_time` later along `path`.
    pub fn evaluate(
        &self,
        burn_offset: f64,
        transfer_time: f64,
        path: TransferPath,
    ) -> Result<TransferEvaluation, TransferError> {
        if !(transfer_time > 0.0) {
            return Err(TransferError::InvalidInput(format!(
                "transfer time must be positive, got {transfer_time}"
            )));
        }
        let (r0, v0) = kepler::propagate_with(
            self.mu,
            burn_offset,
            &self.source.position,
            &self.source.velocity,
            &self.propagator,
        )?;
        let arrival = self.reference_epoch() + burn_offset + transfer_time;
        let (rt, vt) = kepler::propagate_with(
            self.mu,
            arrival - self.target.epoch,
            &self.target.position,
            &self.target.velocity,
            &self.propagator,
        )?;
        let transfer = LambertProblem {
            mu: self.mu,
            r1: r0,
            v1: v0,
            r2: rt,
            v2: vt,
            tof: transfer_time,
            revolutions: 0,
            path,
        }
        .solve_with(&self.lambert)?;

        let delta_v1 = transfer.departure_delta_v;
        let delta_v2 = transfer.arrival_delta_v;
        let cost = match self.mode {
            TransferMode::Rendezvous => vector::norm(&delta_v1) + vector::norm(&delta_v2),
            TransferMode::InterceptOnly => vector::norm(&delta_v1),
        };
        Ok(TransferEvaluation {
            delta_v1,
            delta_v2,
            cost,
        })
    }
}

/// Feasible region for (burn offset, transfer time).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferBounds {
    pub min_offset: f64,
    pub max_offset: f64,
    pub min_transfer_time: f64,
    pub max_transfer_time: f64,
    /// Upper bound on `burn_offset + transfer_time`; infinite when unconstrained.
    pub max_total: f64,
}

impl TransferBounds {
    pub fn validate(&self) -> Result<(), TransferError> {
        let ordered = self.min_offset <= self.max_offset
            && self.min_transfer_time <= self.max_transfer_time
            && self.min_transfer_time > 0.0;
        let finite = self.min_offset.is_finite()
            && self.max_offset.is_finite()
            && self.min_transfer_time.is_finite()
            && self.max_transfer_time.is_finite()
            && !self.max_total.is_nan();
        if !ordered || !finite {
            return Err(TransferError::InvalidInput(format!("invalid transfer bounds {self:?}")));
        }
        if self.min_offset + self.min_transfer_time > self.max_total {
            return Err(TransferError::InvalidInput(format!(
                "no transfer fits before the deadline {}",
                self.max_total
            )));
        }
        Ok(())
    }

    /// Clamp a candidate into the box and under the total-time limit.
    pub fn clamp(&self, burn_offset: f64, transfer_time: f64) -> (f64, f64) {
        let offset = burn_offset.clamp(self.min_offset, self.max_offset);
        let offset = offset.min(self.max_total - self.min_transfer_time).max(self.min_offset);
        let latest_arrival = (self.max_total - offset).min(self.max_transfer_time);
        let tof = transfer_time.clamp(self.min_transfer_time, latest_arrival.max(self.min_transfer_time));
        (offset, tof)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    pub levenberg_marquardt: LevenbergMarquardtSettings,
    /// Finite cost charged for candidates whose Lambert solve fails.
    pub infeasible_cost: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            levenberg_marquardt: LevenbergMarquardtSettings {
                max_iterations: 50,
                ..LevenbergMarquardtSettings::default()
            },
            infeasible_cost: 1e6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizedTransfer {
    pub burn_offset: f64,
    pub transfer_time: f64,
    pub path: TransferPath,
    pub cost: f64,
    pub delta_v1: Vector3,
    pub delta_v2: Vector3,
    pub converged: bool,
    pub iterations: usize,
}

impl OptimizedTransfer {
    pub fn is_feasible(&self, settings: &OptimizerSettings) -> bool {
        self.cost < settings.infeasible_cost
    }
}

/// Refine `(initial_offset, initial_tof)` for a fixed Lambert `path`.
///
/// Hitting the iteration cap is not an error: the best iterate is returned with
/// `converged = false`.
pub fn optimize(
    problem: &TransferProblem,
    initial_offset: f64,
    initial_tof: f64,
    path: TransferPath,
    bounds: &TransferBounds,
    settings: &OptimizerSettings,
) -> Result<OptimizedTransfer, TransferError> {
    bounds.validate()?;
    let box_bounds = Bounds::new(
        vec![bounds.min_offset, bounds.min_transfer_time],
        vec![bounds.max_offset, bounds.max_transfer_time],
    )?;
    let constraints: Vec<LinearConstraint> = if bounds.max_total.is_finite() {
        vec![LinearConstraint {
            coefficients: vec![1.0, 1.0],
            upper: bounds.max_total,
        }]
    } else {
        Vec::new()
    };

    let infeasible = settings.infeasible_cost;
    let residuals = |x: &[f64]| -> Vec<f64> {
        match problem.evaluate(x[0], x[1], path) {
            Ok(evaluation) if evaluation.cost.is_finite() => {
                let arrival = match problem.mode {
                    TransferMode::Rendezvous => vector::norm(&evaluation.delta_v2),
                    TransferMode::InterceptOnly => 0.0,
                };
                vec![vector::norm(&evaluation.delta_v1).sqrt(), arrival.sqrt()]
            }
            _ => vec![infeasible.sqrt(), 0.0],
        }
    };

    let (offset, tof) = bounds.clamp(initial_offset, initial_tof);
    let result = minimize(residuals, &[offset, tof], &box_bounds, &constraints, &settings.levenberg_marquardt)?;
    if !result.converged() {
        warn!(
            iterations = result.iterations,
            cost = 2.0 * result.cost,
            "transfer refinement hit its iteration cap"
        );
    }

    let (burn_offset, transfer_time) = (result.x[0], result.x[1]);
    let (cost, delta_v1, delta_v2) = match problem.evaluate(burn_offset, transfer_time, path) {
        Ok(evaluation) if evaluation.cost.is_finite() => (evaluation.cost, evaluation.delta_v1, evaluation.delta_v2),
        _ => (infeasible, vector::ZERO, vector::ZERO),
    };
    debug!(burn_offset, transfer_time, cost, ?path, termination = ?result.termination, "transfer refined");

    Ok(OptimizedTransfer {
        burn_offset,
        transfer_time,
        path,
        cost,
        delta_v1,
        delta_v2,
        converged: result.converged(),
        iterations: result.iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use maneuver_orbits::{Orbit, OrbitalElements};

    const MU: f64 = 398_600.0;

    fn circular_state(radius: f64, anomaly: f64) -> StateVector {
        let orbit = Orbit::from_elements(
            MU,
            &OrbitalElements {
                semi_major_axis: radius,
                eccentricity: 0.0,
                inclination: 0.0,
                longitude_of_ascending_node: 0.0,
                argument_of_periapsis: 0.0,
                true_anomaly: anomaly,
            },
            0.0,
        )
        .unwrap();
        *orbit.reference_state()
    }

    #[test]
    fn refinement_does_not_increase_cost() {
        let problem = TransferProblem::new(MU, circular_state(7_000.0, 0.0), circular_state(9_000.0, 2.0)).unwrap();
        let bounds = TransferBounds {
            min_offset: 0.0,
            max_offset: 6_000.0,
            min_transfer_time: 600.0,
            max_transfer_time: 6_000.0,
            max_total: 10_000.0,
        };
        let start = problem.evaluate(1_000.0, 3_000.0, TransferPath::Short).unwrap().cost;
        let refined = optimize(&problem, 1_000.0, 3_000.0, TransferPath::Short, &bounds, &OptimizerSettings::default())
            .unwrap();
        assert!(refined.cost <= start + 1e-9, "{} > {start}", refined.cost);
        assert!(refined.is_feasible(&OptimizerSettings::default()));
        assert!(refined.burn_offset + refined.transfer_time <= bounds.max_total + 1e-6);
    }

    #[test]
    fn iteration_cap_returns_best_iterate_unconverged() {
        let problem = TransferProblem::new(MU, circular_state(7_000.0, 0.0), circular_state(9_000.0, 2.0)).unwrap();
        let bounds = TransferBounds {
            min_offset: 0.0,
            max_offset: 6_000.0,
            min_transfer_time: 600.0,
            max_transfer_time: 6_000.0,
            max_total: f64::INFINITY,
        };
        let mut settings = OptimizerSettings::default();
        settings.levenberg_marquardt.max_iterations = 1;
        settings.levenberg_marquardt.cost_tolerance = 0.0;
        settings.levenberg_marquardt.step_tolerance = 0.0;

        let start = problem.evaluate(1_000.0, 3_000.0, TransferPath::Short).unwrap().cost;
        let refined = optimize(&problem, 1_000.0, 3_000.0, TransferPath::Short, &bounds, &settings).unwrap();
        assert!(!refined.converged);
        assert_eq!(refined.iterations, 1);
        assert!(refined.cost < start, "{} >= {start}", refined.cost);
        let check = problem
            .evaluate(refined.burn_offset, refined.transfer_time, TransferPath::Short)
            .unwrap();
        assert!((check.cost - refined.cost).abs() < 1e-12);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let bounds = TransferBounds {
            min_offset: 10.0,
            max_offset: 0.0,
            min_transfer_time: 600.0,
            max_transfer_time: 6_000.0,
            max_total: f64::INFINITY,
        };
        assert!(bounds.validate().is_err());
    }
}
