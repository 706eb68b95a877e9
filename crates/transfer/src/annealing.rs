//! Annealed random walk over (burn offset, transfer time, Lambert path).
//!
//! Each step perturbs the current candidate inside a window that shrinks with the
//! temperature, refines it with the local optimiser and applies the Metropolis rule.
//! The best candidate ever seen is tracked separately from the walk, so stopping the
//! search at any step still yields a usable answer.

use maneuver_core::vector::{self, Vector3};
use maneuver_impulsive::TransferPath;
use rand::Rng;
use tracing::debug;

use crate::TransferError;
use crate::optimizer::{OptimizedTransfer, OptimizerSettings, TransferBounds, TransferProblem, optimize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealingSettings {
    pub initial_temperature: f64,
    /// Geometric decay applied to the temperature after every step.
    pub cooling_rate: f64,
    pub min_temperature: f64,
    pub max_iterations: usize,
    pub optimizer: OptimizerSettings,
}

impl Default for AnnealingSettings {
    fn default() -> Self {
        Self {
            initial_temperature: 5.0,
            cooling_rate: 0.95,
            min_temperature: 1e-3,
            max_iterations: 500,
            optimizer: OptimizerSettings::default(),
        }
    }
}

impl AnnealingSettings {
    fn validate(&self) -> Result<(), TransferError> {
        if !(self.initial_temperature > 0.0) || !self.initial_temperature.is_finite() {
            return Err(TransferError::InvalidInput(format!(
                "initial temperature must be positive, got {}",
                self.initial_temperature
            )));
        }
        if !(self.cooling_rate > 0.0 && self.cooling_rate < 1.0) {
            return Err(TransferError::InvalidInput(format!(
                "cooling rate must lie in (0, 1), got {}",
                self.cooling_rate
            )));
        }
        if !(self.min_temperature > 0.0) {
            return Err(TransferError::InvalidInput(format!(
                "temperature floor must be positive, got {}",
                self.min_temperature
            )));
        }
        Ok(())
    }
}

/// A refined point of the search space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferCandidate {
    pub burn_offset: f64,
    pub transfer_time: f64,
    pub path: TransferPath,
    pub cost: f64,
    pub delta_v1: Vector3,
    pub delta_v2: Vector3,
}

impl From<OptimizedTransfer> for TransferCandidate {
    fn from(refined: OptimizedTransfer) -> Self {
        Self {
            burn_offset: refined.burn_offset,
            transfer_time: refined.transfer_time,
            path: refined.path,
            cost: refined.cost,
            delta_v1: refined.delta_v1,
            delta_v2: refined.delta_v2,
        }
    }
}

/// Deadlines and pins applied to the bounds before the walk starts.
///
/// Deadlines are measured from the problem's reference epoch.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransferConstraints {
    /// The source trajectory stops being valid here, so the burn must happen before it.
    pub source_valid_until: Option<f64>,
    /// The target trajectory stops being valid here, so arrival must happen before it.
    pub target_valid_until: Option<f64>,
    /// Pin the burn to the reference epoch.
    pub burn_now: bool,
}

impl TransferConstraints {
    pub fn apply(&self, bounds: TransferBounds) -> Result<TransferBounds, TransferError> {
        let mut clamped = bounds;
        if let Some(deadline) = self.source_valid_until {
            clamped.max_offset = clamped.max_offset.min(deadline);
        }
        if let Some(deadline) = self.target_valid_until {
            clamped.max_total = clamped.max_total.min(deadline);
            clamped.max_transfer_time = clamped.max_transfer_time.min(deadline - clamped.min_offset);
        }
        if self.burn_now {
            clamped.min_offset = 0.0;
            clamped.max_offset = 0.0;
        }
        clamped.validate()?;
        Ok(clamped)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub best: TransferCandidate,
    /// Best cost after each step, starting with the seed candidate.
    pub best_history: Vec<f64>,
    pub iterations: usize,
}

/// Resumable annealing state; drive it with [`Annealer::step`] to spread the work
/// across several calls.
pub struct Annealer<'a, R: Rng> {
    problem: &'a TransferProblem,
    bounds: TransferBounds,
    settings: AnnealingSettings,
    rng: &'a mut R,
    current: TransferCandidate,
    best: TransferCandidate,
    best_history: Vec<f64>,
    temperature: f64,
    iterations: usize,
}

impl<'a, R: Rng> Annealer<'a, R> {
    /// Validate and clamp the bounds, then seed the walk at the middle of the window.
    pub fn new(
        problem: &'a TransferProblem,
        bounds: TransferBounds,
        constraints: TransferConstraints,
        settings: AnnealingSettings,
        rng: &'a mut R,
    ) -> Result<Self, TransferError> {
        settings.validate()?;
        let bounds = constraints.apply(bounds)?;

        let offset = 0.5 * (bounds.min_offset + bounds.max_offset);
        let tof = 0.5 * (bounds.min_transfer_time + bounds.max_transfer_time);
        let (offset, tof) = bounds.clamp(offset, tof);
        let seed = [TransferPath::Short, TransferPath::Long]
            .into_iter()
            .map(|path| optimize(problem, offset, tof, path, &bounds, &settings.optimizer).map(TransferCandidate::from))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .fold(None::<TransferCandidate>, |best, candidate| match best {
                Some(best) if best.cost <= candidate.cost => Some(best),
                _ => Some(candidate),
            })
            .unwrap_or(TransferCandidate {
                burn_offset: offset,
                transfer_time: tof,
                path: TransferPath::Short,
                cost: settings.optimizer.infeasible_cost,
                delta_v1: vector::ZERO,
                delta_v2: vector::ZERO,
            });
        debug!(cost = seed.cost, offset = seed.burn_offset, tof = seed.transfer_time, "annealing seeded");

        Ok(Self {
            problem,
            bounds,
            settings,
            rng,
            current: seed,
            best: seed,
            best_history: vec![seed.cost],
            temperature: settings.initial_temperature,
            iterations: 0,
        })
    }

    pub fn is_finished(&self) -> bool {
        self.temperature < self.settings.min_temperature || self.iterations >= self.settings.max_iterations
    }

    /// Run one perturb/refine/accept cycle. Returns `false` once the schedule is exhausted.
    pub fn step(&mut self) -> bool {
        if self.is_finished() {
            return false;
        }
        let scale = self.temperature / self.settings.initial_temperature;
        let offset_window = (self.bounds.max_offset - self.bounds.min_offset) * scale;
        let tof_window = (self.bounds.max_transfer_time - self.bounds.min_transfer_time) * scale;

        let offset = self.current.burn_offset + offset_window * (self.rng.r#gen::<f64>() - 0.5);
        let tof = self.current.transfer_time + tof_window * (self.rng.r#gen::<f64>() - 0.5);
        let (offset, tof) = self.bounds.clamp(offset, tof);
        let path = if self.rng.gen_bool(0.5) {
            TransferPath::Short
        } else {
            TransferPath::Long
        };

        match optimize(self.problem, offset, tof, path, &self.bounds, &self.settings.optimizer) {
            Ok(refined) => {
                let candidate = TransferCandidate::from(refined);
                let accept = candidate.cost < self.current.cost
                    || self.rng.r#gen::<f64>() < ((self.current.cost - candidate.cost) / self.temperature).exp();
                if accept {
                    self.current = candidate;
                }
                if candidate.cost < self.best.cost {
                    self.best = candidate;
                }
                debug!(
                    iteration = self.iterations,
                    temperature = self.temperature,
                    cost = candidate.cost,
                    accept,
                    best = self.best.cost,
                    "annealing step"
                );
            }
            Err(err) => debug!(iteration = self.iterations, %err, "candidate refinement rejected"),
        }

        self.best_history.push(self.best.cost);
        self.temperature *= self.settings.cooling_rate;
        self.iterations += 1;
        true
    }

    pub fn best(&self) -> &TransferCandidate {
        &self.best
    }

    pub fn best_history(&self) -> &[f64] {
        &self.best_history
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn bounds(&self) -> &TransferBounds {
        &self.bounds
    }

    pub fn finish(self) -> SearchOutcome {
        SearchOutcome {
            best: self.best,
            best_history: self.best_history,
            iterations: self.iterations,
        }
    }
}

/// Run the annealing schedule to completion.
pub fn global_search<R: Rng>(
    problem: &TransferProblem,
    bounds: TransferBounds,
    constraints: TransferConstraints,
    settings: &AnnealingSettings,
    rng: &mut R,
) -> Result<SearchOutcome, TransferError> {
    let mut annealer = Annealer::new(problem, bounds, constraints, *settings, rng)?;
    while annealer.step() {}
    let outcome = annealer.finish();
    debug!(iterations = outcome.iterations, cost = outcome.best.cost, "global search finished");
    Ok(outcome)
}
