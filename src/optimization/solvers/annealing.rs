//! solvers::annealing — simulated annealing as an argmin solver.
//!
//! Each executor iteration is one Metropolis step. After
//! `iters_fixed_t` steps the temperature is divided by `mu_t`; the run
//! converges once it falls below `t_min`. The executor's best-state
//! tracking keeps the lowest cost ever visited, so a late uphill move
//! never loses the best point.
//!
//! Moves are Manhattan-bounded: a total length drawn uniformly from
//! `[0, step_size]` is split across the coordinates at random cutpoints,
//! each piece gets a random sign and is scaled by the magnitude of the
//! starting coordinate (one when that coordinate is zero).
//!
//! The sampler borrows the caller's generator for the whole run.
use std::fmt;

use argmin::core::{
    CostFunction, Error, KV, Problem, Solver, State, TerminationReason, TerminationStatus,
};
use rand::{Rng, RngCore};

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        traits::AnnealSchedule,
        types::{Cost, SimplexState, Theta},
    },
};

/// Metropolis sampler with geometric cooling.
pub struct SimulatedAnnealing<'r> {
    schedule: AnnealSchedule,
    step_size: f64,
    scale: Theta,
    temperature: f64,
    steps_at_t: usize,
    rng: &'r mut dyn RngCore,
}

impl fmt::Debug for SimulatedAnnealing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedAnnealing")
            .field("schedule", &self.schedule)
            .field("step_size", &self.step_size)
            .field("temperature", &self.temperature)
            .field("steps_at_t", &self.steps_at_t)
            .finish_non_exhaustive()
    }
}

impl<'r> SimulatedAnnealing<'r> {
    /// Build a sampler around `theta0` that draws from `rng`.
    ///
    /// # Errors
    /// - [`OptError::InvalidStepSize`] when `step_size` is not positive and
    ///   finite.
    pub fn new(
        schedule: AnnealSchedule, step_size: f64, theta0: &Theta, rng: &'r mut dyn RngCore,
    ) -> OptResult<Self> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(OptError::InvalidStepSize {
                value: step_size,
                reason: "Annealing moves need a positive, finite bound.",
            });
        }
        let scale = theta0.mapv(|v| if v == 0.0 { 1.0 } else { v.abs() });
        Ok(Self {
            schedule,
            step_size,
            scale,
            temperature: schedule.t_initial,
            steps_at_t: 0,
            rng,
        })
    }

    /// Number of executor iterations the full cooling schedule takes.
    pub fn planned_iterations(&self) -> u64 {
        let s = &self.schedule;
        let levels = ((s.t_initial / s.t_min).ln() / s.mu_t.ln()).ceil().max(1.0);
        levels as u64 * s.iters_fixed_t as u64 + 1
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    fn propose(&mut self, from: &Theta) -> Theta {
        let dim = from.len();
        let total = self.rng.random::<f64>() * self.step_size;
        let mut cuts: Vec<f64> = (0..dim.saturating_sub(1)).map(|_| self.rng.random::<f64>()).collect();
        cuts.push(0.0);
        cuts.push(1.0);
        cuts.sort_by(f64::total_cmp);
        let mut next = from.clone();
        for (i, w) in cuts.windows(2).enumerate() {
            let sign = if self.rng.random::<bool>() { 1.0 } else { -1.0 };
            next[i] += sign * (w[1] - w[0]) * total * self.scale[i];
        }
        next
    }

    fn accept(&mut self, current: Cost, candidate: Cost) -> bool {
        if candidate <= current {
            return true;
        }
        let ratio = (-(candidate - current) / (self.schedule.k * self.temperature)).exp();
        self.rng.random::<f64>() < ratio
    }
}

impl<O> Solver<O, SimplexState> for SimulatedAnnealing<'_>
where
    O: CostFunction<Param = Theta, Output = Cost>,
{
    const NAME: &'static str = "Simulated annealing";

    fn init(
        &mut self, problem: &mut Problem<O>, state: SimplexState,
    ) -> Result<(SimplexState, Option<KV>), Error> {
        let theta0 = state.get_param().cloned().ok_or_else(|| OptError::NotInitialized {
            text: "annealing needs a starting point".into(),
        })?;
        let cost = problem.cost(&theta0)?;
        Ok((state.param(theta0).cost(cost), None))
    }

    fn next_iter(
        &mut self, problem: &mut Problem<O>, state: SimplexState,
    ) -> Result<(SimplexState, Option<KV>), Error> {
        let current = state.get_param().cloned().ok_or_else(|| OptError::NotInitialized {
            text: "annealing lost its current point".into(),
        })?;
        let current_cost = state.get_cost();

        let mut proposal = None;
        for _ in 0..self.schedule.n_tries {
            let candidate = self.propose(&current);
            let cost = problem.cost(&candidate)?;
            if cost.is_finite() {
                proposal = Some((candidate, cost));
                break;
            }
        }

        let (param, cost) = match proposal {
            Some((candidate, cost)) if self.accept(current_cost, cost) => (candidate, cost),
            _ => (current, current_cost),
        };

        self.steps_at_t += 1;
        if self.steps_at_t >= self.schedule.iters_fixed_t {
            self.steps_at_t = 0;
            self.temperature /= self.schedule.mu_t;
        }
        let kv = argmin::kv!("temperature" => self.temperature;);
        Ok((state.param(param).cost(cost), Some(kv)))
    }

    fn terminate(&mut self, _state: &SimplexState) -> TerminationStatus {
        if self.temperature < self.schedule.t_min {
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
        } else {
            TerminationStatus::NotTerminated
        }
    }
}
