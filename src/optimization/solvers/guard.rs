//! solvers::guard — gradient-norm stopping rule and failure recovery for
//! derivative-based argmin solvers.
//!
//! Purpose
//! -------
//! Wrap any solver that runs on [`GradState`] so that every gradient method
//! shares the same behaviors:
//!
//! - stop with `SolverConverged` once the gradient of the cost falls below
//!   `tol_grad`, whatever the inner solver's own rule;
//! - when the inner solver fails mid-iteration (a line search that cannot
//!   find a descent step, a singular system) or, for descent methods, takes
//!   a step that raises the cost, rebuild it from its pristine copy and
//!   re-initialize it at the last good state. Conjugate-gradient directions
//!   and L-BFGS histories are thereby reset to steepest descent;
//! - when the rebuilt solver fails again before making progress, end the
//!   run at the last good state with a `SolverExit` reason prefixed by
//!   [`STUCK_EXIT`] instead of discarding the progress made so far.
//!
//! Invariants
//! ----------
//! - [`OptError::NumericDivergence`] is never swallowed: a NaN objective
//!   aborts the whole run.
//! - With `monotone` set, the state handed back to the executor never has
//!   a higher cost than the one it received.
//! - When a gradient tolerance is set, the state's gradient always belongs
//!   to the state's parameter. Solvers that leave the previous gradient in
//!   place (steepest descent) get it recomputed after each iteration.
use argmin::core::{
    CostFunction, Error, Gradient, KV, Problem, Solver, State, TerminationReason,
    TerminationStatus,
};
use argmin_math::ArgminL2Norm;

use crate::optimization::{
    errors::OptError,
    loglik_optimizer::{
        traits::STUCK_EXIT,
        types::{Cost, Grad, GradState, Theta},
    },
};

/// Solver wrapper adding the shared stopping and recovery rules.
#[derive(Debug, Clone)]
pub struct GradientGuard<S> {
    inner: S,
    pristine: S,
    tol_grad: Option<f64>,
    monotone: bool,
    fresh: bool,
}

impl<S: Clone> GradientGuard<S> {
    pub fn new(inner: S, tol_grad: Option<f64>) -> Self {
        Self { pristine: inner.clone(), inner, tol_grad, monotone: false, fresh: true }
    }

    /// Treat a step that raises the cost as a failure of the inner solver.
    pub fn monotone(mut self) -> Self {
        self.monotone = true;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<O, S> Solver<O, GradState> for GradientGuard<S>
where
    O: CostFunction<Param = Theta, Output = Cost> + Gradient<Param = Theta, Gradient = Grad>,
    S: Solver<O, GradState> + Clone,
{
    const NAME: &'static str = "Gradient guard";

    fn init(
        &mut self, problem: &mut Problem<O>, state: GradState,
    ) -> Result<(GradState, Option<KV>), Error> {
        self.fresh = true;
        self.inner.init(problem, state)
    }

    fn next_iter(
        &mut self, problem: &mut Problem<O>, state: GradState,
    ) -> Result<(GradState, Option<KV>), Error> {
        let backup = state.clone();
        let failure = match self.inner.next_iter(problem, state) {
            Ok((next, _)) if self.monotone && !(next.get_cost() <= backup.get_cost()) => {
                OptError::ConditionViolated {
                    text: format!("step raised the cost from {} to {}", backup.get_cost(), next.get_cost()),
                }
            }
            Ok((mut next, kv)) => {
                self.fresh = false;
                if self.tol_grad.is_some() && next.get_gradient() == backup.get_gradient() {
                    if let Some(param) = next.get_param().cloned() {
                        let grad = problem.gradient(&param)?;
                        next = next.gradient(grad);
                    }
                }
                return Ok((next, kv));
            }
            Err(err) => {
                let err = OptError::from(err);
                if matches!(err, OptError::NumericDivergence { .. }) {
                    return Err(err.into());
                }
                err
            }
        };

        if self.fresh {
            log::warn!("{} gave up after iteration {}: {failure}", S::NAME, backup.get_iter());
            let reason = TerminationReason::SolverExit(format!("{STUCK_EXIT}: {failure}"));
            return Ok((backup.terminate_with(reason), None));
        }
        log::debug!("{} restarting at iteration {}: {failure}", S::NAME, backup.get_iter());
        self.inner = self.pristine.clone();
        self.fresh = true;
        self.inner.init(problem, backup)
    }

    fn terminate(&mut self, state: &GradState) -> TerminationStatus {
        if let (Some(tol), Some(grad)) = (self.tol_grad, state.get_gradient()) {
            if grad.l2_norm() < tol {
                return TerminationStatus::Terminated(TerminationReason::SolverConverged);
            }
        }
        self.inner.terminate(state)
    }
}
