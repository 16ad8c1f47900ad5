//! loglik_optimizer::run — shared executor wiring.
//!
//! Every solver, argmin's or ours, goes through [`run_solver`]: it sets the
//! starting point and iteration cap, attaches the observers requested by
//! [`SolverOptions::verbose`], runs the executor and converts the final
//! state into an [`OptimOutcome`].
use argmin::core::{Executor, IterState, Solver, State, observers::ObserverMode};
#[cfg(feature = "obs_slog")]
use argmin::core::{CostFunction, Gradient};
#[cfg(feature = "obs_slog")]
use argmin_math::ArgminL2Norm;

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        observer::IterationLogger,
        traits::{LogLikelihood, OptimOutcome, SolverOptions},
        types::{Cost, Grad, Theta},
    },
};

/// The two iteration states the runner knows how to summarize.
pub trait OutcomeState: State<Param = Theta, Float = Cost> + Clone + 'static {
    /// Set the starting point and iteration cap.
    fn seeded(self, theta0: Theta, max_iters: Option<u64>) -> Self;

    /// Last gradient held by the state, if the solver keeps one.
    fn last_gradient(&mut self) -> Option<Grad>;
}

impl OutcomeState for IterState<Theta, Grad, (), (), (), Cost> {
    fn seeded(self, theta0: Theta, max_iters: Option<u64>) -> Self {
        let state = self.param(theta0);
        match max_iters {
            Some(n) => state.max_iters(n),
            None => state,
        }
    }

    fn last_gradient(&mut self) -> Option<Grad> {
        self.take_gradient()
    }
}

impl OutcomeState for IterState<Theta, (), (), (), (), Cost> {
    fn seeded(self, theta0: Theta, max_iters: Option<u64>) -> Self {
        let state = self.param(theta0);
        match max_iters {
            Some(n) => state.max_iters(n),
            None => state,
        }
    }

    fn last_gradient(&mut self) -> Option<Grad> {
        None
    }
}

/// Run `solver` on `problem` from `theta0`.
///
/// `max_iters` overrides `opts.tols.max_iter` when given; annealing uses it
/// to run its whole cooling schedule.
///
/// # Errors
/// - Any argmin runtime error, converted through `From<argmin::core::Error>`;
///   in particular [`OptError::NumericDivergence`](crate::optimization::errors::OptError)
///   when the objective evaluates to NaN.
/// - Validation errors from [`OptimOutcome::new`].
pub fn run_solver<'a, F, S, I>(
    theta0: Theta, opts: &SolverOptions, max_iters: Option<u64>, problem: ArgMinAdapter<'a, F>,
    solver: S,
) -> OptResult<OptimOutcome>
where
    F: LogLikelihood,
    S: Solver<ArgMinAdapter<'a, F>, I>,
    I: OutcomeState,
{
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        log_initial_state(&theta0, &problem)?;
    }
    let cap = max_iters.or(opts.tols.max_iter.map(|m| m as u64));
    log::debug!("running {} from {theta0} (max iterations {cap:?})", S::NAME);

    let mut executor =
        Executor::new(problem, solver).configure(|state: I| state.seeded(theta0, cap));
    if opts.verbose {
        executor = executor.add_observer(IterationLogger::new(opts.method.to_string()), ObserverMode::Always);
        #[cfg(feature = "obs_slog")]
        {
            let observer = argmin_observer_slog::SlogLogger::term_noblock();
            executor = executor.add_observer(observer, ObserverMode::Always);
        }
    }

    let mut result = executor.run()?.state().clone();
    let iterations = result.get_iter();
    let function_counts = result.get_func_counts().clone();
    let termination = result.get_termination_status().clone();
    let grad = result.last_gradient();
    let outcome = OptimOutcome::new(
        result.get_best_param().cloned(),
        -result.get_best_cost(),
        termination,
        iterations,
        function_counts,
        grad,
    )?;
    log::debug!(
        "{} finished after {} iterations: {} (ll = {:.6})",
        S::NAME,
        outcome.iterations,
        outcome.status,
        outcome.value
    );
    Ok(outcome)
}

// ---- Helper Methods ----

#[cfg(feature = "obs_slog")]
fn log_initial_state<F>(theta0: &Theta, problem: &ArgMinAdapter<'_, F>) -> OptResult<()>
where
    F: LogLikelihood,
{
    let ll0 = -problem.cost(theta0)?;
    let g0n = problem.gradient(theta0).ok().map(|g| g.l2_norm());
    log::info!(
        "init: ell(theta0) = {:.6}{}",
        ll0,
        g0n.map(|n| format!(", ||grad|| = {:.6}", n)).unwrap_or_default()
    );
    Ok(())
}
