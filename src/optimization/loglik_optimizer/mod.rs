//! loglik_optimizer — argmin-powered log-likelihood maximization.
//!
//! Purpose
//! -------
//! Provide a high-level optimization layer for **maximizing log-likelihoods**
//! `ℓ(θ)`. Callers implement a single trait, [`LogLikelihood`], and invoke
//! [`maximize`] with a [`SolverOptions`] naming the method: Nelder-Mead,
//! nonlinear conjugate gradient (Fletcher-Reeves or Polak-Ribière), L-BFGS,
//! steepest descent, simulated annealing or score root finding.
//!
//! Key behaviors
//! -------------
//! - Convert `ℓ(θ)` into the argmin cost `c(θ) = -ℓ(θ)` via
//!   [`adapter::ArgMinAdapter`], with finite-difference gradients when no
//!   analytic score is available.
//! - Build the requested solver in [`builders`]; derivative methods are
//!   wrapped in the gradient guard from
//!   [`solvers`](crate::optimization::solvers).
//! - Run every solver through [`run::run_solver`] and normalize the final
//!   state into an [`OptimOutcome`] whose [`Termination`] separates
//!   convergence, the iteration cap and a stuck solver.
//!
//! Invariants & assumptions
//! ------------------------
//! - The optimizer **always maximizes** `ℓ(θ)`; user code implements `ℓ(θ)`
//!   and `∇ℓ(θ)` (when available), never the cost.
//! - A NaN log likelihood aborts the run with
//!   [`OptError::NumericDivergence`](crate::optimization::errors::OptError);
//!   `-inf` is a legal "infinitely bad" value.
//!
//! Conventions
//! -----------
//! - Parameters, gradients and Hessians are `ndarray` containers over `f64`
//!   ([`Theta`], [`Grad`], [`Hessian`](types::Hessian)).
//! - Errors are reported through
//!   [`OptResult`](crate::optimization::errors::OptResult).
pub mod adapter;
pub mod api;
pub mod builders;
pub mod finite_diff;
pub mod observer;
pub mod run;
pub mod traits;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::maximize;
pub use self::traits::{
    AnnealSchedule, CgBeta, LineSearcher, LogLikelihood, MleMethod, OptimOutcome, RootVariant,
    SolverOptions, Termination, Tolerances,
};
pub use self::types::{Cost, DEFAULT_LBFGS_MEM, FnEvalMap, Grad, Hessian, Theta};

pub mod prelude {
    pub use super::api::maximize;
    pub use super::traits::{
        LogLikelihood, MleMethod, OptimOutcome, SolverOptions, Termination, Tolerances,
    };
    pub use super::types::{Cost, Grad, Theta};
}
