//! optimization — argmin wiring, custom solvers and the error surface.
//!
//! Purpose
//! -------
//! Provide the numerical optimization layer every likelihood-based engine
//! in the crate runs on. Callers implement a log likelihood, pick a method
//! and tolerances, and get back the best parameters with a classified
//! termination, without touching argmin's generic plumbing.
//!
//! Key behaviors
//! -------------
//! - [`loglik_optimizer`]: the [`LogLikelihood`](loglik_optimizer::LogLikelihood)
//!   trait, the cost adapter, solver builders, the shared runner and
//!   finite-difference helpers.
//! - [`solvers`]: solvers argmin does not ship (simulated annealing, score
//!   root finding) and the gradient guard shared by derivative methods.
//! - [`errors`]: one error enum, [`OptError`](errors::OptError), covering
//!   configuration mistakes, numerical failures and wrapped argmin errors.
pub mod errors;
pub mod loglik_optimizer;
pub mod solvers;

pub mod prelude {
    pub use super::errors::{OptError, OptResult};
    pub use super::loglik_optimizer::prelude::*;
}
