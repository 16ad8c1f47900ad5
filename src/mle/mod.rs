//! mle — maximum-likelihood estimation for any model with a likelihood.
//!
//! Purpose
//! -------
//! Estimate a model that has no closed-form estimator by maximizing its
//! log likelihood (or the log of its density) with one of the optimizers
//! in [`optimization`](crate::optimization). The estimation dispatcher
//! falls back to this engine; callers can also invoke it directly.
//!
//! Key behaviors
//! -------------
//! - [`MleSettings`] is the settings group the engine reads; every field
//!   has a default, so models need not carry one.
//! - [`maximum_likelihood`] runs one estimation; [`restart`] re-runs from a
//!   previous result; a positive `dim_cycle_tolerance` switches to
//!   coordinate-wise estimation.
//! - [`ModelObjective`] adapts a model's constraint into a penalized
//!   objective so optimizers can step outside the feasible region and be
//!   pulled back.
//!
//! Conventions
//! -----------
//! - Failures of the optimizer to converge are reported through the
//!   returned model's `status`; only configuration problems, NaN
//!   likelihoods and infeasible starts are errors.
pub mod dim_cycle;
pub mod engine;
pub mod objective;
pub mod restart;
pub mod settings;

pub use self::engine::{covariance, maximum_likelihood, maximum_likelihood_with_rng};
pub use self::objective::ModelObjective;
pub use self::restart::{DEFAULT_RESTART_BOUNDARY, restart, restart_with};
pub use self::settings::{MLE_GROUP, MleSettings};
