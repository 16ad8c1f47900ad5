//! rust_statmodels — composable probability models with maximum-likelihood
//! and Bayesian estimation.
//!
//! Purpose
//! -------
//! Serve as the crate root: declare the module tree and a prelude with the
//! handful of names most callers need. A model is a [`model::Model`]
//! descriptor (parameters, settings, status) backed by a shared
//! [`model::ModelKernel`] that supplies its numeric behaviors.
//!
//! Key behaviors
//! -------------
//! - [`distributions`]: leaf models (Normal, Gamma, Beta, Bernoulli, ...,
//!   and empirical PMFs/histograms).
//! - [`composite`]: models built from models (stacks, crosses, mixtures,
//!   fixed-parameter views, coordinate transforms, data constraints and
//!   models fed by another model's draws).
//! - [`estimation::estimate`]: one entry point that uses a model's own
//!   estimator when it has one and the MLE engine otherwise.
//! - [`mle`]: the generic maximum-likelihood engine on top of
//!   [`optimization`] (argmin), plus restart and dimension cycling.
//! - [`bayes::update`]: conjugate updates from [`registry`] tables, with
//!   Metropolis-Hastings as the general fallback.
//!
//! Invariants & assumptions
//! ------------------------
//! - Estimation never mutates the caller's model; it returns an estimated
//!   copy.
//! - Every stochastic operation takes a caller-owned `&mut dyn RngCore`;
//!   the crate never seeds a generator of its own.
//! - Errors propagate as [`model::ModelError`], wrapping
//!   [`data::DataError`] and [`optimization::errors::OptError`].
//!
//! Conventions
//! -----------
//! - Parameters are packed into a flat `Array1<f64>` in page order, vector
//!   before matrix (row-major), for the optimizers.
//! - Logging goes through the `log` facade; install any logger to see
//!   engine diagnostics.

pub mod bayes;
pub mod composite;
pub mod data;
pub mod distributions;
pub mod estimation;
pub mod inference;
pub mod mle;
pub mod model;
pub mod optimization;
pub mod registry;

pub mod prelude {
    pub use crate::bayes::{McmcSettings, Proposal, update};
    pub use crate::composite::{cross, dcompose, fix_params, mixture, stack};
    pub use crate::data::{Col, DataError, Dataset};
    pub use crate::distributions::{
        bernoulli, beta, binomial, exponential, gamma, normal, pmf, poisson, uniform,
    };
    pub use crate::estimation::{PartsWanted, estimate};
    pub use crate::mle::{MleSettings, maximum_likelihood, restart};
    pub use crate::model::{
        Capability, Model, ModelError, ModelFamily, ModelKernel, ModelResult, ModelStatus,
    };
    pub use crate::optimization::loglik_optimizer::MleMethod;
}
