//! estimation — the single entry point that turns a model and data into an
//! estimated model.
//!
//! - [`estimate`]: copy, prepare, run the model's own estimator when it has
//!   one, otherwise maximum likelihood; then attach fit summaries.
//! - [`PartsWanted`]: settings group switching the post-estimation
//!   summaries (information criteria, covariance) on or off.
pub mod dispatch;

pub use self::dispatch::{PartsWanted, estimate, estimate_with_rng};

pub(crate) use self::dispatch::attach_parts;
