//! data — the paged numeric/text container shared by models and engines.
//!
//! Purpose
//! -------
//! Provide the data model that every other module consumes: observations
//! handed to log-likelihoods, parameter blocks owned by models, and the
//! pack/unpack bridge between structured parameters and the flat vectors
//! the numerical optimizers work on.
//!
//! Key behaviors
//! -------------
//! - [`Dataset`]: vector + matrix + weights + text blocks with names, plus a
//!   chain of further titled pages.
//! - Exact pack/unpack between a page chain and an `Array1<f64>`.
//! - Page lookup and splitting, used by stacked and crossed models to hand
//!   each sub-model its share of the data.
//!
//! Invariants & assumptions
//! ------------------------
//! - Informational pages (titles starting with `<`) never take part in
//!   pack/unpack.
//! - Errors are reported through [`DataError`]; nothing here panics on
//!   caller input.
//!
//! Downstream usage
//! ----------------
//! - `model` stores parameters, covariance and expected values as datasets
//!   or arrays and resolves "size from data" shapes against them.
//! - `mle` packs a model's parameters into the optimizer's `Theta` and
//!   unpacks each trial point back.
pub mod dataset;
pub mod errors;

pub use self::dataset::{Col, Dataset, Names};
pub use self::errors::{DataError, DataResult};
