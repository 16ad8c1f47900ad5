//! model — the polymorphic model descriptor and its extension points.
//!
//! Purpose
//! -------
//! Define what a "model" is for every engine in the crate: a named bundle
//! of optional behaviors (density, log likelihood, score, draw, cdf,
//! constraint, estimate), parameter state, and attached settings groups.
//!
//! Key behaviors
//! -------------
//! - [`ModelKernel`]: the behavior trait, with an explicit
//!   [`CapabilitySet`] instead of "is this behavior present" probing.
//! - [`Model`]: the instance type. Cloning is the deep copy; dropping is
//!   the free.
//! - [`Settings`] / [`SettingsGroup`]: typed configuration blocks looked up
//!   by type, one per name.
//! - [`ModelFamily`]: typed family identity used for specialized dispatch
//!   (conjugate updates) instead of model-name matching.
//!
//! Invariants & assumptions
//! ------------------------
//! - Kernels are stateless and shared; all per-instance state lives on
//!   [`Model`].
//! - A model holds at most one settings group per name.
//!
//! Downstream usage
//! ----------------
//! - `distributions` and `composite` implement [`ModelKernel`].
//! - `estimation`, `mle` and `bayes` consume [`Model`] generically.
pub mod capability;
pub mod descriptor;
pub mod errors;
pub mod family;
pub mod kernel;
pub mod settings;
pub mod shape;

pub use self::capability::{Capability, CapabilitySet};
pub use self::descriptor::{
    DEFAULT_SCORE_DELTA, FailureKind, Model, ModelInfo, ModelStatus,
};
pub use self::errors::{ModelError, ModelResult};
pub use self::family::ModelFamily;
pub use self::kernel::{ModelKernel, ModelPayload, Projection};
pub use self::settings::{Settings, SettingsGroup, copy_group};
pub use self::shape::{Dim, ModelShape};
