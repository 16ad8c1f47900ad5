//! mle::settings — the MLE configuration group.
//!
//! Purpose
//! -------
//! Carry everything the maximum-likelihood engine reads from a model: the
//! optimizer choice, starting point, step size, tolerance, iteration cap,
//! score step, verbosity, dimension-cycling tolerance and whether to
//! compute a covariance matrix. The group is attached to a [`Model`] through
//! its [`Settings`](crate::model::Settings); the engine falls back to
//! [`MleSettings::default`] when none is attached.
//!
//! Key behaviors
//! -------------
//! - [`MleSettings::new`] validates the numeric fields by building the
//!   optimizer's own [`Tolerances`] and [`SolverOptions`], so an invalid
//!   group is rejected at construction rather than mid-estimation.
//! - [`MleSettings::resolve_method`] applies the default choice: Fletcher–
//!   Reeves conjugate gradient when the model has an analytic score,
//!   Nelder–Mead otherwise.
//! - [`MleSettings::solver_options`] translates the group into the
//!   optimizer-level [`SolverOptions`].
//!
//! Invariants & assumptions
//! ------------------------
//! - `tolerance` is read as the gradient-norm threshold by the derivative
//!   methods and as the spread of vertex costs by the simplex.
//! - `dim_cycle_tolerance == 0` disables dimension cycling.
use ndarray::Array1;

use crate::{
    model::{Capability, Model, ModelError, ModelResult},
    optimization::{
        errors::OptError,
        loglik_optimizer::{CgBeta, LineSearcher, MleMethod, SolverOptions, Tolerances},
    },
    settings_group,
};

/// Settings group name used by the MLE engine.
pub const MLE_GROUP: &str = "mle";

/// MLE configuration group.
///
/// Fields
/// ------
/// - `method`: optimizer; `None` picks one from the model's capabilities.
/// - `starting_point`: explicit packed start; otherwise the current
///   parameters (when finite and not all zero) or a vector of ones.
/// - `step_size`: simplex edge / annealing move bound (default 0.05).
/// - `tolerance`: convergence threshold (default 1e-5).
/// - `max_iterations`: hard cap (default 1000).
/// - `delta`: finite-difference step for numerical scores (default 1e-3).
/// - `verbose`: per-iteration logging at `info`.
/// - `dim_cycle_tolerance`: enable dimension cycling when positive.
/// - `want_covariance`: store the numerical covariance after estimation.
/// - `line_searcher`, `lbfgs_mem`: passed through to the gradient methods.
#[derive(Debug, Clone, PartialEq)]
pub struct MleSettings {
    pub method: Option<MleMethod>,
    pub starting_point: Option<Array1<f64>>,
    pub step_size: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub delta: f64,
    pub verbose: bool,
    pub dim_cycle_tolerance: f64,
    pub want_covariance: bool,
    pub line_searcher: LineSearcher,
    pub lbfgs_mem: Option<usize>,
}

settings_group!(MleSettings, MLE_GROUP);

impl Default for MleSettings {
    fn default() -> Self {
        Self {
            method: None,
            starting_point: None,
            step_size: 0.05,
            tolerance: 1e-5,
            max_iterations: 1000,
            delta: 1e-3,
            verbose: false,
            dim_cycle_tolerance: 0.0,
            want_covariance: false,
            line_searcher: LineSearcher::MoreThuente,
            lbfgs_mem: None,
        }
    }
}

impl MleSettings {
    /// Construct a validated group; the remaining fields take their defaults.
    ///
    /// # Errors
    /// - [`ModelError::InvalidSettings`] when the tolerance or step size is
    ///   not positive and finite, or `max_iterations` is zero.
    pub fn new(
        method: Option<MleMethod>, step_size: f64, tolerance: f64, max_iterations: usize,
    ) -> ModelResult<Self> {
        let out = Self { method, step_size, tolerance, max_iterations, ..Self::default() };
        out.solver_options(method.unwrap_or(MleMethod::NelderMead))?;
        Ok(out)
    }

    /// Same settings with the optimizer named by one of the historical
    /// method strings ("NM simplex", "PR cg", ...).
    ///
    /// # Errors
    /// - [`ModelError::InvalidSettings`] for an unknown name.
    pub fn with_method_name(mut self, name: &str) -> ModelResult<Self> {
        self.method = Some(name.parse().map_err(invalid)?);
        Ok(self)
    }

    pub fn with_method(mut self, method: MleMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn with_starting_point(mut self, start: Array1<f64>) -> Self {
        self.starting_point = Some(start);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_covariance(mut self, want: bool) -> Self {
        self.want_covariance = want;
        self
    }

    pub fn with_line_searcher(mut self, line_searcher: LineSearcher) -> Self {
        self.line_searcher = line_searcher;
        self
    }

    /// # Errors
    /// - [`ModelError::InvalidSettings`] unless `delta` is positive and finite.
    pub fn with_delta(mut self, delta: f64) -> ModelResult<Self> {
        if !delta.is_finite() || delta <= 0.0 {
            return Err(ModelError::InvalidSettings {
                group: MLE_GROUP,
                reason: format!("delta must be positive and finite, got {delta}"),
            });
        }
        self.delta = delta;
        Ok(self)
    }

    /// # Errors
    /// - [`ModelError::InvalidSettings`] for a negative or non-finite value.
    pub fn with_dim_cycle_tolerance(mut self, tolerance: f64) -> ModelResult<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(ModelError::InvalidSettings {
                group: MLE_GROUP,
                reason: format!("dim_cycle_tolerance must be finite and >= 0, got {tolerance}"),
            });
        }
        self.dim_cycle_tolerance = tolerance;
        Ok(self)
    }

    /// The configured method, or the default for `model`.
    pub fn resolve_method(&self, model: &Model) -> MleMethod {
        self.method.unwrap_or(if model.has(Capability::Score) {
            MleMethod::ConjugateGradient(CgBeta::FletcherReeves)
        } else {
            MleMethod::NelderMead
        })
    }

    /// Optimizer options for running `method` under these settings.
    ///
    /// # Errors
    /// - [`ModelError::InvalidSettings`] wrapping the optimizer's validation
    ///   message.
    pub fn solver_options(&self, method: MleMethod) -> ModelResult<SolverOptions> {
        let tols =
            Tolerances::new(Some(self.tolerance), None, Some(self.max_iterations)).map_err(invalid)?;
        SolverOptions::new(method, tols, self.step_size, self.line_searcher, self.verbose, self.lbfgs_mem)
            .map_err(invalid)
    }
}

fn invalid(err: OptError) -> ModelError {
    ModelError::InvalidSettings { group: MLE_GROUP, reason: err.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{normal, uniform};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Defaults and validation in `new` and the fallible builders.
    // - Default method resolution from the model's capabilities.
    // - Parsing the historical method names.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Invalid numeric settings are rejected as settings errors.
    //
    // Given
    // -----
    // - A zero tolerance, a negative step and a zero iteration cap.
    //
    // Expect
    // ------
    // - `InvalidSettings { group: "mle", .. }` each time; valid input keeps
    //   the remaining defaults.
    fn new_validates_numeric_fields() {
        // Act
        let zero_tol = MleSettings::new(None, 0.05, 0.0, 1000);
        let neg_step = MleSettings::new(None, -1.0, 1e-5, 1000);
        let no_iters = MleSettings::new(None, 0.05, 1e-5, 0);
        let ok = MleSettings::new(Some(MleMethod::Lbfgs), 1.0, 1e-4, 10).expect("valid");

        // Assert
        for bad in [zero_tol, neg_step, no_iters] {
            assert!(matches!(bad, Err(ModelError::InvalidSettings { group: MLE_GROUP, .. })));
        }
        assert_eq!(ok.delta, 1e-3);
        assert!(!ok.want_covariance);
        assert!(MleSettings::default().with_delta(0.0).is_err());
        assert!(MleSettings::default().with_dim_cycle_tolerance(-1.0).is_err());
    }

    #[test]
    // Purpose
    // -------
    // Without an explicit method the model's capabilities decide.
    //
    // Given
    // -----
    // - Normal (analytic score) and Uniform (no score).
    //
    // Expect
    // ------
    // - "FR cg" for Normal, "NM simplex" for Uniform; an explicit choice wins.
    fn default_method_follows_score() {
        // Arrange
        let s = MleSettings::default();

        // Act / Assert
        assert_eq!(s.resolve_method(&normal()).to_string(), "FR cg");
        assert_eq!(s.resolve_method(&uniform()).to_string(), "NM simplex");
        let named = s.with_method_name("pr CG").expect("known name");
        assert_eq!(named.resolve_method(&uniform()).to_string(), "PR cg");
        assert!(MleSettings::default().with_method_name("gradient ascent").is_err());
    }
}
