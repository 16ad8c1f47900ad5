//! Public API surface for log-likelihood maximization.
//!
//! - [`LogLikelihood`]: trait objectives implement.
//! - [`SolverOptions`] and [`Tolerances`]: configuration for the optimizer.
//! - [`MleMethod`]: which solver runs, parsed from the historical method names.
//! - [`LineSearcher`]: choice of line search used by the gradient methods.
//! - [`OptimOutcome`]: normalized result returned by the high-level `maximize` API.
//!
//! Convention: we *maximize* a log-likelihood `ℓ(θ)` by minimizing the cost
//! `c(θ) = -ℓ(θ)`. If an analytic gradient is provided, it should be the gradient
//! of the log-likelihood (`∇ℓ(θ)`); the adapter flips the sign as needed.
use std::{fmt, str::FromStr};

use argmin::core::{TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        Cost, FnEvalMap, Grad, Theta,
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};

/// Exit message prefix the gradient guard uses when the inner solver fails.
pub const STUCK_EXIT: &str = "optimizer stuck";

/// Objective interface.
///
/// You maximize `ℓ(θ)`; internally we minimize the cost `c(θ) = -ℓ(θ)`.
/// If you provide an analytic gradient, return the gradient of the
/// log-likelihood `∇ℓ(θ)` (the adapter flips the sign to match the cost).
///
/// - `type Data`: per-objective data carried into `value`/`grad`/`check`.
///
/// Required:
/// - `value(&Theta, &Data) -> OptResult<Cost>`: evaluate `ℓ(θ)`. A `NaN`
///   aborts the run with [`OptError::NumericDivergence`]; `-inf` is allowed
///   and reads as "infinitely bad".
/// - `check(&Theta, &Data) -> OptResult<()>`: validation hook to reject
///   obviously invalid `θ`/`data` pairs. Called once before optimization.
///
/// Optional:
/// - `grad(&Theta, &Data) -> OptResult<Grad>`: analytic gradient `∇ℓ(θ)`.
///   If not implemented, robust finite differences are used automatically.
pub trait LogLikelihood {
    type Data: 'static;

    // Required methods
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    // Optional methods
    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }
}

/// Choice of line search used inside the gradient solvers.
///
/// Parsing:
/// This enum implements `FromStr` and accepts case-insensitive names
/// (`"MoreThuente"`, `"HagerZhang"`). Unknown names return
/// `OptError::InvalidLineSearch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearcher {
    #[default]
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Beta update of the nonlinear conjugate gradient method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgBeta {
    FletcherReeves,
    PolakRibiere,
}

/// Variant of the score root finder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootVariant {
    /// Plain Newton steps.
    Newton,
    /// Newton steps with backtracking on the residual norm.
    Hybrid,
    /// `Hybrid` after rescaling by the Jacobian column norms.
    HybridScaled,
}

/// Cooling schedule and move budget for simulated annealing.
///
/// - `n_tries`: proposals drawn per Metropolis step until one has a finite
///   cost.
/// - `iters_fixed_t`: Metropolis steps at each temperature.
/// - `k`: Boltzmann constant in the acceptance ratio `exp(-Δ / (k T))`.
/// - `t_initial`, `mu_t`, `t_min`: start temperature, cooling divisor and
///   stopping temperature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealSchedule {
    pub n_tries: usize,
    pub iters_fixed_t: usize,
    pub k: f64,
    pub t_initial: f64,
    pub mu_t: f64,
    pub t_min: f64,
}

impl Default for AnnealSchedule {
    fn default() -> Self {
        Self { n_tries: 5, iters_fixed_t: 5, k: 1.0, t_initial: 50.0, mu_t: 1.002, t_min: 0.5 }
    }
}

impl AnnealSchedule {
    /// Construct a validated schedule.
    ///
    /// # Errors
    /// - [`OptError::InvalidSchedule`] when a count is zero, `k`, `t_initial`
    ///   or `t_min` is not positive and finite, `t_min >= t_initial`, or
    ///   `mu_t <= 1`.
    pub fn new(
        n_tries: usize, iters_fixed_t: usize, k: f64, t_initial: f64, mu_t: f64, t_min: f64,
    ) -> OptResult<Self> {
        let bad = |field, value: f64, reason| Err(OptError::InvalidSchedule { field, value, reason });
        if n_tries == 0 {
            return bad("n_tries", 0.0, "must be at least one");
        }
        if iters_fixed_t == 0 {
            return bad("iters_fixed_t", 0.0, "must be at least one");
        }
        for (field, value) in [("k", k), ("t_initial", t_initial), ("t_min", t_min)] {
            if !value.is_finite() || value <= 0.0 {
                return bad(field, value, "must be positive and finite");
            }
        }
        if !mu_t.is_finite() || mu_t <= 1.0 {
            return bad("mu_t", mu_t, "must exceed one so the temperature falls");
        }
        if t_min >= t_initial {
            return bad("t_min", t_min, "must be below t_initial");
        }
        Ok(Self { n_tries, iters_fixed_t, k, t_initial, mu_t, t_min })
    }
}

/// Optimization method.
///
/// Parsing accepts the historical names case-insensitively:
/// `"NM simplex"`, `"FR cg"`, `"PR cg"`, `"BFGS cg"`, `"Steepest descent"`,
/// `"Annealing"`, `"Newton"`, `"Newton hybrid"`, `"Newton hybrid no scale"`.
/// Note that the plain hybrid name selects the scaled variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MleMethod {
    NelderMead,
    ConjugateGradient(CgBeta),
    Lbfgs,
    SteepestDescent,
    Annealing(AnnealSchedule),
    RootFinding(RootVariant),
}

impl MleMethod {
    /// Whether the method uses derivatives of the objective.
    pub fn uses_gradient(&self) -> bool {
        !matches!(self, MleMethod::NelderMead | MleMethod::Annealing(_))
    }
}

impl FromStr for MleMethod {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
        match key.as_str() {
            "nm simplex" | "nelder mead" | "nelder-mead" | "simplex" => Ok(MleMethod::NelderMead),
            "fr cg" => Ok(MleMethod::ConjugateGradient(CgBeta::FletcherReeves)),
            "pr cg" => Ok(MleMethod::ConjugateGradient(CgBeta::PolakRibiere)),
            "bfgs cg" | "bfgs" | "lbfgs" => Ok(MleMethod::Lbfgs),
            "steepest descent" | "sd" => Ok(MleMethod::SteepestDescent),
            "annealing" | "simulated annealing" => Ok(MleMethod::Annealing(AnnealSchedule::default())),
            "newton" => Ok(MleMethod::RootFinding(RootVariant::Newton)),
            "newton hybrid" => Ok(MleMethod::RootFinding(RootVariant::HybridScaled)),
            "newton hybrid no scale" => Ok(MleMethod::RootFinding(RootVariant::Hybrid)),
            _ => Err(OptError::InvalidMethod {
                name: s.to_string(),
                reason: "Valid options are 'NM simplex', 'FR cg', 'PR cg', 'BFGS cg', \
                         'Steepest descent', 'Annealing', 'Newton', 'Newton hybrid' or \
                         'Newton hybrid no scale'.",
            }),
        }
    }
}

impl fmt::Display for MleMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MleMethod::NelderMead => "NM simplex",
            MleMethod::ConjugateGradient(CgBeta::FletcherReeves) => "FR cg",
            MleMethod::ConjugateGradient(CgBeta::PolakRibiere) => "PR cg",
            MleMethod::Lbfgs => "BFGS cg",
            MleMethod::SteepestDescent => "Steepest descent",
            MleMethod::Annealing(_) => "Annealing",
            MleMethod::RootFinding(RootVariant::Newton) => "Newton",
            MleMethod::RootFinding(RootVariant::HybridScaled) => "Newton hybrid",
            MleMethod::RootFinding(RootVariant::Hybrid) => "Newton hybrid no scale",
        };
        f.write_str(name)
    }
}

/// Optimizer-level configuration.
///
/// Fields:
/// - `method: MleMethod`: which solver runs.
/// - `tols: Tolerances`: numerical tolerances and iteration limits.
/// - `step_size: f64`: initial simplex edge for Nelder-Mead, or the bound on
///   the Manhattan length of one annealing move.
/// - `line_searcher: LineSearcher`: line search used by the gradient methods.
/// - `verbose: bool`: if `true`, per-iteration progress is logged and (behind
///   the `obs_slog` feature) a terminal observer is attached.
/// - `lbfgs_mem: Option<usize>`: L-BFGS history size.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub method: MleMethod,
    pub tols: Tolerances,
    pub step_size: f64,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub lbfgs_mem: Option<usize>,
}

impl SolverOptions {
    /// Create a new set of optimizer options.
    ///
    /// # Errors
    /// - [`OptError::InvalidStepSize`] for a non-finite or non-positive step.
    /// - [`OptError::InvalidLBFGSMem`] for a zero L-BFGS memory.
    pub fn new(
        method: MleMethod, tols: Tolerances, step_size: f64, line_searcher: LineSearcher,
        verbose: bool, lbfgs_mem: Option<usize>,
    ) -> OptResult<Self> {
        if !step_size.is_finite() || step_size <= 0.0 {
            return Err(OptError::InvalidStepSize {
                value: step_size,
                reason: "Step size must be positive and finite.",
            });
        }
        if let Some(m) = lbfgs_mem {
            if m == 0 {
                return Err(OptError::InvalidLBFGSMem {
                    mem: m,
                    reason: "L-BFGS memory must be greater than zero.",
                });
            }
        }
        Ok(Self { method, tols, step_size, line_searcher, verbose, lbfgs_mem })
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            method: MleMethod::NelderMead,
            tols: Tolerances { tol_grad: Some(1e-5), tol_cost: None, max_iter: Some(1000) },
            step_size: 0.05,
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            lbfgs_mem: None,
        }
    }
}

/// Numerical tolerances and iteration limits used by the optimizer.
///
/// - `tol_grad`: terminate when the gradient norm falls below this threshold
///   (the simplex and annealing methods read it as a spread tolerance).
/// - `tol_cost`: terminate when the change in cost falls below this threshold.
/// - `max_iter`: hard cap on the number of iterations.
///
/// Any field can be `None` but **at least one** of the three must be provided
/// (see [`Tolerances::new`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Rules
    /// - At least one of `tol_grad`, `tol_cost`, or `max_iter` must be `Some`.
    /// - If provided, tolerances must be **finite and strictly positive**.
    /// - If provided, `max_iter` must be `> 0`.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for non-finite or non-positive tolerances.
    /// - `OptError::InvalidMaxIter` if `max_iter == 0`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    Converged,
    MaxIterations,
    /// The solver could make no further progress; carries the reason.
    Stuck(String),
}

impl Termination {
    fn classify(status: &TerminationStatus) -> Self {
        match status {
            TerminationStatus::NotTerminated => Termination::Stuck("not terminated".to_string()),
            TerminationStatus::Terminated(reason) => match reason {
                TerminationReason::MaxItersReached => Termination::MaxIterations,
                TerminationReason::SolverExit(msg) if msg.starts_with(STUCK_EXIT) => {
                    Termination::Stuck(msg.clone())
                }
                TerminationReason::Interrupt | TerminationReason::Timeout => {
                    Termination::Stuck(format!("{reason:?}"))
                }
                _ => Termination::Converged,
            },
        }
    }
}

/// Canonical result returned by `maximize`.
///
/// - `theta_hat`: best parameter vector found.
/// - `value`: best **log-likelihood** value `ℓ(θ)` (not the cost).
/// - `termination`: classified end of the run.
/// - `status`: human-readable termination status string.
/// - `iterations`: number of optimizer iterations performed.
/// - `fn_evals`: function-evaluation counters reported by `argmin`.
/// - `grad_norm`: norm of the last available gradient, if present.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub termination: Termination,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
}

impl OptimOutcome {
    /// Build a validated [`OptimOutcome`] from raw solver state.
    ///
    /// Performs:
    /// - `theta_hat` check via `validate_theta_hat` (present and all finite).
    /// - `value` check via `validate_value` (finite).
    /// - Maps `TerminationStatus` into a [`Termination`] and a status string.
    /// - Computes `grad_norm` if a gradient was provided.
    ///
    /// # Errors
    /// - Propagates any validation errors for `theta_hat` or `value`.
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, status: TerminationStatus, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let termination = Termination::classify(&status);
        let status = match status {
            TerminationStatus::NotTerminated => "Not terminated".to_string(),
            other => format!("{other:?}"),
        };
        let iterations = iterations as usize;
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self { theta_hat, value, termination, status, iterations, fn_evals, grad_norm })
    }

    pub fn converged(&self) -> bool {
        self.termination == Termination::Converged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Parsing of the historical method names and line searchers.
    // - Validation in `Tolerances`, `SolverOptions` and `AnnealSchedule`.
    // - Classification of argmin termination statuses.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Historical method names parse case- and whitespace-insensitively and
    // display back to their canonical spelling.
    //
    // Given
    // -----
    // - Every historical name in odd casing, plus an unknown name.
    //
    // Expect
    // ------
    // - Each maps to its variant; the unknown name is rejected.
    fn method_names_parse() {
        // Arrange
        let cases = [
            ("nm SIMPLEX", MleMethod::NelderMead),
            ("FR cg", MleMethod::ConjugateGradient(CgBeta::FletcherReeves)),
            ("pr  CG", MleMethod::ConjugateGradient(CgBeta::PolakRibiere)),
            ("BFGS cg", MleMethod::Lbfgs),
            ("steepest descent", MleMethod::SteepestDescent),
            ("Annealing", MleMethod::Annealing(AnnealSchedule::default())),
            ("Newton", MleMethod::RootFinding(RootVariant::Newton)),
            ("Newton hybrid", MleMethod::RootFinding(RootVariant::HybridScaled)),
            ("Newton hybrid no scale", MleMethod::RootFinding(RootVariant::Hybrid)),
        ];

        // Act / Assert
        for (name, expected) in cases {
            let parsed: MleMethod = name.parse().expect("known method");
            assert_eq!(parsed, expected, "{name}");
            let again: MleMethod = parsed.to_string().parse().expect("display round trip");
            assert_eq!(again, expected);
        }
        assert!(matches!("quasi".parse::<MleMethod>(), Err(OptError::InvalidMethod { .. })));
        assert_eq!("hagerzhang".parse::<LineSearcher>(), Ok(LineSearcher::HagerZhang));
    }

    #[test]
    // Purpose
    // -------
    // Constructors reject out-of-range configuration.
    //
    // Given
    // -----
    // - No tolerances, a zero step, a zero L-BFGS memory, and a schedule
    //   whose temperature would rise.
    //
    // Expect
    // ------
    // - The matching error variant in each case; defaults validate.
    fn constructors_validate() {
        // Arrange
        let tols = Tolerances::new(Some(1e-5), None, Some(10)).expect("valid tolerances");

        // Act / Assert
        assert_eq!(Tolerances::new(None, None, None), Err(OptError::NoTolerancesProvided));
        assert!(matches!(
            SolverOptions::new(MleMethod::Lbfgs, tols, 0.0, LineSearcher::MoreThuente, false, None),
            Err(OptError::InvalidStepSize { .. })
        ));
        assert!(matches!(
            SolverOptions::new(MleMethod::Lbfgs, tols, 1.0, LineSearcher::MoreThuente, false, Some(0)),
            Err(OptError::InvalidLBFGSMem { .. })
        ));
        assert!(matches!(
            AnnealSchedule::new(5, 5, 1.0, 50.0, 0.9, 0.5),
            Err(OptError::InvalidSchedule { field: "mu_t", .. })
        ));
        let d = AnnealSchedule::default();
        assert!(AnnealSchedule::new(d.n_tries, d.iters_fixed_t, d.k, d.t_initial, d.mu_t, d.t_min).is_ok());
    }

    #[test]
    // Purpose
    // -------
    // Termination statuses map onto converged, max-iterations and stuck.
    //
    // Given
    // -----
    // - SolverConverged, MaxItersReached, a stuck exit and NotTerminated.
    //
    // Expect
    // ------
    // - Converged, MaxIterations, Stuck, Stuck respectively.
    fn termination_classification() {
        // Arrange
        let conv = TerminationStatus::Terminated(TerminationReason::SolverConverged);
        let max = TerminationStatus::Terminated(TerminationReason::MaxItersReached);
        let stuck = TerminationStatus::Terminated(TerminationReason::SolverExit(format!(
            "{STUCK_EXIT}: line search failed"
        )));

        // Act / Assert
        assert_eq!(Termination::classify(&conv), Termination::Converged);
        assert_eq!(Termination::classify(&max), Termination::MaxIterations);
        assert!(matches!(Termination::classify(&stuck), Termination::Stuck(_)));
        assert!(matches!(
            Termination::classify(&TerminationStatus::NotTerminated),
            Termination::Stuck(_)
        ));
    }
}
