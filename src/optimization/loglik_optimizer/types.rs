//! loglik_optimizer::types — shared numeric aliases and solver wiring.
//!
//! Purpose
//! -------
//! Name the numeric types and concrete argmin solver types once, so the
//! engine, the custom solvers and the builders agree on them.
//!
//! Key behaviors
//! -------------
//! - `Theta`, `Grad`, `Hessian` and `Cost` over `f64`.
//! - `GradState` / `SimplexState`: the argmin iteration states the custom
//!   solvers and the guard operate on.
//! - Expose pre-wired solver aliases (L-BFGS, nonlinear conjugate
//!   gradient, steepest descent, Nelder-Mead) over the common
//!   `(Theta, Grad, Cost)` numeric shapes.
//!
//! Invariants & assumptions
//! ------------------------
//! - All optimizer vectors and matrices are represented as `ndarray`
//!   containers over `f64`.
//! - `Cost` is always a scalar `f64`; higher layers handle the sign flip
//!   between cost and log-likelihood.
use argmin::solver::{
    conjugategradient::NonlinearConjugateGradient,
    gradientdescent::SteepestDescent,
    linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch},
    neldermead::NelderMead,
    quasinewton::LBFGS,
};
use ndarray::{Array1, Array2};
use std::collections::HashMap;

/// Packed model parameters as seen by the optimizers.
pub type Theta = Array1<f64>;

/// Gradient of the log likelihood or of the cost; same length as `Theta`.
pub type Grad = Array1<f64>;

/// Square matrix of second derivatives, `k × k` for `k` parameters.
pub type Hessian = Array2<f64>;

/// Negated log likelihood, the quantity every solver minimizes.
pub type Cost = f64;

/// argmin's evaluation counters (`"cost_count"`, `"gradient_count"`, ...).
pub type FnEvalMap = HashMap<String, u64>;

/// Iteration state shared by every derivative-based solver here.
pub type GradState = argmin::core::IterState<Theta, Grad, (), (), (), Cost>;

/// Iteration state of derivative-free solvers.
pub type SimplexState = argmin::core::IterState<Theta, (), (), (), (), Cost>;

/// Default history size (`m`) for L-BFGS runs.
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Hager–Zhang line search specialized to this crate’s numeric types.
pub type HagerZhangLS = HagerZhangLineSearch<Theta, Grad, Cost>;

/// More–Thuente line search specialized to this crate’s numeric types.
pub type MoreThuenteLS = MoreThuenteLineSearch<Theta, Grad, Cost>;

/// L-BFGS solver wired to the Hager–Zhang line search.
pub type LbfgsHagerZhang = LBFGS<HagerZhangLS, Theta, Grad, Cost>;

/// L-BFGS solver wired to the More–Thuente line search.
pub type LbfgsMoreThuente = LBFGS<MoreThuenteLS, Theta, Grad, Cost>;

/// Nelder-Mead simplex over the canonical types.
pub type Simplex = NelderMead<Theta, Cost>;

/// Nonlinear conjugate gradient with a boxed beta rule.
pub type ConjugateGradient<L, B> = NonlinearConjugateGradient<Theta, L, B, Cost>;

/// Steepest descent with the given line search.
pub type Descent<L> = SteepestDescent<L>;
