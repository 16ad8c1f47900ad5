//! loglik_optimizer::builders — solver construction helpers.
//!
//! Purpose
//! -------
//! Build every solver the optimizer can run from a [`SolverOptions`]
//! value, hiding argmin's generic wiring from the dispatch in
//! [`api`](super::api).
//!
//! Key behaviors
//! -------------
//! - Derivative-based solvers come back wrapped in a [`GradientGuard`]
//!   carrying `tols.tol_grad`, so all of them share the gradient-norm
//!   stopping rule and the restart / "stuck" recovery. The line-search
//!   methods are guarded as monotone.
//! - Conjugate gradient resets its direction by Powell's orthogonality
//!   test and every `dim` iterations.
//! - L-BFGS additionally receives `tol_grad` / `tol_cost` through argmin's
//!   own setters.
//! - The Nelder-Mead simplex starts at `theta0` plus one vertex per
//!   dimension offset by `step_size`; `tol_grad` doubles as the
//!   standard-deviation tolerance of the vertex costs. The caller screens
//!   the vertices before building, since argmin evaluates them without
//!   error handling.
//!
//! Conventions
//! -----------
//! - Builders never set the initial parameter vector or the iteration cap;
//!   the runner does.
//! - Invalid tolerances rejected by argmin surface as [`OptError`] through
//!   the crate's `From<argmin::core::Error>` conversion.
use argmin::solver::{
    conjugategradient::NonlinearConjugateGradient, gradientdescent::SteepestDescent,
    quasinewton::LBFGS,
};
use rand::RngCore;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        traits::{AnnealSchedule, RootVariant, SolverOptions},
        types::{
            ConjugateGradient, Cost, DEFAULT_LBFGS_MEM, Descent, Grad, HagerZhangLS,
            LbfgsHagerZhang, LbfgsMoreThuente, MoreThuenteLS, Simplex, Theta,
        },
    },
    solvers::{GradientGuard, ScoreRootFinder, SimulatedAnnealing},
};

/// Finite-difference step used for the root finder's Jacobian.
pub const JACOBIAN_DELTA: f64 = 1e-4;

/// Wrap a derivative-based solver with the shared stopping rule.
pub fn guarded<S: Clone>(solver: S, opts: &SolverOptions) -> GradientGuard<S> {
    GradientGuard::new(solver, opts.tols.tol_grad)
}

/// [`guarded`] for line-search methods, which must never move uphill.
pub fn guarded_descent<S: Clone>(solver: S, opts: &SolverOptions) -> GradientGuard<S> {
    guarded(solver, opts).monotone()
}

/// L-BFGS with the Hager–Zhang line search.
pub fn build_lbfgs_hager_zhang(opts: &SolverOptions) -> OptResult<GradientGuard<LbfgsHagerZhang>> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsHagerZhang::new(HagerZhangLS::new(), mem);
    Ok(guarded_descent(configure_lbfgs(lbfgs, opts)?, opts))
}

/// L-BFGS with the More–Thuente line search.
pub fn build_lbfgs_more_thuente(
    opts: &SolverOptions,
) -> OptResult<GradientGuard<LbfgsMoreThuente>> {
    let mem = opts.lbfgs_mem.unwrap_or(DEFAULT_LBFGS_MEM);
    let lbfgs = LbfgsMoreThuente::new(MoreThuenteLS::new(), mem);
    Ok(guarded_descent(configure_lbfgs(lbfgs, opts)?, opts))
}

/// Apply the optional gradient and cost tolerances to an L-BFGS solver.
pub fn configure_lbfgs<L>(
    mut solver: LBFGS<L, Theta, Grad, Cost>, opts: &SolverOptions,
) -> OptResult<LBFGS<L, Theta, Grad, Cost>> {
    if let Some(g) = opts.tols.tol_grad {
        solver = solver.with_tolerance_grad(g)?;
    }
    if let Some(c) = opts.tols.tol_cost {
        solver = solver.with_tolerance_cost(c)?;
    }
    Ok(solver)
}

/// Powell's restart test: fall back to steepest descent when consecutive
/// gradients satisfy `|g_k · g_{k+1}| >= ν |g_{k+1}|²`.
pub const CG_RESTART_ORTHOGONALITY: f64 = 0.1;

/// Nonlinear conjugate gradient with line search `ls` and beta rule `beta`.
///
/// The direction is also reset every `dim` iterations, `dim` being the
/// parameter count.
pub fn build_conjugate_gradient<L: Clone, B: Clone>(
    ls: L, beta: B, dim: usize, opts: &SolverOptions,
) -> GradientGuard<ConjugateGradient<L, B>> {
    let cg = NonlinearConjugateGradient::new(ls, beta)
        .restart_orthogonality(CG_RESTART_ORTHOGONALITY)
        .restart_iters(dim.max(1) as u64);
    guarded_descent(cg, opts)
}

/// Steepest descent with line search `ls`.
pub fn build_descent<L: Clone>(ls: L, opts: &SolverOptions) -> GradientGuard<Descent<L>> {
    guarded_descent(SteepestDescent::new(ls), opts)
}

/// Starting simplex: `theta0` plus one vertex per dimension offset by
/// `step`.
///
/// # Errors
/// - [`OptError::InvalidThetaInput`] for an empty parameter vector.
pub fn simplex_vertices(theta0: &Theta, step: f64) -> OptResult<Vec<Theta>> {
    if theta0.is_empty() {
        return Err(OptError::InvalidThetaInput { index: 0, value: f64::NAN });
    }
    let mut vertices = Vec::with_capacity(theta0.len() + 1);
    vertices.push(theta0.clone());
    for i in 0..theta0.len() {
        let mut v = theta0.clone();
        v[i] += step;
        vertices.push(v);
    }
    Ok(vertices)
}

/// Nelder-Mead simplex over `vertices`.
///
/// # Errors
/// - Propagates argmin's rejection of the spread tolerance.
pub fn build_simplex(vertices: Vec<Theta>, opts: &SolverOptions) -> OptResult<Simplex> {
    let mut simplex = Simplex::new(vertices);
    if let Some(tol) = opts.tols.tol_grad {
        simplex = simplex.with_sd_tolerance(tol)?;
    }
    Ok(simplex)
}

/// Simulated annealing around `theta0`.
pub fn build_annealing<'r>(
    schedule: AnnealSchedule, theta0: &Theta, opts: &SolverOptions, rng: &'r mut dyn RngCore,
) -> OptResult<SimulatedAnnealing<'r>> {
    SimulatedAnnealing::new(schedule, opts.step_size, theta0, rng)
}

/// Score root finder, guarded like the other derivative methods.
pub fn build_root_finder(
    variant: RootVariant, opts: &SolverOptions,
) -> GradientGuard<ScoreRootFinder> {
    guarded(ScoreRootFinder::new(variant, JACOBIAN_DELTA), opts)
}
