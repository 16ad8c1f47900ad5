//! loglik_optimizer::finite_diff — finite-difference gradient, Jacobian and
//! Hessian helpers.
//!
//! Purpose
//! -------
//! Provide derivative approximations around a parameter vector, together
//! with validation and symmetry cleanup, so the adapter, the score root
//! finder and the covariance step can request derivatives without
//! depending directly on the `finitediff` API.
//!
//! Key behaviors
//! -------------
//! - Forward-difference gradients with error capture and post-hoc
//!   validation via [`run_fd_diff`].
//! - Central-difference Hessians from a gradient map, falling back to
//!   forward differences when validation fails, via [`compute_hessian`].
//! - Central-difference Jacobians of a fallible vector map with an explicit
//!   step via [`compute_jacobian`].
//!
//! Invariants & assumptions
//! ------------------------
//! - Any error raised by the objective during finite differencing is
//!   routed into the shared `closure_err` cell (or propagated directly by
//!   [`compute_jacobian`]) and treated as a hard failure.
//! - Gradients and Hessians returned from this module satisfy
//!   [`validate_grad`] and [`validate_hessian`].
use std::cell::RefCell;

use crate::optimization::{
    errors::OptResult,
    loglik_optimizer::{
        Grad, Theta,
        types::Hessian,
        validation::{validate_grad, validate_hessian},
    },
};
use argmin::core::Error;
use finitediff::FiniteDiff;

/// Forward-difference gradient of `func` at `theta`, with error capture.
///
/// The FD closure can’t return `Result`, so any error raised by `func` is
/// stored into `closure_err` and the closure returns `NaN`. This helper
/// clears the cell, differentiates, returns a captured error if any, and
/// validates the result.
///
/// # Errors
/// - The first error captured during evaluation of `func`.
/// - [`validate_grad`] failures.
pub fn run_fd_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> OptResult<Grad> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    let dim = theta.len();
    if let Some(err) = closure_err.take() {
        return Err(err.into());
    }
    validate_grad(&fd_grad, dim)?;
    Ok(fd_grad)
}

/// Hessian of the function whose gradient map is `f`, symmetrized.
///
/// Central differences first; forward differences when the central
/// approximation has non-finite entries.
///
/// # Errors
/// - [`validate_hessian`] failures on the forward fallback.
pub fn compute_hessian<F: Fn(&Theta) -> Grad>(f: &F, theta: &Theta) -> OptResult<Hessian> {
    let dim = theta.len();
    let mut cent_hess = theta.central_hessian(f);
    match validate_hessian(&cent_hess, dim) {
        Ok(_) => {
            symmetrize_hess(&mut cent_hess);
            Ok(cent_hess)
        }
        Err(_) => {
            let mut forward_hess = theta.forward_hessian(f);
            validate_hessian(&forward_hess, dim)?;
            symmetrize_hess(&mut forward_hess);
            Ok(forward_hess)
        }
    }
}

/// Central-difference Jacobian of `f` with step `delta`; row `i` holds the
/// partials of output `i`.
///
/// # Errors
/// - Any error returned by `f`.
/// - [`validate_hessian`] failures (the Jacobian here is square).
pub fn compute_jacobian<F>(mut f: F, theta: &Theta, delta: f64) -> OptResult<Hessian>
where
    F: FnMut(&Theta) -> OptResult<Grad>,
{
    let dim = theta.len();
    let mut jac = Hessian::zeros((dim, dim));
    for j in 0..dim {
        let mut up = theta.clone();
        up[j] += delta;
        let mut down = theta.clone();
        down[j] -= delta;
        let g_up = f(&up)?;
        let g_down = f(&down)?;
        validate_grad(&g_up, dim)?;
        validate_grad(&g_down, dim)?;
        for i in 0..dim {
            jac[[i, j]] = (g_up[i] - g_down[i]) / (2.0 * delta);
        }
    }
    validate_hessian(&jac, dim)?;
    Ok(jac)
}

// ---- Helper methods ----

fn symmetrize_hess(hess: &mut Hessian) {
    for i in 0..hess.nrows() {
        for j in 0..i {
            let avg = 0.5 * (hess[[i, j]] + hess[[j, i]]);
            hess[[i, j]] = avg;
            hess[[j, i]] = avg;
        }
    }
}
