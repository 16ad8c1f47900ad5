//! Validation helpers for log-likelihood optimization.
//!
//! - **Tolerances**: [`verify_tol_grad`], [`verify_tol_cost`] accept `None`
//!   or a finite, strictly positive value.
//! - **Inputs**: [`validate_theta0`] rejects non-finite starting points.
//! - **Derivatives**: [`validate_grad`], [`validate_hessian`] check shape and
//!   finiteness.
//! - **Outcomes**: [`validate_theta_hat`], [`validate_value`] check the
//!   solver's final point and objective value.
use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{Grad, Theta, types::Hessian},
};

fn positive_finite(tol: f64) -> Result<(), &'static str> {
    if !tol.is_finite() {
        return Err("Tolerance must be finite.");
    }
    if tol <= 0.0 {
        return Err("Tolerance must be positive.");
    }
    Ok(())
}

/// # Errors
/// [`OptError::InvalidTolGrad`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_grad(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) => positive_finite(tol).map_err(|reason| OptError::InvalidTolGrad { tol, reason }),
        None => Ok(()),
    }
}

/// # Errors
/// [`OptError::InvalidTolCost`] if the value is non-finite or ≤ 0.0.
pub fn verify_tol_cost(tol: Option<f64>) -> OptResult<()> {
    match tol {
        Some(tol) => positive_finite(tol).map_err(|reason| OptError::InvalidTolCost { tol, reason }),
        None => Ok(()),
    }
}

/// Reject starting points with non-finite entries.
///
/// # Errors
/// [`OptError::InvalidThetaInput`] naming the first offending index.
pub fn validate_theta0(theta: &Theta) -> OptResult<()> {
    match theta.iter().position(|v| !v.is_finite()) {
        Some(index) => Err(OptError::InvalidThetaInput { index, value: theta[index] }),
        None => Ok(()),
    }
}

/// Validate a gradient vector against dimension and finiteness.
///
/// # Errors
/// - [`OptError::GradientDimMismatch`] if length does not match `dim`.
/// - [`OptError::InvalidGradient`] for the first non-finite element.
pub fn validate_grad(grad: &Grad, dim: usize) -> OptResult<()> {
    if grad.len() != dim {
        return Err(OptError::GradientDimMismatch { expected: dim, found: grad.len() });
    }
    for (index, &value) in grad.iter().enumerate() {
        if !value.is_finite() {
            return Err(OptError::InvalidGradient {
                index,
                value,
                reason: "Gradient elements must be finite.",
            });
        }
    }
    Ok(())
}

/// Unwrap an estimated parameter vector, accepting only finite entries.
///
/// # Errors
/// - [`OptError::MissingThetaHat`] if no vector was provided.
/// - [`OptError::InvalidThetaHat`] if any element is non-finite.
pub fn validate_theta_hat(theta_hat: Option<Theta>) -> OptResult<Theta> {
    let t = theta_hat.ok_or(OptError::MissingThetaHat)?;
    if let Some(index) = t.iter().position(|v| !v.is_finite()) {
        return Err(OptError::InvalidThetaHat {
            index,
            value: t[index],
            reason: "Parameter estimates must be finite.",
        });
    }
    Ok(t)
}

/// # Errors
/// [`OptError::NonFiniteCost`] if the value is `NaN` or infinite.
pub fn validate_value(value: f64) -> OptResult<()> {
    if !value.is_finite() {
        return Err(OptError::NonFiniteCost { value });
    }
    Ok(())
}

/// Validate the shape and entries of a Hessian (or square Jacobian).
///
/// # Errors
/// - [`OptError::HessianDimMismatch`] if dimensions are not `dim × dim`.
/// - [`OptError::InvalidHessian`] for the first non-finite entry.
pub fn validate_hessian(hessian: &Hessian, dim: usize) -> OptResult<()> {
    if hessian.nrows() != dim || hessian.ncols() != dim {
        return Err(OptError::HessianDimMismatch {
            expected: dim,
            found: (hessian.nrows(), hessian.ncols()),
        });
    }
    for ((i, j), &value) in hessian.indexed_iter() {
        if !value.is_finite() {
            return Err(OptError::InvalidHessian { row: i, col: j, value });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Each validator rejects the first bad entry and accepts clean input.
    //
    // Given
    // -----
    // - Tolerances 0 and NaN, a starting point with +inf, a short gradient,
    //   and a theta hat with NaN.
    //
    // Expect
    // ------
    // - The matching error variants; clean inputs pass.
    fn validators_reject_bad_entries() {
        // Act / Assert
        assert!(matches!(verify_tol_grad(Some(0.0)), Err(OptError::InvalidTolGrad { .. })));
        assert!(matches!(verify_tol_cost(Some(f64::NAN)), Err(OptError::InvalidTolCost { .. })));
        assert!(verify_tol_grad(None).is_ok());
        assert_eq!(
            validate_theta0(&array![1.0, f64::INFINITY]),
            Err(OptError::InvalidThetaInput { index: 1, value: f64::INFINITY })
        );
        assert_eq!(
            validate_grad(&array![1.0], 2),
            Err(OptError::GradientDimMismatch { expected: 2, found: 1 })
        );
        assert!(matches!(
            validate_theta_hat(Some(array![0.0, f64::NAN])),
            Err(OptError::InvalidThetaHat { index: 1, .. })
        ));
        assert_eq!(validate_theta_hat(None), Err(OptError::MissingThetaHat));
        assert!(validate_value(-3.0).is_ok());
    }
}
