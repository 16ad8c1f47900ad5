//! inference::covariance — parameter covariance from the observed information.
//!
//! Purpose
//! -------
//! Turn a maximum-likelihood estimate into an estimated covariance matrix
//! for its parameters: the inverse of the observed information
//! `J(θ̂) = -∇²ℓ(θ̂)`, with the Hessian obtained by finite differences of
//! the score.
//!
//! Key behaviors
//! -------------
//! - Build `∇²ℓ` with [`compute_hessian`] applied to the score map, so the
//!   result is symmetrized and validated.
//! - Invert `J` through a symmetric eigendecomposition (`nalgebra`),
//!   discarding eigenvalues at or below [`EIGEN_EPS`]. Weakly identified
//!   directions therefore contribute nothing instead of exploding; the
//!   result is the Moore–Penrose pseudoinverse when `J` is singular.
//!
//! Invariants & assumptions
//! ------------------------
//! - `score` is the gradient of the **total** log likelihood, so the
//!   returned matrix is on the scale of the estimator itself.
//! - At a genuine maximum `J` is positive semi-definite; negative
//!   eigenvalues (a saddle or a minimum) are dropped like tiny ones.
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

use crate::optimization::{errors::OptResult, loglik_optimizer::finite_diff::compute_hessian};

/// Eigenvalues of the information matrix at or below this are treated as
/// zero.
pub const EIGEN_EPS: f64 = 1e-10;

/// Covariance `J(θ̂)⁺` where `J = -∇score(θ̂)`.
///
/// # Errors
/// - Hessian validation failures from [`compute_hessian`] (non-finite
///   entries, wrong dimension).
pub fn numerical_covariance<F>(score: &F, theta_hat: &Array1<f64>) -> OptResult<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Array1<f64>,
{
    let hessian = compute_hessian(score, theta_hat)?;
    let n = hessian.nrows();
    let info = DMatrix::from_fn(n, n, |i, j| -hessian[[i, j]]);
    Ok(pseudo_inverse(info))
}

/// Square roots of the diagonal of a covariance matrix.
pub fn standard_errors(covariance: &Array2<f64>) -> Array1<f64> {
    covariance.diag().mapv(|v| v.max(0.0).sqrt())
}

// ---- Helper methods ----

/// `Σ_{k: λ_k > EIGEN_EPS} q_k q_kᵀ / λ_k` for a symmetric matrix.
fn pseudo_inverse(info: DMatrix<f64>) -> Array2<f64> {
    let n = info.nrows();
    let eigen = info.symmetric_eigen();
    let q = eigen.eigenvectors;
    let mut out = Array2::<f64>::zeros((n, n));
    for (k, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda <= EIGEN_EPS {
            continue;
        }
        for i in 0..n {
            let coeff = q[(i, k)] / lambda;
            for j in 0..n {
                out[[i, j]] += coeff * q[(j, k)];
            }
        }
    }
    out
}
