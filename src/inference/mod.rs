//! inference — uncertainty around maximum-likelihood estimates.
//!
//! - [`covariance::numerical_covariance`]: pseudoinverse of the observed
//!   information built from a finite-difference Hessian of the score.
//! - [`covariance::standard_errors`]: square roots of its diagonal.
pub mod covariance;

pub use self::covariance::{EIGEN_EPS, numerical_covariance, standard_errors};

pub mod prelude {
    pub use super::covariance::{numerical_covariance, standard_errors};
}
