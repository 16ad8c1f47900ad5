//! distributions — leaf model kernels used by the framework.
//!
//! Purpose
//! -------
//! Supply a small catalog of closed-form distributions so the generic
//! machinery (estimation dispatch, MLE, composition, Bayesian updating) has
//! something concrete to drive. Each distribution is a stateless
//! [`ModelKernel`](crate::model::ModelKernel) plus a constructor returning
//! an unparameterized prototype [`Model`].
//!
//! Key behaviors
//! -------------
//! - Log likelihoods treat every number on the first data page as one
//!   observation, except Binomial, which reads `(misses, hits)` rows.
//! - Constraints follow a shared "project to the bound plus a margin and
//!   charge the Euclidean distance" rule ([`bound_projection`]).
//! - Draws use `rand_distr` samplers on a caller-supplied `RngCore`.
//!
//! Conventions
//! -----------
//! - Parameter layouts (vector page):
//!   Normal `[mu, sigma]`, Exponential `[rate]`, Gamma `[shape, rate]`,
//!   Beta `[alpha, beta]`, Bernoulli `[p]`, Binomial `[n, p]`,
//!   Poisson `[lambda]`, Uniform `[a, b]`. The PMF has no parameters; its
//!   support is the attached data set.
use ndarray::Array1;

use crate::model::{Model, ModelError, ModelResult, Projection};

pub mod bernoulli;
pub mod beta;
pub mod binomial;
pub mod exponential;
pub mod gamma;
pub mod normal;
pub mod pmf;
pub mod poisson;
pub mod uniform;

pub use self::bernoulli::bernoulli;
pub use self::beta::{beta, beta_from_mean_var};
pub use self::binomial::binomial;
pub use self::exponential::exponential;
pub use self::gamma::gamma;
pub use self::normal::normal;
pub use self::pmf::{histogram, pmf, pmf_from_dataset, pmf_mean};
pub use self::poisson::poisson;
pub use self::uniform::uniform;

/// Inclusive bounds on one packed parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bound {
    pub index: usize,
    pub lower: f64,
    pub upper: f64,
}

impl Bound {
    pub(crate) const fn positive(index: usize) -> Self {
        Self { index, lower: 0.0, upper: f64::INFINITY }
    }

    pub(crate) const fn unit(index: usize) -> Self {
        Self { index, lower: 0.0, upper: 1.0 }
    }
}

/// Move each bounded coordinate at least `margin` inside its bounds.
///
/// The penalty is the Euclidean distance between the input and the
/// projected point; zero when nothing moved.
pub(crate) fn bound_projection(
    model: &Model, bounds: &[Bound], margin: f64,
) -> ModelResult<Projection> {
    let theta = model.packed_parameters()?;
    let mut point = theta.clone();
    for b in bounds {
        let x = point[b.index];
        if x.is_nan() || x < b.lower + margin {
            point[b.index] = b.lower + margin;
        } else if x > b.upper - margin {
            point[b.index] = b.upper - margin;
        }
    }
    let penalty = distance(&theta, &point);
    Ok(Projection { point, penalty })
}

fn distance(a: &Array1<f64>, b: &Array1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| if x.is_nan() { 1.0 } else { (x - y).powi(2) })
        .sum::<f64>()
        .sqrt()
}

/// Map a sampler construction failure onto a parameter error.
pub(crate) fn sampler_error(name: &'static str, value: f64) -> ModelError {
    ModelError::InvalidParameter { name, value, reason: "rejected by the sampler" }
}

/// Vector parameters `0..N` of `model`.
pub(crate) fn vector_params<const N: usize>(model: &Model) -> ModelResult<[f64; N]> {
    let mut out = [0.0; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = model.param(i)?;
    }
    Ok(out)
}

/// Nonempty observation list for closed-form estimators.
pub(crate) fn nonempty_values(data: &crate::data::Dataset) -> ModelResult<Vec<f64>> {
    let xs = data.values();
    if xs.is_empty() {
        return Err(crate::data::DataError::EmptyData.into());
    }
    Ok(xs)
}
