//! Beta(alpha, beta) kernel and the mean/variance constructor.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::RngCore;
use rand_distr::Distribution;
use statrs::{
    distribution::{Beta as BetaDist, ContinuousCDF},
    function::{beta::ln_beta, gamma::digamma},
};

use crate::{
    data::Dataset,
    distributions::{Bound, bound_projection, normal::first_value, sampler_error, vector_params},
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, Projection,
    },
};

pub const BETA_MARGIN: f64 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
pub struct BetaKernel;

/// Unparameterized Beta prototype with parameters `[alpha, beta]`.
pub fn beta() -> Model {
    Model::new("Beta distribution", ModelFamily::Beta, ModelShape::vector(2), Arc::new(BetaKernel))
}

/// Beta model with the given mean and variance.
///
/// # Errors
/// - [`ModelError::InvalidParameter`] unless `0 < mean < 1` and
///   `0 < var < mean (1 - mean)`.
pub fn beta_from_mean_var(mean: f64, var: f64) -> ModelResult<Model> {
    if !(mean > 0.0 && mean < 1.0) {
        return Err(ModelError::InvalidParameter {
            name: "mean",
            value: mean,
            reason: "must lie strictly between 0 and 1",
        });
    }
    let ceiling = mean * (1.0 - mean);
    if !(var > 0.0 && var < ceiling) {
        return Err(ModelError::InvalidParameter {
            name: "variance",
            value: var,
            reason: "must be positive and below mean * (1 - mean)",
        });
    }
    let common = ceiling / var - 1.0;
    beta().with_parameters(&[mean * common, (1.0 - mean) * common])
}

impl ModelKernel for BetaKernel {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::LogLikelihood,
            Capability::Score,
            Capability::Draw,
            Capability::Cdf,
            Capability::Constraint,
        ])
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [a, b] = vector_params::<2>(model)?;
        let xs = data.values();
        let n = xs.len() as f64;
        let body: f64 = xs.iter().map(|x| (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln()).sum();
        Ok(body - n * ln_beta(a, b))
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let [a, b] = vector_params::<2>(model)?;
        let xs = data.values();
        let n = xs.len() as f64;
        let common = digamma(a + b);
        let ln_x: f64 = xs.iter().map(|x| x.ln()).sum();
        let ln_1mx: f64 = xs.iter().map(|x| (1.0 - x).ln()).sum();
        Ok(array![n * (common - digamma(a)) + ln_x, n * (common - digamma(b)) + ln_1mx])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let [a, b] = vector_params::<2>(model)?;
        let dist = rand_distr::Beta::new(a, b).map_err(|_| sampler_error("alpha", a))?;
        Ok(array![dist.sample(rng)])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [a, b] = vector_params::<2>(model)?;
        let x = first_value(data)?;
        let dist = BetaDist::new(a, b).map_err(|_| ModelError::InvalidParameter {
            name: "alpha",
            value: a,
            reason: "alpha and beta must be positive",
        })?;
        Ok(dist.cdf(x))
    }

    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::positive(0), Bound::positive(1)], BETA_MARGIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    // Purpose
    // -------
    // The mean/variance constructor inverts the Beta moment formulas.
    //
    // Given
    // -----
    // - mean 0.25, variance 0.0375.
    //
    // Expect
    // ------
    // - alpha = 1, beta = 3; out-of-range inputs are rejected.
    fn from_mean_var_inverts_moments() {
        // Act
        let m = beta_from_mean_var(0.25, 0.0375).expect("valid moments");

        // Assert
        assert_relative_eq!(m.param(0).expect("alpha"), 1.0, epsilon = 1e-12);
        assert_relative_eq!(m.param(1).expect("beta"), 3.0, epsilon = 1e-12);
        assert!(beta_from_mean_var(1.5, 0.01).is_err());
        assert!(beta_from_mean_var(0.5, 0.3).is_err());
    }
}
