//! Gamma(shape, rate) kernel.
//!
//! The score uses the digamma function; there is no closed-form estimate,
//! so estimation goes through the MLE engine.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::RngCore;
use rand_distr::Distribution;
use statrs::{
    distribution::{ContinuousCDF, Gamma as GammaDist},
    function::gamma::{digamma, ln_gamma},
};

use crate::{
    data::Dataset,
    distributions::{Bound, bound_projection, normal::first_value, sampler_error, vector_params},
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, Projection,
    },
};

pub const GAMMA_MARGIN: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default)]
pub struct GammaKernel;

/// Unparameterized Gamma prototype with parameters `[shape, rate]`.
pub fn gamma() -> Model {
    Model::new("Gamma distribution", ModelFamily::Gamma, ModelShape::vector(2), Arc::new(GammaKernel))
}

impl ModelKernel for GammaKernel {
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
        let log_sum: f64 = xs.iter().map(|x| x.ln()).sum();
        let sum: f64 = xs.iter().sum();
        Ok(n * (a * b.ln() - ln_gamma(a)) + (a - 1.0) * log_sum - b * sum)
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let [a, b] = vector_params::<2>(model)?;
        let xs = data.values();
        let n = xs.len() as f64;
        let log_sum: f64 = xs.iter().map(|x| x.ln()).sum();
        let sum: f64 = xs.iter().sum();
        Ok(array![n * (b.ln() - digamma(a)) + log_sum, n * a / b - sum])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let [a, b] = vector_params::<2>(model)?;
        // rand_distr parameterizes by scale.
        let dist = rand_distr::Gamma::new(a, 1.0 / b).map_err(|_| sampler_error("shape", a))?;
        Ok(array![dist.sample(rng)])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [a, b] = vector_params::<2>(model)?;
        let x = first_value(data)?;
        let dist = GammaDist::new(a, b).map_err(|_| ModelError::InvalidParameter {
            name: "shape",
            value: a,
            reason: "shape and rate must be positive",
        })?;
        Ok(dist.cdf(x))
    }

    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::positive(0), Bound::positive(1)], GAMMA_MARGIN)
    }
}
