//! Poisson(lambda) kernel.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::RngCore;
use rand_distr::Distribution;
use statrs::{
    distribution::{DiscreteCDF, Poisson as PoissonDist},
    function::gamma::ln_gamma,
};

use crate::{
    data::Dataset,
    distributions::{Bound, bound_projection, nonempty_values, normal::first_value, sampler_error},
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, ModelStatus, Projection,
    },
};

pub const LAMBDA_MARGIN: f64 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
pub struct PoissonKernel;

/// Unparameterized Poisson prototype with parameter `[lambda]`.
pub fn poisson() -> Model {
    Model::new("Poisson distribution", ModelFamily::Poisson, ModelShape::vector(1), Arc::new(PoissonKernel))
}

impl ModelKernel for PoissonKernel {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::LogLikelihood,
            Capability::Score,
            Capability::Draw,
            Capability::Cdf,
            Capability::Constraint,
            Capability::Estimate,
        ])
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let lambda = model.param(0)?;
        let ln_l = lambda.ln();
        Ok(data.values().iter().map(|&x| x * ln_l - lambda - ln_gamma(x + 1.0)).sum())
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let lambda = model.param(0)?;
        let xs = data.values();
        Ok(array![xs.iter().sum::<f64>() / lambda - xs.len() as f64])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let lambda = model.param(0)?;
        let dist = rand_distr::Poisson::new(lambda).map_err(|_| sampler_error("lambda", lambda))?;
        Ok(array![dist.sample(rng)])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let lambda = model.param(0)?;
        let x = first_value(data)?;
        if x < 0.0 {
            return Ok(0.0);
        }
        let dist = PoissonDist::new(lambda).map_err(|_| ModelError::InvalidParameter {
            name: "lambda",
            value: lambda,
            reason: "must be positive",
        })?;
        Ok(dist.cdf(x.floor() as u64))
    }

    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::positive(0)], LAMBDA_MARGIN)
    }

    fn estimate(&self, data: &Dataset, mut model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let xs = nonempty_values(data)?;
        model.set_packed(&array![xs.iter().sum::<f64>() / xs.len() as f64])?;
        model.status = ModelStatus::Converged;
        Ok(model)
    }
}
