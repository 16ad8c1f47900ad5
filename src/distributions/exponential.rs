//! Exponential(rate) kernel.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::RngCore;
use rand_distr::Distribution;

use crate::{
    data::Dataset,
    distributions::{Bound, bound_projection, nonempty_values, normal::first_value, sampler_error},
    model::{
        Capability, CapabilitySet, Model, ModelFamily, ModelKernel, ModelResult, ModelShape,
        ModelStatus, Projection,
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ExponentialKernel;

/// Unparameterized Exponential prototype with parameter `[rate]`.
pub fn exponential() -> Model {
    Model::new(
        "Exponential distribution",
        ModelFamily::Exponential,
        ModelShape::vector(1),
        Arc::new(ExponentialKernel),
    )
}

impl ModelKernel for ExponentialKernel {
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
        let rate = model.param(0)?;
        let xs = data.values();
        let sum: f64 = xs.iter().sum();
        Ok(xs.len() as f64 * rate.ln() - rate * sum)
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let rate = model.param(0)?;
        let xs = data.values();
        Ok(array![xs.len() as f64 / rate - xs.iter().sum::<f64>()])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let rate = model.param(0)?;
        let dist = rand_distr::Exp::new(rate).map_err(|_| sampler_error("rate", rate))?;
        Ok(array![dist.sample(rng)])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let rate = model.param(0)?;
        let x = first_value(data)?;
        Ok(if x <= 0.0 { 0.0 } else { 1.0 - (-rate * x).exp() })
    }

    // A zero margin: only a negative rate is projected, onto zero itself.
    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::positive(0)], 0.0)
    }

    fn estimate(&self, data: &Dataset, mut model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let xs = nonempty_values(data)?;
        let mean = xs.iter().sum::<f64>() / xs.len() as f64;
        model.set_packed(&array![1.0 / mean])?;
        model.status = ModelStatus::Converged;
        Ok(model)
    }
}
