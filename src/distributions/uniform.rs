//! Uniform(a, b) kernel.
//!
//! The estimate is the sample range. The log likelihood is `-inf` when any
//! observation falls outside `[a, b]`.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::{Rng, RngCore};

use crate::{
    data::Dataset,
    distributions::{nonempty_values, normal::first_value, vector_params},
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, ModelStatus,
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct UniformKernel;

/// Unparameterized Uniform prototype with parameters `[a, b]`.
pub fn uniform() -> Model {
    Model::new("Uniform distribution", ModelFamily::Uniform, ModelShape::vector(2), Arc::new(UniformKernel))
}

impl ModelKernel for UniformKernel {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::LogLikelihood,
            Capability::Draw,
            Capability::Cdf,
            Capability::Estimate,
        ])
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [a, b] = vector_params::<2>(model)?;
        let xs = data.values();
        if xs.iter().any(|&x| x < a || x > b) {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(-(xs.len() as f64) * (b - a).ln())
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let [a, b] = vector_params::<2>(model)?;
        if !(b >= a) {
            return Err(ModelError::InvalidParameter {
                name: "b",
                value: b,
                reason: "upper bound below lower bound",
            });
        }
        Ok(array![a + (b - a) * rng.random::<f64>()])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [a, b] = vector_params::<2>(model)?;
        let x = first_value(data)?;
        Ok(((x - a) / (b - a)).clamp(0.0, 1.0))
    }

    fn estimate(&self, data: &Dataset, mut model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let xs = nonempty_values(data)?;
        let lo = xs.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        model.set_packed(&array![lo, hi])?;
        model.status = ModelStatus::Converged;
        Ok(model)
    }
}
