//! model::kernel — the behavior trait behind every model.
//!
//! A [`ModelKernel`] supplies the numeric behaviors of one model family.
//! Every behavior is optional: the default bodies return
//! [`ModelError::MissingCapability`], and [`ModelKernel::capabilities`]
//! states which ones are real. Kernels are shared (`Arc`) between a
//! prototype and all of its copies, so they hold no per-model state; the
//! model's parameters and settings are passed in on every call.
use std::{any::Any, fmt, sync::Arc};

use ndarray::Array1;
use rand::RngCore;

use crate::{
    data::Dataset,
    model::{
        capability::{Capability, CapabilitySet},
        descriptor::Model,
        errors::{ModelError, ModelResult},
    },
};

/// Result of a constraint check: the nearest feasible packed parameter
/// vector and the penalty for having left the feasible region.
///
/// A penalty of zero means the input was feasible and `point` equals it.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub point: Array1<f64>,
    pub penalty: f64,
}

impl Projection {
    pub fn feasible(point: Array1<f64>) -> Self {
        Self { point, penalty: 0.0 }
    }

    pub fn is_feasible(&self) -> bool {
        self.penalty == 0.0
    }
}

pub(crate) fn missing(model: &Model, capability: Capability) -> ModelError {
    ModelError::MissingCapability { model: model.name.clone(), capability }
}

/// Numeric behaviors of a model family.
pub trait ModelKernel: Send + Sync + fmt::Debug {
    /// Which of the optional methods below are implemented.
    fn capabilities(&self) -> CapabilitySet;

    /// Probability (density) of the whole data set under `model`.
    fn density(&self, _data: &Dataset, model: &Model) -> ModelResult<f64> {
        Err(missing(model, Capability::Density))
    }

    fn log_likelihood(&self, _data: &Dataset, model: &Model) -> ModelResult<f64> {
        Err(missing(model, Capability::LogLikelihood))
    }

    /// Gradient of the log likelihood with respect to the packed parameters.
    fn score(&self, _data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        Err(missing(model, Capability::Score))
    }

    /// One random draw of width `dsize`.
    fn draw(&self, _rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        Err(missing(model, Capability::Draw))
    }

    /// Cumulative probability of the first data point.
    fn cdf(&self, _data: &Dataset, model: &Model) -> ModelResult<f64> {
        Err(missing(model, Capability::Cdf))
    }

    /// Project the model's current parameters into the feasible region.
    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        Err(missing(model, Capability::Constraint))
    }

    /// Closed-form or model-specific estimation. Receives a prepared copy
    /// and the caller's random source, if any, for inner optimizers that
    /// need one.
    fn estimate(&self, _data: &Dataset, model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        Err(missing(&model, Capability::Estimate))
    }

    /// Prepare `model` for estimation on `data`; the default clears it.
    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        model.clear(Some(data));
        Ok(())
    }
}

/// Auxiliary per-model state with an explicit deep copy.
pub trait ModelPayload: Send + Sync + fmt::Debug {
    fn clone_box(&self) -> Box<dyn ModelPayload>;
    fn as_any(&self) -> &dyn Any;
}
