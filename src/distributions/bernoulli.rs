//! Bernoulli(p) kernel over 0/1 data; any nonzero value counts as a hit.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::{Rng, RngCore};

use crate::{
    data::Dataset,
    distributions::{Bound, bound_projection, nonempty_values, normal::first_value},
    model::{
        Capability, CapabilitySet, Model, ModelFamily, ModelKernel, ModelResult, ModelShape,
        ModelStatus, Projection,
    },
};

pub const P_MARGIN: f64 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
pub struct BernoulliKernel;

/// Unparameterized Bernoulli prototype with parameter `[p]`.
pub fn bernoulli() -> Model {
    Model::new(
        "Bernoulli distribution",
        ModelFamily::Bernoulli,
        ModelShape::vector(1),
        Arc::new(BernoulliKernel),
    )
}

/// `(hits, trials)` over every value on the page.
pub(crate) fn hits_and_trials(data: &Dataset) -> (f64, f64) {
    (data.count_nonzero() as f64, data.page_len() as f64)
}

impl ModelKernel for BernoulliKernel {
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
        let p = model.param(0)?;
        let (hits, n) = hits_and_trials(data);
        Ok(hits * p.ln() + (n - hits) * (1.0 - p).ln())
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let p = model.param(0)?;
        let (hits, n) = hits_and_trials(data);
        Ok(array![hits / p - (n - hits) / (1.0 - p)])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let p = model.param(0)?;
        Ok(array![if rng.random::<f64>() < p { 1.0 } else { 0.0 }])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let p = model.param(0)?;
        let x = first_value(data)?;
        Ok(if x < 0.0 {
            0.0
        } else if x < 1.0 {
            1.0 - p
        } else {
            1.0
        })
    }

    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::unit(0)], P_MARGIN)
    }

    fn estimate(&self, data: &Dataset, mut model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        nonempty_values(data)?;
        let (hits, n) = hits_and_trials(data);
        model.set_packed(&array![hits / n])?;
        model.status = ModelStatus::Converged;
        Ok(model)
    }
}
