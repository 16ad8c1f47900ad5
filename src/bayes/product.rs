//! bayes::product — the unnormalized `prior × likelihood` model.
//!
//! Its parameters are the likelihood's parameters and its log likelihood of
//! `data` at `θ` is `ln prior(θ) + ln L(data | θ)`, so maximizing it with
//! the MLE engine finds the posterior mode.
use std::sync::Arc;

use ndarray::{Array1, Axis};
use rand::RngCore;

use crate::{
    composite::{prep_part, reset_outputs, state},
    data::Dataset,
    mle::engine::run,
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult, Projection,
    },
    settings_group,
};

const PRODUCT_GROUP: &str = "product";

#[derive(Debug, Clone)]
pub(crate) struct ProductState {
    prior: Box<Model>,
    likelihood: Box<Model>,
}

settings_group!(ProductState, PRODUCT_GROUP);

#[derive(Debug, Clone, Copy)]
pub(crate) struct ProductKernel {
    caps: CapabilitySet,
}

/// Prior times likelihood over the likelihood's parameters.
///
/// The likelihood's current parameters, if any, seed the product.
///
/// # Errors
/// - [`ModelError::MissingCapability`] when the prior cannot evaluate a
///   log likelihood or density.
pub fn product(prior: &Model, likelihood: &Model) -> ModelResult<Model> {
    if !prior.capabilities().can_evaluate() {
        return Err(ModelError::MissingCapability {
            model: prior.name.clone(),
            capability: Capability::LogLikelihood,
        });
    }
    let lik_caps = likelihood.capabilities();
    let caps = CapabilitySet::default()
        .with_if(Capability::LogLikelihood, lik_caps.can_evaluate())
        .with_if(Capability::Estimate, lik_caps.can_evaluate())
        .with_if(Capability::Constraint, lik_caps.contains(Capability::Constraint))
        .with(Capability::Prep);
    let mut model = Model::new(
        format!("product of {} and {}", prior.name, likelihood.name),
        ModelFamily::Product,
        likelihood.shape,
        Arc::new(ProductKernel { caps }),
    );
    model.parameters = likelihood.parameters.clone();
    model.settings.add(ProductState { prior: Box::new(prior.clone()), likelihood: Box::new(likelihood.clone()) });
    Ok(model)
}

impl ProductKernel {
    fn parts(&self, model: &Model) -> ModelResult<(Model, Model)> {
        let st = state::<ProductState>(model, PRODUCT_GROUP)?;
        let mut lik = (*st.likelihood).clone();
        lik.parameters = Some(model.parameters()?.clone());
        Ok(((*st.prior).clone(), lik))
    }
}

fn point(theta: Array1<f64>) -> Dataset {
    Dataset::from_matrix(theta.insert_axis(Axis(0)))
}

impl ModelKernel for ProductKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let (prior, lik) = self.parts(model)?;
        let at = point(model.packed_parameters()?);
        Ok(prior.log_likelihood(&at)? + lik.log_likelihood(data)?)
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        self.parts(model)?.1.constraint(data)
    }

    fn estimate(&self, data: &Dataset, model: Model, rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        run(data, model, rng)
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let st = state::<ProductState>(model, PRODUCT_GROUP)?;
        let lik = prep_part(data, &st.likelihood)?;
        model.parameters = lik.parameters.clone();
        reset_outputs(model, data);
        Ok(())
    }
}
