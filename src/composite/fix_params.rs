//! composite::fix_params — freeze part of a model's parameter vector.
//!
//! The template model carries its full packed parameter vector with `NaN`
//! in every position that should stay free. The wrapper exposes only those
//! free positions as its own parameters; every evaluation splices them
//! back into the template and delegates to the base model, so the fixed
//! values are never touched.
//!
//! Estimation of the wrapper always goes through the MLE engine. When the
//! template carries no MLE settings, the wrapper gets Polak-Ribière
//! conjugate gradient with step size 1 and gradient tolerance 0.2.
use std::sync::Arc;

use ndarray::Array1;
use rand::RngCore;

use crate::{
    composite::state,
    data::Dataset,
    mle::{MleSettings, engine::run},
    model::{
        Capability, CapabilitySet, DEFAULT_SCORE_DELTA, Model, ModelError, ModelFamily,
        ModelKernel, ModelResult, ModelShape, Projection,
    },
    optimization::loglik_optimizer::{CgBeta, MleMethod},
    settings_group,
};

const FIXED_GROUP: &str = "fixed params";

/// Base model with `NaN` at the free positions, plus those positions.
#[derive(Debug, Clone)]
pub(crate) struct FixedParamsState {
    base: Box<Model>,
    free: Vec<usize>,
}

settings_group!(FixedParamsState, FIXED_GROUP);

#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedParamsKernel {
    caps: CapabilitySet,
}

/// Wrap `template` so that only its `NaN` parameters are free.
///
/// The wrapper's free parameters start at one.
///
/// # Errors
/// - [`ModelError::NotParameterized`] when the template has no parameters.
pub fn fix_params(template: &Model) -> ModelResult<Model> {
    let theta = template.packed_parameters()?;
    let free: Vec<usize> = theta.iter().enumerate().filter(|(_, v)| v.is_nan()).map(|(i, _)| i).collect();
    let caps = derive_caps(template);
    let shape = ModelShape::vector(free.len()).with_dsize(template.shape.draw_size(template.data.as_deref()));

    let mut model = Model::new(
        format!("{}, with some params fixed", template.name),
        ModelFamily::FixedParams,
        shape,
        Arc::new(FixedParamsKernel { caps }),
    );
    model.data = template.data.clone();
    model.parameters = Some(Dataset::from_vector(Array1::ones(free.len())));

    let mle = match template.settings.get::<MleSettings>() {
        Some(s) => {
            let mut s = s.clone();
            if s.starting_point.as_ref().is_some_and(|p| p.len() != free.len()) {
                s.starting_point = None;
            }
            s
        }
        None => MleSettings {
            method: Some(MleMethod::ConjugateGradient(CgBeta::PolakRibiere)),
            step_size: 1.0,
            tolerance: 0.2,
            ..MleSettings::default()
        },
    };
    model.settings.add(mle);
    model.settings.add(FixedParamsState { base: Box::new(template.clone()), free });
    Ok(model)
}

/// The base model with the wrapper's free values spliced into the template.
///
/// Status and data follow the wrapper.
///
/// # Errors
/// - [`ModelError::MissingSettings`] when `model` is not a fix-params
///   wrapper.
/// - [`ModelError::ParameterCountMismatch`] when the wrapper's parameters
///   do not match its free positions.
pub fn base_model(model: &Model) -> ModelResult<Model> {
    let mut full = splice(model)?;
    full.status = model.status;
    full.data = model.data.clone().or(full.data);
    Ok(full)
}

fn derive_caps(base: &Model) -> CapabilitySet {
    let caps = base.capabilities();
    CapabilitySet::default()
        .with_if(Capability::LogLikelihood, caps.can_evaluate())
        .with_if(Capability::Estimate, caps.can_evaluate())
        .with_if(Capability::Score, caps.contains(Capability::Score))
        .with_if(Capability::Draw, caps.contains(Capability::Draw))
        .with_if(Capability::Cdf, caps.contains(Capability::Cdf))
        .with_if(Capability::Constraint, caps.contains(Capability::Constraint))
}

fn splice(model: &Model) -> ModelResult<Model> {
    let st = state::<FixedParamsState>(model, FIXED_GROUP)?;
    let values = model.packed_parameters()?;
    if values.len() != st.free.len() {
        return Err(ModelError::ParameterCountMismatch { expected: st.free.len(), found: values.len() });
    }
    let mut full = (*st.base).clone();
    let mut theta = full.packed_parameters()?;
    for (&i, &v) in st.free.iter().zip(values.iter()) {
        theta[i] = v;
    }
    full.set_packed(&theta)?;
    Ok(full)
}

fn free_part(model: &Model, full: &Array1<f64>) -> ModelResult<Array1<f64>> {
    let st = state::<FixedParamsState>(model, FIXED_GROUP)?;
    Ok(st.free.iter().map(|&i| full[i]).collect())
}

impl ModelKernel for FixedParamsKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        splice(model)?.log_likelihood(data)
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let full = splice(model)?.score(data, DEFAULT_SCORE_DELTA)?;
        free_part(model, &full)
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        splice(model)?.draw(rng)
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        splice(model)?.cdf(data)
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        let proj = splice(model)?.constraint(data)?;
        Ok(Projection { point: free_part(model, &proj.point)?, penalty: proj.penalty })
    }

    fn estimate(&self, data: &Dataset, model: Model, rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        run(data, model, rng)
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let k = model.parameter_count();
        model.clear(Some(data));
        model.set_packed(&Array1::ones(k))
    }
}
