//! composite::transform — a base model seen through a change of variable.
//!
//! Given a map `g` from the transformed data space to the base model's data
//! space and the absolute Jacobian determinant `|J_g|` of that map, the
//! transformed density is `p_base(g(x)) · |J_g(x)|`, so
//! `ll(x) = ll_base(g(x)) + Σ_rows ln|J_g(x_i)|`.
//!
//! The parameters are the base model's, in the same layout. Because the
//! Jacobian term does not depend on them, the score, the constraint and the
//! estimator all delegate to the base model on the mapped data. Draws are
//! not derived: that would need the inverse map.
use std::{fmt, sync::Arc};

use ndarray::Array1;
use rand::RngCore;

use crate::{
    composite::{data_rows, prep_part, reset_outputs, rows_to_dataset, state},
    data::Dataset,
    estimation::{estimate, estimate_with_rng},
    model::{
        Capability, CapabilitySet, DEFAULT_SCORE_DELTA, Model, ModelFamily, ModelKernel, ModelResult,
        Projection,
    },
    settings_group,
};

const TRANSFORM_GROUP: &str = "transform";

/// Map applied to one data row.
pub type RowMap = Arc<dyn Fn(&Array1<f64>) -> Array1<f64> + Send + Sync>;

/// Scalar function of one data row.
pub type RowFn = Arc<dyn Fn(&Array1<f64>) -> f64 + Send + Sync>;

#[derive(Clone)]
pub(crate) struct TransformState {
    base: Box<Model>,
    to_base: RowMap,
    jacobian: RowFn,
}

impl fmt::Debug for TransformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransformState").field("base", &self.base.name).finish_non_exhaustive()
    }
}

settings_group!(TransformState, TRANSFORM_GROUP);

#[derive(Debug, Clone, Copy)]
pub(crate) struct TransformKernel {
    caps: CapabilitySet,
}

/// Wrap `base` so that it models data `x` with `to_base(x)` distributed as
/// `base`; `jacobian(x)` is the determinant of the derivative of
/// `to_base` at `x` (its absolute value is taken).
pub fn transform(base: &Model, to_base: RowMap, jacobian: RowFn) -> Model {
    let caps = base.capabilities();
    let caps = CapabilitySet::default()
        .with_if(Capability::LogLikelihood, caps.can_evaluate())
        .with_if(Capability::Score, caps.contains(Capability::Score))
        .with_if(Capability::Constraint, caps.contains(Capability::Constraint))
        .with_if(Capability::Estimate, caps.contains(Capability::Estimate) || caps.can_evaluate())
        .with(Capability::Prep);
    let mut model = Model::new(
        format!("{}, transformed", base.name),
        ModelFamily::Transform,
        base.shape,
        Arc::new(TransformKernel { caps }),
    );
    model.parameters = base.parameters.clone();
    model.settings.add(TransformState { base: Box::new(base.clone()), to_base, jacobian });
    model
}

impl TransformKernel {
    /// Base model carrying the wrapper's parameters.
    fn base(&self, model: &Model) -> ModelResult<Model> {
        let st = state::<TransformState>(model, TRANSFORM_GROUP)?;
        let mut base = (*st.base).clone();
        if model.parameters.is_some() {
            base.parameters = model.parameters.clone();
        }
        Ok(base)
    }

    /// `data` mapped row by row into the base model's space.
    fn mapped(&self, data: &Dataset, model: &Model) -> ModelResult<Dataset> {
        let st = state::<TransformState>(model, TRANSFORM_GROUP)?;
        let rows: Vec<Array1<f64>> = data_rows(data).iter().map(|r| (st.to_base)(r)).collect();
        rows_to_dataset(&rows, "transform")
    }

    fn log_jacobian(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let st = state::<TransformState>(model, TRANSFORM_GROUP)?;
        Ok(data_rows(data).iter().map(|r| (st.jacobian)(r).abs().ln()).sum())
    }
}

impl ModelKernel for TransformKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let base = self.base(model)?;
        let ll = base.log_likelihood(&self.mapped(data, model)?)?;
        Ok(ll + self.log_jacobian(data, model)?)
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        self.base(model)?.score(&self.mapped(data, model)?, DEFAULT_SCORE_DELTA)
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        self.base(model)?.constraint(&self.mapped(data, model)?)
    }

    fn estimate(&self, data: &Dataset, mut model: Model, rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let mapped = Arc::new(self.mapped(data, &model)?);
        let base = self.base(&model)?;
        let fit = match rng {
            Some(rng) => estimate_with_rng(&mapped, &base, rng)?,
            None => estimate(&mapped, &base)?,
        };
        model.parameters = fit.parameters.clone();
        model.covariance = fit.covariance.clone();
        model.status = fit.status;
        if let Some(st) = model.settings.get_mut::<TransformState>() {
            st.base = Box::new(fit);
        }
        Ok(model)
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let mapped = Arc::new(self.mapped(data, model)?);
        let base = prep_part(&mapped, &self.base(model)?)?;
        model.parameters = base.parameters.clone();
        if let Some(st) = model.settings.get_mut::<TransformState>() {
            st.base = Box::new(base);
        }
        reset_outputs(model, data);
        Ok(())
    }
}
