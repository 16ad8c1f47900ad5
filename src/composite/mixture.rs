//! composite::mixture — weighted sum of densities over a shared data space.
//!
//! Purpose
//! -------
//! Model each observation as coming from one of several components, chosen
//! with probability proportional to its weight:
//! `p(x) = Σ_j w_j · p_j(x)` with `w` normalized to sum to one.
//!
//! Key behaviors
//! -------------
//! - Parameters are the (unnormalized) weights followed by every
//!   component's packed parameters.
//! - The log likelihood is a per-row log-sum-exp over components, so it
//!   stays finite when individual component densities underflow.
//! - A draw picks a component by weight, then draws from it.
//! - The constraint keeps weights strictly positive and adds up the
//!   components' own penalties.
//! - Estimation runs the generic MLE engine over the full parameter vector.
//!
//! Conventions
//! -----------
//! - Each row of the first data page is one observation (vector element
//!   followed by the matrix row).
use std::sync::Arc;

use ndarray::{Array1, s};
use rand::{Rng, RngCore};

use crate::{
    composite::{Components, components, distribute, known_parameter_count, prep_part, reset_outputs},
    data::Dataset,
    mle::engine::run,
    model::{
        Capability, CapabilitySet, Dim, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, Projection,
    },
};

/// Smallest weight the constraint lets through.
pub const WEIGHT_MARGIN: f64 = 1e-5;

#[derive(Debug, Clone, Copy)]
pub(crate) struct MixtureKernel {
    caps: CapabilitySet,
}

/// Mix `models` with the given weights (default: equal weights).
///
/// # Errors
/// - [`ModelError::EmptyComposite`] for an empty model list.
/// - [`ModelError::CompositeShapeMismatch`] when the weight count differs
///   from the model count.
/// - [`ModelError::InvalidParameter`] for a negative, non-finite or
///   all-zero weight vector.
pub fn mixture(models: &[Model], weights: Option<&[f64]>) -> ModelResult<Model> {
    if models.is_empty() {
        return Err(ModelError::EmptyComposite { composite: "mixture" });
    }
    let n = models.len();
    let weights = match weights {
        Some(w) if w.len() != n => {
            return Err(ModelError::CompositeShapeMismatch { composite: "mixture", expected: n, found: w.len() });
        }
        Some(w) => Array1::from(w.to_vec()),
        None => Array1::from_elem(n, 1.0 / n as f64),
    };
    normalized(&weights)?;

    let caps = derive_caps(models);
    let shape = ModelShape {
        vsize: known_parameter_count(models).map_or(Dim::FromData, |k| Dim::Fixed(n + k)),
        msize1: Dim::Fixed(0),
        msize2: Dim::Fixed(0),
        dsize: models[0].shape.dsize,
    };
    let names: Vec<&str> = models.iter().map(|m| m.name.as_str()).collect();
    let mut model = Model::new(
        format!("mixture of {}", names.join(", ")),
        ModelFamily::Mixture,
        shape,
        Arc::new(MixtureKernel { caps }),
    );
    model.settings.add(Components { models: models.to_vec() });
    if models.iter().all(|m| m.parameters.is_some()) {
        model.parameters = Some(Dataset::from_vector(flat_parameters(&weights, models)?));
    }
    Ok(model)
}

/// Normalized weights of a parameterized mixture.
///
/// # Errors
/// - [`ModelError::NotParameterized`] / [`ModelError::MissingSettings`] for
///   a model that is not a parameterized mixture.
/// - [`ModelError::InvalidParameter`] for unusable weights.
pub fn mixture_weights(model: &Model) -> ModelResult<Array1<f64>> {
    let n = components(model)?.len();
    let theta = model.packed_parameters()?;
    if theta.len() < n {
        return Err(ModelError::ParameterCountMismatch { expected: n, found: theta.len() });
    }
    normalized(&theta.slice(s![..n]).to_owned())
}

fn derive_caps(models: &[Model]) -> CapabilitySet {
    let common = CapabilitySet::intersect_all(models.iter().map(Model::capabilities));
    let all_evaluate = models.iter().all(|m| m.capabilities().can_evaluate());
    CapabilitySet::default()
        .with_if(Capability::LogLikelihood, all_evaluate)
        .with_if(Capability::Estimate, all_evaluate)
        .with_if(Capability::Draw, common.contains(Capability::Draw))
        .with_if(Capability::Cdf, common.contains(Capability::Cdf))
        .with(Capability::Constraint)
        .with(Capability::Prep)
}

fn normalized(weights: &Array1<f64>) -> ModelResult<Array1<f64>> {
    if let Some(&bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ModelError::InvalidParameter {
            name: "weight",
            value: bad,
            reason: "mixture weights must be finite and non-negative",
        });
    }
    let total = weights.sum();
    if total <= 0.0 {
        return Err(ModelError::InvalidParameter {
            name: "weight",
            value: total,
            reason: "mixture weights must not all be zero",
        });
    }
    Ok(weights / total)
}

fn flat_parameters(weights: &Array1<f64>, parts: &[Model]) -> ModelResult<Array1<f64>> {
    let mut flat = weights.to_vec();
    for m in parts {
        flat.extend(m.packed_parameters()?.iter().copied());
    }
    Ok(Array1::from(flat))
}

/// `ln Σ exp(t)` without overflow; `-inf` when every term is `-inf`.
pub(crate) fn log_sum_exp(terms: &[f64]) -> f64 {
    let max = terms.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return max;
    }
    max + terms.iter().map(|t| (t - max).exp()).sum::<f64>().ln()
}

impl MixtureKernel {
    /// Normalized weights and the components carrying their slices.
    fn split(&self, model: &Model) -> ModelResult<(Array1<f64>, Vec<Model>)> {
        let subs = components(model)?;
        let theta = model.packed_parameters()?;
        let n = subs.len();
        if theta.len() < n {
            return Err(ModelError::ParameterCountMismatch { expected: n, found: theta.len() });
        }
        let weights = normalized(&theta.slice(s![..n]).to_owned())?;
        Ok((weights, distribute(subs, &theta, n)?))
    }
}

impl ModelKernel for MixtureKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let (weights, parts) = self.split(model)?;
        let log_w: Vec<f64> = weights.iter().map(|w| w.ln()).collect();
        let mut total = 0.0;
        let mut terms = vec![0.0; parts.len()];
        for i in 0..data.rows() {
            let row = data.row(i)?;
            for (j, part) in parts.iter().enumerate() {
                terms[j] = log_w[j] + part.log_likelihood(&row)?;
            }
            total += log_sum_exp(&terms);
        }
        Ok(total)
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let (weights, parts) = self.split(model)?;
        let u = rng.random::<f64>();
        let mut cumulative = 0.0;
        let mut chosen = parts.len() - 1;
        for (j, w) in weights.iter().enumerate() {
            cumulative += w;
            if u < cumulative {
                chosen = j;
                break;
            }
        }
        parts[chosen].draw(rng)
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let (weights, parts) = self.split(model)?;
        let mut total = 0.0;
        for (w, part) in weights.iter().zip(&parts) {
            total += w * part.cdf(data)?;
        }
        Ok(total)
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        let subs = components(model)?;
        let theta = model.packed_parameters()?;
        let n = subs.len();
        let mut point: Vec<f64> = Vec::with_capacity(theta.len());
        let mut penalty = 0.0;
        for &w in theta.iter().take(n) {
            let fixed = if w.is_nan() || w < WEIGHT_MARGIN { WEIGHT_MARGIN } else { w };
            penalty += if w.is_nan() { 1.0 } else { (w - fixed).powi(2) };
            point.push(fixed);
        }
        penalty = penalty.sqrt();
        for part in distribute(subs, &theta, n)? {
            let proj = part.constraint(data)?;
            point.extend(proj.point.iter().copied());
            penalty += proj.penalty;
        }
        Ok(Projection { point: Array1::from(point), penalty })
    }

    fn estimate(&self, data: &Dataset, model: Model, rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let mut fit = run(data, model, rng)?;
        let (_, parts) = self.split(&fit)?;
        fit.settings.add(Components { models: parts });
        Ok(fit)
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let subs = components(model)?.to_vec();
        let n = subs.len();
        let weights = model
            .packed_parameters()
            .ok()
            .filter(|t| t.len() >= n)
            .and_then(|t| normalized(&t.slice(s![..n]).to_owned()).ok())
            .unwrap_or_else(|| Array1::from_elem(n, 1.0 / n as f64));
        let mut prepped = Vec::with_capacity(n);
        for sub in &subs {
            let mut part = prep_part(data, sub)?;
            if sub.parameters.is_none() {
                let k = part.parameter_count();
                part.set_packed(&Array1::ones(k))?;
            }
            prepped.push(part);
        }
        model.parameters = Some(Dataset::from_vector(flat_parameters(&weights, &prepped)?));
        model.settings.add(Components { models: prepped });
        reset_outputs(model, data);
        Ok(())
    }
}
