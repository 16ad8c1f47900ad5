//! model::descriptor — the [`Model`] bundle of behaviors, parameters and
//! settings.
//!
//! Purpose
//! -------
//! Represent one statistical model instance: its identity (name, family),
//! declared shape, current parameter state, attached settings groups, and a
//! shared kernel implementing the numeric behaviors. Generic code calls the
//! methods here; they check the kernel's capability set and apply the
//! standard fallbacks (density <-> log likelihood, numerical score).
//!
//! Key behaviors
//! -------------
//! - `Clone` is the deep copy: parameters, covariance, expected values,
//!   info, settings and the auxiliary payload are duplicated; the kernel and
//!   the data reference are shared.
//! - [`Model::clear`] resets a model to a blank, estimable state sized
//!   against a data set.
//! - [`Model::packed_parameters`] / [`Model::set_packed`] are the bridge to
//!   flat optimizer vectors.
//!
//! Invariants & assumptions
//! ------------------------
//! - After `clear`, `status == Unestimated` and `parameters` is `Some`
//!   (possibly zero-sized).
//! - The data set is shared through `Arc`; a model never mutates it.
//!
//! Conventions
//! -----------
//! - A behavior that is not advertised by the kernel yields
//!   [`ModelError::MissingCapability`], except where a fallback exists.
use std::sync::Arc;

use ndarray::{Array1, Array2};
use rand::RngCore;

use crate::{
    data::{Col, Dataset},
    model::{
        capability::{Capability, CapabilitySet},
        errors::{ModelError, ModelResult},
        family::ModelFamily,
        kernel::{ModelKernel, ModelPayload, Projection, missing},
        settings::Settings,
        shape::ModelShape,
    },
};

/// Default step for the numerical score fallback.
pub const DEFAULT_SCORE_DELTA: f64 = 1e-3;

/// Why an estimation attempt ended without converging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The optimizer could make no further progress.
    OptimizerStuck,
    /// The iteration cap was reached first.
    MaxIterations,
    /// The final parameters are not all finite.
    NotFinite,
}

/// Estimation status of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelStatus {
    #[default]
    Unestimated,
    Converged,
    Failed(FailureKind),
}

/// Post-estimation fit summaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelInfo {
    pub log_likelihood: f64,
    pub aic: f64,
    /// Small-sample AIC; absent without data.
    pub aic_c: Option<f64>,
    pub bic: Option<f64>,
}

impl ModelInfo {
    /// Information criteria for `k` free parameters and `n` observations.
    pub fn compute(log_likelihood: f64, k: usize, n: Option<usize>) -> Self {
        let k = k as f64;
        let aic = 2.0 * k - 2.0 * log_likelihood;
        let (aic_c, bic) = match n {
            Some(n) if n > 0 => {
                let n = n as f64;
                (
                    Some(aic + 2.0 * k * (k + 1.0) / (n - k - 1.0)),
                    Some(k * n.ln() - 2.0 * log_likelihood),
                )
            }
            _ => (None, None),
        };
        Self { log_likelihood, aic, aic_c, bic }
    }
}

/// A statistical model instance.
#[derive(Debug)]
pub struct Model {
    pub name: String,
    pub family: ModelFamily,
    pub shape: ModelShape,
    pub parameters: Option<Dataset>,
    pub covariance: Option<Array2<f64>>,
    pub expected: Option<Dataset>,
    pub info: Option<ModelInfo>,
    pub status: ModelStatus,
    pub settings: Settings,
    pub data: Option<Arc<Dataset>>,
    pub aux: Option<Box<dyn ModelPayload>>,
    kernel: Arc<dyn ModelKernel>,
}

impl Clone for Model {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            family: self.family,
            shape: self.shape,
            parameters: self.parameters.clone(),
            covariance: self.covariance.clone(),
            expected: self.expected.clone(),
            info: self.info,
            status: self.status,
            settings: self.settings.clone(),
            data: self.data.clone(),
            aux: self.aux.as_ref().map(|a| a.clone_box()),
            kernel: Arc::clone(&self.kernel),
        }
    }
}

impl Model {
    /// An unparameterized prototype.
    pub fn new(
        name: impl Into<String>, family: ModelFamily, shape: ModelShape,
        kernel: Arc<dyn ModelKernel>,
    ) -> Self {
        Self {
            name: name.into(),
            family,
            shape,
            parameters: None,
            covariance: None,
            expected: None,
            info: None,
            status: ModelStatus::Unestimated,
            settings: Settings::new(),
            data: None,
            aux: None,
            kernel,
        }
    }

    pub fn kernel(&self) -> &Arc<dyn ModelKernel> {
        &self.kernel
    }

    pub fn capabilities(&self) -> CapabilitySet {
        self.kernel.capabilities()
    }

    pub fn has(&self, cap: Capability) -> bool {
        self.capabilities().contains(cap)
    }

    /// Copy of a fixed-shape prototype with its packed parameters set.
    ///
    /// # Errors
    /// - [`ModelError::InvalidSettings`] when the shape depends on data.
    /// - [`ModelError::ParameterCountMismatch`] when `values` has the wrong
    ///   length.
    pub fn with_parameters(&self, values: &[f64]) -> ModelResult<Model> {
        if !self.shape.is_fixed() {
            return Err(ModelError::InvalidSettings {
                group: "shape",
                reason: format!(
                    "'{}' sizes its parameters from data; prep it on data before setting values",
                    self.name
                ),
            });
        }
        let mut out = self.clone();
        out.clear(None);
        out.set_packed(&Array1::from(values.to_vec()))?;
        Ok(out)
    }

    /// Reset to a blank estimable state for `data`.
    ///
    /// Allocates zeroed parameters sized from the declared shape (data-sized
    /// dimensions resolve to the data's matrix column count), drops
    /// covariance/expected/info, sets `Unestimated` and attaches `data`.
    pub fn clear(&mut self, data: Option<&Arc<Dataset>>) {
        let (v, m1, m2) = self.shape.resolve(data.map(|d| d.as_ref()));
        self.parameters = Some(Dataset::alloc(v, m1, m2));
        self.covariance = None;
        self.expected = None;
        self.info = None;
        self.status = ModelStatus::Unestimated;
        self.data = data.cloned();
    }

    /// Run the kernel's preparation step for `data`.
    pub fn prep(&mut self, data: &Arc<Dataset>) -> ModelResult<()> {
        let kernel = Arc::clone(&self.kernel);
        kernel.prep(data, self)
    }

    // ---- Parameters ----

    pub fn parameters(&self) -> ModelResult<&Dataset> {
        self.parameters
            .as_ref()
            .ok_or_else(|| ModelError::NotParameterized { model: self.name.clone() })
    }

    /// Vector parameter `i` of the first page.
    pub fn param(&self, i: usize) -> ModelResult<f64> {
        Ok(self.parameters()?.get(i, Col::Vector)?)
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.as_ref().map_or(0, |p| p.packed_len(true))
    }

    pub fn packed_parameters(&self) -> ModelResult<Array1<f64>> {
        Ok(self.parameters()?.pack(true))
    }

    pub fn set_packed(&mut self, theta: &Array1<f64>) -> ModelResult<()> {
        let params = self
            .parameters
            .as_mut()
            .ok_or_else(|| ModelError::NotParameterized { model: self.name.clone() })?;
        let expected = params.packed_len(true);
        if theta.len() != expected {
            return Err(ModelError::ParameterCountMismatch { expected, found: theta.len() });
        }
        params.unpack(theta, true)?;
        Ok(())
    }

    /// Error unless the last estimation converged.
    pub fn ensure_converged(&self) -> ModelResult<()> {
        match self.status {
            ModelStatus::Converged => Ok(()),
            ModelStatus::Failed(kind) => Err(ModelError::OptimizerStuck {
                model: self.name.clone(),
                reason: format!("{kind:?}"),
            }),
            ModelStatus::Unestimated => Err(ModelError::OptimizerStuck {
                model: self.name.clone(),
                reason: "model has not been estimated".to_string(),
            }),
        }
    }

    // ---- Behaviors with fallbacks ----

    /// Density of `data`, falling back to `exp(log_likelihood)`.
    pub fn p(&self, data: &Dataset) -> ModelResult<f64> {
        let caps = self.capabilities();
        if caps.contains(Capability::Density) {
            self.kernel.density(data, self)
        } else if caps.contains(Capability::LogLikelihood) {
            Ok(self.kernel.log_likelihood(data, self)?.exp())
        } else {
            Err(missing(self, Capability::Density))
        }
    }

    /// Log likelihood of `data`, falling back to `ln(p)`.
    pub fn log_likelihood(&self, data: &Dataset) -> ModelResult<f64> {
        let caps = self.capabilities();
        if caps.contains(Capability::LogLikelihood) {
            self.kernel.log_likelihood(data, self)
        } else if caps.contains(Capability::Density) {
            Ok(self.kernel.density(data, self)?.ln())
        } else {
            Err(missing(self, Capability::LogLikelihood))
        }
    }

    /// Score of `data`; uses the analytic score when present, else a central
    /// difference with step `delta`.
    pub fn score(&self, data: &Dataset, delta: f64) -> ModelResult<Array1<f64>> {
        if self.has(Capability::Score) {
            self.kernel.score(data, self)
        } else {
            self.numerical_score(data, delta)
        }
    }

    /// Central-difference gradient of the log likelihood in the packed
    /// parameters.
    pub fn numerical_score(&self, data: &Dataset, delta: f64) -> ModelResult<Array1<f64>> {
        let theta = self.packed_parameters()?;
        let mut scratch = self.clone();
        let mut out = Array1::zeros(theta.len());
        for j in 0..theta.len() {
            let mut up = theta.clone();
            up[j] += delta;
            scratch.set_packed(&up)?;
            let ll_up = scratch.log_likelihood(data)?;
            let mut down = theta.clone();
            down[j] -= delta;
            scratch.set_packed(&down)?;
            let ll_down = scratch.log_likelihood(data)?;
            out[j] = (ll_up - ll_down) / (2.0 * delta);
        }
        Ok(out)
    }

    pub fn draw(&self, rng: &mut dyn RngCore) -> ModelResult<Array1<f64>> {
        if !self.has(Capability::Draw) {
            return Err(missing(self, Capability::Draw));
        }
        self.kernel.draw(rng, self)
    }

    /// `n` draws stacked as rows.
    pub fn draws(&self, rng: &mut dyn RngCore, n: usize) -> ModelResult<Array2<f64>> {
        let width = self.shape.draw_size(self.data.as_deref()).max(1);
        let mut out = Array2::zeros((n, width));
        for mut row in out.rows_mut() {
            let d = self.draw(rng)?;
            if d.len() != width {
                return Err(ModelError::CompositeShapeMismatch {
                    composite: "draw",
                    expected: width,
                    found: d.len(),
                });
            }
            row.assign(&d);
        }
        Ok(out)
    }

    pub fn cdf(&self, data: &Dataset) -> ModelResult<f64> {
        if !self.has(Capability::Cdf) {
            return Err(missing(self, Capability::Cdf));
        }
        self.kernel.cdf(data, self)
    }

    /// Feasibility projection of the current parameters; models without a
    /// constraint are always feasible.
    pub fn constraint(&self, data: &Dataset) -> ModelResult<Projection> {
        if self.has(Capability::Constraint) {
            self.kernel.constraint(data, self)
        } else {
            Ok(Projection::feasible(self.packed_parameters()?))
        }
    }
}
