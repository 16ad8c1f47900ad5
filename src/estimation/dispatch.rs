//! estimation::dispatch — choose between a model's own estimator and MLE.
//!
//! Purpose
//! -------
//! Give every model the same `estimate(data, model)` call regardless of
//! how it is estimated.
//!
//! Key behaviors
//! -------------
//! - The caller's model is never mutated: a copy is prepared for the data
//!   (its parameters, if any, survive preparation and seed the optimizer).
//! - A model advertising `Estimate` is handed to its kernel; otherwise a
//!   model that can evaluate a log likelihood or density goes through
//!   [`crate::mle`]; anything else is `NotEstimable`.
//! - Afterwards the data reference is attached and, unless [`PartsWanted`]
//!   says otherwise, the information criteria are computed.
use std::sync::Arc;

use rand::RngCore;

use crate::{
    data::Dataset,
    mle::{
        MleSettings,
        engine::{attach_covariance, prepared_copy, run},
    },
    model::{Capability, Model, ModelError, ModelInfo, ModelResult},
    settings_group,
};

/// Which post-estimation summaries to compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartsWanted {
    /// Numerical covariance of the parameters (off by default).
    pub covariance: bool,
    /// Log likelihood, AIC, AIC_c and BIC (on by default).
    pub info: bool,
}

settings_group!(PartsWanted, "parts wanted");

impl Default for PartsWanted {
    fn default() -> Self {
        Self { covariance: false, info: true }
    }
}

/// Estimate `model` on `data` and return the estimated copy.
///
/// # Errors
/// - [`ModelError::NotEstimable`] when the model has no estimator and can
///   evaluate neither a log likelihood nor a density.
/// - Any error of the preparation step, the model's estimator or the MLE
///   engine.
pub fn estimate(data: &Arc<Dataset>, model: &Model) -> ModelResult<Model> {
    dispatch(data, model, None)
}

/// [`estimate`] with a random source for estimators that need one
/// (simulated annealing).
pub fn estimate_with_rng(data: &Arc<Dataset>, model: &Model, rng: &mut dyn RngCore) -> ModelResult<Model> {
    dispatch(data, model, Some(rng))
}

fn dispatch(data: &Arc<Dataset>, model: &Model, rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
    let own = model.has(Capability::Estimate);
    if !own && !model.capabilities().can_evaluate() {
        return Err(ModelError::NotEstimable { model: model.name.clone() });
    }
    let copy = prepared_copy(data, model)?;
    let mut fit = if own {
        log::debug!("estimating '{}' with its own estimator", copy.name);
        let kernel = Arc::clone(copy.kernel());
        kernel.estimate(data, copy, rng)?
    } else {
        run(data, copy, rng)?
    };
    fit.data = Some(Arc::clone(data));
    attach_parts(data, &mut fit);
    Ok(fit)
}

/// Attach the summaries selected by the model's [`PartsWanted`].
///
/// Summaries that cannot be computed (e.g. a model without a likelihood)
/// are skipped with a debug message.
pub(crate) fn attach_parts(data: &Dataset, model: &mut Model) {
    let wanted = model.settings.get_or_default::<PartsWanted>();
    if wanted.info {
        match model.log_likelihood(data) {
            Ok(ll) => {
                model.info = Some(ModelInfo::compute(ll, model.parameter_count(), Some(data.rows())))
            }
            Err(err) => log::debug!("no information criteria for '{}': {err}", model.name),
        }
    }
    if wanted.covariance && model.covariance.is_none() {
        let delta = model.settings.get_or_default::<MleSettings>().delta;
        attach_covariance(data, model, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distributions::{gamma, normal},
        model::{CapabilitySet, ModelFamily, ModelKernel, ModelShape, ModelStatus},
        optimization::loglik_optimizer::MleMethod,
    };
    use approx::assert_relative_eq;
    use ndarray::array;

    #[derive(Debug)]
    struct Inert;

    impl ModelKernel for Inert {
        fn capabilities(&self) -> CapabilitySet {
            CapabilitySet::default()
        }
    }

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Dispatch to the model's estimator and the MLE fallback.
    // - Information criteria and optional covariance.
    // - NotEstimable and isolation of the caller's model.
    // -------------------------------------------------------------------------

    fn data() -> Arc<Dataset> {
        Arc::new(Dataset::from_vector(array![0.5, 1.0, 1.5, 3.0]))
    }

    #[test]
    // Purpose
    // -------
    // A closed-form estimate gets information criteria and the data.
    //
    // Given
    // -----
    // - Normal on {0.5, 1, 1.5, 3}.
    //
    // Expect
    // ------
    // - info.log_likelihood equals the fitted ll; AIC = 4 - 2 ll;
    //   BIC = 2 ln 4 - 2 ll; the data is attached; no covariance.
    fn closed_form_gets_info() {
        // Arrange
        let d = data();

        // Act
        let fit = estimate(&d, &normal()).expect("estimate");

        // Assert
        let ll = fit.log_likelihood(&d).expect("ll");
        let info = fit.info.expect("info");
        assert_relative_eq!(info.log_likelihood, ll);
        assert_relative_eq!(info.aic, 4.0 - 2.0 * ll);
        assert_relative_eq!(info.bic.expect("bic"), 2.0 * 4f64.ln() - 2.0 * ll);
        assert!(fit.data.is_some());
        assert!(fit.covariance.is_none());
    }

    #[test]
    // Purpose
    // -------
    // Without an estimator the dispatcher falls back to MLE, and the
    // caller's model is left alone.
    //
    // Given
    // -----
    // - Gamma (no Estimate capability) seeded at (1, 1), simplex settings,
    //   PartsWanted with covariance on.
    //
    // Expect
    // ------
    // - A converged fit with a 2 x 2 covariance; the prototype still holds
    //   (1, 1) and is unestimated.
    fn falls_back_to_mle() {
        // Arrange
        let mut proto = gamma().with_parameters(&[1.0, 1.0]).expect("gamma");
        proto.settings.add(PartsWanted { covariance: true, info: true });
        proto.settings.add(
            MleSettings::new(Some(MleMethod::NelderMead), 0.05, 1e-10, 1000).expect("valid settings"),
        );

        // Act
        let fit = estimate(&data(), &proto).expect("estimate");

        // Assert
        assert_eq!(fit.status, ModelStatus::Converged);
        assert_eq!(fit.covariance.as_ref().map(|c| c.dim()), Some((2, 2)));
        assert_eq!(proto.packed_parameters().expect("params"), array![1.0, 1.0]);
        assert_eq!(proto.status, ModelStatus::Unestimated);
    }

    #[test]
    // Purpose
    // -------
    // A model with nothing to estimate with is rejected.
    //
    // Given
    // -----
    // - A kernel with an empty capability set.
    //
    // Expect
    // ------
    // - NotEstimable.
    fn inert_model_is_not_estimable() {
        // Arrange
        let m = Model::new("inert", ModelFamily::Custom(1), ModelShape::vector(1), Arc::new(Inert));

        // Act
        let out = estimate(&data(), &m);

        // Assert
        assert!(matches!(out, Err(ModelError::NotEstimable { .. })));
    }
}
