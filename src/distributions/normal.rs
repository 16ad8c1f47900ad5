//! Normal(mu, sigma) kernel.
//!
//! Closed-form estimate (sample mean and the divisor-`n` standard
//! deviation), analytic score, CDF via `statrs`, and a constraint keeping
//! `sigma` strictly positive.
use std::{f64::consts::PI, sync::Arc};

use ndarray::{Array1, array};
use rand::RngCore;
use rand_distr::Distribution;
use statrs::distribution::{ContinuousCDF, Normal as NormalDist};

use crate::{
    data::Dataset,
    distributions::{Bound, bound_projection, nonempty_values, sampler_error, vector_params},
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, ModelStatus, Projection,
    },
};

/// Distance kept between `sigma` and zero by the constraint.
pub const SIGMA_MARGIN: f64 = 1e-5;

#[derive(Debug, Clone, Copy, Default)]
pub struct NormalKernel;

/// Unparameterized Normal prototype with parameters `[mu, sigma]`.
pub fn normal() -> Model {
    Model::new("Normal distribution", ModelFamily::Normal, ModelShape::vector(2), Arc::new(NormalKernel))
}

impl ModelKernel for NormalKernel {
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
        let [mu, sigma] = vector_params::<2>(model)?;
        let xs = data.values();
        let n = xs.len() as f64;
        let ss: f64 = xs.iter().map(|x| (x - mu).powi(2)).sum();
        Ok(-ss / (2.0 * sigma * sigma) - n * (sigma.ln() + 0.5 * (2.0 * PI).ln()))
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let [mu, sigma] = vector_params::<2>(model)?;
        let xs = data.values();
        let n = xs.len() as f64;
        let s1: f64 = xs.iter().map(|x| x - mu).sum();
        let s2: f64 = xs.iter().map(|x| (x - mu).powi(2)).sum();
        Ok(array![s1 / sigma.powi(2), s2 / sigma.powi(3) - n / sigma])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let [mu, sigma] = vector_params::<2>(model)?;
        let dist = rand_distr::Normal::new(mu, sigma).map_err(|_| sampler_error("sigma", sigma))?;
        Ok(array![dist.sample(rng)])
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [mu, sigma] = vector_params::<2>(model)?;
        let x = first_value(data)?;
        let dist = NormalDist::new(mu, sigma).map_err(|_| ModelError::InvalidParameter {
            name: "sigma",
            value: sigma,
            reason: "must be positive",
        })?;
        Ok(dist.cdf(x))
    }

    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::positive(1)], SIGMA_MARGIN)
    }

    fn estimate(&self, data: &Dataset, mut model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let xs = nonempty_values(data)?;
        let n = xs.len() as f64;
        let mu = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / n;
        model.set_packed(&array![mu, var.sqrt()])?;
        model.status = ModelStatus::Converged;
        Ok(model)
    }
}

pub(crate) fn first_value(data: &Dataset) -> ModelResult<f64> {
    data.values().first().copied().ok_or_else(|| crate::data::DataError::EmptyData.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::estimate;
    use approx::assert_relative_eq;
    use rand::{SeedableRng, rngs::StdRng};

    #[test]
    // Purpose
    // -------
    // Closed-form estimate returns the sample mean and the divisor-n sd.
    //
    // Given
    // -----
    // - Data {1, 2, 3, 4}.
    //
    // Expect
    // ------
    // - mu = 2.5, sigma = sqrt(1.25), status converged.
    fn estimate_matches_moments() {
        // Arrange
        let data = Arc::new(Dataset::from_vector(array![1.0, 2.0, 3.0, 4.0]));

        // Act
        let fit = estimate(&data, &normal()).expect("estimate");

        // Assert
        assert_relative_eq!(fit.param(0).expect("mu"), 2.5);
        assert_relative_eq!(fit.param(1).expect("sigma"), 1.25f64.sqrt());
        assert_eq!(fit.status, ModelStatus::Converged);
    }

    #[test]
    // Purpose
    // -------
    // CDF and draws agree with the standard normal.
    //
    // Given
    // -----
    // - Normal(0, 1); 4000 seeded draws.
    //
    // Expect
    // ------
    // - cdf(0) = 0.5 and cdf(1.96) ~ 0.975.
    // - Draw mean within 0.1 of zero.
    fn cdf_and_draws_are_standard() {
        // Arrange
        let m = normal().with_parameters(&[0.0, 1.0]).expect("valid parameters");
        let mut rng = StdRng::seed_from_u64(7);

        // Act
        let c0 = m.cdf(&Dataset::from_vector(array![0.0])).expect("cdf");
        let c1 = m.cdf(&Dataset::from_vector(array![1.96])).expect("cdf");
        let draws = m.draws(&mut rng, 4000).expect("draws");

        // Assert
        assert_relative_eq!(c0, 0.5, epsilon = 1e-12);
        assert_relative_eq!(c1, 0.975, epsilon = 1e-3);
        assert!(draws.mean().unwrap_or(f64::NAN).abs() < 0.1);
    }
}
