//! Binomial(n, p) kernel.
//!
//! Data is either a matrix whose first two columns are `(misses, hits)` per
//! row, or raw 0/1 values read as a single run of trials. Draws use the same
//! two-column layout, so a matrix of draws can be fed straight back in.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::RngCore;
use rand_distr::Distribution;
use statrs::{
    distribution::{Binomial as BinomialDist, DiscreteCDF},
    function::gamma::ln_gamma,
};

use crate::{
    data::Dataset,
    distributions::{
        Bound, bernoulli::hits_and_trials, bound_projection, nonempty_values,
        normal::first_value, sampler_error, vector_params,
    },
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult,
        ModelShape, ModelStatus, Projection,
    },
};

pub const P_MARGIN: f64 = 1e-4;

#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialKernel;

/// Unparameterized Binomial prototype with parameters `[n, p]`.
pub fn binomial() -> Model {
    Model::new(
        "Binomial distribution",
        ModelFamily::Binomial,
        ModelShape::vector(2).with_dsize(2),
        Arc::new(BinomialKernel),
    )
}

/// `(trials, hits)` per experiment.
pub(crate) fn experiments(data: &Dataset) -> Vec<(f64, f64)> {
    match &data.matrix {
        Some(m) if m.ncols() >= 2 => {
            m.rows().into_iter().map(|r| (r[0] + r[1], r[1])).collect()
        }
        _ => {
            let (hits, n) = hits_and_trials(data);
            vec![(n, hits)]
        }
    }
}

fn ln_choose(n: f64, k: f64) -> f64 {
    ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0)
}

impl ModelKernel for BinomialKernel {
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
        let p = model.param(1)?;
        Ok(experiments(data)
            .into_iter()
            .map(|(n, k)| ln_choose(n, k) + k * p.ln() + (n - k) * (1.0 - p).ln())
            .sum())
    }

    /// Trial counts come from the data, so the `n` component is zero.
    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let p = model.param(1)?;
        let dp: f64 = experiments(data).into_iter().map(|(n, k)| k / p - (n - k) / (1.0 - p)).sum();
        Ok(array![0.0, dp])
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let [n, p] = vector_params::<2>(model)?;
        let trials = n.round().max(0.0) as u64;
        let dist = rand_distr::Binomial::new(trials, p).map_err(|_| sampler_error("p", p))?;
        let hits = dist.sample(rng) as f64;
        Ok(array![trials as f64 - hits, hits])
    }

    /// Probability of at most the given number of hits.
    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let [n, p] = vector_params::<2>(model)?;
        let x = first_value(data)?;
        if x < 0.0 {
            return Ok(0.0);
        }
        let dist = BinomialDist::new(p, n.round().max(0.0) as u64).map_err(|_| {
            ModelError::InvalidParameter { name: "p", value: p, reason: "must lie in [0, 1]" }
        })?;
        Ok(dist.cdf(x.floor() as u64))
    }

    fn constraint(&self, _data: &Dataset, model: &Model) -> ModelResult<Projection> {
        bound_projection(model, &[Bound::positive(0), Bound::unit(1)], P_MARGIN)
    }

    fn estimate(&self, data: &Dataset, mut model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        nonempty_values(data)?;
        let ex = experiments(data);
        let trials: f64 = ex.iter().map(|(n, _)| n).sum();
        let hits: f64 = ex.iter().map(|(_, k)| k).sum();
        model.set_packed(&array![trials / ex.len() as f64, hits / trials])?;
        model.status = ModelStatus::Converged;
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    // Purpose
    // -------
    // Both data layouts give the same estimate and log likelihood.
    //
    // Given
    // -----
    // - Raw data 1,0,1,1 and the one-row matrix (misses 1, hits 3).
    //
    // Expect
    // ------
    // - p = 0.75 and n = 4 either way; equal log likelihoods.
    fn raw_and_tabulated_layouts_agree() {
        // Arrange
        let raw = Dataset::from_vector(array![1.0, 0.0, 1.0, 1.0]);
        let table = Dataset::from_matrix(array![[1.0, 3.0]]);
        let mut proto = binomial();
        proto.clear(None);

        // Act
        let a = BinomialKernel.estimate(&raw, proto.clone(), None).expect("estimate raw");
        let b = BinomialKernel.estimate(&table, proto, None).expect("estimate table");

        // Assert
        assert_relative_eq!(a.param(1).expect("p"), 0.75);
        assert_relative_eq!(b.param(0).expect("n"), 4.0);
        assert_relative_eq!(
            a.log_likelihood(&raw).expect("ll"),
            b.log_likelihood(&table).expect("ll"),
            epsilon = 1e-12
        );
    }
}
