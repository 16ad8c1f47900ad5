//! Integration tests for Bayesian updating.
//!
//! Purpose
//! -------
//! - Validate `bayes::update` through the public surface: closed-form
//!   updates for registered pairs, sampling for everything else, and the
//!   posterior models both paths return.
//!
//! Coverage
//! --------
//! - Beta/Bernoulli and Gamma/Exponential conjugacy, for several n
//!   including zero.
//! - Metropolis-Hastings with the prior and with a separate proposal.
//! - Finding a posterior mode through `bayes::product` and the dispatcher.
//!
//! Exclusions
//! ----------
//! - Acceptance-rate tuning; the sampler does not adapt.
use std::sync::Arc;

use ndarray::{Array1, array};
use rand::{RngCore, SeedableRng, rngs::StdRng};
use rust_statmodels::{
    bayes::{McmcSettings, product, update},
    data::Dataset,
    distributions::{bernoulli, beta, exponential, gamma, normal, pmf_mean},
    estimation::estimate,
    mle::MleSettings,
    model::{ModelFamily, ModelStatus},
    optimization::loglik_optimizer::MleMethod,
};

fn seven_of_ten() -> Arc<Dataset> {
    Arc::new(Dataset::from_vector(array![1.0, 0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0]))
}

#[test]
// Purpose
// -------
// Beta(2, 2) with 7 successes in 10 Bernoulli trials is Beta(9, 5),
// computed without sampling.
//
// Given
// -----
// - A seeded rng and a clone of it.
//
// Expect
// ------
// - A Beta posterior with parameters exactly (9, 5).
// - The rng was not advanced.
fn beta_bernoulli_without_sampling() {
    // Arrange
    let prior = beta().with_parameters(&[2.0, 2.0]).expect("beta");
    let mut rng = StdRng::seed_from_u64(99);
    let mut twin = rng.clone();

    // Act
    let post = update(Some(&seven_of_ten()), &prior, &bernoulli(), &mut rng).expect("posterior");

    // Assert
    assert_eq!(post.family, ModelFamily::Beta);
    assert_eq!(post.status, ModelStatus::Converged);
    assert_eq!(post.packed_parameters().expect("params"), array![9.0, 5.0]);
    assert_eq!(rng.next_u64(), twin.next_u64());
}

#[test]
// Purpose
// -------
// Gamma/Exponential is exact for any n ≥ 0.
//
// Given
// -----
// - Gamma(3, 2) and the first n of twenty seeded Exponential(1.5) draws
//   for n in {0, 1, 7, 20}.
//
// Expect
// ------
// - shape = 3 + n and rate = 2 + Σx, to rounding of the sum.
fn gamma_exponential_is_exact() {
    // Arrange
    let prior = gamma().with_parameters(&[3.0, 2.0]).expect("gamma");
    let lik = exponential().with_parameters(&[1.5]).expect("exponential");
    let mut rng = StdRng::seed_from_u64(12);
    let draws = lik.draws(&mut rng, 20).expect("draws").column(0).to_owned();

    for n in [0usize, 1, 7, 20] {
        let xs: Array1<f64> = draws.slice(ndarray::s![..n]).to_owned();
        let sum = xs.sum();
        let data = Arc::new(Dataset::from_vector(xs));

        // Act
        let post = update(Some(&data), &prior, &lik, &mut rng).expect("posterior");

        // Assert
        let p = post.packed_parameters().expect("params");
        assert_eq!(p[0], 3.0 + n as f64);
        assert!((p[1] - (2.0 + sum)).abs() < 1e-12, "n = {n}: rate {} vs {}", p[1], 2.0 + sum);
    }
}

#[test]
// Purpose
// -------
// A pair without a rule is sampled; a proposal other than the prior gives
// the same posterior.
//
// Given
// -----
// - Normal(0, 1) prior on an Exponential rate, which puts mass on
//   negative rates the likelihood's constraint rejects.
// - Data {0.5, 1.0, 0.8, 1.2}; once with the prior as proposal and once
//   with a Gamma(2, 2) proposal.
//
// Expect
// ------
// - Two PMF posteriors whose means agree within 0.1, both positive.
fn sampled_posterior_with_and_without_proposal() {
    // Arrange
    let prior = normal().with_parameters(&[0.0, 1.0]).expect("normal");
    let data = Arc::new(Dataset::from_vector(array![0.5, 1.0, 0.8, 1.2]));
    let mut lik_with_proposal = exponential();
    lik_with_proposal.settings.add(
        McmcSettings::new(8000, 0.1)
            .expect("settings")
            .with_proposal(gamma().with_parameters(&[2.0, 2.0]).expect("gamma")),
    );
    let mut rng = StdRng::seed_from_u64(31);

    // Act
    let by_prior = update(Some(&data), &prior, &exponential(), &mut rng).expect("prior proposal");
    let by_proposal = update(Some(&data), &prior, &lik_with_proposal, &mut rng).expect("gamma proposal");

    // Assert
    assert_eq!(by_prior.family, ModelFamily::Pmf);
    let m1 = pmf_mean(&by_prior).expect("mean")[0];
    let m2 = pmf_mean(&by_proposal).expect("mean")[0];
    assert!(m1 > 0.0 && m2 > 0.0);
    assert!((m1 - m2).abs() < 0.1, "prior proposal {m1}, gamma proposal {m2}");
}

#[test]
// Purpose
// -------
// The product model's maximum is the conjugate posterior's mode.
//
// Given
// -----
// - Gamma(2, 1) prior, Exponential likelihood seeded at 1, data
//   {0.5, 1.5, 1.0}.
//
// Expect
// ------
// - The mode of Gamma(5, 4), (5 - 1) / 4 = 1, within 1e-3.
fn product_mode_matches_conjugate_mode() {
    // Arrange
    let prior = gamma().with_parameters(&[2.0, 1.0]).expect("gamma");
    let lik = exponential().with_parameters(&[1.0]).expect("exponential");
    let mut joint = product(&prior, &lik).expect("product");
    joint
        .settings
        .add(MleSettings::new(Some(MleMethod::NelderMead), 0.1, 1e-12, 2000).expect("settings"));
    let data = Arc::new(Dataset::from_vector(array![0.5, 1.5, 1.0]));

    // Act
    let mode = estimate(&data, &joint).expect("mode");

    // Assert
    assert!((mode.param(0).expect("rate") - 1.0).abs() < 1e-3);
}
