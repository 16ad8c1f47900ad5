//! Integration tests for the estimation pipeline.
//!
//! Purpose
//! -------
//! - Validate end-to-end maximum likelihood: seeded synthetic data, an
//!   unparameterized prototype, the generic engine with more than one
//!   optimizer, and the dispatcher's post-estimation summaries.
//!
//! Coverage
//! --------
//! - `mle::maximum_likelihood` with the simplex and the conjugate-gradient
//!   default on 10⁵ Normal draws for several scales.
//! - `mle::restart` continuing from a capped run.
//! - `estimation::estimate` with covariance and information criteria.
//! - Deep-copy isolation of estimated models.
//!
//! Exclusions
//! ----------
//! - Solver internals (line searches, annealing schedules, root finding);
//!   those are covered by unit tests beside the solvers.
use std::sync::Arc;

use ndarray::Array1;
use rand::{SeedableRng, rngs::StdRng};
use rust_statmodels::{
    data::Dataset,
    distributions::{gamma, normal},
    estimation::{PartsWanted, estimate},
    mle::{DEFAULT_RESTART_BOUNDARY, MleSettings, maximum_likelihood, restart},
    model::{Model, ModelStatus},
    optimization::loglik_optimizer::{CgBeta, MleMethod},
};

/// Purpose
/// -------
/// Draw `n` univariate observations from a parameterized model with a
/// fixed seed.
///
/// Returns
/// -------
/// - A shared vector dataset ready for estimation.
fn sample(model: &Model, n: usize, seed: u64) -> Arc<Dataset> {
    let mut rng = StdRng::seed_from_u64(seed);
    let draws = model.draws(&mut rng, n).expect("draws from a parameterized model");
    Arc::new(Dataset::from_vector(draws.column(0).to_owned()))
}

fn prototype(method: MleMethod) -> Model {
    let mut proto = normal();
    proto.settings.add(MleSettings::new(Some(method), 0.5, 1e-10, 5000).expect("valid settings"));
    proto
}

#[test]
// Purpose
// -------
// MLE recovers Normal(8, σ) for several σ with two distinct optimizers.
//
// Given
// -----
// - 10⁵ seeded draws from Normal(8, 1) and Normal(8, 3).
// - The simplex and Fletcher-Reeves conjugate gradient.
//
// Expect
// ------
// - Every fit within 0.1 of (8, σ) in each coordinate.
fn normal_recovery_is_optimizer_agnostic() {
    for (i, sigma) in [1.0, 3.0].into_iter().enumerate() {
        // Arrange
        let truth = normal().with_parameters(&[8.0, sigma]).expect("valid parameters");
        let data = sample(&truth, 100_000, 40 + i as u64);

        for method in [MleMethod::NelderMead, MleMethod::ConjugateGradient(CgBeta::FletcherReeves)] {
            // Act
            let fit = maximum_likelihood(&data, &prototype(method)).expect("fit");

            // Assert
            let mu = fit.param(0).expect("mu");
            let sd = fit.param(1).expect("sigma");
            assert!((mu - 8.0).abs() < 0.1, "{method}: mu = {mu} (sigma {sigma})");
            assert!((sd - sigma).abs() < 0.1, "{method}: sigma = {sd} (truth {sigma})");
        }
    }
}

#[test]
// Purpose
// -------
// A restart picks up where a capped run stopped.
//
// Given
// -----
// - 5000 Gamma(2, 3) draws; a simplex capped at 5 iterations, then a
//   restart of the same model with a generous cap.
//
// Expect
// ------
// - The capped run has not converged; the restart's log likelihood is at
//   least as high and its parameters are within 0.2 of the truth.
fn restart_improves_a_capped_fit() {
    // Arrange
    let truth = gamma().with_parameters(&[2.0, 3.0]).expect("valid parameters");
    let data = sample(&truth, 5000, 8);
    let mut capped = gamma();
    capped.settings.add(MleSettings::new(Some(MleMethod::NelderMead), 0.1, 1e-10, 5).expect("settings"));
    let first = maximum_likelihood(&data, &capped).expect("capped fit");

    // Act
    let mut longer = first.clone();
    longer.settings.add(MleSettings::new(Some(MleMethod::NelderMead), 0.1, 1e-10, 4000).expect("settings"));
    let second = restart(&longer, DEFAULT_RESTART_BOUNDARY).expect("restart");

    // Assert
    assert_ne!(first.status, ModelStatus::Converged);
    let ll_first = first.log_likelihood(&data).expect("ll");
    let ll_second = second.log_likelihood(&data).expect("ll");
    assert!(ll_second >= ll_first, "restart lowered ll: {ll_first} -> {ll_second}");
    assert!((second.param(0).expect("shape") - 2.0).abs() < 0.2);
    assert!((second.param(1).expect("rate") - 3.0).abs() < 0.2);
}

#[test]
// Purpose
// -------
// The dispatcher attaches covariance and information criteria, and the
// estimated copy is independent of the prototype and of its own clones.
//
// Given
// -----
// - 2000 Normal(1, 2) draws; a prototype asking for covariance.
//
// Expect
// ------
// - A 2 x 2 covariance with var(mu) near σ̂² / n; info with n = 2000.
// - Changing a clone's parameters leaves the fit untouched; the
//   prototype stays unparameterized.
fn dispatcher_summaries_and_copy_isolation() {
    // Arrange
    let truth = normal().with_parameters(&[1.0, 2.0]).expect("valid parameters");
    let data = sample(&truth, 2000, 3);
    let mut proto = normal();
    proto.settings.add(PartsWanted { covariance: true, info: true });

    // Act
    let fit = estimate(&data, &proto).expect("estimate");
    let mut copy = fit.clone();
    copy.set_packed(&Array1::from(vec![-4.0, 9.0])).expect("same length");
    copy.settings.add(PartsWanted::default());

    // Assert
    let cov = fit.covariance.as_ref().expect("covariance");
    let sigma = fit.param(1).expect("sigma");
    assert!((cov[[0, 0]] - sigma * sigma / 2000.0).abs() < 1e-4);
    let info = fit.info.expect("info");
    assert!(info.bic.is_some());
    assert!(info.aic < info.bic.expect("bic"));
    assert_ne!(fit.param(0).expect("mu"), -4.0);
    assert!(fit.settings.get::<PartsWanted>().expect("parts").covariance);
    assert!(proto.parameters.is_none());
}
