//! mle::engine — maximum-likelihood estimation of any evaluable model.
//!
//! Purpose
//! -------
//! Drive the optimizer against a model's log likelihood and turn the
//! outcome back into an estimated [`Model`]: parameters set to the best
//! feasible point, a status reflecting how the run ended, and optionally a
//! numerical covariance matrix.
//!
//! Key behaviors
//! -------------
//! - Read [`MleSettings`] from the model (defaults when absent); hand over
//!   to dimension cycling when `dim_cycle_tolerance > 0`.
//! - Starting point: the explicit setting, else the current parameters if
//!   they are finite and not all zero, else a vector of ones. Models with a
//!   constraint start from the projection of that point.
//! - Run [`maximize`] on a [`ModelObjective`] and map the termination:
//!   converged → `Converged`, iteration cap → `Failed(MaxIterations)`,
//!   stuck solver → `Failed(OptimizerStuck)`, non-finite optimum →
//!   `Failed(NotFinite)`. A NaN log likelihood is an error, not a status.
//!
//! Invariants & assumptions
//! ------------------------
//! - The caller's model is never mutated; public entry points work on a
//!   prepared copy.
//! - The returned parameters always satisfy the model's constraint.
use std::{cell::RefCell, sync::Arc};

use ndarray::{Array1, Array2};
use rand::RngCore;

use crate::{
    data::Dataset,
    inference::numerical_covariance,
    mle::{dim_cycle, objective::ModelObjective, objective::place, settings::MleSettings},
    model::{Capability, FailureKind, Model, ModelError, ModelResult, ModelStatus},
    optimization::{
        errors::OptError,
        loglik_optimizer::{Termination, maximize},
    },
};

/// Estimate `model` on `data` by maximum likelihood, ignoring any
/// closed-form estimator the model has.
///
/// # Errors
/// - [`ModelError::MissingCapability`] when the model can evaluate neither a
///   log likelihood nor a density.
/// - [`ModelError::NumericDivergence`] when the log likelihood turns NaN.
/// - [`ModelError::InfeasibleStart`] when the constraint cannot repair the
///   starting point.
/// - Invalid settings and optimizer configuration errors.
pub fn maximum_likelihood(data: &Arc<Dataset>, model: &Model) -> ModelResult<Model> {
    run(data, prepared_copy(data, model)?, None)
}

/// [`maximum_likelihood`] with a random source, required when the
/// configured method is simulated annealing.
pub fn maximum_likelihood_with_rng(
    data: &Arc<Dataset>, model: &Model, rng: &mut dyn RngCore,
) -> ModelResult<Model> {
    run(data, prepared_copy(data, model)?, Some(rng))
}

/// Numerical covariance of the packed parameters at the model's current
/// point: the pseudoinverse of the negated Hessian of the log likelihood,
/// differentiated through the (analytic or numerical) score.
///
/// # Errors
/// - [`ModelError::NotParameterized`] for a model without parameters.
/// - Hessian validation failures, e.g. a score that is not finite nearby.
pub fn covariance(data: &Dataset, model: &Model, delta: f64) -> ModelResult<Array2<f64>> {
    let theta = model.packed_parameters()?;
    let scratch = RefCell::new(model.clone());
    let score = |t: &Array1<f64>| -> Array1<f64> {
        let mut m = scratch.borrow_mut();
        match m.set_packed(t).and_then(|()| m.score(data, delta)) {
            Ok(g) => g,
            Err(_) => Array1::from_elem(t.len(), f64::NAN),
        }
    };
    Ok(numerical_covariance(&score, &theta)?)
}

// ---- Crate-internal steps ----

/// Copy `model` and run its preparation step on `data`, keeping the
/// caller's parameter values when the prepared shape still fits them.
pub(crate) fn prepared_copy(data: &Arc<Dataset>, model: &Model) -> ModelResult<Model> {
    let seed = model.packed_parameters().ok();
    let mut out = model.clone();
    out.prep(data)?;
    if let Some(seed) = seed {
        if !seed.is_empty() && seed.len() == out.parameter_count() {
            out.set_packed(&seed)?;
        }
    }
    Ok(out)
}

/// Estimate an already-prepared model in place.
pub(crate) fn run(
    data: &Dataset, mut model: Model, rng: Option<&mut dyn RngCore>,
) -> ModelResult<Model> {
    if !model.capabilities().can_evaluate() {
        return Err(ModelError::MissingCapability {
            model: model.name.clone(),
            capability: Capability::LogLikelihood,
        });
    }
    let settings = model.settings.get_or_default::<MleSettings>();
    if settings.dim_cycle_tolerance > 0.0 {
        return dim_cycle::cycle(data, model, &settings, rng);
    }
    if model.parameter_count() == 0 {
        log::debug!("'{}' has no free parameters; nothing to estimate", model.name);
        model.status = ModelStatus::Converged;
        return Ok(model);
    }

    let method = settings.resolve_method(&model);
    let opts = settings.solver_options(method)?;
    let theta0 = starting_point(&model, &settings)?;
    let theta0 = feasible_start(&mut model, theta0, data)?;
    log::debug!("estimating '{}' by {method} from {theta0}", model.name);

    let objective = ModelObjective::new(&model, settings.delta);
    let outcome = match maximize(&objective, theta0.clone(), data, &opts, rng) {
        Ok(outcome) => outcome,
        Err(
            err @ (OptError::InvalidThetaHat { .. }
            | OptError::NonFiniteCost { .. }
            | OptError::MissingThetaHat),
        ) => {
            log::warn!("estimation of '{}' produced no finite optimum: {err}", model.name);
            model.set_packed(&theta0)?;
            model.status = ModelStatus::Failed(FailureKind::NotFinite);
            return Ok(model);
        }
        Err(err) => return Err(err.into()),
    };

    let (_, point) = objective.feasible_value(&outcome.theta_hat, data)?;
    model.set_packed(&point)?;
    model.status = status_of(&outcome.termination);
    match &outcome.termination {
        Termination::Converged => log::debug!(
            "'{}' converged after {} iterations (ll = {:.6})",
            model.name,
            outcome.iterations,
            outcome.value
        ),
        Termination::MaxIterations => log::warn!(
            "'{}' hit the iteration cap of {} without converging",
            model.name,
            settings.max_iterations
        ),
        Termination::Stuck(reason) => {
            log::warn!("optimizer stuck while estimating '{}': {reason}", model.name)
        }
    }

    if settings.want_covariance {
        attach_covariance(data, &mut model, settings.delta);
    }
    Ok(model)
}

/// Starting vector for `model` under `settings`.
pub(crate) fn starting_point(model: &Model, settings: &MleSettings) -> ModelResult<Array1<f64>> {
    let k = model.parameter_count();
    if let Some(start) = &settings.starting_point {
        if start.len() != k {
            return Err(ModelError::ParameterCountMismatch { expected: k, found: start.len() });
        }
        return Ok(start.clone());
    }
    let current = model.packed_parameters()?;
    let usable = current.iter().all(|v| v.is_finite()) && current.iter().any(|v| *v != 0.0);
    Ok(if usable { current } else { Array1::ones(k) })
}

/// Project `theta0` with the model's constraint and confirm the result is
/// feasible. Leaves the model's parameters at the returned point.
pub(crate) fn feasible_start(
    model: &mut Model, theta0: Array1<f64>, data: &Dataset,
) -> ModelResult<Array1<f64>> {
    let proj = place(model, &theta0, data)?;
    if proj.is_feasible() {
        return Ok(theta0);
    }
    let again = model.constraint(data)?;
    if !again.is_feasible() || proj.point.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::InfeasibleStart { params: theta0.to_vec() });
    }
    log::debug!("starting point {theta0} moved into the feasible region at {}", proj.point);
    Ok(proj.point)
}

pub(crate) fn status_of(termination: &Termination) -> ModelStatus {
    match termination {
        Termination::Converged => ModelStatus::Converged,
        Termination::MaxIterations => ModelStatus::Failed(FailureKind::MaxIterations),
        Termination::Stuck(_) => ModelStatus::Failed(FailureKind::OptimizerStuck),
    }
}

/// Store the numerical covariance, logging instead of failing when the
/// Hessian cannot be formed.
pub(crate) fn attach_covariance(data: &Dataset, model: &mut Model, delta: f64) {
    match covariance(data, model, delta) {
        Ok(cov) => model.covariance = Some(cov),
        Err(err) => log::warn!("no covariance for '{}': {err}", model.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{exponential, gamma, normal};
    use crate::optimization::loglik_optimizer::MleMethod;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Recovery of closed-form optima by the generic engine.
    // - Starting-point resolution and repair of infeasible starts.
    // - Status mapping for an iteration cap.
    // - The numerical covariance against its closed form.
    // -------------------------------------------------------------------------

    fn sample(model: &Model, n: usize, seed: u64) -> Arc<Dataset> {
        let mut rng = StdRng::seed_from_u64(seed);
        let draws = model.draws(&mut rng, n).expect("draws");
        Arc::new(Dataset::from_vector(draws.column(0).to_owned()))
    }

    #[test]
    // Purpose
    // -------
    // MLE of a Normal ignores the closed form but lands on the same answer.
    //
    // Given
    // -----
    // - Data {1, 2, 3, 4}; simplex and the default (FR cg) method.
    //
    // Expect
    // ------
    // - mu ≈ 2.5 and sigma ≈ sqrt(1.25) within 1e-3, status converged.
    fn engine_matches_closed_form() {
        // Arrange
        let data = Arc::new(Dataset::from_vector(array![1.0, 2.0, 3.0, 4.0]));
        let mut simplex = normal();
        simplex.settings.add(
            MleSettings::new(Some(MleMethod::NelderMead), 0.05, 1e-10, 1000).expect("valid settings"),
        );

        // Act
        let by_simplex = maximum_likelihood(&data, &simplex).expect("simplex fit");
        let by_gradient = maximum_likelihood(&data, &normal()).expect("gradient fit");

        // Assert
        for fit in [by_simplex, by_gradient] {
            assert_eq!(fit.status, ModelStatus::Converged);
            assert_relative_eq!(fit.param(0).expect("mu"), 2.5, epsilon = 1e-3);
            assert_relative_eq!(fit.param(1).expect("sigma"), 1.25f64.sqrt(), epsilon = 1e-3);
        }
    }

    #[test]
    // Purpose
    // -------
    // A Gamma (no closed form) is fitted from a negative starting rate.
    //
    // Given
    // -----
    // - 5000 draws from Gamma(shape 2, rate 3); simplex from (2, -1).
    //
    // Expect
    // ------
    // - The start is repaired and the fit lands within 0.2 of (2, 3).
    fn infeasible_start_is_repaired() {
        // Arrange
        let truth = gamma().with_parameters(&[2.0, 3.0]).expect("valid parameters");
        let data = sample(&truth, 5000, 11);
        let mut proto = gamma();
        proto.settings.add(
            MleSettings::default()
                .with_method(MleMethod::NelderMead)
                .with_starting_point(array![2.0, -1.0]),
        );

        // Act
        let fit = maximum_likelihood(&data, &proto).expect("fit");

        // Assert
        assert!((fit.param(0).expect("shape") - 2.0).abs() < 0.2);
        assert!((fit.param(1).expect("rate") - 3.0).abs() < 0.2);
    }

    #[test]
    // Purpose
    // -------
    // Starting points: explicit, current parameters, or ones.
    //
    // Given
    // -----
    // - An unparameterized-but-cleared Normal, a parameterized one, and an
    //   explicit start of the wrong length.
    //
    // Expect
    // ------
    // - ones, the current values, and `ParameterCountMismatch`.
    fn starting_point_resolution() {
        // Arrange
        let mut cleared = normal();
        cleared.clear(None);
        let set = normal().with_parameters(&[3.0, 0.5]).expect("valid parameters");
        let bad = MleSettings::default().with_starting_point(array![1.0]);

        // Act / Assert
        assert_eq!(starting_point(&cleared, &MleSettings::default()).expect("ones"), array![1.0, 1.0]);
        assert_eq!(starting_point(&set, &MleSettings::default()).expect("current"), array![3.0, 0.5]);
        assert!(matches!(
            starting_point(&set, &bad),
            Err(ModelError::ParameterCountMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Hitting the iteration cap is a failed status, not an error.
    //
    // Given
    // -----
    // - Exponential data and a simplex limited to 2 iterations.
    //
    // Expect
    // ------
    // - `Failed(MaxIterations)` with finite parameters.
    fn iteration_cap_sets_failed_status() {
        // Arrange
        let truth = exponential().with_parameters(&[0.5]).expect("valid parameters");
        let data = sample(&truth, 200, 5);
        let mut proto = exponential();
        proto.settings.add(
            MleSettings::new(Some(MleMethod::NelderMead), 0.05, 1e-12, 2).expect("valid settings"),
        );

        // Act
        let fit = maximum_likelihood(&data, &proto).expect("fit");

        // Assert
        assert_eq!(fit.status, ModelStatus::Failed(FailureKind::MaxIterations));
        assert!(fit.param(0).expect("rate").is_finite());
    }

    #[test]
    // Purpose
    // -------
    // The numerical covariance of a Normal mean matches sigma² / n.
    //
    // Given
    // -----
    // - Normal(0, 2) evaluated on 400 seeded draws, at the closed-form fit.
    //
    // Expect
    // ------
    // - var(mu) ≈ sigma_hat² / n within 1e-4 relative.
    fn covariance_matches_closed_form() {
        // Arrange
        let truth = normal().with_parameters(&[0.0, 2.0]).expect("valid parameters");
        let data = sample(&truth, 400, 7);
        let fit = crate::estimation::estimate(&data, &normal()).expect("closed form");
        let sigma = fit.param(1).expect("sigma");

        // Act
        let cov = covariance(&data, &fit, 1e-3).expect("covariance");

        // Assert
        assert_relative_eq!(cov[[0, 0]], sigma * sigma / 400.0, max_relative = 1e-4);
        assert_relative_eq!(cov[[1, 1]], sigma * sigma / 800.0, max_relative = 1e-3);
    }
}
