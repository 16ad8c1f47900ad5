//! mle::objective — a model's log likelihood as an optimizer objective.
//!
//! [`ModelObjective`] implements [`LogLikelihood`] over a scratch copy of
//! the model being estimated. Each evaluation writes the trial vector into
//! the scratch model's parameters, runs the model's constraint (when it
//! has one), and evaluates the log likelihood at the projected point minus
//! the constraint penalty. The optimizer therefore sees a continuous
//! objective that slopes back toward the feasible region instead of a
//! wall of rejected points.
//!
//! The analytic gradient is offered only when the model has a score; the
//! penalty's own slope `-(θ - proj) / penalty` is added outside the
//! feasible region. Models without a score get the adapter's finite
//! differences of the penalized objective.
use std::cell::RefCell;

use crate::{
    data::Dataset,
    model::{Capability, Model, ModelResult, Projection},
    optimization::{
        errors::{OptError, OptResult},
        loglik_optimizer::{Cost, Grad, LogLikelihood, Theta},
    },
};

/// Penalized log likelihood of a model in its packed parameters.
#[derive(Debug)]
pub struct ModelObjective {
    scratch: RefCell<Model>,
    delta: f64,
}

impl ModelObjective {
    /// Objective over a copy of `model`; `delta` is the numerical score step
    /// used where a score is requested but not analytic.
    pub fn new(model: &Model, delta: f64) -> Self {
        Self { scratch: RefCell::new(model.clone()), delta }
    }

    /// Log likelihood at the feasible point nearest `theta`, without the
    /// penalty, together with that point.
    pub fn feasible_value(&self, theta: &Theta, data: &Dataset) -> ModelResult<(f64, Theta)> {
        let mut model = self.scratch.borrow_mut();
        let proj = place(&mut model, theta, data)?;
        Ok((model.log_likelihood(data)?, proj.point))
    }
}

impl LogLikelihood for ModelObjective {
    type Data = Dataset;

    fn value(&self, theta: &Theta, data: &Dataset) -> OptResult<Cost> {
        let mut model = self.scratch.borrow_mut();
        let proj = place(&mut model, theta, data)?;
        Ok(model.log_likelihood(data)? - proj.penalty)
    }

    fn check(&self, theta: &Theta, data: &Dataset) -> OptResult<()> {
        let ll = self.value(theta, data)?;
        if ll.is_nan() {
            return Err(OptError::NumericDivergence { theta: theta.to_vec() });
        }
        Ok(())
    }

    fn grad(&self, theta: &Theta, data: &Dataset) -> OptResult<Grad> {
        let mut model = self.scratch.borrow_mut();
        if !model.has(Capability::Score) {
            return Err(OptError::GradientNotImplemented);
        }
        let proj = place(&mut model, theta, data)?;
        let mut g = model.score(data, self.delta)?;
        if proj.penalty > 0.0 {
            for ((gi, t), p) in g.iter_mut().zip(theta.iter()).zip(proj.point.iter()) {
                *gi -= (t - p) / proj.penalty;
            }
        }
        Ok(g)
    }
}

/// Write `theta` into `model`, replacing it by its projection when the
/// model's constraint moves it.
pub(crate) fn place(model: &mut Model, theta: &Theta, data: &Dataset) -> ModelResult<Projection> {
    model.set_packed(theta)?;
    if !model.has(Capability::Constraint) {
        return Ok(Projection::feasible(theta.clone()));
    }
    let proj = model.constraint(data)?;
    if !proj.is_feasible() {
        model.set_packed(&proj.point)?;
    }
    Ok(proj)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::normal;
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Unpenalized evaluation at feasible points.
    // - The penalty and its gradient outside the feasible region.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Feasible points evaluate to the plain log likelihood and score.
    //
    // Given
    // -----
    // - A Normal prototype and data {-1, 1} at θ = (0, 1).
    //
    // Expect
    // ------
    // - value = ll of N(0, 1) at the data; grad = analytic score (0, 0).
    fn feasible_point_is_unpenalized() {
        // Arrange
        let proto = normal().with_parameters(&[0.0, 1.0]).expect("valid parameters");
        let data = Dataset::from_vector(array![-1.0, 1.0]);
        let f = ModelObjective::new(&proto, 1e-3);
        let expected = proto.log_likelihood(&data).expect("ll");

        // Act
        let v = f.value(&array![0.0, 1.0], &data).expect("value");
        let g = f.grad(&array![0.0, 1.0], &data).expect("grad");

        // Assert
        assert_relative_eq!(v, expected, epsilon = 1e-12);
        assert_relative_eq!(g[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(g[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // An infeasible sigma is projected, penalized, and pushed back.
    //
    // Given
    // -----
    // - θ = (0, -1) for the Normal: sigma below zero.
    //
    // Expect
    // ------
    // - value = ll at the projected point minus the distance moved.
    // - The sigma component of the gradient includes a +1 pull toward
    //   feasibility.
    fn infeasible_point_is_projected_and_penalized() {
        // Arrange
        let proto = normal().with_parameters(&[0.0, 1.0]).expect("valid parameters");
        let data = Dataset::from_vector(array![0.0]);
        let f = ModelObjective::new(&proto, 1e-3);
        let theta = array![0.0, -1.0];

        // Act
        let (ll_proj, point) = f.feasible_value(&theta, &data).expect("projection");
        let v = f.value(&theta, &data).expect("value");
        let g = f.grad(&theta, &data).expect("grad");
        let score_at_proj = proto
            .with_parameters(&point.to_vec())
            .and_then(|m| m.score(&data, 1e-3))
            .expect("score");

        // Assert
        let penalty = 1.0 + point[1];
        assert_relative_eq!(v, ll_proj - penalty, epsilon = 1e-9);
        assert_relative_eq!(g[1], score_at_proj[1] + 1.0, epsilon = 1e-9);
    }
}
