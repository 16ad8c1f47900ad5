//! solvers::root_finding — Newton iterations on the gradient of the cost.
//!
//! The maximum of a smooth log likelihood is a root of its score, which is
//! a root of the cost gradient `g(θ)`. Each iteration builds the Jacobian
//! of `g` by central differences and solves `J · dx = -g` with an LU
//! decomposition.
//!
//! - [`RootVariant::Newton`] takes the full step.
//! - [`RootVariant::Hybrid`] limits the step to a trust radius and only
//!   accepts it when the residual `‖g‖` falls; the radius doubles after an
//!   accepted step and halves after a rejected one.
//! - [`RootVariant::HybridScaled`] measures step and radius in the norm
//!   scaled by the Jacobian column norms, so badly scaled parameters move
//!   at comparable rates.
//!
//! A singular Jacobian ends the iteration with
//! [`OptError::SingularJacobian`]; wrapped in the gradient guard this reads
//! as "stuck" and the last point is kept.
use argmin::core::{
    CostFunction, Error, Gradient, KV, Problem, Solver, State, TerminationReason,
    TerminationStatus,
};
use argmin_math::ArgminL2Norm;
use nalgebra::{DMatrix, DVector};
use ndarray::Array1;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        finite_diff::compute_jacobian,
        traits::{RootVariant, STUCK_EXIT},
        types::{Cost, Grad, GradState, Hessian, Theta},
    },
};

const MIN_RADIUS: f64 = 1e-12;

/// Newton-type root finder for the cost gradient.
#[derive(Debug, Clone)]
pub struct ScoreRootFinder {
    variant: RootVariant,
    delta: f64,
    radius: Option<f64>,
}

impl ScoreRootFinder {
    /// `delta` is the finite-difference step for the Jacobian.
    pub fn new(variant: RootVariant, delta: f64) -> Self {
        Self { variant, delta, radius: None }
    }

    fn column_scale(&self, jac: &Hessian) -> Array1<f64> {
        match self.variant {
            RootVariant::HybridScaled => jac
                .columns()
                .into_iter()
                .map(|c| {
                    let n = c.dot(&c).sqrt();
                    if n > 0.0 { n } else { 1.0 }
                })
                .collect(),
            _ => Array1::ones(jac.ncols()),
        }
    }
}

/// Solve `jac · dx = -g`.
fn newton_step(jac: &Hessian, g: &Grad, iteration: u64) -> OptResult<Grad> {
    let n = g.len();
    let a = DMatrix::from_fn(n, n, |i, j| jac[[i, j]]);
    let b = DVector::from_iterator(n, g.iter().map(|v| -v));
    let dx = a.lu().solve(&b).ok_or(OptError::SingularJacobian { iteration })?;
    if dx.iter().any(|v| !v.is_finite()) {
        return Err(OptError::SingularJacobian { iteration });
    }
    Ok(Array1::from_iter(dx.iter().copied()))
}

fn scaled_norm(v: &Array1<f64>, scale: &Array1<f64>) -> f64 {
    (v * scale).l2_norm()
}

impl<O> Solver<O, GradState> for ScoreRootFinder
where
    O: CostFunction<Param = Theta, Output = Cost> + Gradient<Param = Theta, Gradient = Grad>,
{
    const NAME: &'static str = "Score root finder";

    fn init(
        &mut self, problem: &mut Problem<O>, state: GradState,
    ) -> Result<(GradState, Option<KV>), Error> {
        let theta0 = state.get_param().cloned().ok_or_else(|| OptError::NotInitialized {
            text: "root finding needs a starting point".into(),
        })?;
        let cost = problem.cost(&theta0)?;
        let grad = problem.gradient(&theta0)?;
        Ok((state.param(theta0).cost(cost).gradient(grad), None))
    }

    fn next_iter(
        &mut self, problem: &mut Problem<O>, mut state: GradState,
    ) -> Result<(GradState, Option<KV>), Error> {
        let iteration = state.get_iter();
        let x = state.take_param().ok_or_else(|| OptError::NotInitialized {
            text: "root finding lost its current point".into(),
        })?;
        let g = match state.take_gradient() {
            Some(g) => g,
            None => problem.gradient(&x)?,
        };
        let cost = state.get_cost();

        let jac = compute_jacobian(|t| problem.gradient(t).map_err(OptError::from), &x, self.delta)?;
        let mut dx = newton_step(&jac, &g, iteration)?;

        if self.variant == RootVariant::Newton {
            let next = &x + &dx;
            let next_cost = problem.cost(&next)?;
            let next_grad = problem.gradient(&next)?;
            return Ok((state.param(next).cost(next_cost).gradient(next_grad), None));
        }

        let scale = self.column_scale(&jac);
        let radius = *self.radius.get_or_insert_with(|| {
            let r = scaled_norm(&x, &scale);
            if r > 0.0 { r } else { 1.0 }
        });
        let step_len = scaled_norm(&dx, &scale);
        if step_len > radius {
            dx *= radius / step_len;
        }
        let trial = &x + &dx;
        let trial_grad = problem.gradient(&trial)?;
        let accepted = trial_grad.iter().all(|v| v.is_finite())
            && trial_grad.l2_norm() < g.l2_norm();

        let kv = argmin::kv!("radius" => radius; "accepted" => accepted;);
        if accepted {
            self.radius = Some(radius.max(2.0 * scaled_norm(&dx, &scale)));
            let trial_cost = problem.cost(&trial)?;
            Ok((state.param(trial).cost(trial_cost).gradient(trial_grad), Some(kv)))
        } else {
            self.radius = Some(radius / 2.0);
            Ok((state.param(x).cost(cost).gradient(g), Some(kv)))
        }
    }

    fn terminate(&mut self, _state: &GradState) -> TerminationStatus {
        match self.radius {
            Some(r) if r < MIN_RADIUS => TerminationStatus::Terminated(TerminationReason::SolverExit(
                format!("{STUCK_EXIT}: trust radius collapsed"),
            )),
            _ => TerminationStatus::NotTerminated,
        }
    }
}
