//! loglik_optimizer::api — the `maximize` entry point.
use argmin::core::CostFunction;
use argmin::solver::conjugategradient::beta::{FletcherReeves, PolakRibiere};
use rand::RngCore;

use crate::optimization::{
    errors::{OptError, OptResult},
    loglik_optimizer::{
        adapter::ArgMinAdapter,
        builders::{
            build_annealing, build_conjugate_gradient, build_descent, build_lbfgs_hager_zhang,
            build_lbfgs_more_thuente, build_root_finder, build_simplex, simplex_vertices,
        },
        run::run_solver,
        traits::{
            CgBeta, LineSearcher, LogLikelihood, MleMethod, OptimOutcome, SolverOptions,
            Termination,
        },
        types::{GradState, HagerZhangLS, MoreThuenteLS, SimplexState, Theta},
        validation::validate_theta0,
    },
};

/// Maximize a log-likelihood `ℓ(θ)` with the method in `opts`.
///
/// # Behavior
/// - Validates `theta0` (finite) and calls `f.check(theta0, data)` once.
/// - For Nelder-Mead, evaluates every starting vertex first: a NaN there
///   is reported as [`OptError::NumericDivergence`] at that vertex. A
///   converged simplex is restarted at its best vertex (at most
///   [`MAX_SIMPLEX_RESTARTS`] times) until a restart gains no more than
///   the spread tolerance.
/// - Wraps `(f, data)` in an [`ArgMinAdapter`] exposing the cost
///   `c(θ) = -ℓ(θ)` to argmin.
/// - Builds the solver selected by `opts.method` (and, for the line-search
///   methods, `opts.line_searcher`) and runs it through
///   [`run_solver`].
///
/// `rng` is only consulted by simulated annealing; the other methods are
/// deterministic and accept `None`.
///
/// # Errors
/// - [`OptError::InvalidThetaInput`] for a non-finite starting point.
/// - [`OptError::InvalidMethod`] for annealing without a random source.
/// - Errors from `f.check`, the builders, and the run itself. A solver that
///   gets stuck is *not* an error: the outcome reports it through
///   [`Termination::Stuck`](super::traits::Termination).
///
/// # Example
/// ```no_run
/// use ndarray::array;
/// use rust_statmodels::optimization::errors::OptResult;
/// use rust_statmodels::optimization::loglik_optimizer::{maximize, LogLikelihood, SolverOptions, Theta};
///
/// struct Bowl;
/// impl LogLikelihood for Bowl {
///     type Data = ();
///     fn value(&self, theta: &Theta, _: &()) -> OptResult<f64> {
///         Ok(-theta.dot(theta))
///     }
///     fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
///         Ok(())
///     }
/// }
///
/// let out = maximize(&Bowl, array![0.1, -0.2], &(), &SolverOptions::default(), None)?;
/// println!("θ̂ = {:?}", out.theta_hat);
/// # Ok::<(), rust_statmodels::optimization::errors::OptError>(())
/// ```
pub fn maximize<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &SolverOptions, rng: Option<&mut dyn RngCore>,
) -> OptResult<OptimOutcome> {
    validate_theta0(&theta0)?;
    f.check(&theta0, data)?;
    let problem = ArgMinAdapter::new(f, data);

    macro_rules! with_line_search {
        ($ls:expr) => {
            match opts.method {
                MleMethod::ConjugateGradient(CgBeta::FletcherReeves) => {
                    let solver = build_conjugate_gradient($ls, FletcherReeves::new(), theta0.len(), opts);
                    run_solver::<_, _, GradState>(theta0, opts, None, problem, solver)
                }
                MleMethod::ConjugateGradient(CgBeta::PolakRibiere) => {
                    let solver = build_conjugate_gradient($ls, PolakRibiere::new(), theta0.len(), opts);
                    run_solver::<_, _, GradState>(theta0, opts, None, problem, solver)
                }
                _ => {
                    let solver = build_descent($ls, opts);
                    run_solver::<_, _, GradState>(theta0, opts, None, problem, solver)
                }
            }
        };
    }

    match (opts.method, opts.line_searcher) {
        (MleMethod::NelderMead, _) => maximize_simplex(f, theta0, data, opts),
        (MleMethod::Annealing(schedule), _) => {
            let rng = rng.ok_or(OptError::InvalidMethod {
                name: opts.method.to_string(),
                reason: "Simulated annealing needs a random number generator.",
            })?;
            let solver = build_annealing(schedule, &theta0, opts, rng)?;
            let planned = solver.planned_iterations();
            run_solver::<_, _, SimplexState>(theta0, opts, Some(planned), problem, solver)
        }
        (MleMethod::RootFinding(variant), _) => {
            let solver = build_root_finder(variant, opts);
            run_solver::<_, _, GradState>(theta0, opts, None, problem, solver)
        }
        (MleMethod::Lbfgs, LineSearcher::MoreThuente) => {
            let solver = build_lbfgs_more_thuente(opts)?;
            run_solver::<_, _, GradState>(theta0, opts, None, problem, solver)
        }
        (MleMethod::Lbfgs, LineSearcher::HagerZhang) => {
            let solver = build_lbfgs_hager_zhang(opts)?;
            run_solver::<_, _, GradState>(theta0, opts, None, problem, solver)
        }
        (_, LineSearcher::MoreThuente) => with_line_search!(MoreThuenteLS::new()),
        (_, LineSearcher::HagerZhang) => with_line_search!(HagerZhangLS::new()),
    }
}

/// Upper bound on the fresh simplexes built after the first one converges.
pub const MAX_SIMPLEX_RESTARTS: usize = 10;

/// Nelder-Mead with restarts at the best vertex.
///
/// A simplex can collapse, or settle with two equal-cost vertices on either
/// side of the optimum, and report convergence away from it. Each restart
/// rebuilds the full-size simplex at the best point so far; the iteration
/// cap covers all rounds together.
fn maximize_simplex<F: LogLikelihood>(
    f: &F, theta0: Theta, data: &F::Data, opts: &SolverOptions,
) -> OptResult<OptimOutcome> {
    let gain_tol = opts.tols.tol_grad.unwrap_or(0.0);
    let cap = opts.tols.max_iter.map(|m| m as u64);
    let mut start = theta0;
    let mut best: Option<OptimOutcome> = None;

    for round in 0..=MAX_SIMPLEX_RESTARTS {
        let used = best.as_ref().map_or(0, |b| b.iterations);
        let remaining = cap.map(|c| c.saturating_sub(used as u64));
        if remaining == Some(0) {
            break;
        }
        let problem = ArgMinAdapter::new(f, data);
        let vertices = simplex_vertices(&start, opts.step_size)?;
        for v in &vertices {
            problem.cost(v).map_err(OptError::from)?;
        }
        let solver = build_simplex(vertices, opts)?;
        let mut out =
            run_solver::<_, _, SimplexState>(start.clone(), opts, remaining, problem, solver)?;
        out.iterations += used;

        let gain = best.as_ref().map_or(f64::INFINITY, |b| out.value - b.value);
        let settled = out.termination != Termination::Converged || gain <= gain_tol;
        if round > 0 {
            log::debug!("simplex restart {round}: ll gain {gain:.3e}");
        }
        if gain < 0.0 {
            if let Some(b) = best.as_mut() {
                b.iterations = out.iterations;
                b.termination = out.termination;
                b.status = out.status;
            }
        } else {
            best = Some(out);
        }
        if settled {
            break;
        }
        if let Some(b) = &best {
            start = b.theta_hat.clone();
        }
    }
    best.ok_or(OptError::MissingThetaHat)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::loglik_optimizer::traits::{
        AnnealSchedule, RootVariant, Termination, Tolerances,
    };
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Every method converging on a smooth concave objective.
    // - Rejection of non-finite starting points and annealing without RNG.
    // - NaN propagation as `NumericDivergence`.
    // -------------------------------------------------------------------------

    /// ℓ(θ) = -(θ0 - 1)² - 2 (θ1 + 0.5)²
    struct Concave;
    impl LogLikelihood for Concave {
        type Data = ();
        fn value(&self, t: &Theta, _: &()) -> OptResult<f64> {
            Ok(-(t[0] - 1.0).powi(2) - 2.0 * (t[1] + 0.5).powi(2))
        }
        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
        fn grad(&self, t: &Theta, _: &()) -> OptResult<Theta> {
            Ok(array![-2.0 * (t[0] - 1.0), -4.0 * (t[1] + 0.5)])
        }
    }

    struct NanEverywhere;
    impl LogLikelihood for NanEverywhere {
        type Data = ();
        fn value(&self, _: &Theta, _: &()) -> OptResult<f64> {
            Ok(f64::NAN)
        }
        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    /// Finite below 1.01, NaN above.
    struct NanPastOne;
    impl LogLikelihood for NanPastOne {
        type Data = ();
        fn value(&self, t: &Theta, _: &()) -> OptResult<f64> {
            Ok(if t.iter().any(|v| *v > 1.01) { f64::NAN } else { -t.dot(t) })
        }
        fn check(&self, _: &Theta, _: &()) -> OptResult<()> {
            Ok(())
        }
    }

    fn opts(method: MleMethod, ls: LineSearcher) -> SolverOptions {
        let tols = Tolerances::new(Some(1e-7), None, Some(2000)).expect("valid tolerances");
        SolverOptions::new(method, tols, 0.5, ls, false, None).expect("valid options")
    }

    #[test]
    // Purpose
    // -------
    // The deterministic methods all reach the maximum.
    //
    // Given
    // -----
    // - The concave quadratic with maximum at (1, -0.5), start (0, 0).
    //
    // Expect
    // ------
    // - A converged outcome within 1e-3 of the maximum, ℓ ≈ 0.
    fn deterministic_methods_converge() {
        let methods = [
            (MleMethod::NelderMead, LineSearcher::MoreThuente),
            (MleMethod::ConjugateGradient(CgBeta::FletcherReeves), LineSearcher::MoreThuente),
            (MleMethod::ConjugateGradient(CgBeta::PolakRibiere), LineSearcher::HagerZhang),
            (MleMethod::Lbfgs, LineSearcher::MoreThuente),
            (MleMethod::Lbfgs, LineSearcher::HagerZhang),
            (MleMethod::SteepestDescent, LineSearcher::MoreThuente),
            (MleMethod::RootFinding(RootVariant::Newton), LineSearcher::MoreThuente),
            (MleMethod::RootFinding(RootVariant::HybridScaled), LineSearcher::MoreThuente),
        ];
        for (method, ls) in methods {
            // Act
            let out = maximize(&Concave, array![0.0, 0.0], &(), &opts(method, ls), None)
                .unwrap_or_else(|e| panic!("{method} failed: {e}"));

            // Assert
            assert_eq!(out.termination, Termination::Converged, "{method}: {}", out.status);
            assert_relative_eq!(out.theta_hat[0], 1.0, epsilon = 1e-3);
            assert_relative_eq!(out.theta_hat[1], -0.5, epsilon = 1e-3);
            assert!(out.value > -1e-5, "{method}: {}", out.value);
        }
    }

    #[test]
    // Purpose
    // -------
    // Annealing needs a generator and then runs its full schedule.
    //
    // Given
    // -----
    // - A short cooling schedule; once without an RNG, once with one.
    //
    // Expect
    // ------
    // - `InvalidMethod` without; a converged outcome near (1, -0.5) with.
    fn annealing_requires_rng() {
        // Arrange
        let schedule = AnnealSchedule::new(5, 20, 1.0, 1.0, 1.05, 0.01).expect("valid schedule");
        let o = opts(MleMethod::Annealing(schedule), LineSearcher::MoreThuente);
        let mut rng = StdRng::seed_from_u64(3);

        // Act
        let missing = maximize(&Concave, array![0.0, 0.0], &(), &o, None);
        let out = maximize(&Concave, array![0.0, 0.0], &(), &o, Some(&mut rng))
            .expect("annealing runs");

        // Assert
        assert!(matches!(missing, Err(OptError::InvalidMethod { .. })));
        assert!(out.converged(), "{}", out.status);
        assert!((out.theta_hat[0] - 1.0).abs() < 0.3, "{:?}", out.theta_hat);
        assert!((out.theta_hat[1] + 0.5).abs() < 0.3, "{:?}", out.theta_hat);
    }

    #[test]
    // Purpose
    // -------
    // Bad starting points and NaN objectives are errors, not outcomes.
    //
    // Given
    // -----
    // - A NaN starting coordinate; an objective that is always NaN.
    //
    // Expect
    // ------
    // - `InvalidThetaInput` and `NumericDivergence` respectively.
    fn invalid_inputs_error() {
        // Arrange
        let o = opts(MleMethod::NelderMead, LineSearcher::MoreThuente);

        // Act
        let bad_start = maximize(&Concave, array![f64::NAN, 0.0], &(), &o, None);
        let nan = maximize(&NanEverywhere, array![0.3], &(), &o, None);

        // Assert
        assert!(matches!(bad_start, Err(OptError::InvalidThetaInput { index: 0, .. })));
        assert_eq!(nan, Err(OptError::NumericDivergence { theta: vec![0.3] }));
    }

    #[test]
    // Purpose
    // -------
    // A NaN at a simplex vertex other than the start is an error.
    //
    // Given
    // -----
    // - An objective that is NaN past 1.01; start (1, 1) with step 0.5, so
    //   the second vertex is (1.5, 1).
    //
    // Expect
    // ------
    // - `NumericDivergence` at (1.5, 1) rather than a panic.
    fn nan_at_simplex_vertex_errors() {
        // Arrange
        let o = opts(MleMethod::NelderMead, LineSearcher::MoreThuente);

        // Act
        let out = maximize(&NanPastOne, array![1.0, 1.0], &(), &o, None);

        // Assert
        assert_eq!(out, Err(OptError::NumericDivergence { theta: vec![1.5, 1.0] }));
    }
}
