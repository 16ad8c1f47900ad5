//! Custom argmin solvers.
//!
//! - [`guard::GradientGuard`]: shared gradient-norm stopping rule and
//!   "stuck" recovery around the derivative-based argmin solvers.
//! - [`annealing::SimulatedAnnealing`]: Metropolis sampler with geometric
//!   cooling.
//! - [`root_finding::ScoreRootFinder`]: Newton and trust-region Newton on the
//!   cost gradient.
pub mod annealing;
pub mod guard;
pub mod root_finding;

pub use self::annealing::SimulatedAnnealing;
pub use self::guard::GradientGuard;
pub use self::root_finding::ScoreRootFinder;
