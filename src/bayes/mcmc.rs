//! bayes::mcmc — Metropolis-Hastings over a likelihood's parameters.
//!
//! Purpose
//! -------
//! Sample the posterior `prior(θ) · L(data | θ)` when no conjugate rule
//! applies, and summarize the recorded draws as a PMF (or a histogram).
//!
//! Key behaviors
//! -------------
//! - Independence proposals draw candidates from the prior or a proposal
//!   model. With the prior as proposal the prior cancels from the
//!   acceptance ratio, which reduces to the likelihood ratio; a separate
//!   proposal model adds the usual `prior(θ) / q(θ)` correction.
//! - A random-walk proposal steps from the current point by a Gaussian
//!   with a common standard deviation per coordinate, so the ratio is the
//!   full `prior · L` ratio. After every step the variance is multiplied
//!   by `1 + (r / target - 1) / 100`, where `r` is the running accept rate
//!   padded with `periods / 100` pseudo-steps at the target rate.
//! - A candidate the likelihood's constraint would move (positive penalty)
//!   is rejected outright.
//! - Independence chains start at the first admissible candidate; a
//!   random walk starts at one in every coordinate. Either starts at the
//!   likelihood's parameters when it arrives with some.
//! - Draws after the burn-in are recorded, one row per period, including
//!   repeats when a candidate is rejected.
//!
//! Invariants & assumptions
//! ------------------------
//! - Candidate width must equal the likelihood's parameter count.
//! - A NaN log target is a modeling error and is reported as
//!   `NumericDivergence` with the offending candidate.
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore};
use rand_distr::{Distribution, StandardNormal};

use crate::{
    bayes::settings::{McmcSettings, Proposal},
    data::{DataError, Dataset},
    distributions::{histogram, pmf_from_dataset},
    model::{Capability, Model, ModelError, ModelResult, ModelStatus},
    settings_group,
};

/// Acceptance statistics of the run that produced a posterior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct McmcReport {
    pub accept_rate: f64,
    pub target_accept_rate: f64,
    pub recorded: usize,
    /// Final step standard deviation of a random-walk proposal.
    pub step_scale: Option<f64>,
}

settings_group!(McmcReport, "mcmc report");

/// One packed parameter vector as a single-row data set.
fn point(theta: &Array1<f64>) -> Dataset {
    Dataset::from_matrix(theta.clone().insert_axis(Axis(0)))
}

/// Terms added to the log likelihood in the acceptance weight.
#[derive(Clone, Copy)]
enum Correction<'a> {
    /// The prior is the proposal and cancels.
    None,
    /// Symmetric proposal: the prior stays in.
    Prior,
    /// Independence proposal `q`: `prior / q`.
    PriorOverProposal(&'a Model),
}

struct Target<'a> {
    data: &'a Dataset,
    prior: &'a Model,
    correction: Correction<'a>,
    likelihood: Model,
}

impl Target<'_> {
    /// Log of the acceptance weight of `theta`; `None` when the
    /// likelihood's constraint rejects it.
    fn log_weight(&mut self, theta: &Array1<f64>) -> ModelResult<Option<f64>> {
        self.likelihood.set_packed(theta)?;
        if self.likelihood.has(Capability::Constraint)
            && !self.likelihood.constraint(self.data)?.is_feasible()
        {
            return Ok(None);
        }
        let mut lw = self.likelihood.log_likelihood(self.data)?;
        match self.correction {
            Correction::None => {}
            Correction::Prior => lw += self.prior.log_likelihood(&point(theta))?,
            Correction::PriorOverProposal(q) => {
                let at = point(theta);
                lw += self.prior.log_likelihood(&at)? - q.log_likelihood(&at)?;
            }
        }
        Ok(Some(lw))
    }
}

/// Gaussian random walk whose variance chases the target accept rate.
#[derive(Debug, Clone)]
struct Walk {
    sd: f64,
    target: f64,
    padding: f64,
    accepted: usize,
    rejected: usize,
}

impl Walk {
    fn new(sd: f64, settings: &McmcSettings) -> Self {
        Self {
            sd,
            target: settings.target_accept_rate,
            padding: settings.periods as f64 / 100.0,
            accepted: 0,
            rejected: 0,
        }
    }

    fn step(&self, from: &Array1<f64>, rng: &mut dyn RngCore) -> Array1<f64> {
        from.mapv(|v| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            v + self.sd * z
        })
    }

    fn adapt(&mut self, accepted: bool) {
        if accepted {
            self.accepted += 1;
        } else {
            self.rejected += 1;
        }
        let rate = (self.accepted as f64 + self.padding * self.target)
            / ((self.accepted + self.rejected) as f64 + self.padding);
        let variance_factor = 1.0 + (rate / self.target - 1.0) / 100.0;
        self.sd *= variance_factor.sqrt();
    }
}

enum Candidates<'a> {
    Independent(&'a Model),
    Walk(Walk),
}

/// Posterior over `likelihood`'s parameters by Metropolis-Hastings.
///
/// Without `data` the likelihood contributes nothing and the result
/// summarizes the prior (or the proposal-corrected prior).
///
/// # Errors
/// - [`ModelError::NotParameterized`] when the likelihood has no parameters
///   and its shape depends on data.
/// - [`ModelError::ParameterCountMismatch`] when proposal draws have the
///   wrong width.
/// - [`ModelError::NumericDivergence`] on a NaN log target.
/// - [`ModelError::RejectionBudget`] when no candidate was admissible.
pub fn metropolis_hastings(
    data: Option<&Dataset>, prior: &Model, likelihood: &Model, settings: &McmcSettings,
    rng: &mut dyn RngCore,
) -> ModelResult<Model> {
    let empty = Dataset::default();
    let data = data.unwrap_or(&empty);
    let mut lik = likelihood.clone();
    if lik.parameters.is_none() {
        if !lik.shape.is_fixed() {
            return Err(ModelError::NotParameterized { model: lik.name.clone() });
        }
        lik.clear(None);
    }
    let k = lik.parameter_count();
    let start = likelihood.parameters.as_ref().map(|_| lik.packed_parameters()).transpose()?;
    let (mut candidates, correction) = match &settings.proposal {
        Proposal::Prior => (Candidates::Independent(prior), Correction::None),
        Proposal::Model(q) => (Candidates::Independent(q.as_ref()), Correction::PriorOverProposal(q.as_ref())),
        Proposal::RandomWalk(sd) => (Candidates::Walk(Walk::new(*sd, settings)), Correction::Prior),
    };
    let mut target = Target { data, prior, correction, likelihood: lik };

    let origin = match (&start, &candidates) {
        (Some(theta), _) => Some(theta.clone()),
        (None, Candidates::Walk(_)) => Some(Array1::ones(k)),
        (None, Candidates::Independent(_)) => None,
    };
    let mut current: Option<(Array1<f64>, f64)> = None;
    if let Some(theta) = &origin {
        if let Some(lw) = target.log_weight(theta)? {
            if !lw.is_nan() {
                current = Some((theta.clone(), lw));
            }
        }
    }

    let burn = settings.burnin_periods();
    let mut accepted = 0usize;
    let mut recorded: Vec<f64> = Vec::with_capacity((settings.periods - burn) * k);
    for period in 0..settings.periods {
        let candidate = match &candidates {
            Candidates::Independent(q) => q.draw(rng)?,
            Candidates::Walk(walk) => {
                let centre = current.as_ref().map(|(theta, _)| theta).or(origin.as_ref());
                match centre {
                    Some(centre) => walk.step(centre, rng),
                    None => Array1::ones(k),
                }
            }
        };
        if candidate.len() != k {
            return Err(ModelError::ParameterCountMismatch { expected: k, found: candidate.len() });
        }
        let mut took = false;
        if let Some(lw) = target.log_weight(&candidate)? {
            if lw.is_nan() {
                return Err(ModelError::NumericDivergence {
                    params: candidate.to_vec(),
                    context: "metropolis-hastings log target",
                });
            }
            took = match &current {
                None => true,
                Some((_, lw_current)) => {
                    let log_ratio = lw - lw_current;
                    // -inf against -inf: neither point is possible, stay put.
                    !log_ratio.is_nan() && (log_ratio >= 0.0 || rng.random::<f64>().ln() < log_ratio)
                }
            };
            if took {
                current = Some((candidate, lw));
                accepted += 1;
            }
        }
        if let Candidates::Walk(walk) = &mut candidates {
            walk.adapt(took);
        }
        if period >= burn {
            if let Some((theta, _)) = &current {
                recorded.extend(theta.iter().copied());
            }
        }
    }

    let rows = recorded.len() / k.max(1);
    if rows == 0 {
        return Err(ModelError::RejectionBudget { model: likelihood.name.clone(), tries: settings.periods });
    }
    let found = recorded.len();
    let draws = Array2::from_shape_vec((rows, k), recorded).map_err(|_| DataError::ShapeMismatch {
        what: "posterior draws",
        expected: rows * k,
        found,
    })?;

    let accept_rate = accepted as f64 / settings.periods as f64;
    log::info!(
        "metropolis-hastings for '{}': accept rate {accept_rate:.3} (target {:.2}), {rows} draws recorded",
        likelihood.name,
        settings.target_accept_rate
    );
    if accept_rate < settings.target_accept_rate / 10.0 {
        log::warn!("acceptance rate {accept_rate:.4} is far below target; the posterior may be coarse");
    }

    let mut posterior = match settings.bins {
        Some(bins) => histogram(&draws, bins)?,
        None => pmf_from_dataset(Dataset::from_matrix(draws))?,
    };
    posterior.name = format!("posterior of {}", likelihood.name);
    posterior.status = ModelStatus::Converged;
    let step_scale = match &candidates {
        Candidates::Walk(walk) => Some(walk.sd),
        Candidates::Independent(_) => None,
    };
    posterior.settings.add(McmcReport {
        accept_rate,
        target_accept_rate: settings.target_accept_rate,
        recorded: rows,
        step_scale,
    });
    Ok(posterior)
}
