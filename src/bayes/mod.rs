//! bayes — posterior models from a prior, a likelihood and data.
//!
//! Purpose
//! -------
//! Turn `(data, prior, likelihood)` into a posterior model. Known
//! prior/likelihood pairs are updated in closed form from sufficient
//! statistics; every other pair is sampled by Metropolis-Hastings and the
//! posterior is the empirical distribution of the chain.
//!
//! Key behaviors
//! -------------
//! - The conjugate lookup is keyed by model family, never by name.
//! - MCMC settings are read from the prior, then the likelihood, then the
//!   defaults.
//! - [`update`] uses a process-wide table built on first use and frozen;
//!   [`update_with`] takes a caller-built table (e.g. with custom rules).
//!
//! Downstream usage
//! ----------------
//! - [`product`] builds the unnormalized `prior × likelihood` model for
//!   finding a posterior mode with the MLE engine.
pub mod conjugate;
pub mod mcmc;
pub mod product;
pub mod settings;

use std::sync::{Arc, OnceLock};

use rand::RngCore;

use crate::{data::Dataset, model::Model, model::ModelResult};

pub use self::conjugate::{ConjugateRule, ConjugateTable, UPDATE_CATEGORY};
pub use self::mcmc::{McmcReport, metropolis_hastings};
pub use self::product::product;
pub use self::settings::{McmcSettings, Proposal};

/// The built-in conjugate table, shared by every [`update`] call.
pub fn default_conjugates() -> &'static ConjugateTable {
    static TABLE: OnceLock<ConjugateTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let table = ConjugateTable::with_defaults();
        table.freeze();
        table
    })
}

/// Posterior of `likelihood`'s parameters given `data` and `prior`, using
/// the built-in conjugate rules.
///
/// # Errors
/// - Any error of the conjugate rule or of [`metropolis_hastings`].
pub fn update(
    data: Option<&Arc<Dataset>>, prior: &Model, likelihood: &Model, rng: &mut dyn RngCore,
) -> ModelResult<Model> {
    update_with(default_conjugates(), data, prior, likelihood, rng)
}

/// [`update`] with an explicit conjugate table.
pub fn update_with(
    table: &ConjugateTable, data: Option<&Arc<Dataset>>, prior: &Model, likelihood: &Model,
    rng: &mut dyn RngCore,
) -> ModelResult<Model> {
    let observed = data.map(Arc::as_ref);
    let mut posterior = match table.rule_for(prior, likelihood) {
        Some(rule) => {
            log::debug!("conjugate update of '{}' with '{}'", prior.name, likelihood.name);
            rule(observed, prior, likelihood)?
        }
        None => {
            log::debug!(
                "no conjugate rule for ({}, {}); sampling by metropolis-hastings",
                prior.family,
                likelihood.family
            );
            let settings = prior
                .settings
                .get::<McmcSettings>()
                .or_else(|| likelihood.settings.get::<McmcSettings>())
                .cloned()
                .unwrap_or_default();
            metropolis_hastings(observed, prior, likelihood, &settings, rng)?
        }
    };
    if let Some(d) = data {
        if posterior.data.is_none() {
            posterior.data = Some(Arc::clone(d));
        }
    }
    Ok(posterior)
}
