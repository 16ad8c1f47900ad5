//! bayes::conjugate — closed-form posterior updates.
//!
//! Each rule maps `(data, prior, likelihood)` to the posterior, a copy of
//! the prior with updated parameters, using only sufficient statistics of
//! the data. When no data is given, the likelihood's own parameters stand
//! in for a single observation (for the binomial, `n` trials with `n·p`
//! hits).
//!
//! | prior | likelihood  | posterior                                      |
//! |-------|-------------|------------------------------------------------|
//! | Beta  | Bernoulli   | `(α + hits, β + misses)`                       |
//! | Beta  | Binomial    | `(α + Σ hits, β + Σ misses)`                   |
//! | Gamma | Exponential | `(α + n, β + Σx)`                              |
//! | Gamma | Poisson     | `(α + Σx, β + n)`                              |
//! | Normal| Normal (σ)  | precision-weighted mean, `sd = 1/sqrt(prec)`   |
use ndarray::{Array1, array};

use crate::{
    data::Dataset,
    distributions::{bernoulli::hits_and_trials, binomial::experiments, vector_params},
    model::{Model, ModelError, ModelFamily, ModelResult, ModelStatus},
    registry::Registry,
};

/// Registry category holding the conjugate rules.
pub const UPDATE_CATEGORY: &str = "update";

/// Closed-form update from `(data, prior, likelihood)` to the posterior.
pub type ConjugateRule = fn(Option<&Dataset>, &Model, &Model) -> ModelResult<Model>;

/// Conjugate rules keyed by `(prior family, likelihood family)`.
pub type ConjugateTable = Registry<(ModelFamily, ModelFamily), ConjugateRule>;

impl Registry<(ModelFamily, ModelFamily), ConjugateRule> {
    /// A table holding the built-in rules.
    pub fn with_defaults() -> Self {
        let table = Self::new();
        let rules: [((ModelFamily, ModelFamily), ConjugateRule); 5] = [
            ((ModelFamily::Beta, ModelFamily::Bernoulli), beta_bernoulli),
            ((ModelFamily::Beta, ModelFamily::Binomial), beta_binomial),
            ((ModelFamily::Gamma, ModelFamily::Exponential), gamma_exponential),
            ((ModelFamily::Gamma, ModelFamily::Poisson), gamma_poisson),
            ((ModelFamily::Normal, ModelFamily::Normal), normal_normal),
        ];
        for (key, rule) in rules {
            table.insert(UPDATE_CATEGORY, key, rule);
        }
        table
    }

    /// The rule for a prior/likelihood pair, if one is registered.
    pub fn rule_for(&self, prior: &Model, likelihood: &Model) -> Option<ConjugateRule> {
        self.lookup(UPDATE_CATEGORY, &(prior.family, likelihood.family))
    }
}

fn posterior(prior: &Model, values: Array1<f64>) -> ModelResult<Model> {
    let mut out = prior.clone();
    out.set_packed(&values)?;
    out.covariance = None;
    out.info = None;
    out.status = ModelStatus::Converged;
    Ok(out)
}

/// The observations: the data, else the likelihood's parameters.
fn observations<'a>(data: Option<&'a Dataset>, likelihood: &'a Model) -> ModelResult<&'a Dataset> {
    match data {
        Some(d) => Ok(d),
        None => likelihood.parameters(),
    }
}

fn beta_bernoulli(data: Option<&Dataset>, prior: &Model, likelihood: &Model) -> ModelResult<Model> {
    let [alpha, beta] = vector_params::<2>(prior)?;
    let (hits, trials) = match data {
        Some(d) => hits_and_trials(d),
        None => (likelihood.param(0)?, 1.0),
    };
    posterior(prior, array![alpha + hits, beta + trials - hits])
}

fn beta_binomial(data: Option<&Dataset>, prior: &Model, likelihood: &Model) -> ModelResult<Model> {
    let [alpha, beta] = vector_params::<2>(prior)?;
    let (trials, hits) = match data {
        Some(d) => experiments(d).into_iter().fold((0.0, 0.0), |(t, h), (dt, dh)| (t + dt, h + dh)),
        None => {
            let [n, p] = vector_params::<2>(likelihood)?;
            (n, n * p)
        }
    };
    posterior(prior, array![alpha + hits, beta + trials - hits])
}

fn gamma_exponential(data: Option<&Dataset>, prior: &Model, likelihood: &Model) -> ModelResult<Model> {
    let [shape, rate] = vector_params::<2>(prior)?;
    let xs = observations(data, likelihood)?.values();
    posterior(prior, array![shape + xs.len() as f64, rate + xs.iter().sum::<f64>()])
}

fn gamma_poisson(data: Option<&Dataset>, prior: &Model, likelihood: &Model) -> ModelResult<Model> {
    let [shape, rate] = vector_params::<2>(prior)?;
    let xs = observations(data, likelihood)?.values();
    posterior(prior, array![shape + xs.iter().sum::<f64>(), rate + xs.len() as f64])
}

fn normal_normal(data: Option<&Dataset>, prior: &Model, likelihood: &Model) -> ModelResult<Model> {
    let [mu0, tau] = vector_params::<2>(prior)?;
    let [mu_l, sigma] = vector_params::<2>(likelihood)?;
    if !(sigma > 0.0) || !(tau > 0.0) {
        return Err(ModelError::InvalidParameter {
            name: "sigma",
            value: sigma.min(tau),
            reason: "prior and likelihood standard deviations must be positive",
        });
    }
    let xs = match data {
        Some(d) => d.values(),
        None => vec![mu_l],
    };
    let n = xs.len() as f64;
    let precision = 1.0 / (tau * tau) + n / (sigma * sigma);
    let mean = (mu0 / (tau * tau) + xs.iter().sum::<f64>() / (sigma * sigma)) / precision;
    posterior(prior, array![mean, precision.sqrt().recip()])
}
