//! bayes::settings — Metropolis-Hastings configuration.
use crate::{
    model::{Model, ModelError, ModelResult},
    settings_group,
};

pub const MCMC_GROUP: &str = "mcmc";

/// Where candidate parameter vectors come from.
#[derive(Debug, Clone)]
pub enum Proposal {
    /// Draw candidates from the prior (an independence sampler).
    Prior,
    /// Draw candidates from this model; it needs `Draw` and a density or
    /// log likelihood over parameter vectors.
    Model(Box<Model>),
    /// Gaussian steps around the current point whose standard deviation
    /// starts at the given value and adapts toward `target_accept_rate`.
    RandomWalk(f64),
}

/// Chain length, burn-in and output form of a Metropolis-Hastings run.
///
/// - `periods`: total chain steps.
/// - `burnin`: fraction of `periods` discarded before recording.
/// - `bins`: when set, the posterior is a histogram with that many bins per
///   coordinate instead of a PMF over the raw draws.
/// - `target_accept_rate`: the rate a random-walk proposal tunes its step
///   toward; independence proposals only report it.
#[derive(Debug, Clone)]
pub struct McmcSettings {
    pub periods: usize,
    pub burnin: f64,
    pub proposal: Proposal,
    pub bins: Option<usize>,
    pub target_accept_rate: f64,
}

settings_group!(McmcSettings, MCMC_GROUP);

impl Default for McmcSettings {
    fn default() -> Self {
        Self { periods: 6000, burnin: 0.05, proposal: Proposal::Prior, bins: None, target_accept_rate: 0.35 }
    }
}

fn invalid(reason: impl Into<String>) -> ModelError {
    ModelError::InvalidSettings { group: MCMC_GROUP, reason: reason.into() }
}

impl McmcSettings {
    /// Validated settings. A `burnin` above one is read as a number of
    /// periods and converted to a fraction.
    ///
    /// # Errors
    /// - [`ModelError::InvalidSettings`] when `periods` is zero, `burnin` is
    ///   negative or not finite, or the burn-in would discard every period.
    pub fn new(periods: usize, burnin: f64) -> ModelResult<Self> {
        if periods == 0 {
            return Err(invalid("periods must be at least one"));
        }
        if !burnin.is_finite() || burnin < 0.0 {
            return Err(invalid(format!("burnin must be finite and non-negative, got {burnin}")));
        }
        let fraction = if burnin > 1.0 { burnin / periods as f64 } else { burnin };
        if fraction >= 1.0 {
            return Err(invalid(format!("burnin {burnin} leaves no periods to record out of {periods}")));
        }
        Ok(Self { periods, burnin: fraction, ..Self::default() })
    }

    pub fn with_proposal(mut self, proposal: Model) -> Self {
        self.proposal = Proposal::Model(Box::new(proposal));
        self
    }

    /// Adaptive Gaussian random walk with initial step `scale`.
    ///
    /// # Errors
    /// - [`ModelError::InvalidSettings`] when `scale` is not positive and
    ///   finite.
    pub fn with_random_walk(mut self, scale: f64) -> ModelResult<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(invalid(format!("random-walk scale must be positive and finite, got {scale}")));
        }
        self.proposal = Proposal::RandomWalk(scale);
        Ok(self)
    }

    /// # Errors
    /// - [`ModelError::InvalidSettings`] unless `rate` lies in (0, 1).
    pub fn with_target_accept_rate(mut self, rate: f64) -> ModelResult<Self> {
        if !(rate > 0.0 && rate < 1.0) {
            return Err(invalid(format!("target accept rate must lie in (0, 1), got {rate}")));
        }
        self.target_accept_rate = rate;
        Ok(self)
    }

    /// # Errors
    /// - [`ModelError::InvalidSettings`] for zero bins.
    pub fn with_bins(mut self, bins: usize) -> ModelResult<Self> {
        if bins == 0 {
            return Err(invalid("bins must be at least one"));
        }
        self.bins = Some(bins);
        Ok(self)
    }

    /// Number of leading periods that are not recorded.
    pub fn burnin_periods(&self) -> usize {
        ((self.burnin * self.periods as f64).round() as usize).min(self.periods.saturating_sub(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    // Purpose
    // -------
    // Burn-in counts become fractions; bad values are rejected.
    //
    // Given
    // -----
    // - burnin 300 over 6000 periods; burnin 0.1; burnin 6000 of 6000;
    //   zero periods.
    //
    // Expect
    // ------
    // - 0.05 (300 periods); 0.1 unchanged; the last two are errors, as
    //   are zero bins, a zero walk scale and a target rate of one.
    fn burnin_count_is_converted() {
        // Arrange / Act
        let count = McmcSettings::new(6000, 300.0).expect("count");
        let fraction = McmcSettings::new(1000, 0.1).expect("fraction");

        // Assert
        assert!((count.burnin - 0.05).abs() < 1e-15);
        assert_eq!(count.burnin_periods(), 300);
        assert_eq!(fraction.burnin_periods(), 100);
        assert!(McmcSettings::new(6000, 6000.0).is_err());
        assert!(McmcSettings::new(0, 0.1).is_err());
        assert!(McmcSettings::default().with_bins(0).is_err());
        assert!(McmcSettings::default().with_random_walk(0.0).is_err());
        assert!(McmcSettings::default().with_target_accept_rate(1.0).is_err());
    }
}
