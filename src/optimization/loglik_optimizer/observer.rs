//! loglik_optimizer::observer — per-iteration progress through `log`.
//!
//! [`IterationLogger`] is attached by the runner when
//! [`SolverOptions::verbose`](super::traits::SolverOptions) is set. It
//! reports the log likelihood (the negated cost) of the current and best
//! points at `info` level, plus any solver key/value pairs such as the
//! annealing temperature. Without the flag nothing is attached and the
//! runner only logs the start and the end of the run at `debug`.
use argmin::core::{Error, KV, State, observers::Observe};

/// Logs one line per iteration under the given target label.
#[derive(Debug, Clone)]
pub struct IterationLogger {
    label: String,
}

impl IterationLogger {
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl<I> Observe<I> for IterationLogger
where
    I: State<Float = f64>,
{
    fn observe_init(&mut self, name: &str, _state: &I, _kv: &KV) -> Result<(), Error> {
        log::info!("{}: starting {name}", self.label);
        Ok(())
    }

    fn observe_iter(&mut self, state: &I, kv: &KV) -> Result<(), Error> {
        let extra: Vec<String> = kv.kv.iter().map(|(k, v)| format!("{k} = {v}")).collect();
        log::info!(
            "{}: iter {} ll = {:.6} best ll = {:.6}{}",
            self.label,
            state.get_iter(),
            -state.get_cost(),
            -state.get_best_cost(),
            if extra.is_empty() { String::new() } else { format!(" ({})", extra.join(", ")) }
        );
        Ok(())
    }
}
