//! composite::dconstrain — a base model truncated to part of its data space.
//!
//! Purpose
//! -------
//! Restrict a base model to the data points that satisfy a predicate and
//! renormalize: `p(x) = p_base(x) / scale` where every row of `x` passes the
//! predicate, and zero otherwise. `scale` is the base model's probability
//! of the allowed region.
//!
//! Key behaviors
//! -------------
//! - A caller-supplied scaling function gives `scale` in closed form.
//!   Without one, `scale` is the share of `ConstraintSettings::draws` base
//!   draws that pass the predicate (at least one pass is counted so the log
//!   stays finite).
//! - The Monte Carlo draws are fed from random words taken once from the
//!   caller's generator at construction and replayed on every evaluation.
//!   The log likelihood is therefore a deterministic function of the
//!   parameters, which the optimizers need. No generator is created here.
//! - Draws use rejection sampling with `draws` attempts at most.
use std::{fmt, sync::Arc};

use ndarray::Array1;
use rand::RngCore;

use crate::{
    composite::{Replay, WORDS_PER_DRAW, cached_words, data_rows, prep_part, reset_outputs, state},
    data::Dataset,
    mle::engine::run,
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult, Projection,
    },
    settings_group,
};

const DCONSTRAIN_GROUP: &str = "dconstrain";


/// Predicate over one data row.
pub type RowPredicate = Arc<dyn Fn(&Array1<f64>) -> bool + Send + Sync>;

/// Probability of the allowed region under the given (parameterized) base.
pub type ScaleFn = Arc<dyn Fn(&Model) -> f64 + Send + Sync>;

/// Monte Carlo budget for the normalizing constant and for rejection
/// sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSettings {
    pub draws: usize,
}

settings_group!(ConstraintSettings, "constraint");

impl Default for ConstraintSettings {
    fn default() -> Self {
        Self { draws: 10_000 }
    }
}

impl ConstraintSettings {
    /// # Errors
    /// - [`ModelError::InvalidSettings`] when `draws` is zero.
    pub fn new(draws: usize) -> ModelResult<Self> {
        if draws == 0 {
            return Err(ModelError::InvalidSettings {
                group: "constraint",
                reason: "draws must be at least one".to_string(),
            });
        }
        Ok(Self { draws })
    }
}

#[derive(Clone)]
pub(crate) struct DconstrainState {
    base: Box<Model>,
    predicate: RowPredicate,
    scaling: Option<ScaleFn>,
    stream: Arc<[u64]>,
}

impl fmt::Debug for DconstrainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DconstrainState")
            .field("base", &self.base.name)
            .field("closed_form_scaling", &self.scaling.is_some())
            .field("cached_words", &self.stream.len())
            .finish_non_exhaustive()
    }
}

settings_group!(DconstrainState, DCONSTRAIN_GROUP);

#[derive(Debug, Clone, Copy)]
pub(crate) struct DconstrainKernel {
    caps: CapabilitySet,
}

/// Truncate `base` to the rows satisfying `predicate`.
///
/// Without `scaling`, `ConstraintSettings::default().draws` ×
/// [`WORDS_PER_DRAW`] words are read from `rng` here and replayed for the
/// Monte Carlo normalizing constant; the stream wraps around if a larger
/// budget is set later. With `scaling`, `rng` is not touched.
pub fn dconstrain(
    base: &Model, predicate: RowPredicate, scaling: Option<ScaleFn>, rng: &mut dyn RngCore,
) -> Model {
    let caps = base.capabilities();
    let can_scale = scaling.is_some() || caps.contains(Capability::Draw);
    let evaluable = caps.can_evaluate() && can_scale;
    let caps = CapabilitySet::default()
        .with_if(Capability::LogLikelihood, evaluable)
        .with_if(Capability::Estimate, evaluable)
        .with_if(Capability::Draw, caps.contains(Capability::Draw))
        .with_if(Capability::Constraint, caps.contains(Capability::Constraint))
        .with(Capability::Prep);
    let mut model = Model::new(
        format!("{}, constrained", base.name),
        ModelFamily::DataConstrained,
        base.shape,
        Arc::new(DconstrainKernel { caps }),
    );
    model.parameters = base.parameters.clone();
    let budget = ConstraintSettings::default();
    let words = if scaling.is_none() { budget.draws * WORDS_PER_DRAW } else { 0 };
    let stream = cached_words(rng, words);
    model.settings.add(budget);
    model.settings.add(DconstrainState { base: Box::new(base.clone()), predicate, scaling, stream });
    model
}

impl DconstrainKernel {
    fn base(&self, model: &Model) -> ModelResult<Model> {
        let st = state::<DconstrainState>(model, DCONSTRAIN_GROUP)?;
        let mut base = (*st.base).clone();
        if model.parameters.is_some() {
            base.parameters = model.parameters.clone();
        }
        Ok(base)
    }

    /// Probability of the allowed region under `base`.
    fn scale(&self, model: &Model, base: &Model) -> ModelResult<f64> {
        let st = state::<DconstrainState>(model, DCONSTRAIN_GROUP)?;
        if let Some(f) = &st.scaling {
            return Ok(f(base));
        }
        let draws = model.settings.get_or_default::<ConstraintSettings>().draws;
        let mut rng = Replay::new(&st.stream);
        let mut hits = 0usize;
        for _ in 0..draws {
            if (st.predicate)(&base.draw(&mut rng)?) {
                hits += 1;
            }
        }
        Ok(hits.max(1) as f64 / draws as f64)
    }
}

impl ModelKernel for DconstrainKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let st = state::<DconstrainState>(model, DCONSTRAIN_GROUP)?;
        let rows = data_rows(data);
        if rows.iter().any(|r| !(st.predicate)(r)) {
            return Ok(f64::NEG_INFINITY);
        }
        let base = self.base(model)?;
        let scale = self.scale(model, &base)?;
        Ok(base.log_likelihood(data)? - rows.len() as f64 * scale.ln())
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let st = state::<DconstrainState>(model, DCONSTRAIN_GROUP)?;
        let tries = model.settings.get_or_default::<ConstraintSettings>().draws;
        let base = self.base(model)?;
        for _ in 0..tries {
            let x = base.draw(rng)?;
            if (st.predicate)(&x) {
                return Ok(x);
            }
        }
        Err(ModelError::RejectionBudget { model: model.name.clone(), tries })
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        self.base(model)?.constraint(data)
    }

    fn estimate(&self, data: &Dataset, model: Model, rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        run(data, model, rng)
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let base = prep_part(data, &self.base(model)?)?;
        model.parameters = base.parameters.clone();
        reset_outputs(model, data);
        Ok(())
    }
}
