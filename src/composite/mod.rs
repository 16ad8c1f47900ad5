//! composite — models built from other models.
//!
//! Purpose
//! -------
//! Construct new [`Model`]s whose behaviors combine those of sub-models:
//! independent blocks ([`stack`], [`cross`]), weighted sums of densities
//! ([`mixture`]), partially frozen parameter vectors ([`fix_params`]),
//! changes of variable ([`transform`]), truncation to a region of the
//! data space ([`dconstrain`]) and models fed by another model's draws
//! ([`dcompose`]).
//!
//! Key behaviors
//! -------------
//! - Sub-models and other per-composite state live in a settings group on
//!   the composite, so `Clone` deep-copies them with the rest of the model.
//! - Each builder computes its capability set from the sub-models' sets
//!   when it runs; a behavior some sub-model cannot supply is simply not
//!   advertised, and calling it reports `MissingCapability`.
//! - The composite's own parameter block is authoritative. Kernels copy the
//!   sub-models and write the matching slice of the packed parameters into
//!   each copy before delegating.
//!
//! Conventions
//! -----------
//! - "Row" means one observation: the vector element (when a vector block
//!   is present) followed by the matrix row of the same index.
//! - Composites whose log likelihood needs Monte Carlo draws take random
//!   words from the caller's generator once, when built, and replay them
//!   on every evaluation through [`Replay`].
use std::sync::Arc;

use ndarray::{Array1, Array2};
use rand::RngCore;

use crate::{
    data::Dataset,
    model::{Model, ModelError, ModelResult, ModelStatus, SettingsGroup},
    settings_group,
};

pub mod cross;
pub mod dcompose;
pub mod dconstrain;
pub mod fix_params;
pub mod mixture;
pub mod stack;
pub mod transform;

pub use self::cross::cross;
pub use self::dcompose::{CompositionSettings, dcompose};
pub use self::dconstrain::{ConstraintSettings, RowPredicate, ScaleFn, dconstrain};
pub use self::fix_params::{base_model, fix_params};
pub use self::mixture::{mixture, mixture_weights};
pub use self::stack::{StackSettings, stack};
pub use self::transform::{RowFn, RowMap, transform};

/// Sub-models of a stack, cross, mixture or product, in order.
#[derive(Debug, Clone)]
pub struct Components {
    pub models: Vec<Model>,
}

settings_group!(Components, "components");

/// Settings group `T` that a composite kernel needs, or `MissingSettings`.
pub(crate) fn state<'a, T: SettingsGroup>(model: &'a Model, group: &'static str) -> ModelResult<&'a T> {
    model.settings.get::<T>().ok_or(ModelError::MissingSettings { group })
}

pub(crate) fn components(model: &Model) -> ModelResult<&[Model]> {
    Ok(&state::<Components>(model, "components")?.models)
}

/// Total packed parameter count, or `None` if some model cannot say yet.
pub(crate) fn known_parameter_count(models: &[Model]) -> Option<usize> {
    models
        .iter()
        .map(|m| match &m.parameters {
            Some(_) => Some(m.parameter_count()),
            None if m.shape.is_fixed() => {
                let (v, m1, m2) = m.shape.resolve(None);
                Some(v + m1 * m2)
            }
            None => None,
        })
        .sum()
}

/// Copies of `models` with consecutive slices of `theta` (from `offset`)
/// written into their parameters.
pub(crate) fn distribute(
    models: &[Model], theta: &Array1<f64>, offset: usize,
) -> ModelResult<Vec<Model>> {
    let mut at = offset;
    let mut out = Vec::with_capacity(models.len());
    for m in models {
        let mut part = m.clone();
        if part.parameters.is_none() {
            let data = part.data.clone();
            part.clear(data.as_ref());
        }
        let k = part.parameter_count();
        if at + k > theta.len() {
            return Err(ModelError::ParameterCountMismatch { expected: at + k, found: theta.len() });
        }
        part.set_packed(&theta.slice(ndarray::s![at..at + k]).to_owned())?;
        at += k;
        out.push(part);
    }
    if at != theta.len() {
        return Err(ModelError::ParameterCountMismatch { expected: at, found: theta.len() });
    }
    Ok(out)
}

/// Packed parameters of `models` laid end to end.
pub(crate) fn concat_parameters(models: &[Model]) -> ModelResult<Array1<f64>> {
    let mut flat = Vec::new();
    for m in models {
        flat.extend(m.packed_parameters()?.iter().copied());
    }
    Ok(Array1::from(flat))
}

/// Copy `model`, prep it on `data` and keep its parameter values when the
/// prepared shape still fits them.
pub(crate) fn prep_part(data: &Arc<Dataset>, model: &Model) -> ModelResult<Model> {
    crate::mle::engine::prepared_copy(data, model)
}

/// Reset a composite's estimation outputs after its parameters were
/// rebuilt for `data`.
pub(crate) fn reset_outputs(model: &mut Model, data: &Arc<Dataset>) {
    model.covariance = None;
    model.expected = None;
    model.info = None;
    model.status = ModelStatus::Unestimated;
    model.data = Some(Arc::clone(data));
}

/// First non-converged status among `parts`, else `Converged`.
pub(crate) fn combined_status(parts: &[Model]) -> ModelStatus {
    parts
        .iter()
        .map(|m| m.status)
        .find(|s| *s != ModelStatus::Converged)
        .unwrap_or(ModelStatus::Converged)
}

/// Every observation of the first page as a row vector.
pub(crate) fn data_rows(data: &Dataset) -> Vec<Array1<f64>> {
    (0..data.rows())
        .map(|i| {
            let mut row = Vec::new();
            if let Some(v) = data.vector.as_ref().and_then(|v| v.get(i)) {
                row.push(*v);
            }
            if let Some(m) = data.matrix.as_ref().filter(|m| i < m.nrows()) {
                row.extend(m.row(i).iter().copied());
            }
            Array1::from(row)
        })
        .collect()
}

/// Rows back into a data set: a vector when every row has width one,
/// otherwise a matrix.
pub(crate) fn rows_to_dataset(rows: &[Array1<f64>], composite: &'static str) -> ModelResult<Dataset> {
    let width = rows.first().map_or(1, |r| r.len());
    if let Some(bad) = rows.iter().find(|r| r.len() != width) {
        return Err(ModelError::CompositeShapeMismatch { composite, expected: width, found: bad.len() });
    }
    if width == 1 {
        return Ok(Dataset::from_vector(rows.iter().map(|r| r[0]).collect()));
    }
    let flat: Vec<f64> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    let found = flat.len();
    let matrix = Array2::from_shape_vec((rows.len(), width), flat).map_err(|_| {
        ModelError::CompositeShapeMismatch { composite, expected: rows.len() * width, found }
    })?;
    Ok(Dataset::from_matrix(matrix))
}

/// Random words cached per Monte Carlo draw of a sub-model.
pub const WORDS_PER_DRAW: usize = 8;

/// `count` words read from the caller's generator.
pub(crate) fn cached_words(rng: &mut dyn RngCore, count: usize) -> Arc<[u64]> {
    (0..count).map(|_| rng.next_u64()).collect()
}

/// Replays a cached word stream, wrapping at its end.
pub(crate) struct Replay<'a> {
    words: &'a [u64],
    at: usize,
}

impl<'a> Replay<'a> {
    pub(crate) fn new(words: &'a [u64]) -> Self {
        Self { words, at: 0 }
    }
}

impl RngCore for Replay<'_> {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        let word = self.words.get(self.at % self.words.len().max(1)).copied().unwrap_or_default();
        self.at += 1;
        word
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}
