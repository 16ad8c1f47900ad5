//! pmf — empirical probability mass function over weighted support rows.
//!
//! Purpose
//! -------
//! Represent a distribution as a finite list of support points with
//! weights. This is the form MCMC posteriors take, and it doubles as a
//! histogram when the support is binned.
//!
//! Key behaviors
//! -------------
//! - The support is the model's attached data set: each row (vector element
//!   followed by the matrix row) is one point; `weights` default to one.
//! - A [`PmfCache`] payload holds the normalized masses, a lookup table for
//!   the log likelihood and the cumulative masses for drawing.
//! - With binning, every coordinate is snapped to its bin midpoint before
//!   lookup, so any value inside a bin scores that bin's mass.
//!
//! Invariants & assumptions
//! ------------------------
//! - Weights are finite and non-negative with a positive total.
//! - The last cumulative mass is 1 up to rounding.
//! - Observations absent from the support have log likelihood `-inf`.
use std::{any::Any, collections::BTreeMap, collections::HashMap, sync::Arc};

use ndarray::{Array1, Array2};
use rand::{Rng, RngCore};

use crate::{
    data::{DataError, Dataset},
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelPayload,
        ModelResult, ModelShape, ModelStatus, shape::Dim,
    },
};

#[derive(Debug, Clone, Copy, Default)]
pub struct PmfKernel;

/// Equal-width bins per coordinate.
#[derive(Debug, Clone, PartialEq)]
struct Binning {
    lower: Vec<f64>,
    width: Vec<f64>,
    bins: usize,
}

impl Binning {
    fn index(&self, j: usize, x: f64) -> usize {
        let raw = ((x - self.lower[j]) / self.width[j]).floor();
        raw.clamp(0.0, (self.bins - 1) as f64) as usize
    }

    fn midpoint(&self, j: usize, idx: usize) -> f64 {
        self.lower[j] + (idx as f64 + 0.5) * self.width[j]
    }
}

/// Derived lookup state for a PMF model.
#[derive(Debug, Clone)]
pub struct PmfCache {
    masses: Vec<f64>,
    cumulative: Vec<f64>,
    lookup: HashMap<Vec<u64>, f64>,
    binning: Option<Binning>,
}

impl ModelPayload for PmfCache {
    fn clone_box(&self) -> Box<dyn ModelPayload> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl PmfCache {
    fn key(&self, row: &[f64]) -> Vec<u64> {
        row.iter()
            .enumerate()
            .map(|(j, &x)| {
                let x = match &self.binning {
                    Some(b) if j < b.lower.len() => b.midpoint(j, b.index(j, x)),
                    _ => x,
                };
                // Fold -0.0 onto 0.0 so both hash alike.
                if x == 0.0 { 0f64.to_bits() } else { x.to_bits() }
            })
            .collect()
    }

    fn mass(&self, row: &[f64]) -> f64 {
        self.lookup.get(&self.key(row)).copied().unwrap_or(0.0)
    }
}

/// Empty PMF prototype; estimate it on data or build one with
/// [`pmf_from_dataset`].
pub fn pmf() -> Model {
    let shape = ModelShape {
        vsize: Dim::Fixed(0),
        msize1: Dim::Fixed(0),
        msize2: Dim::Fixed(0),
        dsize: Dim::FromData,
    };
    Model::new("Empirical distribution", ModelFamily::Pmf, shape, Arc::new(PmfKernel))
}

/// Numbers of row `i`: the vector element, then the matrix row.
fn row_values(data: &Dataset, i: usize) -> Vec<f64> {
    let mut out = Vec::new();
    if let Some(x) = data.vector.as_ref().and_then(|v| v.get(i)) {
        out.push(*x);
    }
    if let Some(m) = data.matrix.as_ref().filter(|m| i < m.nrows()) {
        out.extend(m.row(i).iter().copied());
    }
    out
}

fn build(support: Dataset, binning: Option<Binning>) -> ModelResult<Model> {
    let rows = support.rows();
    if rows == 0 {
        return Err(DataError::EmptyData.into());
    }
    let weights = support.weights.clone().unwrap_or_else(|| Array1::ones(rows));
    if weights.len() != rows {
        return Err(DataError::ShapeMismatch { what: "pmf weights", expected: rows, found: weights.len() }
            .into());
    }
    if let Some(&bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
        return Err(ModelError::InvalidParameter {
            name: "weight",
            value: bad,
            reason: "must be finite and non-negative",
        });
    }
    let total = weights.sum();
    if total <= 0.0 {
        return Err(ModelError::InvalidParameter {
            name: "total weight",
            value: total,
            reason: "must be positive",
        });
    }

    let mut cache = PmfCache {
        masses: Vec::with_capacity(rows),
        cumulative: Vec::with_capacity(rows),
        lookup: HashMap::new(),
        binning,
    };
    let mut running = 0.0;
    for (i, w) in weights.iter().enumerate() {
        let mass = w / total;
        running += mass;
        cache.masses.push(mass);
        cache.cumulative.push(running);
        let key = cache.key(&row_values(&support, i));
        *cache.lookup.entry(key).or_insert(0.0) += mass;
    }

    let width = row_values(&support, 0).len();
    let mut model = pmf();
    model.shape.dsize = Dim::Fixed(width);
    model.clear(None);
    model.data = Some(Arc::new(support));
    model.aux = Some(Box::new(cache));
    model.status = ModelStatus::Converged;
    Ok(model)
}

/// PMF over the rows of the first page of `support`.
///
/// # Errors
/// - [`DataError::EmptyData`] when there are no rows.
/// - [`ModelError::InvalidParameter`] for negative, non-finite or all-zero
///   weights.
pub fn pmf_from_dataset(support: Dataset) -> ModelResult<Model> {
    build(support.first_page(), None)
}

/// Histogram PMF of `draws` (one draw per row) with `bins` equal-width bins
/// per column over the observed range.
pub fn histogram(draws: &Array2<f64>, bins: usize) -> ModelResult<Model> {
    if bins == 0 {
        return Err(ModelError::InvalidSettings { group: "histogram", reason: "bins must be positive".into() });
    }
    let cols = draws.ncols();
    let mut lower = Vec::with_capacity(cols);
    let mut width = Vec::with_capacity(cols);
    for col in draws.columns() {
        let lo = col.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = col.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !lo.is_finite() || !hi.is_finite() {
            return Err(DataError::EmptyData.into());
        }
        if hi > lo {
            lower.push(lo);
            width.push((hi - lo) / bins as f64);
        } else {
            lower.push(lo - 0.5);
            width.push(1.0 / bins as f64);
        }
    }
    let binning = Binning { lower, width, bins };

    let mut counts: BTreeMap<Vec<usize>, f64> = BTreeMap::new();
    for row in draws.rows() {
        let idx: Vec<usize> = row.iter().enumerate().map(|(j, &x)| binning.index(j, x)).collect();
        *counts.entry(idx).or_insert(0.0) += 1.0;
    }
    let mut flat = Vec::with_capacity(counts.len() * cols);
    let mut weights = Vec::with_capacity(counts.len());
    for (idx, count) in &counts {
        flat.extend(idx.iter().enumerate().map(|(j, &k)| binning.midpoint(j, k)));
        weights.push(*count);
    }
    let found = flat.len();
    let support = Array2::from_shape_vec((counts.len(), cols), flat).map_err(|_| {
        DataError::ShapeMismatch { what: "histogram support", expected: counts.len() * cols, found }
    })?;
    build(Dataset::from_matrix(support).with_weights(Array1::from(weights)), Some(binning))
}

fn cache_of(model: &Model) -> ModelResult<&PmfCache> {
    model
        .aux
        .as_ref()
        .and_then(|a| a.as_any().downcast_ref::<PmfCache>())
        .ok_or_else(|| ModelError::NotParameterized { model: model.name.clone() })
}

fn support_of(model: &Model) -> ModelResult<&Dataset> {
    model.data.as_deref().ok_or_else(|| ModelError::NotParameterized { model: model.name.clone() })
}

/// Mass-weighted mean of each support coordinate.
pub fn pmf_mean(model: &Model) -> ModelResult<Array1<f64>> {
    let cache = cache_of(model)?;
    let support = support_of(model)?;
    let width = row_values(support, 0).len();
    let mut out = Array1::zeros(width);
    for (i, mass) in cache.masses.iter().enumerate() {
        for (o, x) in out.iter_mut().zip(row_values(support, i)) {
            *o += mass * x;
        }
    }
    Ok(out)
}

impl ModelKernel for PmfKernel {
    fn capabilities(&self) -> CapabilitySet {
        CapabilitySet::of(&[
            Capability::Density,
            Capability::LogLikelihood,
            Capability::Draw,
            Capability::Cdf,
            Capability::Estimate,
        ])
    }

    fn density(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let cache = cache_of(model)?;
        Ok((0..data.rows()).map(|i| cache.mass(&row_values(data, i))).product())
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let cache = cache_of(model)?;
        Ok((0..data.rows()).map(|i| cache.mass(&row_values(data, i)).ln()).sum())
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let cache = cache_of(model)?;
        let support = support_of(model)?;
        let u = rng.random::<f64>();
        let idx = cache.cumulative.partition_point(|&c| c <= u).min(cache.cumulative.len() - 1);
        Ok(Array1::from(row_values(support, idx)))
    }

    /// Mass of support points whose first coordinate is at most the first
    /// data value.
    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let cache = cache_of(model)?;
        let support = support_of(model)?;
        let x = data.values().first().copied().ok_or(DataError::EmptyData)?;
        Ok(cache
            .masses
            .iter()
            .enumerate()
            .filter(|(i, _)| row_values(support, *i).first().is_some_and(|&s| s <= x))
            .map(|(_, m)| m)
            .sum())
    }

    fn estimate(&self, data: &Dataset, model: Model, _rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let mut built = pmf_from_dataset(data.clone())?;
        built.name = model.name;
        built.settings = model.settings;
        Ok(built)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Mass normalization and lookups for weighted support.
    // - Draw frequencies following the weights.
    // - Histogram binning of continuous draws.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Weighted support yields normalized masses and matching lookups.
    //
    // Given
    // -----
    // - Support {1, 2, 3} with weights {1, 1, 2}.
    //
    // Expect
    // ------
    // - ll({3}) = ln 0.5, p({4}) = 0, cdf(2) = 0.5, mean = 2.25.
    fn weighted_support_lookup() {
        // Arrange
        let support = Dataset::from_vector(array![1.0, 2.0, 3.0]).with_weights(array![1.0, 1.0, 2.0]);
        let m = pmf_from_dataset(support).expect("valid support");

        // Act
        let ll = m.log_likelihood(&Dataset::from_vector(array![3.0])).expect("ll");
        let p_absent = m.p(&Dataset::from_vector(array![4.0])).expect("p");
        let c = m.cdf(&Dataset::from_vector(array![2.0])).expect("cdf");
        let mean = pmf_mean(&m).expect("mean");

        // Assert
        assert_relative_eq!(ll, 0.5f64.ln());
        assert_eq!(p_absent, 0.0);
        assert_relative_eq!(c, 0.5);
        assert_relative_eq!(mean[0], 2.25);
    }

    #[test]
    // Purpose
    // -------
    // Draw frequencies track the masses.
    //
    // Given
    // -----
    // - Support {0, 1} with weights {1, 3}; 4000 seeded draws.
    //
    // Expect
    // ------
    // - Share of ones within 0.05 of 0.75.
    fn draws_follow_weights() {
        // Arrange
        let support = Dataset::from_vector(array![0.0, 1.0]).with_weights(array![1.0, 3.0]);
        let m = pmf_from_dataset(support).expect("valid support");
        let mut rng = StdRng::seed_from_u64(11);

        // Act
        let draws = m.draws(&mut rng, 4000).expect("draws");

        // Assert
        let share = draws.sum() / 4000.0;
        assert!((share - 0.75).abs() < 0.05, "share = {share}");
    }

    #[test]
    // Purpose
    // -------
    // Binned histograms score any value inside a bin with that bin's mass.
    //
    // Given
    // -----
    // - Draws 0.1, 0.2, 0.9, 1.0 in two bins over [0.1, 1.0].
    //
    // Expect
    // ------
    // - Two support rows of mass 0.5 each; 0.15 and 0.95 both score 0.5.
    fn histogram_bins_values() {
        // Arrange
        let draws = array![[0.1], [0.2], [0.9], [1.0]];

        // Act
        let h = histogram(&draws, 2).expect("histogram");

        // Assert
        assert_eq!(h.data.as_ref().map(|d| d.rows()), Some(2));
        assert_relative_eq!(h.p(&Dataset::from_vector(array![0.15])).expect("p"), 0.5);
        assert_relative_eq!(h.p(&Dataset::from_vector(array![0.95])).expect("p"), 0.5);
        assert!(histogram(&draws, 0).is_err());
    }
}
