//! composite::stack — independent sub-models over disjoint data shares.
//!
//! A stack of `a` and `b` treats the data as two independent pieces: the
//! log likelihood is `ll_a(share_a) + ll_b(share_b)`, a draw is `a`'s draw
//! followed by `b`'s, the score and constraint are concatenations, and the
//! CDF is the product of the sub-model CDFs. Stacks of more than two models
//! nest: `stack([a, b, c])` is `stack(a, stack(b, c))`.
//!
//! How the data is shared depends on the layout:
//! - with a split page, everything before that page goes to `a`, the page
//!   and everything after it to `b` (both layouts);
//! - without one, a stack cuts every row of the first page into a segment
//!   of `a`'s draw size followed by the rest, so `ll([x, y]) = ll_a(x) +
//!   ll_b(y)` row by row, while a cross splits the columns of the page by
//!   `a`'s draw size (see [`cross`](super::cross)).
use std::sync::Arc;

use ndarray::Array1;
use rand::RngCore;

use crate::{
    composite::{
        Components, combined_status, components, concat_parameters, data_rows, distribute,
        known_parameter_count, prep_part, reset_outputs, rows_to_dataset,
    },
    data::{DataError, Dataset},
    estimation::{estimate, estimate_with_rng},
    model::{
        Capability, CapabilitySet, DEFAULT_SCORE_DELTA, Dim, Model, ModelError, ModelFamily,
        ModelKernel, ModelResult, ModelShape, Projection,
    },
    settings_group,
};

/// Name of the page where the second sub-model's data begins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackSettings {
    pub split_page: Option<String>,
}

settings_group!(StackSettings, "stack");

impl StackSettings {
    pub fn at_page(page: &str) -> Self {
        Self { split_page: Some(page.to_string()) }
    }
}

/// How a two-model composite lays out data and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// Row segments; parameters in one flat vector.
    Stack,
    /// Column groups; parameters on two pages.
    Cross,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct StackKernel {
    pub layout: Layout,
    pub caps: CapabilitySet,
}

/// Stack `models` left to right.
///
/// `split_pages` is either empty (no splitting) or holds one page name per
/// nesting level, `models.len() - 1` in all. A single model comes back as a
/// plain copy.
///
/// # Errors
/// - [`ModelError::EmptyComposite`] for an empty model list.
/// - [`ModelError::CompositeShapeMismatch`] when `split_pages` has the
///   wrong length.
pub fn stack(models: &[Model], split_pages: &[&str]) -> ModelResult<Model> {
    build(models, split_pages, Layout::Stack)
}

pub(crate) fn build(models: &[Model], split_pages: &[&str], layout: Layout) -> ModelResult<Model> {
    let composite = layout.label();
    let (first, rest) = models.split_first().ok_or(ModelError::EmptyComposite { composite })?;
    if rest.is_empty() {
        return Ok(first.clone());
    }
    if !split_pages.is_empty() && split_pages.len() != rest.len() {
        return Err(ModelError::CompositeShapeMismatch {
            composite,
            expected: rest.len(),
            found: split_pages.len(),
        });
    }
    let (page, inner_pages) = match split_pages.split_first() {
        Some((page, inner)) => (Some(*page), inner),
        None => (None, split_pages),
    };
    let second = build(rest, inner_pages, layout)?;
    Ok(pair(first, &second, page, layout))
}

fn pair(a: &Model, b: &Model, split_page: Option<&str>, layout: Layout) -> Model {
    let parts = [a.clone(), b.clone()];
    let caps = derive_caps(&parts);
    let shape = ModelShape {
        vsize: known_parameter_count(&parts).map_or(Dim::FromData, Dim::Fixed),
        msize1: Dim::Fixed(0),
        msize2: Dim::Fixed(0),
        dsize: match (a.shape.dsize, b.shape.dsize) {
            (Dim::Fixed(x), Dim::Fixed(y)) => Dim::Fixed(x + y),
            _ => Dim::FromData,
        },
    };
    let (family, name) = match layout {
        Layout::Stack => (ModelFamily::Stack, format!("stack of {} and {}", a.name, b.name)),
        Layout::Cross => (ModelFamily::Cross, format!("{} cross {}", a.name, b.name)),
    };
    let mut model = Model::new(name, family, shape, Arc::new(StackKernel { layout, caps }));
    model.settings.add(StackSettings { split_page: split_page.map(str::to_string) });
    model.settings.add(Components { models: parts.to_vec() });
    if shape.is_fixed() && parts.iter().all(|m| m.parameters.is_some()) {
        if let Ok(params) = assemble(&parts, layout) {
            model.parameters = Some(params);
        }
    }
    model
}

fn derive_caps(parts: &[Model]) -> CapabilitySet {
    let common = CapabilitySet::intersect_all(parts.iter().map(Model::capabilities));
    let all_evaluate = parts.iter().all(|m| m.capabilities().can_evaluate());
    let all_estimable = parts
        .iter()
        .all(|m| m.has(Capability::Estimate) || m.capabilities().can_evaluate());
    let any_constraint = parts.iter().any(|m| m.has(Capability::Constraint));
    CapabilitySet::default()
        .with_if(Capability::LogLikelihood, all_evaluate)
        .with_if(Capability::Score, common.contains(Capability::Score))
        .with_if(Capability::Draw, common.contains(Capability::Draw))
        .with_if(Capability::Cdf, common.contains(Capability::Cdf))
        .with_if(Capability::Constraint, any_constraint)
        .with_if(Capability::Estimate, all_estimable)
        .with(Capability::Prep)
}

/// Parameter block for `parts` under `layout`.
fn assemble(parts: &[Model], layout: Layout) -> ModelResult<Dataset> {
    match layout {
        Layout::Stack => Ok(Dataset::from_vector(concat_parameters(parts)?)),
        Layout::Cross => {
            let mut first = Dataset::from_vector(parts[0].packed_parameters()?);
            let second = Dataset::from_vector(parts[1].packed_parameters()?).with_title(&parts[1].name);
            first.add_page(second);
            Ok(first)
        }
    }
}

/// Cut every row of the first page after `first`'s draw size; the
/// remainder of each row goes to `second`.
///
/// # Errors
/// - [`ModelError::CompositeShapeMismatch`] when a row is not wider than
///   `first`'s draw size, or does not match `second`'s fixed draw size.
pub(crate) fn split_rows_by_draw_size(
    data: &Dataset, first: &Model, second: &Model,
) -> ModelResult<(Dataset, Dataset)> {
    let rows = data_rows(data);
    let width = rows.first().map_or(0, Array1::len);
    let left = first.shape.draw_size(Some(data));
    let right = match second.shape.dsize {
        Dim::Fixed(n) => n,
        _ => width.saturating_sub(left),
    };
    if left == 0 || right == 0 || left + right != width {
        return Err(ModelError::CompositeShapeMismatch { composite: "stack", expected: left + right, found: width });
    }
    let heads: Vec<Array1<f64>> = rows.iter().map(|r| r.slice(ndarray::s![..left]).to_owned()).collect();
    let tails: Vec<Array1<f64>> = rows.iter().map(|r| r.slice(ndarray::s![left..]).to_owned()).collect();
    Ok((rows_to_dataset(&heads, "stack")?, rows_to_dataset(&tails, "stack")?))
}

impl Layout {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Layout::Stack => "stack",
            Layout::Cross => "cross",
        }
    }
}

impl StackKernel {
    /// The two data shares for `model`'s sub-models.
    fn shares(&self, data: &Dataset, model: &Model, parts: &[Model]) -> ModelResult<(Dataset, Dataset)> {
        let page = model.settings.get::<StackSettings>().and_then(|s| s.split_page.clone());
        match (page, self.layout) {
            (Some(page), _) => match data.clone().split_at_page(&page) {
                (head, Some(tail)) => Ok((head, tail)),
                (_, None) => Err(DataError::PageNotFound { name: page }.into()),
            },
            (None, Layout::Stack) => split_rows_by_draw_size(data, &parts[0], &parts[1]),
            (None, Layout::Cross) => super::cross::split_by_draw_size(data, &parts[0]),
        }
    }

    /// Sub-models carrying the composite's current parameters.
    fn parts(&self, model: &Model) -> ModelResult<Vec<Model>> {
        distribute(components(model)?, &model.packed_parameters()?, 0)
    }
}

impl ModelKernel for StackKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let parts = self.parts(model)?;
        let (left, right) = self.shares(data, model, &parts)?;
        Ok(parts[0].log_likelihood(&left)? + parts[1].log_likelihood(&right)?)
    }

    fn score(&self, data: &Dataset, model: &Model) -> ModelResult<Array1<f64>> {
        let parts = self.parts(model)?;
        let (left, right) = self.shares(data, model, &parts)?;
        let mut out = parts[0].score(&left, DEFAULT_SCORE_DELTA)?.to_vec();
        out.extend(parts[1].score(&right, DEFAULT_SCORE_DELTA)?.iter().copied());
        Ok(Array1::from(out))
    }

    fn draw(&self, rng: &mut dyn RngCore, model: &Model) -> ModelResult<Array1<f64>> {
        let parts = self.parts(model)?;
        let mut out = parts[0].draw(rng)?.to_vec();
        out.extend(parts[1].draw(rng)?.iter().copied());
        Ok(Array1::from(out))
    }

    fn cdf(&self, data: &Dataset, model: &Model) -> ModelResult<f64> {
        let parts = self.parts(model)?;
        let (left, right) = self.shares(data, model, &parts)?;
        Ok(parts[0].cdf(&left)? * parts[1].cdf(&right)?)
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        let parts = self.parts(model)?;
        let (left, right) = self.shares(data, model, &parts)?;
        let a = parts[0].constraint(&left)?;
        let b = parts[1].constraint(&right)?;
        let mut point = a.point.to_vec();
        point.extend(b.point.iter().copied());
        Ok(Projection { point: Array1::from(point), penalty: a.penalty + b.penalty })
    }

    fn estimate(&self, data: &Dataset, mut model: Model, mut rng: Option<&mut dyn RngCore>) -> ModelResult<Model> {
        let parts = self.parts(&model)?;
        let (left, right) = self.shares(data, &model, &parts)?;
        let mut fitted = Vec::with_capacity(2);
        for (share, part) in [(left, &parts[0]), (right, &parts[1])] {
            let share = Arc::new(share);
            fitted.push(match rng.as_mut() {
                Some(r) => estimate_with_rng(&share, part, &mut **r)?,
                None => estimate(&share, part)?,
            });
        }
        model.parameters = Some(assemble(&fitted, self.layout)?);
        model.status = combined_status(&fitted);
        model.settings.add(Components { models: fitted });
        Ok(model)
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let subs = components(model)?.to_vec();
        let (left, right) = self.shares(data, model, &subs)?;
        let prepped = vec![prep_part(&Arc::new(left), &subs[0])?, prep_part(&Arc::new(right), &subs[1])?];
        model.parameters = Some(assemble(&prepped, self.layout)?);
        model.settings.add(Components { models: prepped });
        reset_outputs(model, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        distributions::{exponential, normal, poisson},
        model::ModelStatus,
    };
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The independence law for log likelihoods over split pages.
    // - Capability derivation and draw concatenation.
    // - Estimation of each sub-model on its own share.
    // - Builder errors.
    // -------------------------------------------------------------------------

    fn two_pages() -> Dataset {
        let mut d = Dataset::from_vector(array![0.5, 1.5, 2.5]);
        d.add_page(Dataset::from_vector(array![1.0, 3.0]).with_title("second"));
        d
    }

    #[test]
    // Purpose
    // -------
    // The stacked log likelihood is the sum over the split shares.
    //
    // Given
    // -----
    // - Normal(1, 2) stacked with Exponential(0.5), split at page
    //   "second".
    //
    // Expect
    // ------
    // - ll_stack = ll_normal(page 1) + ll_exponential(page 2) exactly.
    fn log_likelihood_adds_over_shares() {
        // Arrange
        let a = normal().with_parameters(&[1.0, 2.0]).expect("normal");
        let b = exponential().with_parameters(&[0.5]).expect("exponential");
        let data = two_pages();
        let (head, tail) = data.clone().split_at_page("second");
        let tail = tail.expect("page exists");

        // Act
        let s = stack(&[a.clone(), b.clone()], &["second"]).expect("stack");
        let ll = s.log_likelihood(&data).expect("ll");

        // Assert
        let expected = a.log_likelihood(&head).expect("ll a") + b.log_likelihood(&tail).expect("ll b");
        assert_eq!(ll, expected);
        assert_eq!(s.packed_parameters().expect("params"), array![1.0, 2.0, 0.5]);
    }

    #[test]
    // Purpose
    // -------
    // Derived capabilities and draw layout.
    //
    // Given
    // -----
    // - Normal and Poisson stacked without a split page.
    //
    // Expect
    // ------
    // - Score and Draw are present (both have them); draws have width 2;
    //   the second column is integer-valued.
    fn capabilities_and_draw_width() {
        // Arrange
        let a = normal().with_parameters(&[0.0, 1.0]).expect("normal");
        let b = poisson().with_parameters(&[3.0]).expect("poisson");
        let mut rng = StdRng::seed_from_u64(7);

        // Act
        let s = stack(&[a, b], &[]).expect("stack");
        let draws = s.draws(&mut rng, 50).expect("draws");

        // Assert
        assert!(s.has(Capability::Score));
        assert!(s.has(Capability::Draw));
        assert_eq!(draws.ncols(), 2);
        assert!(draws.column(1).iter().all(|x| x.fract() == 0.0));
    }

    #[test]
    // Purpose
    // -------
    // Estimating a stack estimates each sub-model on its own page.
    //
    // Given
    // -----
    // - Unparameterized Normal and Exponential stacked at "second".
    //
    // Expect
    // ------
    // - mu = 1.5 and sigma = sqrt(2/3) from page 1; rate = 1/2 from page 2;
    //   status converged.
    fn estimate_splits_the_data() {
        // Arrange
        let data = Arc::new(two_pages());
        let s = stack(&[normal(), exponential()], &["second"]).expect("stack");

        // Act
        let fit = estimate(&data, &s).expect("estimate");

        // Assert
        let theta = fit.packed_parameters().expect("params");
        assert_relative_eq!(theta[0], 1.5, epsilon = 1e-12);
        assert_relative_eq!(theta[1], (2.0f64 / 3.0).sqrt(), epsilon = 1e-12);
        assert_relative_eq!(theta[2], 0.5, epsilon = 1e-12);
        assert_eq!(fit.status, ModelStatus::Converged);
    }

    #[test]
    // Purpose
    // -------
    // Builder edge cases.
    //
    // Given
    // -----
    // - No models; one model; three models with one split page; a split
    //   page absent from the data.
    //
    // Expect
    // ------
    // - EmptyComposite; a plain copy; CompositeShapeMismatch; a data error.
    fn builder_edge_cases() {
        // Arrange
        let n = normal().with_parameters(&[0.0, 1.0]).expect("normal");

        // Act
        let empty = stack(&[], &[]);
        let single = stack(std::slice::from_ref(&n), &[]).expect("single");
        let bad_pages = stack(&[n.clone(), n.clone(), n.clone()], &["x"]);
        let missing = stack(&[n.clone(), n], &["nowhere"])
            .expect("stack")
            .log_likelihood(&two_pages());

        // Assert
        assert!(matches!(empty, Err(ModelError::EmptyComposite { .. })));
        assert_eq!(single.family, ModelFamily::Normal);
        assert!(matches!(bad_pages, Err(ModelError::CompositeShapeMismatch { .. })));
        assert!(matches!(missing, Err(ModelError::Data(DataError::PageNotFound { .. }))));
    }

    #[test]
    // Purpose
    // -------
    // Without a split page each row is cut after the first model's draw
    // size, and rows of the wrong width are rejected.
    //
    // Given
    // -----
    // - Normal(1, 2) stacked with Exponential(0.5); rows (0.2, 1.0) and
    //   (3.0, 0.5); then a one-column vector.
    //
    // Expect
    // ------
    // - ll = ll_normal({0.2, 3.0}) + ll_exponential({1.0, 0.5}).
    // - CompositeShapeMismatch for the vector.
    fn rows_are_cut_by_draw_size() {
        // Arrange
        let a = normal().with_parameters(&[1.0, 2.0]).expect("normal");
        let b = exponential().with_parameters(&[0.5]).expect("exponential");
        let s = stack(&[a.clone(), b.clone()], &[]).expect("stack");
        let data = Dataset::from_matrix(array![[0.2, 1.0], [3.0, 0.5]]);

        // Act
        let ll = s.log_likelihood(&data).expect("ll");
        let narrow = s.log_likelihood(&Dataset::from_vector(array![0.2, 1.0]));

        // Assert
        let expected = a.log_likelihood(&Dataset::from_vector(array![0.2, 3.0])).expect("ll a")
            + b.log_likelihood(&Dataset::from_vector(array![1.0, 0.5])).expect("ll b");
        assert_relative_eq!(ll, expected, epsilon = 1e-12);
        assert!(matches!(narrow, Err(ModelError::CompositeShapeMismatch { composite: "stack", .. })));
    }
}
