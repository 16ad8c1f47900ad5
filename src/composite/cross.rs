//! composite::cross — independent sub-models over column groups.
//!
//! A cross behaves like a [`stack`](super::stack()) except for two layout
//! rules. Without a split page, the first page is split column-wise: the
//! first sub-model takes as many columns as its draw size, counting the
//! vector (when present) as column zero, and the second takes the rest. The
//! parameters are kept on two pages, the second titled with the second
//! sub-model's name, so each block can be read back on its own.
use crate::{
    composite::stack::{Layout, build},
    data::Dataset,
    model::{Model, ModelError, ModelResult},
};

/// Cross `models` left to right; see [`stack`](super::stack()) for the
/// meaning of `split_pages` and the error cases.
pub fn cross(models: &[Model], split_pages: &[&str]) -> ModelResult<Model> {
    build(models, split_pages, Layout::Cross)
}

/// Split the first page of `data` after `first`'s draw size in columns.
pub(crate) fn split_by_draw_size(data: &Dataset, first: &Model) -> ModelResult<(Dataset, Dataset)> {
    let width = first.shape.draw_size(Some(data));
    let columns = usize::from(data.vector.is_some()) + data.matrix_dims().1;
    if width == 0 || width >= columns {
        return Err(ModelError::CompositeShapeMismatch { composite: "cross", expected: width + 1, found: columns });
    }
    let page = data.first_page();
    let at = if page.vector.is_some() { width - 1 } else { width };
    Ok(page.split_columns(at)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::{exponential, normal};
    use approx::assert_relative_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Column-wise data sharing without a split page.
    // - The two-page parameter layout.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // A cross of two univariate models reads one column each.
    //
    // Given
    // -----
    // - Normal(0, 1) x Exponential(2) on a vector (x) plus one matrix
    //   column (y).
    //
    // Expect
    // ------
    // - ll = ll_normal(x) + ll_exponential(y); parameters on two pages, the
    //   second titled "Exponential distribution".
    fn columns_feed_separate_models() {
        // Arrange
        let a = normal().with_parameters(&[0.0, 1.0]).expect("normal");
        let b = exponential().with_parameters(&[2.0]).expect("exponential");
        let mut data = Dataset::from_matrix(array![[0.5], [1.5]]);
        data.vector = Some(array![-0.3, 0.4]);

        // Act
        let c = cross(&[a.clone(), b.clone()], &[]).expect("cross");
        let ll = c.log_likelihood(&data).expect("ll");

        // Assert
        let x = Dataset::from_vector(array![-0.3, 0.4]);
        let y = Dataset::from_matrix(array![[0.5], [1.5]]);
        let expected = a.log_likelihood(&x).expect("ll a") + b.log_likelihood(&y).expect("ll b");
        assert_relative_eq!(ll, expected, epsilon = 1e-12);
        let params = c.parameters().expect("params");
        assert_eq!(params.page_count(), 2);
        assert!(params.page("Exponential distribution").is_some());
    }

    #[test]
    // Purpose
    // -------
    // Data too narrow for the first model's draw size is a shape error.
    //
    // Given
    // -----
    // - A cross over a vector-only data set.
    //
    // Expect
    // ------
    // - CompositeShapeMismatch.
    fn narrow_data_is_rejected() {
        // Arrange
        let a = normal().with_parameters(&[0.0, 1.0]).expect("normal");
        let c = cross(&[a.clone(), a], &[]).expect("cross");

        // Act
        let out = c.log_likelihood(&Dataset::from_vector(array![1.0, 2.0]));

        // Assert
        assert!(matches!(out, Err(ModelError::CompositeShapeMismatch { composite: "cross", .. })));
    }
}
