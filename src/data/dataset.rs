//! data::dataset — the numeric/text table consumed by every model.
//!
//! Purpose
//! -------
//! Hold one or more *pages* of data. Each page carries an optional vector
//! block, an optional matrix block, optional per-row weights, a text grid,
//! and names. Further pages hang off `more` as a singly linked chain, so a
//! parameter set can have e.g. a main page plus a `<Covariance>` page, and a
//! data set can be split between sub-models at a titled page.
//!
//! Key behaviors
//! -------------
//! - Element access by `(row, Col)` where [`Col::Vector`] addresses the
//!   vector block and [`Col::Matrix`] a matrix column.
//! - Pack a structured page chain into one flat `Array1<f64>` (vector first,
//!   then the matrix row-major, then the next page) and unpack it back.
//! - Look pages up by title, append pages, and split a chain at a page.
//!
//! Invariants & assumptions
//! ------------------------
//! - `pack` followed by `unpack` into the same shape reproduces every value
//!   bit for bit.
//! - Pages whose title starts with `<` are informational (covariance,
//!   info criteria) and are skipped by `pack`/`unpack` over all pages.
//! - When both blocks are present, the row count of the page is the larger
//!   of the vector length and the matrix row count.
//!
//! Conventions
//! -----------
//! - Univariate models treat every number in the vector and the matrix of the
//!   first page as one observation; [`Dataset::values`] yields them in that
//!   order.
//! - Page titles are matched case-insensitively.
use crate::data::errors::{DataError, DataResult};
use ndarray::{Array1, Array2, Axis, s};

/// Column selector for element access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Col {
    Vector,
    Matrix(usize),
}

/// Row, column, vector and page names for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Names {
    pub title: String,
    pub vector: Option<String>,
    pub rows: Vec<String>,
    pub cols: Vec<String>,
}

/// A page chain of numeric and text data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub vector: Option<Array1<f64>>,
    pub matrix: Option<Array2<f64>>,
    pub weights: Option<Array1<f64>>,
    pub text: Vec<Vec<String>>,
    pub names: Names,
    pub more: Option<Box<Dataset>>,
}

impl Dataset {
    /// Allocate a zero-filled page with the given block sizes.
    ///
    /// A zero `vsize` leaves the vector absent; a zero `msize1` or `msize2`
    /// leaves the matrix absent.
    pub fn alloc(vsize: usize, msize1: usize, msize2: usize) -> Self {
        let vector = (vsize > 0).then(|| Array1::zeros(vsize));
        let matrix = (msize1 > 0 && msize2 > 0).then(|| Array2::zeros((msize1, msize2)));
        Self { vector, matrix, ..Self::default() }
    }

    pub fn from_vector(vector: Array1<f64>) -> Self {
        Self { vector: Some(vector), ..Self::default() }
    }

    pub fn from_matrix(matrix: Array2<f64>) -> Self {
        Self { matrix: Some(matrix), ..Self::default() }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.names.title = title.to_string();
        self
    }

    pub fn with_weights(mut self, weights: Array1<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn vector_len(&self) -> usize {
        self.vector.as_ref().map_or(0, |v| v.len())
    }

    pub fn matrix_dims(&self) -> (usize, usize) {
        self.matrix.as_ref().map_or((0, 0), |m| m.dim())
    }

    /// Number of rows on this page.
    pub fn rows(&self) -> usize {
        self.vector_len().max(self.matrix_dims().0)
    }

    /// Number of numeric cells on this page.
    pub fn page_len(&self) -> usize {
        let (r, c) = self.matrix_dims();
        self.vector_len() + r * c
    }

    pub fn is_info_page(&self) -> bool {
        self.names.title.starts_with('<')
    }

    /// Read one element.
    ///
    /// # Errors
    /// - [`DataError::MissingVector`] / [`DataError::MissingMatrix`] when the
    ///   addressed block is absent.
    /// - [`DataError::IndexOutOfRange`] when `(row, col)` is outside it.
    pub fn get(&self, row: usize, col: Col) -> DataResult<f64> {
        match col {
            Col::Vector => {
                let v = self.vector.as_ref().ok_or(DataError::MissingVector)?;
                v.get(row).copied().ok_or(DataError::IndexOutOfRange {
                    row,
                    col: None,
                    rows: v.len(),
                    cols: 0,
                })
            }
            Col::Matrix(j) => {
                let m = self.matrix.as_ref().ok_or(DataError::MissingMatrix)?;
                m.get((row, j)).copied().ok_or(DataError::IndexOutOfRange {
                    row,
                    col: Some(j),
                    rows: m.nrows(),
                    cols: m.ncols(),
                })
            }
        }
    }

    /// Write one element. Same errors as [`Dataset::get`].
    pub fn set(&mut self, row: usize, col: Col, value: f64) -> DataResult<()> {
        match col {
            Col::Vector => {
                let v = self.vector.as_mut().ok_or(DataError::MissingVector)?;
                let rows = v.len();
                let slot = v.get_mut(row).ok_or(DataError::IndexOutOfRange {
                    row,
                    col: None,
                    rows,
                    cols: 0,
                })?;
                *slot = value;
            }
            Col::Matrix(j) => {
                let m = self.matrix.as_mut().ok_or(DataError::MissingMatrix)?;
                let (rows, cols) = m.dim();
                let slot = m.get_mut((row, j)).ok_or(DataError::IndexOutOfRange {
                    row,
                    col: Some(j),
                    rows,
                    cols,
                })?;
                *slot = value;
            }
        }
        Ok(())
    }

    /// Every number on this page: the vector, then the matrix row-major.
    pub fn values(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.page_len());
        if let Some(v) = &self.vector {
            out.extend(v.iter().copied());
        }
        if let Some(m) = &self.matrix {
            out.extend(m.iter().copied());
        }
        out
    }

    /// Sum of one matrix column.
    pub fn column_sum(&self, j: usize) -> DataResult<f64> {
        let m = self.matrix.as_ref().ok_or(DataError::MissingMatrix)?;
        if j >= m.ncols() {
            return Err(DataError::IndexOutOfRange {
                row: 0,
                col: Some(j),
                rows: m.nrows(),
                cols: m.ncols(),
            });
        }
        Ok(m.column(j).sum())
    }

    /// Number of nonzero values on this page.
    pub fn count_nonzero(&self) -> usize {
        self.values().iter().filter(|&&x| x != 0.0).count()
    }

    /// Stack the first pages of `parts` vertically.
    ///
    /// Vectors, matrices and weights are concatenated block by block; a block
    /// must be present on every part or on none.
    ///
    /// # Errors
    /// - [`DataError::EmptyData`] when `parts` is empty.
    /// - [`DataError::ShapeMismatch`] when blocks are present on some parts
    ///   only, or matrix widths differ.
    pub fn stack_rows(parts: &[Dataset]) -> DataResult<Dataset> {
        let first = parts.first().ok_or(DataError::EmptyData)?;
        let present = |f: fn(&Dataset) -> bool| parts.iter().filter(|p| f(p)).count();
        let n = parts.len();
        for (what, count) in [
            ("vector blocks", present(|p| p.vector.is_some())),
            ("matrix blocks", present(|p| p.matrix.is_some())),
            ("weight blocks", present(|p| p.weights.is_some())),
        ] {
            if count != 0 && count != n {
                return Err(DataError::ShapeMismatch { what, expected: n, found: count });
            }
        }

        let vector = first.vector.as_ref().map(|_| {
            Array1::from_iter(parts.iter().flat_map(|p| p.vector.iter().flatten().copied()))
        });
        let weights = first.weights.as_ref().map(|_| {
            Array1::from_iter(parts.iter().flat_map(|p| p.weights.iter().flatten().copied()))
        });
        let matrix = match &first.matrix {
            None => None,
            Some(m0) => {
                let cols = m0.ncols();
                let mut flat = Vec::new();
                let mut rows = 0;
                for p in parts {
                    if let Some(m) = &p.matrix {
                        if m.ncols() != cols {
                            return Err(DataError::ShapeMismatch {
                                what: "matrix width",
                                expected: cols,
                                found: m.ncols(),
                            });
                        }
                        rows += m.nrows();
                        flat.extend(m.iter().copied());
                    }
                }
                let found = flat.len();
                Some(Array2::from_shape_vec((rows, cols), flat).map_err(|_| {
                    DataError::ShapeMismatch { what: "stacked matrix", expected: rows * cols, found }
                })?)
            }
        };
        Ok(Dataset {
            vector,
            matrix,
            weights,
            text: parts.iter().flat_map(|p| p.text.iter().cloned()).collect(),
            names: Names { title: first.names.title.clone(), ..Names::default() },
            more: None,
        })
    }

    // ---- Pages ----

    /// Iterate over this page and every page chained after it.
    pub fn pages(&self) -> impl Iterator<Item = &Dataset> {
        std::iter::successors(Some(self), |d| d.more.as_deref())
    }

    pub fn page_count(&self) -> usize {
        self.pages().count()
    }

    /// First page whose title matches `name`, case-insensitively.
    pub fn page(&self, name: &str) -> Option<&Dataset> {
        self.pages().find(|p| p.names.title.eq_ignore_ascii_case(name))
    }

    pub fn page_mut(&mut self, name: &str) -> Option<&mut Dataset> {
        let mut cur = Some(self);
        while let Some(p) = cur {
            if p.names.title.eq_ignore_ascii_case(name) {
                return Some(p);
            }
            cur = p.more.as_deref_mut();
        }
        None
    }

    /// Append a page at the end of the chain.
    pub fn add_page(&mut self, page: Dataset) {
        let mut slot = &mut self.more;
        while let Some(node) = slot {
            slot = &mut node.more;
        }
        *slot = Some(Box::new(page));
    }

    /// Replace the page titled `name`, or append it when absent.
    pub fn put_page(&mut self, page: Dataset) {
        let title = page.names.title.clone();
        match self.page_mut(&title) {
            Some(existing) => {
                let tail = existing.more.take();
                *existing = page;
                existing.more = tail;
            }
            None => self.add_page(page),
        }
    }

    /// Detach the page titled `name` and everything after it.
    ///
    /// Returns `(head, tail)`; `tail` is `None` when no page matches. A
    /// match on the first page's title detaches the whole chain, leaving an
    /// empty head.
    pub fn split_at_page(mut self, name: &str) -> (Dataset, Option<Dataset>) {
        let Some(idx) = self.pages().position(|p| p.names.title.eq_ignore_ascii_case(name)) else {
            return (self, None);
        };
        if idx == 0 {
            return (Dataset::default(), Some(self));
        }
        let mut slot = &mut self.more;
        for _ in 1..idx {
            match slot {
                Some(node) => slot = &mut node.more,
                None => break,
            }
        }
        let tail = slot.take().map(|b| *b);
        (self, tail)
    }

    /// Copy of the first page without the chained pages.
    pub fn first_page(&self) -> Dataset {
        Dataset { more: None, ..self.clone() }
    }

    // ---- Pack / unpack ----

    /// Number of values `pack(all_pages)` produces.
    pub fn packed_len(&self, all_pages: bool) -> usize {
        if all_pages {
            self.pages().filter(|p| !p.is_info_page()).map(Dataset::page_len).sum()
        } else {
            self.page_len()
        }
    }

    /// Flatten to one vector: per page, the vector block then the matrix
    /// block row-major.
    pub fn pack(&self, all_pages: bool) -> Array1<f64> {
        let mut out = Vec::with_capacity(self.packed_len(all_pages));
        if all_pages {
            for page in self.pages().filter(|p| !p.is_info_page()) {
                out.extend(page.values());
            }
        } else {
            out.extend(self.values());
        }
        Array1::from(out)
    }

    /// Inverse of [`Dataset::pack`] into the existing shape.
    ///
    /// # Errors
    /// - [`DataError::PackLengthMismatch`] when `flat` does not have exactly
    ///   `packed_len(all_pages)` elements.
    pub fn unpack(&mut self, flat: &Array1<f64>, all_pages: bool) -> DataResult<()> {
        let expected = self.packed_len(all_pages);
        if flat.len() != expected {
            return Err(DataError::PackLengthMismatch { expected, found: flat.len() });
        }
        let mut offset = 0;
        let mut cur = Some(self);
        while let Some(page) = cur {
            if !page.is_info_page() {
                offset = page.fill_from(flat, offset);
            }
            if !all_pages {
                break;
            }
            cur = page.more.as_deref_mut();
        }
        Ok(())
    }

    fn fill_from(&mut self, flat: &Array1<f64>, mut offset: usize) -> usize {
        if let Some(v) = self.vector.as_mut() {
            let n = v.len();
            v.assign(&flat.slice(s![offset..offset + n]));
            offset += n;
        }
        if let Some(m) = self.matrix.as_mut() {
            for x in m.iter_mut() {
                *x = flat[offset];
                offset += 1;
            }
        }
        offset
    }

    // ---- Rows and columns ----

    /// One row of the first page as a new single-row page.
    pub fn row(&self, i: usize) -> DataResult<Dataset> {
        let rows = self.rows();
        if i >= rows {
            return Err(DataError::IndexOutOfRange { row: i, col: None, rows, cols: 0 });
        }
        let vector = self.vector.as_ref().and_then(|v| v.get(i).map(|&x| Array1::from(vec![x])));
        let matrix = self
            .matrix
            .as_ref()
            .filter(|m| i < m.nrows())
            .map(|m| m.row(i).to_owned().insert_axis(Axis(0)));
        let weights = self.weights.as_ref().and_then(|w| w.get(i).map(|&x| Array1::from(vec![x])));
        Ok(Dataset {
            vector,
            matrix,
            weights,
            text: self.text.get(i).map(|r| vec![r.clone()]).unwrap_or_default(),
            names: Names { title: self.names.title.clone(), ..Names::default() },
            more: None,
        })
    }

    /// Split the first page's matrix at column `at`.
    ///
    /// The left part keeps the vector and weights; the right part holds
    /// columns `at..`.
    ///
    /// # Errors
    /// - [`DataError::MissingMatrix`] when there is no matrix.
    /// - [`DataError::ShapeMismatch`] when `at` exceeds the column count.
    pub fn split_columns(&self, at: usize) -> DataResult<(Dataset, Dataset)> {
        let m = self.matrix.as_ref().ok_or(DataError::MissingMatrix)?;
        if at > m.ncols() {
            return Err(DataError::ShapeMismatch {
                what: "column split",
                expected: m.ncols(),
                found: at,
            });
        }
        let left_m = m.slice(s![.., ..at]).to_owned();
        let right_m = m.slice(s![.., at..]).to_owned();
        let left = Dataset {
            vector: self.vector.clone(),
            matrix: (left_m.ncols() > 0).then_some(left_m),
            weights: self.weights.clone(),
            ..Dataset::default()
        };
        let right = Dataset {
            matrix: (right_m.ncols() > 0).then_some(right_m),
            weights: self.weights.clone(),
            ..Dataset::default()
        };
        Ok((left, right))
    }

    /// Mean of every value on the first page.
    ///
    /// # Errors
    /// - [`DataError::EmptyData`] when the page holds no numbers.
    pub fn mean(&self) -> DataResult<f64> {
        let xs = self.values();
        if xs.is_empty() {
            return Err(DataError::EmptyData);
        }
        Ok(xs.iter().sum::<f64>() / xs.len() as f64)
    }

    /// Population variance (divisor `n`) of every value on the first page.
    pub fn variance(&self) -> DataResult<f64> {
        let mu = self.mean()?;
        let xs = self.values();
        Ok(xs.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / xs.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Pack/unpack over single and multi-page parameter sets.
    // - Page lookup, replacement and splitting.
    // - Row extraction and column splitting.
    //
    // They intentionally DO NOT cover:
    // - Model-level use of data sets (covered in the model and composite
    //   modules).
    // -------------------------------------------------------------------------

    fn two_page_params() -> Dataset {
        let mut d = Dataset::from_vector(array![1.0, 2.0]);
        d.matrix = Some(array![[3.0, 4.0], [5.0, 6.0]]);
        d.add_page(Dataset::from_vector(array![7.0]).with_title("second"));
        d.add_page(Dataset::from_vector(array![99.0]).with_title("<Covariance>"));
        d
    }

    #[test]
    // Purpose
    // -------
    // Check that `pack` then `unpack` is exact for a multi-page set and
    // that informational pages are skipped.
    //
    // Given
    // -----
    // - A first page with a vector and a 2x2 matrix, a second page with one
    //   value, and a `<Covariance>` info page.
    //
    // Expect
    // ------
    // - Packed order is vector, matrix row-major, second page.
    // - Unpacking the packed values into a zeroed clone reproduces the
    //   original numbers.
    fn pack_unpack_round_trip_multi_page() {
        // Arrange
        let d = two_page_params();

        // Act
        let flat = d.pack(true);
        let mut blank = d.clone();
        blank.unpack(&Array1::zeros(flat.len()), true).expect("zeroing should succeed");
        blank.unpack(&flat, true).expect("unpack should succeed");

        // Assert
        assert_eq!(flat, array![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert_eq!(blank, d);
        assert_eq!(d.pack(false).len(), 6);
    }

    #[test]
    // Purpose
    // -------
    // Ensure `unpack` rejects a flat vector of the wrong length.
    //
    // Given
    // -----
    // - A two-element parameter vector and a three-element flat input.
    //
    // Expect
    // ------
    // - `DataError::PackLengthMismatch { expected: 2, found: 3 }`.
    fn unpack_rejects_length_mismatch() {
        // Arrange
        let mut d = Dataset::alloc(2, 0, 0);

        // Act
        let err = d.unpack(&array![1.0, 2.0, 3.0], true).unwrap_err();

        // Assert
        assert_eq!(err, DataError::PackLengthMismatch { expected: 2, found: 3 });
    }

    #[test]
    // Purpose
    // -------
    // Verify splitting a chain at a titled page.
    //
    // Given
    // -----
    // - A chain `main -> second -> <Covariance>`.
    //
    // Expect
    // ------
    // - Splitting at "SECOND" leaves `main` alone in the head and returns
    //   `second -> <Covariance>` as the tail.
    // - Splitting at an unknown title returns the whole chain and `None`.
    fn split_at_page_detaches_tail() {
        // Arrange
        let d = two_page_params();

        // Act
        let (head, tail) = d.clone().split_at_page("SECOND");
        let (whole, none) = d.clone().split_at_page("missing");

        // Assert
        assert_eq!(head.page_count(), 1);
        let tail = tail.expect("tail should exist");
        assert_eq!(tail.names.title, "second");
        assert_eq!(tail.page_count(), 2);
        assert_eq!(whole, d);
        assert!(none.is_none());
    }

    #[test]
    // Purpose
    // -------
    // Splitting at the first page's own title moves the whole chain to the
    // tail.
    //
    // Given
    // -----
    // - The chain `main -> second -> <Covariance>`, split at "Main".
    //
    // Expect
    // ------
    // - An empty head (no vector, no matrix, no further pages) and the
    //   unchanged chain as tail.
    fn split_at_first_page_leaves_empty_head() {
        // Arrange
        let d = two_page_params().with_title("main");

        // Act
        let (head, tail) = d.clone().split_at_page("Main");

        // Assert
        assert_eq!(head, Dataset::default());
        assert_eq!(tail, Some(d));
    }

    #[test]
    // Purpose
    // -------
    // Check `put_page` replaces a page in place and keeps the tail.
    //
    // Given
    // -----
    // - The two-page parameter chain.
    //
    // Expect
    // ------
    // - Replacing "second" keeps three pages with the new value in place.
    fn put_page_replaces_existing() {
        // Arrange
        let mut d = two_page_params();

        // Act
        d.put_page(Dataset::from_vector(array![-1.0]).with_title("second"));

        // Assert
        assert_eq!(d.page_count(), 3);
        let second = d.page("second").expect("page should exist");
        assert_eq!(second.get(0, Col::Vector), Ok(-1.0));
    }

    #[test]
    // Purpose
    // -------
    // Validate row extraction and column splitting.
    //
    // Given
    // -----
    // - A 3x3 matrix with a vector column.
    //
    // Expect
    // ------
    // - `row(1)` returns a 1x3 matrix and the matching vector element.
    // - `split_columns(1)` yields a 3x1 left block and 3x2 right block.
    // - Out-of-range rows error.
    fn row_and_column_split() {
        // Arrange
        let mut d = Dataset::from_matrix(array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]]);
        d.vector = Some(array![10.0, 20.0, 30.0]);

        // Act
        let r = d.row(1).expect("row should exist");
        let (left, right) = d.split_columns(1).expect("split should succeed");

        // Assert
        assert_eq!(r.matrix, Some(array![[4.0, 5.0, 6.0]]));
        assert_eq!(r.vector, Some(array![20.0]));
        assert_eq!(left.matrix_dims(), (3, 1));
        assert_eq!(right.matrix_dims(), (3, 2));
        assert!(d.row(3).is_err());
        assert!(d.split_columns(4).is_err());
    }
}
