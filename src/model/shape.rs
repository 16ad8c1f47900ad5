//! model::shape — declared parameter and draw sizes.
use crate::data::Dataset;

/// One declared size: a fixed count or "take it from the data".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    Fixed(usize),
    FromData,
}

impl Dim {
    /// Resolve against a data set. `FromData` becomes the number of matrix
    /// columns, or zero when there is no data or no matrix.
    pub fn resolve(self, data: Option<&Dataset>) -> usize {
        match self {
            Dim::Fixed(n) => n,
            Dim::FromData => data.map_or(0, |d| d.matrix_dims().1),
        }
    }

    pub fn is_fixed(self) -> bool {
        matches!(self, Dim::Fixed(_))
    }
}

/// Parameter block sizes plus the width of one draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelShape {
    pub vsize: Dim,
    pub msize1: Dim,
    pub msize2: Dim,
    pub dsize: Dim,
}

impl ModelShape {
    /// A model with `vsize` vector parameters and univariate draws.
    pub const fn vector(vsize: usize) -> Self {
        Self {
            vsize: Dim::Fixed(vsize),
            msize1: Dim::Fixed(0),
            msize2: Dim::Fixed(0),
            dsize: Dim::Fixed(1),
        }
    }

    pub const fn with_dsize(mut self, dsize: usize) -> Self {
        self.dsize = Dim::Fixed(dsize);
        self
    }

    /// `(vsize, msize1, msize2)` resolved against `data`.
    pub fn resolve(&self, data: Option<&Dataset>) -> (usize, usize, usize) {
        (self.vsize.resolve(data), self.msize1.resolve(data), self.msize2.resolve(data))
    }

    pub fn is_fixed(&self) -> bool {
        self.vsize.is_fixed() && self.msize1.is_fixed() && self.msize2.is_fixed()
    }

    pub fn draw_size(&self, data: Option<&Dataset>) -> usize {
        self.dsize.resolve(data)
    }
}
