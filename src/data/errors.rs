//! Errors raised by the [`Dataset`](crate::data::Dataset) container.

/// Result alias for data-container operations.
pub type DataResult<T> = Result<T, DataError>;

#[derive(Debug, Clone, PartialEq)]
pub enum DataError {
    /// Element access outside the allocated block.
    IndexOutOfRange { row: usize, col: Option<usize>, rows: usize, cols: usize },

    /// The operation needs a vector block and the page has none.
    MissingVector,

    /// The operation needs a matrix block and the page has none.
    MissingMatrix,

    /// Flat vector length does not match the structured block.
    PackLengthMismatch { expected: usize, found: usize },

    /// No page carries the requested title.
    PageNotFound { name: String },

    /// Two blocks that must agree in size do not.
    ShapeMismatch { what: &'static str, expected: usize, found: usize },

    /// Operation requires at least one row.
    EmptyData,
}

impl std::error::Error for DataError {}

impl std::fmt::Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataError::IndexOutOfRange { row, col, rows, cols } => match col {
                Some(c) => write!(
                    f,
                    "Index ({row}, {c}) out of range for a {rows} x {cols} matrix block"
                ),
                None => write!(f, "Index {row} out of range for a vector block of length {rows}"),
            },
            DataError::MissingVector => write!(f, "Data page has no vector block"),
            DataError::MissingMatrix => write!(f, "Data page has no matrix block"),
            DataError::PackLengthMismatch { expected, found } => {
                write!(f, "Pack/unpack length mismatch: expected {expected}, found {found}")
            }
            DataError::PageNotFound { name } => write!(f, "No page titled '{name}'"),
            DataError::ShapeMismatch { what, expected, found } => {
                write!(f, "Shape mismatch in {what}: expected {expected}, found {found}")
            }
            DataError::EmptyData => write!(f, "Data set has no rows"),
        }
    }
}
