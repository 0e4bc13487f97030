use thiserror::Error;

/// Error type returned by sparse matrix assembly operations.
#[derive(Error, Debug)]
pub enum SparseFormatError {
    #[error("Matrix dimension fields and/or array lengths are incompatible")]
    IncompatibleDimension,
    #[error("Data is not sorted by row index within each column")]
    BadRowval,
    #[error("Bad column pointer data")]
    BadColptr,
}

/// Error type returned by dense factorization operations.
#[derive(Error, Debug)]
pub enum DenseFactorizationError {
    #[error("Matrix dimension fields are incompatible")]
    IncompatibleDimension,
    #[error("Matrix is not positive definite (pivot at column {0})")]
    NotPositiveDefinite(usize),
    #[error("Matrix has a materially negative pivot at column {0}")]
    NegativePivot(usize),
}
