use crate::algebra::DenseFactorizationError;
use crate::sparsefact::SparseFactorError;
use thiserror::Error;

use super::DataError;

/// Error type returned by the Newton direction engine.
///
/// All variants are fatal to the *current* iteration: the outer loop may
/// retry with a different centering target or terminate, but nothing here is
/// retried internally.  Broken preconditions (mismatched dimensions, missing
/// index map entries) are programming errors and panic instead.

#[derive(Error, Debug)]
pub enum NewtonError {
    /// A cone block failed to factor positive definite, either the sparse
    /// dual matrix or one of the dense primal clique blocks.
    #[error("cone block {block} failed to factor positive definite")]
    NotPositiveDefinite { block: usize },

    /// The dense Schur complement factorization hit a materially negative
    /// pivot.
    #[error("dense Schur factorization failed")]
    DenseSchur(#[from] DenseFactorizationError),

    /// The sparse factorization service failed, for the Schur system over
    /// its fixed pattern or during symbolic analysis of a block pattern.
    #[error("sparse factorization failed")]
    SparseFactor(#[from] SparseFactorError),

    /// Both step lengths fell below the configured threshold.
    #[error("step length collapsed")]
    StepLengthCollapse,

    #[error(transparent)]
    BadData(#[from] DataError),
}
