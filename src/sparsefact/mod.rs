//! Sparse symmetric factorization service.
//!
//! Supernodal symbolic analysis is performed once per pattern; numeric
//! refactorization and permuted triangular solves are repeated every
//! iteration.  A second instance sharing only the symbolic structure can be
//! populated column-by-column from clique-dense data, so that solves against
//! the primal completion reuse the same solve machinery as the dual matrix.

mod ldl;

pub use ldl::*;
