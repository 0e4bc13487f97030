//! Uniform vector, dense and sparse arithmetic for the Newton engine.
//!
//! All numerics are generic over [`FloatT`], with native Rust kernels
//! throughout.  Dense clique-sized factorizations live in [`dense`], sparse
//! block data in [`csc`], and the small tridiagonal eigenproblem used by the
//! Lanczos bound in [`tridiag`].

mod error_types;
mod floats;
mod math_traits;
mod matrix_traits;
mod matrix_types;
mod scalarmath;
mod vecmath;

pub mod csc;
pub mod dense;
pub mod sparsevector;
pub mod tridiag;

pub use csc::CscMatrix;
pub use dense::*;
pub use error_types::*;
pub use floats::*;
pub use math_traits::*;
pub use matrix_traits::*;
pub use matrix_types::*;
pub use sparsevector::SparseVector;
pub use tridiag::SymTridiagonal;
