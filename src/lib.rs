//! __sdpcore__ is the Newton-direction engine of an interior point solver
//! for conic problems that mix semidefinite and linear variable blocks:
//!
//! ```text
//! minimize    C•X
//! subject to  Aᵢ•X = bᵢ   (i = 1..m)
//!             X ⪰ 0   blockwise
//! ```
//!
//! together with its dual `maximize bᵀy  s.t.  Σ yᵢAᵢ + Z = C, Z ⪰ 0`.
//!
//! Each outer iteration the engine assembles and factorizes the Schur
//! complement of the search-direction equations, solves for the dual step
//! `dy`, and back-substitutes through the per-block cone state to recover a
//! consistent primal-dual step `(dX, dy, dZ)`.  Semidefinite blocks are
//! handled in sparse clique (supernodal) form throughout: the dual variable
//! is factored on its aggregate sparsity pattern and the primal variable is
//! carried as dense clique blocks of its maximum-determinant completion.
//!
//! The outer iteration loop, problem ingestion and result reporting are not
//! part of this crate; see [`newton`](crate::newton) for the engine surface
//! consumed by such a driver.

//Rust hates greek characters
#![allow(confusable_idents)]

pub mod algebra;
pub mod newton;
pub mod sparsefact;
pub mod timers;
