#![allow(non_snake_case)]

/// Matrix shape marker for multiplication operations.
// T = transpose, N = non-transposed
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum MatrixShape {
    N,
    T,
}

/// Matrix triangular form marker.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub enum MatrixTriangle {
    Triu,
    Tril,
}

/// Adjoint (transpose) view of a matrix.
#[derive(Debug)]
pub struct Adjoint<'a, M> {
    pub src: &'a M,
}

/// Symmetric view of a matrix.  The source data should be triu.
#[derive(Debug)]
pub struct Symmetric<'a, M> {
    pub src: &'a M,
}

/// Dense matrix in column-major format.
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix<T = f64> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// column-major data
    pub data: Vec<T>,
}
