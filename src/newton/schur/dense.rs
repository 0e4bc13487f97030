#![allow(non_snake_case)]

use crate::algebra::*;

/// Dense Schur complement storage: an m×m matrix with the lower triangle
/// authoritative, factored in place by the floored LDLᵀ engine.
#[derive(Debug)]
pub struct DenseSchur<T: FloatT> {
    pub B: Matrix<T>,
    pub(crate) engine: DenseLDLEngine<T>,
}

impl<T> DenseSchur<T>
where
    T: FloatT,
{
    pub fn new(m: usize) -> Self {
        Self {
            B: Matrix::zeros((m, m)),
            engine: DenseLDLEngine::new(m),
        }
    }

    pub fn zero_values(&mut self) {
        self.B.data.fill(T::zero());
    }

    pub fn factorize(&mut self, pivot_floor: T) -> Result<(), DenseFactorizationError> {
        self.engine.factor(&self.B, pivot_floor)
    }

    pub fn solve(&self, b: &mut [T]) {
        self.engine.solve(b);
    }

    /// lower triangle entry, `i ≥ j`
    pub fn entry(&self, i: usize, j: usize) -> T {
        debug_assert!(i >= j);
        self.B[(i, j)]
    }
}
