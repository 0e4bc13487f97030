#![allow(non_snake_case)]

use crate::algebra::*;

/// Dense `L·D·Lᵀ` factorization with a diagonal floor safeguard, used for
/// the dense Schur complement path.
///
/// The Schur complement is positive definite in exact arithmetic but can
/// lose definiteness to roundoff near convergence.  Pivots slightly below
/// the floor are clamped up to it; a materially negative pivot means the
/// assembled system is broken and is reported as fatal.

#[derive(Debug)]
pub struct DenseLDLEngine<T> {
    /// unit lower triangular factor, strict lower part stored
    pub L: Matrix<T>,
    /// diagonal of D
    pub D: Vec<T>,
    workv: Vec<T>,
}

impl<T> DenseLDLEngine<T>
where
    T: FloatT,
{
    pub fn new(n: usize) -> Self {
        Self {
            L: Matrix::<T>::zeros((n, n)),
            D: vec![T::zero(); n],
            workv: vec![T::zero(); n],
        }
    }

    /// Factor the symmetric `A`, reading its lower triangle.
    ///
    /// `pivot_floor` scales with the largest diagonal entry of `A`.  Pivots in
    /// `(-floor_tol, floor)` are floored; anything at or below `-floor_tol`
    /// is an error.
    pub fn factor(&mut self, A: &Matrix<T>, pivot_floor: T) -> Result<(), DenseFactorizationError> {
        if A.size() != self.L.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let n = self.L.nrows();
        let L = &mut self.L;
        let D = &mut self.D;
        let w = &mut self.workv;

        let mut maxdiag = T::zero();
        for j in 0..n {
            maxdiag = T::max(maxdiag, T::abs(A[(j, j)]));
        }
        let floor = pivot_floor * T::max(T::one(), maxdiag);
        let floor_tol = T::sqrt(T::epsilon()) * T::max(T::one(), maxdiag);

        for j in 0..n {
            // w = L[j, 0..j] .* D[0..j]
            for k in 0..j {
                w[k] = L[(j, k)] * D[k];
            }

            let mut d = A[(j, j)];
            for k in 0..j {
                d -= L[(j, k)] * w[k];
            }
            if d <= -floor_tol {
                return Err(DenseFactorizationError::NegativePivot(j));
            }
            if d < floor {
                d = floor;
            }
            D[j] = d;
            let dinv = T::recip(d);

            for i in (j + 1)..n {
                let mut s = A[(i, j)];
                for k in 0..j {
                    s -= L[(i, k)] * w[k];
                }
                L[(i, j)] = s * dinv;
            }
        }
        Ok(())
    }

    /// Solve `A·x = b` in place using the computed factors.
    pub fn solve(&self, b: &mut [T]) {
        let n = self.L.nrows();
        assert_eq!(b.len(), n);
        let L = &self.L;

        // (L+I)·y = b
        for i in 0..n {
            let mut s = b[i];
            for k in 0..i {
                s -= L[(i, k)] * b[k];
            }
            b[i] = s;
        }
        // D·z = y
        for (bi, di) in b.iter_mut().zip(&self.D) {
            *bi /= *di;
        }
        // (L+I)ᵀ·x = z
        for i in (0..n).rev() {
            let mut s = b[i];
            for k in (i + 1)..n {
                s -= L[(k, i)] * b[k];
            }
            b[i] = s;
        }
    }
}

macro_rules! generate_test_dense_ldl {
    ($fxx:ty, $test_name:ident, $tol:expr) => {
        #[test]
        fn $test_name() {
            #[rustfmt::skip]
            let S = Matrix::<$fxx>::from(
            &[[ 4., 1., 2.],
              [ 1., 5., 0.],
              [ 2., 0., 3.]]);

            let mut eng = DenseLDLEngine::<$fxx>::new(3);
            assert!(eng.factor(&S, (1e-13).as_T()).is_ok());

            let x = [1., -1., 2.];
            let mut b = [7., -4., 8.];
            eng.solve(&mut b);
            assert!(b.dist(&x) < $tol);
        }
    };
}

generate_test_dense_ldl!(f32, test_dense_ldl_f32, 1e-4);
generate_test_dense_ldl!(f64, test_dense_ldl_f64, 1e-12);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_dense_ldl_negative_pivot() {
        let S = Matrix::<f64>::from(&[
            [1., 3.], //
            [3., 1.],
        ]);
        let mut eng = DenseLDLEngine::<f64>::new(2);
        assert!(matches!(
            eng.factor(&S, 1e-13),
            Err(DenseFactorizationError::NegativePivot(1))
        ));
    }

    #[test]
    fn test_dense_ldl_floors_tiny_pivot() {
        // second pivot is exactly zero; the floor makes the factorization
        // usable rather than failing outright
        let S = Matrix::<f64>::from(&[
            [1., 1.], //
            [1., 1.],
        ]);
        let mut eng = DenseLDLEngine::<f64>::new(2);
        assert!(eng.factor(&S, 1e-13).is_ok());
        assert!(eng.D[1] > 0.0);
    }
}
