#![allow(non_snake_case)]

use crate::algebra::*;

/// Dense Cholesky factorization `A = L·Lᵀ` with `L` lower triangular.

#[derive(Debug)]
pub struct CholeskyEngine<T> {
    /// lower triangular factor (stored as square dense)
    pub L: Matrix<T>,
}

impl<T> CholeskyEngine<T>
where
    T: FloatT,
{
    pub fn new(n: usize) -> Self {
        let L = Matrix::<T>::zeros((n, n));
        Self { L }
    }

    /// Factor the symmetric positive definite `A`, reading its lower triangle.
    pub fn factor(&mut self, A: &Matrix<T>) -> Result<(), DenseFactorizationError> {
        if A.size() != self.L.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let n = self.L.nrows();
        let L = &mut self.L;

        for j in 0..n {
            let mut d = A[(j, j)];
            for k in 0..j {
                d -= L[(j, k)] * L[(j, k)];
            }
            if d <= T::zero() {
                return Err(DenseFactorizationError::NotPositiveDefinite(j));
            }
            let djsqrt = T::sqrt(d);
            L[(j, j)] = djsqrt;
            let dinv = T::recip(djsqrt);

            for i in (j + 1)..n {
                let mut s = A[(i, j)];
                for k in 0..j {
                    s -= L[(i, k)] * L[(j, k)];
                }
                L[(i, j)] = s * dinv;
            }
            for i in 0..j {
                L[(i, j)] = T::zero();
            }
        }
        Ok(())
    }

    /// Solve `A·x = b` in place using the computed factor.
    pub fn solve(&self, b: &mut [T]) {
        let n = self.L.nrows();
        assert_eq!(b.len(), n);
        let L = &self.L;

        // forward solve L·y = b
        for i in 0..n {
            let mut s = b[i];
            for k in 0..i {
                s -= L[(i, k)] * b[k];
            }
            b[i] = s / L[(i, i)];
        }
        // backward solve Lᵀ·x = y
        for i in (0..n).rev() {
            let mut s = b[i];
            for k in (i + 1)..n {
                s -= L[(k, i)] * b[k];
            }
            b[i] = s / L[(i, i)];
        }
    }
}

/// Dense reverse Cholesky factorization `A = U·Uᵀ` with `U` upper triangular,
/// together with the inverse factor `W = U⁻¹`.
///
/// The reverse orientation makes every trailing principal submatrix of `A`
/// available as `A[i:,i:] = U[i:,i:]·U[i:,i:]ᵀ`, which is what the clique-wise
/// completion columns are built from.

#[derive(Debug)]
pub struct RevCholeskyEngine<T> {
    /// upper triangular factor
    pub U: Matrix<T>,
    /// inverse of the factor, also upper triangular
    pub W: Matrix<T>,
}

impl<T> RevCholeskyEngine<T>
where
    T: FloatT,
{
    pub fn new(n: usize) -> Self {
        Self {
            U: Matrix::<T>::zeros((n, n)),
            W: Matrix::<T>::zeros((n, n)),
        }
    }

    /// Factor the symmetric positive definite `A`, reading its upper triangle.
    pub fn factor(&mut self, A: &Matrix<T>) -> Result<(), DenseFactorizationError> {
        if A.size() != self.U.size() {
            return Err(DenseFactorizationError::IncompatibleDimension);
        }
        let n = self.U.nrows();
        let U = &mut self.U;

        // columns are resolved right to left: A[i,j] = Σ_{k ≥ j} U[i,k]·U[j,k]
        for j in (0..n).rev() {
            let mut d = A[(j, j)];
            for k in (j + 1)..n {
                d -= U[(j, k)] * U[(j, k)];
            }
            if d <= T::zero() {
                return Err(DenseFactorizationError::NotPositiveDefinite(j));
            }
            let djsqrt = T::sqrt(d);
            U[(j, j)] = djsqrt;
            let dinv = T::recip(djsqrt);

            for i in 0..j {
                let mut s = A[(i, j)];
                for k in (j + 1)..n {
                    s -= U[(i, k)] * U[(j, k)];
                }
                U[(i, j)] = s * dinv;
            }
            for i in (j + 1)..n {
                U[(i, j)] = T::zero();
            }
        }
        self.invert_factor();
        Ok(())
    }

    // W = U⁻¹ by back substitution on the upper triangle
    fn invert_factor(&mut self) {
        let n = self.U.nrows();
        let U = &self.U;
        let W = &mut self.W;

        W.data.fill(T::zero());
        for j in (0..n).rev() {
            W[(j, j)] = T::recip(U[(j, j)]);
            for i in (0..j).rev() {
                let mut s = T::zero();
                for k in (i + 1)..=j {
                    s += U[(i, k)] * W[(k, j)];
                }
                W[(i, j)] = -s / U[(i, i)];
            }
        }
    }
}

macro_rules! generate_test_cholesky {
    ($fxx:ty, $test_name:ident, $tol:expr) => {
        #[test]
        fn $test_name() {
            #[rustfmt::skip]
            let S = Matrix::<$fxx>::from(
            &[[ 8., -2., 4.],
              [-2., 12., 2.],
              [ 4.,  2., 6.]]);

            let mut eng = CholeskyEngine::<$fxx>::new(3);
            assert!(eng.factor(&S).is_ok());

            let mut M = Matrix::<$fxx>::zeros((3, 3));
            M.mul(&eng.L, &eng.L.t(), 1.0, 0.0);
            assert!(M.data.dist(&S.data) < $tol);

            // solve against a known product
            let x = [1., 2., 3.];
            let mut b = [16., 28., 26.];
            eng.solve(&mut b);
            assert!(b.dist(&x) < $tol);
        }
    };
}

generate_test_cholesky!(f32, test_cholesky_f32, 1e-4);
generate_test_cholesky!(f64, test_cholesky_f64, 1e-12);

macro_rules! generate_test_rev_cholesky {
    ($fxx:ty, $test_name:ident, $tol:expr) => {
        #[test]
        fn $test_name() {
            #[rustfmt::skip]
            let S = Matrix::<$fxx>::from(
            &[[ 8., -2., 4.],
              [-2., 12., 2.],
              [ 4.,  2., 6.]]);

            let mut eng = RevCholeskyEngine::<$fxx>::new(3);
            assert!(eng.factor(&S).is_ok());

            // U·Uᵀ reproduces S
            let mut M = Matrix::<$fxx>::zeros((3, 3));
            M.mul(&eng.U, &eng.U.t(), 1.0, 0.0);
            assert!(M.data.dist(&S.data) < $tol);

            // W is the factor inverse
            let mut I = Matrix::<$fxx>::zeros((3, 3));
            I.mul(&eng.U, &eng.W, 1.0, 0.0);
            assert!(I.data.dist(&Matrix::<$fxx>::identity(3).data) < $tol);
        }
    };
}

generate_test_rev_cholesky!(f32, test_rev_cholesky_f32, 1e-4);
generate_test_rev_cholesky!(f64, test_rev_cholesky_f64, 1e-12);

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_cholesky_not_positive_definite() {
        let S = Matrix::<f64>::from(&[
            [1., 2.], //
            [2., 1.],
        ]);
        let mut eng = CholeskyEngine::<f64>::new(2);
        assert!(matches!(
            eng.factor(&S),
            Err(DenseFactorizationError::NotPositiveDefinite(_))
        ));
    }

    #[test]
    fn test_rev_cholesky_trailing_blocks() {
        // trailing principal submatrices factor as U[i:,i:]·U[i:,i:]ᵀ
        #[rustfmt::skip]
        let S = Matrix::<f64>::from(
        &[[ 8., -2., 4.],
          [-2., 12., 2.],
          [ 4.,  2., 6.]]);

        let mut eng = RevCholeskyEngine::<f64>::new(3);
        eng.factor(&S).unwrap();

        for i in 0..3 {
            for r in i..3 {
                for c in i..3 {
                    let mut v = 0.0;
                    for k in i..3 {
                        v += eng.U[(r, k)] * eng.U[(c, k)];
                    }
                    assert!((v - S[(r, c)]).abs() < 1e-12);
                }
            }
        }
    }
}
