use crate::algebra::*;
use std::iter::zip;

impl<T: FloatT> SymMatrixVectorMultiply for Symmetric<'_, CscMatrix<T>> {
    type T = T;

    // Produces y = a*A*x + b*y, with A stored triu
    fn symv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        let A = self.src;
        assert!(A.n == x.len() && A.n == y.len());

        y.scale(b);

        for col in 0..A.n {
            let axcol = a * x[col];
            let rng = A.colptr[col]..A.colptr[col + 1];
            for (&row, &v) in zip(&A.rowval[rng.clone()], &A.nzval[rng]) {
                y[row] += v * axcol;
                if row != col {
                    // mirror entry in the lower triangle
                    y[col] += v * a * x[row];
                }
            }
        }
    }
}

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// Quadratic form `yᵀ·M·x` for a symmetric matrix with triu data.
    pub fn quad_form_sym(&self, y: &[T], x: &[T]) -> T {
        assert!(self.n == x.len() && self.n == y.len());

        let mut out = T::zero();
        for col in 0..self.n {
            let rng = self.colptr[col]..self.colptr[col + 1];
            for (&row, &v) in zip(&self.rowval[rng.clone()], &self.nzval[rng]) {
                if row == col {
                    out += v * y[row] * x[col];
                } else {
                    out += v * (y[row] * x[col] + y[col] * x[row]);
                }
            }
        }
        out
    }

    /// Scatter column `k` of the symmetric completion into `out`,
    /// which must have length `n`.  Entries off the column pattern are zeroed.
    pub fn sym_col_into(&self, k: usize, out: &mut [T]) {
        assert_eq!(out.len(), self.n);
        out.fill(T::zero());

        // entries (r, k) with r ≤ k from the stored column
        let rng = self.colptr[k]..self.colptr[k + 1];
        for (&row, &v) in zip(&self.rowval[rng.clone()], &self.nzval[rng]) {
            out[row] = v;
        }
        // entries (r, k) with r > k live transposed in later columns
        for col in (k + 1)..self.n {
            if let Some(p) = self.find_entry(k, col) {
                out[col] = self.nzval[p];
            }
        }
    }

    /// Sum of squares of the symmetric completion (Frobenius norm squared),
    /// with triu data.
    pub fn sumsq_sym(&self) -> T {
        let two = T::one() + T::one();
        let mut out = T::zero();
        for col in 0..self.n {
            let rng = self.colptr[col]..self.colptr[col + 1];
            for (&row, &v) in zip(&self.rowval[rng.clone()], &self.nzval[rng]) {
                if row == col {
                    out += v * v;
                } else {
                    out += two * v * v;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Sym(A) = [1  2  0]
    //          [2  3  4]
    //          [0  4  5]
    fn testmat() -> CscMatrix<f64> {
        CscMatrix::from_triu_triplets(
            3,
            vec![(0, 0, 1.), (0, 1, 2.), (1, 1, 3.), (1, 2, 4.), (2, 2, 5.)],
        )
    }

    #[test]
    fn test_symv() {
        let A = testmat();
        let mut y = vec![1., 1., 1.];
        A.sym().symv(&mut y, &[1., 2., 3.], 1., -1.);
        assert_eq!(y, vec![4., 19., 22.]);
    }

    #[test]
    fn test_quad_form_sym() {
        let A = testmat();
        // yᵀAx with y = [1,0,1], x = [1,2,3]
        let v = A.quad_form_sym(&[1., 0., 1.], &[1., 2., 3.]);
        assert_eq!(v, 5. + 23.);
    }

    #[test]
    fn test_sym_col_into() {
        let A = testmat();
        let mut col = vec![0.; 3];
        A.sym_col_into(1, &mut col);
        assert_eq!(col, vec![2., 3., 4.]);
        A.sym_col_into(0, &mut col);
        assert_eq!(col, vec![1., 2., 0.]);
    }

    #[test]
    fn test_sumsq_sym() {
        let A = testmat();
        assert_eq!(A.sumsq_sym(), 1. + 2. * 4. + 9. + 2. * 16. + 25.);
    }
}
