#![allow(non_snake_case)]

use crate::algebra::*;
use std::iter::zip;

impl<T: FloatT> MatrixVectorMultiply for Matrix<T> {
    type T = T;

    fn gemv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        assert!(self.n == x.len() && self.m == y.len());

        y.scale(b);
        for (col, &xj) in zip(0..self.n, x) {
            let axj = a * xj;
            for (yi, &Aij) in zip(&mut *y, self.col_slice(col)) {
                *yi += Aij * axj;
            }
        }
    }
}

impl<T: FloatT> MatrixVectorMultiply for Adjoint<'_, Matrix<T>> {
    type T = T;

    fn gemv(&self, y: &mut [T], x: &[T], a: T, b: T) {
        let A = self.src;
        assert!(A.m == x.len() && A.n == y.len());

        for (yj, col) in zip(&mut *y, 0..A.n) {
            let dot = A.col_slice(col).dot(x);
            *yj = a * dot + b * *yj;
        }
    }
}

impl<T> Matrix<T>
where
    T: FloatT,
{
    /// BLAS-like dense general matrix multiply.  Produces `self = a*A*B + b*self`.
    ///
    /// Wide products are split columnwise across the dense kernel thread
    /// count; see [`get_dense_threads`](crate::algebra::get_dense_threads).
    pub fn mul<MATA, MATB>(&mut self, A: &MATA, B: &MATB, a: T, b: T) -> &mut Self
    where
        MATA: DenseMatrix<T = T> + std::ops::Index<(usize, usize), Output = T> + Sync,
        MATB: DenseMatrix<T = T> + std::ops::Index<(usize, usize), Output = T> + Sync,
    {
        assert!(self.m == A.nrows() && self.n == B.ncols() && A.ncols() == B.nrows());

        let m = self.m;
        let nthreads = threads_for_gemm(self.m, self.n, A.ncols());

        if nthreads <= 1 {
            gemm_columns(self.data.as_mut_slice(), A, B, 0, a, b);
            return self;
        }

        // split the output columns into contiguous chunks, one per thread
        let colchunk = (self.n + nthreads - 1) / nthreads;
        std::thread::scope(|s| {
            for (chunk, data) in zip(0.., self.data.chunks_mut(colchunk * m)) {
                s.spawn(move || {
                    gemm_columns(data, A, B, chunk * colchunk, a, b);
                });
            }
        });
        self
    }
}

fn threads_for_gemm(m: usize, n: usize, k: usize) -> usize {
    // small products are not worth the spawn cost
    const GEMM_THREAD_FLOPS: usize = 1 << 20;
    if m * n * k < GEMM_THREAD_FLOPS {
        1
    } else {
        get_dense_threads().min(n)
    }
}

// computes columns [firstcol, firstcol + data.len()/m) of a*A*B + b*C
// into the column-major slice `data`
fn gemm_columns<T, MATA, MATB>(data: &mut [T], A: &MATA, B: &MATB, firstcol: usize, a: T, b: T)
where
    T: FloatT,
    MATA: DenseMatrix<T = T> + std::ops::Index<(usize, usize), Output = T>,
    MATB: DenseMatrix<T = T> + std::ops::Index<(usize, usize), Output = T>,
{
    let m = A.nrows();
    let k = A.ncols();
    if m == 0 {
        return;
    }

    for (colidx, col) in data.chunks_mut(m).enumerate() {
        let j = firstcol + colidx;
        col.scale(b);
        for l in 0..k {
            let aBlj = a * B[(l, j)];
            if aBlj == T::zero() {
                continue;
            }
            for (i, c) in col.iter_mut().enumerate() {
                *c += A[(i, l)] * aBlj;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_gemv() {
        let A = Matrix::from(&[
            [1., 2.], //
            [3., 4.], //
            [5., 6.],
        ]);
        let x = vec![1., -1.];

        let mut y = vec![1., 1., 1.];
        A.gemv(&mut y, &x, 2., 1.);
        assert_eq!(y, vec![-1., -1., -1.]);

        let mut yt = vec![0., 0.];
        A.t().gemv(&mut yt, &[1., 1., 1.], 1., 0.);
        assert_eq!(yt, vec![9., 12.]);
    }

    #[test]
    fn test_gemm() {
        let A = Matrix::from(&[
            [1., 2.], //
            [3., 4.],
        ]);
        let B = Matrix::from(&[
            [0., 1.], //
            [1., 0.],
        ]);

        let mut C = Matrix::zeros((2, 2));
        C.mul(&A, &B, 1., 0.);
        assert_eq!(C, Matrix::from(&[[2., 1.], [4., 3.]]));

        let mut D = Matrix::zeros((2, 2));
        D.mul(&A, &A.t(), 1., 0.);
        assert_eq!(D, Matrix::from(&[[5., 11.], [11., 25.]]));
    }
}
