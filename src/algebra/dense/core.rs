use crate::algebra::{Adjoint, DenseMatrix, FloatT, Matrix, MatrixShape, ShapedMatrix};
use std::ops::{Index, IndexMut};

impl<T> DenseMatrix for Matrix<T>
where
    T: FloatT,
{
    type T = T;
    #[inline]
    fn index_linear(&self, idx: (usize, usize)) -> usize {
        idx.0 + self.m * idx.1
    }
    fn data(&self) -> &[T] {
        &self.data
    }
}

impl<'a, T> DenseMatrix for Adjoint<'a, Matrix<T>>
where
    T: FloatT,
{
    type T = T;
    #[inline]
    fn index_linear(&self, idx: (usize, usize)) -> usize {
        self.src.index_linear((idx.1, idx.0))
    }
    fn data(&self) -> &[T] {
        &self.src.data
    }
}

impl<T> Matrix<T>
where
    T: FloatT,
{
    pub fn zeros(size: (usize, usize)) -> Self {
        let (m, n) = size;
        let data = vec![T::zero(); m * n];
        Self { m, n, data }
    }

    pub fn identity(n: usize) -> Self {
        let mut mat = Matrix::zeros((n, n));
        mat.set_identity();
        mat
    }

    pub fn set_identity(&mut self) {
        assert!(self.m == self.n);
        self.data.fill(T::zero());
        for i in 0..self.n {
            self[(i, i)] = T::one();
        }
    }

    pub fn new_from_slice(size: (usize, usize), src: &[T]) -> Self {
        let (m, n) = size;
        assert!(m * n == src.len());
        Self {
            m,
            n,
            data: src.to_vec(),
        }
    }

    pub fn copy_from_slice(&mut self, src: &[T]) -> &mut Self {
        self.data.copy_from_slice(src);
        self
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn t(&self) -> Adjoint<'_, Self> {
        Adjoint { src: self }
    }

    pub fn col_slice(&self, col: usize) -> &[T] {
        assert!(col < self.n);
        &self.data[(col * self.m)..(col + 1) * self.m]
    }

    pub fn col_slice_mut(&mut self, col: usize) -> &mut [T] {
        assert!(col < self.n);
        &mut self.data[(col * self.m)..(col + 1) * self.m]
    }

    /// Overwrite with the symmetric average `(A + Aᵀ)/2`.
    pub fn symmetric_part(&mut self) {
        assert!(self.is_square());
        let half = T::recip(T::one() + T::one());
        for j in 0..self.n {
            for i in 0..j {
                let v = (self[(i, j)] + self[(j, i)]) * half;
                self[(i, j)] = v;
                self[(j, i)] = v;
            }
        }
    }
}

impl<T> IndexMut<(usize, usize)> for Matrix<T>
where
    T: FloatT,
{
    #[inline]
    fn index_mut(&mut self, idx: (usize, usize)) -> &mut Self::Output {
        let lidx = self.index_linear(idx);
        &mut self.data[lidx]
    }
}

impl<T> Index<(usize, usize)> for Matrix<T>
where
    T: FloatT,
{
    type Output = T;
    #[inline]
    fn index(&self, idx: (usize, usize)) -> &Self::Output {
        &self.data[self.index_linear(idx)]
    }
}

impl<T> Index<(usize, usize)> for Adjoint<'_, Matrix<T>>
where
    T: FloatT,
{
    type Output = T;
    #[inline]
    fn index(&self, idx: (usize, usize)) -> &Self::Output {
        &self.data()[self.index_linear(idx)]
    }
}

impl<T> ShapedMatrix for Matrix<T>
where
    T: FloatT,
{
    fn nrows(&self) -> usize {
        self.m
    }
    fn ncols(&self) -> usize {
        self.n
    }
    fn shape(&self) -> MatrixShape {
        MatrixShape::N
    }
}

impl<T> ShapedMatrix for Adjoint<'_, Matrix<T>>
where
    T: FloatT,
{
    fn nrows(&self) -> usize {
        self.src.n
    }
    fn ncols(&self) -> usize {
        self.src.m
    }
    fn shape(&self) -> MatrixShape {
        MatrixShape::T
    }
}

impl<'a, T> From<&'a [&'a [T]]> for Matrix<T>
where
    T: FloatT,
{
    fn from(rows: &[&[T]]) -> Matrix<T> {
        let m = rows.len();
        let n = rows.iter().map(|r| r.len()).next().unwrap_or(0);
        assert!(rows.iter().all(|r| r.len() == n));

        let mut mat = Matrix::zeros((m, n));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                mat[(i, j)] = v;
            }
        }
        mat
    }
}

impl<T, const N: usize, const M: usize> From<&[[T; N]; M]> for Matrix<T>
where
    T: FloatT,
{
    fn from(rows: &[[T; N]; M]) -> Matrix<T> {
        let mut mat = Matrix::zeros((M, N));
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                mat[(i, j)] = v;
            }
        }
        mat
    }
}

impl<T> std::fmt::Display for Matrix<T>
where
    T: FloatT,
{
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f)?;
        for i in 0..self.nrows() {
            write!(f, "[ ")?;
            for j in 0..self.ncols() {
                write!(f, " {:?}", self[(i, j)])?;
            }
            writeln!(f, "]")?;
        }
        writeln!(f)?;
        Ok(())
    }
}
