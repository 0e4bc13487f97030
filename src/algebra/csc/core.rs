#![allow(non_snake_case)]

use crate::algebra::{FloatT, MatrixShape, ShapedMatrix, SparseFormatError, Symmetric};

/// Sparse matrix in standard Compressed Sparse Column (CSC) format
///
/// __Example usage__ : To construct the 3 x 3 matrix
/// ```text
/// A = [1.  3.  5.]
///     [2.  0.  6.]
///     [0.  4.  7.]
/// ```
///
/// ```no_run
/// use sdpcore::algebra::CscMatrix;
///
/// let A : CscMatrix<f64> = CscMatrix::new(
///    3,                                // m
///    3,                                // n
///    vec![0, 2, 4, 7],                 //colptr
///    vec![0, 1, 0, 2, 0, 1, 2],        //rowval
///    vec![1., 2., 3., 4., 5., 6., 7.], //nzval
///  );
///
/// // optional correctness check
/// assert!(A.check_format().is_ok());
/// ```

#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix<T = f64> {
    /// number of rows
    pub m: usize,
    /// number of columns
    pub n: usize,
    /// CSC format column pointer.
    ///
    /// This field should have length `n+1`. The last entry corresponds
    /// to the number of nonzeros and should agree with the lengths
    /// of the `rowval` and `nzval` fields.
    pub colptr: Vec<usize>,
    /// vector of row indices
    pub rowval: Vec<usize>,
    /// vector of non-zero matrix elements
    pub nzval: Vec<T>,
}

impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// `CscMatrix` constructor.
    ///
    /// # Panics
    /// Makes rudimentary dimensional compatibility checks and panics on
    /// failure.   This constructor does __not__ ensure that row indices are
    /// all in bounds or that data is arranged such that entries within each
    /// column appear in order of increasing row index.   Responsibility for
    /// ensuring these conditions hold is left to the caller.
    pub fn new(m: usize, n: usize, colptr: Vec<usize>, rowval: Vec<usize>, nzval: Vec<T>) -> Self {
        assert_eq!(rowval.len(), nzval.len());
        assert_eq!(colptr.len(), n + 1);
        assert_eq!(colptr[n], rowval.len());
        CscMatrix {
            m,
            n,
            colptr,
            rowval,
            nzval,
        }
    }

    /// allocate space for a sparse matrix with `nnz` elements
    pub fn spalloc(size: (usize, usize), nnz: usize) -> Self {
        let (m, n) = size;
        let mut colptr = vec![0; n + 1];
        let rowval = vec![0; nnz];
        let nzval = vec![T::zero(); nnz];
        colptr[n] = nnz;

        CscMatrix::new(m, n, colptr, rowval, nzval)
    }

    /// Identity matrix of size `n`
    pub fn identity(n: usize) -> Self {
        let colptr = (0usize..=n).collect();
        let rowval = (0usize..n).collect();
        let nzval = vec![T::one(); n];

        CscMatrix::new(n, n, colptr, rowval, nzval)
    }

    /// An upper triangular matrix from `(row, col, value)` triplets.
    ///
    /// Triplets must describe distinct on-or-above-diagonal entries; they
    /// are sorted internally into standard CSC order.
    pub fn from_triu_triplets(n: usize, mut triplets: Vec<(usize, usize, T)>) -> Self {
        assert!(triplets.iter().all(|&(r, c, _)| r <= c && c < n));
        triplets.sort_by_key(|&(r, c, _)| (c, r));
        assert!(triplets.windows(2).all(|w| (w[0].0, w[0].1) != (w[1].0, w[1].1)));

        let mut A = CscMatrix::spalloc((n, n), triplets.len());
        let mut count = vec![0usize; n];
        for &(_, c, _) in triplets.iter() {
            count[c] += 1;
        }
        let mut acc = 0;
        for (ptr, cnt) in A.colptr.iter_mut().skip(1).zip(&count) {
            acc += cnt;
            *ptr = acc;
        }
        for (idx, (r, _, v)) in triplets.into_iter().enumerate() {
            A.rowval[idx] = r;
            A.nzval[idx] = v;
        }
        A
    }

    /// number of nonzeros
    pub fn nnz(&self) -> usize {
        self.colptr[self.n]
    }

    /// symmetric view
    pub fn sym(&self) -> Symmetric<'_, Self> {
        debug_assert!(self.is_triu());
        Symmetric { src: self }
    }

    /// true if the matrix is square with no entries below the diagonal
    pub fn is_triu(&self) -> bool {
        if !self.is_square() {
            return false;
        }
        for col in 0..self.n {
            let rng = self.colptr[col]..self.colptr[col + 1];
            if self.rowval[rng].iter().any(|&row| row > col) {
                return false;
            }
        }
        true
    }

    /// Check that matrix data is correctly formatted.
    pub fn check_format(&self) -> Result<(), SparseFormatError> {
        if self.rowval.len() != self.nzval.len() {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        if self.colptr.is_empty()
            || (self.colptr.len() - 1) != self.n
            || self.colptr[self.n] != self.rowval.len()
        {
            return Err(SparseFormatError::IncompatibleDimension);
        }

        //check for colptr monotonicity
        if self.colptr.windows(2).any(|c| c[0] > c[1]) {
            return Err(SparseFormatError::BadColptr);
        }

        //check for rowval monotonicity within each column
        for col in 0..self.n {
            let rng = self.colptr[col]..self.colptr[col + 1];
            if self.rowval[rng].windows(2).any(|c| c[0] >= c[1]) {
                return Err(SparseFormatError::BadRowval);
            }
        }
        //check for row values out of bounds
        if !self.rowval.iter().all(|r| r < &self.m) {
            return Err(SparseFormatError::BadRowval);
        }

        Ok(())
    }

    /// Position of entry `(row, col)` in the nonzero data, if structurally present.
    pub fn find_entry(&self, row: usize, col: usize) -> Option<usize> {
        let rng = self.colptr[col]..self.colptr[col + 1];
        let rows = &self.rowval[rng.clone()];
        rows.binary_search(&row).ok().map(|p| rng.start + p)
    }

    /// Structural clone with all values set to zero.
    pub fn clone_pattern(&self) -> Self {
        let mut out = self.clone();
        out.nzval.fill(T::zero());
        out
    }
}

impl<T> ShapedMatrix for CscMatrix<T>
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

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_csc_basics() {
        let A = CscMatrix::<f64>::identity(3);
        assert_eq!(A.nnz(), 3);
        assert!(A.is_triu());
        assert!(A.check_format().is_ok());
        assert_eq!(A.find_entry(1, 1), Some(1));
        assert_eq!(A.find_entry(0, 1), None);
    }

    #[test]
    fn test_from_triu_triplets() {
        let A = CscMatrix::from_triu_triplets(3, vec![(0, 2, 5.), (0, 0, 1.), (1, 2, 6.), (2, 2, 7.)]);
        assert!(A.check_format().is_ok());
        assert_eq!(A.colptr, vec![0, 1, 1, 4]);
        assert_eq!(A.rowval, vec![0, 0, 1, 2]);
        assert_eq!(A.nzval, vec![1., 5., 6., 7.]);
    }
}
