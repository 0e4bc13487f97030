#![allow(non_snake_case)]
use crate::algebra::*;
use core::cmp::{max, min};
use derive_builder::Builder;
use std::iter::zip;
use thiserror::Error;

/// Error codes returnable from [`SparseFactorization`] operations

#[derive(Error, Debug)]
pub enum SparseFactorError {
    #[error("Matrix dimension fields are incompatible")]
    IncompatibleDimension,
    #[error("Matrix has a zero column")]
    EmptyColumn,
    #[error("Matrix is not upper triangular")]
    NotUpperTriangular,
    #[error("Matrix is not positive definite (pivot at column {0})")]
    NotPositiveDefinite(usize),
    #[error("Invalid permutation vector")]
    InvalidPermutation,
}

/// Required settings for [`SparseFactorization`]

#[derive(Builder, Debug, Clone)]
pub struct SparseFactorSettings {
    #[builder(default = "1.0")]
    amd_dense_scale: f64,
    #[builder(default = "None", setter(strip_option))]
    perm: Option<Vec<usize>>,
}

impl Default for SparseFactorSettings {
    fn default() -> SparseFactorSettings {
        SparseFactorSettingsBuilder::default().build().unwrap()
    }
}

/// Performs $LDL^T$ factorization of a sparse symmetric positive definite
/// matrix over a fixed upper triangular pattern.
///
/// The symbolic analysis (fill-reducing ordering, elimination tree, factor
/// pattern) happens once at construction.  [`refactor`](Self::refactor) is
/// then called with fresh numeric values every iteration; alternatively the
/// numeric factor can be installed directly per column with
/// [`install_column`](Self::install_column).

#[derive(Debug, Clone)]
pub struct SparseFactorization<T = f64> {
    // permutation vector: perm[i] is the native index at factor position i
    perm: Vec<usize>,
    // inverse permutation
    iperm: Vec<usize>,
    // lower triangular factor
    L: CscMatrix<T>,
    // D and its inverse for A = LDL^T
    D: Vec<T>,
    Dinv: Vec<T>,

    // The upper triangular factorization target: the post ordering PAPt
    // of the original pattern, carrying the current numeric values
    triuP: CscMatrix<T>,

    // mapping from entries in the triu form of the original input to the
    // post ordering triu form used for the factorization
    entry_map: Vec<usize>,

    // symbolic workspace, fixed after construction
    etree: Vec<usize>,
    Lnz: Vec<usize>,

    // factor workspace
    iwork: Vec<usize>,
    bwork: Vec<bool>,
    fwork: Vec<T>,

    // true once numeric values are in place
    is_numeric: bool,
}

impl<T> SparseFactorization<T>
where
    T: FloatT,
{
    /// Symbolic analysis of an upper triangular pattern.
    ///
    /// Every column must contain at least one entry; patterns built from
    /// aggregate block sparsity always include the diagonal and satisfy
    /// this by construction.
    pub fn new(
        pattern: &CscMatrix<T>,
        opts: Option<SparseFactorSettings>,
    ) -> Result<SparseFactorization<T>, SparseFactorError> {
        check_structure(pattern)?;

        let n = pattern.nrows();
        let opts = opts.unwrap_or_default();

        // Use AMD ordering if a user-provided ordering is not supplied.
        // For no ordering at all, the user would need to pass
        // (0..n).collect() explicitly.
        let (perm, iperm);
        if let Some(_perm) = opts.perm {
            iperm = invperm(&_perm)?;
            perm = _perm;
        } else {
            (perm, iperm) = get_amd_ordering(pattern, opts.amd_dense_scale);
        }

        // permute to (another) upper triangular matrix and store the
        // index mapping the input's entries to the permutation's entries
        let (triuP, entry_map) = permute_symmetric(pattern, &iperm);

        let mut etree = vec![0; n];
        let mut Lnz = vec![0; n];
        let mut iwork = vec![0; 3 * n];
        let mut bwork = vec![false; n];
        let mut fwork = vec![T::zero(); n];

        compute_etree(n, &triuP.colptr, &triuP.rowval, &mut iwork, &mut Lnz, &mut etree);

        let sumLnz: usize = Lnz.iter().sum();
        let mut L = CscMatrix::spalloc((n, n), sumLnz);
        let mut D = vec![T::zero(); n];
        let mut Dinv = vec![T::zero(); n];

        // logical factorization fixes the L pattern.  The elimination
        // order appends rows to each column in increasing index, so the
        // resulting columns are row sorted.
        factor_numeric(
            &triuP, &mut L, &mut D, &mut Dinv, &Lnz, &etree, &mut bwork, &mut iwork, &mut fwork,
            true,
        )?;

        Ok(SparseFactorization {
            perm,
            iperm,
            L,
            D,
            Dinv,
            triuP,
            entry_map,
            etree,
            Lnz,
            iwork,
            bwork,
            fwork,
            is_numeric: false,
        })
    }

    /// Problem dimension.
    pub fn dim(&self) -> usize {
        self.L.n
    }

    /// An independent factorization instance sharing only the symbolic
    /// structure of `self`; numeric buffers start cleared.
    pub fn clone_symbolic(&self) -> Self {
        let mut out = self.clone();
        out.L.nzval.fill(T::zero());
        out.D.fill(T::zero());
        out.Dinv.fill(T::zero());
        out.triuP.nzval.fill(T::zero());
        out.is_numeric = false;
        out
    }

    /// The symbolic factor pattern, in the permuted ordering.  Columns are
    /// row sorted; numeric values are only meaningful after a refactor.
    pub fn lpattern(&self) -> &CscMatrix<T> {
        &self.L
    }

    /// per-column factor counts from the symbolic analysis
    pub fn lcounts(&self) -> &[usize] {
        &self.Lnz
    }

    pub fn perm(&self) -> &[usize] {
        &self.perm
    }

    pub fn iperm(&self) -> &[usize] {
        &self.iperm
    }

    /// Overwrite numeric values, taking `values` in the nonzero order of the
    /// original input pattern.
    pub fn set_values(&mut self, values: &[T]) {
        assert_eq!(values.len(), self.entry_map.len());
        for (&loc, &v) in zip(&self.entry_map, values) {
            self.triuP.nzval[loc] = v;
        }
    }

    /// Overwrite a subset of numeric values using indices into the nonzero
    /// data of the original input pattern.
    pub fn update_values(&mut self, indices: &[usize], values: &[T]) {
        for (&idx, &v) in zip(indices, values) {
            self.triuP.nzval[self.entry_map[idx]] = v;
        }
    }

    /// Numeric refactorization over the fixed pattern.  Fails if the matrix
    /// is not positive definite; the failed factor must not be solved with.
    pub fn refactor(&mut self) -> Result<(), SparseFactorError> {
        self.is_numeric = false;
        factor_numeric(
            &self.triuP,
            &mut self.L,
            &mut self.D,
            &mut self.Dinv,
            &self.Lnz,
            &self.etree,
            &mut self.bwork,
            &mut self.iwork,
            &mut self.fwork,
            false,
        )?;
        self.is_numeric = true;
        Ok(())
    }

    /// Row indices of factor column `j`, in the permuted ordering.
    pub fn column_rows(&self, j: usize) -> &[usize] {
        &self.L.rowval[self.L.colptr[j]..self.L.colptr[j + 1]]
    }

    /// Install the numeric values of factor column `j` directly: the
    /// subdiagonal column of the unit lower factor (aligned with
    /// [`column_rows`](Self::column_rows)) and the pivot `d`.
    pub fn install_column(&mut self, j: usize, lvals: &[T], d: T) {
        let rng = self.L.colptr[j]..self.L.colptr[j + 1];
        assert_eq!(lvals.len(), rng.len());
        self.L.nzval[rng].copy_from(lvals);
        self.D[j] = d;
        self.Dinv[j] = T::recip(d);
    }

    /// Declare the numeric factor complete after a column-install pass.
    pub fn finalize_install(&mut self) {
        self.is_numeric = true;
    }

    /// Solves `A·x = b` using the computed factors, in place (`x` replaces
    /// `b`).  The right-hand side is in native ordering; `work` is caller
    /// owned scratch of the same length, so concurrent solves against one
    /// factorization need only thread-private scratch.
    pub fn solve(&self, b: &mut [T], work: &mut [T]) {
        assert!(self.is_numeric);
        assert_eq!(b.len(), self.D.len());
        assert_eq!(work.len(), self.D.len());

        permute(work, b, &self.perm);
        lsolve(&self.L, work);
        zip(work.iter_mut(), &self.Dinv).for_each(|(w, d)| *w *= *d);
        ltsolve(&self.L, work);
        ipermute(b, work, &self.perm);
    }

    // ---------------------------------------------------------------
    // Permuted triangular half operations.  With A = Pᵀ(LDLᵀ)P these
    // expose the conjugation factors G = PᵀLD^{1/2} (so that A = GGᵀ)
    // and G⁻ᵀ, used to build symmetric step-bound operators.
    // ---------------------------------------------------------------

    /// `x = D^{-1/2}·L⁻¹·P·b` : native input, factor-space output.
    pub fn half_solve(&self, b: &[T], x: &mut [T]) {
        assert!(self.is_numeric);
        permute(x, b, &self.perm);
        lsolve(&self.L, x);
        zip(x.iter_mut(), &self.Dinv).for_each(|(x, d)| *x *= d.sqrt());
    }

    /// `x = Pᵀ·L⁻ᵀ·D^{-1/2}·b` : factor-space input, native output.
    pub fn half_solve_t(&self, b: &[T], x: &mut [T], work: &mut [T]) {
        assert!(self.is_numeric);
        zip(work.iter_mut(), zip(b, &self.Dinv)).for_each(|(w, (b, d))| *w = *b * d.sqrt());
        ltsolve(&self.L, work);
        ipermute(x, work, &self.perm);
    }

    /// `x = D^{1/2}·Lᵀ·P·b` : native input, factor-space output.
    pub fn half_mul(&self, b: &[T], x: &mut [T]) {
        assert!(self.is_numeric);
        permute(x, b, &self.perm);
        ltmul(&self.L, x);
        zip(x.iter_mut(), &self.D).for_each(|(x, d)| *x *= d.sqrt());
    }

    /// `x = Pᵀ·L·D^{1/2}·b` : factor-space input, native output.
    pub fn half_mul_t(&self, b: &[T], x: &mut [T], work: &mut [T]) {
        assert!(self.is_numeric);
        zip(work.iter_mut(), zip(b, &self.D)).for_each(|(w, (b, d))| *w = *b * d.sqrt());
        lmul(&self.L, work);
        ipermute(x, work, &self.perm);
    }
}

fn check_structure<T: FloatT>(A: &CscMatrix<T>) -> Result<(), SparseFactorError> {
    if !A.is_square() {
        return Err(SparseFactorError::IncompatibleDimension);
    }

    if !A.is_triu() {
        return Err(SparseFactorError::NotUpperTriangular);
    }

    //Error if A doesn't have at least one entry in every column
    if !A.colptr.windows(2).all(|c| c[0] < c[1]) {
        return Err(SparseFactorError::EmptyColumn);
    }

    Ok(())
}

const UNKNOWN: usize = usize::MAX;

// Compute the elimination tree and column counts for a positive definite
// matrix in upper triangular compressed sparse column form.

fn compute_etree(
    n: usize,
    Ap: &[usize],
    Ai: &[usize],
    work: &mut [usize],
    Lnz: &mut [usize],
    etree: &mut [usize],
) {
    work[..n].fill(0);
    Lnz.fill(0);
    etree.fill(UNKNOWN);

    for j in 0..n {
        work[j] = j;
        for istart in Ai.iter().take(Ap[j + 1]).skip(Ap[j]) {
            let mut i = *istart;

            while work[i] != j {
                if etree[i] == UNKNOWN {
                    etree[i] = j;
                }
                Lnz[i] += 1; // nonzeros in this column
                work[i] = j;
                i = etree[i];
            }
        }
    }
}

// Numeric (or symbolic-only, when `logical` is set) factorization over the
// fixed pattern.  For each k a solution of y = L(0:k-1, 0:k-1)\b is computed,
// where b is the kth column of A above the diagonal; y is then the kth row
// of L with an implied unit diagonal.
#[allow(clippy::too_many_arguments)]
fn factor_numeric<T: FloatT>(
    A: &CscMatrix<T>,
    L: &mut CscMatrix<T>,
    D: &mut [T],
    Dinv: &mut [T],
    Lnz: &[usize],
    etree: &[usize],
    bwork: &mut [bool],
    iwork: &mut [usize],
    fwork: &mut [T],
    logical: bool,
) -> Result<(), SparseFactorError> {
    let n = A.n;
    let (Ap, Ai, Ax) = (&A.colptr, &A.rowval, &A.nzval);

    // partition working memory into pieces
    let y_markers = bwork;
    let (y_idx, iwork) = iwork.split_at_mut(n);
    let (elim_buffer, next_colspace) = iwork.split_at_mut(n);
    let y_vals = fwork;

    //set Lp to cumsum(Lnz), starting from zero
    L.colptr[0] = 0;
    let mut acc = 0;
    for (Lp, Lnz) in zip(&mut L.colptr[1..], Lnz) {
        *Lp = acc + Lnz;
        acc = *Lp;
    }

    y_markers.fill(false);
    y_vals.fill(T::zero());
    D.fill(T::zero());
    next_colspace.copy_from_slice(&L.colptr[0..n]);

    if !logical {
        // First element of the diagonal D.
        D[0] = Ax[0];
        if D[0] <= T::zero() {
            return Err(SparseFactorError::NotPositiveDefinite(0));
        }
        Dinv[0] = T::recip(D[0]);
    }

    // The upper left corner of L is trivially unit, so start from k = 1.
    for k in 1..n {
        // This loop determines where nonzeros will go in the kth row
        // of L, but doesn't compute the actual values
        let mut nnz_y = 0;

        for i in Ap[k]..Ap[k + 1] {
            let bidx = Ai[i]; //we are working on this element of b

            // the diagonal entry seeds D[k] and takes no part in the
            // elimination of the kth row
            if bidx == k {
                D[k] = Ax[i];
                continue;
            }

            y_vals[bidx] = Ax[i]; // initialise y(bidx) = b(bidx)

            // use the forward elimination tree to figure out which
            // elements must be eliminated after this element of b
            if !y_markers[bidx] {
                y_markers[bidx] = true;
                elim_buffer[0] = bidx;
                let mut nnz_e = 1; //length of unvisited elimination path from here

                let mut next_idx = etree[bidx];

                while next_idx != UNKNOWN && next_idx < k {
                    if y_markers[next_idx] {
                        break;
                    }
                    y_markers[next_idx] = true;
                    elim_buffer[nnz_e] = next_idx;
                    next_idx = etree[next_idx];
                    nnz_e += 1;
                }

                // put the buffered elimination list into the current
                // ordering in reverse
                while nnz_e != 0 {
                    nnz_e -= 1;
                    y_idx[nnz_y] = elim_buffer[nnz_e];
                    nnz_y += 1;
                }
            }
        }

        // This loop places nonzero values in the kth row
        for i in (0..nnz_y).rev() {
            let cidx = y_idx[i];
            let tmp_idx = next_colspace[cidx];

            if !logical {
                let y_vals_cidx = y_vals[cidx];

                for j in L.colptr[cidx]..tmp_idx {
                    y_vals[L.rowval[j]] -= L.nzval[j] * y_vals_cidx;
                }

                // the cidx^th element of y = L\b is now in hand, giving
                // the corresponding element of this row of L
                L.nzval[tmp_idx] = y_vals_cidx * Dinv[cidx];
                D[k] -= y_vals_cidx * L.nzval[tmp_idx];
            }

            // record which row it went into
            L.rowval[tmp_idx] = k;
            next_colspace[cidx] += 1;

            y_vals[cidx] = T::zero();
            y_markers[cidx] = false;
        }

        if !logical {
            if D[k] <= T::zero() {
                return Err(SparseFactorError::NotPositiveDefinite(k));
            }
            Dinv[k] = T::recip(D[k]);
        }
    }

    Ok(())
}

// Solves (L+I)x = b, with x replacing b
fn lsolve<T: FloatT>(L: &CscMatrix<T>, x: &mut [T]) {
    for i in 0..x.len() {
        let xi = x[i];
        let (f, l) = (L.colptr[i], L.colptr[i + 1]);
        for (&Lij, &Lxj) in zip(&L.rowval[f..l], &L.nzval[f..l]) {
            x[Lij] -= Lxj * xi;
        }
    }
}

// Solves (L+I)'x = b, with x replacing b
fn ltsolve<T: FloatT>(L: &CscMatrix<T>, x: &mut [T]) {
    for i in (0..x.len()).rev() {
        let mut s = T::zero();
        let (f, l) = (L.colptr[i], L.colptr[i + 1]);
        for (&Lij, &Lxj) in zip(&L.rowval[f..l], &L.nzval[f..l]) {
            s += Lxj * x[Lij];
        }
        x[i] -= s;
    }
}

// x = (L+I)x.  Columns are applied last to first so each x[j] is read
// before any update lands on it.
fn lmul<T: FloatT>(L: &CscMatrix<T>, x: &mut [T]) {
    for j in (0..x.len()).rev() {
        let xj = x[j];
        let (f, l) = (L.colptr[j], L.colptr[j + 1]);
        for (&Lij, &Lxj) in zip(&L.rowval[f..l], &L.nzval[f..l]) {
            x[Lij] += Lxj * xj;
        }
    }
}

// x = (L+I)'x.  Ascending order: x[i] only reads entries below i.
fn ltmul<T: FloatT>(L: &CscMatrix<T>, x: &mut [T]) {
    for i in 0..x.len() {
        let mut s = x[i];
        let (f, l) = (L.colptr[i], L.colptr[i + 1]);
        for (&Lij, &Lxj) in zip(&L.rowval[f..l], &L.nzval[f..l]) {
            s += Lxj * x[Lij];
        }
        x[i] = s;
    }
}

// Construct an inverse permutation from a permutation
fn invperm(p: &[usize]) -> Result<Vec<usize>, SparseFactorError> {
    let mut b = vec![usize::MAX; p.len()];

    for (i, j) in p.iter().enumerate() {
        if *j < p.len() && b[*j] == usize::MAX {
            b[*j] = i;
        } else {
            return Err(SparseFactorError::InvalidPermutation);
        }
    }
    Ok(b)
}

// internal permutation and inverse permutation
// functions that require no memory allocations

fn permute<T: Copy>(x: &mut [T], b: &[T], p: &[usize]) {
    zip(p, x).for_each(|(p, x)| *x = b[*p]);
}

fn ipermute<T: Copy>(x: &mut [T], b: &[T], p: &[usize]) {
    zip(p, b).for_each(|(p, b)| x[*p] = *b);
}

// Given a sparse symmetric matrix `A` (with only upper triangular entries),
// return a permuted sparse symmetric matrix `P` (also only upper triangular)
// given the inverse permutation vector `iperm`.
fn permute_symmetric<T: FloatT>(A: &CscMatrix<T>, iperm: &[usize]) -> (CscMatrix<T>, Vec<usize>) {
    let n = A.ncols();
    let mut P = CscMatrix::<T>::spalloc((n, n), A.nnz());
    let mut entry_map = vec![0; A.nnz()];

    // 1. count the number of entries that each column of P will have
    let mut num_entries = vec![0; n];
    for colA in 0..n {
        let colP = iperm[colA];
        for &rowA in A.rowval.iter().take(A.colptr[colA + 1]).skip(A.colptr[colA]) {
            let rowP = iperm[rowA];
            // determine to which column the entry belongs after permutation
            let col_idx = max(rowP, colP);
            num_entries[col_idx] += 1;
        }
    }

    // 2. calculate permuted Pc = P.colptr from the number of entries
    P.colptr[0] = 0;
    let mut acc = 0;
    for (Pckp1, ne) in zip(&mut P.colptr[1..], &num_entries) {
        *Pckp1 = acc + ne;
        acc = *Pckp1;
    }
    // reuse this memory to keep track of free entries in rowval
    num_entries.copy_from_slice(&P.colptr[0..n]);
    let mut row_starts = num_entries;

    // 3. permute the row entries and position of the corresponding nzval
    for colA in 0..n {
        let colP = iperm[colA];
        for rowA_idx in A.colptr[colA]..A.colptr[colA + 1] {
            let rowA = A.rowval[rowA_idx];
            let rowP = iperm[rowA];
            let col_idx = max(colP, rowP);

            // next free location in rowval (this results in unordered
            // columns in the rowval)
            let rowP_idx = row_starts[col_idx];

            P.rowval[rowP_idx] = min(colP, rowP);
            P.nzval[rowP_idx] = A.nzval[rowA_idx];

            entry_map[rowA_idx] = rowP_idx;
            row_starts[col_idx] += 1;
        }
    }

    (P, entry_map)
}

fn get_amd_ordering<T: FloatT>(A: &CscMatrix<T>, amd_dense_scale: f64) -> (Vec<usize>, Vec<usize>) {
    // computes a permutation for A using AMD default parameters
    let mut control = amd::Control::default();
    control.dense *= amd_dense_scale;
    let (perm, iperm, _info) = amd::order(A.nrows(), &A.colptr, &A.rowval, &control).unwrap();
    (perm, iperm)
}

//configure tests of internals
#[path = "test.rs"]
#[cfg(test)]
mod test;
