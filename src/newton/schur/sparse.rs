#![allow(non_snake_case)]

use crate::algebra::*;
use crate::newton::InputData;
use crate::sparsefact::{SparseFactorError, SparseFactorization};

/// Sparse Schur complement storage over a fixed nonzero pattern.
///
/// Values live in a lower triangular CSC whose columns are the per-unit
/// write targets of the assembly workers.  Factorization delegates to the
/// sparse service over the transposed (upper) pattern; the location tables
/// below are computed once at setup.
#[derive(Debug)]
pub struct SparseSchur<T: FloatT> {
    /// lower triangular values, columns owned per assembly unit
    pub B: CscMatrix<T>,
    /// per block and local constraint, the nonzero position of each
    /// adjacency pair `(i, j)` in `B`
    pub(crate) locs: Vec<Vec<Vec<usize>>>,
    pub(crate) fact: SparseFactorization<T>,
    // triu nonzero -> lower nonzero, for handing values to the service
    to_lower: Vec<usize>,
    scratch: Vec<T>,
    work: Vec<T>,
}

impl<T> SparseSchur<T>
where
    T: FloatT,
{
    /// Build the fixed pattern from the adjacency tables and analyze it.
    pub fn new(data: &InputData<T>, lower_cols: &[Vec<usize>]) -> Result<Self, SparseFactorError> {
        let m = data.m;

        // lower triangular pattern, columns sorted
        let nnz: usize = lower_cols.iter().map(|c| c.len()).sum();
        let mut B = CscMatrix::<T>::spalloc((m, m), nnz);
        let mut p = 0;
        for (j, rows) in lower_cols.iter().enumerate() {
            B.colptr[j] = p;
            for &i in rows {
                B.rowval[p] = i;
                p += 1;
            }
        }
        B.colptr[m] = p;

        // transposed (upper) pattern for the factorization service
        let mut triplets = Vec::with_capacity(nnz);
        for (j, rows) in lower_cols.iter().enumerate() {
            for &i in rows {
                triplets.push((j, i, T::zero()));
            }
        }
        let triu = CscMatrix::from_triu_triplets(m, triplets);

        let mut to_lower = Vec::with_capacity(nnz);
        for col in 0..m {
            for &row in &triu.rowval[triu.colptr[col]..triu.colptr[col + 1]] {
                // triu (row, col) is lower (col, row)
                let lo = B
                    .find_entry(col, row)
                    .unwrap_or_else(|| panic!("pattern entry ({},{}) lost in transpose", col, row));
                to_lower.push(lo);
            }
        }

        // pair location tables, mirroring the adjacency tables
        let locs = itertools::izip!(&data.adjacency, &data.block_constraints)
            .map(|(adj, active)| {
                itertools::izip!(adj, active)
                    .map(|(pairs, &j)| {
                        pairs
                            .iter()
                            .map(|&i| {
                                B.find_entry(i, j).unwrap_or_else(|| {
                                    panic!("adjacency pair ({},{}) missing from pattern", i, j)
                                })
                            })
                            .collect()
                    })
                    .collect()
            })
            .collect();

        let fact = SparseFactorization::new(&triu, None)?;

        Ok(Self {
            B,
            locs,
            fact,
            to_lower,
            scratch: vec![T::zero(); nnz],
            work: vec![T::zero(); m],
        })
    }

    pub fn zero_values(&mut self) {
        self.B.nzval.fill(T::zero());
    }

    pub fn factorize(&mut self) -> Result<(), SparseFactorError> {
        for (s, &lo) in self.scratch.iter_mut().zip(&self.to_lower) {
            *s = self.B.nzval[lo];
        }
        self.fact.set_values(&self.scratch);
        self.fact.refactor()
    }

    pub fn solve(&mut self, b: &mut [T]) {
        self.fact.solve(b, &mut self.work);
    }

    /// lower triangle entry, `i ≥ j`; zero off the pattern
    pub fn entry(&self, i: usize, j: usize) -> T {
        debug_assert!(i >= j);
        self.B.find_entry(i, j).map_or(T::zero(), |p| self.B.nzval[p])
    }
}

/// Lower-triangle pattern columns implied by the adjacency tables, plus the
/// fill fraction used by the representation heuristic.
pub(crate) fn lower_pattern<T: FloatT>(data: &InputData<T>) -> (Vec<Vec<usize>>, f64) {
    let m = data.m;
    let mut cols: Vec<std::collections::BTreeSet<usize>> = vec![Default::default(); m];

    for (adj, active) in data.adjacency.iter().zip(&data.block_constraints) {
        for (pairs, &j) in adj.iter().zip(active) {
            for &i in pairs {
                cols[j].insert(i);
            }
        }
    }

    let nnz: usize = cols.iter().map(|c| c.len()).sum();
    let total = (m * (m + 1)) / 2;
    let density = if total > 0 { nnz as f64 / total as f64 } else { 1.0 };

    let cols = cols.into_iter().map(|c| c.into_iter().collect()).collect();
    (cols, density)
}
