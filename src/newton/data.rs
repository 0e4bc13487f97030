#![allow(non_snake_case)]

use crate::algebra::*;
use thiserror::Error;

/// Error type returned by [`InputData`] validation.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Problem data dimension fields are incompatible")]
    IncompatibleDimension,
    #[error("block {0} has zero dimension")]
    EmptyBlock(usize),
    #[error("block slice kind does not match its block structure entry")]
    WrongBlockKind,
    #[error("semidefinite block slice is not upper triangular")]
    NotUpperTriangular,
    #[error("constraint {0} has no entries in any block")]
    UnconstrainedRow(usize),
}

/// Kind of a cone variable block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Semidefinite,
    Linear,
}

/// Immutable sizes and kinds of the cone variable blocks.
#[derive(Debug, Clone)]
pub struct BlockStructure {
    pub blocks: Vec<BlockDim>,
}

#[derive(Debug, Clone, Copy)]
pub struct BlockDim {
    pub kind: BlockKind,
    pub dim: usize,
}

impl BlockStructure {
    pub fn new(blocks: Vec<BlockDim>) -> Self {
        Self { blocks }
    }

    pub fn nblocks(&self) -> usize {
        self.blocks.len()
    }

    /// total variable dimension across blocks
    pub fn total_dim(&self) -> usize {
        self.blocks.iter().map(|b| b.dim).sum()
    }
}

/// One semidefinite data slice: a symmetric matrix in upper triangular CSC
/// form, plus the columns of its symmetric completion that carry entries.
#[derive(Debug, Clone)]
pub struct SdpMatrix<T> {
    pub mat: CscMatrix<T>,
    /// columns of the symmetric completion with at least one entry, sorted
    pub sym_cols: Vec<usize>,
}

impl<T> SdpMatrix<T>
where
    T: FloatT,
{
    pub fn new(mat: CscMatrix<T>) -> Result<Self, DataError> {
        if !mat.is_triu() {
            return Err(DataError::NotUpperTriangular);
        }
        let n = mat.ncols();
        let mut touched = vec![false; n];
        for col in 0..n {
            for &row in &mat.rowval[mat.colptr[col]..mat.colptr[col + 1]] {
                touched[row] = true;
                touched[col] = true;
            }
        }
        let sym_cols = (0..n).filter(|&c| touched[c]).collect();
        Ok(Self { mat, sym_cols })
    }

    pub fn nnz(&self) -> usize {
        self.mat.nnz()
    }
}

/// A per-block slice of one data matrix: a symmetric sparse matrix for
/// semidefinite blocks, a diagonal for linear blocks.
#[derive(Debug, Clone)]
pub enum BlockMatrix<T> {
    Sdp(SdpMatrix<T>),
    Diag(SparseVector<T>),
}

impl<T> BlockMatrix<T>
where
    T: FloatT,
{
    pub fn nnz(&self) -> usize {
        match self {
            BlockMatrix::Sdp(s) => s.nnz(),
            BlockMatrix::Diag(v) => v.nnz(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// The semidefinite slice, panicking on a kind mismatch.  A mismatch
    /// means the upstream builder broke the block structure invariant.
    pub fn sdp(&self) -> &SdpMatrix<T> {
        match self {
            BlockMatrix::Sdp(s) => s,
            BlockMatrix::Diag(_) => panic!("expected a semidefinite block slice"),
        }
    }

    /// The linear (diagonal) slice, panicking on a kind mismatch.
    pub fn diag(&self) -> &SparseVector<T> {
        match self {
            BlockMatrix::Diag(v) => v,
            BlockMatrix::Sdp(_) => panic!("expected a linear block slice"),
        }
    }
}

/// Problem data consumed by the engine, in compressed per-block form.
///
/// Read-only during iterations.  The constraint-pair adjacency tables are
/// derived once at construction: for each block and each constraint `j`
/// active on it, the sorted list of active constraints `i ≥ j`, which is
/// exactly the set of Schur entries `(i, j)` the block contributes to.
#[derive(Debug)]
pub struct InputData<T> {
    /// number of constraints
    pub m: usize,
    pub structure: BlockStructure,
    /// right-hand-side vector, length `m`
    pub b: Vec<T>,
    /// objective slices, one per block
    pub C: Vec<BlockMatrix<T>>,
    /// constraint slices: `A[k][blk]` is constraint `k` on block `blk`
    pub A: Vec<Vec<BlockMatrix<T>>>,
    /// per block, the global indices of constraints with a nonzero slice
    pub block_constraints: Vec<Vec<usize>>,
    /// per block and local constraint index, the adjacency list of global
    /// constraints `i ≥ j` sharing the block
    pub adjacency: Vec<Vec<Vec<usize>>>,
}

impl<T> InputData<T>
where
    T: FloatT,
{
    pub fn new(
        structure: BlockStructure,
        b: Vec<T>,
        C: Vec<BlockMatrix<T>>,
        A: Vec<Vec<BlockMatrix<T>>>,
    ) -> Result<Self, DataError> {
        let m = b.len();
        let nblk = structure.nblocks();

        if C.len() != nblk || A.len() != m {
            return Err(DataError::IncompatibleDimension);
        }
        for (idx, blk) in structure.blocks.iter().enumerate() {
            if blk.dim == 0 {
                return Err(DataError::EmptyBlock(idx));
            }
        }
        for slices in std::iter::once(&C).chain(A.iter()) {
            if slices.len() != nblk {
                return Err(DataError::IncompatibleDimension);
            }
            for (slice, blk) in std::iter::zip(slices.iter(), structure.blocks.iter()) {
                check_slice(slice, blk)?;
            }
        }

        // active constraints per block, and the pairwise adjacency tables
        let mut block_constraints = vec![Vec::new(); nblk];
        for (k, slices) in A.iter().enumerate() {
            for (blk, slice) in slices.iter().enumerate() {
                if !slice.is_empty() {
                    block_constraints[blk].push(k);
                }
            }
        }

        // every constraint must touch at least one block, otherwise the
        // Schur complement is structurally singular
        let mut touched = vec![false; m];
        for active in block_constraints.iter() {
            for &k in active {
                touched[k] = true;
            }
        }
        if let Some(k) = touched.iter().position(|&t| !t) {
            return Err(DataError::UnconstrainedRow(k));
        }

        let adjacency = block_constraints
            .iter()
            .map(|active| {
                active
                    .iter()
                    .map(|&j| active.iter().copied().filter(|&i| i >= j).collect())
                    .collect()
            })
            .collect();

        Ok(Self {
            m,
            structure,
            b,
            C,
            A,
            block_constraints,
            adjacency,
        })
    }

    /// slice of constraint `k` on semidefinite block `blk`
    pub fn sdp_slice(&self, k: usize, blk: usize) -> &SdpMatrix<T> {
        self.A[k][blk].sdp()
    }

    /// slice of constraint `k` on linear block `blk`
    pub fn diag_slice(&self, k: usize, blk: usize) -> &SparseVector<T> {
        self.A[k][blk].diag()
    }
}

fn check_slice<T: FloatT>(slice: &BlockMatrix<T>, blk: &BlockDim) -> Result<(), DataError> {
    match (slice, blk.kind) {
        (BlockMatrix::Sdp(s), BlockKind::Semidefinite) => {
            if s.mat.ncols() != blk.dim {
                return Err(DataError::IncompatibleDimension);
            }
        }
        (BlockMatrix::Diag(v), BlockKind::Linear) => {
            if v.n != blk.dim {
                return Err(DataError::IncompatibleDimension);
            }
        }
        _ => return Err(DataError::WrongBlockKind),
    }
    Ok(())
}

/// Feasibility knowledge supplied by the outer loop.  The dual residual is
/// carried through the right-hand side and the dual step only while dual
/// feasibility has not been attained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unknown,
    PrimalFeasible,
    DualFeasible,
    PrimalDualFeasible,
}

impl Phase {
    /// true when the cached dual residual participates in the direction,
    /// i.e. the phase is primal-feasible-or-unknown
    pub fn includes_dual_residual(&self) -> bool {
        matches!(self, Phase::Unknown | Phase::PrimalFeasible)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_adjacency_tables() {
        // two linear blocks; constraints 0,1 share block 0, constraint 2
        // only touches block 1 together with constraint 0
        let structure = BlockStructure::new(vec![
            BlockDim { kind: BlockKind::Linear, dim: 2 },
            BlockDim { kind: BlockKind::Linear, dim: 1 },
        ]);
        let C = vec![
            BlockMatrix::Diag(SparseVector::new(2, vec![0, 1], vec![1., 1.])),
            BlockMatrix::Diag(SparseVector::new(1, vec![0], vec![1.])),
        ];
        let A = vec![
            vec![
                BlockMatrix::Diag(SparseVector::new(2, vec![0], vec![1.])),
                BlockMatrix::Diag(SparseVector::new(1, vec![0], vec![1.])),
            ],
            vec![
                BlockMatrix::Diag(SparseVector::new(2, vec![1], vec![1.])),
                BlockMatrix::Diag(SparseVector::zeros(1)),
            ],
            vec![
                BlockMatrix::Diag(SparseVector::zeros(2)),
                BlockMatrix::Diag(SparseVector::new(1, vec![0], vec![2.])),
            ],
        ];
        let data = InputData::new(structure, vec![1., 1., 1.], C, A).unwrap();

        assert_eq!(data.block_constraints[0], vec![0, 1]);
        assert_eq!(data.block_constraints[1], vec![0, 2]);
        assert_eq!(data.adjacency[0], vec![vec![0, 1], vec![1]]);
        assert_eq!(data.adjacency[1], vec![vec![0, 2], vec![2]]);
    }

    #[test]
    fn test_rejects_unconstrained_row() {
        let structure = BlockStructure::new(vec![BlockDim {
            kind: BlockKind::Linear,
            dim: 1,
        }]);
        let C = vec![BlockMatrix::Diag(SparseVector::new(1, vec![0], vec![1.]))];
        let A = vec![vec![BlockMatrix::Diag(SparseVector::zeros(1))]];
        assert!(matches!(
            InputData::new(structure, vec![1.], C, A),
            Err(DataError::UnconstrainedRow(0))
        ));
    }
}
