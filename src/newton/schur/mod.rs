#![allow(non_snake_case)]

//! Schur complement assembly and factorization.
//!
//! The reduced system `B·dy = r` has entries
//! `B_ij = Σ_blocks A_i•(X·A_j·Z⁻¹)` and right-hand side
//! `r_j = b_j − βμ·A_j•Z⁻¹ [+ A_j•(X·D·Z⁻¹)] [+ A_j•(dX·dZ·Z⁻¹)]`,
//! the bracketed terms entering per phase and in corrector mode.  Dense
//! and sparse representations share one assembly algorithm behind a
//! columnwise writer; both store only the lower triangle.
//!
//! Semidefinite work units are constraint columns drained from a shared
//! counter by a fixed worker pool.  A unit owns its Schur column and its
//! right-hand-side entry outright, so results do not depend on scheduling.

mod dense;
mod sparse;

pub use dense::DenseSchur;
pub use sparse::SparseSchur;

use super::workpool::{fan_out, SharedSlice, WorkCounter};
use super::*;
use crate::algebra::*;

/// Direction solve mode.  The predictor triggers cone refactorization,
/// full assembly and Schur factorization; the corrector reuses them all
/// and rebuilds only the right-hand side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMode {
    Predictor,
    Corrector,
}

/// The assembled reduced system and its right-hand side.
#[derive(Debug)]
pub enum SchurRepr<T: FloatT> {
    Dense(DenseSchur<T>),
    Sparse(SparseSchur<T>),
}

#[derive(Debug)]
pub struct SchurSystem<T: FloatT> {
    pub repr: SchurRepr<T>,
    /// length-m right-hand side, rebuilt every assembly
    pub rhs: Vec<T>,
    pub m: usize,
}

impl<T> SchurSystem<T>
where
    T: FloatT,
{
    /// Choose the representation once from the pattern-density heuristic
    /// and set up the fixed structures.  Not switchable mid-run.
    pub fn new(data: &InputData<T>, settings: &NewtonSettings<T>) -> Result<Self, NewtonError> {
        let m = data.m;
        let (lower_cols, density) = sparse::lower_pattern(data);

        let repr = if T::from_f64(density).unwrap() > settings.schur_density_threshold {
            SchurRepr::Dense(DenseSchur::new(m))
        } else {
            SchurRepr::Sparse(SparseSchur::new(data, &lower_cols)?)
        };

        Ok(Self {
            repr,
            rhs: vec![T::zero(); m],
            m,
        })
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.repr, SchurRepr::Dense(_))
    }

    /// lower triangle entry, `i ≥ j`
    pub fn entry(&self, i: usize, j: usize) -> T {
        match &self.repr {
            SchurRepr::Dense(d) => d.entry(i, j),
            SchurRepr::Sparse(s) => s.entry(i, j),
        }
    }

    /// Build the coefficient matrix (predictor only) and right-hand side.
    ///
    /// Assembly is not transactional: if a later factorization fails, the
    /// partially updated system must be discarded, not reused.
    pub fn assemble(
        &mut self,
        data: &InputData<T>,
        blocks: &[ConeBlockState<T>],
        target_mu: T,
        phase: Phase,
        mode: StepMode,
        settings: &NewtonSettings<T>,
    ) {
        let include_resid = phase.includes_dual_residual();
        let with_matrix = mode == StepMode::Predictor;
        let workers = settings.worker_count();

        self.rhs.copy_from(&data.b);

        if with_matrix {
            match &mut self.repr {
                SchurRepr::Dense(d) => d.zero_values(),
                SchurRepr::Sparse(s) => s.zero_values(),
            }
        }

        // columnwise writers over the value storage; the right-hand-side
        // writer hands out per-entry ownership instead
        let m = self.m;
        let rhs_writer = SharedSlice::new(&mut self.rhs);
        let pass = AssemblyPass {
            data,
            blocks,
            target_mu,
            include_resid,
            with_matrix,
            mode,
            workers,
        };

        match &mut self.repr {
            SchurRepr::Dense(d) => {
                let writer = Writer::Dense {
                    data: SharedSlice::new(&mut d.B.data),
                    m,
                };
                pass.run(&writer, &rhs_writer);
            }
            SchurRepr::Sparse(s) => {
                let writer = Writer::Sparse {
                    data: SharedSlice::new(&mut s.B.nzval),
                    locs: &s.locs,
                };
                pass.run(&writer, &rhs_writer);
            }
        }
    }

    /// Factorize the assembled system.  Fatal to the iteration on failure.
    pub fn factorize(&mut self, settings: &NewtonSettings<T>) -> Result<(), NewtonError> {
        match &mut self.repr {
            SchurRepr::Dense(d) => d.factorize(settings.schur_pivot_floor)?,
            SchurRepr::Sparse(s) => s.factorize()?,
        }
        Ok(())
    }

    /// Solve for `dy` from the stored right-hand side.
    pub fn solve_into(&mut self, dy: &mut [T]) {
        dy.copy_from(&self.rhs);
        match &mut self.repr {
            SchurRepr::Dense(d) => d.solve(dy),
            SchurRepr::Sparse(s) => s.solve(dy),
        }
    }
}

// ---------------------------------------------------------------
// the shared assembly algorithm
// ---------------------------------------------------------------

// one full pass over the blocks, shared by both representations
struct AssemblyPass<'a, T: FloatT> {
    data: &'a InputData<T>,
    blocks: &'a [ConeBlockState<T>],
    target_mu: T,
    include_resid: bool,
    with_matrix: bool,
    mode: StepMode,
    workers: usize,
}

impl<'a, T> AssemblyPass<'a, T>
where
    T: FloatT,
{
    fn run(&self, writer: &Writer<T>, rhs_writer: &SharedSlice<T>) {
        let data = self.data;

        for (blk, state) in self.blocks.iter().enumerate() {
            match state {
                ConeBlockState::Linear(lb) => {
                    assemble_linear_block(
                        data,
                        blk,
                        lb,
                        self.target_mu,
                        self.include_resid,
                        self.with_matrix,
                        self.mode,
                        writer,
                        rhs_writer,
                    );
                }
                ConeBlockState::Semidefinite(sb) => {
                    // the dense kernel stays quiesced while the pool runs
                    let _guard = DenseThreadsGuard::single();

                    let active = &data.block_constraints[blk];
                    let counter = WorkCounter::new(active.len());

                    fan_out(self.workers.min(active.len().max(1)), || {
                        let mut scratch = SdpScratch::new(sb.n, max_pairs(data, blk));
                        while let Some(u) = counter.claim() {
                            assemble_sdp_unit(
                                data,
                                blk,
                                sb,
                                u,
                                self.target_mu,
                                self.include_resid,
                                self.with_matrix,
                                self.mode,
                                writer,
                                rhs_writer,
                                &mut scratch,
                            );
                        }
                    });
                }
            }
        }
    }
}

enum Writer<'a, T> {
    Dense {
        data: SharedSlice<'a, T>,
        m: usize,
    },
    Sparse {
        data: SharedSlice<'a, T>,
        locs: &'a [Vec<Vec<usize>>],
    },
}

impl<'a, T> Writer<'a, T>
where
    T: FloatT,
{
    /// # Safety
    /// Pair `(i, j)` must belong to the caller's claimed unit: no other
    /// concurrently running unit writes column `j` of block `blk`.
    unsafe fn add(&self, blk: usize, local_j: usize, pair_idx: usize, i: usize, j: usize, v: T) {
        match self {
            Writer::Dense { data, m } => data.add(i + j * m, v),
            Writer::Sparse { data, locs } => data.add(locs[blk][local_j][pair_idx], v),
        }
    }
}

fn max_pairs<T: FloatT>(data: &InputData<T>, blk: usize) -> usize {
    data.adjacency[blk].iter().map(|p| p.len()).max().unwrap_or(0)
}

// worker-private block-sized scratch
struct SdpScratch<T> {
    acol: Vec<T>,
    xz: Vec<T>,
    xx: Vec<T>,
    tmp: Vec<T>,
    dxcol: Vec<T>,
    work: Vec<T>,
    bvals: Vec<T>,
}

impl<T: FloatT> SdpScratch<T> {
    fn new(n: usize, maxpairs: usize) -> Self {
        Self {
            acol: vec![T::zero(); n],
            xz: vec![T::zero(); n],
            xx: vec![T::zero(); n],
            tmp: vec![T::zero(); n],
            dxcol: vec![T::zero(); n],
            work: vec![T::zero(); n],
            bvals: vec![T::zero(); maxpairs],
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_sdp_unit<T: FloatT>(
    data: &InputData<T>,
    blk: usize,
    sb: &SdpBlockState<T>,
    unit: usize,
    target_mu: T,
    include_resid: bool,
    with_matrix: bool,
    mode: StepMode,
    writer: &Writer<T>,
    rhs_writer: &SharedSlice<T>,
    s: &mut SdpScratch<T>,
) {
    let j = data.block_constraints[blk][unit];
    let Aj = data.sdp_slice(j, blk);
    let pairs = &data.adjacency[blk][unit];

    let bvals = &mut s.bvals[..pairs.len()];
    bvals.fill(T::zero());
    let mut rhs_j = T::zero();

    for &k in &Aj.sym_cols {
        // x_z = Z⁻¹·a_jk,  x_x = X·e_k
        Aj.mat.sym_col_into(k, &mut s.acol);
        s.xz.copy_from(&s.acol);
        sb.solve_by_z(&mut s.xz, &mut s.work);

        s.xx.fill(T::zero());
        s.xx[k] = T::one();
        sb.solve_by_x(&mut s.xx, &mut s.work);

        // A_j•Z⁻¹ falls out of the solve: Σ_k x_z[k]
        rhs_j -= target_mu * s.xz[k];

        // A_j•(X·D·Z⁻¹) = Σ_k x_xᵀ·D·x_z
        if include_resid {
            rhs_j += sb.resid.quad_form_sym(&s.xx, &s.xz);
        }

        // corrector second-order term A_j•(dX·dZ·Z⁻¹) = Σ_k dx_kᵀ·dZ·x_z
        if mode == StepMode::Corrector {
            sb.dx_column(k, &mut s.dxcol);
            sb.dzmat.sym().symv(&mut s.tmp, &s.xz, T::one(), T::zero());
            rhs_j += s.dxcol.dot(&s.tmp);
        }

        // B_ij accumulates x_zᵀ·A_i·x_x over the block's pairs
        if with_matrix {
            for (p, &i) in pairs.iter().enumerate() {
                bvals[p] += data.sdp_slice(i, blk).mat.quad_form_sym(&s.xz, &s.xx);
            }
        }
    }

    // Safety: this unit owns right-hand-side entry j and Schur column j
    // of this block phase; the counter hands out each unit exactly once.
    unsafe {
        rhs_writer.add(j, rhs_j);
        if with_matrix {
            for (p, &i) in pairs.iter().enumerate() {
                writer.add(blk, unit, p, i, j, bvals[p]);
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn assemble_linear_block<T: FloatT>(
    data: &InputData<T>,
    blk: usize,
    lb: &LinearBlockState<T>,
    target_mu: T,
    include_resid: bool,
    with_matrix: bool,
    mode: StepMode,
    writer: &Writer<T>,
    rhs_writer: &SharedSlice<T>,
) {
    let active = &data.block_constraints[blk];

    for (unit, &j) in active.iter().enumerate() {
        let aj = data.diag_slice(j, blk);
        let mut rhs_j = T::zero();

        for (l, v) in aj.iter() {
            let zinv = T::recip(lb.z[l]);
            rhs_j -= target_mu * v * zinv;
            if include_resid {
                rhs_j += v * lb.x[l] * lb.resid[l] * zinv;
            }
            if mode == StepMode::Corrector {
                rhs_j += v * lb.dx[l] * lb.dz[l] * zinv;
            }
        }

        // Safety: single threaded here, ownership is trivial
        unsafe {
            rhs_writer.add(j, rhs_j);
            if with_matrix {
                for (p, &i) in data.adjacency[blk][unit].iter().enumerate() {
                    let ai = data.diag_slice(i, blk);
                    let v = diag_pair_sum(ai, aj, &lb.x, &lb.z);
                    writer.add(blk, unit, p, i, j, v);
                }
            }
        }
    }
}

// Σ_l a_i[l]·a_j[l]·x_l/z_l over the shared support of two diagonal slices
fn diag_pair_sum<T: FloatT>(ai: &SparseVector<T>, aj: &SparseVector<T>, x: &[T], z: &[T]) -> T {
    let mut out = T::zero();
    let mut pa = 0;
    let mut pb = 0;
    while pa < ai.nnz() && pb < aj.nnz() {
        let la = ai.nzind[pa];
        let lb = aj.nzind[pb];
        if la == lb {
            out += ai.nzval[pa] * aj.nzval[pb] * x[la] / z[la];
            pa += 1;
            pb += 1;
        } else if la < lb {
            pa += 1;
        } else {
            pb += 1;
        }
    }
    out
}
