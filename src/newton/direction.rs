#![allow(non_snake_case)]

//! Direction solver: factorizes the assembled Schur system, solves for the
//! dual step `dy`, and back-substitutes through the cone state to produce
//! the dual-slack step `dZ` and primal step `dX`.

use super::workpool::{fan_out, SharedSlice, WorkCounter};
use super::*;
use crate::algebra::*;
use crate::timers::Timers;
use itertools::izip;

pub struct DirectionSolver<T: FloatT> {
    pub schur: SchurSystem<T>,
    pub timers: Timers,
}

impl<T> DirectionSolver<T>
where
    T: FloatT,
{
    pub fn new(data: &InputData<T>, settings: &NewtonSettings<T>) -> Result<Self, NewtonError> {
        Ok(Self {
            schur: SchurSystem::new(data, settings)?,
            timers: Timers::new(),
        })
    }

    /// Compute a full direction `(dX, dy, dZ)` into the iterate's step
    /// storage for the given complementarity target `βμ`.
    ///
    /// In `Predictor` mode the cone factorizations are refreshed and the
    /// Schur system is assembled and factorized; `Corrector` mode reuses
    /// both and rebuilds only the right-hand side.  Any failure is fatal to
    /// the iteration and leaves partially updated step storage behind; the
    /// caller must not use it.
    pub fn compute_direction(
        &mut self,
        data: &InputData<T>,
        iterate: &mut Iterate<T>,
        target_mu: T,
        phase: Phase,
        mode: StepMode,
        settings: &NewtonSettings<T>,
    ) -> Result<(), NewtonError> {
        let Self { schur, timers } = self;

        if mode == StepMode::Predictor {
            timers.time("cone refactor", || {
                iterate
                    .blocks
                    .iter_mut()
                    .try_for_each(|blk| blk.refresh_factorizations())
            })?;
        }

        timers.time("schur assemble", || {
            schur.assemble(data, &iterate.blocks, target_mu, phase, mode, settings);
        });

        if mode == StepMode::Predictor {
            timers.time("schur factor", || schur.factorize(settings))?;
        }

        timers.time("schur solve", || {
            schur.solve_into(&mut iterate.dy);
        });

        compute_dz(data, iterate, phase);
        timers.time("primal step", || {
            compute_dx(iterate, target_mu, settings);
        });

        if settings.verbose {
            println!("direction ({:?}) target_mu = {:.3e}", mode, target_mu);
        }
        Ok(())
    }
}

// dZ = −Σ_k dy_k·A_k [+ D], scattered through the aggregate-index maps
fn compute_dz<T: FloatT>(data: &InputData<T>, iterate: &mut Iterate<T>, phase: Phase) {
    let include_residual = phase.includes_dual_residual();
    let Iterate { blocks, dy, .. } = iterate;
    for blk in blocks.iter_mut() {
        blk.accumulate_dual_step(dy, data, include_residual);
    }
}

// dX per block: the linear closed form, or the columnwise semidefinite
// back-substitution fanned out over the worker pool
fn compute_dx<T: FloatT>(iterate: &mut Iterate<T>, target_mu: T, settings: &NewtonSettings<T>) {
    let workers = settings.worker_count();

    for state in iterate.blocks.iter_mut() {
        match state {
            ConeBlockState::Linear(lb) => {
                // dx_l = βμ·z_l⁻¹ − x_l − x_l·dz_l·z_l⁻¹
                let (x, z, dx, dz) = (&lb.x, &lb.z, &mut lb.dx, &lb.dz);
                for (dx, &x, &z, &dz) in izip!(dx.iter_mut(), x, z, dz) {
                    let zinv = T::recip(z);
                    *dx = target_mu * zinv - x - x * dz * zinv;
                }
            }
            ConeBlockState::Semidefinite(sb) => {
                compute_dx_sdp(sb, target_mu, workers);
            }
        }
    }
}

fn compute_dx_sdp<T: FloatT>(sb: &mut SdpBlockState<T>, target_mu: T, workers: usize) {
    let n = sb.n;

    // step blocks leave the state for the scatter phase so workers can
    // read the factorizations while writing clique cells they own
    let mut dxblocks = sb.take_dxblocks();
    {
        let _guard = DenseThreadsGuard::single();
        let counter = WorkCounter::new(n);
        let writers: Vec<SharedSlice<T>> = dxblocks
            .iter_mut()
            .map(|blk| SharedSlice::new(&mut blk.data))
            .collect();
        let writers = &writers;
        let sb = &*sb;

        fan_out(workers.min(n), || {
            let mut xz = vec![T::zero(); n];
            let mut xx = vec![T::zero(); n];
            let mut tmp = vec![T::zero(); n];
            let mut work = vec![T::zero(); n];

            while let Some(k) = counter.claim() {
                // x_z = Z⁻¹·e_k
                xz.fill(T::zero());
                xz[k] = T::one();
                sb.solve_by_z(&mut xz, &mut work);

                // x_x = X·(dZ·x_z + e_k)
                sb.dzmat.sym().symv(&mut tmp, &xz, T::one(), T::zero());
                tmp[k] += T::one();
                xx.copy_from(&tmp);
                sb.solve_by_x(&mut xx, &mut work);

                // column k of dX = βμ·x_z − x_x, scattered to clique cells
                // owned by this column
                for rec in &sb.cliques.col_scatter[k] {
                    let v = target_mu * xz[rec.row] - xx[rec.row];
                    // Safety: each clique cell belongs to exactly one
                    // column's record list, and column k is claimed once
                    unsafe { writers[rec.clique].set(rec.offset, v) };
                }
            }
        });
    }
    sb.put_dxblocks(dxblocks);

    // resolve replicated separator cells, then symmetrize
    sb.finalize_dx();
}
