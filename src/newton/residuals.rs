#![allow(non_snake_case)]

//! Primal and dual infeasibility norms of the current iterate.

use super::*;
use crate::algebra::*;

/// Residual norms, with the iteration-0 baseline retained for relative
/// convergence checks by the outer loop.
#[derive(Debug)]
pub struct Residuals<T> {
    /// primal infeasibility `p_i = b_i − Σ_blocks A_i•X`
    pub primal: Vec<T>,
    pub primal_norm: T,
    /// Frobenius norm of the dual residual `C − Σ yₖAₖ − Z` across blocks
    pub dual_norm: T,
    /// complementarity `μ`
    pub mu: T,
    baseline: Option<(T, T)>,
}

impl<T> Residuals<T>
where
    T: FloatT,
{
    pub fn new(m: usize) -> Self {
        Self {
            primal: vec![T::zero(); m],
            primal_norm: T::zero(),
            dual_norm: T::zero(),
            mu: T::zero(),
            baseline: None,
        }
    }

    /// Recompute all norms at the current iterate.  The per-block dual
    /// residual matrices are refreshed into the cone state, where the
    /// assembler and direction solver read them back.
    pub fn update(&mut self, data: &InputData<T>, iterate: &mut Iterate<T>) {
        self.primal.copy_from(&data.b);

        for state in iterate.blocks.iter_mut() {
            match state {
                ConeBlockState::Semidefinite(sb) => {
                    for local in 0..data.block_constraints[sb.index].len() {
                        let k = data.block_constraints[sb.index][local];
                        self.primal[k] -= sb.a_dot_x(data, local);
                    }
                }
                ConeBlockState::Linear(lb) => {
                    for local in 0..data.block_constraints[lb.index].len() {
                        let k = data.block_constraints[lb.index][local];
                        self.primal[k] -= lb.a_dot_x(data, local);
                    }
                }
            }
            state.refresh_dual_residual(&iterate.y, data);
        }

        self.primal_norm = self.primal.norm();
        let dual_sumsq: T = iterate.blocks.iter().map(|b| b.dual_residual_sumsq()).sum();
        self.dual_norm = dual_sumsq.sqrt();
        self.mu = iterate.mu();

        if self.baseline.is_none() {
            self.baseline = Some((self.primal_norm, self.dual_norm));
        }
    }

    /// primal norm relative to the iteration-0 baseline
    pub fn primal_relative(&self) -> T {
        let (p0, _) = self.baseline.unwrap_or((T::one(), T::one()));
        self.primal_norm / T::max(T::one(), p0)
    }

    /// dual norm relative to the iteration-0 baseline
    pub fn dual_relative(&self) -> T {
        let (_, d0) = self.baseline.unwrap_or((T::one(), T::one()));
        self.dual_norm / T::max(T::one(), d0)
    }
}
