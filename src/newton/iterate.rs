#![allow(non_snake_case)]

//! The current primal-dual point and its step storage.

use super::*;
use crate::algebra::*;
use std::iter::zip;

/// Current iterate: the dual vector `y`, its step `dy`, and the owned cone
/// block states carrying `X`, `Z` and their steps.
#[derive(Debug)]
pub struct Iterate<T: FloatT> {
    pub y: Vec<T>,
    pub dy: Vec<T>,
    pub blocks: Vec<ConeBlockState<T>>,
}

/// Dense solution matrices extracted at termination.
#[derive(Debug)]
pub enum BlockSolution<T> {
    Semidefinite { x: Matrix<T>, z: Matrix<T> },
    Linear { x: Vec<T>, z: Vec<T> },
}

#[derive(Debug)]
pub struct FinalSolution<T> {
    pub y: Vec<T>,
    pub blocks: Vec<BlockSolution<T>>,
}

impl<T> Iterate<T>
where
    T: FloatT,
{
    /// Build the engine state for a problem, starting from the identity
    /// point `X = Z = I`, `y = 0`.
    pub fn new(data: &InputData<T>) -> Result<Self, NewtonError> {
        let blocks = (0..data.structure.nblocks())
            .map(|idx| ConeBlockState::new(data, idx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            y: vec![T::zero(); data.m],
            dy: vec![T::zero(); data.m],
            blocks,
        })
    }

    /// total barrier degree across blocks
    pub fn degree(&self) -> usize {
        self.blocks.iter().map(|b| b.degree()).sum()
    }

    /// complementarity `μ = X•Z / degree`
    pub fn mu(&self) -> T {
        let dot: T = self.blocks.iter().map(|b| b.complementarity()).sum();
        dot / (self.degree().as_T())
    }

    /// Apply the stored direction at the chosen step lengths:
    /// `X += α_p·dX`, `y += α_d·dy`, `Z += α_d·dZ`.
    ///
    /// Fails with [`NewtonError::StepLengthCollapse`] when both lengths are
    /// below the configured threshold, a terminal condition for the outer
    /// loop.  Nothing is mutated on failure.
    pub fn update(
        &mut self,
        α_p: T,
        α_d: T,
        settings: &NewtonSettings<T>,
    ) -> Result<(), NewtonError> {
        if α_p < settings.step_collapse_tol && α_d < settings.step_collapse_tol {
            return Err(NewtonError::StepLengthCollapse);
        }

        let Self { y, dy, blocks } = self;
        y.axpby(α_d, dy, T::one());
        for blk in blocks.iter_mut() {
            blk.apply_step(α_p, α_d);
        }
        Ok(())
    }

    /// Reconstruct the dense solution, one unit-vector solve per primal
    /// column.  Deliberately deferred to termination only.
    pub fn make_final_solution(&self) -> FinalSolution<T> {
        let blocks = self
            .blocks
            .iter()
            .map(|state| match state {
                ConeBlockState::Semidefinite(sb) => BlockSolution::Semidefinite {
                    x: sb.dense_x(),
                    z: sb.dense_z(),
                },
                ConeBlockState::Linear(lb) => BlockSolution::Linear {
                    x: lb.x.clone(),
                    z: lb.z.clone(),
                },
            })
            .collect();

        FinalSolution {
            y: self.y.clone(),
            blocks,
        }
    }

    /// primal objective `C•X`
    pub fn primal_objective(&self, data: &InputData<T>) -> T {
        self.blocks
            .iter()
            .map(|state| match state {
                ConeBlockState::Semidefinite(sb) => sb.c_dot_x(data),
                ConeBlockState::Linear(lb) => lb.c_dot_x(data),
            })
            .sum()
    }

    /// dual objective `bᵀy`
    pub fn dual_objective(&self, data: &InputData<T>) -> T {
        zip(&data.b, &self.y).map(|(&b, &y)| b * y).sum()
    }
}
