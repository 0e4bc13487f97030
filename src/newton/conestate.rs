#![allow(non_snake_case)]

use super::*;
use crate::algebra::*;
use crate::sparsefact::SparseFactorization;
use enum_dispatch::*;
use std::iter::zip;

/// Operations shared by every cone block kind.
#[enum_dispatch]
pub trait ConeBlock<T>
where
    T: FloatT,
{
    /// variable dimension of the block
    fn dim(&self) -> usize;

    /// barrier degree of the block
    fn degree(&self) -> usize;

    /// `X•Z` restricted to this block
    fn complementarity(&self) -> T;

    /// Refresh the numeric factorizations of the current point, once per
    /// iteration before assembly.  Fails if the block has left the cone
    /// interior.
    fn refresh_factorizations(&mut self) -> Result<(), NewtonError>;

    /// Rebuild the cached dual residual `C − Σ yₖAₖ − Z` for this block.
    fn refresh_dual_residual(&mut self, y: &[T], data: &InputData<T>);

    /// squared Frobenius norm of the cached dual residual
    fn dual_residual_sumsq(&self) -> T;

    /// Scatter `−Σ dyₖ·Aₖ` into the dual step accumulator, adding back the
    /// cached residual while the phase carries it.
    fn accumulate_dual_step(&mut self, dy: &[T], data: &InputData<T>, include_residual: bool);

    /// Apply `X += α_p·dX`, `Z += α_d·dZ`.
    fn apply_step(&mut self, α_p: T, α_d: T);
}

/// Per-block engine state: a semidefinite block in clique form, or a
/// linear block with elementwise closed forms.
#[enum_dispatch(ConeBlock<T>)]
#[derive(Debug)]
pub enum ConeBlockState<T>
where
    T: FloatT,
{
    Semidefinite(SdpBlockState<T>),
    Linear(LinearBlockState<T>),
}

impl<T> ConeBlockState<T>
where
    T: FloatT,
{
    pub fn new(data: &InputData<T>, index: usize) -> Result<Self, NewtonError> {
        let blk = data.structure.blocks[index];
        match blk.kind {
            BlockKind::Semidefinite => Ok(SdpBlockState::new(data, index)?.into()),
            BlockKind::Linear => Ok(LinearBlockState::new(data, index).into()),
        }
    }
}

// ---------------------------------------------------------------
// semidefinite blocks
// ---------------------------------------------------------------

/// State of one semidefinite block.
///
/// The dual variable `Z` lives on the aggregate sparsity pattern and is
/// refactored numerically every iteration.  The primal variable is carried
/// as dense clique blocks of its maximum-determinant completion; its
/// inverse factorization is rebuilt per clique and installed into a second
/// sparse factorization sharing the dual one's symbolic structure, so both
/// solves run through the same supernodal machinery.
#[derive(Debug)]
pub struct SdpBlockState<T: FloatT> {
    /// block index within the block structure
    pub index: usize,
    /// block dimension
    pub n: usize,

    /// aggregated sparse dual matrix `Z`, upper triangle
    pub zmat: CscMatrix<T>,
    /// dual step accumulator `dZ`, same pattern
    pub dzmat: CscMatrix<T>,
    /// cached dual residual `C − Σ yₖAₖ − Z`, same pattern
    pub resid: CscMatrix<T>,

    /// clique decomposition, built once
    pub cliques: CliqueDecomposition,

    // dual factorization: numeric refactor of zmat per iteration
    zfact: SparseFactorization<T>,
    // inverse-primal factorization: clique-dense install per iteration.
    // Shares only symbolic structure with zfact, never numeric buffers.
    xfact: SparseFactorization<T>,

    /// dense primal clique blocks `X̄`
    pub xblocks: Vec<Matrix<T>>,
    /// primal step clique blocks `dX̄`
    pub dxblocks: Vec<Matrix<T>>,
    // per-clique reverse Cholesky factor and inverse factor of X̄
    cholblocks: Vec<RevCholeskyEngine<T>>,
    lcol_scratch: Vec<T>,

    // aggregate pattern entry -> owning (clique, offset)
    agg_owner: Vec<(usize, usize)>,
    // per active constraint, A entry -> aggregate pattern position
    amaps: Vec<Vec<usize>>,
    // objective entry -> aggregate pattern position
    cmap: Vec<usize>,
}

impl<T> SdpBlockState<T>
where
    T: FloatT,
{
    /// One-time symbolic analysis of the aggregate pattern, clique
    /// decomposition, index maps and clique storage.  The block starts at
    /// the identity point `X = Z = I`.
    pub fn new(data: &InputData<T>, index: usize) -> Result<Self, NewtonError> {
        let n = data.structure.blocks[index].dim;
        let active = &data.block_constraints[index];

        // aggregate sparsity: union of the objective and constraint
        // patterns, with the diagonal always included
        let mut entries: Vec<(usize, usize)> = (0..n).map(|i| (i, i)).collect();
        collect_pattern(&data.C[index].sdp().mat, &mut entries);
        for &k in active {
            collect_pattern(&data.sdp_slice(k, index).mat, &mut entries);
        }
        entries.sort_by_key(|&(r, c)| (c, r));
        entries.dedup();

        let triplets = entries.iter().map(|&(r, c)| (r, c, T::zero())).collect();
        let pattern = CscMatrix::from_triu_triplets(n, triplets);

        let zfact = SparseFactorization::new(&pattern, None)?;
        let xfact = zfact.clone_symbolic();
        let cliques = CliqueDecomposition::new(&zfact);

        // owner cells of the aggregate entries, in nzval order
        let mut agg_owner = Vec::with_capacity(pattern.nnz());
        for col in 0..n {
            for &row in &pattern.rowval[pattern.colptr[col]..pattern.colptr[col + 1]] {
                agg_owner.push(cliques.owner_cell(row, col));
            }
        }

        let amaps = active
            .iter()
            .map(|&k| entry_map(&data.sdp_slice(k, index).mat, &pattern))
            .collect();
        let cmap = entry_map(&data.C[index].sdp().mat, &pattern);

        let mut zmat = pattern.clone();
        set_identity_values(&mut zmat);
        let dzmat = pattern.clone_pattern();
        let resid = pattern.clone_pattern();

        let mut xblocks = cliques.allocate_blocks();
        for blk in xblocks.iter_mut() {
            blk.set_identity();
        }
        // identity clique blocks must agree on replicated cells
        cliques.fill_duplicate_cells(&mut xblocks);
        let dxblocks = cliques.allocate_blocks();
        let cholblocks = cliques
            .cliques
            .iter()
            .map(|c| RevCholeskyEngine::new(c.nblk()))
            .collect();

        Ok(Self {
            index,
            n,
            zmat,
            dzmat,
            resid,
            cliques,
            zfact,
            xfact,
            xblocks,
            dxblocks,
            cholblocks,
            lcol_scratch: vec![T::zero(); n],
            agg_owner,
            amaps,
            cmap,
        })
    }

    /// `Z⁻¹·b` in place, native ordering.  `work` is caller-owned scratch
    /// of block dimension.
    pub fn solve_by_z(&self, b: &mut [T], work: &mut [T]) {
        self.zfact.solve(b, work);
    }

    /// `X·b` in place through the inverse-primal factorization, native
    /// ordering.
    pub fn solve_by_x(&self, b: &mut [T], work: &mut [T]) {
        self.xfact.solve(b, work);
    }

    /// primal value at an aggregate pattern position
    pub fn x_entry(&self, nz: usize) -> T {
        let (q, off) = self.agg_owner[nz];
        self.xblocks[q].data[off]
    }

    /// `A•X` for the slice of active constraint `local_k`, reading the
    /// primal clique storage through the aggregate owner map.
    pub fn a_dot_x(&self, data: &InputData<T>, local_k: usize) -> T {
        let A = &data.sdp_slice(data.block_constraints[self.index][local_k], self.index).mat;
        self.dot_sym_against_x(A, &self.amaps[local_k])
    }

    /// `C•X` for this block.
    pub fn c_dot_x(&self, data: &InputData<T>) -> T {
        self.dot_sym_against_x(&data.C[self.index].sdp().mat, &self.cmap)
    }

    fn dot_sym_against_x(&self, A: &CscMatrix<T>, map: &[usize]) -> T {
        let two = T::one() + T::one();
        let mut out = T::zero();
        let mut t = 0;
        for col in 0..A.ncols() {
            for p in A.colptr[col]..A.colptr[col + 1] {
                let row = A.rowval[p];
                let x = self.x_entry(map[t]);
                let w = if row == col { T::one() } else { two };
                out += w * A.nzval[p] * x;
                t += 1;
            }
        }
        out
    }

    /// Gather native column `k` of the primal step matrix.
    pub fn dx_column(&self, k: usize, out: &mut [T]) {
        self.cliques.gather_column(&self.dxblocks, k, out);
    }

    /// Resolve replicated cells and symmetrize every clique step block,
    /// removing the floating point asymmetry of the columnwise scatter.
    pub fn finalize_dx(&mut self) {
        self.cliques.fill_duplicate_cells(&mut self.dxblocks);
        for blk in self.dxblocks.iter_mut() {
            blk.symmetric_part();
        }
    }

    /// Take the step blocks out for a parallel scatter phase.
    pub(crate) fn take_dxblocks(&mut self) -> Vec<Matrix<T>> {
        std::mem::take(&mut self.dxblocks)
    }

    pub(crate) fn put_dxblocks(&mut self, blocks: Vec<Matrix<T>>) {
        self.dxblocks = blocks;
    }

    /// Symmetric operator `D^{-1/2}L⁻¹P·dZ·PᵀL⁻ᵀD^{-1/2}` whose minimum
    /// eigenvalue bounds the admissible dual step.
    pub fn dual_step_operator(&self) -> DualStepOperator<'_, T> {
        DualStepOperator { state: self }
    }

    /// Symmetric operator `D^{1/2}LᵀP·dX·PᵀLD^{1/2}` over the inverse-primal
    /// factors, bounding the admissible primal step.
    pub fn primal_step_operator(&self) -> PrimalStepOperator<'_, T> {
        PrimalStepOperator { state: self }
    }

    /// Dense primal matrix by repeated unit-vector solves, one per column.
    /// Deliberately deferred to termination only.
    pub fn dense_x(&self) -> Matrix<T> {
        let n = self.n;
        let mut out = Matrix::zeros((n, n));
        let mut work = vec![T::zero(); n];
        for k in 0..n {
            let col = out.col_slice_mut(k);
            col.fill(T::zero());
            col[k] = T::one();
            self.xfact.solve(col, &mut work);
        }
        out.symmetric_part();
        out
    }

    /// Dense dual matrix scattered from the aggregate pattern.
    pub fn dense_z(&self) -> Matrix<T> {
        let n = self.n;
        let mut out = Matrix::zeros((n, n));
        for col in 0..n {
            for p in self.zmat.colptr[col]..self.zmat.colptr[col + 1] {
                let row = self.zmat.rowval[p];
                out[(row, col)] = self.zmat.nzval[p];
                out[(col, row)] = self.zmat.nzval[p];
            }
        }
        out
    }
}

impl<T> ConeBlock<T> for SdpBlockState<T>
where
    T: FloatT,
{
    fn dim(&self) -> usize {
        self.n
    }

    fn degree(&self) -> usize {
        self.n
    }

    fn complementarity(&self) -> T {
        // Z has the aggregate pattern, so X•Z needs only pattern entries
        let two = T::one() + T::one();
        let mut out = T::zero();
        let mut t = 0;
        for col in 0..self.n {
            for p in self.zmat.colptr[col]..self.zmat.colptr[col + 1] {
                let row = self.zmat.rowval[p];
                let w = if row == col { T::one() } else { two };
                out += w * self.zmat.nzval[p] * self.x_entry(t);
                t += 1;
            }
        }
        out
    }

    fn refresh_factorizations(&mut self) -> Result<(), NewtonError> {
        let block = self.index;

        // dual side: numeric refactor of Z over the fixed pattern
        self.zfact.set_values(&self.zmat.nzval);
        self.zfact
            .refactor()
            .map_err(|_| NewtonError::NotPositiveDefinite { block })?;

        // primal side: reverse Cholesky and factor inverse per clique...
        for (eng, xblk) in zip(self.cholblocks.iter_mut(), self.xblocks.iter()) {
            eng.factor(xblk)
                .map_err(|_| NewtonError::NotPositiveDefinite { block })?;
        }

        // ...then derive the completion's inverse factorization column by
        // column and install it into the second factorization's numeric
        // buffers.  For a column at supernode position i with factor `U`
        // and inverse `W`, the unit-lower column is `u_ii·W[i, i+1:]` and
        // the pivot is `1/u_ii²`.
        for j in 0..self.n {
            let (q, pos) = self.cliques.clique_of_column(j);
            let eng = &self.cholblocks[q];
            let nblk = self.cliques.cliques[q].nblk();
            let uii = eng.U[(pos, pos)];

            let lcol = &mut self.lcol_scratch[..nblk - pos - 1];
            for (t, l) in zip((pos + 1)..nblk, lcol.iter_mut()) {
                *l = uii * eng.W[(pos, t)];
            }
            self.xfact.install_column(j, lcol, T::recip(uii * uii));
        }
        self.xfact.finalize_install();
        Ok(())
    }

    fn refresh_dual_residual(&mut self, y: &[T], data: &InputData<T>) {
        let resid = &mut self.resid.nzval;
        resid.fill(T::zero());

        let C = &data.C[self.index].sdp().mat;
        for (&loc, &v) in zip(&self.cmap, &C.nzval) {
            resid[loc] += v;
        }
        for (local, &k) in data.block_constraints[self.index].iter().enumerate() {
            let A = &data.sdp_slice(k, self.index).mat;
            let yk = y[k];
            for (&loc, &v) in zip(&self.amaps[local], &A.nzval) {
                resid[loc] -= yk * v;
            }
        }
        for (r, &z) in zip(resid.iter_mut(), &self.zmat.nzval) {
            *r -= z;
        }
    }

    fn dual_residual_sumsq(&self) -> T {
        self.resid.sumsq_sym()
    }

    fn accumulate_dual_step(&mut self, dy: &[T], data: &InputData<T>, include_residual: bool) {
        let dz = &mut self.dzmat.nzval;
        dz.fill(T::zero());

        for (local, &k) in data.block_constraints[self.index].iter().enumerate() {
            let A = &data.sdp_slice(k, self.index).mat;
            let dyk = dy[k];
            for (&loc, &v) in zip(&self.amaps[local], &A.nzval) {
                dz[loc] -= dyk * v;
            }
        }
        if include_residual {
            dz.axpby(T::one(), &self.resid.nzval, T::one());
        }
    }

    fn apply_step(&mut self, α_p: T, α_d: T) {
        for (xblk, dxblk) in zip(self.xblocks.iter_mut(), self.dxblocks.iter()) {
            xblk.data.axpby(α_p, &dxblk.data, T::one());
        }
        self.zmat.nzval.axpby(α_d, &self.dzmat.nzval, T::one());
    }
}

// entry positions of a triu slice within the aggregate pattern, in the
// slice's nzval order.  A missing entry means the aggregate pattern was
// built against different data, which is unrecoverable.
fn entry_map<T: FloatT>(A: &CscMatrix<T>, pattern: &CscMatrix<T>) -> Vec<usize> {
    let mut map = Vec::with_capacity(A.nnz());
    for col in 0..A.ncols() {
        for &row in &A.rowval[A.colptr[col]..A.colptr[col + 1]] {
            let loc = pattern
                .find_entry(row, col)
                .unwrap_or_else(|| panic!("entry ({},{}) missing from aggregate pattern", row, col));
            map.push(loc);
        }
    }
    map
}

fn collect_pattern<T: FloatT>(A: &CscMatrix<T>, entries: &mut Vec<(usize, usize)>) {
    for col in 0..A.ncols() {
        for &row in &A.rowval[A.colptr[col]..A.colptr[col + 1]] {
            entries.push((row, col));
        }
    }
}

fn set_identity_values<T: FloatT>(A: &mut CscMatrix<T>) {
    for col in 0..A.ncols() {
        for p in A.colptr[col]..A.colptr[col + 1] {
            A.nzval[p] = if A.rowval[p] == col { T::one() } else { T::zero() };
        }
    }
}

// ---------------------------------------------------------------
// step bound operators
// ---------------------------------------------------------------

/// See [`SdpBlockState::dual_step_operator`].
pub struct DualStepOperator<'a, T: FloatT> {
    state: &'a SdpBlockState<T>,
}

impl<'a, T> SymOperator<T> for DualStepOperator<'a, T>
where
    T: FloatT,
{
    fn dim(&self) -> usize {
        self.state.n
    }

    fn apply(&self, x: &[T], y: &mut [T], w1: &mut [T], w2: &mut [T]) {
        let s = self.state;
        s.zfact.half_solve_t(x, w1, y);
        s.dzmat.sym().symv(w2, w1, T::one(), T::zero());
        s.zfact.half_solve(w2, y);
    }
}

/// See [`SdpBlockState::primal_step_operator`].
pub struct PrimalStepOperator<'a, T: FloatT> {
    state: &'a SdpBlockState<T>,
}

impl<'a, T> SymOperator<T> for PrimalStepOperator<'a, T>
where
    T: FloatT,
{
    fn dim(&self) -> usize {
        self.state.n
    }

    fn apply(&self, x: &[T], y: &mut [T], w1: &mut [T], w2: &mut [T]) {
        let s = self.state;
        s.xfact.half_mul_t(x, w1, y);
        s.cliques.apply_sym(&s.dxblocks, w1, w2);
        s.xfact.half_mul(w2, y);
    }
}

// ---------------------------------------------------------------
// linear blocks
// ---------------------------------------------------------------

/// State of one linear (diagonal) block.  All operations are elementwise
/// closed forms; the factorization refresh reduces to an interior check.
#[derive(Debug)]
pub struct LinearBlockState<T: FloatT> {
    pub index: usize,
    pub n: usize,
    pub x: Vec<T>,
    pub z: Vec<T>,
    pub dx: Vec<T>,
    pub dz: Vec<T>,
    pub resid: Vec<T>,
}

impl<T> LinearBlockState<T>
where
    T: FloatT,
{
    pub fn new(data: &InputData<T>, index: usize) -> Self {
        let n = data.structure.blocks[index].dim;
        Self {
            index,
            n,
            x: vec![T::one(); n],
            z: vec![T::one(); n],
            dx: vec![T::zero(); n],
            dz: vec![T::zero(); n],
            resid: vec![T::zero(); n],
        }
    }

    /// `A•X` for the slice of active constraint `local_k`.
    pub fn a_dot_x(&self, data: &InputData<T>, local_k: usize) -> T {
        let k = data.block_constraints[self.index][local_k];
        data.diag_slice(k, self.index).dot_dense(&self.x)
    }

    pub fn c_dot_x(&self, data: &InputData<T>) -> T {
        data.C[self.index].diag().dot_dense(&self.x)
    }

    /// minimum eigenvalue of `Z^{-1/2}·dZ·Z^{-1/2}`, elementwise
    pub fn dual_step_min_eig(&self) -> T {
        zip(&self.dz, &self.z).map(|(&dz, &z)| dz / z).fold(T::infinity(), T::min)
    }

    /// minimum eigenvalue of `X^{-1/2}·dX·X^{-1/2}`, elementwise
    pub fn primal_step_min_eig(&self) -> T {
        zip(&self.dx, &self.x).map(|(&dx, &x)| dx / x).fold(T::infinity(), T::min)
    }
}

impl<T> ConeBlock<T> for LinearBlockState<T>
where
    T: FloatT,
{
    fn dim(&self) -> usize {
        self.n
    }

    fn degree(&self) -> usize {
        self.n
    }

    fn complementarity(&self) -> T {
        self.x.dot(&self.z)
    }

    fn refresh_factorizations(&mut self) -> Result<(), NewtonError> {
        let interior = self.z.iter().all(|&z| z > T::zero()) //
            && self.x.iter().all(|&x| x > T::zero());
        if interior {
            Ok(())
        } else {
            Err(NewtonError::NotPositiveDefinite { block: self.index })
        }
    }

    fn refresh_dual_residual(&mut self, y: &[T], data: &InputData<T>) {
        self.resid.fill(T::zero());
        for (l, v) in data.C[self.index].diag().iter() {
            self.resid[l] += v;
        }
        for &k in &data.block_constraints[self.index] {
            let yk = y[k];
            for (l, v) in data.diag_slice(k, self.index).iter() {
                self.resid[l] -= yk * v;
            }
        }
        for (r, &z) in zip(self.resid.iter_mut(), &self.z) {
            *r -= z;
        }
    }

    fn dual_residual_sumsq(&self) -> T {
        self.resid.sumsq()
    }

    fn accumulate_dual_step(&mut self, dy: &[T], data: &InputData<T>, include_residual: bool) {
        self.dz.fill(T::zero());
        for &k in &data.block_constraints[self.index] {
            let dyk = dy[k];
            for (l, v) in data.diag_slice(k, self.index).iter() {
                self.dz[l] -= dyk * v;
            }
        }
        if include_residual {
            self.dz.axpby(T::one(), &self.resid, T::one());
        }
    }

    fn apply_step(&mut self, α_p: T, α_d: T) {
        self.x.axpby(α_p, &self.dx, T::one());
        self.z.axpby(α_d, &self.dz, T::one());
    }
}
