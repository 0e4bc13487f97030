#![allow(non_snake_case)]

//! Supernodal clique decomposition of a block's symbolic factorization.
//!
//! Built once per semidefinite block and immutable thereafter.  The
//! decomposition fixes where every entry of the block lives in the dense
//! clique representation: each `(row, col)` entry of the filled square
//! pattern maps to exactly one clique-local dense cell, while cells
//! replicated between overlapping cliques (separator against separator)
//! are recorded in a duplicate table and refreshed from their owner.

use crate::algebra::*;
use crate::sparsefact::SparseFactorization;

/// marker for columns with no parent in the elimination tree
const NO_PARENT: usize = usize::MAX;

/// One clique: a supernode's columns plus its separator, stored as a small
/// dense matrix elsewhere.
#[derive(Debug, Clone)]
pub struct Clique {
    /// first supernode column, in the permuted ordering
    pub first_col: usize,
    /// number of supernode columns
    pub width: usize,
    /// clique members in the permuted ordering, ascending; the supernode
    /// columns come first
    pub rows_perm: Vec<usize>,
    /// the same members as native block indices
    pub rows_native: Vec<usize>,
}

impl Clique {
    /// side length of the dense block representing this clique
    pub fn nblk(&self) -> usize {
        self.rows_perm.len()
    }
}

/// Where one entry of a native column lands in the dense clique storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScatterRecord {
    /// native row index
    pub row: usize,
    pub clique: usize,
    /// linear offset into the clique's column-major dense block
    pub offset: usize,
}

/// A clique-dense cell that replicates another clique's entry.
#[derive(Debug, Clone)]
pub struct DupCell {
    pub src_clique: usize,
    pub src_offset: usize,
    pub dst_clique: usize,
    pub dst_offset: usize,
}

/// Clique decomposition of one semidefinite block.
#[derive(Debug)]
pub struct CliqueDecomposition {
    /// block dimension
    pub n: usize,
    /// permutation: `perm[i]` is the native index at factor position i
    pub perm: Vec<usize>,
    pub iperm: Vec<usize>,
    pub cliques: Vec<Clique>,
    /// per native column, the owning cell of every filled-pattern entry
    /// `(row, col)`, sorted by row, then clique id, then offset
    pub col_scatter: Vec<Vec<ScatterRecord>>,
    /// replicated separator cells, refreshed from their owners after a
    /// scatter pass
    pub dup_cells: Vec<DupCell>,

    // permuted column -> owning clique and position within it
    clique_of_col: Vec<usize>,
    pos_of_col: Vec<usize>,
}

impl CliqueDecomposition {
    /// Derive the decomposition from a symbolic factorization.
    ///
    /// Supernodes are maximal runs of consecutive columns with nested
    /// factor patterns; the clique of a supernode is its columns together
    /// with the higher adjacency of its first column.
    pub fn new<T: FloatT>(fact: &SparseFactorization<T>) -> Self {
        let L = fact.lpattern();
        let n = L.ncols();
        assert!(n > 0, "clique decomposition of an empty block");

        let perm = fact.perm().to_vec();
        let iperm = fact.iperm().to_vec();
        let Lnz = fact.lcounts();

        let parent = |j: usize| -> usize {
            if Lnz[j] > 0 {
                L.rowval[L.colptr[j]]
            } else {
                NO_PARENT
            }
        };

        // supernode partition over consecutive columns
        let mut cliques = Vec::new();
        let mut clique_of_col = vec![0; n];
        let mut pos_of_col = vec![0; n];

        let mut first = 0;
        for j in 0..n {
            let merge_next = j + 1 < n && parent(j) == j + 1 && Lnz[j] == Lnz[j + 1] + 1;
            if merge_next {
                continue;
            }

            // close the supernode [first, j]
            let width = j - first + 1;
            let mut rows_perm = Vec::with_capacity(1 + Lnz[first]);
            rows_perm.push(first);
            rows_perm.extend_from_slice(&L.rowval[L.colptr[first]..L.colptr[first + 1]]);

            // an empty clique would mean the symbolic analysis is broken
            assert!(!rows_perm.is_empty(), "empty clique in decomposition");
            debug_assert!(rows_perm.windows(2).all(|w| w[0] < w[1]));

            let rows_native = rows_perm.iter().map(|&p| perm[p]).collect();

            let q = cliques.len();
            for (pos, &col) in rows_perm.iter().take(width).enumerate() {
                clique_of_col[col] = q;
                pos_of_col[col] = pos;

                // nestedness: the factor column equals the clique tail
                debug_assert_eq!(
                    &L.rowval[L.colptr[col]..L.colptr[col + 1]],
                    &rows_perm[pos + 1..]
                );
            }

            cliques.push(Clique {
                first_col: first,
                width,
                rows_perm,
                rows_native,
            });
            first = j + 1;
        }

        // ownership: the pair (a, b) of permuted indices, a = min, is owned
        // by the clique of a's supernode, which contains both by the fill
        // transitivity of the symbolic factorization
        let mut col_scatter: Vec<Vec<ScatterRecord>> = vec![Vec::new(); n];
        let mut dup_cells = Vec::new();

        for (q, clique) in cliques.iter().enumerate() {
            let nblk = clique.nblk();
            for jloc in 0..nblk {
                let pc = clique.rows_perm[jloc];
                for iloc in 0..nblk {
                    let pr = clique.rows_perm[iloc];
                    let owner = clique_of_col[std::cmp::min(pr, pc)];
                    let offset = iloc + jloc * nblk;

                    if owner == q {
                        col_scatter[perm[pc]].push(ScatterRecord {
                            row: perm[pr],
                            clique: q,
                            offset,
                        });
                    } else {
                        let src = &cliques[owner];
                        let src_i = position_in(src, pr);
                        let src_j = position_in(src, pc);
                        dup_cells.push(DupCell {
                            src_clique: owner,
                            src_offset: src_i + src_j * src.nblk(),
                            dst_clique: q,
                            dst_offset: offset,
                        });
                    }
                }
            }
        }

        for records in col_scatter.iter_mut() {
            records.sort_by_key(|r| (r.row, r.clique, r.offset));
        }

        Self {
            n,
            perm,
            iperm,
            cliques,
            col_scatter,
            dup_cells,
            clique_of_col,
            pos_of_col,
        }
    }

    pub fn n_cliques(&self) -> usize {
        self.cliques.len()
    }

    /// Owning clique and supernode-local position of a permuted column.
    pub fn clique_of_column(&self, j_perm: usize) -> (usize, usize) {
        (self.clique_of_col[j_perm], self.pos_of_col[j_perm])
    }

    /// Owning `(clique, offset)` cell of the native entry `(r, c)`.  Panics
    /// if the entry is outside the filled pattern, which means an index map
    /// was built against the wrong pattern.
    pub fn owner_cell(&self, r: usize, c: usize) -> (usize, usize) {
        let pr = self.iperm[r];
        let pc = self.iperm[c];
        let q = self.clique_of_col[std::cmp::min(pr, pc)];
        let clique = &self.cliques[q];
        let iloc = position_in(clique, pr);
        let jloc = position_in(clique, pc);
        (q, iloc + jloc * clique.nblk())
    }

    /// Gather native column `k` of the clique-stored symmetric matrix into
    /// `out`, zeroing entries off the filled pattern.
    pub fn gather_column<T: FloatT>(&self, blocks: &[Matrix<T>], k: usize, out: &mut [T]) {
        assert_eq!(out.len(), self.n);
        out.fill(T::zero());
        for rec in &self.col_scatter[k] {
            out[rec.row] = blocks[rec.clique].data[rec.offset];
        }
    }

    /// `y = M·x` for the clique-stored symmetric matrix `M`.
    pub fn apply_sym<T: FloatT>(&self, blocks: &[Matrix<T>], x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.n);
        assert_eq!(y.len(), self.n);
        y.fill(T::zero());
        for (k, records) in self.col_scatter.iter().enumerate() {
            let xk = x[k];
            for rec in records {
                y[rec.row] += blocks[rec.clique].data[rec.offset] * xk;
            }
        }
    }

    /// Refresh every replicated separator cell from its owner.
    pub fn fill_duplicate_cells<T: FloatT>(&self, blocks: &mut [Matrix<T>]) {
        for dup in &self.dup_cells {
            let v = blocks[dup.src_clique].data[dup.src_offset];
            blocks[dup.dst_clique].data[dup.dst_offset] = v;
        }
    }

    /// Allocate one zeroed dense block per clique.
    pub fn allocate_blocks<T: FloatT>(&self) -> Vec<Matrix<T>> {
        self.cliques
            .iter()
            .map(|c| Matrix::zeros((c.nblk(), c.nblk())))
            .collect()
    }
}

fn position_in(clique: &Clique, p: usize) -> usize {
    clique
        .rows_perm
        .binary_search(&p)
        .unwrap_or_else(|_| panic!("index {} is not a member of the clique", p))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sparsefact::{SparseFactorSettingsBuilder, SparseFactorization};

    // arrow pattern: dense final column plus the diagonal.  With the
    // natural ordering the factor has no fill and the supernode partition
    // is {0}, {1}, {2, 3}
    fn arrow_fact() -> SparseFactorization<f64> {
        let pattern = CscMatrix::from_triu_triplets(
            4,
            vec![
                (0, 0, 2.),
                (1, 1, 2.),
                (2, 2, 2.),
                (3, 3, 4.),
                (0, 3, 1.),
                (1, 3, 1.),
                (2, 3, 1.),
            ],
        );
        let opts = SparseFactorSettingsBuilder::default()
            .perm((0..4).collect::<Vec<_>>())
            .build()
            .unwrap();
        SparseFactorization::new(&pattern, Some(opts)).unwrap()
    }

    #[test]
    fn test_arrow_decomposition() {
        let dec = CliqueDecomposition::new(&arrow_fact());

        assert_eq!(dec.n_cliques(), 3);
        assert_eq!(dec.cliques[0].rows_perm, vec![0, 3]);
        assert_eq!(dec.cliques[1].rows_perm, vec![1, 3]);
        assert_eq!(dec.cliques[2].rows_perm, vec![2, 3]);
        assert_eq!(dec.cliques[2].width, 2);

        // the (3,3) cell is owned by the clique of column 3's supernode and
        // duplicated into the two others
        assert_eq!(dec.dup_cells.len(), 2);
        assert_eq!(dec.owner_cell(3, 3), (2, 3));
    }

    #[test]
    fn test_scatter_records_cover_columns() {
        let dec = CliqueDecomposition::new(&arrow_fact());

        // column 3 of the filled pattern touches every row
        let rows: Vec<usize> = dec.col_scatter[3].iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);

        // column 0 touches rows {0, 3}
        let rows: Vec<usize> = dec.col_scatter[0].iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 3]);

        // deterministic sort: row, then clique, then offset
        for records in &dec.col_scatter {
            let keys: Vec<_> = records.iter().map(|r| (r.row, r.clique, r.offset)).collect();
            let mut sorted = keys.clone();
            sorted.sort();
            assert_eq!(keys, sorted);
        }
    }

    #[test]
    fn test_apply_and_gather_roundtrip() {
        let dec = CliqueDecomposition::new(&arrow_fact());
        let mut blocks = dec.allocate_blocks::<f64>();

        // store the symmetric matrix with 2 on the diagonal and 1 in the
        // arrow column by scattering full columns, as the engine does
        for k in 0..4 {
            let mut col = vec![0.0; 4];
            col[k] = if k == 3 { 4.0 } else { 2.0 };
            if k == 3 {
                col[0] = 1.0;
                col[1] = 1.0;
                col[2] = 1.0;
            } else {
                col[3] = 1.0;
            }
            for rec in &dec.col_scatter[k] {
                blocks[rec.clique].data[rec.offset] = col[rec.row];
            }
        }
        dec.fill_duplicate_cells(&mut blocks);

        let mut out = vec![0.0; 4];
        dec.gather_column(&blocks, 3, &mut out);
        assert_eq!(out, vec![1., 1., 1., 4.]);

        let mut y = vec![0.0; 4];
        dec.apply_sym(&blocks, &[1., 1., 1., 1.], &mut y);
        assert_eq!(y, vec![3., 3., 3., 7.]);
    }
}
