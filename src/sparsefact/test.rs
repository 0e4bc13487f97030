#![allow(non_snake_case)]
use super::*;

// Sym(A) = [4  1  2]
//          [1  5  0]
//          [2  0  6]
fn test_matrix() -> CscMatrix<f64> {
    CscMatrix::from_triu_triplets(
        3,
        vec![(0, 0, 4.), (0, 1, 1.), (1, 1, 5.), (0, 2, 2.), (2, 2, 6.)],
    )
}

#[test]
fn test_factor_and_solve() {
    let A = test_matrix();
    let mut F = SparseFactorization::new(&A, None).unwrap();
    F.set_values(&A.nzval);
    F.refactor().unwrap();

    // A*x for x = [1, 2, 3]
    let mut b = vec![12., 11., 20.];
    let mut work = vec![0.; 3];
    F.solve(&mut b, &mut work);
    assert!(b.dist(&[1., 2., 3.]) < 1e-12);
}

#[test]
fn test_refactor_with_new_values() {
    let A = test_matrix();
    let mut F = SparseFactorization::new(&A, None).unwrap();

    // same pattern, scaled values
    let mut vals = A.nzval.clone();
    vals.scale(2.0);
    F.set_values(&vals);
    F.refactor().unwrap();

    let mut b = vec![24., 22., 40.];
    let mut work = vec![0.; 3];
    F.solve(&mut b, &mut work);
    assert!(b.dist(&[1., 2., 3.]) < 1e-12);
}

#[test]
fn test_not_positive_definite() {
    // Sym(A) = [1 3; 3 1] is indefinite
    let A = CscMatrix::from_triu_triplets(2, vec![(0, 0, 1.), (0, 1, 3.), (1, 1, 1.)]);
    let mut F = SparseFactorization::new(&A, None).unwrap();
    F.set_values(&A.nzval);
    assert!(matches!(
        F.refactor(),
        Err(SparseFactorError::NotPositiveDefinite(_))
    ));
}

#[test]
fn test_rejects_bad_structure() {
    // lower triangle entry
    let A = CscMatrix::new(2, 2, vec![0, 2, 3], vec![0, 1, 1], vec![1., 1., 1.]);
    assert!(matches!(
        SparseFactorization::new(&A, None),
        Err(SparseFactorError::NotUpperTriangular)
    ));

    // empty column
    let A = CscMatrix::<f64>::new(2, 2, vec![0, 1, 1], vec![0], vec![1.]);
    assert!(matches!(
        SparseFactorization::new(&A, None),
        Err(SparseFactorError::EmptyColumn)
    ));
}

#[test]
fn test_install_column_matches_refactor() {
    // factor numerically, then rebuild an installed copy from the computed
    // columns of the first and check that solves agree
    let A = test_matrix();
    let mut F = SparseFactorization::new(&A, None).unwrap();
    F.set_values(&A.nzval);
    F.refactor().unwrap();

    let mut G = F.clone_symbolic();
    for j in 0..3 {
        let rng = F.lpattern().colptr[j]..F.lpattern().colptr[j + 1];
        let lvals = F.lpattern().nzval[rng].to_vec();
        let d = {
            let mut b = vec![0.; 3];
            let mut work = vec![0.; 3];
            // recover D[j] by a probe solve: (A⁻¹)ⱼⱼ = (L⁻ᵀD⁻¹L⁻¹)ⱼⱼ is
            // awkward, so read it off through a unit vector product instead
            b[F.perm()[j]] = 1.0;
            F.half_mul(&b, &mut work);
            // work = D^{1/2}LᵀP eⱼ, whose jth entry is D^{1/2}[j]
            work[j] * work[j]
        };
        G.install_column(j, &lvals, d);
    }
    G.finalize_install();

    let mut b1 = vec![3., -1., 7.];
    let mut b2 = b1.clone();
    let mut work = vec![0.; 3];
    F.solve(&mut b1, &mut work);
    G.solve(&mut b2, &mut work);
    assert!(b1.dist(&b2) < 1e-12);
}

#[test]
fn test_half_ops_compose() {
    let A = test_matrix();
    let mut F = SparseFactorization::new(&A, None).unwrap();
    F.set_values(&A.nzval);
    F.refactor().unwrap();

    let x = vec![1., -2., 1.];
    let mut t = vec![0.; 3];
    let mut y = vec![0.; 3];
    let mut work = vec![0.; 3];

    // G·Gᵀ·x = A·x
    F.half_mul(&x, &mut t);
    F.half_mul_t(&t, &mut y, &mut work);
    assert!(y.dist(&[4., -9., 8.]) < 1e-12);

    // G⁻ᵀ·G⁻¹ ... applied the other way is A⁻¹
    F.half_solve(&y, &mut t);
    F.half_solve_t(&t, &mut y, &mut work);
    assert!(y.dist(&x) < 1e-12);
}
