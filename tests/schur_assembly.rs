#![allow(non_snake_case)]
use sdpcore::algebra::*;
use sdpcore::newton::*;

// one 2x2 semidefinite block, C = I, A1 = I, b1 = 1
fn golden_data() -> InputData<f64> {
    let structure = BlockStructure::new(vec![BlockDim {
        kind: BlockKind::Semidefinite,
        dim: 2,
    }]);
    let eye = || {
        BlockMatrix::Sdp(SdpMatrix::new(CscMatrix::identity(2)).unwrap())
    };
    InputData::new(structure, vec![1.0], vec![eye()], vec![vec![eye()]]).unwrap()
}

// mixed problem: a 3x3 arrow-pattern semidefinite block and a 2d linear
// block, two constraints active on both
fn mixed_data() -> InputData<f64> {
    let structure = BlockStructure::new(vec![
        BlockDim {
            kind: BlockKind::Semidefinite,
            dim: 3,
        },
        BlockDim {
            kind: BlockKind::Linear,
            dim: 2,
        },
    ]);

    let C0 = SdpMatrix::new(CscMatrix::from_triu_triplets(
        3,
        vec![(0, 0, 2.), (1, 1, 1.5), (2, 2, 1.), (0, 2, 0.25), (1, 2, -0.5)],
    ))
    .unwrap();
    let C1 = SparseVector::new(2, vec![0, 1], vec![1., 1.]);

    let A10 = SdpMatrix::new(CscMatrix::from_triu_triplets(
        3,
        vec![(0, 0, 1.), (1, 1, 1.), (2, 2, 1.)],
    ))
    .unwrap();
    let A11 = SparseVector::new(2, vec![0], vec![1.]);

    let A20 = SdpMatrix::new(CscMatrix::from_triu_triplets(
        3,
        vec![(0, 0, 1.), (0, 2, 0.5), (2, 2, 1.)],
    ))
    .unwrap();
    let A21 = SparseVector::new(2, vec![1], vec![2.]);

    InputData::new(
        structure,
        vec![1.0, 0.5],
        vec![BlockMatrix::Sdp(C0), BlockMatrix::Diag(C1)],
        vec![
            vec![BlockMatrix::Sdp(A10), BlockMatrix::Diag(A11)],
            vec![BlockMatrix::Sdp(A20), BlockMatrix::Diag(A21)],
        ],
    )
    .unwrap()
}

fn settings_with(threads: usize, density_threshold: f64) -> NewtonSettings<f64> {
    NewtonSettingsBuilder::default()
        .worker_threads(threads)
        .schur_density_threshold(density_threshold)
        .build()
        .unwrap()
}

#[test]
fn test_golden_1x1_schur() {
    // At X = Z = I with C = I, A1 = I and b1 = 1:
    //   B_11 = A1•(X·A1·Z⁻¹) = tr(I) = 2
    //   rhs  = b1 − βμ·A1•Z⁻¹ = 1 − 2·βμ     (dual residual is zero)
    let data = golden_data();
    let settings = settings_with(1, 0.0); // dense
    let mut iterate = Iterate::new(&data).unwrap();
    let mut schur = SchurSystem::new(&data, &settings).unwrap();
    assert!(schur.is_dense());

    for blk in iterate.blocks.iter_mut() {
        blk.refresh_factorizations().unwrap();
    }
    let target_mu = 0.5;
    schur.assemble(
        &data,
        &iterate.blocks,
        target_mu,
        Phase::Unknown,
        StepMode::Predictor,
        &settings,
    );

    assert!((schur.entry(0, 0) - 2.0).abs() < 1e-12);
    assert!((schur.rhs[0] - (1.0 - 2.0 * target_mu)).abs() < 1e-12);

    // with target βμ = 0.5 the step is dy = 0, dZ = 0, dX = −0.5·I
    let mut solver = DirectionSolver::new(&data, &settings).unwrap();
    solver
        .compute_direction(
            &data,
            &mut iterate,
            target_mu,
            Phase::Unknown,
            StepMode::Predictor,
            &settings,
        )
        .unwrap();

    assert!(iterate.dy[0].abs() < 1e-12);
    if let ConeBlockState::Semidefinite(sb) = &iterate.blocks[0] {
        let mut col = vec![0.0; 2];
        for k in 0..2 {
            sb.dx_column(k, &mut col);
            for r in 0..2 {
                let expect = if r == k { -0.5 } else { 0.0 };
                assert!((col[r] - expect).abs() < 1e-12);
            }
        }
        assert!(sb.dzmat.nzval.iter().all(|v| v.abs() < 1e-12));
    } else {
        panic!("expected a semidefinite block");
    }
}

#[test]
fn test_dense_sparse_equivalence() {
    let data = mixed_data();
    let mut iterate = Iterate::new(&data).unwrap();
    for blk in iterate.blocks.iter_mut() {
        blk.refresh_factorizations().unwrap();
    }

    let dense_settings = settings_with(1, 0.0);
    let sparse_settings = settings_with(1, 1.0);

    let mut dense = SchurSystem::new(&data, &dense_settings).unwrap();
    let mut sparse = SchurSystem::new(&data, &sparse_settings).unwrap();
    assert!(dense.is_dense());
    assert!(!sparse.is_dense());

    let target_mu = 0.3;
    dense.assemble(
        &data,
        &iterate.blocks,
        target_mu,
        Phase::Unknown,
        StepMode::Predictor,
        &dense_settings,
    );
    sparse.assemble(
        &data,
        &iterate.blocks,
        target_mu,
        Phase::Unknown,
        StepMode::Predictor,
        &sparse_settings,
    );

    for j in 0..data.m {
        assert!((dense.rhs[j] - sparse.rhs[j]).abs() < 1e-12);
        for i in j..data.m {
            assert!(
                (dense.entry(i, j) - sparse.entry(i, j)).abs() < 1e-12,
                "entry ({},{}) differs",
                i,
                j
            );
        }
    }
}

#[test]
fn test_parallel_assembly_matches_serial() {
    let data = mixed_data();
    let mut iterate = Iterate::new(&data).unwrap();
    for blk in iterate.blocks.iter_mut() {
        blk.refresh_factorizations().unwrap();
    }

    let reference = {
        let settings = settings_with(1, 0.0);
        let mut schur = SchurSystem::new(&data, &settings).unwrap();
        schur.assemble(
            &data,
            &iterate.blocks,
            0.3,
            Phase::Unknown,
            StepMode::Predictor,
            &settings,
        );
        schur
    };

    for threads in [2, 4, 8] {
        let settings = settings_with(threads, 0.0);
        let mut schur = SchurSystem::new(&data, &settings).unwrap();
        schur.assemble(
            &data,
            &iterate.blocks,
            0.3,
            Phase::Unknown,
            StepMode::Predictor,
            &settings,
        );

        for j in 0..data.m {
            assert!((schur.rhs[j] - reference.rhs[j]).abs() < 1e-14);
            for i in j..data.m {
                assert!((schur.entry(i, j) - reference.entry(i, j)).abs() < 1e-14);
            }
        }
    }
}

#[test]
fn test_cholesky_roundtrip_4x4() {
    // fixed "random" SPD matrix: M = G·Gᵀ + I for a full 4x4 G
    #[rustfmt::skip]
    let G = Matrix::<f64>::from(
        &[[ 0.9, -0.3,  0.2,  0.7],
          [ 0.1,  1.1, -0.5,  0.4],
          [-0.6,  0.2,  0.8, -0.2],
          [ 0.3,  0.5, -0.1,  1.3]]);

    let mut M = Matrix::<f64>::identity(4);
    M.mul(&G, &G.t(), 1.0, 1.0);

    let mut eng = CholeskyEngine::<f64>::new(4);
    eng.factor(&M).unwrap();

    let mut P = Matrix::<f64>::zeros((4, 4));
    P.mul(&eng.L, &eng.L.t(), 1.0, 0.0);

    for (p, m) in P.data.iter().zip(&M.data) {
        assert!((p - m).abs() < 1e-12);
    }
}
