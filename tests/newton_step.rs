#![allow(non_snake_case)]
use sdpcore::newton::*;
use sdpcore::algebra::*;

// a 2x2 semidefinite block with an infeasible starting point: C differs
// from Z = I and A1•X differs from b1
fn infeasible_data() -> InputData<f64> {
    let structure = BlockStructure::new(vec![BlockDim {
        kind: BlockKind::Semidefinite,
        dim: 2,
    }]);
    let C = SdpMatrix::new(CscMatrix::from_triu_triplets(
        2,
        vec![(0, 0, 2.), (0, 1, 0.5), (1, 1, 1.)],
    ))
    .unwrap();
    let A1 = SdpMatrix::new(CscMatrix::identity(2)).unwrap();

    InputData::new(
        structure,
        vec![1.0],
        vec![BlockMatrix::Sdp(C)],
        vec![vec![BlockMatrix::Sdp(A1)]],
    )
    .unwrap()
}

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

#[test]
fn test_newton_step_reduces_residuals() {
    let data = infeasible_data();
    let settings = NewtonSettings::<f64>::default();

    let mut iterate = Iterate::new(&data).unwrap();
    let mut residuals = Residuals::new(data.m);
    residuals.update(&data, &mut iterate);

    let p0 = residuals.primal_norm;
    let d0 = residuals.dual_norm;
    assert!(p0 > 0.1);
    assert!(d0 > 0.1);

    // the feasibility equations are linear, so a full step removes them
    let target_mu = 0.5 * residuals.mu;
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

    iterate.update(1.0, 1.0, &settings).unwrap();
    residuals.update(&data, &mut iterate);

    assert!(residuals.primal_norm < 1e-10 * p0.max(1.0));
    assert!(residuals.dual_norm < 1e-10 * d0.max(1.0));
    assert!(residuals.primal_relative() < 1e-10);
    assert!(residuals.dual_relative() < 1e-10);
}

#[test]
fn test_newton_step_mixed_blocks() {
    let data = mixed_data();
    let settings = NewtonSettings::<f64>::default();

    let mut iterate = Iterate::new(&data).unwrap();
    let mut residuals = Residuals::new(data.m);
    residuals.update(&data, &mut iterate);
    let (p0, d0) = (residuals.primal_norm, residuals.dual_norm);

    let target_mu = 0.5 * residuals.mu;
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

    iterate.update(1.0, 1.0, &settings).unwrap();
    residuals.update(&data, &mut iterate);

    assert!(residuals.primal_norm < 1e-10 * p0.max(1.0));
    assert!(residuals.dual_norm < 1e-10 * d0.max(1.0));
}

#[test]
fn test_corrector_reuses_factorization() {
    let data = mixed_data();
    let settings = NewtonSettings::<f64>::default();

    let mut iterate = Iterate::new(&data).unwrap();
    let mut residuals = Residuals::new(data.m);
    residuals.update(&data, &mut iterate);

    let mut solver = DirectionSolver::new(&data, &settings).unwrap();
    solver
        .compute_direction(
            &data,
            &mut iterate,
            0.5 * residuals.mu,
            Phase::Unknown,
            StepMode::Predictor,
            &settings,
        )
        .unwrap();
    let dy_pred = iterate.dy.clone();

    // the corrector rebuilds only the right-hand side; with a different
    // centering target it must produce a different dy through the same
    // factorized system
    solver
        .compute_direction(
            &data,
            &mut iterate,
            0.1 * residuals.mu,
            Phase::Unknown,
            StepMode::Corrector,
            &settings,
        )
        .unwrap();

    assert!(iterate.dy.dist(&dy_pred) > 1e-8);
}

#[test]
fn test_update_zero_step_is_noop() {
    let data = infeasible_data();
    let settings = NewtonSettings::<f64>::default();
    let mut iterate = Iterate::new(&data).unwrap();

    let mu_before = iterate.mu();
    let y_before = iterate.y.clone();

    // both lengths below threshold: stagnation error, nothing mutated
    assert!(matches!(
        iterate.update(0.0, 0.0, &settings),
        Err(NewtonError::StepLengthCollapse)
    ));
    assert_eq!(iterate.y, y_before);
    assert_eq!(iterate.mu(), mu_before);
}

#[test]
fn test_final_solution_identity_start() {
    let data = infeasible_data();
    let mut iterate = Iterate::new(&data).unwrap();
    for blk in iterate.blocks.iter_mut() {
        blk.refresh_factorizations().unwrap();
    }

    let solution = iterate.make_final_solution();
    match &solution.blocks[0] {
        BlockSolution::Semidefinite { x, z } => {
            for i in 0..2 {
                for j in 0..2 {
                    let expect = if i == j { 1.0 } else { 0.0 };
                    assert!((x[(i, j)] - expect).abs() < 1e-12);
                    assert!((z[(i, j)] - expect).abs() < 1e-12);
                }
            }
        }
        _ => panic!("expected a semidefinite block"),
    }
}

#[test]
fn test_step_bound_operators() {
    let data = infeasible_data();
    let settings = NewtonSettings::<f64>::default();

    let mut iterate = Iterate::new(&data).unwrap();
    let mut residuals = Residuals::new(data.m);
    residuals.update(&data, &mut iterate);

    let mut solver = DirectionSolver::new(&data, &settings).unwrap();
    solver
        .compute_direction(
            &data,
            &mut iterate,
            0.5 * residuals.mu,
            Phase::Unknown,
            StepMode::Predictor,
            &settings,
        )
        .unwrap();

    if let ConeBlockState::Semidefinite(sb) = &iterate.blocks[0] {
        let dual = min_eigenvalue(&sb.dual_step_operator(), &settings);
        let primal = min_eigenvalue(&sb.primal_step_operator(), &settings);
        assert!(dual.bound.is_finite());
        assert!(primal.bound.is_finite());

        // Z = I here, so the dual operator is dZ itself and the admissible
        // full step keeps Z + dZ positive definite whenever bound > −1
        if dual.bound > -1.0 {
            let mut ztrial = sb.zmat.clone();
            for (v, dv) in ztrial.nzval.iter_mut().zip(&sb.dzmat.nzval) {
                *v += dv;
            }
            // 2x2 positive definiteness by hand
            let a = ztrial.nzval[0];
            let (b, c) = (ztrial.nzval[1], ztrial.nzval[2]);
            assert!(a > 0.0 && a * c - b * b > 0.0);
        }
    } else {
        panic!("expected a semidefinite block");
    }
}
