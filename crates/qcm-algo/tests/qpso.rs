//! Behavioral tests for the QPSO engine: best-fitness monotonicity, the
//! delta-potential-well degeneracies, and failure isolation.

use qcm_algo::{QpsoConfig, QpsoEngine};
use qcm_core::{QcmError, QcmResult};
use std::cell::RefCell;

fn sphere(x: &[f64]) -> QcmResult<f64> {
    Ok(x.iter().map(|v| v * v).sum())
}

#[test]
fn global_best_fitness_is_monotone_non_increasing() {
    let mut engine = QpsoEngine::new(QpsoConfig::new(20, 5, 0.75).with_seed(42)).unwrap();
    let mut fitness = |x: &[f64]| sphere(x);

    let mut previous = f64::INFINITY;
    for _ in 0..30 {
        engine.step(&mut fitness).unwrap();
        let current = engine.global_best_fitness();
        assert!(current <= previous, "global best regressed: {current} > {previous}");
        previous = current;
    }
    // Thirty sweeps on a sphere should have found something real.
    assert!(previous.is_finite());
}

#[test]
fn zero_beta_collapses_every_particle_onto_its_attractor() {
    // One particle: personal best and global best both start at the warm-start
    // position, so the attractor is that position for every phi. With beta = 0
    // the stochastic displacement vanishes and the particle cannot move.
    let start = vec![0.25, -0.5, 0.875];
    let config = QpsoConfig::new(1, 3, 0.0).with_seed(9);
    let mut engine = QpsoEngine::with_warm_start(config, vec![start.clone()]).unwrap();

    let seen = RefCell::new(Vec::new());
    let mut fitness = |x: &[f64]| {
        seen.borrow_mut().push(x.to_vec());
        sphere(x)
    };
    for _ in 0..10 {
        engine.step(&mut fitness).unwrap();
    }

    for position in seen.borrow().iter() {
        assert_eq!(position, &start);
    }
    assert_eq!(engine.global_best(), start.as_slice());
}

#[test]
fn origin_is_a_degenerate_fixed_point() {
    // Position, personal best, global best, and mbest all sit at the origin:
    // the attractor is zero and so is the |mbest - position| spread, so the
    // update is invariant for any beta, u, and sign draw.
    let config = QpsoConfig::new(1, 2, 7.5).with_seed(1234);
    let mut engine = QpsoEngine::with_warm_start(config, vec![vec![0.0, 0.0]]).unwrap();

    let seen = RefCell::new(Vec::new());
    let mut fitness = |x: &[f64]| {
        seen.borrow_mut().push(x.to_vec());
        sphere(x)
    };
    for _ in 0..25 {
        engine.step(&mut fitness).unwrap();
    }

    for position in seen.borrow().iter() {
        assert_eq!(position, &vec![0.0, 0.0]);
    }
}

#[test]
fn failed_particle_does_not_block_later_particles() {
    let mut engine = QpsoEngine::new(QpsoConfig::new(3, 2, 0.5).with_seed(5)).unwrap();

    let calls = RefCell::new(0usize);
    let mut fitness = |x: &[f64]| -> QcmResult<f64> {
        let call = {
            let mut c = calls.borrow_mut();
            *c += 1;
            *c
        };
        if call == 1 {
            // First particle's evaluator run diverges.
            Err(QcmError::Solver("power flow diverged".into()))
        } else {
            sphere(x)
        }
    };

    engine.step(&mut fitness).unwrap();
    // A succeeding particle in the same step must still claim the global best.
    assert!(engine.global_best_fitness().is_finite());
    assert_eq!(*calls.borrow(), 3);
}

#[test]
fn all_failures_leave_global_best_at_worst_case() {
    let mut engine = QpsoEngine::new(QpsoConfig::new(4, 2, 0.5).with_seed(6)).unwrap();
    let mut fitness =
        |_: &[f64]| -> QcmResult<f64> { Err(QcmError::Solver("always diverges".into())) };
    engine.step(&mut fitness).unwrap();
    assert_eq!(engine.global_best_fitness(), f64::INFINITY);
}

#[test]
fn huge_beta_never_produces_non_finite_positions() {
    // The floor on the log-domain draw keeps ln(1/u) finite, so even an
    // absurd beta cannot push a position to infinity.
    let mut engine = QpsoEngine::new(QpsoConfig::new(10, 4, 1e6).with_seed(77)).unwrap();
    let mut fitness = |x: &[f64]| -> QcmResult<f64> {
        assert!(x.iter().all(|v| v.is_finite()));
        sphere(x)
    };
    for _ in 0..50 {
        engine.step(&mut fitness).unwrap();
    }
}

#[test]
fn run_consumes_the_iteration_budget() {
    let config = QpsoConfig::new(6, 3, 0.5).with_iteration_budget(4).with_seed(2);
    let mut engine = QpsoEngine::new(config).unwrap();

    let calls = RefCell::new(0usize);
    let mut fitness = |x: &[f64]| {
        *calls.borrow_mut() += 1;
        sphere(x)
    };
    let best = engine.run(&mut fitness).unwrap().to_vec();

    assert_eq!(*calls.borrow(), 6 * 4);
    assert_eq!(best.len(), 3);
}

#[test]
fn warm_start_validates_shape() {
    let config = QpsoConfig::new(2, 3, 0.5);
    assert!(QpsoEngine::with_warm_start(config.clone(), vec![vec![0.0; 3]]).is_err());
    assert!(QpsoEngine::with_warm_start(config, vec![vec![0.0; 2], vec![0.0; 3]]).is_err());
}
