//! End-to-end solver tests: anchored membranes, hypar form finding, the
//! plain force density path, and failure surfaces.

use ndarray::Array2;
use taut::solver::{solve, solve_once};
use taut::types::*;

// ─────────────────────────────────────────────────────────────
//  Helpers
// ─────────────────────────────────────────────────────────────

fn coords(rows: &[[f64; 3]]) -> Array2<f64> {
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), 3), flat).unwrap()
}

fn assert_close(a: f64, b: f64, tol: f64, what: &str) {
    assert!(
        (a - b).abs() <= tol,
        "{what}: {a} vs {b} (diff {:.3e}, tol {tol:.1e})",
        (a - b).abs(),
    );
}

/// Five-vertex cross net: four fixed corners, one loaded free centre,
/// four cables with unit force density.
fn cross_net() -> Problem {
    let mut vertex_loads = Array2::zeros((5, 3));
    vertex_loads[[4, 2]] = -1.0;
    Problem {
        vertices: coords(&[
            [-1.0, -1.0, 0.0],
            [1.0, -1.0, 0.0],
            [1.0, 1.0, 0.0],
            [-1.0, 1.0, 0.0],
            [0.0, 0.0, 0.0],
        ]),
        fixed: vec![0, 1, 2, 3],
        edges: vec![(0, 4), (1, 4), (2, 4), (3, 4)],
        faces: vec![],
        goals: Goals {
            fd_goals: Some(vec![1.0; 4]),
            ..Goals::default()
        },
        loads: Loads {
            vertex_loads: Some(vertex_loads),
            ..Loads::default()
        },
    }
}

/// 3 x 3 grid hypar: alternating corner heights, anchored corners,
/// elevated force density goals on the boundary cables, isotropic stress
/// goals on the four quad faces.
fn hypar_net() -> Problem {
    let mut rows = Vec::new();
    for j in 0..3 {
        for i in 0..3 {
            rows.push([i as f64, j as f64, 0.5]);
        }
    }
    // Corner saddle: two opposite corners down, two up.
    rows[0][2] = 0.0;
    rows[2][2] = 1.0;
    rows[8][2] = 0.0;
    rows[6][2] = 1.0;

    let edges = vec![
        (0, 1), (1, 2), (3, 4), (4, 5), (6, 7), (7, 8), // along x
        (0, 3), (3, 6), (1, 4), (4, 7), (2, 5), (5, 8), // along y
    ];
    let boundary = [
        (0usize, 1usize), (1, 2), (6, 7), (7, 8), (0, 3), (3, 6), (2, 5), (5, 8),
    ];
    let fd_goals = edges
        .iter()
        .map(|e| if boundary.contains(e) { 2.0 } else { 0.0 })
        .collect();

    Problem {
        vertices: coords(&rows),
        fixed: vec![0, 2, 6, 8],
        edges,
        faces: vec![
            vec![0, 1, 4, 3],
            vec![1, 2, 5, 4],
            vec![3, 4, 7, 6],
            vec![4, 5, 8, 7],
        ],
        goals: Goals {
            fd_goals: Some(fd_goals),
            ..Goals::default()
        },
        loads: Loads::default(),
    }
}

// ─────────────────────────────────────────────────────────────
//  Scenario: fully anchored flat membrane
// ─────────────────────────────────────────────────────────────

/// A flat quad with every corner fixed already satisfies an isotropic
/// goal: one iteration, near-zero stress residual, geometry untouched.
#[test]
fn anchored_flat_quad_converges_immediately() {
    let problem = Problem {
        vertices: coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]),
        fixed: vec![0, 1, 2, 3],
        edges: vec![],
        faces: vec![vec![0, 1, 2, 3]],
        goals: Goals::default(),
        loads: Loads::default(),
    };

    let result = solve(&problem, &SolverOptions::default()).unwrap();

    assert!(result.converged, "flat anchored quad must converge");
    assert_eq!(result.iterations, 1);
    assert!(
        result.stress_residual < 1e-9,
        "stress residual should vanish, got {:.3e}",
        result.stress_residual,
    );
    for v in 0..4 {
        for d in 0..3 {
            assert_eq!(
                result.xyz[[v, d]],
                problem.vertices[[v, d]],
                "anchored vertex {v} must not move",
            );
        }
    }

    // Isotropic stress output: both principal values at the goal level.
    match result.stresses {
        Some(StressOutput::Pk2 { ref amplitudes }) => {
            assert_close(amplitudes[0][0], 1.0, 1e-9, "sigma x");
            assert_close(amplitudes[0][1], 1.0, 1e-9, "sigma y");
            assert_close(amplitudes[0][2], 0.0, 1e-9, "tau xy");
        }
        ref other => panic!("expected Pk2 output, got {other:?}"),
    }
}

/// Principal output in the global frame keeps unit eigenvectors.
#[test]
fn principal_global_output_is_unit_length() {
    let problem = Problem {
        vertices: coords(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]),
        fixed: vec![0, 1, 2, 3],
        edges: vec![],
        faces: vec![vec![0, 1, 2, 3]],
        goals: Goals::default(),
        loads: Loads::default(),
    };
    let options = SolverOptions {
        stress_mode: StressMode::PrincipalGlobal,
        ..SolverOptions::default()
    };
    let result = solve(&problem, &options).unwrap();

    match result.stresses {
        Some(StressOutput::PrincipalGlobal { values, directions }) => {
            assert_close(values[0][0], 1.0, 1e-9, "principal 1");
            assert_close(values[0][1], 1.0, 1e-9, "principal 2");
            for v in &directions[0] {
                let len = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
                assert_close(len, 1.0, 1e-12, "eigenvector length");
            }
        }
        other => panic!("expected PrincipalGlobal output, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────
//  Scenario: plain force density method
// ─────────────────────────────────────────────────────────────

/// One-shot solve of the cross net has the closed-form answer: the centre
/// drops to the corner average plus load over summed densities.
#[test]
fn plain_fd_cross_net_analytic() {
    let problem = cross_net();
    let result = solve_once(&problem, StressMode::Skip).unwrap();

    assert!(result.stresses.is_none());
    assert_close(result.xyz[[4, 0]], 0.0, 1e-12, "centre x");
    assert_close(result.xyz[[4, 1]], 0.0, 1e-12, "centre y");
    assert_close(result.xyz[[4, 2]], -0.25, 1e-12, "centre z");
    for v in 0..4 {
        for d in 0..3 {
            assert_eq!(result.xyz[[v, d]], problem.vertices[[v, d]]);
        }
    }

    // Forces follow the stretched cable length.
    let length = (1.0_f64 + 1.0 + 0.0625).sqrt();
    for (k, &f) in result.forces.iter().enumerate() {
        assert_close(f, length, 1e-12, &format!("cable {k} force"));
        assert_close(result.lengths[k], length, 1e-12, &format!("cable {k} length"));
    }

    // Residual of the previous iterate: the unbalanced load at the centre,
    // reactions at the corners.
    assert_close(result.residuals[[4, 2]], -1.0, 1e-12, "centre residual");
    assert_close(result.residuals[[0, 0]], 1.0, 1e-12, "corner 0 reaction x");
    assert_close(result.residuals[[0, 1]], 1.0, 1e-12, "corner 0 reaction y");
}

/// `solve_once` and `solve` with a budget of one are the same inner solve,
/// bit for bit.
#[test]
fn single_iteration_alias_is_identical() {
    let problem = cross_net();
    let once = solve_once(&problem, StressMode::Skip).unwrap();
    let options = SolverOptions {
        stress_mode: StressMode::Skip,
        max_iterations: 1,
        ..SolverOptions::default()
    };
    let budget_one = solve(&problem, &options).unwrap();

    for v in 0..5 {
        for d in 0..3 {
            assert_eq!(once.xyz[[v, d]], budget_one.xyz[[v, d]]);
            assert_eq!(once.residuals[[v, d]], budget_one.residuals[[v, d]]);
        }
    }
    assert_eq!(once.forces, budget_one.forces);
    assert_eq!(once.iterations, budget_one.iterations);
}

// ─────────────────────────────────────────────────────────────
//  Scenario: hypar form finding
// ─────────────────────────────────────────────────────────────

/// The hypar net settles into a saddle within the default budget, driven
/// by the stress residual alone.
#[test]
fn hypar_converges_to_saddle() {
    let problem = hypar_net();
    let options = SolverOptions {
        stress_mode: StressMode::Pk2,
        displacement_tolerance: 1e-9,
        ..SolverOptions::default()
    };
    let result = solve(&problem, &options).unwrap();

    eprintln!(
        "hypar: {} iterations, stress residual {:.4e}, displacement {:.4e}",
        result.iterations, result.stress_residual, result.displacement_residual,
    );
    assert!(
        result.converged,
        "hypar must converge within {} iterations (stress residual {:.4e})",
        options.max_iterations, result.stress_residual,
    );
    assert!(result.stress_residual < 1e-2);

    // Anchors untouched, all coordinates finite.
    for &v in &problem.fixed {
        assert_eq!(result.xyz[[v, 2]], problem.vertices[[v, 2]]);
    }
    for v in 0..9 {
        for d in 0..3 {
            assert!(result.xyz[[v, d]].is_finite());
        }
    }

    // Saddle shape: the centre hangs between the corner heights, and the
    // boundary midpoints sag toward their adjacent corners.
    let centre_z = result.xyz[[4, 2]];
    assert_close(centre_z, 0.5, 1e-6, "centre stays on the saddle axis");
    for v in [1, 3, 5, 7] {
        assert!(
            result.xyz[[v, 2]] > -0.1 && result.xyz[[v, 2]] < 1.1,
            "boundary vertex {v} z = {} out of range",
            result.xyz[[v, 2]],
        );
    }
}

/// With tolerances pinned to zero the budget runs out: the driver reports
/// the exhausted state instead of erroring.
#[test]
fn exhausted_budget_is_not_an_error() {
    let problem = hypar_net();
    let options = SolverOptions {
        stress_mode: StressMode::Skip,
        stress_tolerance: 0.0,
        displacement_tolerance: 0.0,
        max_iterations: 3,
        ..SolverOptions::default()
    };
    let result = solve(&problem, &options).unwrap();

    assert!(!result.converged);
    assert_eq!(result.iterations, 3);
    assert!(result.stress_residual.is_finite());
    assert!(result.displacement_residual.is_finite());
}

// ─────────────────────────────────────────────────────────────
//  Failure surfaces
// ─────────────────────────────────────────────────────────────

/// A mesh with no anchors is singular and must error, not return junk.
#[test]
fn no_fixed_vertices_is_an_error() {
    let mut problem = cross_net();
    problem.fixed.clear();
    let err = solve(&problem, &SolverOptions::default()).unwrap_err();
    assert!(
        matches!(err, TautError::NoFixedVertices),
        "expected NoFixedVertices, got {err}",
    );
}

#[test]
fn shape_validation_rejects_bad_input() {
    // Goal count mismatch.
    let mut problem = cross_net();
    problem.goals.fd_goals = Some(vec![1.0; 3]);
    assert!(matches!(
        solve(&problem, &SolverOptions::default()).unwrap_err(),
        TautError::Shape(_),
    ));

    // Degenerate edge.
    let mut problem = cross_net();
    problem.edges[0] = (4, 4);
    assert!(matches!(
        solve(&problem, &SolverOptions::default()).unwrap_err(),
        TautError::Shape(_),
    ));

    // Face index out of range.
    let mut problem = cross_net();
    problem.faces = vec![vec![0, 1, 9]];
    assert!(matches!(
        solve(&problem, &SolverOptions::default()).unwrap_err(),
        TautError::Shape(_),
    ));
}
