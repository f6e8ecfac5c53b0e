//! Integration tests for spindle-fiber.

use faer::Mat;
use glam::DVec3;
use spindle_fiber::{EndCondition, Fiber, FiberContainer};
use spindle_kernels::DirectSum;

const ETA: f64 = 1.0;
const REG: f64 = 5.0e-3;
const EPS: f64 = 1.0e-10;
const DT: f64 = 0.005;

fn test_fiber(n: usize) -> Fiber {
    Fiber::new(n, 1.0, 0.1, 500.0, 1.0e-3).unwrap()
}

// ─── Fiber Construction Tests ─────────────────────────────────

#[test]
fn fiber_rejects_too_few_points() {
    assert!(Fiber::new(4, 1.0, 0.1, 500.0, 1e-3).is_err());
    assert!(Fiber::new(8, -1.0, 0.1, 500.0, 1e-3).is_err());
}

#[test]
fn fiber_starts_straight_with_unit_tangent() {
    let f = test_fiber(16);
    assert_eq!(f.solution_size(), 64);

    // Straight along x̂: first derivative is exactly x̂, higher
    // derivatives vanish (linear function, spectral differentiation).
    for i in 0..f.n {
        assert!((f.xs[(0, i)] - 1.0).abs() < 1e-10, "xs_x at {i}");
        assert!(f.xs[(1, i)].abs() < 1e-10);
        assert!(f.xs[(2, i)].abs() < 1e-10);
        for c in 0..3 {
            assert!(f.xss[(c, i)].abs() < 1e-7, "xss comp {c} at node {i}");
        }
    }
}

#[test]
fn fiber_translate_moves_all_nodes() {
    let mut f = test_fiber(8);
    let before = f.x[(0, 3)];
    f.translate(DVec3::new(1.0, -2.0, 0.5));
    assert_eq!(f.x[(0, 3)], before + 1.0);
    assert_eq!(f.x[(1, 3)], -2.0);
    assert_eq!(f.x[(2, 3)], 0.5);
}

#[test]
fn fiber_weights_integrate_length() {
    let f = Fiber::new(12, 2.0, 0.1, 500.0, 1e-3).unwrap();
    let total: f64 = f.weights().iter().sum();
    assert!((total - 2.0).abs() < 1e-12, "Σw = {total}");
}

// ─── Local Operator Tests ─────────────────────────────────────

#[test]
fn straight_fiber_steady_state_solution() {
    // Zero flow, zero external force, zero BC targets: the solve must
    // return the current shape with zero tension.
    let mut f = test_fiber(16);
    f.form_linear_operator(DT, ETA).unwrap();

    let zero = Mat::<f64>::zeros(3, f.n);
    f.compute_rhs(DT, &zero, &zero);

    let solution = f.apply_preconditioner(&f.rhs).unwrap();

    // The fourth-order spectral operator is badly conditioned, so the
    // steady state is recovered to solver tolerance, not machine eps.
    for i in 0..f.n {
        for c in 0..3 {
            assert!(
                (solution[3 * i + c] - f.x[(c, i)]).abs() < 1e-5,
                "position {c} at node {i}: {} vs {}",
                solution[3 * i + c],
                f.x[(c, i)]
            );
        }
    }
    for i in 0..f.n {
        assert!(
            solution[3 * f.n + i].abs() < 1e-4,
            "tension at node {i}: {}",
            solution[3 * f.n + i]
        );
    }
}

#[test]
fn local_operator_self_consistency() {
    // Solving then re-applying the operator reproduces the configured
    // RHS to solver tolerance.
    let mut f = test_fiber(12);
    f.form_linear_operator(DT, ETA).unwrap();

    let flow = Mat::from_fn(3, f.n, |c, j| 0.01 * (c as f64 + 1.0) * (j as f64).sin());
    let f_ext = Mat::from_fn(3, f.n, |c, _| if c == 2 { 0.5 } else { 0.0 });
    f.compute_rhs(DT, &flow, &f_ext);

    let solution = f.apply_preconditioner(&f.rhs).unwrap();
    let back = f.matvec(&solution);

    // Residual scales with the operator norm (the D⁴ block), not with
    // the individual RHS entries.
    let scale = 1.0 + f.rhs.iter().fold(0.0_f64, |m, &r| m.max(r.abs()));
    for (i, (&b, &r)) in back.iter().zip(&f.rhs).enumerate() {
        assert!(
            (b - r).abs() < 1e-6 * scale,
            "row {i}: A·x = {b}, rhs = {r}"
        );
    }
}

#[test]
fn preconditioner_inverts_matvec_for_isolated_fiber() {
    let mut f = test_fiber(10);
    f.form_linear_operator(DT, ETA).unwrap();

    let x: Vec<f64> = (0..f.solution_size())
        .map(|i| 0.1 + 0.01 * (i as f64).cos())
        .collect();
    let round_trip = f.apply_preconditioner(&f.matvec(&x)).unwrap();

    for i in 0..x.len() {
        assert!(
            (round_trip[i] - x[i]).abs() < 1e-4 * (1.0 + x[i].abs()),
            "entry {i}: {} vs {}",
            round_trip[i],
            x[i]
        );
    }
}

#[test]
fn operator_must_be_rebuilt_after_timestep_change() {
    // The operator depends on dt through the momentum diagonal; two
    // factorizations with different dt give different solutions for the
    // same RHS.
    let mut f = test_fiber(8);
    let zero = Mat::<f64>::zeros(3, f.n);

    f.form_linear_operator(0.005, ETA).unwrap();
    f.compute_rhs(0.005, &zero, &zero);
    let rhs = f.rhs.clone();
    let a_entry_small_dt = f.a[(3 * 2, 3 * 2)];

    f.form_linear_operator(0.05, ETA).unwrap();
    let a_entry_large_dt = f.a[(3 * 2, 3 * 2)];

    assert!(
        (a_entry_small_dt - a_entry_large_dt).abs() > 1.0,
        "momentum diagonal must scale with 1/dt: {a_entry_small_dt} vs {a_entry_large_dt}"
    );
    // The stale RHS no longer matches: keep both sides rebuilt together.
    assert_eq!(rhs.len(), f.rhs.len());
}

// ─── Boundary Condition Tests ─────────────────────────────────

#[test]
fn bc_rectangular_switches_minus_end_to_link_driven() {
    let mut f = test_fiber(10);
    f.set_bc_minus(
        (EndCondition::Force, EndCondition::Torque),
        (DVec3::ZERO, DVec3::ZERO),
    );
    f.form_linear_operator(DT, ETA).unwrap();
    let zero = Mat::<f64>::zeros(3, f.n);
    f.compute_rhs(DT, &zero, &zero);

    let v_link = DVec3::new(0.0, 0.0, 0.25);
    f.apply_bc_rectangular(DT, v_link, DVec3::ZERO).unwrap();

    assert_eq!(
        f.bc_minus,
        (EndCondition::Velocity, EndCondition::AngularVelocity)
    );

    // Velocity row: X(0)/dt = v + Xⁿ(0)/dt, so the solved end moves by
    // v·dt.
    let solution = f.apply_preconditioner(&f.rhs).unwrap();
    let end_z = solution[2];
    let expected = f.x[(2, 0)] + v_link.z * DT;
    assert!(
        (end_z - expected).abs() < 1e-6,
        "minus end z: {end_z} vs {expected}"
    );
}

#[test]
fn position_bc_pins_end_exactly() {
    let mut f = test_fiber(10);
    let target = DVec3::new(0.1, 0.2, -0.3);
    f.set_bc_minus(
        (EndCondition::Position, EndCondition::Angle),
        (target, DVec3::X),
    );
    f.form_linear_operator(DT, ETA).unwrap();
    let zero = Mat::<f64>::zeros(3, f.n);
    f.compute_rhs(DT, &zero, &zero);

    let solution = f.apply_preconditioner(&f.rhs).unwrap();
    assert!((solution[0] - target.x).abs() < 1e-6);
    assert!((solution[1] - target.y).abs() < 1e-6);
    assert!((solution[2] - target.z).abs() < 1e-6);
}

// ─── Container Tests ──────────────────────────────────────────

fn two_fiber_container() -> FiberContainer {
    let mut f1 = test_fiber(8);
    let mut f2 = test_fiber(8);
    f1.translate(DVec3::new(0.0, 0.0, 0.0));
    f2.translate(DVec3::new(0.0, 10.0, 0.0));
    let mut fc = FiberContainer::new(vec![f1, f2]);
    fc.update_derivatives();
    fc.update_stokeslets(ETA, REG, EPS);
    fc
}

#[test]
fn container_sizes() {
    let fc = two_fiber_container();
    assert_eq!(fc.len(), 2);
    assert_eq!(fc.local_node_count(), 16);
    assert_eq!(fc.local_solution_size(), 64);
}

#[test]
fn container_matvec_matches_per_fiber_operators() {
    let mut fc = two_fiber_container();
    fc.form_linear_operators(DT, ETA).unwrap();

    let x: Vec<f64> = (0..fc.local_solution_size())
        .map(|i| (i as f64 * 0.01).sin())
        .collect();
    let v_zero = Mat::<f64>::zeros(3, fc.local_node_count());

    let res = fc.matvec(&x, &v_zero);
    let lhs0 = fc.fibers[0].matvec(&x[0..32]);
    let lhs1 = fc.fibers[1].matvec(&x[32..64]);

    for i in 0..32 {
        assert!((res[i] - lhs0[i]).abs() < 1e-13);
        assert!((res[32 + i] - lhs1[i]).abs() < 1e-13);
    }
}

#[test]
fn container_preconditioner_inverts_matvec_without_coupling() {
    let mut fc = two_fiber_container();
    fc.form_linear_operators(DT, ETA).unwrap();

    let x: Vec<f64> = (0..fc.local_solution_size())
        .map(|i| 0.05 * ((i % 17) as f64 - 8.0))
        .collect();
    let v_zero = Mat::<f64>::zeros(3, fc.local_node_count());

    let round_trip = fc.apply_preconditioner(&fc.matvec(&x, &v_zero)).unwrap();
    for i in 0..x.len() {
        assert!(
            (round_trip[i] - x[i]).abs() < 1e-4 * (1.0 + x[i].abs()),
            "entry {i}"
        );
    }
}

#[test]
fn single_fiber_flow_at_own_nodes_is_fully_subtracted() {
    // With one fiber, the shared pass minus the self term must vanish
    // at the fiber's own nodes.
    let mut f = test_fiber(8);
    f.update_derivatives();
    f.update_stokeslet(ETA, REG, EPS);
    let fc = FiberContainer::new(vec![f]);

    let forces = fc.generate_constant_force(1.0);
    let mut fmm = DirectSum::new(REG, EPS);
    let no_ext = Mat::<f64>::zeros(3, 0);

    let vel = fc.flow(&forces, &no_ext, ETA, &mut fmm).unwrap();
    for j in 0..fc.local_node_count() {
        for c in 0..3 {
            assert!(
                vel[(c, j)].abs() < 1e-12,
                "residual self-flow at node {j} comp {c}: {}",
                vel[(c, j)]
            );
        }
    }
}

#[test]
fn inter_fiber_flow_matches_direct_summation() {
    let fc = two_fiber_container();
    let forces = fc.generate_constant_force(2.0);
    let mut fmm = DirectSum::new(REG, EPS);

    // Observe at a point far from both fibers.
    let observer = Mat::from_fn(3, 1, |i, _| if i == 0 { 30.0 } else { 0.0 });
    let vel = fc.flow(&forces, &observer, ETA, &mut fmm).unwrap();
    assert_eq!(vel.ncols(), fc.local_node_count() + 1);

    // Direct check: weighted forces from all nodes, summed Oseen.
    let positions = fc.node_positions();
    let mut expected = [0.0; 3];
    let mut k = 0;
    for f in &fc.fibers {
        for (j, &w) in f.weights().iter().enumerate() {
            let d = [
                30.0 - positions[(0, k + j)],
                -positions[(1, k + j)],
                -positions[(2, k + j)],
            ];
            let r2: f64 = d.iter().map(|x| x * x).sum();
            let r = r2.sqrt();
            let fq = [0.0, 0.0, -2.0 * w];
            let rf = d[0] * fq[0] + d[1] * fq[1] + d[2] * fq[2];
            let factor = 1.0 / (8.0 * std::f64::consts::PI * ETA);
            for c in 0..3 {
                expected[c] += factor / r * fq[c] + factor / (r * r2) * d[c] * rf;
            }
        }
        k += f.n;
    }

    let obs_col = fc.local_node_count();
    for c in 0..3 {
        assert!(
            (vel[(c, obs_col)] - expected[c]).abs() < 1e-12,
            "observer comp {c}: {} vs {}",
            vel[(c, obs_col)],
            expected[c]
        );
    }
}

#[test]
fn fiber_force_recovery_is_linear_in_solution() {
    let mut fc = two_fiber_container();
    fc.form_linear_operators(DT, ETA).unwrap();

    let x1: Vec<f64> = (0..fc.local_solution_size()).map(|i| i as f64 * 0.001).collect();
    let x2: Vec<f64> = (0..fc.local_solution_size()).map(|i| (i as f64).cos()).collect();
    let sum: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| a + b).collect();

    let f1 = fc.apply_fiber_force(&x1);
    let f2 = fc.apply_fiber_force(&x2);
    let f_sum = fc.apply_fiber_force(&sum);

    for j in 0..fc.local_node_count() {
        for c in 0..3 {
            assert!(
                (f_sum[(c, j)] - f1[(c, j)] - f2[(c, j)]).abs() < 1e-9,
                "linearity at node {j} comp {c}"
            );
        }
    }
}
