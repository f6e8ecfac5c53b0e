//! Integration tests for spindle-io.

use faer::Mat;
use spindle_io::surface::{body_precompute, periphery_precompute, sphere_surface};
use spindle_io::PrecomputeData;
use spindle_types::SpindleError;

// ─── PrecomputeData Tests ─────────────────────────────────────

#[test]
fn precompute_insert_validates_shape() {
    let mut data = PrecomputeData::new();
    assert!(data.insert("a", 2, 3, vec![0.0; 6]).is_ok());
    assert!(data.insert("b", 2, 3, vec![0.0; 5]).is_err());
}

#[test]
fn precompute_missing_key_is_fatal() {
    let data = PrecomputeData::new();
    let err = data.matrix("node_positions_ref", 3).unwrap_err();
    assert!(matches!(err, SpindleError::Precompute(_)), "got {err:?}");
}

#[test]
fn precompute_wrong_row_count_is_fatal() {
    let mut data = PrecomputeData::new();
    data.insert("node_positions_ref", 4, 5, vec![0.0; 20]).unwrap();
    let err = data.matrix("node_positions_ref", 3).unwrap_err();
    assert!(matches!(err, SpindleError::Precompute(_)), "got {err:?}");
}

#[test]
fn precompute_matrix_roundtrip_is_exact() {
    let m = Mat::from_fn(3, 7, |i, j| (i + 10 * j) as f64 + 0.25);
    let mut data = PrecomputeData::new();
    data.insert_matrix("m", &m);

    let back = data.matrix_exact("m", 3, 7).unwrap();
    for i in 0..3 {
        for j in 0..7 {
            assert_eq!(back[(i, j)], m[(i, j)]);
        }
    }
}

#[test]
fn precompute_vector_accessor() {
    let mut data = PrecomputeData::new();
    data.insert_vector("w", &[1.0, 2.0, 3.0]);
    assert_eq!(data.vector("w").unwrap(), vec![1.0, 2.0, 3.0]);

    data.insert("not_a_vector", 2, 2, vec![0.0; 4]).unwrap();
    assert!(data.vector("not_a_vector").is_err());
}

// ─── Sphere Grid Tests ────────────────────────────────────────

#[test]
fn sphere_weights_sum_to_surface_area() {
    let radius = 1.7;
    let sphere = sphere_surface(8, 16, radius);
    let total: f64 = sphere.weights.iter().sum();
    let area = 4.0 * std::f64::consts::PI * radius * radius;
    assert!(
        (total - area).abs() < 1e-10 * area,
        "Σw = {total}, area = {area}"
    );
}

#[test]
fn sphere_nodes_lie_on_sphere_with_outward_normals() {
    let radius = 2.0;
    let sphere = sphere_surface(6, 12, radius);
    for k in 0..sphere.node_count() {
        let r = (0..3)
            .map(|i| sphere.positions[(i, k)].powi(2))
            .sum::<f64>()
            .sqrt();
        assert!((r - radius).abs() < 1e-12, "node {k}: |x| = {r}");

        let n_dot_r: f64 = (0..3)
            .map(|i| sphere.normals[(i, k)] * sphere.positions[(i, k)])
            .sum();
        assert!(
            (n_dot_r - radius).abs() < 1e-12,
            "node {k}: n̂·x = {n_dot_r}"
        );
    }
}

#[test]
fn sphere_quadrature_integrates_linear_fields_to_zero() {
    // ∫ x dS = 0 over a sphere; checks grid symmetry.
    let sphere = sphere_surface(10, 20, 1.0);
    for c in 0..3 {
        let int: f64 = (0..sphere.node_count())
            .map(|k| sphere.positions[(c, k)] * sphere.weights[k])
            .sum();
        assert!(int.abs() < 1e-10, "∫x_{c} dS = {int}");
    }
}

// ─── Precompute Bundle Tests ──────────────────────────────────

#[test]
fn body_precompute_carries_expected_keys() {
    let sphere = sphere_surface(4, 8, 0.5);
    let sites = Mat::from_fn(3, 2, |i, j| if i == j { 0.5 } else { 0.0 });
    let data = body_precompute(&sphere, Some(&sites));

    let n = sphere.node_count();
    assert!(data.matrix_exact("node_positions_ref", 3, n).is_ok());
    assert!(data.matrix_exact("node_normals_ref", 3, n).is_ok());
    assert_eq!(data.vector("node_weights").unwrap().len(), n);
    assert!(data.matrix_exact("nucleation_sites_ref", 3, 2).is_ok());
}

#[test]
fn body_precompute_sites_are_optional() {
    let sphere = sphere_surface(4, 8, 0.5);
    let data = body_precompute(&sphere, None);
    assert!(!data.contains("nucleation_sites_ref"));
}

#[test]
fn periphery_precompute_operator_inverse_is_consistent() {
    let data = periphery_precompute(4, 8, 3.0, 1.0, 5e-3, 1e-10).unwrap();
    let n = data.cols("node_positions").unwrap();
    let m = data.matrix_exact("stresslet_plus_complementary", 3 * n, 3 * n).unwrap();
    let m_inv = data.matrix_exact("M_inv", 3 * n, 3 * n).unwrap();

    // M · M⁻¹ = I.
    for i in 0..3 * n {
        for j in 0..3 * n {
            let mut prod = 0.0;
            for k in 0..3 * n {
                prod += m[(i, k)] * m_inv[(k, j)];
            }
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!(
                (prod - expected).abs() < 1e-8,
                "(M·M⁻¹)[{i},{j}] = {prod}"
            );
        }
    }
}

#[test]
fn periphery_normals_face_inward() {
    let data = periphery_precompute(4, 8, 2.0, 1.0, 5e-3, 1e-10).unwrap();
    let n = data.cols("node_positions").unwrap();
    let pos = data.matrix_exact("node_positions", 3, n).unwrap();
    let nrm = data.matrix_exact("node_normals", 3, n).unwrap();

    for k in 0..n {
        let dot: f64 = (0..3).map(|i| pos[(i, k)] * nrm[(i, k)]).sum();
        assert!(dot < 0.0, "node {k}: normal must point inward, n̂·x = {dot}");
    }
}

// ─── Checkpoint Tests ─────────────────────────────────────────

#[test]
fn checkpoint_state_is_minimal_and_serializable() {
    use glam::{DQuat, DVec3};
    use spindle_io::checkpoint::{BodyCheckpoint, FiberCheckpoint, SystemCheckpoint};

    let state = SystemCheckpoint {
        time: 1.25,
        step: 250,
        fibers: vec![FiberCheckpoint {
            positions: vec![[0.0, 0.0, 0.0], [0.5, 0.0, 0.0], [1.0, 0.0, 0.0]],
            length: 1.0,
        }],
        bodies: vec![BodyCheckpoint {
            position: DVec3::new(1.0, 2.0, 3.0),
            orientation: DQuat::from_xyzw(0.0, 0.0, 0.0, 1.0),
        }],
    };

    let encoded = toml::to_string(&state).unwrap();
    let recovered: SystemCheckpoint = toml::from_str(&encoded).unwrap();

    assert_eq!(recovered.step, 250);
    assert_eq!(recovered.fibers[0].positions.len(), 3);
    assert_eq!(recovered.bodies[0].position, DVec3::new(1.0, 2.0, 3.0));
}
