//! Integration tests for spindle-math.

use faer::Mat;
use spindle_math::chebyshev::{clenshaw_curtis, ChebyshevBasis};
use spindle_math::dense::{flatten_columns, inverse, unflatten_columns, DenseLu};
use spindle_math::gauss::gauss_legendre;

// ─── Dense LU Tests ───────────────────────────────────────────

#[test]
fn lu_solve_known_system() {
    // [2 1; 1 3] x = [3; 5] → x = [4/5; 7/5]
    let mut a = Mat::<f64>::zeros(2, 2);
    a[(0, 0)] = 2.0;
    a[(0, 1)] = 1.0;
    a[(1, 0)] = 1.0;
    a[(1, 1)] = 3.0;

    let mut lu = DenseLu::new();
    lu.factorize(&a).unwrap();
    let x = lu.solve(&[3.0, 5.0]).unwrap();

    assert!((x[0] - 0.8).abs() < 1e-12, "x0 = {}", x[0]);
    assert!((x[1] - 1.4).abs() < 1e-12, "x1 = {}", x[1]);
}

#[test]
fn lu_not_factorized_is_error() {
    let lu = DenseLu::new();
    assert!(lu.solve(&[1.0]).is_err());
    assert!(!lu.is_factorized());
}

#[test]
fn lu_rejects_non_square() {
    let a = Mat::<f64>::zeros(2, 3);
    let mut lu = DenseLu::new();
    assert!(lu.factorize(&a).is_err());
}

#[test]
fn lu_solve_reproduces_rhs() {
    // A (A⁻¹ b) = b for a well-conditioned random-ish matrix.
    let n = 12;
    let a = Mat::from_fn(n, n, |i, j| {
        if i == j {
            4.0
        } else {
            1.0 / (1.0 + (i as f64 - j as f64).abs())
        }
    });
    let b: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();

    let mut lu = DenseLu::new();
    lu.factorize(&a).unwrap();
    let x = lu.solve(&b).unwrap();

    for i in 0..n {
        let mut ax = 0.0;
        for j in 0..n {
            ax += a[(i, j)] * x[j];
        }
        assert!((ax - b[i]).abs() < 1e-10, "row {i}: Ax = {ax}, b = {}", b[i]);
    }
}

#[test]
fn dense_inverse_roundtrip() {
    let n = 6;
    let a = Mat::from_fn(n, n, |i, j| if i == j { 3.0 } else { 0.5 / (1 + i + j) as f64 });
    let a_inv = inverse(&a).unwrap();

    for i in 0..n {
        for j in 0..n {
            let mut prod = 0.0;
            for k in 0..n {
                prod += a[(i, k)] * a_inv[(k, j)];
            }
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!(
                (prod - expected).abs() < 1e-10,
                "(A·A⁻¹)[{i},{j}] = {prod}"
            );
        }
    }
}

#[test]
fn flatten_unflatten_roundtrip() {
    let m = Mat::from_fn(3, 4, |i, j| (i * 10 + j) as f64);
    let flat = flatten_columns(&m);
    assert_eq!(flat.len(), 12);
    assert_eq!(flat[0], m[(0, 0)]);
    assert_eq!(flat[4], m[(1, 1)]);

    let back = unflatten_columns(&flat);
    for i in 0..3 {
        for j in 0..4 {
            assert_eq!(back[(i, j)], m[(i, j)]);
        }
    }
}

// ─── Chebyshev Tests ──────────────────────────────────────────

#[test]
fn chebyshev_rejects_degenerate_input() {
    assert!(ChebyshevBasis::new(4, 1.0).is_err());
    assert!(ChebyshevBasis::new(8, 0.0).is_err());
}

#[test]
fn chebyshev_nodes_span_interval() {
    let basis = ChebyshevBasis::new(16, 2.5).unwrap();
    assert!((basis.s[0] - 0.0).abs() < 1e-14);
    assert!((basis.s[15] - 2.5).abs() < 1e-12);
    for k in 1..16 {
        assert!(basis.s[k] > basis.s[k - 1], "nodes must ascend");
    }
}

#[test]
fn chebyshev_first_derivative_of_cubic() {
    // d/ds (s³) = 3s², exact for a spectral basis with n ≥ 4.
    let basis = ChebyshevBasis::new(12, 2.0).unwrap();
    let f: Vec<f64> = basis.s.iter().map(|&s| s * s * s).collect();

    for i in 0..basis.n {
        let mut df = 0.0;
        for j in 0..basis.n {
            df += basis.d1[(i, j)] * f[j];
        }
        let expected = 3.0 * basis.s[i] * basis.s[i];
        assert!(
            (df - expected).abs() < 1e-9,
            "node {i}: d1 f = {df}, expected {expected}"
        );
    }
}

#[test]
fn chebyshev_fourth_derivative_of_quartic() {
    // d⁴/ds⁴ (s⁴) = 24 everywhere.
    let basis = ChebyshevBasis::new(14, 1.0).unwrap();
    let f: Vec<f64> = basis.s.iter().map(|&s| s.powi(4)).collect();

    for i in 0..basis.n {
        let mut d4f = 0.0;
        for j in 0..basis.n {
            d4f += basis.d4[(i, j)] * f[j];
        }
        assert!(
            (d4f - 24.0).abs() < 1e-6,
            "node {i}: d4 f = {d4f}, expected 24"
        );
    }
}

#[test]
fn chebyshev_derivative_of_constant_is_zero() {
    let basis = ChebyshevBasis::new(10, 3.0).unwrap();
    for i in 0..basis.n {
        let mut df = 0.0;
        for j in 0..basis.n {
            df += basis.d1[(i, j)];
        }
        assert!(df.abs() < 1e-12, "row sum of D1 at {i} = {df}");
    }
}

#[test]
fn clenshaw_curtis_integrates_polynomials() {
    // ∫_{-1}^{1} t² dt = 2/3, ∫ t³ dt = 0.
    let big_n = 16;
    let w = clenshaw_curtis(big_n);
    let t: Vec<f64> = (0..=big_n)
        .map(|k| (std::f64::consts::PI * k as f64 / big_n as f64).cos())
        .collect();

    let int2: f64 = t.iter().zip(&w).map(|(&tk, &wk)| wk * tk * tk).sum();
    let int3: f64 = t.iter().zip(&w).map(|(&tk, &wk)| wk * tk * tk * tk).sum();

    assert!((int2 - 2.0 / 3.0).abs() < 1e-12, "∫t² = {int2}");
    assert!(int3.abs() < 1e-12, "∫t³ = {int3}");
}

#[test]
fn chebyshev_weights_integrate_arclength() {
    // Scaled weights integrate 1 over [0, L] to L.
    let basis = ChebyshevBasis::new(20, 3.0).unwrap();
    let total: f64 = basis.weights.iter().sum();
    assert!((total - 3.0).abs() < 1e-12, "Σw = {total}");
}

// ─── Gauss–Legendre Tests ─────────────────────────────────────

#[test]
fn gauss_legendre_weights_sum_to_two() {
    for n in [2, 5, 16, 33] {
        let (_, w) = gauss_legendre(n);
        let total: f64 = w.iter().sum();
        assert!((total - 2.0).abs() < 1e-12, "n = {n}: Σw = {total}");
    }
}

#[test]
fn gauss_legendre_exact_for_high_degree() {
    // n-point rule is exact through degree 2n−1: ∫_{-1}^{1} t⁶ dt = 2/7 with n = 4.
    let (x, w) = gauss_legendre(4);
    let int: f64 = x.iter().zip(&w).map(|(&t, &wk)| wk * t.powi(6)).sum();
    assert!((int - 2.0 / 7.0).abs() < 1e-12, "∫t⁶ = {int}");
}

#[test]
fn gauss_legendre_nodes_ascend_and_are_symmetric() {
    let (x, _) = gauss_legendre(7);
    for i in 1..x.len() {
        assert!(x[i] > x[i - 1]);
    }
    for i in 0..x.len() {
        assert!((x[i] + x[x.len() - 1 - i]).abs() < 1e-12);
    }
}
