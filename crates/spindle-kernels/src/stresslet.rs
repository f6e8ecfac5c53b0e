//! Double-layer (stresslet) kernel contracted with surface normals.
//!
//! T block between nodes i and j:
//! S_ij = −3/(4πη) (d·n̂_j) d dᵀ / r⁵, d = x_i − x_j.
//!
//! Diagonal (self) blocks are zero by convention — the self term is
//! supplied by singularity subtraction in the body/periphery operators.

use faer::Mat;

/// Dense 3n×3n double-layer operator over one node set (sources are the
/// targets), contracted with the node normals.
pub fn stresslet_matrix(
    positions: &Mat<f64>,
    normals: &Mat<f64>,
    eta: f64,
    reg: f64,
    eps: f64,
) -> Mat<f64> {
    let n = positions.ncols();
    debug_assert_eq!(normals.ncols(), n);

    let factor = -3.0 / (4.0 * std::f64::consts::PI * eta);
    let reg2 = reg * reg;
    let mut s = Mat::<f64>::zeros(3 * n, 3 * n);

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }

            let dx = positions[(0, i)] - positions[(0, j)];
            let dy = positions[(1, i)] - positions[(1, j)];
            let dz = positions[(2, i)] - positions[(2, j)];
            let mut r_norm = (dx * dx + dy * dy + dz * dz).sqrt();
            if r_norm < eps {
                r_norm = (r_norm * r_norm + reg2).sqrt();
            }

            let r_inv5 = 1.0 / r_norm.powi(5);
            let dn = dx * normals[(0, j)] + dy * normals[(1, j)] + dz * normals[(2, j)];
            let coeff = factor * dn * r_inv5;

            let d = [dx, dy, dz];
            for a in 0..3 {
                for b in 0..3 {
                    s[(3 * i + a, 3 * j + b)] = coeff * d[a] * d[b];
                }
            }
        }
    }

    s
}

/// The stresslet contraction additionally applied to a density field:
/// u(x_i) = Σ_j −3/(4πη) (d·q_j)(d·n̂_j) d / r⁵. Returns 3×n.
pub fn stresslet_contract(
    positions: &Mat<f64>,
    normals: &Mat<f64>,
    density: &Mat<f64>,
    eta: f64,
    reg: f64,
    eps: f64,
) -> Mat<f64> {
    let n = positions.ncols();
    debug_assert_eq!(normals.ncols(), n);
    debug_assert_eq!(density.ncols(), n);

    let factor = -3.0 / (4.0 * std::f64::consts::PI * eta);
    let reg2 = reg * reg;
    let mut res = Mat::<f64>::zeros(3, n);

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }

            let dx = positions[(0, i)] - positions[(0, j)];
            let dy = positions[(1, i)] - positions[(1, j)];
            let dz = positions[(2, i)] - positions[(2, j)];
            let mut r_norm = (dx * dx + dy * dy + dz * dz).sqrt();
            if r_norm < eps {
                r_norm = (r_norm * r_norm + reg2).sqrt();
            }

            let r_inv5 = 1.0 / r_norm.powi(5);
            let dq = dx * density[(0, j)] + dy * density[(1, j)] + dz * density[(2, j)];
            let dn = dx * normals[(0, j)] + dy * normals[(1, j)] + dz * normals[(2, j)];
            let f0 = factor * dq * dn * r_inv5;

            res[(0, i)] += f0 * dx;
            res[(1, i)] += f0 * dy;
            res[(2, i)] += f0 * dz;
        }
    }

    res
}
