//! Single-layer (Oseen tensor) kernel.
//!
//! G(r) = f(r) I + g(r) r rᵀ with f = 1/(8πη r), g = 1/(8πη r³).
//! Below the singularity cutoff, r is replaced by sqrt(r² + reg²);
//! coincident points contribute zero (the self term is always handled by
//! the caller's local operator).

use faer::Mat;

/// Velocity at each target induced by point forces at the sources:
/// u(x_t) = Σ_s G(x_s − x_t) q_s. Returns a 3×n_trg matrix.
pub fn oseen_contract(
    r_src: &Mat<f64>,
    r_trg: &Mat<f64>,
    density: &Mat<f64>,
    eta: f64,
    reg: f64,
    eps: f64,
) -> Mat<f64> {
    let n_src = r_src.ncols();
    let n_trg = r_trg.ncols();
    debug_assert_eq!(density.ncols(), n_src);

    let factor = 1.0 / (8.0 * std::f64::consts::PI * eta);
    let reg2 = reg * reg;
    let mut res = Mat::<f64>::zeros(3, n_trg);

    for i_trg in 0..n_trg {
        for i_src in 0..n_src {
            let dx = r_src[(0, i_src)] - r_trg[(0, i_trg)];
            let dy = r_src[(1, i_src)] - r_trg[(1, i_trg)];
            let dz = r_src[(2, i_src)] - r_trg[(2, i_trg)];
            let dr2 = dx * dx + dy * dy + dz * dz;

            if dr2 == 0.0 {
                continue;
            }
            let dr = dr2.sqrt();

            let (fr, gr) = if dr > eps {
                (factor / dr, factor / (dr * dr2))
            } else {
                let denom_inv = 1.0 / (dr2 + reg2).sqrt();
                (factor * denom_inv, factor * denom_inv * denom_inv * denom_inv)
            };

            let qx = density[(0, i_src)];
            let qy = density[(1, i_src)];
            let qz = density[(2, i_src)];

            let rq = dx * qx + dy * qy + dz * qz;
            res[(0, i_trg)] += fr * qx + gr * dx * rq;
            res[(1, i_trg)] += fr * qy + gr * dy * rq;
            res[(2, i_trg)] += fr * qz + gr * dz * rq;
        }
    }

    res
}

/// Dense Oseen tensor between sources and targets, as a
/// (3·n_trg)×(3·n_src) block matrix. Blocks at coincident points are
/// zero.
pub fn oseen_matrix(
    r_src: &Mat<f64>,
    r_trg: &Mat<f64>,
    eta: f64,
    reg: f64,
    eps: f64,
) -> Mat<f64> {
    let n_src = r_src.ncols();
    let n_trg = r_trg.ncols();

    let factor = 1.0 / (8.0 * std::f64::consts::PI * eta);
    let reg2 = reg * reg;
    let mut g = Mat::<f64>::zeros(3 * n_trg, 3 * n_src);

    for i_src in 0..n_src {
        for i_trg in 0..n_trg {
            let dx = r_src[(0, i_src)] - r_trg[(0, i_trg)];
            let dy = r_src[(1, i_src)] - r_trg[(1, i_trg)];
            let dz = r_src[(2, i_src)] - r_trg[(2, i_trg)];
            let dr2 = dx * dx + dy * dy + dz * dz;

            if dr2 == 0.0 {
                continue;
            }
            let dr = dr2.sqrt();

            let (fr, gr) = if dr > eps {
                (factor / dr, factor / (dr * dr2))
            } else {
                let denom_inv = 1.0 / (dr2 + reg2).sqrt();
                (factor * denom_inv, factor * denom_inv * denom_inv * denom_inv)
            };

            let (r, c) = (3 * i_trg, 3 * i_src);
            g[(r, c)] = fr + gr * dx * dx;
            g[(r, c + 1)] = gr * dx * dy;
            g[(r, c + 2)] = gr * dx * dz;

            g[(r + 1, c)] = gr * dy * dx;
            g[(r + 1, c + 1)] = fr + gr * dy * dy;
            g[(r + 1, c + 2)] = gr * dy * dz;

            g[(r + 2, c)] = gr * dz * dx;
            g[(r + 2, c + 1)] = gr * dz * dy;
            g[(r + 2, c + 2)] = fr + gr * dz * dz;
        }
    }

    g
}
