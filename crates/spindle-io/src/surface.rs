//! Reference surface grids and operator builders.
//!
//! Production runs load body/periphery data produced by an offline
//! precompute pipeline. These generators produce the same named arrays
//! from analytic geometry, which is what every test in the workspace
//! builds its entities from.
//!
//! Sphere grids are Gauss–Legendre in latitude × uniform in longitude,
//! so quadrature of smooth surface fields is spectrally accurate.

use faer::Mat;
use spindle_kernels::stresslet_matrix;
use spindle_math::dense::inverse;
use spindle_math::gauss::gauss_legendre;
use spindle_types::{SpindleError, SpindleResult};

use crate::precompute::PrecomputeData;

/// Discretized closed surface: positions, outward unit normals, and
/// quadrature weights.
#[derive(Debug, Clone)]
pub struct SurfaceGeometry {
    /// 3×n node positions.
    pub positions: Mat<f64>,
    /// 3×n outward unit normals.
    pub normals: Mat<f64>,
    /// Per-node quadrature weights (surface measure).
    pub weights: Vec<f64>,
}

impl SurfaceGeometry {
    pub fn node_count(&self) -> usize {
        self.positions.ncols()
    }
}

/// Quadrature grid on a sphere of the given radius, centered at the
/// origin. `n_theta` Gauss–Legendre latitudes × `n_phi` uniform
/// longitudes.
pub fn sphere_surface(n_theta: usize, n_phi: usize, radius: f64) -> SurfaceGeometry {
    assert!(n_theta >= 2 && n_phi >= 3, "sphere grid too coarse");
    assert!(radius > 0.0);

    let (mu, w_mu) = gauss_legendre(n_theta);
    let n = n_theta * n_phi;
    let dphi = 2.0 * std::f64::consts::PI / n_phi as f64;

    let mut positions = Mat::<f64>::zeros(3, n);
    let mut normals = Mat::<f64>::zeros(3, n);
    let mut weights = Vec::with_capacity(n);

    for (it, (&cos_t, &wt)) in mu.iter().zip(&w_mu).enumerate() {
        let sin_t = (1.0 - cos_t * cos_t).sqrt();
        for ip in 0..n_phi {
            // Half-cell offset keeps longitudes from aligning across
            // latitude rings.
            let phi = dphi * (ip as f64 + 0.5);
            let k = it * n_phi + ip;

            let nx = sin_t * phi.cos();
            let ny = sin_t * phi.sin();
            let nz = cos_t;

            positions[(0, k)] = radius * nx;
            positions[(1, k)] = radius * ny;
            positions[(2, k)] = radius * nz;
            normals[(0, k)] = nx;
            normals[(1, k)] = ny;
            normals[(2, k)] = nz;
            weights.push(radius * radius * wt * dphi);
        }
    }

    SurfaceGeometry {
        positions,
        normals,
        weights,
    }
}

/// Pack a body surface into the named arrays `Body` loads:
/// `node_positions_ref`, `node_normals_ref`, `node_weights`, and
/// optionally `nucleation_sites_ref`.
pub fn body_precompute(geometry: &SurfaceGeometry, nucleation_sites: Option<&Mat<f64>>) -> PrecomputeData {
    let mut data = PrecomputeData::new();
    data.insert_matrix("node_positions_ref", &geometry.positions);
    data.insert_matrix("node_normals_ref", &geometry.normals);
    data.insert_vector("node_weights", &geometry.weights);
    if let Some(sites) = nucleation_sites {
        data.insert_matrix("nucleation_sites_ref", sites);
    }
    data
}

/// Build the periphery precompute bundle for a spherical shell:
/// geometry with inward normals plus the dense shell operator and its
/// inverse, under the keys `Periphery` loads.
///
/// The shell operator is the completed interior double-layer equation
/// M = −I/2 + D + N, with D the zero-diagonal stresslet operator and
/// N_ij = n̂_i n̂_jᵀ w_j the complementary rank completion. Production
/// pipelines with quadrature-adapted singular schemes supply their own
/// M and M⁻¹ through the same keys.
pub fn periphery_precompute(
    n_theta: usize,
    n_phi: usize,
    radius: f64,
    eta: f64,
    reg: f64,
    eps: f64,
) -> SpindleResult<PrecomputeData> {
    let sphere = sphere_surface(n_theta, n_phi, radius);
    let n = sphere.node_count();

    // Inward-facing normals: the fluid is inside the shell.
    let normals = Mat::from_fn(3, n, |i, j| -sphere.normals[(i, j)]);

    let d = stresslet_matrix(&sphere.positions, &normals, eta, reg, eps);

    let mut m = Mat::<f64>::zeros(3 * n, 3 * n);
    for i in 0..3 * n {
        for j in 0..3 * n {
            m[(i, j)] = d[(i, j)];
        }
        m[(i, i)] -= 0.5;
    }
    for i in 0..n {
        for j in 0..n {
            for a in 0..3 {
                for b in 0..3 {
                    m[(3 * i + a, 3 * j + b)] +=
                        normals[(a, i)] * normals[(b, j)] * sphere.weights[j];
                }
            }
        }
    }

    let m_inv = inverse(&m).map_err(SpindleError::Precompute)?;

    let mut data = PrecomputeData::new();
    data.insert_matrix("node_positions", &sphere.positions);
    data.insert_matrix("node_normals", &normals);
    data.insert_vector("quadrature_weights", &sphere.weights);
    data.insert_matrix("stresslet_plus_complementary", &m);
    data.insert_matrix("M_inv", &m_inv);
    Ok(data)
}
