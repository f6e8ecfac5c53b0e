//! Far-field multipole evaluator contract.
//!
//! The solver performs one shared far-field pass per operator
//! application, evaluated through a [`MultipoleBackend`]. The backend's
//! internal expansion state is rebuilt on every call and is shared
//! across invocations, so the lifecycle is strict:
//!
//! 1. `clear(kernel)` — drop any expansion coefficients for `kernel`
//! 2. `evaluate(kernel, ...)` — build the tree for this source set and
//!    evaluate at the targets
//!
//! `evaluate` on a backend that was not cleared for that kernel since
//! the last evaluation is an error, never a silent reuse of stale
//! coefficients. Concurrent evaluations against one backend are not
//! supported; callers serialize access.
//!
//! [`DirectSum`] is the in-tree reference backend (all-pairs
//! summation). A hierarchical backend wraps an external multipole
//! library behind the same trait.

use faer::Mat;
use spindle_types::{SpindleError, SpindleResult};

/// Kernel choices for the far-field pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StokesKernel {
    /// Plain Stokes velocity: 3 components per target.
    Velocity,
    /// Velocity plus pressure: 4 components per target, 4-component
    /// single-layer sources.
    PressureVelocity,
}

impl StokesKernel {
    /// Rows per single-layer source column.
    pub fn single_layer_stride(self) -> usize {
        match self {
            StokesKernel::Velocity => 3,
            StokesKernel::PressureVelocity => 4,
        }
    }

    /// Rows per double-layer source column (the 3×3 density⊗normal
    /// tensor, row-major).
    pub fn double_layer_stride(self) -> usize {
        9
    }

    /// Rows per target column. For `PressureVelocity` the first three
    /// rows are velocity and the last is pressure.
    pub fn target_stride(self) -> usize {
        match self {
            StokesKernel::Velocity => 3,
            StokesKernel::PressureVelocity => 4,
        }
    }
}

/// Far-field evaluator trait.
pub trait MultipoleBackend: Send {
    /// Invalidate expansion state for `kernel`. Must be called before
    /// every [`evaluate`](Self::evaluate) with that kernel.
    fn clear(&mut self, kernel: StokesKernel);

    /// Evaluate the far field of the given single- and double-layer
    /// sources at the targets. Returns a `target_stride`×n_trg matrix.
    ///
    /// `sl_values` is `single_layer_stride`×n_sl, `dl_values` is
    /// 9×n_dl. Either source set may be empty (0 columns).
    #[allow(clippy::too_many_arguments)]
    fn evaluate(
        &mut self,
        kernel: StokesKernel,
        sl_points: &Mat<f64>,
        sl_values: &Mat<f64>,
        dl_points: &Mat<f64>,
        dl_values: &Mat<f64>,
        targets: &Mat<f64>,
        eta: f64,
    ) -> SpindleResult<Mat<f64>>;
}

/// All-pairs reference backend.
///
/// O(N²) but exact up to the kernel regularization; the contract
/// oracle for hierarchical backends and the default for problem sizes
/// where tree construction does not pay for itself.
pub struct DirectSum {
    /// Regularization width for near-singular pairs.
    reg: f64,
    /// Singularity cutoff distance.
    eps: f64,
    /// Kernel this backend is armed for; consumed by `evaluate`.
    armed: Option<StokesKernel>,
}

impl DirectSum {
    pub fn new(reg: f64, eps: f64) -> Self {
        Self {
            reg,
            eps,
            armed: None,
        }
    }
}

impl Default for DirectSum {
    fn default() -> Self {
        Self::new(
            spindle_types::constants::DEFAULT_REGULARIZATION,
            spindle_types::constants::DEFAULT_SINGULARITY_EPS,
        )
    }
}

impl MultipoleBackend for DirectSum {
    fn clear(&mut self, kernel: StokesKernel) {
        self.armed = Some(kernel);
    }

    fn evaluate(
        &mut self,
        kernel: StokesKernel,
        sl_points: &Mat<f64>,
        sl_values: &Mat<f64>,
        dl_points: &Mat<f64>,
        dl_values: &Mat<f64>,
        targets: &Mat<f64>,
        eta: f64,
    ) -> SpindleResult<Mat<f64>> {
        if self.armed.take() != Some(kernel) {
            return Err(SpindleError::InvalidConfig(format!(
                "multipole backend evaluated for {kernel:?} without a preceding clear"
            )));
        }

        let n_sl = sl_points.ncols();
        let n_dl = dl_points.ncols();
        if sl_values.ncols() != n_sl || (n_sl > 0 && sl_values.nrows() != kernel.single_layer_stride()) {
            return Err(SpindleError::InvalidConfig(format!(
                "single-layer values must be {}×{n_sl}, got {}×{}",
                kernel.single_layer_stride(),
                sl_values.nrows(),
                sl_values.ncols()
            )));
        }
        if dl_values.ncols() != n_dl || (n_dl > 0 && dl_values.nrows() != kernel.double_layer_stride()) {
            return Err(SpindleError::InvalidConfig(format!(
                "double-layer values must be 9×{n_dl}, got {}×{}",
                dl_values.nrows(),
                dl_values.ncols()
            )));
        }

        let n_trg = targets.ncols();
        let mut out = Mat::<f64>::zeros(kernel.target_stride(), n_trg);

        let sl_factor = 1.0 / (8.0 * std::f64::consts::PI * eta);
        let dl_factor = -3.0 / (4.0 * std::f64::consts::PI * eta);
        let p_sl_factor = 1.0 / (4.0 * std::f64::consts::PI);
        let p_dl_factor = eta / (2.0 * std::f64::consts::PI);
        let reg2 = self.reg * self.reg;
        let with_pressure = kernel == StokesKernel::PressureVelocity;

        for t in 0..n_trg {
            // Single layer (point forces).
            for s in 0..n_sl {
                let dx = targets[(0, t)] - sl_points[(0, s)];
                let dy = targets[(1, t)] - sl_points[(1, s)];
                let dz = targets[(2, t)] - sl_points[(2, s)];
                let dr2 = dx * dx + dy * dy + dz * dz;
                if dr2 == 0.0 {
                    continue;
                }
                let dr = dr2.sqrt();
                let (fr, gr) = if dr > self.eps {
                    (sl_factor / dr, sl_factor / (dr * dr2))
                } else {
                    let inv = 1.0 / (dr2 + reg2).sqrt();
                    (sl_factor * inv, sl_factor * inv * inv * inv)
                };

                let fx = sl_values[(0, s)];
                let fy = sl_values[(1, s)];
                let fz = sl_values[(2, s)];
                let rf = dx * fx + dy * fy + dz * fz;

                out[(0, t)] += fr * fx + gr * dx * rf;
                out[(1, t)] += fr * fy + gr * dy * rf;
                out[(2, t)] += fr * fz + gr * dz * rf;

                if with_pressure {
                    out[(3, t)] += p_sl_factor * rf / (dr * dr2);
                }
            }

            // Double layer (density ⊗ normal tensors).
            for s in 0..n_dl {
                let dx = targets[(0, t)] - dl_points[(0, s)];
                let dy = targets[(1, t)] - dl_points[(1, s)];
                let dz = targets[(2, t)] - dl_points[(2, s)];
                let mut r_norm = (dx * dx + dy * dy + dz * dz).sqrt();
                if r_norm == 0.0 {
                    continue;
                }
                if r_norm < self.eps {
                    r_norm = (r_norm * r_norm + reg2).sqrt();
                }
                let r2 = r_norm * r_norm;
                let r_inv3 = 1.0 / (r2 * r_norm);
                let r_inv5 = r_inv3 / r2;

                // d·D·d and tr(D) for the row-major 3×3 tensor.
                let d = [dx, dy, dz];
                let mut ddd = 0.0;
                let mut trace = 0.0;
                for a in 0..3 {
                    trace += dl_values[(3 * a + a, s)];
                    for b in 0..3 {
                        ddd += d[a] * dl_values[(3 * a + b, s)] * d[b];
                    }
                }

                let coeff = dl_factor * ddd * r_inv5;
                out[(0, t)] += coeff * dx;
                out[(1, t)] += coeff * dy;
                out[(2, t)] += coeff * dz;

                if with_pressure {
                    out[(3, t)] += p_dl_factor * (-3.0 * ddd * r_inv5 + trace * r_inv3);
                }
            }
        }

        Ok(out)
    }
}

/// Far-field Stokes velocity: clear + evaluate with the plain kernel.
pub fn stokes_velocity_fmm(
    backend: &mut dyn MultipoleBackend,
    sl_points: &Mat<f64>,
    sl_values: &Mat<f64>,
    dl_points: &Mat<f64>,
    dl_values: &Mat<f64>,
    targets: &Mat<f64>,
    eta: f64,
) -> SpindleResult<Mat<f64>> {
    backend.clear(StokesKernel::Velocity);
    backend.evaluate(
        StokesKernel::Velocity,
        sl_points,
        sl_values,
        dl_points,
        dl_values,
        targets,
        eta,
    )
}

/// Far-field Stokes velocity + pressure: clear + evaluate with the
/// extended kernel.
pub fn stokes_pvel_fmm(
    backend: &mut dyn MultipoleBackend,
    sl_points: &Mat<f64>,
    sl_values: &Mat<f64>,
    dl_points: &Mat<f64>,
    dl_values: &Mat<f64>,
    targets: &Mat<f64>,
    eta: f64,
) -> SpindleResult<Mat<f64>> {
    backend.clear(StokesKernel::PressureVelocity);
    backend.evaluate(
        StokesKernel::PressureVelocity,
        sl_points,
        sl_values,
        dl_points,
        dl_values,
        targets,
        eta,
    )
}
