//! Collection-level fiber operators.
//!
//! The container owns every fiber on this process and aggregates their
//! local operators into the collection-scale matvec, preconditioner,
//! and RHS slices the system solver consumes. Per-fiber work (operator
//! formation, factorization, derivative refresh) has no shared mutable
//! state and runs as parallel loops.

use faer::Mat;
use glam::DVec3;
use rayon::prelude::*;
use spindle_kernels::{stokes_velocity_fmm, MultipoleBackend};
use spindle_types::SpindleResult;

use crate::fiber::{apply_dense, Fiber};

/// All fibers owned by this process.
pub struct FiberContainer {
    pub fibers: Vec<Fiber>,
}

impl FiberContainer {
    pub fn new(fibers: Vec<Fiber>) -> Self {
        Self { fibers }
    }

    pub fn len(&self) -> usize {
        self.fibers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fibers.is_empty()
    }

    /// Total collocation points across local fibers.
    pub fn local_node_count(&self) -> usize {
        self.fibers.iter().map(|f| f.n).sum()
    }

    /// Size of the local fiber block of the solution vector.
    pub fn local_solution_size(&self) -> usize {
        self.fibers.iter().map(|f| f.solution_size()).sum()
    }

    /// Per-fiber offsets into the solution block.
    fn solution_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.fibers.len());
        let mut acc = 0;
        for f in &self.fibers {
            offsets.push(acc);
            acc += f.solution_size();
        }
        offsets
    }

    /// Per-fiber offsets into node-indexed arrays.
    fn node_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.fibers.len());
        let mut acc = 0;
        for f in &self.fibers {
            offsets.push(acc);
            acc += f.n;
        }
        offsets
    }

    /// Concatenated node positions (3×total).
    pub fn node_positions(&self) -> Mat<f64> {
        let total = self.local_node_count();
        let mut out = Mat::<f64>::zeros(3, total);
        let mut k = 0;
        for f in &self.fibers {
            for j in 0..f.n {
                for c in 0..3 {
                    out[(c, k)] = f.x[(c, j)];
                }
                k += 1;
            }
        }
        out
    }

    /// Uniform force density of magnitude `scale` along −ẑ on every
    /// node (the standard sedimentation load in tests).
    pub fn generate_constant_force(&self, scale: f64) -> Mat<f64> {
        let total = self.local_node_count();
        Mat::from_fn(3, total, |i, _| if i == 2 { -scale } else { 0.0 })
    }

    /// Refresh derivative fields on every fiber. Required after any
    /// position change, before operators or flow.
    pub fn update_derivatives(&mut self) {
        self.fibers.par_iter_mut().for_each(Fiber::update_derivatives);
    }

    /// Refresh each fiber's dense self-interaction matrix.
    pub fn update_stokeslets(&mut self, eta: f64, reg: f64, eps: f64) {
        self.fibers
            .par_iter_mut()
            .for_each(|f| f.update_stokeslet(eta, reg, eps));
    }

    /// Rebuild and refactorize every local operator.
    pub fn form_linear_operators(&mut self, dt: f64, eta: f64) -> SpindleResult<()> {
        self.fibers
            .par_iter_mut()
            .try_for_each(|f| f.form_linear_operator(dt, eta))
    }

    /// Build per-fiber RHS from ambient flow and external force density
    /// (both 3×total, node-concatenated).
    pub fn compute_rhs(&mut self, dt: f64, flow: &Mat<f64>, f_external: &Mat<f64>) {
        let offsets = self.node_offsets();
        for (f, &off) in self.fibers.iter_mut().zip(&offsets) {
            let n = f.n;
            let flow_slice = Mat::from_fn(3, n, |c, j| flow[(c, off + j)]);
            let force_slice = Mat::from_fn(3, n, |c, j| f_external[(c, off + j)]);
            f.compute_rhs(dt, &flow_slice, &force_slice);
        }
    }

    /// Concatenated RHS for the fiber block.
    pub fn get_rhs(&self) -> Vec<f64> {
        let mut rhs = Vec::with_capacity(self.local_solution_size());
        for f in &self.fibers {
            rhs.extend_from_slice(&f.rhs);
        }
        rhs
    }

    /// Force density on every node implied by a solution slice.
    pub fn apply_fiber_force(&self, x_all: &[f64]) -> Mat<f64> {
        debug_assert_eq!(x_all.len(), self.local_solution_size());
        let offsets = self.solution_offsets();
        let total = self.local_node_count();
        let mut out = Mat::<f64>::zeros(3, total);

        let mut node_off = 0;
        for (f, &off) in self.fibers.iter().zip(&offsets) {
            let density = f.force_density(&x_all[off..off + f.solution_size()]);
            for j in 0..f.n {
                for c in 0..3 {
                    out[(c, node_off + j)] = density[(c, j)];
                }
            }
            node_off += f.n;
        }
        out
    }

    /// Collection matvec: per-fiber local operator application minus the
    /// inter-entity flow on interior momentum rows. `v_fib` is the flow
    /// at every fiber node sourced by the other unknowns (3×total).
    pub fn matvec(&self, x_all: &[f64], v_fib: &Mat<f64>) -> Vec<f64> {
        debug_assert_eq!(x_all.len(), self.local_solution_size());
        let offsets = self.solution_offsets();
        let node_offsets = self.node_offsets();

        let segments: Vec<Vec<f64>> = self
            .fibers
            .par_iter()
            .zip(&offsets)
            .zip(&node_offsets)
            .map(|((f, &off), &node_off)| {
                let mut res = f.matvec(&x_all[off..off + f.solution_size()]);
                for r in f.flow_rows() {
                    let node = r / 3;
                    let comp = r % 3;
                    res[r] -= v_fib[(comp, node_off + node)];
                }
                res
            })
            .collect();

        segments.concat()
    }

    /// Block preconditioner: per-fiber LU solves.
    pub fn apply_preconditioner(&self, x_all: &[f64]) -> SpindleResult<Vec<f64>> {
        debug_assert_eq!(x_all.len(), self.local_solution_size());
        let offsets = self.solution_offsets();

        let segments: Vec<Vec<f64>> = self
            .fibers
            .par_iter()
            .zip(&offsets)
            .map(|(f, &off)| f.apply_preconditioner(&x_all[off..off + f.solution_size()]))
            .collect::<SpindleResult<_>>()?;

        Ok(segments.concat())
    }

    /// Flow induced by the given per-node force density at the fibers'
    /// own nodes and at external targets, via one shared far-field
    /// pass. Each fiber's own contribution at its own nodes is
    /// subtracted using its cached stokeslet (the self term lives in
    /// the local operator).
    ///
    /// Returns 3×(total + n_external); fiber-node columns first.
    pub fn flow(
        &self,
        forces: &Mat<f64>,
        r_trg_external: &Mat<f64>,
        eta: f64,
        fmm: &mut dyn MultipoleBackend,
    ) -> SpindleResult<Mat<f64>> {
        let total = self.local_node_count();
        debug_assert_eq!(forces.ncols(), total);

        let positions = self.node_positions();

        // Quadrature-weighted point forces as single-layer sources.
        let mut weighted = Mat::<f64>::zeros(3, total);
        let mut k = 0;
        for f in &self.fibers {
            for (j, &w) in f.weights().iter().enumerate() {
                for c in 0..3 {
                    weighted[(c, k + j)] = forces[(c, k + j)] * w;
                }
            }
            k += f.n;
        }

        let n_ext = r_trg_external.ncols();
        let targets = Mat::from_fn(3, total + n_ext, |c, j| {
            if j < total {
                positions[(c, j)]
            } else {
                r_trg_external[(c, j - total)]
            }
        });

        let empty_dl_pts = Mat::<f64>::zeros(3, 0);
        let empty_dl = Mat::<f64>::zeros(9, 0);
        let mut vel = stokes_velocity_fmm(
            fmm,
            &positions,
            &weighted,
            &empty_dl_pts,
            &empty_dl,
            &targets,
            eta,
        )?;

        // Remove each fiber's own contribution at its own nodes.
        let mut node_off = 0;
        for f in &self.fibers {
            let flat: Vec<f64> = (0..f.n)
                .flat_map(|j| (0..3).map(move |c| (c, j)))
                .map(|(c, j)| weighted[(c, node_off + j)])
                .collect();
            let self_flow = apply_dense(&f.stokeslet, &flat);
            for j in 0..f.n {
                for c in 0..3 {
                    vel[(c, node_off + j)] -= self_flow[3 * j + c];
                }
            }
            node_off += f.n;
        }

        Ok(vel)
    }
}
