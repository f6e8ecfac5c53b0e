//! Body collection with an explicit coordinator role.
//!
//! Body counts are small and spatial decomposition would not pay, so
//! exactly one designated rank (the coordinator, a constructor
//! parameter) materializes the full body state in the solution vector;
//! every other rank contributes size-zero slices and zero-valued
//! body-sized quantities.

use faer::Mat;
use glam::DVec3;
use rayon::prelude::*;
use spindle_kernels::{stokes_velocity_fmm, MultipoleBackend};
use spindle_types::SpindleResult;

use crate::body::Body;

/// All bodies in the simulation.
pub struct BodyContainer {
    pub bodies: Vec<Body>,
    /// Rank that owns the body block of the solution vector.
    coordinator: usize,
    /// This process's rank.
    rank: usize,
}

impl BodyContainer {
    /// `coordinator` is the rank that materializes body state; the role
    /// is a parameter, never an implicit rank-0 check.
    pub fn new(bodies: Vec<Body>, rank: usize, coordinator: usize) -> Self {
        Self {
            bodies,
            coordinator,
            rank,
        }
    }

    /// Whether this process owns the body block.
    pub fn is_coordinator(&self) -> bool {
        self.rank == self.coordinator
    }

    /// Bodies relevant for local calculations.
    pub fn local_count(&self) -> usize {
        if self.is_coordinator() {
            self.bodies.len()
        } else {
            0
        }
    }

    /// Bodies across all ranks.
    pub fn global_count(&self) -> usize {
        self.bodies.len()
    }

    /// Surface nodes contributing to this rank's solution block.
    pub fn local_node_count(&self) -> usize {
        if self.is_coordinator() {
            self.bodies.iter().map(|b| b.n_nodes).sum()
        } else {
            0
        }
    }

    /// Surface nodes across all ranks.
    pub fn global_node_count(&self) -> usize {
        self.bodies.iter().map(|b| b.n_nodes).sum()
    }

    /// Nucleation sites across all bodies.
    pub fn global_site_count(&self) -> usize {
        self.bodies.iter().map(|b| b.nucleation_sites.ncols()).sum()
    }

    /// Size of this rank's body block of the solution vector.
    pub fn local_solution_size(&self) -> usize {
        if self.is_coordinator() {
            self.bodies.iter().map(|b| b.solution_size()).sum()
        } else {
            0
        }
    }

    /// Lab-frame position of one nucleation site.
    pub fn nucleation_site(&self, i_body: usize, j_site: usize) -> DVec3 {
        let sites = &self.bodies[i_body].nucleation_sites;
        DVec3::new(sites[(0, j_site)], sites[(1, j_site)], sites[(2, j_site)])
    }

    /// Node positions for this rank's block (3×local nodes; empty off
    /// the coordinator).
    pub fn local_node_positions(&self) -> Mat<f64> {
        self.concat_nodes(|b| &b.node_positions)
    }

    /// Node normals for this rank's block.
    pub fn local_node_normals(&self) -> Mat<f64> {
        self.concat_nodes(|b| &b.node_normals)
    }

    fn concat_nodes<'a>(&'a self, field: impl Fn(&'a Body) -> &'a Mat<f64>) -> Mat<f64> {
        if !self.is_coordinator() {
            return Mat::zeros(3, 0);
        }
        let total: usize = self.bodies.iter().map(|b| b.n_nodes).sum();
        let mut out = Mat::<f64>::zeros(3, total);
        let mut k = 0;
        for b in &self.bodies {
            let m = field(b);
            for j in 0..b.n_nodes {
                for c in 0..3 {
                    out[(c, k + j)] = m[(c, j)];
                }
            }
            k += b.n_nodes;
        }
        out
    }

    /// Centroid positions (3×n_bodies). Local variant is empty off the
    /// coordinator.
    pub fn center_positions(&self, override_distributed: bool) -> Mat<f64> {
        if !self.is_coordinator() && !override_distributed {
            return Mat::zeros(3, 0);
        }
        Mat::from_fn(3, self.bodies.len(), |c, i| self.bodies[i].position[c])
    }

    /// Refresh every body's cache variables. Mandatory after any move.
    pub fn update_cache_variables(&mut self, eta: f64, reg: f64, eps: f64) -> SpindleResult<()> {
        self.bodies
            .par_iter_mut()
            .try_for_each(|b| b.update_cache_variables(eta, reg, eps))
    }

    /// RHS from the velocity at this rank's body nodes.
    pub fn update_rhs(&mut self, v_on_bodies: &Mat<f64>) {
        if !self.is_coordinator() {
            return;
        }
        let mut off = 0;
        for b in &mut self.bodies {
            let slice = Mat::from_fn(3, b.n_nodes, |c, j| v_on_bodies[(c, off + j)]);
            b.update_rhs(&slice);
            off += b.n_nodes;
        }
    }

    /// Concatenated RHS for this rank's body block.
    pub fn get_rhs(&self) -> Vec<f64> {
        if !self.is_coordinator() {
            return Vec::new();
        }
        let mut rhs = Vec::with_capacity(self.local_solution_size());
        for b in &self.bodies {
            rhs.extend_from_slice(&b.rhs);
        }
        rhs
    }

    /// Collection matvec: per-body operator application plus the
    /// inter-entity flow on node rows. `v_bodies` is the flow at this
    /// rank's body nodes sourced by the other unknowns.
    pub fn matvec(&self, x_all: &[f64], v_bodies: &Mat<f64>) -> Vec<f64> {
        if !self.is_coordinator() {
            return Vec::new();
        }
        debug_assert_eq!(x_all.len(), self.local_solution_size());

        let mut out = Vec::with_capacity(self.local_solution_size());
        let mut off = 0;
        let mut node_off = 0;
        for b in &self.bodies {
            let mut res = b.matvec(&x_all[off..off + b.solution_size()]);
            for j in 0..b.n_nodes {
                for c in 0..3 {
                    res[3 * j + c] += v_bodies[(c, node_off + j)];
                }
            }
            out.extend_from_slice(&res);
            off += b.solution_size();
            node_off += b.n_nodes;
        }
        out
    }

    /// Block preconditioner: per-body LU solves on this rank's block.
    pub fn apply_preconditioner(&self, x_all: &[f64]) -> SpindleResult<Vec<f64>> {
        if !self.is_coordinator() {
            return Ok(Vec::new());
        }
        debug_assert_eq!(x_all.len(), self.local_solution_size());

        let mut offsets = Vec::with_capacity(self.bodies.len());
        let mut acc = 0;
        for b in &self.bodies {
            offsets.push(acc);
            acc += b.solution_size();
        }

        let segments: Vec<Vec<f64>> = self
            .bodies
            .par_iter()
            .zip(&offsets)
            .map(|(b, &off)| b.apply_preconditioner(&x_all[off..off + b.solution_size()]))
            .collect::<SpindleResult<_>>()?;
        Ok(segments.concat())
    }

    /// Flow induced at external targets by the given surface densities
    /// (3×local nodes) through one shared far-field stresslet pass.
    /// The caller subtracts per-body self terms where targets coincide
    /// with a body's own nodes.
    pub fn flow(
        &self,
        r_trg: &Mat<f64>,
        densities: &Mat<f64>,
        eta: f64,
        fmm: &mut dyn MultipoleBackend,
    ) -> SpindleResult<Mat<f64>> {
        let positions = self.local_node_positions();
        let n = positions.ncols();
        debug_assert_eq!(densities.ncols(), n);

        let normals = self.local_node_normals();
        // density ⊗ normal tensors, row-major.
        let dl_values = Mat::from_fn(9, n, |r, j| densities[(r / 3, j)] * normals[(r % 3, j)]);

        let empty = Mat::<f64>::zeros(3, 0);
        stokes_velocity_fmm(fmm, &empty, &empty, &positions, &dl_values, r_trg, eta)
    }

    /// Completion flow from every body's external force/torque at the
    /// given targets. Constant during a solve; evaluated at RHS
    /// assembly.
    pub fn completion_flow(&self, r_trg: &Mat<f64>, eta: f64, reg: f64, eps: f64) -> Mat<f64> {
        let mut out = Mat::<f64>::zeros(3, r_trg.ncols());
        for b in &self.bodies {
            let v = b.completion_flow(r_trg, eta, reg, eps);
            for t in 0..r_trg.ncols() {
                for c in 0..3 {
                    out[(c, t)] += v[(c, t)];
                }
            }
        }
        out
    }

    /// Split the body block into per-node densities (3×local nodes) and
    /// per-body rigid velocities (6×n_bodies).
    pub fn unpack_solution_vector(&self, x_all: &[f64]) -> (Mat<f64>, Mat<f64>) {
        if !self.is_coordinator() {
            return (Mat::zeros(3, 0), Mat::zeros(6, 0));
        }
        debug_assert_eq!(x_all.len(), self.local_solution_size());

        let total_nodes = self.local_node_count();
        let mut densities = Mat::<f64>::zeros(3, total_nodes);
        let mut velocities = Mat::<f64>::zeros(6, self.bodies.len());

        let mut off = 0;
        let mut node_off = 0;
        for (ib, b) in self.bodies.iter().enumerate() {
            let slice = &x_all[off..off + b.solution_size()];
            let (density, u, w) = b.unpack_solution(slice);
            for j in 0..b.n_nodes {
                for c in 0..3 {
                    densities[(c, node_off + j)] = density[(c, j)];
                }
            }
            for c in 0..3 {
                velocities[(c, ib)] = u[c];
                velocities[(3 + c, ib)] = w[c];
            }
            off += b.solution_size();
            node_off += b.n_nodes;
        }
        (densities, velocities)
    }
}
