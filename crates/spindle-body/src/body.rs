//! One rigid body.
//!
//! The surface unknown is the quadrature-weighted double-layer density;
//! the combined operator couples it to the 6 rigid degrees of freedom
//! through the saddle structure
//!
//! ```text
//! A = | D̃   −K |        D̃ = stresslet operator, self blocks corrected
//!     | −Kᵀ  I |            by the singularity-subtraction vectors
//! ```
//!
//! K maps rigid DOF to node velocities (translation +I, rotation
//! −skew(r)), so the node rows read D̃σ − (U + ω×r) and the solved rigid
//! velocity is the physical one. The I₆ block pins the weighted-constant
//! density mode that D̃ annihilates exactly, keeping A invertible.

use faer::Mat;
use glam::{DMat3, DQuat, DVec3};
use spindle_io::PrecomputeData;
use spindle_kernels::{oseen_contract, stresslet_contract, stresslet_matrix};
use spindle_math::dense::DenseLu;
use spindle_types::{SpindleError, SpindleResult};

use crate::shape::BodyShape;

/// One rigid body's discretized surface and operators.
#[derive(Debug)]
pub struct Body {
    /// Number of surface nodes.
    pub n_nodes: usize,
    /// Shape variant (collision capability).
    pub shape: BodyShape,

    /// Instantaneous lab-frame centroid position.
    pub position: DVec3,
    /// Instantaneous orientation.
    pub orientation: DQuat,
    /// Reference orientation the precompute frame was generated in.
    pub orientation_ref: DQuat,
    /// Net lab-frame translational velocity (filled after each solve).
    pub velocity: DVec3,
    /// Net lab-frame angular velocity (filled after each solve).
    pub angular_velocity: DVec3,
    /// Constant external force on the body.
    pub external_force: DVec3,
    /// Constant external torque about the centroid.
    pub external_torque: DVec3,

    /// Lab-frame node positions (3×n) and normals.
    pub node_positions: Mat<f64>,
    pub node_normals: Mat<f64>,
    /// Reference-frame node positions and normals, loaded once.
    pub node_positions_ref: Mat<f64>,
    pub node_normals_ref: Mat<f64>,
    /// Far-field quadrature weights.
    pub node_weights: Vec<f64>,

    /// Fiber attachment points, reference and lab frame (3×n_sites).
    pub nucleation_sites_ref: Mat<f64>,
    pub nucleation_sites: Mat<f64>,

    /// Singularity-subtraction vectors (3×n each).
    pub ex: Mat<f64>,
    pub ey: Mat<f64>,
    pub ez: Mat<f64>,

    /// Rigid-motion coupling matrix (3n×6).
    pub k_matrix: Mat<f64>,

    /// Combined operator (3n+6)² and its factorization.
    pub a: Mat<f64>,
    a_lu: DenseLu,
    /// Current right-hand side (3n+6).
    pub rhs: Vec<f64>,
}

impl Body {
    /// Construct a body from precompute data, at the origin with
    /// identity orientation. Cache variables are not yet built; call
    /// [`update_cache_variables`](Self::update_cache_variables) before
    /// any operator application.
    pub fn from_precompute(data: &PrecomputeData, shape: BodyShape) -> SpindleResult<Self> {
        let node_positions_ref = data.matrix("node_positions_ref", 3)?;
        let n = node_positions_ref.ncols();
        let node_normals_ref = data.matrix_exact("node_normals_ref", 3, n)?;
        let node_weights = data.vector("node_weights")?;
        if node_weights.len() != n {
            return Err(SpindleError::Precompute(format!(
                "body has {n} nodes but {} quadrature weights",
                node_weights.len()
            )));
        }

        let nucleation_sites_ref = if data.contains("nucleation_sites_ref") {
            data.matrix("nucleation_sites_ref", 3)?
        } else {
            Mat::zeros(3, 0)
        };
        let n_sites = nucleation_sites_ref.ncols();

        let mut body = Self {
            n_nodes: n,
            shape,
            position: DVec3::ZERO,
            orientation: DQuat::IDENTITY,
            orientation_ref: DQuat::IDENTITY,
            velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            external_force: DVec3::ZERO,
            external_torque: DVec3::ZERO,
            node_positions: Mat::zeros(3, n),
            node_normals: Mat::zeros(3, n),
            node_positions_ref,
            node_normals_ref,
            node_weights,
            nucleation_sites_ref,
            nucleation_sites: Mat::zeros(3, n_sites),
            ex: Mat::zeros(3, n),
            ey: Mat::zeros(3, n),
            ez: Mat::zeros(3, n),
            k_matrix: Mat::zeros(3 * n, 6),
            a: Mat::zeros(3 * n + 6, 3 * n + 6),
            a_lu: DenseLu::new(),
            rhs: vec![0.0; 3 * n + 6],
        };
        body.move_to(DVec3::ZERO, DQuat::IDENTITY);
        Ok(body)
    }

    /// Size of this body's slice of the solution vector.
    pub fn solution_size(&self) -> usize {
        3 * self.n_nodes + 6
    }

    /// Move the body: lab-frame nodes become p + R(q)·ref, normals
    /// R(q)·ref. Pure affine transform, exact.
    ///
    /// Cache variables are stale afterwards until
    /// [`update_cache_variables`](Self::update_cache_variables) runs.
    pub fn move_to(&mut self, new_pos: DVec3, new_orientation: DQuat) {
        self.position = new_pos;
        self.orientation = new_orientation;

        let rot = DMat3::from_quat(self.orientation);
        for i in 0..self.n_nodes {
            let p = rot * col3(&self.node_positions_ref, i) + self.position;
            let nrm = rot * col3(&self.node_normals_ref, i);
            set_col3(&mut self.node_positions, i, p);
            set_col3(&mut self.node_normals, i, nrm);
        }
        for i in 0..self.nucleation_sites_ref.ncols() {
            let s = rot * col3(&self.nucleation_sites_ref, i) + self.position;
            set_col3(&mut self.nucleation_sites, i, s);
        }
    }

    /// Mandatory post-move refresh: singularity-subtraction vectors,
    /// then K, then the combined operator and its factorization.
    /// Idempotent, and sufficient to restore a consistent state after a
    /// checkpoint restore.
    pub fn update_cache_variables(&mut self, eta: f64, reg: f64, eps: f64) -> SpindleResult<()> {
        self.update_singularity_subtraction_vecs(eta, reg, eps);
        self.update_k_matrix();
        self.update_operator(eta, reg, eps)
    }

    /// The three axis-aligned reference flows used to cancel the
    /// stresslet operator's self-singular diagonal.
    pub fn update_singularity_subtraction_vecs(&mut self, eta: f64, reg: f64, eps: f64) {
        let n = self.n_nodes;
        let weights = &self.node_weights;
        let positions = &self.node_positions;
        let normals = &self.node_normals;
        for (axis, slot) in [&mut self.ex, &mut self.ey, &mut self.ez]
            .into_iter()
            .enumerate()
        {
            let density =
                Mat::from_fn(3, n, |i, j| if i == axis { weights[j] } else { 0.0 });
            *slot = stresslet_contract(positions, normals, &density, eta, reg, eps);
        }
    }

    /// Rigid-motion coupling matrix: node velocity from rigid DOF,
    /// K·[U; ω]|ᵢ = U + ω×rᵢ with rᵢ the node offset from the centroid.
    pub fn update_k_matrix(&mut self) {
        let n = self.n_nodes;
        self.k_matrix = Mat::zeros(3 * n, 6);
        for i in 0..n {
            let r = col3(&self.node_positions, i) - self.position;
            for c in 0..3 {
                self.k_matrix[(3 * i + c, c)] = 1.0;
            }
            // −skew(r): (−skew(r)·ω = ω × r).
            self.k_matrix[(3 * i, 4)] = r.z;
            self.k_matrix[(3 * i, 5)] = -r.y;
            self.k_matrix[(3 * i + 1, 3)] = -r.z;
            self.k_matrix[(3 * i + 1, 5)] = r.x;
            self.k_matrix[(3 * i + 2, 3)] = r.y;
            self.k_matrix[(3 * i + 2, 4)] = -r.x;
        }
    }

    /// Rebuild the combined operator and refactorize.
    pub fn update_operator(&mut self, eta: f64, reg: f64, eps: f64) -> SpindleResult<()> {
        let n = self.n_nodes;
        let size = 3 * n + 6;
        let mut a = Mat::<f64>::zeros(size, size);

        // D̃: stresslet operator with singularity-subtraction corrected
        // diagonal blocks.
        let d = stresslet_matrix(&self.node_positions, &self.node_normals, eta, reg, eps);
        for i in 0..3 * n {
            for j in 0..3 * n {
                a[(i, j)] = d[(i, j)];
            }
        }
        for i in 0..n {
            let w_inv = 1.0 / self.node_weights[i];
            for c in 0..3 {
                a[(3 * i + c, 3 * i)] -= self.ex[(c, i)] * w_inv;
                a[(3 * i + c, 3 * i + 1)] -= self.ey[(c, i)] * w_inv;
                a[(3 * i + c, 3 * i + 2)] -= self.ez[(c, i)] * w_inv;
            }
        }

        // −K and −Kᵀ coupling blocks.
        for i in 0..3 * n {
            for j in 0..6 {
                a[(i, 3 * n + j)] = -self.k_matrix[(i, j)];
                a[(3 * n + j, i)] = -self.k_matrix[(i, j)];
            }
        }

        // Identity on the rigid block.
        for j in 0..6 {
            a[(3 * n + j, 3 * n + j)] = 1.0;
        }

        self.a_lu
            .factorize(&a)
            .map_err(SpindleError::InvalidConfig)?;
        self.a = a;
        Ok(())
    }

    /// RHS from the velocity on the body's nodes (3×n): node rows −v,
    /// rigid rows the external force and torque.
    pub fn update_rhs(&mut self, v_on_body: &Mat<f64>) {
        debug_assert_eq!(v_on_body.ncols(), self.n_nodes);
        let n = self.n_nodes;
        for i in 0..n {
            for c in 0..3 {
                self.rhs[3 * i + c] = -v_on_body[(c, i)];
            }
        }
        self.rhs[3 * n] = self.external_force.x;
        self.rhs[3 * n + 1] = self.external_force.y;
        self.rhs[3 * n + 2] = self.external_force.z;
        self.rhs[3 * n + 3] = self.external_torque.x;
        self.rhs[3 * n + 4] = self.external_torque.y;
        self.rhs[3 * n + 5] = self.external_torque.z;
    }

    /// Apply the combined operator to a solution slice.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), self.solution_size());
        let mut out = vec![0.0; self.solution_size()];
        for (i, out_i) in out.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (j, &xj) in x.iter().enumerate() {
                acc += self.a[(i, j)] * xj;
            }
            *out_i = acc;
        }
        out
    }

    /// Solve the combined operator against a slice (preconditioner
    /// block).
    pub fn apply_preconditioner(&self, x: &[f64]) -> SpindleResult<Vec<f64>> {
        self.a_lu.solve(x).map_err(SpindleError::InvalidConfig)
    }

    /// Completion flow at the given targets: a center Stokeslet
    /// carrying the external force plus a rotlet carrying the external
    /// torque. Constant over a solve, so it belongs to RHS assembly.
    pub fn completion_flow(&self, r_trg: &Mat<f64>, eta: f64, reg: f64, eps: f64) -> Mat<f64> {
        let center = Mat::from_fn(3, 1, |i, _| self.position[i]);
        let force = Mat::from_fn(3, 1, |i, _| self.external_force[i]);
        let mut vel = oseen_contract(&center, r_trg, &force, eta, reg, eps);

        // Rotlet: u = L × d / (8πη r³).
        let factor = 1.0 / (8.0 * std::f64::consts::PI * eta);
        for t in 0..r_trg.ncols() {
            let d = DVec3::new(
                r_trg[(0, t)] - self.position.x,
                r_trg[(1, t)] - self.position.y,
                r_trg[(2, t)] - self.position.z,
            );
            let r = d.length();
            if r == 0.0 {
                continue;
            }
            let u = factor * self.external_torque.cross(d) / (r * r * r);
            vel[(0, t)] += u.x;
            vel[(1, t)] += u.y;
            vel[(2, t)] += u.z;
        }
        vel
    }

    /// Self contribution of a density slice at this body's own nodes
    /// (the part the combined operator already carries, subtracted from
    /// shared far-field passes).
    pub fn self_density_flow(
        &self,
        density: &Mat<f64>,
        eta: f64,
        reg: f64,
        eps: f64,
    ) -> Mat<f64> {
        stresslet_contract(
            &self.node_positions,
            &self.node_normals,
            density,
            eta,
            reg,
            eps,
        )
    }

    /// Split a solution slice into (density 3×n, rigid velocity,
    /// angular velocity).
    pub fn unpack_solution(&self, x: &[f64]) -> (Mat<f64>, DVec3, DVec3) {
        debug_assert_eq!(x.len(), self.solution_size());
        let n = self.n_nodes;
        let density = Mat::from_fn(3, n, |c, j| x[3 * j + c]);
        let u = DVec3::new(x[3 * n], x[3 * n + 1], x[3 * n + 2]);
        let w = DVec3::new(x[3 * n + 3], x[3 * n + 4], x[3 * n + 5]);
        (density, u, w)
    }
}

impl Clone for Body {
    /// Deep copy: cloned bodies own independent operator storage and an
    /// independent factorization.
    fn clone(&self) -> Self {
        let mut a_lu = DenseLu::new();
        if self.a_lu.is_factorized() {
            // Refactorizing a matrix that factorized before cannot fail.
            a_lu.factorize(&self.a).expect("refactorization of a valid operator");
        }
        Self {
            n_nodes: self.n_nodes,
            shape: self.shape,
            position: self.position,
            orientation: self.orientation,
            orientation_ref: self.orientation_ref,
            velocity: self.velocity,
            angular_velocity: self.angular_velocity,
            external_force: self.external_force,
            external_torque: self.external_torque,
            node_positions: self.node_positions.clone(),
            node_normals: self.node_normals.clone(),
            node_positions_ref: self.node_positions_ref.clone(),
            node_normals_ref: self.node_normals_ref.clone(),
            node_weights: self.node_weights.clone(),
            nucleation_sites_ref: self.nucleation_sites_ref.clone(),
            nucleation_sites: self.nucleation_sites.clone(),
            ex: self.ex.clone(),
            ey: self.ey.clone(),
            ez: self.ez.clone(),
            k_matrix: self.k_matrix.clone(),
            a: self.a.clone(),
            a_lu,
            rhs: self.rhs.clone(),
        }
    }
}

fn col3(m: &Mat<f64>, i: usize) -> DVec3 {
    DVec3::new(m[(0, i)], m[(1, i)], m[(2, i)])
}

fn set_col3(m: &mut Mat<f64>, i: usize, v: DVec3) {
    m[(0, i)] = v.x;
    m[(1, i)] = v.y;
    m[(2, i)] = v.z;
}
