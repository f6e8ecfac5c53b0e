//! # spindle-periphery
//!
//! The single confining boundary of the simulated domain.
//!
//! The shell's inverse-mobility and stresslet operators are loaded from
//! precompute data, never derived at runtime. Nodes, weights, and
//! operator rows are distributed across ranks by contiguous node
//! ranges; the distribution must match the loaded operator's
//! partitioning exactly — a mismatch is a fatal configuration error.

use faer::Mat;
use glam::DVec3;
use spindle_comm::{Communicator, Partition};
use spindle_io::PrecomputeData;
use spindle_kernels::stresslet_contract;
use spindle_types::{SpindleError, SpindleResult};

/// Shape variant of the periphery, carrying its collision capability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PeripheryShape {
    /// A loaded surface with no analytic collision geometry.
    Generic,
    /// An analytic sphere of the given radius about the origin.
    Sphere { radius: f64 },
}

impl PeripheryShape {
    pub fn name(&self) -> &'static str {
        match self {
            PeripheryShape::Generic => "generic",
            PeripheryShape::Sphere { .. } => "sphere",
        }
    }

    pub fn supports_collision(&self) -> bool {
        matches!(self, PeripheryShape::Sphere { .. })
    }

    pub fn require_collision_support(&self) -> SpindleResult<()> {
        if self.supports_collision() {
            Ok(())
        } else {
            Err(SpindleError::UnsupportedShape {
                shape: self.name(),
                operation: "collision check",
            })
        }
    }
}

/// The confining boundary. Exactly one per simulation.
#[derive(Debug)]
pub struct Periphery {
    pub shape: PeripheryShape,

    /// Global geometry, identical on every rank (3×N).
    pub global_node_positions: Mat<f64>,
    pub global_node_normals: Mat<f64>,
    pub global_weights: Vec<f64>,

    /// This rank's node range of the global arrays.
    pub node_partition: Partition,
    /// Local rows of the precomputed inverse-mobility operator
    /// (3·n_local × 3·N).
    pub m_inv: Mat<f64>,
    /// Local rows of the loaded stresslet-plus-complementary operator
    /// (3·n_local × 3·N).
    pub stresslet_operator: Mat<f64>,
    /// Current right-hand side (3·n_local).
    pub rhs: Vec<f64>,

    pub n_nodes_global: usize,
    rank: usize,
}

impl Periphery {
    /// A periphery with no nodes (unbounded simulation).
    pub fn empty(comm: &dyn Communicator) -> Self {
        Self {
            shape: PeripheryShape::Generic,
            global_node_positions: Mat::zeros(3, 0),
            global_node_normals: Mat::zeros(3, 0),
            global_weights: Vec::new(),
            node_partition: Partition::split_evenly(0, comm.size()),
            m_inv: Mat::zeros(0, 0),
            stresslet_operator: Mat::zeros(0, 0),
            rhs: Vec::new(),
            n_nodes_global: 0,
            rank: comm.rank(),
        }
    }

    /// Load geometry and operators from precompute data and take this
    /// rank's contiguous row range. Every shape is validated against
    /// the loaded operator's partitioning; any inconsistency is fatal.
    pub fn from_precompute(
        data: &PrecomputeData,
        shape: PeripheryShape,
        comm: &dyn Communicator,
    ) -> SpindleResult<Self> {
        let global_node_positions = data.matrix("node_positions", 3)?;
        let n = global_node_positions.ncols();
        let global_node_normals = data.matrix_exact("node_normals", 3, n)?;
        let global_weights = data.vector("quadrature_weights")?;
        if global_weights.len() != n {
            return Err(SpindleError::Precompute(format!(
                "periphery has {n} nodes but {} quadrature weights",
                global_weights.len()
            )));
        }

        let m_inv_global = data.matrix_exact("M_inv", 3 * n, 3 * n)?;
        let stresslet_global = data.matrix_exact("stresslet_plus_complementary", 3 * n, 3 * n)?;

        let node_partition = Partition::split_evenly(n, comm.size());
        let rank = comm.rank();
        let rows = node_partition.scaled(3).range_of(rank);
        let n_local_rows = rows.len();

        let m_inv = Mat::from_fn(n_local_rows, 3 * n, |i, j| m_inv_global[(rows.start + i, j)]);
        let stresslet_operator =
            Mat::from_fn(n_local_rows, 3 * n, |i, j| stresslet_global[(rows.start + i, j)]);

        node_partition
            .scaled(3)
            .validate_local_rows(rank, m_inv.nrows())?;

        Ok(Self {
            shape,
            global_node_positions,
            global_node_normals,
            global_weights,
            node_partition,
            m_inv,
            stresslet_operator,
            rhs: vec![0.0; n_local_rows],
            n_nodes_global: n,
            rank,
        })
    }

    /// Number of shell nodes owned by this rank.
    pub fn local_node_count(&self) -> usize {
        self.m_inv.nrows() / 3
    }

    /// Size of the shell's contribution to the local solution vector.
    pub fn local_solution_size(&self) -> usize {
        self.m_inv.nrows()
    }

    /// This rank's node positions (3×n_local).
    pub fn local_node_positions(&self) -> Mat<f64> {
        let range = self.node_partition.range_of(self.rank);
        Mat::from_fn(3, range.len(), |c, j| {
            self.global_node_positions[(c, range.start + j)]
        })
    }

    /// RHS = −(ambient velocity at this rank's shell nodes).
    pub fn update_rhs(&mut self, v_on_shell: &Mat<f64>) {
        debug_assert_eq!(v_on_shell.ncols(), self.local_node_count());
        for j in 0..self.local_node_count() {
            for c in 0..3 {
                self.rhs[3 * j + c] = -v_on_shell[(c, j)];
            }
        }
    }

    pub fn get_rhs(&self) -> Vec<f64> {
        self.rhs.clone()
    }

    /// Apply the precomputed inverse-mobility block to this rank's
    /// slice. Gathers the full density first — operator columns span
    /// all nodes.
    pub fn apply_preconditioner(
        &self,
        x_local: &[f64],
        comm: &dyn Communicator,
    ) -> SpindleResult<Vec<f64>> {
        debug_assert_eq!(x_local.len(), self.local_solution_size());
        if self.n_nodes_global == 0 {
            return Ok(Vec::new());
        }
        let x_global = comm.allgatherv(x_local, &self.node_partition.scaled(3))?;
        Ok(apply_rows(&self.m_inv, &x_global))
    }

    /// Local stresslet-operator action plus the caller-supplied flow at
    /// this rank's shell nodes.
    pub fn matvec(
        &self,
        x_local: &[f64],
        v_local: &Mat<f64>,
        comm: &dyn Communicator,
    ) -> SpindleResult<Vec<f64>> {
        debug_assert_eq!(x_local.len(), self.local_solution_size());
        if self.n_nodes_global == 0 {
            return Ok(Vec::new());
        }
        let x_global = comm.allgatherv(x_local, &self.node_partition.scaled(3))?;
        let mut out = apply_rows(&self.stresslet_operator, &x_global);
        for j in 0..self.local_node_count() {
            for c in 0..3 {
                out[3 * j + c] += v_local[(c, j)];
            }
        }
        Ok(out)
    }

    /// Flow at this rank's shell nodes induced by the full shell
    /// density itself (the coupling the loaded operator already
    /// carries; subtracted from shared far-field passes).
    pub fn self_flow(&self, density_global: &Mat<f64>, eta: f64, reg: f64, eps: f64) -> Mat<f64> {
        debug_assert_eq!(density_global.ncols(), self.n_nodes_global);
        let all = stresslet_contract(
            &self.global_node_positions,
            &self.global_node_normals,
            density_global,
            eta,
            reg,
            eps,
        );
        let range = self.node_partition.range_of(self.rank);
        Mat::from_fn(3, range.len(), |c, j| all[(c, range.start + j)])
    }

    /// Collision test against a sphere (body centers + radius).
    ///
    /// An empty periphery never collides; otherwise the capability is
    /// dispatched over the shape variant.
    pub fn check_collision_sphere(
        &self,
        center: DVec3,
        radius: f64,
        threshold: f64,
    ) -> SpindleResult<bool> {
        if self.n_nodes_global == 0 {
            return Ok(false);
        }
        self.shape.require_collision_support()?;
        match self.shape {
            PeripheryShape::Sphere { radius: shell_r } => {
                Ok(center.length() + radius + threshold > shell_r)
            }
            PeripheryShape::Generic => unreachable!("capability check rejects generic shells"),
        }
    }

    /// Collision test against a point cloud (fiber nodes).
    pub fn check_collision_points(
        &self,
        points: &Mat<f64>,
        threshold: f64,
    ) -> SpindleResult<bool> {
        if self.n_nodes_global == 0 {
            return Ok(false);
        }
        self.shape.require_collision_support()?;
        match self.shape {
            PeripheryShape::Sphere { radius: shell_r } => {
                for j in 0..points.ncols() {
                    let p = DVec3::new(points[(0, j)], points[(1, j)], points[(2, j)]);
                    if p.length() + threshold > shell_r {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            PeripheryShape::Generic => unreachable!("capability check rejects generic shells"),
        }
    }
}

/// Row-distributed dense product: rows-local matrix times global vector.
fn apply_rows(m: &Mat<f64>, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(m.ncols(), x.len());
    let mut out = vec![0.0; m.nrows()];
    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (j, &xj) in x.iter().enumerate() {
            acc += m[(i, j)] * xj;
        }
        *out_i = acc;
    }
    out
}
