//! One elastic filament.
//!
//! Discretized on Chebyshev–Gauss–Lobatto collocation points over
//! arclength. The local operator couples the implicitly-discretized
//! bending PDE to a tension field through the inextensibility
//! constraint; two boundary-condition rows per end close the
//! fourth-order system, one tension row per end closes the second-order
//! tension equation.
//!
//! Row layout of the 4n×4n operator: momentum rows (3 per node,
//! node-major) then tension rows (1 per node). The momentum rows of the
//! two outermost nodes at each end hold that end's BC pair, evaluated at
//! the end node.

use faer::Mat;
use glam::DVec3;
use spindle_math::chebyshev::ChebyshevBasis;
use spindle_math::dense::DenseLu;
use spindle_types::SpindleResult;

/// Boundary-condition kinds available at each fiber end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndCondition {
    /// Prescribed end force: −κ X_sss + T x̂_s = F.
    Force,
    /// Prescribed end moment: κ X_ss = m.
    Torque,
    /// Prescribed end velocity: (X − Xⁿ)/dt = v.
    Velocity,
    /// Prescribed end angular velocity: (X_s − Xⁿ_s)/dt = ω × x̂_s.
    AngularVelocity,
    /// Prescribed end position.
    Position,
    /// Prescribed end tangent.
    Angle,
}

/// Attachment of a fiber's minus end to a body nucleation site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSite {
    /// Index of the body in its container.
    pub body: usize,
    /// Index of the nucleation site on that body.
    pub site: usize,
}

/// Which end of the fiber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum End {
    Minus,
    Plus,
}

/// One elastic filament.
pub struct Fiber {
    /// Number of collocation points.
    pub n: usize,
    /// Arclength.
    pub length: f64,
    /// Bending rigidity κ.
    pub bending_rigidity: f64,
    /// Penalty weight on the inextensibility rows.
    pub penalty: f64,
    /// Slenderness ratio ε entering the local mobility coefficients.
    pub slenderness: f64,

    /// BC pair at the minus end (s = 0) and its target values.
    pub bc_minus: (EndCondition, EndCondition),
    pub bc_minus_targets: (DVec3, DVec3),
    /// BC pair at the plus end (s = L) and its target values.
    pub bc_plus: (EndCondition, EndCondition),
    pub bc_plus_targets: (DVec3, DVec3),

    /// Attachment to a body nucleation site, if bound.
    pub binding_site: Option<BindingSite>,

    /// 3×n node positions.
    pub x: Mat<f64>,
    /// Derivative fields, recomputed from `x` via the basis matrices.
    pub xs: Mat<f64>,
    pub xss: Mat<f64>,
    pub xsss: Mat<f64>,
    pub xssss: Mat<f64>,

    /// Dense self-interaction Oseen matrix (3n×3n), used to subtract
    /// this fiber's own contribution from shared far-field passes.
    pub stokeslet: Mat<f64>,

    /// Local operator (4n×4n) and its factorization.
    pub a: Mat<f64>,
    a_lu: DenseLu,
    /// Force-recovery operator (3n×4n): solution slice → force density.
    pub force_operator: Mat<f64>,
    /// Current right-hand side (4n).
    pub rhs: Vec<f64>,

    basis: ChebyshevBasis,
    /// Slender-body mobility coefficients, refreshed with viscosity on
    /// every operator rebuild.
    c0: f64,
    c1: f64,
}

impl Fiber {
    /// Construct a straight fiber along x̂ starting at the origin.
    pub fn new(
        n: usize,
        length: f64,
        bending_rigidity: f64,
        penalty: f64,
        slenderness: f64,
    ) -> SpindleResult<Self> {
        let basis = ChebyshevBasis::new(n, length)
            .map_err(spindle_types::SpindleError::InvalidConfig)?;

        let x = Mat::from_fn(3, n, |i, j| if i == 0 { basis.s[j] } else { 0.0 });

        let mut fiber = Self {
            n,
            length,
            bending_rigidity,
            penalty,
            slenderness,
            bc_minus: (EndCondition::Velocity, EndCondition::AngularVelocity),
            bc_minus_targets: (DVec3::ZERO, DVec3::ZERO),
            bc_plus: (EndCondition::Force, EndCondition::Torque),
            bc_plus_targets: (DVec3::ZERO, DVec3::ZERO),
            binding_site: None,
            x,
            xs: Mat::zeros(3, n),
            xss: Mat::zeros(3, n),
            xsss: Mat::zeros(3, n),
            xssss: Mat::zeros(3, n),
            stokeslet: Mat::zeros(3 * n, 3 * n),
            a: Mat::zeros(4 * n, 4 * n),
            a_lu: DenseLu::new(),
            force_operator: Mat::zeros(3 * n, 4 * n),
            rhs: vec![0.0; 4 * n],
            basis,
            c0: 0.0,
            c1: 0.0,
        };
        fiber.update_derivatives();
        Ok(fiber)
    }

    /// Size of this fiber's slice of the solution vector.
    pub fn solution_size(&self) -> usize {
        4 * self.n
    }

    /// Quadrature weights of the collocation points.
    pub fn weights(&self) -> &[f64] {
        &self.basis.weights
    }

    /// Rigid translation of the whole fiber.
    pub fn translate(&mut self, r: DVec3) {
        for j in 0..self.n {
            self.x[(0, j)] += r.x;
            self.x[(1, j)] += r.y;
            self.x[(2, j)] += r.z;
        }
    }

    /// Overwrite node positions (3×n). Derivatives become stale until
    /// [`update_derivatives`](Self::update_derivatives) runs.
    pub fn set_positions(&mut self, x: Mat<f64>) {
        debug_assert_eq!(x.ncols(), self.n);
        self.x = x;
    }

    /// Recompute the 1st–4th arclength derivatives from the current
    /// positions. Must run after every position change, before any
    /// operator or flow evaluation.
    pub fn update_derivatives(&mut self) {
        self.xs = deriv(&self.x, &self.basis.d1);
        self.xss = deriv(&self.x, &self.basis.d2);
        self.xsss = deriv(&self.x, &self.basis.d3);
        self.xssss = deriv(&self.x, &self.basis.d4);
    }

    /// Refresh the dense self-interaction Oseen matrix.
    pub fn update_stokeslet(&mut self, eta: f64, reg: f64, eps: f64) {
        self.stokeslet = spindle_kernels::oseen_matrix(&self.x, &self.x, eta, reg, eps);
    }

    /// Unit tangent at the minus end.
    pub fn minus_end_tangent(&self) -> DVec3 {
        self.unit_tangent(0)
    }

    /// Position of the minus end.
    pub fn minus_end_position(&self) -> DVec3 {
        DVec3::new(self.x[(0, 0)], self.x[(1, 0)], self.x[(2, 0)])
    }

    /// Configure the BC pair at the minus end.
    pub fn set_bc_minus(&mut self, pair: (EndCondition, EndCondition), targets: (DVec3, DVec3)) {
        self.bc_minus = pair;
        self.bc_minus_targets = targets;
    }

    /// Configure the BC pair at the plus end.
    pub fn set_bc_plus(&mut self, pair: (EndCondition, EndCondition), targets: (DVec3, DVec3)) {
        self.bc_plus = pair;
        self.bc_plus_targets = targets;
    }

    /// Assemble the local operator for the current shape, factorize it,
    /// and rebuild the force-recovery operator.
    ///
    /// Rebuild whenever `dt`, viscosity, length, or rigidity change, and
    /// once per step for the current geometry.
    pub fn form_linear_operator(&mut self, dt: f64, eta: f64) -> SpindleResult<()> {
        let n = self.n;
        let kappa = self.bending_rigidity;

        // Slender-body mobility coefficients (Keller–Rubinow local
        // drag): c0 = −ln(e ε²)/(8πη), c1 = 2/(8πη).
        let eight_pi_eta = 8.0 * std::f64::consts::PI * eta;
        self.c0 = -(std::f64::consts::E * self.slenderness * self.slenderness).ln() / eight_pi_eta;
        self.c1 = 2.0 / eight_pi_eta;

        let mut a = Mat::<f64>::zeros(4 * n, 4 * n);

        // Momentum rows at interior nodes.
        for i in 2..n - 2 {
            let m = self.local_mobility(i);
            let ts = self.col3(&self.xs, i);
            let tss = self.col3(&self.xss, i);
            let m_ts = mat3_mul(&m, ts);
            let m_tss = mat3_mul(&m, tss);

            for j in 0..n {
                let d4 = self.basis.d4[(i, j)];
                let d1 = self.basis.d1[(i, j)];
                for c in 0..3 {
                    for d in 0..3 {
                        a[(3 * i + c, 3 * j + d)] += kappa * d4 * m[c][d];
                    }
                    if i == j {
                        a[(3 * i + c, 3 * j + c)] += 1.0 / dt;
                    }
                    // Tension coupling: −M (x_s (D1 T) + x_ss T).
                    let mut t_col = d1 * m_ts[c];
                    if i == j {
                        t_col += m_tss[c];
                    }
                    a[(3 * i + c, 3 * n + j)] -= t_col;
                }
            }
        }

        // Tension rows at interior nodes.
        for i in 1..n - 1 {
            let ts = self.col3(&self.xs, i);
            let tss = self.col3(&self.xss, i);
            let tss_sq = tss.length_squared();
            for j in 0..n {
                let d1 = self.basis.d1[(i, j)];
                let d2 = self.basis.d2[(i, j)];
                for d in 0..3 {
                    a[(3 * n + i, 3 * j + d)] += self.penalty * ts[d] * d1;
                }
                a[(3 * n + i, 3 * n + j)] += 2.0 * self.c0 * d2;
                if i == j {
                    a[(3 * n + i, 3 * n + j)] -= (self.c0 + 3.0 * self.c1) * tss_sq;
                }
            }
        }

        // Boundary rows.
        self.write_end_rows(&mut a, End::Minus, dt);
        self.write_end_rows(&mut a, End::Plus, dt);

        self.force_operator = self.build_force_operator();
        self.a_lu
            .factorize(&a)
            .map_err(spindle_types::SpindleError::InvalidConfig)?;
        self.a = a;
        Ok(())
    }

    /// Build the right-hand side for the current shape, ambient flow,
    /// and external force density (both 3×n).
    pub fn compute_rhs(&mut self, dt: f64, flow: &Mat<f64>, f_external: &Mat<f64>) {
        let n = self.n;
        let mut rhs = vec![0.0; 4 * n];

        for i in 2..n - 2 {
            let m = self.local_mobility(i);
            let f = DVec3::new(f_external[(0, i)], f_external[(1, i)], f_external[(2, i)]);
            let mf = mat3_mul(&m, f);
            for c in 0..3 {
                rhs[3 * i + c] = self.x[(c, i)] / dt + flow[(c, i)] + mf[c];
            }
        }

        // Inextensibility: x̂_s · X_s = 1.
        for i in 1..n - 1 {
            rhs[3 * n + i] = self.penalty;
        }

        self.rhs = rhs;
        self.write_end_rhs(End::Minus, dt);
        self.write_end_rhs(End::Plus, dt);
    }

    /// Re-point the minus end at a body nucleation site moving with the
    /// given velocity and angular velocity.
    ///
    /// Switches the minus-end BC pair to (Velocity, AngularVelocity)
    /// driven by the link, rewrites the affected operator rows and RHS
    /// entries in place, and refactorizes. This is how fiber–body
    /// binding is enforced — the BCs are substituted directly, there is
    /// no separate Lagrange-multiplier unknown.
    pub fn apply_bc_rectangular(
        &mut self,
        dt: f64,
        v_link: DVec3,
        omega_link: DVec3,
    ) -> SpindleResult<()> {
        self.bc_minus = (EndCondition::Velocity, EndCondition::AngularVelocity);
        self.bc_minus_targets = (v_link, omega_link);

        let mut a = self.a.clone();
        self.write_end_rows(&mut a, End::Minus, dt);
        self.a_lu
            .factorize(&a)
            .map_err(spindle_types::SpindleError::InvalidConfig)?;
        self.a = a;
        self.write_end_rhs(End::Minus, dt);
        Ok(())
    }

    /// Apply the local operator to a solution slice.
    pub fn matvec(&self, x: &[f64]) -> Vec<f64> {
        debug_assert_eq!(x.len(), 4 * self.n);
        apply_dense(&self.a, x)
    }

    /// Solve the local operator against a slice (preconditioner block).
    pub fn apply_preconditioner(&self, x: &[f64]) -> SpindleResult<Vec<f64>> {
        self.a_lu
            .solve(x)
            .map_err(spindle_types::SpindleError::InvalidConfig)
    }

    /// Force density (3×n) implied by a solution slice.
    pub fn force_density(&self, x: &[f64]) -> Mat<f64> {
        let flat = apply_dense(&self.force_operator, x);
        spindle_math::dense::unflatten_columns(&flat)
    }

    /// Rows of the operator that receive the inter-entity flow during
    /// the global matvec: interior momentum rows only (BC and tension
    /// rows never see ambient flow).
    pub fn flow_rows(&self) -> std::ops::Range<usize> {
        6..3 * (self.n - 2)
    }

    // ─── internals ────────────────────────────────────────────

    fn unit_tangent(&self, i: usize) -> DVec3 {
        let t = self.col3(&self.xs, i);
        let len = t.length();
        if len > 0.0 {
            t / len
        } else {
            DVec3::X
        }
    }

    fn col3(&self, m: &Mat<f64>, i: usize) -> DVec3 {
        DVec3::new(m[(0, i)], m[(1, i)], m[(2, i)])
    }

    /// Local slender-body mobility at node i:
    /// c0 (I + t̂t̂ᵀ) + c1 (I − t̂t̂ᵀ).
    fn local_mobility(&self, i: usize) -> [[f64; 3]; 3] {
        let t = self.unit_tangent(i);
        let t_arr = [t.x, t.y, t.z];
        let mut m = [[0.0; 3]; 3];
        for c in 0..3 {
            for d in 0..3 {
                let delta = if c == d { 1.0 } else { 0.0 };
                let tt = t_arr[c] * t_arr[d];
                m[c][d] = self.c0 * (delta + tt) + self.c1 * (delta - tt);
            }
        }
        m
    }

    fn end_nodes(&self, end: End) -> (usize, usize) {
        match end {
            End::Minus => (0, 1),
            End::Plus => (self.n - 1, self.n - 2),
        }
    }

    fn end_pair(&self, end: End) -> (EndCondition, EndCondition) {
        match end {
            End::Minus => self.bc_minus,
            End::Plus => self.bc_plus,
        }
    }

    fn end_targets(&self, end: End) -> (DVec3, DVec3) {
        match end {
            End::Minus => self.bc_minus_targets,
            End::Plus => self.bc_plus_targets,
        }
    }

    /// Write the six momentum BC rows and one tension BC row for an end.
    fn write_end_rows(&self, a: &mut Mat<f64>, end: End, dt: f64) {
        let n = self.n;
        let (e, adjacent) = self.end_nodes(end);
        let (bc1, bc2) = self.end_pair(end);

        self.write_bc_row(a, 3 * e, e, bc1, dt);
        self.write_bc_row(a, 3 * adjacent, e, bc2, dt);

        // Tension row at the end node.
        let row = 3 * n + e;
        for col in 0..4 * n {
            a[(row, col)] = 0.0;
        }
        let ts = self.unit_tangent(e);
        if bc1 == EndCondition::Force || bc2 == EndCondition::Force {
            // Tangential component of the force balance:
            // T − κ x̂_s·X_sss = x̂_s·F.
            a[(row, 3 * n + e)] = 1.0;
            for j in 0..n {
                let d3 = self.basis.d3[(e, j)];
                for d in 0..3 {
                    a[(row, 3 * j + d)] -= self.bending_rigidity * ts[d] * d3;
                }
            }
        } else {
            // Boundary inextensibility, penalty-weighted like the
            // interior constraint rows.
            for j in 0..n {
                let d1 = self.basis.d1[(e, j)];
                for d in 0..3 {
                    a[(row, 3 * j + d)] = self.penalty * ts[d] * d1;
                }
            }
        }
    }

    /// Write one 3-row BC block evaluated at end node `e` into rows
    /// `row..row+3`.
    fn write_bc_row(&self, a: &mut Mat<f64>, row: usize, e: usize, kind: EndCondition, dt: f64) {
        let n = self.n;
        for r in row..row + 3 {
            for col in 0..4 * n {
                a[(r, col)] = 0.0;
            }
        }

        match kind {
            EndCondition::Velocity => {
                for c in 0..3 {
                    a[(row + c, 3 * e + c)] = 1.0 / dt;
                }
            }
            EndCondition::Position => {
                for c in 0..3 {
                    a[(row + c, 3 * e + c)] = 1.0;
                }
            }
            EndCondition::AngularVelocity => {
                for j in 0..n {
                    let d1 = self.basis.d1[(e, j)];
                    for c in 0..3 {
                        a[(row + c, 3 * j + c)] = d1 / dt;
                    }
                }
            }
            EndCondition::Angle => {
                for j in 0..n {
                    let d1 = self.basis.d1[(e, j)];
                    for c in 0..3 {
                        a[(row + c, 3 * j + c)] = d1;
                    }
                }
            }
            EndCondition::Force => {
                let ts = self.unit_tangent(e);
                for j in 0..n {
                    let d3 = self.basis.d3[(e, j)];
                    for c in 0..3 {
                        a[(row + c, 3 * j + c)] = -self.bending_rigidity * d3;
                    }
                }
                for c in 0..3 {
                    a[(row + c, 3 * n + e)] = ts[c];
                }
            }
            EndCondition::Torque => {
                for j in 0..n {
                    let d2 = self.basis.d2[(e, j)];
                    for c in 0..3 {
                        a[(row + c, 3 * j + c)] = self.bending_rigidity * d2;
                    }
                }
            }
        }
    }

    /// Fill the RHS entries owned by an end's BC rows.
    fn write_end_rhs(&mut self, end: End, dt: f64) {
        let n = self.n;
        let (e, adjacent) = self.end_nodes(end);
        let (bc1, bc2) = self.end_pair(end);
        let (target1, target2) = self.end_targets(end);

        let rhs1 = self.bc_rhs(e, bc1, target1, dt);
        let rhs2 = self.bc_rhs(e, bc2, target2, dt);
        for c in 0..3 {
            self.rhs[3 * e + c] = rhs1[c];
            self.rhs[3 * adjacent + c] = rhs2[c];
        }

        let ts = self.unit_tangent(e);
        self.rhs[3 * n + e] = if bc1 == EndCondition::Force {
            ts.dot(target1)
        } else if bc2 == EndCondition::Force {
            ts.dot(target2)
        } else {
            self.penalty
        };
    }

    fn bc_rhs(&self, e: usize, kind: EndCondition, target: DVec3, dt: f64) -> [f64; 3] {
        let x_e = self.col3(&self.x, e);
        let xs_e = self.col3(&self.xs, e);
        let v = match kind {
            EndCondition::Velocity => target + x_e / dt,
            EndCondition::Position => target,
            EndCondition::AngularVelocity => target.cross(self.unit_tangent(e)) + xs_e / dt,
            EndCondition::Angle => target,
            EndCondition::Force => target,
            EndCondition::Torque => target,
        };
        [v.x, v.y, v.z]
    }

    fn build_force_operator(&self) -> Mat<f64> {
        let n = self.n;
        let kappa = self.bending_rigidity;
        let mut op = Mat::<f64>::zeros(3 * n, 4 * n);

        for i in 0..n {
            let ts = self.col3(&self.xs, i);
            let tss = self.col3(&self.xss, i);
            for j in 0..n {
                let d4 = self.basis.d4[(i, j)];
                let d1 = self.basis.d1[(i, j)];
                for c in 0..3 {
                    op[(3 * i + c, 3 * j + c)] -= kappa * d4;
                    let mut t_col = d1 * ts[c];
                    if i == j {
                        t_col += tss[c];
                    }
                    op[(3 * i + c, 3 * n + j)] += t_col;
                }
            }
        }
        op
    }
}

/// y(c, i) = Σ_j d(i, j) x(c, j), i.e. x · dᵀ.
fn deriv(x: &Mat<f64>, d: &Mat<f64>) -> Mat<f64> {
    let n = x.ncols();
    Mat::from_fn(3, n, |c, i| {
        let mut acc = 0.0;
        for j in 0..n {
            acc += d[(i, j)] * x[(c, j)];
        }
        acc
    })
}

fn mat3_mul(m: &[[f64; 3]; 3], v: DVec3) -> DVec3 {
    let v_arr = [v.x, v.y, v.z];
    let mut out = [0.0; 3];
    for (c, out_c) in out.iter_mut().enumerate() {
        for d in 0..3 {
            *out_c += m[c][d] * v_arr[d];
        }
    }
    DVec3::new(out[0], out[1], out[2])
}

/// Dense matrix-vector product.
pub(crate) fn apply_dense(a: &Mat<f64>, x: &[f64]) -> Vec<f64> {
    debug_assert_eq!(a.ncols(), x.len());
    let mut out = vec![0.0; a.nrows()];
    for (i, out_i) in out.iter_mut().enumerate() {
        let mut acc = 0.0;
        for (j, &xj) in x.iter().enumerate() {
            acc += a[(i, j)] * xj;
        }
        *out_i = acc;
    }
    out
}
