//! The global matrix-free operator and per-step orchestration.
//!
//! Per timestep the phase machine runs Idle → RhsAssembly →
//! IterativeSolve → Accepted/Rejected. The externally-owned Krylov
//! driver repeatedly calls [`SystemSolver::apply_matvec`] and
//! [`SystemSolver::apply_preconditioner`] between `begin_step` and
//! `finalize_step`; this type owns the partitioning of the unknown
//! vector, the one shared far-field pass per operator application, and
//! the fiber–body link coupling.
//!
//! The preconditioner is strictly block-diagonal: the far-field
//! coupling is left to the Krylov iteration.

use std::time::Instant;

use faer::Mat;
use glam::{DQuat, DVec3};
use spindle_body::BodyContainer;
use spindle_comm::Communicator;
use spindle_fiber::{EndCondition, FiberContainer};
use spindle_kernels::{stokes_velocity_fmm, DirectSum, MultipoleBackend};
use spindle_periphery::Periphery;
use spindle_telemetry::TelemetryBus;
use spindle_types::{SpindleError, SpindleResult};

use crate::config::Params;
use crate::linking::calculate_body_fiber_link_conditions;
use crate::solution::{local_solution_sizes, split, SolutionSizes};

/// Phase of the per-timestep state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    Idle,
    RhsAssembly,
    IterativeSolve,
    Accepted,
    Rejected,
}

/// Why a step was rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RejectReason {
    /// The Krylov solve exhausted its iteration budget.
    NonConvergence { iterations: u32, residual: f64 },
    /// Post-solve geometry failed a collision check.
    Collision,
}

/// Verdict on a completed step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    Accepted,
    Rejected(RejectReason),
}

/// The system-level operator over [fibers | bodies | periphery].
pub struct SystemSolver<C: Communicator> {
    pub params: Params,
    pub fibers: FiberContainer,
    pub bodies: BodyContainer,
    /// Exactly one periphery per simulation, possibly empty.
    pub periphery: Periphery,
    pub telemetry: TelemetryBus,
    comm: C,
    fmm: Box<dyn MultipoleBackend>,
    phase: StepPhase,
    step_index: u64,
    sim_time: f64,
    step_started: Option<Instant>,
}

impl<C: Communicator> SystemSolver<C> {
    /// Assemble the system. When collision checking is enabled (a
    /// positive threshold), every shape must carry the collision
    /// capability — a missing one fails here, at construction.
    pub fn new(
        params: Params,
        fibers: FiberContainer,
        bodies: BodyContainer,
        periphery: Periphery,
        comm: C,
        fmm: Box<dyn MultipoleBackend>,
    ) -> SpindleResult<Self> {
        if params.collision_threshold > 0.0 {
            for body in &bodies.bodies {
                body.shape.require_collision_support()?;
            }
            if periphery.n_nodes_global > 0 {
                periphery.shape.require_collision_support()?;
            }
        }
        Ok(Self {
            params,
            fibers,
            bodies,
            periphery,
            telemetry: TelemetryBus::new(),
            comm,
            fmm,
            phase: StepPhase::Idle,
            step_index: 0,
            sim_time: 0.0,
            step_started: None,
        })
    }

    pub fn phase(&self) -> StepPhase {
        self.phase
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    /// Current local block sizes, recomputed from entity counts.
    pub fn local_solution_sizes(&self) -> SolutionSizes {
        local_solution_sizes(&self.fibers, &self.bodies, &self.periphery)
    }

    /// Enter a step: rebuild all local operators for the current
    /// geometry and assemble the global RHS. Returns the RHS and leaves
    /// the machine in IterativeSolve, ready for the Krylov driver.
    pub fn begin_step(
        &mut self,
        fiber_external_force: Option<&Mat<f64>>,
    ) -> SpindleResult<Vec<f64>> {
        self.step_index += 1;
        self.step_started = Some(Instant::now());
        self.telemetry.begin_step(self.step_index, self.sim_time);
        self.phase = StepPhase::RhsAssembly;

        self.rebuild_operators()?;
        let rhs = self.assemble_rhs(fiber_external_force)?;

        self.phase = StepPhase::IterativeSolve;
        Ok(rhs)
    }

    /// Report one Krylov iteration (called by the external driver).
    pub fn record_iteration(&self, iteration: u32, residual: f64) {
        self.telemetry.emit_iteration(iteration, residual);
    }

    /// Close a step after the Krylov driver finishes. Non-convergence
    /// and post-solve collision both reject the step; a rejected step
    /// leaves all entity state untouched for the outer stepper to retry
    /// with a smaller timestep.
    pub fn finalize_step(
        &mut self,
        solution: &[f64],
        iterations: u32,
        residual: f64,
        converged: bool,
    ) -> SpindleResult<StepOutcome> {
        if self.phase != StepPhase::IterativeSolve {
            return Err(SpindleError::InvalidConfig(format!(
                "finalize_step called in phase {:?}",
                self.phase
            )));
        }

        self.telemetry.emit_convergence(iterations, residual, converged);
        let wall_time = self
            .step_started
            .take()
            .map_or(0.0, |t| t.elapsed().as_secs_f64());

        if !converged {
            self.phase = StepPhase::Rejected;
            self.telemetry
                .emit_outcome(false, format!("no convergence after {iterations} iterations"));
            self.telemetry
                .emit(spindle_telemetry::EventKind::StepEnd { wall_time });
            self.telemetry.flush();
            return Ok(StepOutcome::Rejected(RejectReason::NonConvergence {
                iterations,
                residual,
            }));
        }

        if self.check_collision(solution)? {
            self.phase = StepPhase::Rejected;
            self.telemetry.emit_outcome(false, "post-solve collision");
            self.telemetry
                .emit(spindle_telemetry::EventKind::StepEnd { wall_time });
            self.telemetry.flush();
            return Ok(StepOutcome::Rejected(RejectReason::Collision));
        }

        self.apply_solution(solution)?;
        self.sim_time += self.params.dt;
        self.phase = StepPhase::Accepted;
        self.telemetry.emit_outcome(true, "");
        self.telemetry
            .emit(spindle_telemetry::EventKind::StepEnd { wall_time });
        self.telemetry.flush();
        Ok(StepOutcome::Accepted)
    }

    /// Rebuild every component's local operators for the current
    /// geometry. Idempotent; also the restore path after a checkpoint.
    pub fn rebuild_operators(&mut self) -> SpindleResult<()> {
        let p = &self.params;

        let start = Instant::now();
        // Bound fibers get link-driven end conditions before the
        // operator rows are written.
        for fiber in &mut self.fibers.fibers {
            if fiber.binding_site.is_some() {
                fiber.set_bc_minus(
                    (EndCondition::Velocity, EndCondition::AngularVelocity),
                    (DVec3::ZERO, DVec3::ZERO),
                );
            }
        }
        self.fibers.update_derivatives();
        self.fibers.update_stokeslets(p.eta, p.reg, p.eps);
        self.fibers.form_linear_operators(p.dt, p.eta)?;
        self.telemetry
            .emit_rebuild("fibers", start.elapsed().as_secs_f64());

        let start = Instant::now();
        self.bodies.update_cache_variables(p.eta, p.reg, p.eps)?;
        self.telemetry
            .emit_rebuild("bodies", start.elapsed().as_secs_f64());

        Ok(())
    }

    /// Assemble the global RHS, ordered [fibers | bodies | periphery].
    ///
    /// The known flow at every node is the uniform background plus the
    /// flow sourced by fiber external forces plus every body's
    /// completion flow (center Stokeslet/rotlet carrying its external
    /// force/torque, evaluated at all targets including its own nodes).
    pub fn assemble_rhs(
        &mut self,
        fiber_external_force: Option<&Mat<f64>>,
    ) -> SpindleResult<Vec<f64>> {
        let p = self.params.clone();
        let nf = self.fibers.local_node_count();
        let nb = self.bodies.local_node_count();
        let ns = self.periphery.local_node_count();

        let f_ext = match fiber_external_force {
            Some(m) => {
                debug_assert_eq!(m.ncols(), nf);
                m.clone()
            }
            None => Mat::zeros(3, nf),
        };

        let body_pos = self.bodies.local_node_positions();
        let shell_pos = self.periphery.local_node_positions();
        let other_targets = hcat(&body_pos, &shell_pos);
        let all_targets = hcat(&self.fibers.node_positions(), &other_targets);

        let mut v = Mat::<f64>::zeros(3, nf + nb + ns);
        for t in 0..nf + nb + ns {
            for c in 0..3 {
                v[(c, t)] += p.background_flow[c];
            }
        }

        if nf > 0 {
            let use_direct = self.fits_near_field(&all_targets);
            let mut direct = DirectSum::new(p.reg, p.eps);
            let backend: &mut dyn MultipoleBackend = if use_direct {
                &mut direct
            } else {
                self.fmm.as_mut()
            };
            let flow = self.fibers.flow(&f_ext, &other_targets, p.eta, backend)?;
            for t in 0..nf + nb + ns {
                for c in 0..3 {
                    v[(c, t)] += flow[(c, t)];
                }
            }
        }

        let completion = self
            .bodies
            .completion_flow(&all_targets, p.eta, p.reg, p.eps);
        for t in 0..nf + nb + ns {
            for c in 0..3 {
                v[(c, t)] += completion[(c, t)];
            }
        }

        let v_f = submatrix(&v, 0, nf);
        let v_b = submatrix(&v, nf, nb);
        let v_s = submatrix(&v, nf + nb, ns);

        self.fibers.compute_rhs(p.dt, &v_f, &f_ext);
        self.bodies.update_rhs(&v_b);
        self.periphery.update_rhs(&v_s);

        let mut rhs = self.fibers.get_rhs();
        rhs.extend(self.bodies.get_rhs());
        rhs.extend(self.periphery.get_rhs());
        Ok(rhs)
    }

    /// The global matrix-free matvec: per-component local operators
    /// plus one shared far-field evaluation over all sources at all
    /// targets, plus the fiber–body link coupling.
    pub fn apply_matvec(&mut self, x: &[f64]) -> SpindleResult<Vec<f64>> {
        let sizes = self.local_solution_sizes();
        let (x_f, x_b, x_s) = split(x, &sizes)?;
        let p = self.params.clone();

        let nf = self.fibers.local_node_count();
        let nb = self.bodies.local_node_count();
        let ns = self.periphery.local_node_count();

        // Component sources.
        let fiber_forces = if sizes.fibers > 0 {
            self.fibers.apply_fiber_force(x_f)
        } else {
            Mat::zeros(3, 0)
        };

        let (body_densities, body_velocities) = self.bodies.unpack_solution_vector(x_b);
        let mut velocities_flat = flatten(&body_velocities);
        self.comm
            .broadcast(&mut velocities_flat, p.coordinator_rank)?;
        let body_velocities = Mat::from_fn(6, self.bodies.global_count(), |c, j| {
            velocities_flat[6 * j + c]
        });

        let shell_density_global = if ns > 0 {
            let x_global = self
                .comm
                .allgatherv(x_s, &self.periphery.node_partition.scaled(3))?;
            spindle_math::dense::unflatten_columns(&x_global)
        } else {
            Mat::zeros(3, 0)
        };

        // One shared far-field evaluation at every target.
        let fiber_pos = self.fibers.node_positions();
        let body_pos = self.bodies.local_node_positions();
        let shell_pos = self.periphery.local_node_positions();
        let other_targets = hcat(&body_pos, &shell_pos);
        let all_targets = hcat(&fiber_pos, &other_targets);
        let use_direct = self.fits_near_field(&all_targets);

        let mut v = Mat::<f64>::zeros(3, nf + nb + ns);

        if nf > 0 {
            let mut direct = DirectSum::new(p.reg, p.eps);
            let backend: &mut dyn MultipoleBackend = if use_direct {
                &mut direct
            } else {
                self.fmm.as_mut()
            };
            let flow = self
                .fibers
                .flow(&fiber_forces, &other_targets, p.eta, backend)?;
            accumulate(&mut v, &flow);
        }

        // Double-layer pass: body + shell densities together.
        if nb + self.periphery.n_nodes_global > 0 {
            let body_normals = self.bodies.local_node_normals();
            let body_dl = density_outer_normal(&body_densities, &body_normals);
            let shell_dl = density_outer_normal(
                &shell_density_global,
                &self.periphery.global_node_normals,
            );
            let dl_points = hcat(&body_pos, &self.periphery.global_node_positions);
            let dl_values = hcat(&body_dl, &shell_dl);

            let empty = Mat::<f64>::zeros(3, 0);
            let mut direct = DirectSum::new(p.reg, p.eps);
            let backend: &mut dyn MultipoleBackend = if use_direct {
                &mut direct
            } else {
                self.fmm.as_mut()
            };
            let v_dl = stokes_velocity_fmm(
                backend,
                &empty,
                &empty,
                &dl_points,
                &dl_values,
                &all_targets,
                p.eta,
            )?;
            accumulate(&mut v, &v_dl);

            // Subtract what each entity's local operator already
            // carries: the body's own density flow at its own nodes and
            // the shell's self coupling at its local nodes.
            let mut node_off = nf;
            let mut density_off = 0;
            for body in &self.bodies.bodies {
                if nb == 0 {
                    break;
                }
                let slice = submatrix(&body_densities, density_off, body.n_nodes);
                let self_flow = body.self_density_flow(&slice, p.eta, p.reg, p.eps);
                for j in 0..body.n_nodes {
                    for c in 0..3 {
                        v[(c, node_off + j)] -= self_flow[(c, j)];
                    }
                }
                node_off += body.n_nodes;
                density_off += body.n_nodes;
            }

            if ns > 0 {
                let self_flow =
                    self.periphery
                        .self_flow(&shell_density_global, p.eta, p.reg, p.eps);
                for j in 0..ns {
                    for c in 0..3 {
                        v[(c, nf + nb + j)] -= self_flow[(c, j)];
                    }
                }
            }
        }

        // Link conditions: bound fiber ends couple to body rigid
        // velocities, fiber end forces feed body force balance.
        let links = calculate_body_fiber_link_conditions(
            &self.fibers,
            &self.bodies,
            &fiber_forces,
            &body_velocities,
        );
        let body_loads = self.comm.allreduce_sum(&links.body_loads)?;

        // Component matvecs.
        let v_f = submatrix(&v, 0, nf);
        let v_b = submatrix(&v, nf, nb);
        let v_s = submatrix(&v, nf + nb, ns);

        let mut res_f = self.fibers.matvec(x_f, &v_f);
        let fiber_offsets = {
            let mut acc = 0;
            self.fibers
                .fibers
                .iter()
                .map(|f| {
                    let off = acc;
                    acc += f.solution_size();
                    off
                })
                .collect::<Vec<_>>()
        };
        for (i_fib, v_site, w) in &links.fiber_velocities {
            let off = fiber_offsets[*i_fib];
            let tangent = self.fibers.fibers[*i_fib].minus_end_tangent();
            let w_cross_t = w.cross(tangent);
            for c in 0..3 {
                res_f[off + c] -= v_site[c];
                res_f[off + 3 + c] -= w_cross_t[c];
            }
        }

        let mut res_b = self.bodies.matvec(x_b, &v_b);
        if self.bodies.is_coordinator() {
            let mut off = 0;
            for (ib, body) in self.bodies.bodies.iter().enumerate() {
                for c in 0..6 {
                    res_b[off + 3 * body.n_nodes + c] -= body_loads[6 * ib + c];
                }
                off += body.solution_size();
            }
        }

        let res_s = self.periphery.matvec(x_s, &v_s, &self.comm)?;

        let mut out = res_f;
        out.extend(res_b);
        out.extend(res_s);
        Ok(out)
    }

    /// Block-diagonal preconditioner: each component solves only its
    /// own slice; the far-field coupling is deliberately left out.
    pub fn apply_preconditioner(&self, x: &[f64]) -> SpindleResult<Vec<f64>> {
        let sizes = self.local_solution_sizes();
        let (x_f, x_b, x_s) = split(x, &sizes)?;

        let mut out = self.fibers.apply_preconditioner(x_f)?;
        out.extend(self.bodies.apply_preconditioner(x_b)?);
        out.extend(self.periphery.apply_preconditioner(x_s, &self.comm)?);
        Ok(out)
    }

    /// Split a solution vector into per-component views: fiber slices,
    /// body (densities, 6-DOF velocities), shell density.
    pub fn unpack_solution_vector<'a>(
        &self,
        x: &'a [f64],
    ) -> SpindleResult<(&'a [f64], (Mat<f64>, Mat<f64>), &'a [f64])> {
        let sizes = self.local_solution_sizes();
        let (x_f, x_b, x_s) = split(x, &sizes)?;
        Ok((x_f, self.bodies.unpack_solution_vector(x_b), x_s))
    }

    // ─── internals ────────────────────────────────────────────

    /// Whether every point fits within the near-field cutoff, in which
    /// case direct evaluation replaces the shared multipole pass.
    fn fits_near_field(&self, points: &Mat<f64>) -> bool {
        let n = points.ncols();
        if n == 0 {
            return true;
        }
        let mut min = [f64::MAX; 3];
        let mut max = [f64::MIN; 3];
        for j in 0..n {
            for c in 0..3 {
                min[c] = min[c].min(points[(c, j)]);
                max[c] = max[c].max(points[(c, j)]);
            }
        }
        let diag2: f64 = (0..3).map(|c| (max[c] - min[c]).powi(2)).sum();
        diag2.sqrt() <= self.params.near_field_cutoff
    }

    /// Post-solve geometric check on the candidate state.
    fn check_collision(&self, solution: &[f64]) -> SpindleResult<bool> {
        let threshold = self.params.collision_threshold;
        if threshold <= 0.0 {
            return Ok(false);
        }

        let sizes = self.local_solution_sizes();
        let (x_f, x_b, _) = split(solution, &sizes)?;
        let (_, velocities) = self.bodies.unpack_solution_vector(x_b);

        // Candidate body centers after this step.
        let dt = self.params.dt;
        let centers: Vec<DVec3> = self
            .bodies
            .bodies
            .iter()
            .enumerate()
            .map(|(ib, b)| {
                let u = if velocities.ncols() > ib {
                    DVec3::new(
                        velocities[(0, ib)],
                        velocities[(1, ib)],
                        velocities[(2, ib)],
                    )
                } else {
                    DVec3::ZERO
                };
                b.position + u * dt
            })
            .collect();

        for (ia, a) in self.bodies.bodies.iter().enumerate() {
            for (ib, b) in self.bodies.bodies.iter().enumerate().skip(ia + 1) {
                if spindle_body::shape::check_body_body_collision(
                    centers[ia],
                    &a.shape,
                    centers[ib],
                    &b.shape,
                    threshold,
                )? {
                    return Ok(true);
                }
            }
            let radius = match a.shape {
                spindle_body::BodyShape::Sphere { radius } => radius,
                spindle_body::BodyShape::Generic => 0.0,
            };
            if self
                .periphery
                .check_collision_sphere(centers[ia], radius, threshold)?
            {
                return Ok(true);
            }
        }

        // Candidate fiber point clouds against the shell.
        if self.periphery.n_nodes_global > 0 {
            let mut off = 0;
            for fiber in &self.fibers.fibers {
                let positions =
                    Mat::from_fn(3, fiber.n, |c, j| x_f[off + 3 * j + c]);
                if self
                    .periphery
                    .check_collision_points(&positions, threshold)?
                {
                    return Ok(true);
                }
                off += fiber.solution_size();
            }
        }

        Ok(false)
    }

    /// Commit an accepted solution: fibers take their end-of-step
    /// positions, bodies take their rigid velocities and advance pose.
    fn apply_solution(&mut self, solution: &[f64]) -> SpindleResult<()> {
        let sizes = self.local_solution_sizes();
        let (x_f, x_b, _) = split(solution, &sizes)?;
        let p = self.params.clone();

        let mut off = 0;
        for fiber in &mut self.fibers.fibers {
            let positions = Mat::from_fn(3, fiber.n, |c, j| x_f[off + 3 * j + c]);
            fiber.set_positions(positions);
            off += fiber.solution_size();
        }
        self.fibers.update_derivatives();
        self.fibers.update_stokeslets(p.eta, p.reg, p.eps);

        let (_, velocities) = self.bodies.unpack_solution_vector(x_b);
        let mut velocities_flat = flatten(&velocities);
        self.comm
            .broadcast(&mut velocities_flat, p.coordinator_rank)?;

        for (ib, body) in self.bodies.bodies.iter_mut().enumerate() {
            let u = DVec3::new(
                velocities_flat[6 * ib],
                velocities_flat[6 * ib + 1],
                velocities_flat[6 * ib + 2],
            );
            let w = DVec3::new(
                velocities_flat[6 * ib + 3],
                velocities_flat[6 * ib + 4],
                velocities_flat[6 * ib + 5],
            );
            body.velocity = u;
            body.angular_velocity = w;

            let new_pos = body.position + u * p.dt;
            let new_orientation =
                (DQuat::from_scaled_axis(w * p.dt) * body.orientation).normalize();
            body.move_to(new_pos, new_orientation);
        }
        self.bodies.update_cache_variables(p.eta, p.reg, p.eps)?;
        Ok(())
    }
}

fn hcat(a: &Mat<f64>, b: &Mat<f64>) -> Mat<f64> {
    let rows = a.nrows().max(b.nrows()).max(3);
    Mat::from_fn(rows, a.ncols() + b.ncols(), |i, j| {
        if j < a.ncols() {
            if i < a.nrows() {
                a[(i, j)]
            } else {
                0.0
            }
        } else if i < b.nrows() {
            b[(i, j - a.ncols())]
        } else {
            0.0
        }
    })
}

fn submatrix(m: &Mat<f64>, col_start: usize, cols: usize) -> Mat<f64> {
    Mat::from_fn(m.nrows(), cols, |i, j| m[(i, col_start + j)])
}

fn accumulate(into: &mut Mat<f64>, from: &Mat<f64>) {
    debug_assert_eq!(into.ncols(), from.ncols());
    for j in 0..into.ncols() {
        for c in 0..3 {
            into[(c, j)] += from[(c, j)];
        }
    }
}

fn flatten(m: &Mat<f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(m.nrows() * m.ncols());
    for j in 0..m.ncols() {
        for i in 0..m.nrows() {
            out.push(m[(i, j)]);
        }
    }
    out
}

fn density_outer_normal(density: &Mat<f64>, normals: &Mat<f64>) -> Mat<f64> {
    debug_assert_eq!(density.ncols(), normals.ncols());
    Mat::from_fn(9, density.ncols(), |r, j| {
        density[(r / 3, j)] * normals[(r % 3, j)]
    })
}
