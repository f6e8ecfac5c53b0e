//! Fiber–body link conditions.
//!
//! A bound fiber's minus end is pinned to a body nucleation site by
//! direct BC substitution: its velocity/angular-velocity BC rows couple
//! to the body's rigid unknowns, and the fiber's end force and torque
//! feed back into the body's force-balance rows. Both couplings are
//! linear in the unknowns and enter the global matvec; neither appears
//! in the block-diagonal preconditioner.

use faer::Mat;
use glam::DVec3;
use spindle_body::BodyContainer;
use spindle_fiber::FiberContainer;

/// Link coupling evaluated for one solution vector.
pub struct LinkConditions {
    /// Per bound fiber: (fiber index, site velocity, body angular
    /// velocity) to subtract from the minus-end BC rows.
    pub fiber_velocities: Vec<(usize, DVec3, DVec3)>,
    /// Per body: accumulated [force; torque] from its bound fibers, to
    /// subtract from the body's rigid rows. Flattened 6 per body.
    pub body_loads: Vec<f64>,
}

/// Evaluate the link conditions for the current fiber forces and body
/// rigid velocities.
///
/// `fiber_end_forces` is the per-node force density of the fiber
/// solution (3×total fiber nodes); `body_velocities` is 6×n_bodies
/// (identical on every rank after broadcast).
pub fn calculate_body_fiber_link_conditions(
    fibers: &FiberContainer,
    bodies: &BodyContainer,
    fiber_end_forces: &Mat<f64>,
    body_velocities: &Mat<f64>,
) -> LinkConditions {
    let mut fiber_velocities = Vec::new();
    let mut body_loads = vec![0.0; 6 * bodies.global_count()];

    let mut node_off = 0;
    for (i_fib, fiber) in fibers.fibers.iter().enumerate() {
        let n = fiber.n;
        if let Some(site) = fiber.binding_site {
            let center = bodies.bodies[site.body].position;
            let attach = bodies.nucleation_site(site.body, site.site);
            let u = DVec3::new(
                body_velocities[(0, site.body)],
                body_velocities[(1, site.body)],
                body_velocities[(2, site.body)],
            );
            let w = DVec3::new(
                body_velocities[(3, site.body)],
                body_velocities[(4, site.body)],
                body_velocities[(5, site.body)],
            );
            let v_site = u + w.cross(attach - center);
            fiber_velocities.push((i_fib, v_site, w));

            // Reaction on the body from the fiber's end force.
            let f_end = DVec3::new(
                fiber_end_forces[(0, node_off)],
                fiber_end_forces[(1, node_off)],
                fiber_end_forces[(2, node_off)],
            );
            let reaction = -f_end;
            let torque = (attach - center).cross(reaction);
            for c in 0..3 {
                body_loads[6 * site.body + c] += reaction[c];
                body_loads[6 * site.body + 3 + c] += torque[c];
            }
        }
        node_off += n;
    }

    LinkConditions {
        fiber_velocities,
        body_loads,
    }
}
