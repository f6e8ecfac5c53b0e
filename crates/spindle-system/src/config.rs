//! Solver parameters.
//!
//! Values arrive pre-validated from the external configuration loader;
//! this struct only carries them to the components that consume them.

use serde::{Deserialize, Serialize};
use spindle_types::constants;

/// Parameters for one simulation's solves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Fluid viscosity.
    pub eta: f64,

    /// Timestep.
    pub dt: f64,

    /// Penalty weight on fiber inextensibility rows.
    pub fiber_penalty: f64,

    /// Fiber slenderness ratio (radius / length).
    pub slenderness: f64,

    /// Kernel regularization width for near-singular pairs.
    pub reg: f64,

    /// Distance below which kernels switch to the regularized branch.
    pub eps: f64,

    /// Cutoff separating direct near-field evaluation from the
    /// far-field multipole pass. Tunable, not hardcoded.
    pub near_field_cutoff: f64,

    /// Hard cap on outer Krylov iterations; exceeding it rejects the
    /// step.
    pub max_krylov_iterations: u32,

    /// Relative residual tolerance for the outer Krylov solve.
    pub krylov_tolerance: f64,

    /// Rank that materializes full body state.
    pub coordinator_rank: usize,

    /// Minimum separation enforced by post-solve collision checks.
    pub collision_threshold: f64,

    /// Uniform background flow imposed on the whole domain.
    pub background_flow: [f64; 3],
}

impl Default for Params {
    fn default() -> Self {
        Self {
            eta: constants::DEFAULT_VISCOSITY,
            dt: constants::DEFAULT_DT,
            fiber_penalty: constants::DEFAULT_FIBER_PENALTY,
            slenderness: constants::DEFAULT_SLENDERNESS,
            reg: constants::DEFAULT_REGULARIZATION,
            eps: constants::DEFAULT_SINGULARITY_EPS,
            near_field_cutoff: constants::DEFAULT_NEAR_FIELD_CUTOFF,
            max_krylov_iterations: constants::DEFAULT_MAX_KRYLOV_ITERATIONS,
            krylov_tolerance: constants::DEFAULT_KRYLOV_TOLERANCE,
            coordinator_rank: 0,
            collision_threshold: 0.0,
            background_flow: [0.0; 3],
        }
    }
}

impl Params {
    /// Loose settings for debugging: few iterations, loose tolerance.
    pub fn relaxed() -> Self {
        Self {
            max_krylov_iterations: 30,
            krylov_tolerance: 1.0e-4,
            ..Default::default()
        }
    }
}
