//! Physical constants and solver defaults.
//!
//! Tunables (regularization width, near-field cutoff, ...) are read only
//! by `Params::default()` in spindle-system; runtime code takes them as
//! parameters.

/// Default fluid viscosity (simulation units).
pub const DEFAULT_VISCOSITY: f64 = 1.0;

/// Default timestep (simulation time units).
pub const DEFAULT_DT: f64 = 0.005;

/// Default kernel regularization width. Replaces `r` by
/// `sqrt(r² + reg²)` inside the singularity cutoff.
pub const DEFAULT_REGULARIZATION: f64 = 5.0e-3;

/// Distance below which kernel evaluations switch to the regularized
/// branch. Pairs closer than this are considered near-singular.
pub const DEFAULT_SINGULARITY_EPS: f64 = 1.0e-10;

/// Default cutoff distance separating direct near-field kernel
/// evaluation from the far-field multipole pass.
pub const DEFAULT_NEAR_FIELD_CUTOFF: f64 = 5.0;

/// Default penalty weight on the fiber inextensibility constraint rows.
pub const DEFAULT_FIBER_PENALTY: f64 = 500.0;

/// Default fiber slenderness ratio (radius / length), entering the
/// slender-body mobility coefficients.
pub const DEFAULT_SLENDERNESS: f64 = 1.0e-3;

/// Hard cap on outer Krylov iterations before a step is rejected.
pub const DEFAULT_MAX_KRYLOV_ITERATIONS: u32 = 300;

/// Default relative residual tolerance for the outer Krylov solve.
pub const DEFAULT_KRYLOV_TOLERANCE: f64 = 1.0e-8;

/// Epsilon for floating-point comparisons in tests and guards.
pub const EPSILON: f64 = 1.0e-12;
