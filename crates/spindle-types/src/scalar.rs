//! Scalar type alias for the solver.
//!
//! Everything runs in `f64`. Spectral differentiation matrices are badly
//! conditioned at high collocation order and the boundary-integral
//! kernels are evaluated arbitrarily close to their singularities, so
//! single precision is not an option for the core solve.

/// The floating-point type used throughout the solver.
pub type Scalar = f64;
