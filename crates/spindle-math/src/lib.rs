//! # spindle-math
//!
//! Linear algebra primitives for the Spindle solver.
//!
//! Provides:
//! - Re-exports of `glam` f64 types (`DVec3`, `DMat3`, `DQuat`)
//! - A dense LU solver wrapping `faer` (factorize once, solve many)
//! - Chebyshev spectral differentiation matrices and Clenshaw–Curtis
//!   quadrature for fiber collocation
//! - Gauss–Legendre nodes/weights for reference surface grids
//!
//! Point sets follow the convention used throughout Spindle: a
//! `faer::Mat<f64>` of shape 3×n, one column per point.

pub mod chebyshev;
pub mod dense;
pub mod gauss;

// Re-export glam f64 types as the canonical small-vector types.
pub use glam::{DMat3, DQuat, DVec3};

/// Re-export of the dense matrix type used everywhere in Spindle.
pub use faer::Mat;
