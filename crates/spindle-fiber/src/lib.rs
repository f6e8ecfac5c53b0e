//! # spindle-fiber
//!
//! Elastic filaments under slender-body Stokes hydrodynamics.
//!
//! ## Key Types
//!
//! - [`Fiber`] — one filament: Chebyshev collocation state, boundary
//!   condition pairs, the dense local operator with its LU
//!   factorization, and the force-recovery operator
//! - [`EndCondition`] — the six boundary-condition kinds
//! - [`FiberContainer`] — a process's fibers: collection-level matvec,
//!   preconditioner, RHS, and inter-fiber flow
//!
//! Per-fiber unknowns are end-of-step positions (3n) plus tension (n);
//! the local operator is rebuilt whenever length, rigidity, timestep, or
//! viscosity change, and refactorized in place.

pub mod container;
pub mod fiber;

pub use container::FiberContainer;
pub use fiber::{BindingSite, EndCondition, Fiber};
