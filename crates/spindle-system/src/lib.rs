//! # spindle-system
//!
//! The system-level solver: owns the partitioning of the global unknown
//! vector over [fibers | bodies | periphery], the matrix-free global
//! matvec with its one shared far-field pass, the block-diagonal
//! preconditioner, RHS assembly, and the per-step phase machine.
//!
//! ## Key Types
//!
//! - [`SystemSolver`] — the operator pair the external Krylov driver
//!   consumes
//! - [`Params`] — solver parameters (serde)
//! - [`SolutionSizes`] / [`solution::local_solution_sizes`] — vector
//!   partitioning as pure functions of entity counts
//! - [`StepPhase`] / [`StepOutcome`] — the per-timestep state machine

pub mod config;
pub mod linking;
pub mod solution;
pub mod solver;

pub use config::Params;
pub use solution::{local_solution_sizes, SolutionSizes};
pub use solver::{RejectReason, StepOutcome, StepPhase, SystemSolver};
