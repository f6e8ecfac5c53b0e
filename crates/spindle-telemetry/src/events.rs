//! Solver event types.
//!
//! Events carry just enough data to monitor a run: residual histories,
//! operator rebuild costs, step outcomes. They are value types, cheap to
//! clone and serializable for off-process consumers.

use serde::{Deserialize, Serialize};

/// An event emitted by the solver, tagged with its timestep index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverEvent {
    /// Timestep number (0-indexed).
    pub step: u64,
    /// Event payload.
    pub kind: EventKind,
}

/// Event payload variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    /// A timestep entered RHS assembly.
    StepBegin {
        /// Target simulation time for this step.
        sim_time: f64,
    },

    /// A timestep finished (accepted or rejected).
    StepEnd {
        /// Wall-clock seconds for the whole step.
        wall_time: f64,
    },

    /// One outer Krylov iteration completed.
    KrylovIteration {
        /// Iteration number within the solve.
        iteration: u32,
        /// Preconditioned residual norm.
        residual: f64,
    },

    /// Convergence report for the step's linear solve.
    Convergence {
        /// Total iterations used.
        iterations: u32,
        /// Final residual.
        final_residual: f64,
        /// Whether the solve reached tolerance within the cap.
        converged: bool,
    },

    /// A component rebuilt and refactorized its local operators.
    OperatorRebuild {
        /// Which component ("fibers", "bodies", "periphery").
        #[serde(skip_deserializing)]
        component: &'static str,
        /// Wall-clock seconds spent.
        wall_time: f64,
    },

    /// Final verdict on the step.
    StepOutcome {
        /// Whether the step was accepted.
        accepted: bool,
        /// Reject reason, empty when accepted.
        reason: String,
    },
}

impl SolverEvent {
    /// Creates a new event for the given timestep.
    pub fn new(step: u64, kind: EventKind) -> Self {
        Self { step, kind }
    }
}
