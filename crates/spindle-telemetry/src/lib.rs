//! # spindle-telemetry
//!
//! Structured telemetry for the solver: what the Krylov loop and the
//! per-step state machine are doing, delivered to pluggable sinks.
//!
//! ## Key Types
//!
//! - [`SolverEvent`] / [`EventKind`] — lightweight event payloads
//! - [`TelemetryBus`] — channel-backed broadcast to registered sinks
//! - [`EventSink`] — sink trait; [`VecSink`] for tests, [`TracingSink`]
//!   for log output

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::TelemetryBus;
pub use events::{EventKind, SolverEvent};
pub use sinks::{EventSink, TracingSink, VecSink};
