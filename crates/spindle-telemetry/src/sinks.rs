//! Pluggable event sinks.

use crate::events::SolverEvent;

/// Trait for event consumers.
pub trait EventSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &SolverEvent);

    /// Called at shutdown. Flush buffers, close files, etc.
    fn finalize(&mut self) {}

    /// Human-readable name for this sink.
    fn name(&self) -> &str;
}

/// Collects events into a `Vec` for tests and inspection.
pub struct VecSink {
    /// Collected events.
    pub events: Vec<SolverEvent>,
}

impl VecSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecSink {
    fn handle(&mut self, event: &SolverEvent) {
        self.events.push(event.clone());
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Logs events through the `tracing` crate.
pub struct TracingSink;

impl TracingSink {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for TracingSink {
    fn handle(&mut self, event: &SolverEvent) {
        tracing::info!(step = event.step, event = ?event.kind, "solver_event");
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}
