//! Telemetry bus — broadcast dispatch with pluggable sinks.
//!
//! Producers call the typed `emit_*` helpers from anywhere in the solve;
//! events queue on an mpsc channel and reach the sinks when `flush()`
//! runs, which the system does once per timestep (never inside the
//! Krylov loop).

use std::sync::mpsc;

use crate::events::{EventKind, SolverEvent};
use crate::sinks::EventSink;

/// Broadcast bus for solver telemetry.
pub struct TelemetryBus {
    sender: mpsc::Sender<SolverEvent>,
    receiver: mpsc::Receiver<SolverEvent>,
    sinks: Vec<Box<dyn EventSink>>,
    /// Current timestep index, stamped onto every emitted event.
    step: u64,
    /// Disabled bus drops events silently.
    enabled: bool,
}

impl TelemetryBus {
    /// Creates a bus with no sinks.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            sinks: Vec::new(),
            step: 0,
            enabled: true,
        }
    }

    /// Registers a sink to receive events.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    /// Number of registered sinks.
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Enables or disables the bus.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Advance the timestep index stamped onto subsequent events.
    pub fn begin_step(&mut self, step: u64, sim_time: f64) {
        self.step = step;
        self.emit(EventKind::StepBegin { sim_time });
    }

    /// Emit a raw event kind at the current step.
    pub fn emit(&self, kind: EventKind) {
        if !self.enabled {
            return;
        }
        // A dropped receiver only happens at teardown; losing the event
        // there is fine.
        let _ = self.sender.send(SolverEvent::new(self.step, kind));
    }

    /// One Krylov iteration finished.
    pub fn emit_iteration(&self, iteration: u32, residual: f64) {
        self.emit(EventKind::KrylovIteration { iteration, residual });
    }

    /// The linear solve finished (converged or not).
    pub fn emit_convergence(&self, iterations: u32, final_residual: f64, converged: bool) {
        self.emit(EventKind::Convergence {
            iterations,
            final_residual,
            converged,
        });
    }

    /// A component's local operators were rebuilt.
    pub fn emit_rebuild(&self, component: &'static str, wall_time: f64) {
        self.emit(EventKind::OperatorRebuild {
            component,
            wall_time,
        });
    }

    /// Final step verdict.
    pub fn emit_outcome(&self, accepted: bool, reason: impl Into<String>) {
        self.emit(EventKind::StepOutcome {
            accepted,
            reason: reason.into(),
        });
    }

    /// Drain pending events to every registered sink.
    pub fn flush(&mut self) {
        while let Ok(event) = self.receiver.try_recv() {
            for sink in &mut self.sinks {
                sink.handle(&event);
            }
        }
    }

    /// Flush and finalize all sinks (end of run).
    pub fn shutdown(&mut self) {
        self.flush();
        for sink in &mut self.sinks {
            sink.finalize();
        }
    }
}

impl Default for TelemetryBus {
    fn default() -> Self {
        Self::new()
    }
}
