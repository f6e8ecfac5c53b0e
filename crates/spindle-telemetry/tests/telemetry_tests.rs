//! Integration tests for spindle-telemetry.

use std::sync::{Arc, Mutex};

use spindle_telemetry::{EventKind, EventSink, SolverEvent, TelemetryBus, VecSink};

// The bus owns its sinks, so tests read events back through a probe sink
// that shares its storage.
struct SharedSink(Arc<Mutex<Vec<SolverEvent>>>);

impl EventSink for SharedSink {
    fn handle(&mut self, event: &SolverEvent) {
        self.0.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &str {
        "shared_sink"
    }
}

// ─── Bus Tests ────────────────────────────────────────────────

#[test]
fn bus_delivers_events_in_order() {
    let store = Arc::new(Mutex::new(Vec::new()));
    let mut bus = TelemetryBus::new();
    bus.add_sink(Box::new(SharedSink(store.clone())));

    bus.begin_step(3, 0.015);
    bus.emit_iteration(1, 1.0e-2);
    bus.emit_iteration(2, 1.0e-5);
    bus.emit_convergence(2, 1.0e-5, true);
    bus.flush();

    let events = store.lock().unwrap();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0].kind, EventKind::StepBegin { .. }));
    assert!(events.iter().all(|e| e.step == 3));

    match &events[3].kind {
        EventKind::Convergence {
            iterations,
            converged,
            ..
        } => {
            assert_eq!(*iterations, 2);
            assert!(*converged);
        }
        other => panic!("expected Convergence, got {other:?}"),
    }
}

#[test]
fn disabled_bus_drops_events() {
    let store = Arc::new(Mutex::new(Vec::new()));
    let mut bus = TelemetryBus::new();
    bus.add_sink(Box::new(SharedSink(store.clone())));
    bus.set_enabled(false);

    bus.emit_iteration(1, 0.5);
    bus.flush();

    assert!(store.lock().unwrap().is_empty());
}

#[test]
fn events_survive_until_flush() {
    let store = Arc::new(Mutex::new(Vec::new()));
    let mut bus = TelemetryBus::new();
    bus.add_sink(Box::new(SharedSink(store.clone())));

    bus.emit_outcome(false, "collision after solve");
    assert!(store.lock().unwrap().is_empty(), "no delivery before flush");

    bus.flush();
    let events = store.lock().unwrap();
    assert_eq!(events.len(), 1);
    match &events[0].kind {
        EventKind::StepOutcome { accepted, reason } => {
            assert!(!accepted);
            assert_eq!(reason, "collision after solve");
        }
        other => panic!("expected StepOutcome, got {other:?}"),
    }
}

#[test]
fn shutdown_flushes_remaining_events() {
    let store = Arc::new(Mutex::new(Vec::new()));
    let mut bus = TelemetryBus::new();
    bus.add_sink(Box::new(SharedSink(store.clone())));

    bus.emit_rebuild("fibers", 0.002);
    bus.shutdown();

    assert_eq!(store.lock().unwrap().len(), 1);
}

// ─── Sink Tests ───────────────────────────────────────────────

#[test]
fn vec_sink_collects() {
    let mut sink = VecSink::new();
    sink.handle(&SolverEvent::new(0, EventKind::StepEnd { wall_time: 0.1 }));
    assert_eq!(sink.events.len(), 1);
    assert_eq!(sink.name(), "vec_sink");
}

// ─── Serialization Tests ──────────────────────────────────────

#[test]
fn event_toml_roundtrip() {
    let event = SolverEvent::new(
        7,
        EventKind::KrylovIteration {
            iteration: 12,
            residual: 3.0e-9,
        },
    );

    let encoded = toml::to_string(&event).unwrap();
    let recovered: SolverEvent = toml::from_str(&encoded).unwrap();

    assert_eq!(recovered.step, 7);
    match recovered.kind {
        EventKind::KrylovIteration {
            iteration,
            residual,
        } => {
            assert_eq!(iteration, 12);
            assert!((residual - 3.0e-9).abs() < 1e-20);
        }
        other => panic!("expected KrylovIteration, got {other:?}"),
    }
}
