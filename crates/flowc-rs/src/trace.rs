//! Typed trace events for compiler observability.
//!
//! A process-wide sink receives pass events when installed; with no sink the
//! emit path is a cheap no-op. Installing a sink is how tests and tooling
//! observe pipeline behavior without threading a logger through every pass.

use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::SystemTime;

#[derive(Debug, Clone)]
pub struct PassEvent {
    pub timestamp: SystemTime,
    pub kind: PassEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassEventKind {
    PipelinePassStats {
        sweep: usize,
        pass: &'static str,
        changed: bool,
    },
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: &PassEvent);
}

fn sink_cell() -> &'static RwLock<Option<Arc<dyn TraceSink>>> {
    static SINK: OnceLock<RwLock<Option<Arc<dyn TraceSink>>>> = OnceLock::new();
    SINK.get_or_init(|| RwLock::new(None))
}

pub fn set_sink(sink: Arc<dyn TraceSink>) {
    *sink_cell().write().unwrap() = Some(sink);
}

pub fn clear_sink() {
    *sink_cell().write().unwrap() = None;
}

pub fn current_sink() -> Option<Arc<dyn TraceSink>> {
    sink_cell().read().unwrap().clone()
}

pub fn emit_pass_event(event: PassEvent) {
    if let Some(sink) = current_sink() {
        sink.record(&event);
    }
}

/// Buffering sink for tests and offline inspection.
#[derive(Default)]
pub struct VecSink {
    events: Mutex<Vec<PassEvent>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drains and returns everything recorded so far.
    pub fn take(&self) -> Vec<PassEvent> {
        let mut events = self.events.lock().unwrap();
        std::mem::take(&mut *events)
    }
}

impl TraceSink for VecSink {
    fn record(&self, event: &PassEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
