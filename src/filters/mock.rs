//! Pass-through filters: a recording mock and a suppress switch

use crate::core::{Filter, LogEvent};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Accepts everything and remembers what it saw
#[derive(Debug, Clone, Default)]
pub struct MockFilter {
    events: Arc<Mutex<Vec<LogEvent>>>,
}

impl MockFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events.lock().clone()
    }
}

impl Filter for MockFilter {
    fn accept(&self, event: &LogEvent) -> bool {
        self.events.lock().push(event.clone());
        true
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Drops every event while switched on
///
/// Clones share the switch, so a handle kept outside the pipeline can mute a
/// destination at runtime.
#[derive(Debug, Clone, Default)]
pub struct SuppressFilter {
    suppressed: Arc<AtomicBool>,
}

impl SuppressFilter {
    pub fn new(suppressed: bool) -> Self {
        Self {
            suppressed: Arc::new(AtomicBool::new(suppressed)),
        }
    }

    pub fn suppress(&self, suppressed: bool) {
        self.suppressed.store(suppressed, Ordering::Relaxed);
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppressed.load(Ordering::Relaxed)
    }
}

impl Filter for SuppressFilter {
    fn accept(&self, _event: &LogEvent) -> bool {
        !self.is_suppressed()
    }

    fn name(&self) -> &str {
        "suppress"
    }
}
