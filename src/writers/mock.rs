//! In-memory writer for tests
//!
//! Clones share the same buffer and switches, so a test keeps one handle and
//! hands the other to the dispatcher.

use crate::core::{LoggerError, Payload, PayloadKind, Result, Writer};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockWriter {
    name: String,
    payloads: Arc<Mutex<Vec<Payload>>>,
    failing: Arc<AtomicBool>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payloads: Arc::new(Mutex::new(Vec::new())),
            failing: Arc::new(AtomicBool::new(false)),
            delay: Arc::new(Mutex::new(None)),
        }
    }

    /// A writer whose every delivery fails, like an unreachable sink
    pub fn failing(name: impl Into<String>) -> Self {
        let writer = Self::new(name);
        writer.set_failing(true);
        writer
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    /// Sleep this long inside every write
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn payloads(&self) -> Vec<Payload> {
        self.payloads.lock().clone()
    }

    /// Wire text of every recorded payload
    pub fn lines(&self) -> Vec<String> {
        self.payloads.lock().iter().map(Payload::to_text).collect()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.payloads.lock().is_empty()
    }

    pub fn clear(&self) {
        self.payloads.lock().clear();
    }
}

impl Writer for MockWriter {
    fn write(&self, payload: &Payload) -> Result<()> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.failing.load(Ordering::Relaxed) {
            return Err(LoggerError::delivery(&self.name, "mock sink unreachable"));
        }
        self.payloads.lock().push(payload.clone());
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, _kind: PayloadKind) -> bool {
        true
    }
}
