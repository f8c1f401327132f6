//! Fallback channel for the pipeline's own diagnostics
//!
//! Delivery failures never reach the logging caller and never go back
//! through the pipeline; they are reported here.

use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub enum FallbackChannel {
    /// Write `[LOGGER ...]` lines to stderr
    #[default]
    Stderr,
    /// Discard diagnostics
    Silent,
    /// Collect diagnostics in memory
    Memory(Arc<Mutex<Vec<String>>>),
}

impl FallbackChannel {
    pub fn memory() -> Self {
        FallbackChannel::Memory(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.emit("ERROR", message.as_ref());
    }

    pub fn warning(&self, message: impl AsRef<str>) {
        self.emit("WARNING", message.as_ref());
    }

    pub fn critical(&self, message: impl AsRef<str>) {
        self.emit("CRITICAL", message.as_ref());
    }

    /// Messages collected by a `Memory` channel
    pub fn messages(&self) -> Vec<String> {
        match self {
            FallbackChannel::Memory(buffer) => buffer.lock().clone(),
            _ => Vec::new(),
        }
    }

    fn emit(&self, severity: &str, message: &str) {
        match self {
            FallbackChannel::Stderr => eprintln!("[LOGGER {}] {}", severity, message),
            FallbackChannel::Silent => {}
            FallbackChannel::Memory(buffer) => {
                buffer.lock().push(format!("[LOGGER {}] {}", severity, message));
            }
        }
    }
}
