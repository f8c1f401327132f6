//! Processor trait for pre-delivery event enrichment

use super::{error::Result, log_event::LogEvent};

/// Enriches an event before fan-out. Processors add fields, never remove them.
pub trait Processor: Send + Sync {
    fn process(&self, event: &mut LogEvent) -> Result<()>;
    fn name(&self) -> &str;
}
