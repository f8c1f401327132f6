//! Expands a captured error into a structured `backtrace` field

use crate::core::{ErrorChain, FieldValue, LogEvent, Processor, Result};
use std::collections::BTreeMap;

pub const EXCEPTION_KEY: &str = "exception";
pub const BACKTRACE_KEY: &str = "backtrace";

/// Looks for an error value in the context (the `exception` key first, then
/// any error-valued field) and adds one `backtrace` entry per link of its
/// source chain, outermost first.
#[derive(Debug, Clone, Default)]
pub struct ExceptionBacktrace;

impl ExceptionBacktrace {
    pub fn new() -> Self {
        Self
    }

    fn find_error(event: &LogEvent) -> Option<ErrorChain> {
        if let Some(FieldValue::Error(chain)) = event.context.get(EXCEPTION_KEY) {
            return Some(chain.clone());
        }

        let mut keys: Vec<_> = event.context.fields().keys().collect();
        keys.sort();
        keys.into_iter()
            .find_map(|key| match event.context.get(key) {
                Some(FieldValue::Error(chain)) => Some(chain.clone()),
                _ => None,
            })
    }

    fn frames(chain: &ErrorChain) -> FieldValue {
        let messages = std::iter::once(&chain.message).chain(chain.sources.iter());
        FieldValue::List(
            messages
                .enumerate()
                .map(|(depth, message)| {
                    let mut frame = BTreeMap::new();
                    frame.insert("depth".to_string(), FieldValue::Int(depth as i64));
                    frame.insert("message".to_string(), FieldValue::String(message.clone()));
                    FieldValue::Map(frame)
                })
                .collect(),
        )
    }
}

impl Processor for ExceptionBacktrace {
    fn process(&self, event: &mut LogEvent) -> Result<()> {
        if event.context.contains(BACKTRACE_KEY) {
            return Ok(());
        }
        if let Some(chain) = Self::find_error(event) {
            event.context.add_field(BACKTRACE_KEY, Self::frames(&chain));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "exception_backtrace"
    }
}
