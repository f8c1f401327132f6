//! Filter trait and per-writer filter chains

use super::log_event::LogEvent;
use std::sync::Arc;

/// Predicate deciding whether an event reaches a writer
pub trait Filter: Send + Sync {
    fn accept(&self, event: &LogEvent) -> bool;
    fn name(&self) -> &str;
}

/// Shared filters keep their state visible to the holder of the other handle
impl<F: Filter + ?Sized> Filter for Arc<F> {
    fn accept(&self, event: &LogEvent) -> bool {
        (**self).accept(event)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Ordered AND-combination of filters
///
/// Evaluation short-circuits on the first rejecting filter, so stateful
/// filters placed after a rejecting one never observe the event.
#[derive(Default)]
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn push(&mut self, filter: Box<dyn Filter>) {
        self.filters.push(filter);
    }

    pub fn accept(&self, event: &LogEvent) -> bool {
        self.filters.iter().all(|filter| filter.accept(event))
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.filters.iter().map(|f| f.name()).collect()
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.names())
            .finish()
    }
}
