//! Correlation (lifecycle) token injection
//!
//! Every event gets a correlation token linking it to the other log lines of
//! the same unit of work. The ambient token comes from the innermost
//! [`CorrelationScope`] on the current thread; without one, the injector's
//! process-wide token is used.

use crate::core::{LogEvent, Processor, Result};
use std::cell::RefCell;
use uuid::Uuid;

thread_local! {
    static SCOPES: RefCell<Vec<ScopeEntry>> = const { RefCell::new(Vec::new()) };
}

#[derive(Debug, Clone)]
struct ScopeEntry {
    token: String,
    parent: Option<String>,
}

/// Generate a fresh 128-bit random token
pub fn generate_token() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

/// RAII guard making a token ambient for the current thread
///
/// Nested scopes take the enclosing token as their parent. Dropping the guard
/// restores the enclosing scope.
///
/// # Example
///
/// ```
/// use rust_log_pipeline::processors::CorrelationScope;
///
/// let outer = CorrelationScope::enter("REQUEST-1");
/// {
///     let inner = CorrelationScope::enter("JOB-7");
///     assert_eq!(inner.parent(), Some("REQUEST-1"));
///     assert_eq!(CorrelationScope::current_token().as_deref(), Some("JOB-7"));
/// }
/// assert_eq!(CorrelationScope::current_token().as_deref(), Some("REQUEST-1"));
/// drop(outer);
/// assert!(CorrelationScope::current_token().is_none());
/// ```
pub struct CorrelationScope {
    token: String,
    parent: Option<String>,
    // Scopes are thread-bound
    _not_send: std::marker::PhantomData<*const ()>,
}

impl CorrelationScope {
    pub fn enter(token: impl Into<String>) -> Self {
        let parent = Self::current_token();
        Self::enter_with_parent(token, parent)
    }

    /// Enter a scope whose parent arrives from outside the process
    pub fn enter_with_parent(token: impl Into<String>, parent: Option<String>) -> Self {
        let entry = ScopeEntry {
            token: token.into(),
            parent,
        };
        SCOPES.with(|scopes| scopes.borrow_mut().push(entry.clone()));
        Self {
            token: entry.token,
            parent: entry.parent,
            _not_send: std::marker::PhantomData,
        }
    }

    /// Enter a scope with a freshly generated token
    pub fn generate() -> Self {
        Self::enter(generate_token())
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn current_token() -> Option<String> {
        SCOPES.with(|scopes| scopes.borrow().last().map(|e| e.token.clone()))
    }

    fn current() -> Option<ScopeEntry> {
        SCOPES.with(|scopes| scopes.borrow().last().cloned())
    }
}

impl Drop for CorrelationScope {
    fn drop(&mut self) {
        SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            if let Some(pos) = scopes.iter().rposition(|e| e.token == self.token) {
                scopes.remove(pos);
            }
        });
    }
}

/// Sets `correlation_token` and `parent_correlation_token` on events
#[derive(Debug, Clone)]
pub struct LifecycleTokenInjector {
    token: String,
    parent: Option<String>,
}

impl LifecycleTokenInjector {
    /// Injector with a freshly generated process token
    pub fn new() -> Self {
        Self {
            token: generate_token(),
            parent: None,
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            parent: None,
        }
    }

    /// Parent token received from the caller of this process
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Default for LifecycleTokenInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor for LifecycleTokenInjector {
    fn process(&self, event: &mut LogEvent) -> Result<()> {
        if event.correlation_token.is_some() {
            return Ok(());
        }

        match CorrelationScope::current() {
            Some(scope) => {
                event.correlation_token = Some(scope.token);
                event.parent_correlation_token = scope.parent.or_else(|| self.parent.clone());
            }
            None => {
                event.correlation_token = Some(self.token.clone());
                event.parent_correlation_token = self.parent.clone();
            }
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "lifecycle_token"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{LogContext, LogLevel};

    fn event() -> LogEvent {
        LogEvent::new(LogLevel::Info, "x", LogContext::new())
    }

    #[test]
    fn test_generated_tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn test_process_token_without_scope() {
        let injector = LifecycleTokenInjector::with_token("PROC").with_parent("CALLER");
        let mut e = event();
        injector.process(&mut e).unwrap();
        assert_eq!(e.correlation_token.as_deref(), Some("PROC"));
        assert_eq!(e.parent_correlation_token.as_deref(), Some("CALLER"));
    }

    #[test]
    fn test_scope_overrides_process_token() {
        let injector = LifecycleTokenInjector::with_token("PROC");
        let _outer = CorrelationScope::enter("REQ");
        let _inner = CorrelationScope::enter("TASK");

        let mut e = event();
        injector.process(&mut e).unwrap();
        assert_eq!(e.correlation_token.as_deref(), Some("TASK"));
        assert_eq!(e.parent_correlation_token.as_deref(), Some("REQ"));
    }

    #[test]
    fn test_existing_token_kept() {
        let injector = LifecycleTokenInjector::new();
        let mut e = event();
        e.correlation_token = Some("SET".to_string());
        injector.process(&mut e).unwrap();
        assert_eq!(e.correlation_token.as_deref(), Some("SET"));
        assert!(e.parent_correlation_token.is_none());
    }

    #[test]
    fn test_scopes_are_per_thread() {
        let _scope = CorrelationScope::enter("MAIN");
        let seen = std::thread::spawn(CorrelationScope::current_token)
            .join()
            .unwrap();
        assert!(seen.is_none());
    }
}
