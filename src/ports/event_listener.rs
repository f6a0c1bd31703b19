//! EventListener port - Interface for consuming routed events.
//!
//! Listeners register with the event router for one channel and a scope
//! (one test or all tests) without knowing about the transport.

use std::fmt;

use crate::domain::foundation::{DomainError, TestId};
use crate::domain::progress::InboundEvent;

/// Listener for routed inbound events.
///
/// Implementations should be:
/// - **Quick** - Delivery is synchronous and in order
/// - **Isolated** - A returned error (or a panic) is logged by the router
///   and does not stop delivery to later listeners
///
/// # Example
///
/// ```ignore
/// struct ChartFeed { /* ... */ }
///
/// impl EventListener for ChartFeed {
///     fn on_event(&self, event: &InboundEvent) -> Result<(), DomainError> {
///         if let InboundEvent::TestProgress(p) = event {
///             // push a point...
///         }
///         Ok(())
///     }
///
///     fn name(&self) -> &str {
///         "ChartFeed"
///     }
/// }
/// ```
pub trait EventListener: Send + Sync {
    /// Process one event.
    fn on_event(&self, event: &InboundEvent) -> Result<(), DomainError>;

    /// Listener name for logging.
    fn name(&self) -> &str;
}

/// Which test-scoped events a listener wants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Every event on the channel.
    AllTests,
    /// Only events carrying this test id.
    Test(TestId),
}

impl Scope {
    /// Returns true if an event for `test_id` should reach this scope.
    ///
    /// Events without a test id only reach `AllTests`.
    pub fn matches(&self, test_id: Option<&TestId>) -> bool {
        match self {
            Scope::AllTests => true,
            Scope::Test(wanted) => test_id == Some(wanted),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::AllTests => write!(f, "*"),
            Scope::Test(id) => write!(f, "{}", id),
        }
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<F> {
    name: String,
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&InboundEvent) -> Result<(), DomainError> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> EventListener for FnListener<F>
where
    F: Fn(&InboundEvent) -> Result<(), DomainError> + Send + Sync,
{
    fn on_event(&self, event: &InboundEvent) -> Result<(), DomainError> {
        (self.f)(event)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_listener_object_safe(_: &dyn EventListener) {}

    #[test]
    fn wildcard_scope_matches_everything() {
        let id = TestId::new("t1").unwrap();
        assert!(Scope::AllTests.matches(Some(&id)));
        assert!(Scope::AllTests.matches(None));
    }

    #[test]
    fn test_scope_matches_only_its_test() {
        let t1 = TestId::new("t1").unwrap();
        let t2 = TestId::new("t2").unwrap();
        let scope = Scope::Test(t1.clone());

        assert!(scope.matches(Some(&t1)));
        assert!(!scope.matches(Some(&t2)));
        assert!(!scope.matches(None));
    }

    #[test]
    fn fn_listener_forwards_to_closure() {
        let listener = FnListener::new("status-light", |event: &InboundEvent| {
            assert_eq!(event.kind(), "error");
            Ok(())
        });

        assert_eq!(listener.name(), "status-light");
        listener
            .on_event(&InboundEvent::Error {
                message: "x".into(),
            })
            .unwrap();
    }
}
