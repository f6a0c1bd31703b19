//! Event router: typed fan-out of inbound events to listeners.
//!
//! # Routing
//!
//! ```text
//! raw frame ──decode──▶ InboundEvent ──channel()──▶ listeners on channel
//!                                     └─test_id()─▶ filtered by Scope
//! ```
//!
//! Listeners run synchronously, in registration order, on whichever task
//! delivered the frame. A failing or panicking listener is logged and
//! skipped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::adapters::websocket::codec;
use crate::domain::foundation::{DomainError, ListenerId};
use crate::domain::progress::{Channel, InboundEvent};
use crate::ports::{EventListener, FnListener, Scope};

struct Registration {
    id: ListenerId,
    channel: Channel,
    scope: Scope,
    listener: Arc<dyn EventListener>,
}

/// Multi-listener registry keyed by [`Channel`] and [`Scope`].
///
/// Also republishes every routed event on a broadcast stream for async
/// consumers; slow receivers miss events rather than block delivery.
pub struct EventRouter {
    registrations: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
    stream: broadcast::Sender<InboundEvent>,
}

impl EventRouter {
    /// Create a router whose broadcast stream buffers `capacity` events.
    pub fn new(capacity: usize) -> Self {
        let (stream, _) = broadcast::channel(capacity.max(1));
        Self {
            registrations: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            stream,
        }
    }

    /// Create with default capacity (256 events).
    pub fn with_default_capacity() -> Self {
        Self::new(256)
    }

    /// Register a listener for one channel.
    pub fn on(
        &self,
        channel: Channel,
        scope: Scope,
        listener: Arc<dyn EventListener>,
    ) -> ListenerId {
        let id = ListenerId::from_raw(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::trace!(%id, %channel, %scope, listener = listener.name(), "Listener registered");
        self.registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Registration {
                id,
                channel,
                scope,
                listener,
            });
        id
    }

    /// Register a closure as a listener.
    pub fn on_fn<F>(
        &self,
        channel: Channel,
        scope: Scope,
        name: impl Into<String>,
        f: F,
    ) -> ListenerId
    where
        F: Fn(&InboundEvent) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        self.on(channel, scope, Arc::new(FnListener::new(name, f)))
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn off(&self, id: ListenerId) -> bool {
        let mut registrations = self
            .registrations
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.registrations
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Subscribe to every routed event as an async stream.
    pub fn events(&self) -> broadcast::Receiver<InboundEvent> {
        self.stream.subscribe()
    }

    /// Decode a raw inbound frame and route it.
    ///
    /// Malformed frames are logged and dropped. Returns the number of
    /// listeners the event reached.
    pub fn dispatch_raw(&self, text: &str) -> usize {
        match codec::decode(text) {
            Ok(event) => self.emit(event),
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                0
            }
        }
    }

    /// Route an already-typed event.
    ///
    /// Returns the number of listeners the event reached.
    pub fn emit(&self, event: InboundEvent) -> usize {
        let Some(channel) = event.channel() else {
            tracing::debug!(kind = event.kind(), "Ignoring frame with unknown type");
            return 0;
        };

        // Clone targets to release the lock before invoking listeners
        let targets: Vec<Arc<dyn EventListener>> = {
            let registrations = self
                .registrations
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            registrations
                .iter()
                .filter(|r| r.channel == channel && r.scope.matches(event.test_id()))
                .map(|r| Arc::clone(&r.listener))
                .collect()
        };

        for listener in &targets {
            match catch_unwind(AssertUnwindSafe(|| listener.on_event(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(
                        listener = listener.name(),
                        %channel,
                        error = %e,
                        "Listener failed"
                    );
                }
                Err(_) => {
                    tracing::error!(listener = listener.name(), %channel, "Listener panicked");
                }
            }
        }

        // Ignore send errors (no receivers is OK)
        let _ = self.stream.send(event);

        targets.len()
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
