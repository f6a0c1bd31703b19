//! Client facade: one explicit handle over the connection, registry and
//! router.
//!
//! Cloning a [`RealtimeClient`] yields another handle to the same
//! connection. Hosts construct one per process (or per test) and pass it
//! to whoever needs it.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::config::{ClientConfig, ValidationError};
use crate::domain::foundation::{ClientId, DataType, DomainError, ListenerId, RoomName};
use crate::domain::progress::{Channel, ConnectionState, InboundEvent};
use crate::ports::{EventListener, Scope, Transport};

use super::connection::{ConnectionError, ConnectionManager, ConnectionSettings};
use super::router::EventRouter;
use super::subscriptions::{Subscription, SubscriptionRegistry};

#[derive(Clone)]
pub struct RealtimeClient {
    connection: Arc<ConnectionManager>,
    registry: Arc<SubscriptionRegistry>,
    router: Arc<EventRouter>,
    auto_connect: bool,
}

impl RealtimeClient {
    /// Build a client over `transport`.
    ///
    /// Nothing is opened until [`connect`](Self::connect).
    pub fn new(config: &ClientConfig, transport: Arc<dyn Transport>) -> Result<Self, ValidationError> {
        config.validate()?;

        let router = Arc::new(EventRouter::default());
        let connection = ConnectionManager::new(
            ConnectionSettings {
                url: config.endpoint()?,
                reconnect_delay: config.reconnect_delay(),
            },
            transport,
            router.clone(),
        );
        let registry = Arc::new(SubscriptionRegistry::new(
            connection.clone(),
            config.data_type()?,
        ));

        // Registered first so desired state is re-asserted before any
        // consumer hears about the connection.
        let weak = Arc::downgrade(&registry);
        router.on_fn(
            Channel::Connected,
            Scope::AllTests,
            "subscription-reconciler",
            move |_| {
                if let Some(registry) = weak.upgrade() {
                    registry.reconcile();
                }
                Ok(())
            },
        );

        Ok(Self {
            connection,
            registry,
            router,
            auto_connect: config.auto_connect,
        })
    }

    // === Connection ===

    pub async fn connect(&self) -> Result<(), ConnectionError> {
        self.connection.connect().await
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.connection.is_reconnecting()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.connection.client_id()
    }

    pub fn last_error(&self) -> Option<String> {
        self.connection.last_error()
    }

    /// Whether consumer bindings should connect on mount by default.
    pub fn auto_connect(&self) -> bool {
        self.auto_connect
    }

    /// Send an application message. Dropped unless connected.
    pub fn send(&self, message: &Value) -> bool {
        self.connection.send_json(message)
    }

    // === Subscriptions ===

    pub fn subscribe_to_test(&self, test_id: &str) -> bool {
        self.registry.subscribe_to_test(test_id)
    }

    pub fn subscribe_with_data_type(&self, test_id: &str, data_type: DataType) -> bool {
        self.registry.subscribe_with_data_type(test_id, data_type)
    }

    pub fn unsubscribe_from_test(&self, test_id: &str) -> bool {
        self.registry.unsubscribe_from_test(test_id)
    }

    pub fn join_room(&self, room: &str) -> bool {
        self.registry.join_room(room)
    }

    pub fn leave_room(&self, room: &str) -> bool {
        self.registry.leave_room(room)
    }

    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.subscriptions()
    }

    pub fn rooms(&self) -> Vec<RoomName> {
        self.registry.rooms()
    }

    // === Events ===

    pub fn on(&self, channel: Channel, scope: Scope, listener: Arc<dyn EventListener>) -> ListenerId {
        self.router.on(channel, scope, listener)
    }

    pub fn on_fn<F>(&self, channel: Channel, scope: Scope, name: impl Into<String>, f: F) -> ListenerId
    where
        F: Fn(&InboundEvent) -> Result<(), DomainError> + Send + Sync + 'static,
    {
        self.router.on_fn(channel, scope, name, f)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.router.off(id)
    }

    /// Every routed event as an async stream.
    pub fn events(&self) -> broadcast::Receiver<InboundEvent> {
        self.router.events()
    }

    /// Route a raw frame received outside the managed transport.
    pub fn dispatch(&self, raw: &str) -> usize {
        self.router.dispatch_raw(raw)
    }

    /// Drop all desired state, then disconnect.
    pub fn teardown(&self) {
        self.registry.clear();
        self.connection.disconnect();
    }
}
