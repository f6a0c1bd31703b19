//! Application layer - Connection lifecycle, subscriptions, routing.
//!
//! This layer coordinates the domain with the transport port:
//!
//! - [`ConnectionManager`] - Owns the single connection and its reconnect timer
//! - [`SubscriptionRegistry`] - Desired subscriptions, re-asserted on every connect
//! - [`EventRouter`] - Typed fan-out of inbound events to listeners
//! - [`RealtimeClient`] - Cloneable facade over the three
//! - [`LiveTestBinding`] - Per-test state for UI consumers

pub mod client;
pub mod connection;
pub mod live_test;
pub mod router;
pub mod subscriptions;

pub use client::RealtimeClient;
pub use connection::{ConnectionError, ConnectionManager, ConnectionSettings};
pub use live_test::{BindingOptions, LiveTestBinding};
pub use router::EventRouter;
pub use subscriptions::{Subscription, SubscriptionRegistry};
