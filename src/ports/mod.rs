//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the client core and the outside world. Adapters implement these ports.
//!
//! - `Transport` - Opens the bidirectional text connection
//! - `EventListener` - Consumes routed events, scoped by channel and test

mod event_listener;
mod transport;

pub use event_listener::{EventListener, FnListener, Scope};
pub use transport::{Transport, TransportError, TransportEvent, TransportLink};
