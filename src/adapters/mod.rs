//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the client core to external systems:
//! - `websocket` - Wire codec plus WebSocket and in-memory transports

pub mod websocket;

pub use websocket::{InMemoryTransport, WebSocketTransport};
