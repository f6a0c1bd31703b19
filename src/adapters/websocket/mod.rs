//! WebSocket adapters for streaming live test progress.
//!
//! This module provides the wire codec and the transports the connection
//! manager opens connections through.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Test execution server                           │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ text frames
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Transport                                   │
//! │   WebSocketTransport (production) │ InMemoryTransport (test)         │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                     │
//!                                     │ codec::decode
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        InboundEvent                                  │
//! │   test_progress │ test_status_update │ test_completed │ test_error   │
//! │   connected     │ disconnected       │ error                         │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`codec`] - Outbound control frames and inbound frame decoding
//! - [`transport`] - tokio-tungstenite client transport
//! - [`in_memory`] - Scriptable transport for tests

pub mod codec;
pub mod in_memory;
pub mod transport;

pub use codec::{decode, CodecError, OutboundFrame};
pub use in_memory::InMemoryTransport;
pub use transport::{WebSocketTransport, CLIENT_ID_HEADER};
