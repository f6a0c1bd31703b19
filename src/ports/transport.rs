//! Transport port - Interface for the bidirectional text connection.
//!
//! The connection manager only ever talks to a [`Transport`]; the real
//! WebSocket implementation and the in-memory test double both live in
//! `adapters`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

use crate::domain::foundation::ClientId;

/// Errors raised while opening a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection refused: {0}")]
    Refused(String),

    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Unsupported URL scheme '{0}' (expected ws or wss)")]
    UnsupportedScheme(String),
}

/// Something that happened on an open transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// One inbound text frame.
    Message(String),
    /// The remote end or the network closed the connection.
    ///
    /// Sent at most once; no events follow it.
    Closed { reason: String },
}

/// An open connection.
///
/// Dropping `outbound` asks the transport to close the socket. The
/// transport reports the resulting close on `inbound` like any other.
#[derive(Debug)]
pub struct TransportLink {
    /// Identifier assigned by the remote end during the handshake, if any.
    pub client_id: Option<ClientId>,
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Port for opening connections.
///
/// # Example
///
/// ```ignore
/// let link = transport.open(&url).await?;
/// link.outbound.send(r#"{"type":"join_room","room":"ops"}"#.to_string())?;
/// while let Some(event) = link.inbound.recv().await { /* ... */ }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a new connection to `url`.
    ///
    /// Resolves once the connection is usable or has failed.
    async fn open(&self, url: &Url) -> Result<TransportLink, TransportError>;
}
