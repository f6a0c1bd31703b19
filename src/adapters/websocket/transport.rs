//! WebSocket transport built on tokio-tungstenite.
//!
//! Each open connection runs two tasks:
//! 1. Writer - forwards outbound text, closes the socket once the
//!    outbound sender is dropped
//! 2. Reader - forwards inbound text frames and reports the close exactly
//!    once

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use url::Url;

use crate::domain::foundation::ClientId;
use crate::ports::{Transport, TransportError, TransportEvent, TransportLink};

/// Handshake response header some servers use to hand out the client id.
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Production [`Transport`] over `ws://` / `wss://`.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport;

impl WebSocketTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn open(&self, url: &Url) -> Result<TransportLink, TransportError> {
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(TransportError::UnsupportedScheme(other.to_string())),
        }

        let (stream, response) = connect_async(url.as_str()).await.map_err(map_connect_error)?;

        let client_id = response
            .headers()
            .get(CLIENT_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(ClientId::new);

        tracing::debug!(url = %url, client_id = ?client_id, "WebSocket handshake complete");

        let (mut sink, mut source) = stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::debug!("Send error, stopping writer: {}", e);
                    break;
                }
            }
            // Sender dropped or socket failed; either way we are done.
            let _ = sink.close().await;
        });

        tokio::spawn(async move {
            let reason = loop {
                match source.next().await {
                    Some(Ok(Message::Text(text))) => {
                        if inbound_tx.send(TransportEvent::Message(text)).is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        tracing::warn!("Received unsupported binary message");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty())
                            .unwrap_or_else(|| "closed by server".to_string());
                    }
                    // Ping/pong are answered by tungstenite.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "connection reset".to_string(),
                }
            };
            let _ = inbound_tx.send(TransportEvent::Closed { reason });
        });

        Ok(TransportLink {
            client_id,
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

fn map_connect_error(err: tungstenite::Error) -> TransportError {
    match err {
        tungstenite::Error::Io(e) => TransportError::Refused(e.to_string()),
        tungstenite::Error::Http(response) => {
            TransportError::Handshake(format!("server responded with {}", response.status()))
        }
        other => TransportError::Handshake(other.to_string()),
    }
}
