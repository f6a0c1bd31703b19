//! In-memory transport implementation for testing.
//!
//! Plays the server side of every connection the client opens: tests push
//! frames, drop connections, queue open failures, and inspect what the
//! client sent.
//!
//! # Security Note
//!
//! This adapter is for **testing only** and should not be used in production.
//! It uses `.expect()` on lock operations which will panic if locks are poisoned.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use url::Url;
use uuid::Uuid;

use crate::domain::foundation::ClientId;
use crate::ports::{Transport, TransportError, TransportEvent, TransportLink};

struct ServerSide {
    to_client: mpsc::UnboundedSender<TransportEvent>,
    from_client: mpsc::UnboundedReceiver<String>,
    client_closed: bool,
}

impl ServerSide {
    /// Moves pending client frames into `sink`, noting a client-side close.
    fn drain_into(&mut self, sink: &mut Vec<String>) {
        loop {
            match self.from_client.try_recv() {
                Ok(text) => sink.push(text),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.client_closed = true;
                    break;
                }
            }
        }
    }
}

#[derive(Default)]
struct State {
    attempts: usize,
    opened_urls: Vec<Url>,
    failures: VecDeque<TransportError>,
    open_delay: Option<Duration>,
    connections: Vec<ServerSide>,
    sent: Vec<String>,
}

/// Scriptable transport for tests.
///
/// # Panics
///
/// Methods may panic if internal locks are poisoned. This is acceptable
/// for test code but this adapter should NOT be used in production.
///
/// # Example
///
/// ```ignore
/// let transport = Arc::new(InMemoryTransport::new());
/// let client = RealtimeClient::new(config, transport.clone())?;
/// client.connect().await?;
///
/// transport.push_frame(r#"{"type":"test_completed","testId":"t1"}"#);
/// assert_eq!(transport.sent_frames().len(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryTransport {
    state: Mutex<State>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `open` wait before resolving.
    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.lock().open_delay = Some(delay);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("InMemoryTransport: state lock poisoned")
    }

    // === Scripting ===

    /// Makes the next `open` fail with `Refused(reason)`.
    pub fn fail_next_open(&self, reason: impl Into<String>) {
        self.lock()
            .failures
            .push_back(TransportError::Refused(reason.into()));
    }

    /// Delivers a text frame on the most recent connection.
    ///
    /// Returns false if there is no connection.
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        let state = self.lock();
        match state.connections.last() {
            Some(conn) => conn
                .to_client
                .send(TransportEvent::Message(text.into()))
                .is_ok(),
            None => false,
        }
    }

    pub fn push_json(&self, value: Value) -> bool {
        self.push_frame(value.to_string())
    }

    /// Simulates an unexpected close of the most recent connection.
    pub fn drop_connection(&self, reason: impl Into<String>) -> bool {
        let state = self.lock();
        match state.connections.last() {
            Some(conn) => conn
                .to_client
                .send(TransportEvent::Closed {
                    reason: reason.into(),
                })
                .is_ok(),
            None => false,
        }
    }

    // === Test Helpers ===

    /// Number of `open` calls, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.lock().attempts
    }

    /// Number of connections that were successfully opened.
    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn opened_urls(&self) -> Vec<Url> {
        self.lock().opened_urls.clone()
    }

    /// All frames the client sent so far, in order, across connections.
    ///
    /// Frames that are not JSON come back as JSON strings.
    pub fn sent_frames(&self) -> Vec<Value> {
        let mut state = self.lock();
        let State {
            connections, sent, ..
        } = &mut *state;
        for conn in connections.iter_mut() {
            conn.drain_into(sent);
        }
        sent.iter()
            .map(|text| serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())))
            .collect()
    }

    /// Forgets captured frames.
    pub fn clear_sent(&self) {
        let mut state = self.lock();
        let State {
            connections, sent, ..
        } = &mut *state;
        for conn in connections.iter_mut() {
            conn.drain_into(sent);
        }
        sent.clear();
    }

    /// True once the client dropped its side of connection `index`.
    pub fn closed_by_client(&self, index: usize) -> bool {
        let mut state = self.lock();
        let State {
            connections, sent, ..
        } = &mut *state;
        match connections.get_mut(index) {
            Some(conn) => {
                conn.drain_into(sent);
                conn.client_closed
            }
            None => false,
        }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&self, url: &Url) -> Result<TransportLink, TransportError> {
        let (delay, failure) = {
            let mut state = self.lock();
            state.attempts += 1;
            state.opened_urls.push(url.clone());
            (state.open_delay, state.failures.pop_front())
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = failure {
            return Err(err);
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        self.lock().connections.push(ServerSide {
            to_client: inbound_tx,
            from_client: outbound_rx,
            client_closed: false,
        });

        Ok(TransportLink {
            client_id: Some(ClientId::new(format!("mem-{}", Uuid::new_v4()))),
            outbound: outbound_tx,
            inbound: inbound_rx,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn url() -> Url {
        Url::parse("ws://localhost:3001/ws").unwrap()
    }

    #[tokio::test]
    async fn open_returns_link_and_counts_attempts() {
        let transport = InMemoryTransport::new();

        let link = transport.open(&url()).await.unwrap();

        assert!(link.client_id.is_some());
        assert_eq!(transport.open_attempts(), 1);
        assert_eq!(transport.connection_count(), 1);
        assert_eq!(transport.opened_urls(), vec![url()]);
    }

    #[tokio::test]
    async fn queued_failure_fails_exactly_one_open() {
        let transport = InMemoryTransport::new();
        transport.fail_next_open("server down");

        let err = transport.open(&url()).await.unwrap_err();
        assert_eq!(err, TransportError::Refused("server down".into()));
        assert!(transport.open(&url()).await.is_ok());
        assert_eq!(transport.open_attempts(), 2);
        assert_eq!(transport.connection_count(), 1);
    }

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let transport = InMemoryTransport::new();
        let mut link = transport.open(&url()).await.unwrap();

        link.outbound.send(json!({"type": "ping"}).to_string()).unwrap();
        assert!(transport.push_frame("hello"));

        assert_eq!(transport.sent_frames(), vec![json!({"type": "ping"})]);
        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Message("hello".into()))
        );
    }

    #[tokio::test]
    async fn drop_connection_sends_close() {
        let transport = InMemoryTransport::new();
        let mut link = transport.open(&url()).await.unwrap();

        transport.drop_connection("network gone");

        assert_eq!(
            link.inbound.recv().await,
            Some(TransportEvent::Closed {
                reason: "network gone".into()
            })
        );
    }

    #[tokio::test]
    async fn dropping_outbound_is_seen_as_client_close() {
        let transport = InMemoryTransport::new();
        let link = transport.open(&url()).await.unwrap();
        assert!(!transport.closed_by_client(0));

        drop(link.outbound);

        assert!(transport.closed_by_client(0));
    }

    #[test]
    fn push_without_connection_returns_false() {
        let transport = InMemoryTransport::new();
        assert!(!transport.push_frame("x"));
        assert!(!transport.drop_connection("x"));
    }
}
