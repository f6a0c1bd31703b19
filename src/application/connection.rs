//! Connection manager: owns the single transport connection.
//!
//! # Lifecycle
//!
//! ```text
//!              connect()                 transport open
//! Disconnected ─────────▶ Connecting ─────────────────▶ Connected
//!      ▲                      │ open failed / disconnect()   │
//!      └──────────────────────┴──────────────────────────────┘
//!                                unexpected close / disconnect()
//! ```
//!
//! An unexpected close while the caller still wants a connection schedules
//! exactly one reconnect attempt after a fixed delay. A failed attempt is
//! not rescheduled; the next one only follows another unexpected close.
//!
//! Every async continuation (open completion, reader pump, reconnect
//! timer) carries the generation it was started under and does nothing
//! once the generation has moved on.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use url::Url;

use crate::adapters::websocket::codec::{self, OutboundFrame};
use crate::domain::foundation::{ClientId, StateMachine};
use crate::domain::progress::{ConnectionState, InboundEvent};
use crate::ports::{Transport, TransportError, TransportEvent, TransportLink};

use super::router::EventRouter;

/// Why a `connect()` call did not end up connected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Connection attempt was superseded by disconnect")]
    Aborted,

    #[error("Connection task failed: {0}")]
    TaskFailed(String),
}

/// Settings fixed for the lifetime of a manager.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub url: Url,
    pub reconnect_delay: Duration,
}

type PendingConnect = Shared<BoxFuture<'static, Result<(), ConnectionError>>>;

enum Phase {
    Disconnected,
    Connecting(PendingConnect),
    Connected,
}

impl Phase {
    fn state(&self) -> ConnectionState {
        match self {
            Phase::Disconnected => ConnectionState::Disconnected,
            Phase::Connecting(_) => ConnectionState::Connecting,
            Phase::Connected => ConnectionState::Connected,
        }
    }
}

/// A scheduled reconnect; cancelling aborts the sleeping task.
struct ReconnectTimer {
    id: u64,
    handle: JoinHandle<()>,
}

impl ReconnectTimer {
    fn cancel(self) {
        self.handle.abort();
    }
}

struct Inner {
    phase: Phase,
    desired_connected: bool,
    generation: u64,
    timer_seq: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reconnect: Option<ReconnectTimer>,
    client_id: Option<ClientId>,
    last_error: Option<String>,
}

pub struct ConnectionManager {
    settings: ConnectionSettings,
    transport: Arc<dyn Transport>,
    router: Arc<EventRouter>,
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ConnectionManager {
    pub fn new(
        settings: ConnectionSettings,
        transport: Arc<dyn Transport>,
        router: Arc<EventRouter>,
    ) -> Arc<Self> {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Arc::new(Self {
            settings,
            transport,
            router,
            inner: Mutex::new(Inner {
                phase: Phase::Disconnected,
                desired_connected: false,
                generation: 0,
                timer_seq: 0,
                outbound: None,
                reconnect: None,
                client_id: None,
                last_error: None,
            }),
            state_tx,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // === Queries ===

    pub fn state(&self) -> ConnectionState {
        self.lock().phase.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Whether the caller currently wants a connection.
    pub fn desired_connected(&self) -> bool {
        self.lock().desired_connected
    }

    /// True while a connection is wanted but not established.
    pub fn is_reconnecting(&self) -> bool {
        let inner = self.lock();
        inner.desired_connected && !inner.phase.state().is_connected()
    }

    /// Generation of the live connection, if connected.
    pub fn connected_generation(&self) -> Option<u64> {
        let inner = self.lock();
        matches!(inner.phase, Phase::Connected).then_some(inner.generation)
    }

    pub fn reconnect_pending(&self) -> bool {
        self.lock().reconnect.is_some()
    }

    pub fn client_id(&self) -> Option<ClientId> {
        self.lock().client_id.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn url(&self) -> &Url {
        &self.settings.url
    }

    // === Lifecycle ===

    /// Open the connection, or join the attempt already in flight.
    ///
    /// Resolves once the transport is open or has failed. Failures are also
    /// emitted as `Error` events.
    pub async fn connect(self: &Arc<Self>) -> Result<(), ConnectionError> {
        let pending = {
            let mut inner = self.lock();
            inner.desired_connected = true;
            if let Some(timer) = inner.reconnect.take() {
                timer.cancel();
            }
            let in_flight = match &inner.phase {
                Phase::Connected => return Ok(()),
                Phase::Connecting(pending) => Some(pending.clone()),
                Phase::Disconnected => None,
            };
            match in_flight {
                Some(pending) => pending,
                None => self.start_attempt(&mut inner),
            }
        };
        pending.await
    }

    /// Caller-initiated teardown.
    ///
    /// Cancels any pending reconnect and closes the transport. No automatic
    /// reconnect happens until the next `connect()`.
    pub fn disconnect(&self) {
        let was_active = {
            let mut inner = self.lock();
            inner.desired_connected = false;
            if let Some(timer) = inner.reconnect.take() {
                tracing::debug!("Cancelling pending reconnect");
                timer.cancel();
            }
            inner.generation += 1;
            // Dropping the sender closes the socket
            inner.outbound = None;
            inner.client_id = None;
            let was_active = !matches!(inner.phase, Phase::Disconnected);
            self.set_phase(&mut inner, Phase::Disconnected);
            was_active
        };

        if was_active {
            tracing::info!(url = %self.settings.url, "Disconnected by client");
            self.router.emit(InboundEvent::Disconnected {
                reason: "client disconnect".to_string(),
            });
        }
    }

    // === Sending ===

    /// Send a control frame. Returns false when not connected.
    pub fn send_frame(&self, frame: &OutboundFrame) -> bool {
        let sent = self.send_text(frame.encode());
        tracing::debug!(frame = frame.kind(), sent, "Control frame");
        sent
    }

    /// Send an application message verbatim.
    ///
    /// Only JSON objects are sent, and only while connected; anything else
    /// is dropped, never queued.
    pub fn send_json(&self, value: &Value) -> bool {
        if !value.is_object() {
            tracing::warn!("Dropping application message that is not a JSON object");
            return false;
        }
        let sent = self.send_text(value.to_string());
        if !sent {
            tracing::debug!("Dropping application message while disconnected");
        }
        sent
    }

    fn send_text(&self, text: String) -> bool {
        let inner = self.lock();
        match (&inner.phase, &inner.outbound) {
            (Phase::Connected, Some(outbound)) => outbound.send(text).is_ok(),
            _ => false,
        }
    }

    // === Internals ===

    fn set_phase(&self, inner: &mut Inner, phase: Phase) {
        let from = inner.phase.state();
        let to = phase.state();
        if from != to && !from.can_transition_to(&to) {
            tracing::warn!(%from, %to, "Unexpected connection state transition");
        }
        inner.phase = phase;
        self.state_tx.send_if_modified(|current| {
            if *current == to {
                return false;
            }
            *current = to;
            true
        });
    }

    fn start_attempt(self: &Arc<Self>, inner: &mut Inner) -> PendingConnect {
        inner.generation += 1;
        let generation = inner.generation;
        let task = tokio::spawn(Arc::clone(self).open(generation));
        let pending = async move {
            task.await
                .unwrap_or_else(|e| Err(ConnectionError::TaskFailed(e.to_string())))
        }
        .boxed()
        .shared();
        self.set_phase(inner, Phase::Connecting(pending.clone()));
        pending
    }

    async fn open(self: Arc<Self>, generation: u64) -> Result<(), ConnectionError> {
        tracing::debug!(url = %self.settings.url, generation, "Opening transport");
        let result = self.transport.open(&self.settings.url).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(generation, "Discarding superseded connection attempt");
            // The link, if any, is dropped here and closes itself
            return Err(ConnectionError::Aborted);
        }

        match result {
            Ok(TransportLink {
                client_id,
                outbound,
                inbound,
            }) => {
                inner.outbound = Some(outbound);
                inner.client_id = client_id.clone();
                inner.last_error = None;
                self.set_phase(&mut inner, Phase::Connected);
                drop(inner);

                tracing::info!(
                    url = %self.settings.url,
                    client_id = ?client_id,
                    generation,
                    "Connected"
                );
                self.router.emit(InboundEvent::Connected { client_id });
                tokio::spawn(pump(Arc::downgrade(&self), generation, inbound));
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                inner.last_error = Some(message.clone());
                self.set_phase(&mut inner, Phase::Disconnected);
                drop(inner);

                tracing::warn!(url = %self.settings.url, error = %message, "Connection attempt failed");
                self.router.emit(InboundEvent::Error { message });
                Err(ConnectionError::Transport(e))
            }
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        let inner = self.lock();
        inner.generation == generation && matches!(inner.phase, Phase::Connected)
    }

    fn handle_frame(&self, text: &str) {
        match codec::decode(text) {
            // The server's own greeting only refreshes the id; the
            // connection was already announced when the transport opened.
            Ok(InboundEvent::Connected { client_id }) => {
                if let Some(client_id) = client_id {
                    tracing::debug!(%client_id, "Server assigned client id");
                    self.lock().client_id = Some(client_id);
                }
            }
            // Only a transport close changes the connection state.
            Ok(InboundEvent::Disconnected { reason }) => {
                tracing::info!(%reason, "Server announced disconnect");
            }
            Ok(event) => {
                self.router.emit(event);
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
            }
        }
    }

    fn handle_close(self: &Arc<Self>, generation: u64, reason: String) {
        {
            let mut inner = self.lock();
            if inner.generation != generation || !matches!(inner.phase, Phase::Connected) {
                return;
            }
            inner.outbound = None;
            self.set_phase(&mut inner, Phase::Disconnected);
            if inner.desired_connected {
                inner.timer_seq += 1;
                let timer = self.schedule_reconnect(inner.timer_seq);
                if let Some(previous) = inner.reconnect.replace(timer) {
                    previous.cancel();
                }
            }
        }

        tracing::warn!(
            %reason,
            delay_ms = self.settings.reconnect_delay.as_millis() as u64,
            "Connection closed unexpectedly"
        );
        self.router.emit(InboundEvent::Disconnected { reason });
    }

    fn schedule_reconnect(self: &Arc<Self>, id: u64) -> ReconnectTimer {
        let manager = Arc::downgrade(self);
        let delay = self.settings.reconnect_delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(manager) = manager.upgrade() {
                manager.fire_reconnect(id);
            }
        });
        ReconnectTimer { id, handle }
    }

    fn fire_reconnect(self: &Arc<Self>, id: u64) {
        let mut inner = self.lock();
        match inner.reconnect.as_ref() {
            Some(timer) if timer.id == id => {
                inner.reconnect = None;
            }
            _ => return,
        }
        if !inner.desired_connected || !matches!(inner.phase, Phase::Disconnected) {
            return;
        }
        tracing::info!(url = %self.settings.url, "Reconnecting");
        // The attempt runs on its own task; its outcome is reported as events.
        let _ = self.start_attempt(&mut inner);
    }
}

/// Forwards transport events for one connection generation.
async fn pump(
    manager: Weak<ConnectionManager>,
    generation: u64,
    mut inbound: mpsc::UnboundedReceiver<TransportEvent>,
) {
    while let Some(event) = inbound.recv().await {
        let Some(manager) = manager.upgrade() else {
            return;
        };
        if !manager.is_current(generation) {
            return;
        }
        match event {
            TransportEvent::Message(text) => manager.handle_frame(&text),
            TransportEvent::Closed { reason } => {
                manager.handle_close(generation, reason);
                return;
            }
        }
    }

    if let Some(manager) = manager.upgrade() {
        manager.handle_close(generation, "transport ended".to_string());
    }
}
