//! Subscription registry: the desired set of test subscriptions and rooms.
//!
//! The registry is the source of truth for what the server should be
//! sending us. Changes made while connected go out immediately; changes
//! made while disconnected are only recorded. Every time the connection
//! comes up, [`SubscriptionRegistry::reconcile`] re-asserts the whole set,
//! one frame per entry.
//!
//! Direct sends only happen once the live connection has been reconciled,
//! and every send happens under the registry lock, so an entry changed
//! while a reconcile is pending goes out exactly once.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::adapters::websocket::codec::OutboundFrame;
use crate::domain::foundation::{DataType, RoomName, TestId};

use super::connection::ConnectionManager;

/// One desired test subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub test_id: TestId,
    pub data_type: DataType,
}

impl Subscription {
    fn frame(&self) -> OutboundFrame {
        OutboundFrame::Subscribe {
            test_id: self.test_id.clone(),
            data_type: self.data_type.clone(),
        }
    }
}

#[derive(Default)]
struct Desired {
    tests: BTreeMap<TestId, Subscription>,
    rooms: BTreeSet<RoomName>,
    /// Connection generation the set was last re-asserted on.
    synced: Option<u64>,
}

pub struct SubscriptionRegistry {
    connection: Arc<ConnectionManager>,
    default_data_type: DataType,
    desired: Mutex<Desired>,
}

impl SubscriptionRegistry {
    pub fn new(connection: Arc<ConnectionManager>, default_data_type: DataType) -> Self {
        Self {
            connection,
            default_data_type,
            desired: Mutex::new(Desired::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Desired> {
        self.desired.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True when the server already holds the reconciled set.
    fn is_synced(&self, desired: &Desired) -> bool {
        desired.synced.is_some() && self.connection.connected_generation() == desired.synced
    }

    fn send_if_synced(&self, desired: &Desired, frame: &OutboundFrame) {
        if self.is_synced(desired) {
            self.connection.send_frame(frame);
        }
    }

    // === Tests ===

    /// Subscribe to a test with the default data type.
    ///
    /// Returns false only for an invalid (empty) id.
    pub fn subscribe_to_test(&self, test_id: &str) -> bool {
        self.subscribe_with_data_type(test_id, self.default_data_type.clone())
    }

    /// Subscribe to a test, replacing any existing entry for it.
    pub fn subscribe_with_data_type(&self, test_id: &str, data_type: DataType) -> bool {
        let test_id = match TestId::new(test_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring subscribe with invalid test id");
                return false;
            }
        };

        let subscription = Subscription {
            test_id: test_id.clone(),
            data_type,
        };
        let frame = subscription.frame();
        let mut desired = self.lock();
        desired.tests.insert(test_id.clone(), subscription);
        tracing::debug!(%test_id, "Subscription recorded");
        self.send_if_synced(&desired, &frame);
        true
    }

    /// Remove a test subscription. Idempotent.
    ///
    /// Returns false only for an invalid (empty) id.
    pub fn unsubscribe_from_test(&self, test_id: &str) -> bool {
        let Ok(test_id) = TestId::new(test_id) else {
            tracing::warn!("Ignoring unsubscribe with invalid test id");
            return false;
        };

        let mut desired = self.lock();
        if desired.tests.remove(&test_id).is_some() {
            tracing::debug!(%test_id, "Subscription removed");
            self.send_if_synced(&desired, &OutboundFrame::Unsubscribe { test_id });
        }
        true
    }

    pub fn is_subscribed(&self, test_id: &TestId) -> bool {
        self.lock().tests.contains_key(test_id)
    }

    /// Snapshot of desired subscriptions, ordered by test id.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.lock().tests.values().cloned().collect()
    }

    // === Rooms ===

    /// Join a room. Returns false only for an invalid (empty) name.
    pub fn join_room(&self, room: &str) -> bool {
        let room = match RoomName::new(room) {
            Ok(room) => room,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring join with invalid room name");
                return false;
            }
        };

        let mut desired = self.lock();
        desired.rooms.insert(room.clone());
        tracing::debug!(%room, "Room membership recorded");
        self.send_if_synced(&desired, &OutboundFrame::JoinRoom { room });
        true
    }

    /// Leave a room. Idempotent.
    pub fn leave_room(&self, room: &str) -> bool {
        let Ok(room) = RoomName::new(room) else {
            tracing::warn!("Ignoring leave with invalid room name");
            return false;
        };

        let mut desired = self.lock();
        if desired.rooms.remove(&room) {
            self.send_if_synced(&desired, &OutboundFrame::LeaveRoom { room });
        }
        true
    }

    pub fn rooms(&self) -> Vec<RoomName> {
        self.lock().rooms.iter().cloned().collect()
    }

    // === Sync ===

    /// Send one frame per desired subscription and room, then mark the
    /// live connection as synced.
    ///
    /// Returns the number of frames sent.
    pub fn reconcile(&self) -> usize {
        let mut desired = self.lock();
        let Some(generation) = self.connection.connected_generation() else {
            return 0;
        };

        let frames: Vec<OutboundFrame> = desired
            .tests
            .values()
            .map(Subscription::frame)
            .chain(
                desired
                    .rooms
                    .iter()
                    .map(|room| OutboundFrame::JoinRoom { room: room.clone() }),
            )
            .collect();
        let sent = frames
            .iter()
            .filter(|frame| self.connection.send_frame(frame))
            .count();
        desired.synced = Some(generation);

        tracing::info!(sent, desired = frames.len(), generation, "Subscriptions re-asserted");
        sent
    }

    /// Forget everything, telling the server when connected.
    pub fn clear(&self) {
        let mut desired = self.lock();
        let tests = std::mem::take(&mut desired.tests);
        let rooms = std::mem::take(&mut desired.rooms);
        if !self.is_synced(&desired) {
            return;
        }
        for test_id in tests.into_keys() {
            self.connection
                .send_frame(&OutboundFrame::Unsubscribe { test_id });
        }
        for room in rooms {
            self.connection.send_frame(&OutboundFrame::LeaveRoom { room });
        }
    }
}
