//! Consumer binding: keeps a [`LiveTestState`] in sync with one test.
//!
//! A binding registers its own listeners, owns the subscription for the
//! bound test, and publishes every state change on a `watch` channel so
//! UIs can re-render. Dropping the binding releases all of it.

use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::foundation::{ListenerId, RoomName, TestId};
use crate::domain::progress::{Channel, LiveTestState};
use crate::ports::Scope;

use super::client::RealtimeClient;

/// How a binding mounts.
#[derive(Debug, Clone, Default)]
pub struct BindingOptions {
    pub test_id: Option<String>,
    pub room: Option<String>,
    /// Connect on mount; `None` uses the client's configured default.
    pub auto_connect: Option<bool>,
}

impl BindingOptions {
    pub fn for_test(test_id: impl Into<String>) -> Self {
        Self {
            test_id: Some(test_id.into()),
            ..Self::default()
        }
    }
}

pub struct LiveTestBinding {
    client: RealtimeClient,
    state: Arc<watch::Sender<LiveTestState>>,
    test_id: Option<TestId>,
    room: Option<RoomName>,
    connection_listeners: Vec<ListenerId>,
    test_listeners: Vec<ListenerId>,
}

impl LiveTestBinding {
    /// Register listeners, subscribe and, if asked, connect.
    ///
    /// A failed connect does not fail the mount; it shows up as
    /// `last_error` in the state.
    pub async fn mount(client: &RealtimeClient, options: BindingOptions) -> Self {
        let (state, _) = watch::channel(LiveTestState {
            is_connected: client.is_connected(),
            last_error: client.last_error(),
            ..LiveTestState::default()
        });

        let mut binding = Self {
            client: client.clone(),
            state: Arc::new(state),
            test_id: None,
            room: None,
            connection_listeners: Vec::new(),
            test_listeners: Vec::new(),
        };

        binding.connection_listeners = Channel::CONNECTION
            .into_iter()
            .map(|channel| binding.listen(channel, Scope::AllTests))
            .collect();

        if let Some(raw) = options.test_id.as_deref() {
            match TestId::new(raw) {
                Ok(test_id) => binding.bind(test_id),
                Err(e) => tracing::warn!(error = %e, "Mounting without a test"),
            }
        }

        if let Some(raw) = options.room.as_deref() {
            if client.join_room(raw) {
                binding.room = RoomName::new(raw).ok();
            }
        }

        if options.auto_connect.unwrap_or_else(|| client.auto_connect()) {
            if let Err(e) = client.connect().await {
                tracing::debug!(error = %e, "Auto-connect failed");
            }
        }

        binding
    }

    pub fn test_id(&self) -> Option<&TestId> {
        self.test_id.as_ref()
    }

    /// Current state snapshot.
    pub fn state(&self) -> LiveTestState {
        self.state.borrow().clone()
    }

    /// Receiver that wakes on every state change.
    pub fn watch(&self) -> watch::Receiver<LiveTestState> {
        self.state.subscribe()
    }

    pub fn is_reconnecting(&self) -> bool {
        self.client.is_reconnecting()
    }

    /// Rebind to another test, or to none.
    ///
    /// Same id is a no-op. Otherwise the old test is unsubscribed and its
    /// data cleared before the new one is subscribed. Returns false for an
    /// empty id, leaving the binding untouched.
    pub fn set_test_id(&mut self, test_id: Option<&str>) -> bool {
        let next = match test_id.map(TestId::new).transpose() {
            Ok(next) => next,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring invalid test id");
                return false;
            }
        };
        if next == self.test_id {
            return true;
        }

        self.unbind();
        self.state.send_modify(LiveTestState::clear_test_data);
        if let Some(test_id) = next {
            self.bind(test_id);
        }
        true
    }

    /// Release the binding now rather than at drop.
    pub fn unmount(self) {}

    fn listen(&self, channel: Channel, scope: Scope) -> ListenerId {
        let state = self.state.clone();
        self.client
            .on_fn(channel, scope, format!("live-test:{channel}"), move |event| {
                state.send_modify(|s| s.apply(event));
                Ok(())
            })
    }

    fn bind(&mut self, test_id: TestId) {
        self.test_listeners = Channel::TEST_SCOPED
            .into_iter()
            .map(|channel| self.listen(channel, Scope::Test(test_id.clone())))
            .collect();
        self.client.subscribe_to_test(test_id.as_str());
        tracing::debug!(%test_id, "Binding attached");
        self.test_id = Some(test_id);
    }

    fn unbind(&mut self) {
        for id in self.test_listeners.drain(..) {
            self.client.off(id);
        }
        if let Some(test_id) = self.test_id.take() {
            self.client.unsubscribe_from_test(test_id.as_str());
            tracing::debug!(%test_id, "Binding detached");
        }
    }
}

impl Drop for LiveTestBinding {
    fn drop(&mut self) {
        self.unbind();
        for id in self.connection_listeners.drain(..) {
            self.client.off(id);
        }
        if let Some(room) = self.room.take() {
            self.client.leave_room(room.as_str());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::websocket::InMemoryTransport;
    use crate::config::ClientConfig;
    use crate::domain::foundation::Percentage;
    use crate::domain::progress::TestStatus;
    use serde_json::json;

    fn client() -> (Arc<InMemoryTransport>, RealtimeClient) {
        let transport = Arc::new(InMemoryTransport::new());
        let client = RealtimeClient::new(&ClientConfig::default(), transport.clone()).unwrap();
        (transport, client)
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn mount_connects_and_subscribes() {
        let (transport, client) = client();

        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;

        assert!(binding.state().is_connected);
        assert_eq!(
            transport.sent_frames(),
            vec![json!({"type": "subscribe", "testId": "t1", "dataType": "stress_test_progress"})]
        );
    }

    #[tokio::test]
    async fn mount_without_auto_connect_stays_offline() {
        let (transport, client) = client();
        let options = BindingOptions {
            auto_connect: Some(false),
            ..BindingOptions::for_test("t1")
        };

        let binding = LiveTestBinding::mount(&client, options).await;

        assert!(!binding.state().is_connected);
        assert_eq!(transport.open_attempts(), 0);
        assert_eq!(client.subscriptions().len(), 1);
    }

    #[tokio::test]
    async fn mount_follows_client_auto_connect_setting() {
        let transport = Arc::new(InMemoryTransport::new());
        let config = ClientConfig {
            auto_connect: false,
            ..ClientConfig::default()
        };
        let client = RealtimeClient::new(&config, transport.clone()).unwrap();

        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;
        assert!(!binding.state().is_connected);
        assert_eq!(transport.open_attempts(), 0);

        let options = BindingOptions {
            auto_connect: Some(true),
            ..BindingOptions::for_test("t2")
        };
        let forced = LiveTestBinding::mount(&client, options).await;
        assert!(forced.state().is_connected);
        assert_eq!(transport.open_attempts(), 1);
    }

    #[tokio::test]
    async fn failed_connect_surfaces_as_last_error() {
        let (transport, client) = client();
        transport.fail_next_open("server down");

        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;

        let state = binding.state();
        assert!(!state.is_connected);
        assert_eq!(state.last_error.as_deref(), Some("Connection refused: server down"));
    }

    #[tokio::test]
    async fn progress_and_completion_update_state() {
        let (transport, client) = client();
        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;

        transport.push_json(json!({
            "type": "test_progress",
            "testId": "t1",
            "data": {"progress": 40, "currentStep": 2, "totalSteps": 5}
        }));
        settle().await;
        assert_eq!(
            binding.state().test_progress.unwrap().progress,
            Percentage::new(40)
        );

        transport.push_json(json!({"type": "test_completed", "testId": "t1", "results": {"p95": 120}}));
        settle().await;

        let state = binding.state();
        assert_eq!(state.test_results, Some(json!({"p95": 120})));
        assert_eq!(state.test_status.unwrap().status, TestStatus::Completed);
        assert!(binding.state().show_as_final());
    }

    #[tokio::test]
    async fn other_tests_are_ignored() {
        let (transport, client) = client();
        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;

        transport.push_json(json!({"type": "test_error", "testId": "t2", "error": "boom"}));
        settle().await;

        assert_eq!(binding.state().test_error, None);
    }

    #[tokio::test]
    async fn watch_wakes_on_change() {
        let (transport, client) = client();
        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;
        let mut rx = binding.watch();
        let _ = rx.borrow_and_update();

        transport.push_json(json!({"type": "test_error", "testId": "t1", "error": {"message": "boom"}}));
        settle().await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow().test_error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn switching_tests_clears_and_resubscribes() {
        let (transport, client) = client();
        let mut binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;
        transport.push_json(json!({"type": "test_error", "testId": "t1", "error": "boom"}));
        settle().await;
        transport.clear_sent();

        assert!(binding.set_test_id(Some("t2")));

        let state = binding.state();
        assert_eq!(state.test_error, None);
        assert!(state.is_connected);
        assert_eq!(
            transport.sent_frames(),
            vec![
                json!({"type": "unsubscribe", "testId": "t1"}),
                json!({"type": "subscribe", "testId": "t2", "dataType": "stress_test_progress"}),
            ]
        );

        // Late events for the old test no longer land
        transport.push_json(json!({"type": "test_error", "testId": "t1", "error": "late"}));
        settle().await;
        assert_eq!(binding.state().test_error, None);
    }

    #[tokio::test]
    async fn same_test_id_is_noop() {
        let (transport, client) = client();
        let mut binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;
        transport.clear_sent();

        assert!(binding.set_test_id(Some("t1")));
        assert!(!binding.set_test_id(Some("")));

        assert!(transport.sent_frames().is_empty());
        assert_eq!(binding.test_id().map(TestId::as_str), Some("t1"));
    }

    #[tokio::test]
    async fn unmount_releases_everything() {
        let (transport, client) = client();
        let options = BindingOptions {
            room: Some("ops".to_string()),
            ..BindingOptions::for_test("t1")
        };
        let binding = LiveTestBinding::mount(&client, options).await;
        transport.clear_sent();

        binding.unmount();

        assert!(client.subscriptions().is_empty());
        assert!(client.rooms().is_empty());
        assert_eq!(
            transport.sent_frames(),
            vec![
                json!({"type": "unsubscribe", "testId": "t1"}),
                json!({"type": "leave_room", "room": "ops"}),
            ]
        );
        // The connection belongs to the client, not the binding
        assert!(client.is_connected());
    }

    #[tokio::test]
    async fn disconnect_marks_state_offline_and_not_final() {
        let (transport, client) = client();
        let binding = LiveTestBinding::mount(&client, BindingOptions::for_test("t1")).await;
        transport.push_json(json!({"type": "test_completed", "testId": "t1", "results": {}}));
        settle().await;

        client.disconnect();

        let state = binding.state();
        assert!(!state.is_connected);
        assert!(!state.show_as_final());
        assert!(state.test_results.is_some());
    }
}
