//! Derived, UI-friendly state for a single bound test.
//!
//! [`LiveTestState::apply`] is a pure reducer over [`InboundEvent`]s. The
//! consumer binding feeds it whatever the router delivers for its test and
//! publishes the result to watchers.

use serde_json::Value;

use crate::domain::foundation::{Percentage, StateMachine, TestId, Timestamp};

use super::{InboundEvent, ProgressMetrics, TestStatus};

/// Latest progress seen for the bound test.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub test_id: TestId,
    pub progress: Percentage,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub message: Option<String>,
    pub phase: Option<String>,
    pub metrics: ProgressMetrics,
    pub timestamp: Timestamp,
}

/// Latest status seen for the bound test.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub test_id: TestId,
    pub status: TestStatus,
    pub progress: Percentage,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveTestState {
    pub is_connected: bool,
    /// Last transport or server error, cleared on reconnect.
    pub last_error: Option<String>,
    pub test_progress: Option<ProgressSnapshot>,
    pub test_status: Option<StatusSnapshot>,
    pub test_results: Option<Value>,
    pub test_error: Option<String>,
}

impl LiveTestState {
    /// Folds one event into the state.
    pub fn apply(&mut self, event: &InboundEvent) {
        match event {
            InboundEvent::Connected { .. } => {
                self.is_connected = true;
                self.last_error = None;
            }
            InboundEvent::Disconnected { .. } => {
                self.is_connected = false;
            }
            InboundEvent::Error { message } => {
                self.last_error = Some(message.clone());
            }
            InboundEvent::TestProgress(update) => {
                if self.is_finished_for(&update.test_id) {
                    tracing::debug!(test_id = %update.test_id, "Ignoring progress after terminal status");
                    return;
                }
                let progress = update
                    .progress
                    .unwrap_or_else(|| self.progress_for(&update.test_id));
                self.test_progress = Some(ProgressSnapshot {
                    test_id: update.test_id.clone(),
                    progress,
                    current_step: update.current_step,
                    total_steps: update.total_steps,
                    message: update.message.clone(),
                    phase: update.phase.clone(),
                    metrics: update.metrics.clone(),
                    timestamp: update.timestamp,
                });
                if let Some(status) = self.test_status.as_mut() {
                    if status.test_id == update.test_id {
                        status.progress = progress;
                    }
                }
            }
            InboundEvent::TestStatusUpdate(update) => {
                if let Some(current) = self.status_for(&update.test_id) {
                    if !current.can_transition_to(&update.status) {
                        tracing::debug!(
                            test_id = %update.test_id,
                            from = %current,
                            to = %update.status,
                            "Ignoring stale status update"
                        );
                        return;
                    }
                }
                let progress = if update.status == TestStatus::Completed {
                    Percentage::HUNDRED
                } else {
                    update
                        .progress
                        .unwrap_or_else(|| self.progress_for(&update.test_id))
                };
                self.test_status = Some(StatusSnapshot {
                    test_id: update.test_id.clone(),
                    status: update.status,
                    progress,
                    message: update.message.clone(),
                });
                if update.status == TestStatus::Completed {
                    self.force_progress(&update.test_id, Percentage::HUNDRED);
                }
            }
            InboundEvent::TestCompleted(done) => {
                self.test_results = Some(done.results.clone());
                self.test_status = Some(StatusSnapshot {
                    test_id: done.test_id.clone(),
                    status: TestStatus::Completed,
                    progress: Percentage::HUNDRED,
                    message: None,
                });
                self.force_progress(&done.test_id, Percentage::HUNDRED);
            }
            InboundEvent::TestError(failure) => {
                self.test_error = Some(failure.message.clone());
                self.test_status = Some(StatusSnapshot {
                    test_id: failure.test_id.clone(),
                    status: TestStatus::Failed,
                    progress: self.progress_for(&failure.test_id),
                    message: Some(failure.message.clone()),
                });
            }
            InboundEvent::Unknown { .. } => {}
        }
    }

    /// Drops everything learned about the previously bound test.
    ///
    /// Connection fields are kept.
    pub fn clear_test_data(&mut self) {
        self.test_progress = None;
        self.test_status = None;
        self.test_results = None;
        self.test_error = None;
    }

    /// True when results may be presented as final: the status is terminal
    /// and the connection is up.
    pub fn show_as_final(&self) -> bool {
        self.is_connected
            && self
                .test_status
                .as_ref()
                .is_some_and(|s| s.status.is_finished())
    }

    fn status_for(&self, test_id: &TestId) -> Option<TestStatus> {
        self.test_status
            .as_ref()
            .filter(|s| &s.test_id == test_id)
            .map(|s| s.status)
    }

    fn is_finished_for(&self, test_id: &TestId) -> bool {
        self.status_for(test_id).is_some_and(|s| s.is_finished())
    }

    fn progress_for(&self, test_id: &TestId) -> Percentage {
        self.test_progress
            .as_ref()
            .filter(|p| &p.test_id == test_id)
            .map(|p| p.progress)
            .unwrap_or_default()
    }

    fn force_progress(&mut self, test_id: &TestId, value: Percentage) {
        if let Some(snapshot) = self.test_progress.as_mut() {
            if &snapshot.test_id == test_id {
                snapshot.progress = value;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::progress::{TestCompleted, TestFailure, TestProgress, TestStatusUpdate};
    use serde_json::json;

    fn id(s: &str) -> TestId {
        TestId::new(s).unwrap()
    }

    fn progress(test: &str, pct: u8) -> InboundEvent {
        InboundEvent::TestProgress(TestProgress {
            test_id: id(test),
            metrics: ProgressMetrics {
                response_time: Some(120.0),
                ..Default::default()
            },
            phase: Some("ramp_up".into()),
            progress: Some(Percentage::new(pct)),
            current_step: Some(2),
            total_steps: Some(5),
            message: None,
            timestamp: Timestamp::now(),
        })
    }

    fn status(test: &str, status: TestStatus) -> InboundEvent {
        InboundEvent::TestStatusUpdate(TestStatusUpdate {
            test_id: id(test),
            status,
            progress: None,
            message: None,
        })
    }

    #[test]
    fn progress_event_updates_snapshot() {
        let mut state = LiveTestState::default();
        state.apply(&progress("t1", 42));

        let snapshot = state.test_progress.unwrap();
        assert_eq!(snapshot.progress.value(), 42);
        assert_eq!(snapshot.metrics.response_time, Some(120.0));
        assert_eq!(snapshot.total_steps, Some(5));
    }

    #[test]
    fn completion_is_authoritative_over_progress() {
        let mut state = LiveTestState::default();
        state.apply(&progress("t1", 42));
        state.apply(&InboundEvent::TestCompleted(TestCompleted {
            test_id: id("t1"),
            results: json!({"p95": 180}),
        }));

        let status = state.test_status.as_ref().unwrap();
        assert_eq!(status.status, TestStatus::Completed);
        assert_eq!(status.progress, Percentage::HUNDRED);
        assert_eq!(state.test_progress.as_ref().unwrap().progress, Percentage::HUNDRED);
        assert_eq!(state.test_results, Some(json!({"p95": 180})));
    }

    #[test]
    fn late_progress_does_not_regress_completed_test() {
        let mut state = LiveTestState::default();
        state.apply(&InboundEvent::TestCompleted(TestCompleted {
            test_id: id("t1"),
            results: json!(null),
        }));
        state.apply(&progress("t1", 42));

        assert_eq!(state.test_status.as_ref().unwrap().progress, Percentage::HUNDRED);
        assert!(state.test_progress.is_none());
    }

    #[test]
    fn test_error_forces_failed_status() {
        let mut state = LiveTestState::default();
        state.apply(&progress("t1", 30));
        state.apply(&InboundEvent::TestError(TestFailure {
            test_id: id("t1"),
            message: "target unreachable".into(),
        }));

        let status = state.test_status.as_ref().unwrap();
        assert_eq!(status.status, TestStatus::Failed);
        assert_eq!(status.progress.value(), 30);
        assert_eq!(state.test_error.as_deref(), Some("target unreachable"));
    }

    #[test]
    fn stale_running_status_after_completion_is_ignored() {
        let mut state = LiveTestState::default();
        state.apply(&status("t1", TestStatus::Completed));
        state.apply(&status("t1", TestStatus::Running));

        assert_eq!(state.test_status.unwrap().status, TestStatus::Completed);
    }

    #[test]
    fn status_update_keeps_last_known_progress() {
        let mut state = LiveTestState::default();
        state.apply(&progress("t1", 55));
        state.apply(&status("t1", TestStatus::Running));

        assert_eq!(state.test_status.unwrap().progress.value(), 55);
    }

    #[test]
    fn connection_events_toggle_flag_and_error() {
        let mut state = LiveTestState::default();
        state.apply(&InboundEvent::Error {
            message: "connection refused".into(),
        });
        assert_eq!(state.last_error.as_deref(), Some("connection refused"));

        state.apply(&InboundEvent::Connected { client_id: None });
        assert!(state.is_connected);
        assert!(state.last_error.is_none());

        state.apply(&InboundEvent::Disconnected {
            reason: "transport closed".into(),
        });
        assert!(!state.is_connected);
    }

    #[test]
    fn clear_test_data_keeps_connection_fields() {
        let mut state = LiveTestState::default();
        state.apply(&InboundEvent::Connected { client_id: None });
        state.apply(&progress("t1", 10));
        state.apply(&InboundEvent::TestError(TestFailure {
            test_id: id("t1"),
            message: "boom".into(),
        }));

        state.clear_test_data();

        assert!(state.is_connected);
        assert!(state.test_progress.is_none());
        assert!(state.test_status.is_none());
        assert!(state.test_results.is_none());
        assert!(state.test_error.is_none());
    }

    #[test]
    fn results_are_not_final_while_disconnected() {
        let mut state = LiveTestState::default();
        state.apply(&status("t1", TestStatus::Completed));
        assert!(!state.show_as_final());

        state.apply(&InboundEvent::Connected { client_id: None });
        assert!(state.show_as_final());
    }
}
