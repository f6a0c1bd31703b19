//! Lifecycle enums: test execution status and transport connection state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Execution status reported by the server for one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Running,
    Completed,
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl TestStatus {
    /// Returns true once the test can no longer change.
    pub fn is_finished(&self) -> bool {
        self.is_terminal()
    }
}

impl StateMachine for TestStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TestStatus::*;
        matches!(
            (self, target),
            (Running, Running) | (Running, Completed) | (Running, Failed) | (Running, Cancelled)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TestStatus::*;
        match self {
            Running => vec![Running, Completed, Failed, Cancelled],
            Completed | Failed | Cancelled => vec![],
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Running => "running",
            TestStatus::Completed => "completed",
            TestStatus::Failed => "failed",
            TestStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// State of the single transport connection owned by a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl StateMachine for ConnectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnected)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ConnectionState::*;
        match self {
            Disconnected => vec![Connecting],
            Connecting => vec![Connected, Disconnected],
            Connected => vec![Disconnected],
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_deserializes_lowercase() {
        let status: TestStatus = serde_json::from_str("\"running\"").unwrap();
        assert_eq!(status, TestStatus::Running);
    }

    #[test]
    fn test_status_accepts_american_spelling() {
        let status: TestStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(status, TestStatus::Cancelled);
    }

    #[test]
    fn test_status_rejects_unknown_value() {
        assert!(serde_json::from_str::<TestStatus>("\"paused\"").is_err());
    }

    #[test]
    fn finished_statuses_are_terminal() {
        assert!(!TestStatus::Running.is_finished());
        assert!(TestStatus::Completed.is_finished());
        assert!(TestStatus::Failed.is_finished());
        assert!(TestStatus::Cancelled.is_finished());
    }

    #[test]
    fn completed_test_cannot_resume_running() {
        assert!(!TestStatus::Completed.can_transition_to(&TestStatus::Running));
    }

    #[test]
    fn connection_cannot_skip_connecting() {
        assert!(!ConnectionState::Disconnected.can_transition_to(&ConnectionState::Connected));
        assert!(ConnectionState::Connecting.can_transition_to(&ConnectionState::Connected));
        assert!(ConnectionState::Connected.can_transition_to(&ConnectionState::Disconnected));
    }

    #[test]
    fn connection_state_defaults_to_disconnected() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::default().is_connected());
    }
}
