//! Typed inbound events and the channels they are routed on.

use serde_json::Value;
use std::fmt;

use crate::domain::foundation::{ClientId, Percentage, TestId, Timestamp};

use super::TestStatus;

/// Load metrics carried by a `test_progress` frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressMetrics {
    pub response_time: Option<f64>,
    pub throughput: Option<f64>,
    pub active_users: Option<u64>,
    pub error_rate: Option<f64>,
}

/// Incremental progress for a running test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestProgress {
    pub test_id: TestId,
    pub metrics: ProgressMetrics,
    pub phase: Option<String>,
    pub progress: Option<Percentage>,
    pub current_step: Option<u32>,
    pub total_steps: Option<u32>,
    pub message: Option<String>,
    /// Server timestamp when present, otherwise the receipt time.
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestStatusUpdate {
    pub test_id: TestId,
    pub status: TestStatus,
    pub progress: Option<Percentage>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestCompleted {
    pub test_id: TestId,
    pub results: Value,
}

/// Application-level failure of a test (not a transport fault).
#[derive(Debug, Clone, PartialEq)]
pub struct TestFailure {
    pub test_id: TestId,
    pub message: String,
}

/// Every event a client can route to its listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    TestProgress(TestProgress),
    TestStatusUpdate(TestStatusUpdate),
    TestCompleted(TestCompleted),
    TestError(TestFailure),
    Connected { client_id: Option<ClientId> },
    Disconnected { reason: String },
    Error { message: String },
    /// A frame type this client does not know; never routed.
    Unknown { kind: String },
}

impl InboundEvent {
    /// Channel this event is delivered on, if any.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            InboundEvent::TestProgress(_) => Some(Channel::Progress),
            InboundEvent::TestStatusUpdate(_) => Some(Channel::Status),
            InboundEvent::TestCompleted(_) => Some(Channel::Completed),
            InboundEvent::TestError(_) => Some(Channel::TestError),
            InboundEvent::Connected { .. } => Some(Channel::Connected),
            InboundEvent::Disconnected { .. } => Some(Channel::Disconnected),
            InboundEvent::Error { .. } => Some(Channel::Error),
            InboundEvent::Unknown { .. } => None,
        }
    }

    /// Test the event belongs to, for test-scoped events.
    pub fn test_id(&self) -> Option<&TestId> {
        match self {
            InboundEvent::TestProgress(e) => Some(&e.test_id),
            InboundEvent::TestStatusUpdate(e) => Some(&e.test_id),
            InboundEvent::TestCompleted(e) => Some(&e.test_id),
            InboundEvent::TestError(e) => Some(&e.test_id),
            _ => None,
        }
    }

    /// Wire name of the event, used in logs.
    pub fn kind(&self) -> &str {
        match self {
            InboundEvent::TestProgress(_) => "test_progress",
            InboundEvent::TestStatusUpdate(_) => "test_status_update",
            InboundEvent::TestCompleted(_) => "test_completed",
            InboundEvent::TestError(_) => "test_error",
            InboundEvent::Connected { .. } => "connected",
            InboundEvent::Disconnected { .. } => "disconnected",
            InboundEvent::Error { .. } => "error",
            InboundEvent::Unknown { kind } => kind,
        }
    }
}

/// Closed set of channels listeners can register on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Progress,
    Status,
    Completed,
    TestError,
    Connected,
    Disconnected,
    Error,
}

impl Channel {
    pub const TEST_SCOPED: [Channel; 4] = [
        Channel::Progress,
        Channel::Status,
        Channel::Completed,
        Channel::TestError,
    ];

    pub const CONNECTION: [Channel; 3] =
        [Channel::Connected, Channel::Disconnected, Channel::Error];

    pub fn is_test_scoped(&self) -> bool {
        Self::TEST_SCOPED.contains(self)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::Progress => "progress",
            Channel::Status => "status",
            Channel::Completed => "completed",
            Channel::TestError => "test_error",
            Channel::Connected => "connected",
            Channel::Disconnected => "disconnected",
            Channel::Error => "error",
        };
        write!(f, "{}", s)
    }
}
