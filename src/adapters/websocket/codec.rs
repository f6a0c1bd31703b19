//! Wire codec for the test-progress protocol.
//!
//! Defines the protocol between the client and the server:
//! - Client → Server: subscribe/unsubscribe, join/leave room
//! - Server → Client: test progress, status, completion, errors, and
//!   connection notices
//!
//! Decoding never panics; anything malformed becomes a [`CodecError`] the
//! router logs before dropping the frame.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::foundation::{ClientId, DataType, Percentage, RoomName, TestId, Timestamp};
use crate::domain::progress::{
    InboundEvent, ProgressMetrics, TestCompleted, TestFailure, TestProgress, TestStatus,
    TestStatusUpdate,
};

/// Reasons an inbound frame is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("Frame is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("Frame is not a JSON object")]
    NotAnObject,

    #[error("Frame has no string 'type' field")]
    MissingType,

    #[error("Malformed '{kind}' frame: {reason}")]
    Malformed { kind: String, reason: String },

    #[error("Frame '{kind}' has an empty testId")]
    EmptyTestId { kind: String },
}

// ============================================
// Client → Server Frames
// ============================================

/// Control frames the client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Subscribe { test_id: TestId, data_type: DataType },
    Unsubscribe { test_id: TestId },
    JoinRoom { room: RoomName },
    LeaveRoom { room: RoomName },
}

impl OutboundFrame {
    /// JSON object for this frame.
    pub fn to_json(&self) -> Value {
        match self {
            OutboundFrame::Subscribe { test_id, data_type } => json!({
                "type": "subscribe",
                "testId": test_id.as_str(),
                "dataType": data_type.as_str(),
            }),
            OutboundFrame::Unsubscribe { test_id } => json!({
                "type": "unsubscribe",
                "testId": test_id.as_str(),
            }),
            OutboundFrame::JoinRoom { room } => json!({
                "type": "join_room",
                "room": room.as_str(),
            }),
            OutboundFrame::LeaveRoom { room } => json!({
                "type": "leave_room",
                "room": room.as_str(),
            }),
        }
    }

    /// Encoded text, ready for the transport.
    pub fn encode(&self) -> String {
        self.to_json().to_string()
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutboundFrame::Subscribe { .. } => "subscribe",
            OutboundFrame::Unsubscribe { .. } => "unsubscribe",
            OutboundFrame::JoinRoom { .. } => "join_room",
            OutboundFrame::LeaveRoom { .. } => "leave_room",
        }
    }
}

// ============================================
// Server → Client Frames
// ============================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireFrame {
    TestProgress(ProgressFrame),
    TestStatusUpdate(StatusFrame),
    TestCompleted(CompletedFrame),
    TestError(ErrorFrame),
    Connected(ConnectedFrame),
    Disconnected(DisconnectedFrame),
    Error(ServerErrorFrame),
}

const KNOWN_TYPES: &[&str] = &[
    "test_progress",
    "test_status_update",
    "test_completed",
    "test_error",
    "connected",
    "disconnected",
    "error",
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressFrame {
    test_id: String,
    data: ProgressData,
    #[serde(default)]
    timestamp: Option<WireTimestamp>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressData {
    response_time: Option<f64>,
    throughput: Option<f64>,
    active_users: Option<f64>,
    error_rate: Option<f64>,
    phase: Option<String>,
    progress: Option<f64>,
    current_step: Option<u32>,
    total_steps: Option<u32>,
    message: Option<String>,
}

/// Browsers send either `Date.now()` millis or an ISO string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(String),
}

impl WireTimestamp {
    fn resolve(&self) -> Option<Timestamp> {
        match self {
            WireTimestamp::Millis(ms) => Timestamp::from_unix_millis(*ms),
            WireTimestamp::Text(s) => Timestamp::parse_rfc3339(s),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusFrame {
    test_id: String,
    status: TestStatus,
    #[serde(default)]
    progress: Option<f64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletedFrame {
    test_id: String,
    #[serde(default)]
    results: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorFrame {
    test_id: String,
    error: WireError,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireError {
    Detailed { message: String },
    Text(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConnectedFrame {
    #[serde(default)]
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DisconnectedFrame {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServerErrorFrame {
    #[serde(default)]
    message: Option<String>,
}

/// Parses and validates one inbound text frame.
///
/// Unknown `type` values decode to [`InboundEvent::Unknown`] so servers can
/// add message types without breaking older clients.
pub fn decode(text: &str) -> Result<InboundEvent, CodecError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| CodecError::InvalidJson(e.to_string()))?;
    let object = value.as_object().ok_or(CodecError::NotAnObject)?;
    let kind = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(CodecError::MissingType)?
        .to_string();

    if !KNOWN_TYPES.contains(&kind.as_str()) {
        return Ok(InboundEvent::Unknown { kind });
    }

    let frame: WireFrame = serde_json::from_value(value).map_err(|e| CodecError::Malformed {
        kind: kind.clone(),
        reason: e.to_string(),
    })?;

    let test_id = |raw: &str| {
        TestId::new(raw).map_err(|_| CodecError::EmptyTestId { kind: kind.clone() })
    };

    let event = match frame {
        WireFrame::TestProgress(f) => {
            let data = f.data;
            InboundEvent::TestProgress(TestProgress {
                test_id: test_id(&f.test_id)?,
                metrics: ProgressMetrics {
                    response_time: data.response_time,
                    throughput: data.throughput,
                    active_users: data.active_users.map(|u| u.max(0.0).round() as u64),
                    error_rate: data.error_rate,
                },
                phase: data.phase,
                progress: data.progress.map(Percentage::from_f64_clamped),
                current_step: data.current_step,
                total_steps: data.total_steps,
                message: data.message,
                timestamp: f
                    .timestamp
                    .as_ref()
                    .and_then(WireTimestamp::resolve)
                    .unwrap_or_else(Timestamp::now),
            })
        }
        WireFrame::TestStatusUpdate(f) => InboundEvent::TestStatusUpdate(TestStatusUpdate {
            test_id: test_id(&f.test_id)?,
            status: f.status,
            progress: f.progress.map(Percentage::from_f64_clamped),
            message: f.message,
        }),
        WireFrame::TestCompleted(f) => InboundEvent::TestCompleted(TestCompleted {
            test_id: test_id(&f.test_id)?,
            results: f.results,
        }),
        WireFrame::TestError(f) => {
            let message = match f.error {
                WireError::Detailed { message } | WireError::Text(message) => message,
            };
            InboundEvent::TestError(TestFailure {
                test_id: test_id(&f.test_id)?,
                message,
            })
        }
        WireFrame::Connected(f) => InboundEvent::Connected {
            client_id: f.client_id.filter(|s| !s.is_empty()).map(ClientId::new),
        },
        WireFrame::Disconnected(f) => InboundEvent::Disconnected {
            reason: f.reason.unwrap_or_else(|| "server disconnect".to_string()),
        },
        WireFrame::Error(f) => InboundEvent::Error {
            message: f.message.unwrap_or_else(|| "unknown server error".to_string()),
        },
    };

    Ok(event)
}
