//! Live test-progress domain: status enums, typed inbound events, and the
//! derived per-test state shown to consumers.

mod events;
mod live_state;
mod status;

pub use events::{
    Channel, InboundEvent, ProgressMetrics, TestCompleted, TestFailure, TestProgress,
    TestStatusUpdate,
};
pub use live_state::{LiveTestState, ProgressSnapshot, StatusSnapshot};
pub use status::{ConnectionState, TestStatus};
