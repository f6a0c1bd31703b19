//! Domain layer containing the live test-progress vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors)
//! - `progress` - Test status, typed inbound events, derived consumer state

pub mod foundation;
pub mod progress;
