//! TestWeb Realtime - Live test-progress subscription client
//!
//! This crate keeps one WebSocket connection to the test execution server,
//! manages per-test subscriptions over it, and routes typed progress,
//! status, completion and failure events to listeners and UI bindings.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
