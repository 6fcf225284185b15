//! Integration tests for the recorder.
//!
//! These tests verify the interaction between components:
//! - Feed connection lifecycle against a mock server
//! - Subscription acknowledgement and update dispatch
//! - Reconnection with subscription restoration

pub mod common;
