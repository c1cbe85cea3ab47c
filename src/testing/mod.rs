//! Testing utilities and mock implementations
//!
//! This module provides mock implementations for testing the agent
//! without requiring an MQTT broker or real sensor hardware.

pub mod mocks;

pub use mocks::*;
