//! MQTT session implementation for the device's broker connection
//!
//! This module provides a focused, decomposed MQTT session implementation that
//! separates pure functions from I/O operations for better testability and maintainability.
//!
//! # Architecture
//!
//! The module is split into four focused sub-modules:
//!
//! - [`connection`] - Pure connection state management and configuration
//! - [`message_handler`] - Pure message routing and processing logic
//! - [`health_monitor`] - Pure reconnection decision logic
//! - [`client`] - Impure I/O operations and coordination
//!
//! Subscriptions and the initial shared-attribute request are re-established
//! on every ConnAck, so callers only connect; the session keeps itself
//! current across broker disconnects.
//!
//! # Usage
//!
//! ```rust,no_run
//! use fwagent::transport::mqtt::MqttSession;
//! use fwagent::config::MqttSection;
//!
//! # tokio_test::block_on(async {
//! let config = MqttSection {
//!     broker_url: "mqtt://localhost:1883".to_string(),
//!     base_topic: "v1/devices/me".to_string(),
//!     username_env: None,
//!     password_env: None,
//!     keep_alive_secs: 60,
//! };
//!
//! let mut session = MqttSession::new("greenhouse-7", config).await?;
//! session.connect().await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # });
//! ```

pub mod client;
pub mod connection;
pub mod health_monitor;
pub mod message_handler;

// Re-export public types for convenience
pub use client::MqttSession;
pub use connection::{ConnectionState, MqttError, ReconnectConfig};
pub use health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
pub use message_handler::{EventRoute, MessageHandler};
