//! fwagent - self-updating telemetry agent for managed field devices
//!
//! A long-running device agent that publishes periodic telemetry over MQTT
//! while watching shared device attributes for firmware offers. A new image
//! is pulled in fixed-size chunks over a request/response topic pair,
//! installed next to the agent, and launched as the successor process when
//! the agent shuts down.
//!
//! # Overview
//!
//! This crate provides the complete device-side update flow, including:
//! - Attribute-driven firmware discovery with per-offer request ids
//! - Chunked image transfer with exactly one request in flight
//! - MQTT v5 transport with supervised reconnection
//! - Telemetry sampling from pluggable sensors
//! - Install and process handoff for completed downloads
//!
//! # Quick Start
//!
//! ```rust
//! use fwagent::agent::{evaluate_descriptor, AgentState, DownloadDecision, ExecutableIdentity};
//! use fwagent::protocol::FirmwareDescriptor;
//!
//! // The running executable decides whether an offer means work
//! let mut state = AgentState::new(ExecutableIdentity::from_path("/opt/agent/loader"));
//!
//! let offer = FirmwareDescriptor {
//!     title: "sensor-agent".to_string(),
//!     version: "1.4.2".to_string(),
//!     size: 4096,
//!     checksum: "3f6c".to_string(),
//!     checksum_algorithm: "crc32".to_string(),
//!     tag: "sensor-agent 1.4.2".to_string(),
//! };
//!
//! match evaluate_descriptor(&mut state, offer) {
//!     DownloadDecision::Start { request_id, target_identity } => {
//!         assert_eq!(request_id, 0);
//!         assert_eq!(target_identity, "sensor-agent-1.4.2");
//!     }
//!     other => panic!("expected a download start, got {other:?}"),
//! }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod sensor;
pub mod testing;
pub mod transport;

// Re-export the types a binary needs to wire the agent together
pub use agent::AgentSupervisor;
pub use config::*;
pub use error::{AgentError, AgentResult};
pub use protocol::*;
pub use sensor::{Sensor, SimulatedSensor};
pub use transport::mqtt::MqttSession;
