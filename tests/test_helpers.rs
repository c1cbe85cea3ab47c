//! Test helpers and utilities for integration tests

use fwagent::config::{AgentConfig, AgentSection, MqttSection, TelemetrySection};
use fwagent::testing::MockTransport;
use fwagent::transport::InboundMessage;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Create a test configuration for integration tests
#[allow(dead_code)]
pub fn test_config(install_dir: &Path) -> AgentConfig {
    AgentConfig {
        agent: AgentSection {
            name: "test-device".to_string(),
            install_dir: install_dir.to_path_buf(),
        },
        mqtt: MqttSection {
            broker_url: "mqtt://localhost:1883".to_string(),
            base_topic: "v1/devices/me".to_string(),
            username_env: None,
            password_env: None,
            keep_alive_secs: 60,
        },
        // Long interval so the ticker does not race message-driven tests
        telemetry: TelemetrySection {
            interval_ms: 3_600_000,
        },
    }
}

/// Attribute request response payload advertising one firmware image
#[allow(dead_code)]
pub fn firmware_offer(title: &str, version: &str, size: usize) -> Vec<u8> {
    json!({ "shared": firmware_attributes(title, version, size) })
        .to_string()
        .into_bytes()
}

/// Pushed attribute update payload advertising one firmware image
#[allow(dead_code)]
pub fn firmware_update(title: &str, version: &str, size: usize) -> Vec<u8> {
    firmware_attributes(title, version, size)
        .to_string()
        .into_bytes()
}

fn firmware_attributes(title: &str, version: &str, size: usize) -> serde_json::Value {
    json!({
        "fw_title": title,
        "fw_version": version,
        "fw_size": size,
        "fw_checksum": "abc123",
        "fw_checksum_algorithm": "sha256",
        "fw_tag": format!("{title} {version}"),
    })
}

/// Wait for the component under test to hand its inbound sender to the
/// transport, then return it.
#[allow(dead_code)]
pub async fn wait_for_sender(
    transport: &MockTransport,
    deadline: Duration,
) -> Option<mpsc::Sender<InboundMessage>> {
    let started = tokio::time::Instant::now();
    loop {
        if let Some(sender) = transport.message_sender().await {
            return Some(sender);
        }
        if started.elapsed() > deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until at least `count` messages were published to `topic`.
#[allow(dead_code)]
pub async fn wait_for_publishes(
    transport: &MockTransport,
    topic: &str,
    count: usize,
    deadline: Duration,
) -> bool {
    let started = tokio::time::Instant::now();
    loop {
        if transport.payloads_for(topic).await.len() >= count {
            return true;
        }
        if started.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Wait until a file exists on disk (for successor-process markers).
#[allow(dead_code)]
pub async fn wait_for_file(path: &Path, deadline: Duration) -> bool {
    let started = tokio::time::Instant::now();
    loop {
        if path.exists() {
            return true;
        }
        if started.elapsed() > deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
