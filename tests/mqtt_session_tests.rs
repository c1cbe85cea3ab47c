//! Integration tests for the MQTT session
//!
//! Tests the session's broker-free behavior: construction, option
//! handling, topic layout, and the not-connected error paths. Tests that
//! need a live broker stay out of the default suite.

use fwagent::config::MqttSection;
use fwagent::transport::mqtt::MqttSession;
use fwagent::transport::Transport;

fn test_mqtt_config() -> MqttSection {
    MqttSection {
        broker_url: "mqtt://localhost:1883".to_string(),
        base_topic: "v1/devices/me".to_string(),
        username_env: None,
        password_env: None,
        keep_alive_secs: 60,
    }
}

#[tokio::test]
async fn test_session_creation() {
    // Arrange: Create MQTT config
    let config = test_mqtt_config();

    // Act: Create session
    let result = MqttSession::new("test-device", config).await;

    // Assert: Session created successfully but not yet connected
    assert!(result.is_ok(), "Session creation should succeed");
    let session = result.unwrap();
    assert!(
        !session.is_connected(),
        "Session should not be connected until connect() is called"
    );
    assert!(
        session.connection_state_receiver().is_none(),
        "No state channel should exist before connect()"
    );
}

#[tokio::test]
async fn test_session_creation_with_tls() {
    let mut config = test_mqtt_config();
    config.broker_url = "mqtts://broker.example.com:8883".to_string();

    let result = MqttSession::new("test-device-tls", config).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_session_creation_with_auth() {
    // Arrange: Set auth environment variables
    std::env::set_var("FWAGENT_SESSION_TEST_USER", "device-a-token");
    std::env::set_var("FWAGENT_SESSION_TEST_PASS", "");

    let mut config = test_mqtt_config();
    config.username_env = Some("FWAGENT_SESSION_TEST_USER".to_string());
    config.password_env = Some("FWAGENT_SESSION_TEST_PASS".to_string());

    // Act: Create session with auth config
    let result = MqttSession::new("test-device-auth", config).await;

    // Assert: Session created with credentials
    assert!(result.is_ok(), "Session with credentials should be created");

    // Cleanup
    std::env::remove_var("FWAGENT_SESSION_TEST_USER");
    std::env::remove_var("FWAGENT_SESSION_TEST_PASS");
}

#[tokio::test]
async fn test_session_invalid_broker_url() {
    let mut config = test_mqtt_config();
    config.broker_url = "not a url".to_string();

    let result = MqttSession::new("test-device", config).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_session_topics_follow_configured_base() {
    let mut config = test_mqtt_config();
    config.base_topic = "v1/gateway/device-9".to_string();

    let session = MqttSession::new("test-device", config).await.unwrap();

    let filters = session.topics().subscription_filters();
    assert!(filters.contains(&"v1/gateway/device-9/attributes/response/+".to_string()));
    assert!(filters.contains(&"v1/gateway/device-9/attributes".to_string()));
    assert!(filters.contains(&"fw/response/+/chunk/+".to_string()));
    assert_eq!(session.topics().telemetry(), "v1/gateway/device-9/telemetry");
}

#[tokio::test]
async fn test_publish_without_connection_fails() {
    let config = test_mqtt_config();
    let session = MqttSession::new("test-device", config).await.unwrap();

    let result = session
        .publish("v1/devices/me/telemetry", b"{}".to_vec())
        .await;

    assert!(result.is_err(), "Publish must fail before connect()");
}

#[tokio::test]
async fn test_disconnect_without_connection_succeeds() {
    let config = test_mqtt_config();
    let mut session = MqttSession::new("test-device", config).await.unwrap();

    let result = session.disconnect().await;

    assert!(result.is_ok(), "Disconnect should be safe before connect()");
}
