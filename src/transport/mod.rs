//! Transport layer for the device's broker session
//!
//! This module provides the transport abstraction and MQTT implementation
//! carrying attribute, telemetry, and firmware-chunk traffic.

pub mod mqtt;

/// One inbound broker message, exactly as received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Transport trait for the device's broker session
///
/// This trait provides an abstraction over the pub/sub transport to enable
/// dependency injection and testing. Implementations own the subscription
/// set and the reconnect policy; consumers see a publish handle and a
/// channel of inbound messages.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Connect to the broker. Resolves only once the session is confirmed;
    /// a session that drops later reconnects on its own until disconnected.
    async fn connect(&mut self) -> Result<(), Self::Error>;

    /// Disconnect from the broker. Terminal: no reconnection follows.
    async fn disconnect(&mut self) -> Result<(), Self::Error>;

    /// Publish a payload to the given topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error>;

    /// Check if transport is currently connected
    fn is_connected(&self) -> bool;

    /// Get current connection state (None before connect() is called)
    fn connection_state(&self) -> Option<mqtt::ConnectionState>;

    /// Watch connection state changes (None before connect() is called)
    fn connection_state_receiver(
        &self,
    ) -> Option<tokio::sync::watch::Receiver<mqtt::ConnectionState>>;

    /// Check if the connection is permanently disconnected
    fn is_permanently_disconnected(&self) -> bool;

    /// Set the sender that inbound messages are forwarded through
    fn set_message_sender(&self, sender: tokio::sync::mpsc::Sender<InboundMessage>);
}

/// Type alias for MQTT transport
pub type MqttTransport = mqtt::MqttSession;
