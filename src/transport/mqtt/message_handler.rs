//! Pure message routing and processing logic for MQTT events
//!
//! This module contains pure functions for handling MQTT events plus the
//! forwarder that hands inbound messages to the agent's event loop.

use crate::transport::InboundMessage;
use rumqttc::v5::{mqttbytes::QoS, Event};
use tokio::sync::mpsc;
use tracing::warn;

/// Pure message routing decisions based on MQTT events
pub struct MessageHandler;

impl MessageHandler {
    /// Route MQTT event to appropriate handler (pure routing decision)
    pub fn route_mqtt_event(event: &Event) -> EventRoute {
        match event {
            Event::Incoming(incoming) => {
                use rumqttc::v5::mqttbytes::v5::Packet;
                match incoming {
                    Packet::ConnAck(_) => EventRoute::ConnectionAcknowledged,
                    Packet::Publish(publish) => EventRoute::MessageReceived {
                        topic: String::from_utf8_lossy(&publish.topic).to_string(),
                        payload: publish.payload.to_vec(),
                        retain: publish.retain,
                    },
                    Packet::Disconnect(_) => EventRoute::Disconnected,
                    Packet::SubAck(suback) => EventRoute::SubscriptionConfirmed {
                        packet_id: suback.pkid,
                        return_codes: suback.return_codes.iter().map(|_c| 0x01).collect(),
                    },
                    other => EventRoute::InfrastructureEvent(format!("{other:?}")),
                }
            }
            Event::Outgoing(_) => EventRoute::OutgoingEvent,
        }
    }

    /// Determine QoS for an outbound publish (pure function).
    /// Telemetry readings are fire-and-forget; protocol requests must arrive.
    pub fn determine_publish_qos(topic: &str, telemetry_topic: &str) -> QoS {
        if topic == telemetry_topic {
            QoS::AtMostOnce
        } else {
            QoS::AtLeastOnce
        }
    }

    /// Validate subscription success from SubAck return codes (pure function)
    pub fn validate_subscription_success(return_codes: &[u8]) -> Result<(), String> {
        if return_codes.iter().any(|&code| code >= 0x80) {
            Err(format!(
                "Subscription failed with return codes: {return_codes:?}"
            ))
        } else {
            Ok(())
        }
    }
}

/// Routing decisions for MQTT events
#[derive(Debug, Clone)]
pub enum EventRoute {
    /// Connection acknowledged - ready to publish/subscribe
    ConnectionAcknowledged,
    /// Message received on subscribed topic
    MessageReceived {
        topic: String,
        payload: Vec<u8>,
        retain: bool,
    },
    /// MQTT broker disconnected
    Disconnected,
    /// Subscription confirmed with return codes
    SubscriptionConfirmed {
        packet_id: u16,
        return_codes: Vec<u8>,
    },
    /// Infrastructure event (PingResp, etc.)
    InfrastructureEvent(String),
    /// Outgoing event (handled automatically)
    OutgoingEvent,
}

/// Message forwarding operations (impure I/O)
///
/// Every inbound message is forwarded as-is; topic classification belongs to
/// the receiving event loop, not the transport.
pub struct MessageForwarder {
    sender: Option<mpsc::Sender<InboundMessage>>,
}

impl MessageForwarder {
    pub fn new() -> Self {
        Self { sender: None }
    }

    pub fn set_message_sender(&mut self, sender: mpsc::Sender<InboundMessage>) {
        self.sender = Some(sender);
    }

    /// Forward an inbound message to the agent's event loop (impure I/O)
    pub async fn forward(&self, message: InboundMessage) -> Result<(), String> {
        if let Some(ref sender) = self.sender {
            sender
                .send(message)
                .await
                .map_err(|e| format!("Failed to forward inbound message: {e}"))?;
            Ok(())
        } else {
            warn!("Received MQTT message but no message sender configured - message dropped");
            Err("No message sender configured".to_string())
        }
    }
}

impl Default for MessageForwarder {
    fn default() -> Self {
        Self::new()
    }
}
