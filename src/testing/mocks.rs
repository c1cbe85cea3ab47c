//! Mock implementations for testing
//!
//! Provides mock Transport and Sensor implementations to enable
//! comprehensive testing without external dependencies.

use crate::error::AgentError;
use crate::sensor::{Sensor, SensorError};
use crate::transport::{mqtt::ConnectionState, InboundMessage, Transport};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

pub type PublishedMessage = (String, Vec<u8>);

/// Mock transport for testing
///
/// Clones share the capture history, sender slot, and connection state, so
/// tests can keep a handle after moving the transport into the component
/// under test.
#[derive(Debug, Clone)]
pub struct MockTransport {
    pub published_messages: Arc<Mutex<Vec<PublishedMessage>>>,
    pub should_fail: bool,
    pub disconnected: Arc<Mutex<bool>>,
    pub message_sender: Arc<Mutex<Option<mpsc::Sender<InboundMessage>>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Connected);
        Self {
            published_messages: Arc::default(),
            should_fail: false,
            disconnected: Arc::default(),
            message_sender: Arc::default(),
            state_tx: Arc::new(state_tx),
        }
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failure() -> Self {
        let transport = Self {
            should_fail: true,
            ..Default::default()
        };
        transport
            .state_tx
            .send_replace(ConnectionState::Disconnected(
                "Mock disconnection".to_string(),
            ));
        transport
    }

    /// Drive the connection state seen by watchers.
    pub fn set_connection_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    pub async fn get_published_messages(&self) -> Vec<PublishedMessage> {
        self.published_messages.lock().await.clone()
    }

    /// Payloads published to one topic, in publish order.
    pub async fn payloads_for(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published_messages
            .lock()
            .await
            .iter()
            .filter(|(published_topic, _)| published_topic == topic)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// The sender handed over via `set_message_sender`, for injecting
    /// inbound messages from tests.
    pub async fn message_sender(&self) -> Option<mpsc::Sender<InboundMessage>> {
        self.message_sender.lock().await.clone()
    }

    pub async fn was_disconnected(&self) -> bool {
        *self.disconnected.lock().await
    }

    pub async fn clear_history(&self) {
        self.published_messages.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MockTransport {
    type Error = AgentError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        if self.should_fail {
            Err(AgentError::internal("Mock connection failure"))
        } else {
            Ok(())
        }
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        *self.disconnected.lock().await = true;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        if self.should_fail {
            return Err(AgentError::internal("Mock publish failure"));
        }

        self.published_messages
            .lock()
            .await
            .push((topic.to_string(), payload));
        Ok(())
    }

    fn is_connected(&self) -> bool {
        matches!(*self.state_tx.borrow(), ConnectionState::Connected)
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        Some(self.state_tx.borrow().clone())
    }

    fn connection_state_receiver(&self) -> Option<watch::Receiver<ConnectionState>> {
        Some(self.state_tx.subscribe())
    }

    fn is_permanently_disconnected(&self) -> bool {
        matches!(
            *self.state_tx.borrow(),
            ConnectionState::PermanentlyDisconnected(_)
        )
    }

    fn set_message_sender(&self, sender: mpsc::Sender<InboundMessage>) {
        match self.message_sender.try_lock() {
            Ok(mut slot) => *slot = Some(sender),
            Err(_) => {
                // A reader holds the lock; finish the handoff on the runtime.
                let slot = self.message_sender.clone();
                tokio::spawn(async move {
                    *slot.lock().await = Some(sender);
                });
            }
        }
    }
}

/// Mock sensor for testing
#[derive(Debug)]
pub struct MockSensor {
    pub values: Vec<f64>,
    pub should_fail: bool,
    next: usize,
}

impl MockSensor {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            should_fail: false,
            next: 0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    pub fn with_failure() -> Self {
        Self {
            values: vec![],
            should_fail: true,
            next: 0,
        }
    }
}

#[async_trait]
impl Sensor for MockSensor {
    async fn read_value(&mut self) -> Result<f64, SensorError> {
        if self.should_fail {
            return Err(SensorError::ReadFailed {
                message: "Mock sensor failure".to_string(),
            });
        }

        let index = self.next % self.values.len().max(1);
        self.next += 1;
        Ok(self.values.get(index).copied().unwrap_or(21.5))
    }
}
