//! Impure I/O operations for the MQTT session
//!
//! This module handles all impure I/O operations including network
//! communication, async coordination, and integration with the rumqttc client.

use super::connection::{configure_mqtt_options, ConnectionState, MqttError, ReconnectConfig};
use super::health_monitor::{ConnectionEvent, HealthMonitor, ReconnectionDecision};
use super::message_handler::{EventRoute, MessageForwarder, MessageHandler};
use crate::config::MqttSection;
use crate::protocol::DeviceTopics;
use crate::transport::{InboundMessage, Transport};
use async_trait::async_trait;
use rumqttc::v5::mqttbytes::v5::PublishProperties;
use rumqttc::v5::{mqttbytes::QoS, AsyncClient, EventLoop};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// MQTT session for a single field device.
///
/// Owns the rumqttc client and event loop, and keeps the device session
/// established across broker disconnects: every ConnAck re-subscribes the
/// attribute and firmware filters and re-requests the shared attributes, so
/// a firmware update published while the device was offline is still seen.
pub struct MqttSession {
    agent_name: String,
    client: Arc<Mutex<AsyncClient>>,
    event_loop: Option<Arc<Mutex<EventLoop>>>,
    config: MqttSection,
    topics: DeviceTopics,
    event_loop_handle: Option<JoinHandle<()>>,
    state_rx: Option<watch::Receiver<ConnectionState>>,
    state_tx: Option<watch::Sender<ConnectionState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    reconnect_config: ReconnectConfig,
    message_forwarder: Arc<Mutex<MessageForwarder>>,
}

impl MqttSession {
    pub async fn new(agent_name: &str, config: MqttSection) -> Result<Self, MqttError> {
        let mqtt_options = configure_mqtt_options(agent_name, &config)?;

        // Create client and event loop
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);

        Ok(MqttSession {
            agent_name: agent_name.to_string(),
            client: Arc::new(Mutex::new(client)),
            event_loop: Some(Arc::new(Mutex::new(event_loop))),
            topics: DeviceTopics::new(config.base_topic.clone()),
            config,
            event_loop_handle: None,
            state_rx: None,
            state_tx: None,
            shutdown_tx: None,
            reconnect_config: ReconnectConfig::default(),
            message_forwarder: Arc::new(Mutex::new(MessageForwarder::new())),
        })
    }

    /// Topic set this session subscribes and publishes on
    pub fn topics(&self) -> &DeviceTopics {
        &self.topics
    }

    /// Helper method to create new MQTT connection and event loop
    /// Used for initial connection and reconnection attempts
    fn create_connection(
        agent_name: &str,
        config: &MqttSection,
    ) -> Result<(AsyncClient, EventLoop), MqttError> {
        let mqtt_options = configure_mqtt_options(agent_name, config)?;
        let (client, event_loop) = AsyncClient::new(mqtt_options, 10);
        Ok((client, event_loop))
    }

    /// Create connection state and shutdown channels
    /// Pure function for channel setup - easily testable
    #[allow(clippy::type_complexity)]
    fn setup_connection_channels() -> (
        (
            watch::Sender<ConnectionState>,
            watch::Receiver<ConnectionState>,
        ),
        (watch::Sender<bool>, watch::Receiver<bool>),
    ) {
        let state_channels = watch::channel(ConnectionState::Connecting);
        let shutdown_channels = watch::channel(false);
        (state_channels, shutdown_channels)
    }

    /// Wait for connection confirmation (ConnAck) with timeout
    async fn wait_for_connection_confirmation(
        mut state_rx: watch::Receiver<ConnectionState>,
        timeout: Duration,
    ) -> Result<(), MqttError> {
        let timeout_result = tokio::time::timeout(timeout, async {
            loop {
                if state_rx.changed().await.is_err() {
                    return Err(MqttError::ConnectionFailedStr(
                        "State channel closed".to_string(),
                    ));
                }
                match *state_rx.borrow() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Disconnected(ref reason) => {
                        return Err(MqttError::ConnectionFailedStr(reason.clone()));
                    }
                    ConnectionState::PermanentlyDisconnected(ref reason) => {
                        return Err(MqttError::ConnectionFailedStr(format!(
                            "Permanently disconnected: {reason}"
                        )));
                    }
                    ConnectionState::Connecting => continue,
                    ConnectionState::Reconnecting(_) => continue,
                }
            }
        })
        .await;

        match timeout_result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(MqttError::ConnectionFailedStr(
                "ConnAck timeout - no connection confirmation received".to_string(),
            )),
        }
    }

    /// Connect to the broker and start the event loop supervisor.
    ///
    /// Only returns success on an actual ConnAck. The spawned supervisor
    /// keeps reconnecting with backoff until shutdown is signalled.
    pub async fn connect(&mut self) -> Result<(), MqttError> {
        let event_loop = self.event_loop.take().ok_or_else(|| {
            MqttError::ConnectionFailedStr("Event loop already started".to_string())
        })?;

        // Setup channels using pure function
        let ((state_tx, state_rx), (shutdown_tx, mut shutdown_rx)) =
            Self::setup_connection_channels();
        self.state_rx = Some(state_rx.clone());
        self.state_tx = Some(state_tx.clone());
        self.shutdown_tx = Some(shutdown_tx);

        // Spawn reconnection supervisor with backoff and graceful shutdown
        let agent_name = self.agent_name.clone();
        let config = self.config.clone();
        let shared_client = self.client.clone();
        let reconnect_config = self.reconnect_config.clone();
        let topics = self.topics.clone();
        let message_forwarder = self.message_forwarder.clone();

        let handle = tokio::spawn(async move {
            info!(
                "Starting MQTT event loop with reconnection supervisor for device: {}",
                agent_name
            );
            let mut reconnect_attempts = 0u32;
            let mut current_event_loop = event_loop;

            loop {
                tokio::select! {
                    // Check for shutdown signal first (higher priority)
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            info!("Shutdown signal received, stopping reconnection supervisor");
                            break;
                        }
                    }

                    // Process MQTT events
                    event_result = async {
                        let mut event_loop_guard = current_event_loop.lock().await;
                        event_loop_guard.poll().await
                    } => {
                        match event_result {
                            Ok(event) => {
                                let route = MessageHandler::route_mqtt_event(&event);
                                if !Self::process_event_route(
                                    route,
                                    &state_tx,
                                    &mut reconnect_attempts,
                                    &shared_client,
                                    &topics,
                                    &message_forwarder,
                                    &agent_name,
                                    &reconnect_config,
                                    shutdown_rx.clone(),
                                    &mut current_event_loop,
                                    &config,
                                ).await {
                                    break;
                                }
                            }
                            Err(e) => {
                                if !Self::handle_event_loop_error(
                                    e,
                                    &agent_name,
                                    &state_tx,
                                    reconnect_attempts,
                                    &reconnect_config,
                                    shutdown_rx.clone(),
                                    &mut reconnect_attempts,
                                    &mut current_event_loop,
                                    &config,
                                    &shared_client,
                                ).await {
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            info!("MQTT event loop stopped for device: {}", agent_name);
        });

        self.event_loop_handle = Some(handle);

        // Wait for ACTUAL ConnAck, not just any event
        let connection_timeout =
            HealthMonitor::calculate_connection_timeout(&self.reconnect_config);
        Self::wait_for_connection_confirmation(state_rx, connection_timeout).await?;

        Ok(())
    }

    /// Handle event loop error - extracted for testability
    /// Returns true to continue loop (after reconnection), false to break
    #[allow(clippy::too_many_arguments)]
    async fn handle_event_loop_error(
        error: rumqttc::v5::ConnectionError,
        agent_name: &str,
        state_tx: &watch::Sender<ConnectionState>,
        reconnect_attempts: u32,
        reconnect_config: &ReconnectConfig,
        shutdown_rx: watch::Receiver<bool>,
        reconnect_attempts_mut: &mut u32,
        current_event_loop: &mut Arc<Mutex<EventLoop>>,
        config: &MqttSection,
        shared_client: &Arc<Mutex<AsyncClient>>,
    ) -> bool {
        let error_str = error.to_string();
        let new_state = HealthMonitor::determine_next_state(
            &ConnectionState::Connected,
            ConnectionEvent::NetworkError(error_str.clone()),
        );
        let _ = state_tx.send(new_state);

        error!("MQTT event loop error for device {}: {}", agent_name, error);

        Self::should_attempt_reconnection(
            reconnect_attempts,
            reconnect_config,
            shutdown_rx,
            state_tx,
            reconnect_attempts_mut,
            current_event_loop,
            agent_name,
            config,
            shared_client,
        )
        .await
    }

    /// Process routed MQTT event - extracted for testability
    /// Returns true to continue loop, false to break
    #[allow(clippy::too_many_arguments)]
    async fn process_event_route(
        route: EventRoute,
        state_tx: &watch::Sender<ConnectionState>,
        reconnect_attempts: &mut u32,
        shared_client: &Arc<Mutex<AsyncClient>>,
        topics: &DeviceTopics,
        message_forwarder: &Arc<Mutex<MessageForwarder>>,
        agent_name: &str,
        reconnect_config: &ReconnectConfig,
        shutdown_rx: watch::Receiver<bool>,
        current_event_loop: &mut Arc<Mutex<EventLoop>>,
        config: &MqttSection,
    ) -> bool {
        match route {
            EventRoute::ConnectionAcknowledged => {
                let new_state = HealthMonitor::determine_next_state(
                    &ConnectionState::Connecting,
                    ConnectionEvent::ConnAckReceived,
                );
                let _ = state_tx.send(new_state);
                *reconnect_attempts = 0;
                Self::establish_device_session(shared_client, topics).await;
                true
            }
            EventRoute::MessageReceived {
                topic,
                payload,
                retain: _,
            } => {
                Self::handle_message_received(message_forwarder, topic, payload).await;
                true
            }
            EventRoute::Disconnected => {
                let new_state = HealthMonitor::determine_next_state(
                    &ConnectionState::Connected,
                    ConnectionEvent::DisconnectedByBroker,
                );
                let _ = state_tx.send(new_state);

                Self::should_attempt_reconnection(
                    *reconnect_attempts,
                    reconnect_config,
                    shutdown_rx,
                    state_tx,
                    reconnect_attempts,
                    current_event_loop,
                    agent_name,
                    config,
                    shared_client,
                )
                .await
            }
            EventRoute::SubscriptionConfirmed {
                packet_id: _,
                return_codes,
            } => {
                match MessageHandler::validate_subscription_success(&return_codes) {
                    Ok(()) => {
                        tracing::debug!(target: "mqtt_transport", "Subscription confirmed: {:?}", return_codes)
                    }
                    Err(e) => warn!("Subscription rejected by broker: {}", e),
                }
                true
            }
            EventRoute::InfrastructureEvent(event_str) => {
                tracing::debug!(target: "mqtt_transport", "MQTT event: {}", event_str);
                true
            }
            EventRoute::OutgoingEvent => true,
        }
    }

    /// (Re)establish the device session after a ConnAck.
    ///
    /// Subscribes the attribute and firmware-chunk filters, then requests the
    /// current shared attributes so a pending firmware target is discovered
    /// without waiting for a push.
    async fn establish_device_session(client: &Arc<Mutex<AsyncClient>>, topics: &DeviceTopics) {
        let client_guard = client.lock().await;

        for filter in topics.subscription_filters() {
            if let Err(e) = client_guard.subscribe(&filter, QoS::AtLeastOnce).await {
                error!("Failed to subscribe to {}: {}", filter, e);
            } else {
                tracing::debug!(target: "mqtt_transport", "Subscribed to: {}", filter);
            }
        }

        let request_topic = topics.attribute_request();
        if let Err(e) = client_guard
            .publish_with_properties(
                &request_topic,
                QoS::AtLeastOnce,
                false,
                "{}".to_string(),
                PublishProperties::default(),
            )
            .await
        {
            error!("Failed to request shared attributes: {}", e);
        } else {
            debug!("Requested shared attributes on {}", request_topic);
        }
    }

    /// Helper to forward received messages to the agent loop
    async fn handle_message_received(
        message_forwarder: &Arc<Mutex<MessageForwarder>>,
        topic: String,
        payload: Vec<u8>,
    ) {
        tracing::debug!(target: "mqtt_transport", "Received MQTT message on topic: {}", topic);

        let forwarder_guard = message_forwarder.lock().await;
        if let Err(e) = forwarder_guard
            .forward(InboundMessage { topic, payload })
            .await
        {
            error!("Failed to forward inbound message: {}", e);
        }
    }

    /// Perform interruptible sleep with shutdown monitoring
    /// Returns true if sleep completed, false if shutdown requested
    async fn interruptible_sleep(mut shutdown_rx: watch::Receiver<bool>, delay_ms: u64) -> bool {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received during reconnection delay, stopping");
                    return false;
                }
                true
            }
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => {
                true
            }
        }
    }

    /// Apply new connection after reconnection attempt
    /// Returns true on success, true on failure (to retry)
    async fn apply_new_connection(
        agent_name: &str,
        config: &MqttSection,
        current_event_loop: &mut Arc<Mutex<EventLoop>>,
        shared_client: &Arc<Mutex<AsyncClient>>,
    ) -> bool {
        match Self::create_connection(agent_name, config) {
            Ok((new_client, new_event_loop)) => {
                info!("Created new connection for reconnection attempt");
                *current_event_loop = Arc::new(Mutex::new(new_event_loop));

                // Update the shared client so publish methods work with new connection
                {
                    let mut client_guard = shared_client.lock().await;
                    *client_guard = new_client;
                }
                true
            }
            Err(e) => {
                error!("Failed to create new connection: {}", e);
                true // Continue the loop to try again
            }
        }
    }

    /// Helper to handle reconnection logic
    #[allow(clippy::too_many_arguments)]
    async fn should_attempt_reconnection(
        current_attempts: u32,
        reconnect_config: &ReconnectConfig,
        shutdown_rx: watch::Receiver<bool>,
        state_tx: &watch::Sender<ConnectionState>,
        reconnect_attempts: &mut u32,
        current_event_loop: &mut Arc<Mutex<EventLoop>>,
        agent_name: &str,
        config: &MqttSection,
        shared_client: &Arc<Mutex<AsyncClient>>,
    ) -> bool {
        let decision = HealthMonitor::should_attempt_reconnection(
            current_attempts,
            reconnect_config,
            *shutdown_rx.borrow(),
        );

        match decision {
            ReconnectionDecision::Proceed { attempt, delay_ms } => {
                *reconnect_attempts = attempt;
                let new_state = HealthMonitor::determine_next_state(
                    &ConnectionState::Disconnected("".to_string()),
                    ConnectionEvent::ReconnectionStarted(attempt),
                );
                let _ = state_tx.send(new_state);

                let max_display = reconnect_config
                    .max_attempts
                    .map_or("unlimited".to_string(), |max| max.to_string());
                info!(
                    "Attempting reconnection {}/{} after {}ms delay",
                    attempt, max_display, delay_ms
                );

                // Sleep with shutdown monitoring
                if !Self::interruptible_sleep(shutdown_rx.clone(), delay_ms).await {
                    return false;
                }

                // Final shutdown check before creating new connection
                if *shutdown_rx.borrow() {
                    info!("Shutdown signal received, aborting reconnection");
                    return false;
                }

                // Apply new connection
                Self::apply_new_connection(agent_name, config, current_event_loop, shared_client)
                    .await
            }
            ReconnectionDecision::AbortShutdownRequested => {
                info!("Shutdown signal received, stopping reconnection");
                false
            }
            ReconnectionDecision::AbortMaxAttemptsExceeded => {
                let reason = "Max reconnection attempts exceeded".to_string();
                let new_state = HealthMonitor::determine_next_state(
                    &ConnectionState::Disconnected("".to_string()),
                    ConnectionEvent::PermanentFailure(reason),
                );
                let _ = state_tx.send(new_state);
                false
            }
        }
    }

    /// Disconnect from the broker and stop the reconnection supervisor
    pub async fn disconnect(&mut self) -> Result<(), MqttError> {
        // Signal the reconnection supervisor to stop
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
            info!("Sent shutdown signal to reconnection supervisor");
        }

        let client = self.client.lock().await;
        client
            .disconnect()
            .await
            .map_err(|e| MqttError::ConnectionFailed(Box::new(e)))?;

        // Update connection state to Disconnected
        if let Some(state_tx) = &self.state_tx {
            let _ = state_tx.send(ConnectionState::Disconnected(
                "Client disconnected".to_string(),
            ));
        }

        // Graceful shutdown coordination with the reconnection supervisor
        if let Some(handle) = self.event_loop_handle.take() {
            let graceful_shutdown = tokio::time::timeout(Duration::from_secs(2), handle).await;

            match graceful_shutdown {
                Ok(Ok(())) => {
                    info!("Event loop task shut down gracefully");
                }
                Ok(Err(e)) if !e.is_cancelled() => {
                    warn!("Event loop task ended with error: {}", e);
                }
                Err(_) => {
                    warn!("Event loop task didn't shut down gracefully, forcing abort");
                    // Task is automatically aborted when JoinHandle is dropped
                }
                _ => {}
            }
        }

        info!("MQTT session disconnected");
        Ok(())
    }

    /// Get current connection state
    /// Returns None if connection hasn't been established yet
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.state_rx.as_ref().map(|rx| rx.borrow().clone())
    }

    /// Check if the connection is permanently disconnected
    pub fn is_permanently_disconnected(&self) -> bool {
        matches!(
            self.connection_state(),
            Some(ConnectionState::PermanentlyDisconnected(_))
        )
    }

    /// Watch connection state changes
    /// Returns None if connection hasn't been established yet
    pub fn connection_state_receiver(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.state_rx.clone()
    }

    /// Check connection state before operations
    fn check_connection_state(&self) -> Result<(), MqttError> {
        // state_rx being None means the session was never connected
        let state_rx = self.state_rx.as_ref().ok_or_else(|| {
            MqttError::ConnectionFailedStr("Session not connected: state_rx is None".to_string())
        })?;

        let current_state = state_rx.borrow().clone();
        if !HealthMonitor::can_publish(&current_state) {
            return Err(MqttError::NotConnected {
                state: current_state,
            });
        }

        Ok(())
    }
}

/// Implementation of Transport trait for MqttSession
#[async_trait]
impl Transport for MqttSession {
    type Error = MqttError;

    async fn connect(&mut self) -> Result<(), Self::Error> {
        MqttSession::connect(self).await
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        MqttSession::disconnect(self).await
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), Self::Error> {
        self.check_connection_state()?;

        // Telemetry is fire-and-forget; protocol requests ride QoS 1
        let qos = MessageHandler::determine_publish_qos(topic, &self.topics.telemetry());
        let client = self.client.lock().await;
        client
            .publish_with_properties(topic, qos, false, payload, PublishProperties::default())
            .await
            .map_err(|e| MqttError::PublishFailed(Box::new(e)))?;

        Ok(())
    }

    fn is_connected(&self) -> bool {
        matches!(self.connection_state(), Some(ConnectionState::Connected))
    }

    fn connection_state(&self) -> Option<ConnectionState> {
        MqttSession::connection_state(self)
    }

    fn connection_state_receiver(&self) -> Option<watch::Receiver<ConnectionState>> {
        MqttSession::connection_state_receiver(self)
    }

    fn is_permanently_disconnected(&self) -> bool {
        MqttSession::is_permanently_disconnected(self)
    }

    fn set_message_sender(&self, sender: mpsc::Sender<InboundMessage>) {
        // Use async runtime to handle the async method call
        let message_forwarder = self.message_forwarder.clone();
        tokio::spawn(async move {
            let mut forwarder = message_forwarder.lock().await;
            forwarder.set_message_sender(sender);
        });
    }
}

impl Drop for MqttSession {
    fn drop(&mut self) {
        // Signal shutdown to background tasks if they're still running
        if let Some(shutdown_tx) = &self.shutdown_tx {
            let _ = shutdown_tx.send(true);
        }

        // Abort the event loop task if it's still running
        if let Some(handle) = self.event_loop_handle.take() {
            handle.abort();
        }

        // Drop cannot run async operations, so users should call disconnect()
        // explicitly for graceful shutdown. This only cleans up background tasks.
    }
}
