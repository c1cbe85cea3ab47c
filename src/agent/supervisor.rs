//! Agent supervisor
//!
//! Owns the event loop tying transport, sensor, and firmware state
//! together. Inbound broker messages, the telemetry ticker, and the
//! connection-state watch are the event sources; the loop runs until a
//! completed install deactivates the agent, the message channel closes,
//! or the broker session is permanently lost.

use super::attributes::{evaluate_descriptor, DownloadDecision};
use super::installer::{launch_successor, Installer};
use super::state::AgentState;
use super::telemetry::TelemetryReading;
use super::transfer::{apply_chunk, ChunkOutcome};
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::protocol::{
    firmware_request_topic, DeviceTopics, FirmwareDescriptor, TopicClass, FIRMWARE_CHUNK_SIZE,
};
use crate::sensor::Sensor;
use crate::transport::{mqtt::ConnectionState, InboundMessage, Transport};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

const MESSAGE_CHANNEL_CAPACITY: usize = 100;

/// Top-level agent loop with injected transport and sensor
pub struct AgentSupervisor<T: Transport + 'static> {
    config: AgentConfig,
    transport: T,
    sensor: Box<dyn Sensor>,
    topics: DeviceTopics,
    installer: Installer,
    state: AgentState,
    rng: StdRng,
}

impl<T: Transport + 'static> AgentSupervisor<T> {
    pub fn new(
        config: AgentConfig,
        transport: T,
        sensor: Box<dyn Sensor>,
        state: AgentState,
    ) -> Self {
        let topics = DeviceTopics::new(&config.mqtt.base_topic);
        let installer = Installer::new(&config.agent.install_dir);

        Self {
            config,
            transport,
            sensor,
            topics,
            installer,
            state,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    fn create_message_channel() -> (mpsc::Sender<InboundMessage>, mpsc::Receiver<InboundMessage>) {
        mpsc::channel(MESSAGE_CHANNEL_CAPACITY)
    }

    /// Run until a completed install deactivates the agent.
    ///
    /// The sender is handed to the transport before `connect` so messages
    /// arriving during session establishment are not dropped.
    pub async fn run(&mut self) -> AgentResult<()> {
        let (message_tx, mut message_rx) = Self::create_message_channel();
        self.transport.set_message_sender(message_tx);
        self.transport
            .connect()
            .await
            .map_err(AgentError::transport)?;
        info!(agent = %self.config.agent.name, "Agent running");

        let mut state_rx = self
            .transport
            .connection_state_receiver()
            .ok_or_else(|| AgentError::internal("Transport exposed no connection state"))?;
        // Re-deliver the current state so a loss that predates the
        // subscription is still observed on the first pass.
        state_rx.mark_changed();

        let mut telemetry_tick =
            tokio::time::interval(Duration::from_millis(self.config.telemetry.interval_ms));
        telemetry_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state.active {
            tokio::select! {
                message = message_rx.recv() => {
                    match message {
                        Some(message) => self.handle_message(message).await?,
                        None => {
                            warn!("Message channel closed, stopping agent loop");
                            break;
                        }
                    }
                }
                _ = telemetry_tick.tick() => {
                    self.publish_telemetry().await?;
                }
                changed = state_rx.changed() => {
                    if changed.is_err() {
                        return Err(AgentError::internal("Broker session ended unexpectedly"));
                    }
                    match state_rx.borrow_and_update().clone() {
                        ConnectionState::PermanentlyDisconnected(reason) => {
                            error!(%reason, "Broker session permanently lost");
                            return Err(AgentError::internal(format!(
                                "Broker session permanently lost: {reason}"
                            )));
                        }
                        state => debug!(?state, "Connection state changed"),
                    }
                }
            }
        }

        info!("Agent loop ended");
        Ok(())
    }

    async fn handle_message(&mut self, message: InboundMessage) -> AgentResult<()> {
        match self.topics.classify(&message.topic) {
            TopicClass::AttributeResponse => {
                let descriptor = FirmwareDescriptor::from_attribute_response(&message.payload)?;
                self.handle_descriptor(descriptor).await;
            }
            TopicClass::AttributeUpdate => {
                let descriptor = FirmwareDescriptor::from_attribute_update(&message.payload)?;
                self.handle_descriptor(descriptor).await;
            }
            TopicClass::FirmwareChunk {
                request_id,
                chunk_index,
            } => {
                self.handle_chunk(request_id, chunk_index, &message.payload)
                    .await?;
            }
            TopicClass::Unknown => {
                debug!(topic = %message.topic, "Ignoring message on unhandled topic");
            }
        }
        Ok(())
    }

    async fn handle_descriptor(&mut self, descriptor: FirmwareDescriptor) {
        match evaluate_descriptor(&mut self.state, descriptor) {
            DownloadDecision::Start {
                request_id,
                target_identity,
            } => {
                info!(%target_identity, request_id, "New firmware target, starting download");
                self.publish_chunk_request(request_id, 0).await;
            }
            DownloadDecision::AlreadyCurrent { target_identity } => {
                info!(%target_identity, "Firmware target already running, not downloading");
            }
            DownloadDecision::LoaderStub { target_identity } => {
                info!(%target_identity, "Running from loader stub, not downloading");
            }
        }
    }

    async fn handle_chunk(
        &mut self,
        request_id: u32,
        chunk_index: u32,
        payload: &[u8],
    ) -> AgentResult<()> {
        match apply_chunk(&mut self.state.session, request_id, chunk_index, payload)? {
            ChunkOutcome::Applied { next_chunk } => {
                debug!(request_id, chunk_index, "Chunk stored");
                self.publish_chunk_request(request_id, next_chunk).await;
            }
            ChunkOutcome::Complete(session) => {
                info!(
                    request_id,
                    bytes = session.bytes_received,
                    "Firmware download complete"
                );
                let path = self.installer.install(&session).await?;
                self.state.installed = Some(path);
                self.state.active = false;
            }
            ChunkOutcome::Ignored => {
                debug!(request_id, chunk_index, "Discarding chunk for stale request id");
            }
        }
        Ok(())
    }

    /// Request one chunk. A failed publish stalls the transfer instead of
    /// ending it; the attribute re-request after a reconnect starts a
    /// fresh session.
    async fn publish_chunk_request(&self, request_id: u32, chunk_index: u32) {
        let topic = firmware_request_topic(request_id, chunk_index);
        let payload = FIRMWARE_CHUNK_SIZE.to_string().into_bytes();

        if let Err(error) = self.transport.publish(&topic, payload).await {
            warn!(%error, request_id, chunk_index, "Failed to publish chunk request");
        }
    }

    async fn publish_telemetry(&mut self) -> AgentResult<()> {
        let temperature = self.sensor.read_value().await?;
        let reading = TelemetryReading::sample(&mut self.rng, temperature);
        let payload = reading
            .to_payload()
            .map_err(|error| AgentError::internal(format!("Telemetry encode failed: {error}")))?;

        let topic = self.topics.telemetry();
        if let Err(error) = self.transport.publish(&topic, payload).await {
            // Continue anyway - don't kill the loop over one missed reading
            warn!(%error, "Failed to publish telemetry");
        }
        Ok(())
    }

    /// Disconnect and, when a download completed, launch the installed
    /// image as the successor process.
    pub async fn shutdown(&mut self) -> AgentResult<()> {
        info!("Shutting down agent");

        if let Err(error) = self.transport.disconnect().await {
            error!(%error, "Transport disconnect failed");
        }

        match self.state.installed.take() {
            Some(path) => {
                launch_successor(&path)?;
            }
            None => {
                debug!("No firmware installed, not launching a successor");
            }
        }
        Ok(())
    }
}
