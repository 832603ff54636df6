//! # Telemetry Engine
//!
//! Link state machine between the UI and the thermostat peer.
//!
//! This module handles:
//! - Broker connection lifecycle (`Disconnected → Connecting → Connected`)
//! - Subscribing and querying the peer's setpoint on every connect
//! - Dispatching decoded packets into history, observables and watchdogs
//! - Counting rejected packets by failure kind
//! - Publishing setpoint commands and re-publishing unacknowledged ones
//!
//! Every mutation happens through `&mut self`. [`TelemetryEngine::run`] owns
//! the engine on a single task and feeds it UI commands, transport events and
//! watchdog timer ticks, so there is only ever one writer.

pub mod runner;
pub mod snapshot;

pub use runner::{EngineCommand, EngineHandle};
pub use snapshot::{EngineSnapshot, LinkCounters, LinkState};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{Config, TopicConfig};
use crate::error::{DecodeError, Result, ThermoLinkError};
use crate::history::{HistoryBuffer, Reading};
use crate::link::watchdog::{LinkWatchdogs, WatchdogState};
use crate::protocol::decoder::decode_packet;
use crate::protocol::encoder::encode_command;
use crate::protocol::packet::{InboundPacket, OutboundCommand, Query};
use crate::transport::{Transport, TransportEvent};

/// Command published and not yet acknowledged
#[derive(Debug, Clone)]
struct PendingCommand {
    query: Query,
    frame: String,
    attempts: u32,
}

/// Protocol engine for one thermostat peer
pub struct TelemetryEngine<T: Transport> {
    transport: T,
    topics: TopicConfig,
    max_retries: u32,
    sample_interval_s: i64,
    link_state: LinkState,
    history: HistoryBuffer,
    watchdogs: LinkWatchdogs,
    pending: Option<PendingCommand>,
    current_temperature: Option<f64>,
    setpoint: Option<i32>,
    last_reading_at: Option<DateTime<Utc>>,
    snapshots: watch::Sender<EngineSnapshot>,
}

impl<T: Transport> TelemetryEngine<T> {
    /// Create a disconnected engine
    ///
    /// # Arguments
    ///
    /// * `transport` - Broker connection; not opened until [`connect`](Self::connect)
    /// * `config` - Topics, watchdog timing and history sizing
    pub fn new(transport: T, config: &Config) -> Self {
        let now = Utc::now();
        let watchdogs = LinkWatchdogs::new(
            Duration::milliseconds(config.link.liveness_threshold_ms as i64),
            Duration::milliseconds(config.link.ack_window_ms as i64),
            now,
        );
        let (snapshots, _) = watch::channel(EngineSnapshot::default());

        Self {
            transport,
            topics: config.topics.clone(),
            max_retries: config.link.max_retries,
            sample_interval_s: config.history.sample_interval_s as i64,
            link_state: LinkState::Disconnected,
            history: HistoryBuffer::new(config.history.capacity),
            watchdogs,
            pending: None,
            current_temperature: None,
            setpoint: None,
            last_reading_at: None,
            snapshots,
        }
    }

    /// Receive a fresh [`EngineSnapshot`] after every state change
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.snapshots.subscribe()
    }

    /// Current observable state
    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            link_state: self.link_state,
            current_temperature: self.current_temperature,
            setpoint: self.setpoint,
            last_reading_at: self.last_reading_at,
            tx_pending_ack: self.watchdogs.state().tx_pending_ack,
            counters: LinkCounters::from(self.watchdogs.state()),
            history: self.history.to_vec(),
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link_state
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn watchdog_state(&self) -> &WatchdogState {
        self.watchdogs.state()
    }

    /// Deadline of the armed TX watchdog
    pub fn tx_deadline(&self) -> Option<DateTime<Utc>> {
        self.watchdogs.tx_deadline()
    }

    /// How often the RX liveness check should run
    pub fn liveness_period(&self) -> std::time::Duration {
        self.watchdogs
            .liveness_threshold()
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(30))
    }

    /// Start connecting to the broker
    ///
    /// A no-op while already connected or connecting. The link becomes
    /// `Connected` when the transport reports [`TransportEvent::Connected`].
    ///
    /// # Errors
    ///
    /// Returns the transport error if the connection attempt could not start;
    /// the link is left `Disconnected`.
    pub async fn connect(&mut self) -> Result<()> {
        match self.link_state {
            LinkState::Connected => {
                info!("Already connected to broker");
                self.publish_snapshot();
                return Ok(());
            }
            LinkState::Connecting => {
                debug!("Connection already in progress");
                return Ok(());
            }
            LinkState::Disconnected => {}
        }

        self.link_state = LinkState::Connecting;
        self.publish_snapshot();

        if let Err(e) = self.transport.connect().await {
            warn!("Failed to start broker connection: {}", e);
            self.link_state = LinkState::Disconnected;
            self.publish_snapshot();
            return Err(e);
        }

        Ok(())
    }

    /// Close the broker connection and drop any pending command
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.link_state == LinkState::Disconnected {
            return Ok(());
        }

        let result = self.transport.disconnect().await;
        if let Err(ref e) = result {
            warn!("Broker disconnect failed: {}", e);
        }
        self.on_disconnected();

        result
    }

    /// Apply a transport event, stamped with the current time
    pub async fn handle_event(&mut self, event: TransportEvent) {
        self.handle_event_at(event, Utc::now()).await;
    }

    /// Apply a transport event at `now`
    pub async fn handle_event_at(&mut self, event: TransportEvent, now: DateTime<Utc>) {
        match event {
            TransportEvent::Connected => self.on_connected(now).await,
            TransportEvent::Disconnected => self.on_disconnected(),
            TransportEvent::Message { topic, payload } => {
                self.handle_message_at(&topic, &payload, now);
            }
        }
    }

    async fn on_connected(&mut self, now: DateTime<Utc>) {
        if self.link_state != LinkState::Connecting {
            debug!("Ignoring broker connection while {:?}", self.link_state);
            return;
        }

        info!("Connected to broker");
        self.link_state = LinkState::Connected;
        self.watchdogs.arm_rx(now);
        self.publish_snapshot();

        let topic = self.topics.subscribe.clone();
        if let Err(e) = self.transport.subscribe(&topic).await {
            warn!("Failed to subscribe to {}: {}", topic, e);
            return;
        }

        if let Err(e) = self.send_command(OutboundCommand::setpoint_query(), now).await {
            warn!("Failed to query current setpoint: {}", e);
        }
        self.publish_snapshot();
    }

    fn on_disconnected(&mut self) {
        if self.link_state != LinkState::Disconnected {
            info!("Disconnected from broker");
        }

        self.link_state = LinkState::Disconnected;
        self.watchdogs.disarm_all();
        self.pending = None;
        self.publish_snapshot();
    }

    /// Decode and dispatch one inbound message
    ///
    /// Messages on other topics are ignored. Rejected frames are counted by
    /// failure kind and dropped.
    ///
    /// # Returns
    ///
    /// * `Option<InboundPacket>` - The packet that was applied, if any
    pub fn handle_message_at(
        &mut self,
        topic: &str,
        payload: &[u8],
        now: DateTime<Utc>,
    ) -> Option<InboundPacket> {
        if topic != self.topics.subscribe {
            debug!("Ignoring message on unexpected topic {}", topic);
            return None;
        }

        let packet = match decode_packet(payload) {
            Ok(packet) => packet,
            Err(e) => {
                self.record_decode_error(&e);
                self.publish_snapshot();
                return None;
            }
        };

        debug!("Received {:?}", packet);
        self.apply_packet(&packet, now);
        self.publish_snapshot();

        Some(packet)
    }

    fn record_decode_error(&mut self, error: &DecodeError) {
        warn!("Dropping inbound packet: {}", error);

        match error {
            DecodeError::ChecksumMismatch { .. } => self.watchdogs.record_checksum_error(),
            DecodeError::MalformedFraming | DecodeError::MalformedBody(_) => {
                self.watchdogs.record_malformed()
            }
            DecodeError::UnknownPacketType(_) => self.watchdogs.record_unknown_type(),
        }
    }

    fn apply_packet(&mut self, packet: &InboundPacket, now: DateTime<Utc>) {
        match packet {
            InboundPacket::AirTemperature { value } => {
                self.watchdogs.record_rx(now);
                self.history.append(Reading::new(*value, now));
                self.current_temperature = Some(*value);
                self.last_reading_at = Some(now);
            }
            InboundPacket::SetpointReply { value, history } => {
                self.setpoint = Some(*value as i32);
                self.history.append_batch(history, now, self.sample_interval_s);
                if let Some(&latest) = history.last() {
                    self.current_temperature = Some(latest);
                }
                self.last_reading_at = Some(now);

                if matches!(&self.pending, Some(p) if p.query == Query::CurrentSetpoint) {
                    self.watchdogs.acknowledge();
                    self.pending = None;
                }
            }
            InboundPacket::CommandAck { ok } => {
                self.watchdogs.acknowledge();
                self.pending = None;

                if !ok {
                    warn!("Peer reported a checksum error on the last command");
                    self.watchdogs.record_checksum_error();
                }
            }
        }
    }

    /// Send a new setpoint to the peer
    ///
    /// The displayed setpoint is updated as soon as the command is published,
    /// before the peer acknowledges it.
    ///
    /// # Errors
    ///
    /// - `NotConnected` if the link is not `Connected`
    /// - `Transport` if the publish could not be queued (watchdog stays disarmed)
    pub async fn set_temperature(&mut self, value: i32) -> Result<()> {
        self.set_temperature_at(value, Utc::now()).await
    }

    /// [`set_temperature`](Self::set_temperature) at `now`
    pub async fn set_temperature_at(&mut self, value: i32, now: DateTime<Utc>) -> Result<()> {
        if self.link_state != LinkState::Connected {
            return Err(ThermoLinkError::NotConnected);
        }

        self.send_command(OutboundCommand::set_temperature(value), now).await?;
        self.setpoint = Some(value);
        self.publish_snapshot();

        info!("Requested setpoint {}°C", value);
        Ok(())
    }

    /// Empty the history window
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.publish_snapshot();
    }

    /// Zero all link fault counters
    pub fn reset_diagnostics(&mut self) {
        self.watchdogs.reset_counters();
        self.publish_snapshot();
    }

    /// RX liveness poll at `now`
    ///
    /// # Returns
    ///
    /// * `bool` - whether a lost reading was counted
    pub fn check_liveness_at(&mut self, now: DateTime<Utc>) -> bool {
        if !self.watchdogs.check_rx(now) {
            return false;
        }

        warn!(
            "No reading from peer for {}s (lost readings: {})",
            (now - self.watchdogs.state().last_rx_at).num_seconds(),
            self.watchdogs.state().lost_rx_count
        );
        self.publish_snapshot();
        true
    }

    /// TX ack poll at `now`; re-publishes the pending command if retries remain
    ///
    /// # Returns
    ///
    /// * `bool` - whether the ack window elapsed (a lost command was counted)
    pub async fn check_ack_timeout_at(&mut self, now: DateTime<Utc>) -> bool {
        if !self.watchdogs.check_tx(now) {
            return false;
        }

        warn!(
            "Command not acknowledged within {}ms (lost commands: {})",
            self.watchdogs.ack_window().num_milliseconds(),
            self.watchdogs.state().lost_tx_count
        );

        if let Some(mut pending) = self.pending.take() {
            if pending.attempts <= self.max_retries {
                let topic = self.topics.publish.clone();
                match self.transport.publish(&topic, pending.frame.as_bytes()).await {
                    Ok(()) => {
                        pending.attempts += 1;
                        info!("Re-sent command (attempt {})", pending.attempts);
                        self.watchdogs.arm_tx(now);
                        self.pending = Some(pending);
                    }
                    Err(e) => warn!("Failed to re-send command: {}", e),
                }
            }
        }

        self.publish_snapshot();
        true
    }

    async fn send_command(&mut self, command: OutboundCommand, now: DateTime<Utc>) -> Result<()> {
        let frame = encode_command(&command)?;
        let topic = self.topics.publish.clone();

        self.transport.publish(&topic, frame.as_bytes()).await?;
        debug!("Sent {}", frame);

        self.watchdogs.arm_tx(now);
        self.pending = Some(PendingCommand {
            query: command.query,
            frame,
            attempts: 1,
        });

        Ok(())
    }

    fn publish_snapshot(&self) {
        self.snapshots.send_replace(self.snapshot());
    }
}
