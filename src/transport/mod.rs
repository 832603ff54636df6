//! # Transport Module
//!
//! Publish/subscribe connection to the MQTT broker.
//!
//! This module handles:
//! - Connecting with the configured client id and keep-alive
//! - Subscribing to the inbound topic
//! - Publishing command frames with at-least-once QoS
//! - Forwarding connection lifecycle and inbound messages as [`TransportEvent`]s
//!
//! Requests are queued without waiting; a full request queue is reported as a
//! transport error instead of blocking the engine.
//!
//! The broker event loop runs in its own task. When the connection drops the
//! task reports [`TransportEvent::Disconnected`] and stops; reconnecting is a
//! new `connect()` call.

pub mod traits;

pub use traits::{Transport, TransportEvent};

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::error::{Result, ThermoLinkError};

/// MQTT transport backed by `rumqttc`
pub struct MqttTransport {
    options: MqttOptions,
    request_capacity: usize,
    events: mpsc::Sender<TransportEvent>,
    client: Option<AsyncClient>,
    poller: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for MqttTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (host, port) = self.options.broker_address();
        f.debug_struct("MqttTransport")
            .field("broker", &format!("{}:{}", host, port))
            .field("client_id", &self.options.client_id())
            .field("connected", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl MqttTransport {
    /// Create a transport that reports events on `events`
    ///
    /// Nothing is opened until [`Transport::connect`] is called.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use thermostat_link::config::BrokerConfig;
    /// use thermostat_link::transport::MqttTransport;
    /// use tokio::sync::mpsc;
    ///
    /// let (events_tx, _events_rx) = mpsc::channel(64);
    /// let transport = MqttTransport::new(&BrokerConfig::default(), events_tx);
    /// ```
    pub fn new(config: &BrokerConfig, events: mpsc::Sender<TransportEvent>) -> Self {
        let mut options = MqttOptions::new(config.effective_client_id(), &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(config.keep_alive_s));
        options.set_clean_session(config.clean_session);

        Self {
            options,
            request_capacity: config.event_capacity,
            events,
            client: None,
            poller: None,
        }
    }

    fn client(&self) -> Result<&AsyncClient> {
        self.client.as_ref().ok_or(ThermoLinkError::NotConnected)
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn connect(&mut self) -> Result<()> {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }

        let (host, port) = self.options.broker_address();
        info!("Connecting to MQTT broker at {}:{}", host, port);

        let (client, eventloop) = AsyncClient::new(self.options.clone(), self.request_capacity);
        self.poller = Some(tokio::spawn(poll_events(eventloop, self.events.clone())));
        self.client = Some(client);

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client
                .try_disconnect()
                .map_err(|e| ThermoLinkError::Transport(format!("Failed to disconnect: {}", e)))?;
        }

        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<()> {
        self.client()?
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| ThermoLinkError::Transport(format!("Failed to subscribe to {}: {}", topic, e)))?;

        debug!("Subscribed to {}", topic);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
        self.client()?
            .try_publish(topic, QoS::AtLeastOnce, false, payload.to_vec())
            .map_err(|e| ThermoLinkError::Transport(format!("Failed to publish to {}: {}", topic, e)))?;

        debug!("Published {} bytes to {}", payload.len(), topic);
        Ok(())
    }
}

impl Drop for MqttTransport {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Translate a broker event into a transport event, if it is one the engine cares about
pub fn map_event(event: Event) -> Option<TransportEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Some(TransportEvent::Connected),
        Event::Incoming(Packet::Publish(publish)) => Some(TransportEvent::Message {
            topic: publish.topic,
            payload: publish.payload,
        }),
        Event::Incoming(Packet::Disconnect) => Some(TransportEvent::Disconnected),
        _ => None,
    }
}

/// Drive the broker event loop until the connection ends or the engine goes away
async fn poll_events(mut eventloop: EventLoop, events: mpsc::Sender<TransportEvent>) {
    loop {
        let event = match eventloop.poll().await {
            Ok(event) => match map_event(event) {
                Some(event) => event,
                None => continue,
            },
            Err(e) => {
                warn!("MQTT connection error: {}", e);
                TransportEvent::Disconnected
            }
        };

        let finished = event == TransportEvent::Disconnected;
        if events.send(event).await.is_err() {
            debug!("Event receiver dropped, stopping MQTT poller");
            break;
        }
        if finished {
            break;
        }
    }
}
