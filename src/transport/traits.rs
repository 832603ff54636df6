//! Trait abstraction for publish/subscribe transport operations to enable testing

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Lifecycle and message events reported by a transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Broker accepted the connection
    Connected,

    /// Connection closed or lost
    Disconnected,

    /// Message delivered on a subscribed topic
    Message { topic: String, payload: Bytes },
}

/// Publish/subscribe connection used by the telemetry engine
///
/// Operations only enqueue work; completion and inbound traffic arrive later
/// as [`TransportEvent`]s on the channel the transport was created with.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send {
    /// Begin connecting to the broker
    async fn connect(&mut self) -> Result<()>;

    /// Close the broker connection
    async fn disconnect(&mut self) -> Result<()>;

    /// Subscribe to a topic
    async fn subscribe(&mut self, topic: &str) -> Result<()>;

    /// Publish with at-least-once delivery
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use crate::error::ThermoLinkError;
    use std::sync::{Arc, Mutex};

    /// Transport that records every call for later inspection
    #[derive(Clone, Default)]
    pub struct RecordingTransport {
        pub connects: Arc<Mutex<usize>>,
        pub disconnects: Arc<Mutex<usize>>,
        pub subscriptions: Arc<Mutex<Vec<String>>>,
        pub published: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        pub publish_error: Arc<Mutex<Option<String>>>,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_published(&self) -> Vec<(String, Vec<u8>)> {
            self.published.lock().unwrap().clone()
        }

        pub fn get_published_frames(&self) -> Vec<String> {
            self.get_published()
                .into_iter()
                .map(|(_, payload)| String::from_utf8(payload).unwrap())
                .collect()
        }

        pub fn get_subscriptions(&self) -> Vec<String> {
            self.subscriptions.lock().unwrap().clone()
        }

        pub fn connect_count(&self) -> usize {
            *self.connects.lock().unwrap()
        }

        pub fn disconnect_count(&self) -> usize {
            *self.disconnects.lock().unwrap()
        }

        pub fn set_publish_error(&self, message: &str) {
            *self.publish_error.lock().unwrap() = Some(message.to_string());
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn connect(&mut self) -> Result<()> {
            *self.connects.lock().unwrap() += 1;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<()> {
            *self.disconnects.lock().unwrap() += 1;
            Ok(())
        }

        async fn subscribe(&mut self, topic: &str) -> Result<()> {
            self.subscriptions.lock().unwrap().push(topic.to_string());
            Ok(())
        }

        async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<()> {
            if let Some(message) = self.publish_error.lock().unwrap().clone() {
                return Err(ThermoLinkError::Transport(message));
            }
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_vec()));
            Ok(())
        }
    }
}
