//! # Thermostat Link Library
//!
//! Remote thermostat telemetry client over MQTT.
//!
//! This library provides the protocol engine that talks to a thermostat
//! microcontroller through a publish/subscribe broker: checksummed packet
//! framing, inbound packet dispatch, link liveness and acknowledgement
//! watchdogs, and a bounded temperature history for display.

pub mod config;
pub mod error;
pub mod protocol;
pub mod history;
pub mod link;
pub mod transport;
pub mod engine;
pub mod logging;
