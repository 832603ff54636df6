//! # Error Types
//!
//! Custom error types for Thermostat Link using `thiserror`.

use thiserror::Error;

/// Main error type for Thermostat Link
#[derive(Debug, Error)]
pub enum ThermoLinkError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Packet body serialization errors
    #[error("Packet encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// Broker connection, subscribe or publish failures
    #[error("Transport error: {0}")]
    Transport(String),

    /// Command requires an established broker connection
    #[error("Not connected to broker")]
    NotConnected,

    /// The engine task is no longer running
    #[error("Telemetry engine has stopped")]
    EngineStopped,
}

/// Reasons an inbound frame is rejected.
///
/// None of these are fatal: the engine counts them and drops the frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    /// Shorter than the checksum prefix, or the prefix is not three digits
    #[error("Malformed framing: missing 3-digit checksum prefix")]
    MalformedFraming,

    /// Prefix does not match the checksum of the body
    #[error("Checksum mismatch: expected {expected:03}, got {received:03}")]
    ChecksumMismatch { expected: u16, received: u16 },

    /// Body is not the expected JSON shape
    #[error("Malformed body: {0}")]
    MalformedBody(String),

    /// `dataType` tag this client does not know
    #[error("Unknown packet type: {0}")]
    UnknownPacketType(i64),
}

/// Result type alias for Thermostat Link
pub type Result<T> = std::result::Result<T, ThermoLinkError>;
