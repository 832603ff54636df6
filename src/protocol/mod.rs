//! # Telemetry Link Protocol
//!
//! Wire format shared with the thermostat peer.
//!
//! This module handles:
//! - Additive mod-1000 checksum calculation
//! - Outbound command encoding (`<3-digit checksum><JSON body>`)
//! - Inbound reading/reply/ack decoding and validation
//!
//! ```text
//! ┌──────────────────┬──────────────────────────────┐
//! │ Checksum (3 dig) │ JSON body (no length field)  │
//! └──────────────────┴──────────────────────────────┘
//! ```

pub mod packet;
pub mod encoder;
pub mod decoder;
pub mod checksum;
