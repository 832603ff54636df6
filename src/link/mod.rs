//! # Link Health Module
//!
//! Liveness and acknowledgement tracking for the peer link.
//!
//! This module handles:
//! - RX liveness polling (silence from the peer)
//! - TX acknowledgement deadline for the last published command
//! - Fault counters exposed to the UI

pub mod watchdog;
