//! # Protocol Constants and Types
//!
//! Core packet definitions for the thermostat link.

use serde::{Deserialize, Serialize};

/// Width of the decimal checksum prefix.
///
/// The body carries no length field, so encoder and decoder must agree on this.
pub const CHECKSUM_PREFIX_LEN: usize = 3;

/// Checksum is the byte sum modulo this value
pub const CHECKSUM_MODULUS: u32 = 1000;

/// Inbound `dataType`: current air temperature reading
pub const DATA_TYPE_AIR_TEMPERATURE: i64 = 0;

/// Inbound `dataType`: reply to a setpoint query, with history replay
pub const DATA_TYPE_SETPOINT_REPLY: i64 = 1;

/// Inbound `dataType`: peer accepted the last command
pub const DATA_TYPE_ACK_OK: i64 = 2;

/// Inbound `dataType`: peer rejected the last command's checksum
pub const DATA_TYPE_ACK_CHECKSUM_ERROR: i64 = 3;

/// Query field of an outbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Query {
    /// Plain setpoint change
    #[default]
    None,

    /// Ask the peer for its setpoint and recent history
    CurrentSetpoint,
}

impl Query {
    /// Wire value of the `query` field
    pub fn code(self) -> u8 {
        match self {
            Query::None => 0,
            Query::CurrentSetpoint => 1,
        }
    }

    /// Parse the wire value of the `query` field
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Query::None),
            1 => Some(Query::CurrentSetpoint),
            _ => None,
        }
    }
}

/// Command sent to the peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundCommand {
    /// Query type
    pub query: Query,

    /// Requested setpoint in whole degrees (ignored by the peer for queries)
    pub setpoint: i32,
}

impl OutboundCommand {
    /// Command that changes the thermostat setpoint
    pub fn set_temperature(setpoint: i32) -> Self {
        Self {
            query: Query::None,
            setpoint,
        }
    }

    /// Command that requests the current setpoint and history replay
    pub fn setpoint_query() -> Self {
        Self {
            query: Query::CurrentSetpoint,
            setpoint: 0,
        }
    }
}

/// Decoded packet received from the peer
#[derive(Debug, Clone, PartialEq)]
pub enum InboundPacket {
    /// Current air temperature
    AirTemperature { value: f64 },

    /// Peer's setpoint, with recent samples oldest-first
    SetpointReply { value: f64, history: Vec<f64> },

    /// Acknowledgement of the last command (`ok == false` means the peer saw a bad checksum)
    CommandAck { ok: bool },
}

/// JSON body of an outbound command
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CommandBody {
    #[serde(alias = "Query")]
    pub query: u8,

    #[serde(alias = "SetTemp")]
    pub set_temp: i32,
}

/// JSON body of an inbound packet
///
/// Field presence depends on `data_type`, so everything else is optional here
/// and checked by the decoder.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InboundBody {
    #[serde(alias = "DataType")]
    pub data_type: i64,

    #[serde(default, alias = "CurrentTemp", alias = "temp")]
    pub current_temp: Option<f64>,

    #[serde(default, alias = "TempHistory")]
    pub temp_history: Option<Vec<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_tags() {
        assert_eq!(DATA_TYPE_AIR_TEMPERATURE, 0);
        assert_eq!(DATA_TYPE_SETPOINT_REPLY, 1);
        assert_eq!(DATA_TYPE_ACK_OK, 2);
        assert_eq!(DATA_TYPE_ACK_CHECKSUM_ERROR, 3);
    }

    #[test]
    fn test_prefix_constants() {
        assert_eq!(CHECKSUM_PREFIX_LEN, 3);
        // Largest checksum must fit the prefix
        assert_eq!(format!("{}", CHECKSUM_MODULUS - 1).len(), CHECKSUM_PREFIX_LEN);
    }

    #[test]
    fn test_query_codes() {
        assert_eq!(Query::None.code(), 0);
        assert_eq!(Query::CurrentSetpoint.code(), 1);
        assert_eq!(Query::from_code(0), Some(Query::None));
        assert_eq!(Query::from_code(1), Some(Query::CurrentSetpoint));
        assert_eq!(Query::from_code(2), None);
    }

    #[test]
    fn test_command_constructors() {
        let set = OutboundCommand::set_temperature(21);
        assert_eq!(set.query, Query::None);
        assert_eq!(set.setpoint, 21);

        let query = OutboundCommand::setpoint_query();
        assert_eq!(query.query, Query::CurrentSetpoint);
        assert_eq!(query.setpoint, 0);
    }

    #[test]
    fn test_inbound_body_accepts_pascal_case() {
        let body: InboundBody =
            serde_json::from_str(r#"{"DataType":1,"CurrentTemp":22.0,"TempHistory":[1.0]}"#).unwrap();
        assert_eq!(body.data_type, 1);
        assert_eq!(body.current_temp, Some(22.0));
        assert_eq!(body.temp_history, Some(vec![1.0]));
    }

    #[test]
    fn test_inbound_body_temp_alias() {
        let body: InboundBody = serde_json::from_str(r#"{"dataType":0,"temp":18.5}"#).unwrap();
        assert_eq!(body.current_temp, Some(18.5));
        assert_eq!(body.temp_history, None);
    }
}
