//! # Packet Decoder
//!
//! Decodes peer packets (air temperature, setpoint reply, ack).

use super::checksum::compute;
use super::packet::*;
use crate::error::DecodeError;

/// Split a frame into its checksum prefix and body, verifying the checksum
///
/// # Errors
///
/// - `MalformedFraming` if the frame is shorter than the prefix or the prefix
///   is not three ASCII digits
/// - `ChecksumMismatch` if the prefix does not match the body
pub fn split_frame(frame: &[u8]) -> Result<&[u8], DecodeError> {
    if frame.len() < CHECKSUM_PREFIX_LEN {
        return Err(DecodeError::MalformedFraming);
    }

    let (prefix, body) = frame.split_at(CHECKSUM_PREFIX_LEN);
    if !prefix.iter().all(u8::is_ascii_digit) {
        return Err(DecodeError::MalformedFraming);
    }

    let received = prefix
        .iter()
        .fold(0u16, |acc, &digit| acc * 10 + (digit - b'0') as u16);
    let expected = compute(body);

    if expected != received {
        return Err(DecodeError::ChecksumMismatch { expected, received });
    }

    Ok(body)
}

/// Decode a complete inbound frame
///
/// # Arguments
///
/// * `frame` - Raw message payload as received from the broker
///
/// # Returns
///
/// * `Result<InboundPacket, DecodeError>` - Decoded packet, or the reason it was rejected
///
/// # Errors
///
/// Returns error if:
/// - Framing is invalid (`MalformedFraming`)
/// - Checksum check fails (`ChecksumMismatch`)
/// - Body is not JSON or lacks a required field (`MalformedBody`)
/// - `dataType` is not a known tag (`UnknownPacketType`)
pub fn decode_packet(frame: &[u8]) -> Result<InboundPacket, DecodeError> {
    let body = split_frame(frame)?;

    let body: InboundBody = serde_json::from_slice(body)
        .map_err(|e| DecodeError::MalformedBody(e.to_string()))?;

    match body.data_type {
        DATA_TYPE_AIR_TEMPERATURE => Ok(InboundPacket::AirTemperature {
            value: require_temp(&body)?,
        }),
        DATA_TYPE_SETPOINT_REPLY => Ok(InboundPacket::SetpointReply {
            value: require_temp(&body)?,
            history: body.temp_history.unwrap_or_default(),
        }),
        DATA_TYPE_ACK_OK => Ok(InboundPacket::CommandAck { ok: true }),
        DATA_TYPE_ACK_CHECKSUM_ERROR => Ok(InboundPacket::CommandAck { ok: false }),
        other => Err(DecodeError::UnknownPacketType(other)),
    }
}

/// Decode an outbound command frame (the peer's side of the link)
///
/// # Errors
///
/// Same framing and checksum rules as [`decode_packet`]; an unknown `query`
/// value is reported as `MalformedBody`.
pub fn decode_command(frame: &[u8]) -> Result<OutboundCommand, DecodeError> {
    let body = split_frame(frame)?;

    let body: CommandBody = serde_json::from_slice(body)
        .map_err(|e| DecodeError::MalformedBody(e.to_string()))?;

    let query = Query::from_code(body.query)
        .ok_or_else(|| DecodeError::MalformedBody(format!("unknown query {}", body.query)))?;

    Ok(OutboundCommand {
        query,
        setpoint: body.set_temp,
    })
}

fn require_temp(body: &InboundBody) -> Result<f64, DecodeError> {
    body.current_temp.ok_or_else(|| {
        DecodeError::MalformedBody(format!("dataType {} requires currentTemp", body.data_type))
    })
}
