//! # Packet Encoder
//!
//! Encodes outbound commands into checksummed wire text.

use super::checksum::compute;
use super::packet::*;
use crate::error::Result;

/// Encode a command into a complete wire frame
///
/// # Arguments
///
/// * `command` - Command to send
///
/// # Returns
///
/// * `Result<String>` - `"<3-digit checksum><JSON body>"`
///
/// # Examples
///
/// ```
/// use thermostat_link::protocol::encoder::encode_command;
/// use thermostat_link::protocol::packet::OutboundCommand;
///
/// let frame = encode_command(&OutboundCommand::set_temperature(21))?;
/// assert!(frame.ends_with(r#"{"query":0,"setTemp":21}"#));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn encode_command(command: &OutboundCommand) -> Result<String> {
    let body = encode_command_body(command)?;
    Ok(frame_body(&body))
}

/// Serialize the JSON body of a command (no checksum prefix)
pub fn encode_command_body(command: &OutboundCommand) -> Result<String> {
    let body = CommandBody {
        query: command.query.code(),
        set_temp: command.setpoint,
    };

    Ok(serde_json::to_string(&body)?)
}

/// Prepend the zero-padded checksum prefix to a body
pub fn frame_body(body: &str) -> String {
    let checksum = compute(body.as_bytes());

    let mut frame = String::with_capacity(CHECKSUM_PREFIX_LEN + body.len());
    frame.push_str(&format!("{:03}", checksum));
    frame.push_str(body);

    frame
}
