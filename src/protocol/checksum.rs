//! # Packet Checksum
//!
//! Additive checksum used by the thermostat protocol.
//!
//! **Algorithm**: sum of every body byte, modulo 1000
//!
//! This only catches transmission corruption. It is not a MAC and offers no
//! protection against deliberate tampering.

use super::packet::CHECKSUM_MODULUS;

/// Calculate the checksum of a packet body
///
/// # Arguments
///
/// * `body` - Body bytes (everything after the 3-digit prefix)
///
/// # Returns
///
/// * `u16` - Checksum in `0..=999`
///
/// # Examples
///
/// ```
/// use thermostat_link::protocol::checksum::compute;
///
/// // '{' = 123, '}' = 125
/// assert_eq!(compute(b"{}"), 248);
/// ```
pub fn compute(body: &[u8]) -> u16 {
    let sum = body
        .iter()
        .fold(0u32, |acc, &byte| (acc + byte as u32) % CHECKSUM_MODULUS);

    sum as u16
}

/// Check a received checksum against the body it was sent with
pub fn verify(received: u16, body: &[u8]) -> bool {
    compute(body) == received
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_empty() {
        assert_eq!(compute(b""), 0);
    }

    #[test]
    fn test_checksum_is_byte_sum() {
        // 'a' = 97, 'b' = 98, 'c' = 99
        assert_eq!(compute(b"abc"), 294);
    }

    #[test]
    fn test_checksum_wraps_at_1000() {
        // 8 × 0xFF = 2040 -> 40
        let data = [0xFFu8; 8];
        assert_eq!(compute(&data), 40);

        // exactly 1000 -> 0
        let data = [200u8; 5];
        assert_eq!(compute(&data), 0);
    }

    #[test]
    fn test_checksum_always_in_range() {
        let test_data = [
            vec![0xFFu8; 1],
            vec![0xFFu8; 3],
            vec![0xFFu8; 4096],
            b"{\"dataType\":0,\"currentTemp\":21.5}".to_vec(),
        ];

        for data in test_data.iter() {
            assert!(compute(data) < 1000, "Checksum out of range for {:?}", data);
        }
    }

    #[test]
    fn test_verify_accepts_own_checksum() {
        let bodies: [&[u8]; 4] = [
            b"",
            b"{}",
            b"{\"query\":1,\"setTemp\":0}",
            b"{\"dataType\":1,\"currentTemp\":22,\"tempHistory\":[20.5,21.0,21.5]}",
        ];

        for body in bodies {
            assert!(verify(compute(body), body));
        }
    }

    #[test]
    fn test_verify_rejects_any_single_byte_change() {
        // A single byte moves the sum by 1..=255, which can never be a multiple
        // of 1000, so every single-byte corruption must be detected.
        let body = b"{\"dataType\":0,\"currentTemp\":19.75}".to_vec();
        let checksum = compute(&body);

        for index in 0..body.len() {
            for replacement in [0u8, b'0', b'9', b'x', 0xFF] {
                if body[index] == replacement {
                    continue;
                }
                let mut corrupted = body.clone();
                corrupted[index] = replacement;
                assert!(
                    !verify(checksum, &corrupted),
                    "Corruption at byte {} to 0x{:02X} not detected",
                    index,
                    replacement
                );
            }
        }
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let crc1 = compute(b"{\"setTemp\":21}");
        let crc2 = compute(b"{\"setTemp\":22}");

        assert_ne!(crc1, crc2, "Checksum should change when data changes");
    }
}
