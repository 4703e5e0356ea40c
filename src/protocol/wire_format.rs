//! Wire format encoding and decoding.
//!
//! Every frame on the serial link has the layout:
//! ```text
//! ┌────────┬──────────┬─────────┬───────────────┬──────────┐
//! │ Header │ Length   │ Command │ Payload       │ Checksum │
//! │ 1 byte │ 2 bytes  │ 1 byte  │ Length-1 bytes│ 1 byte   │
//! │ 0x55   │ uint16 BE│         │               │          │
//! └────────┴──────────┴─────────┴───────────────┴──────────┘
//! ```
//!
//! `Length` counts the command byte plus the payload. The checksum is the
//! wrapping 8-bit sum of every byte before it, header included.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{GatewayError, Result};

/// Sentinel byte that starts every frame.
pub const HEADER_BYTE: u8 = 0x55;

/// Bytes surrounding the length-counted section (header + length + checksum).
pub const FRAME_OVERHEAD: usize = 4;

/// Size of the command field, counted in the length field.
pub const COMMAND_SIZE: usize = 1;

/// Largest payload that fits in the 16-bit length field.
pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - COMMAND_SIZE;

/// Command codes carried in the command byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// Attribute read/write/delete addressed to an object.
    Command = 0,
    /// Unsolicited attribute value pushed by the network.
    PushEvent = 1,
    /// Provision a new object on the network.
    AddObject = 2,
    /// Remove an object from the network.
    DeleteObject = 3,
    /// Network scan.
    Scan = 4,
}

impl CommandCode {
    /// Raw byte value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = GatewayError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Command),
            1 => Ok(Self::PushEvent),
            2 => Ok(Self::AddObject),
            3 => Ok(Self::DeleteObject),
            4 => Ok(Self::Scan),
            other => Err(GatewayError::UnknownCommand(other)),
        }
    }
}

impl std::fmt::Display for CommandCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Wrapping 8-bit sum of the given bytes.
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Encode a command and payload into a complete wire frame.
///
/// # Errors
///
/// Returns `FrameTooLarge` if the payload exceeds [`MAX_PAYLOAD_SIZE`].
///
/// # Example
///
/// ```
/// use zigbee_gateway::protocol::{encode_frame, CommandCode};
///
/// let bytes = encode_frame(CommandCode::Command, &[0x01, 0x02, 0x03]).unwrap();
/// assert_eq!(&bytes[..4], &[0x55, 0x00, 0x04, 0x00]);
/// assert_eq!(bytes[7], 0x55 + 0x04 + 0x01 + 0x02 + 0x03);
/// ```
pub fn encode_frame(command: CommandCode, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(GatewayError::FrameTooLarge(payload.len()));
    }
    let length = (payload.len() + COMMAND_SIZE) as u16;

    let mut buf = BytesMut::with_capacity(payload.len() + COMMAND_SIZE + FRAME_OVERHEAD);
    buf.put_u8(HEADER_BYTE);
    buf.put_u16(length);
    buf.put_u8(command.as_u8());
    buf.put_slice(payload);
    let sum = checksum(&buf);
    buf.put_u8(sum);

    Ok(buf.freeze())
}

/// Decode one isolated frame back into its command and payload.
///
/// The checksum is verified before anything else, so any single corrupted
/// byte is reported as `ChecksumMismatch`.
pub fn decode_frame(raw: &[u8]) -> Result<(CommandCode, Bytes)> {
    if raw.len() < COMMAND_SIZE + FRAME_OVERHEAD {
        return Err(GatewayError::MalformedFrame(format!(
            "frame of {} bytes is shorter than the minimum {}",
            raw.len(),
            COMMAND_SIZE + FRAME_OVERHEAD
        )));
    }

    let (body, tail) = raw.split_at(raw.len() - 1);
    let expected = checksum(body);
    let actual = tail[0];
    if expected != actual {
        return Err(GatewayError::ChecksumMismatch { expected, actual });
    }

    if body[0] != HEADER_BYTE {
        return Err(GatewayError::MalformedFrame(format!(
            "bad header byte {:#04x}",
            body[0]
        )));
    }

    let length = u16::from_be_bytes([body[1], body[2]]) as usize;
    if length + FRAME_OVERHEAD != raw.len() {
        return Err(GatewayError::MalformedFrame(format!(
            "length field {} does not match frame size {}",
            length,
            raw.len()
        )));
    }

    let command = CommandCode::try_from(body[3])?;
    Ok((command, Bytes::copy_from_slice(&body[4..])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_scenario() {
        let bytes = encode_frame(CommandCode::Command, &[0x01, 0x02, 0x03]).unwrap();

        assert_eq!(bytes.len(), 8);
        assert_eq!(bytes[0], HEADER_BYTE);
        // Length = payload + command byte
        assert_eq!(u16::from_be_bytes([bytes[1], bytes[2]]), 4);
        assert_eq!(bytes[3], 0);
        assert_eq!(&bytes[4..7], &[0x01, 0x02, 0x03]);
        let expected = HEADER_BYTE
            .wrapping_add(0x00)
            .wrapping_add(0x04)
            .wrapping_add(0x00)
            .wrapping_add(0x01)
            .wrapping_add(0x02)
            .wrapping_add(0x03);
        assert_eq!(bytes[7], expected);

        let (command, payload) = decode_frame(&bytes).unwrap();
        assert_eq!(command, CommandCode::Command);
        assert_eq!(&payload[..], &[0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_roundtrip_every_command() {
        let payload = br#"{"addr":10,"type":1,"endp":2}"#;
        for code in 0u8..=4 {
            let command = CommandCode::try_from(code).unwrap();
            let bytes = encode_frame(command, payload).unwrap();
            let (decoded, decoded_payload) = decode_frame(&bytes).unwrap();
            assert_eq!(decoded, command);
            assert_eq!(&decoded_payload[..], payload);
        }
    }

    #[test]
    fn test_checksum_wraps() {
        let payload = vec![0xFF; 300];
        let bytes = encode_frame(CommandCode::PushEvent, &payload).unwrap();
        assert_eq!(bytes[bytes.len() - 1], checksum(&bytes[..bytes.len() - 1]));
        assert!(decode_frame(&bytes).is_ok());
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let bytes = encode_frame(CommandCode::AddObject, b"{\"name\":\"lamp\"}").unwrap();

        for i in 0..bytes.len() {
            let mut corrupted = bytes.to_vec();
            corrupted[i] ^= 0x5A;
            let result = decode_frame(&corrupted);
            assert!(
                matches!(
                    result,
                    Err(GatewayError::ChecksumMismatch { .. }) | Err(GatewayError::UnknownCommand(_))
                ),
                "byte {} corruption not detected: {:?}",
                i,
                result
            );
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        // Hand-build a frame with command 9 and a valid checksum
        let mut raw = vec![HEADER_BYTE, 0x00, 0x02, 0x09, 0xAA];
        raw.push(checksum(&raw));

        let result = decode_frame(&raw);
        assert!(matches!(result, Err(GatewayError::UnknownCommand(9))));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let mut raw = vec![HEADER_BYTE, 0x00, 0x05, 0x00, 0xAA];
        raw.push(checksum(&raw));

        let result = decode_frame(&raw);
        assert!(matches!(result, Err(GatewayError::MalformedFrame(_))));
    }

    #[test]
    fn test_too_short_rejected() {
        let result = decode_frame(&[HEADER_BYTE, 0x00]);
        assert!(matches!(result, Err(GatewayError::MalformedFrame(_))));
    }

    #[test]
    fn test_payload_too_large() {
        let payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        let result = encode_frame(CommandCode::Command, &payload);
        assert!(matches!(result, Err(GatewayError::FrameTooLarge(_))));

        let payload = vec![0u8; MAX_PAYLOAD_SIZE];
        let bytes = encode_frame(CommandCode::Command, &payload).unwrap();
        assert_eq!(u16::from_be_bytes([bytes[1], bytes[2]]), u16::MAX);
    }

    #[test]
    fn test_command_code_display() {
        assert_eq!(CommandCode::Scan.to_string(), "4");
        assert_eq!(CommandCode::try_from(3).unwrap(), CommandCode::DeleteObject);
    }
}
