//! Frame struct with typed accessors.
//!
//! Represents one decoded frame: the command code and its payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! # Example
//!
//! ```
//! use zigbee_gateway::protocol::{CommandCode, Frame};
//! use bytes::Bytes;
//!
//! let frame = Frame::new(CommandCode::PushEvent, Bytes::from_static(b"{}"));
//! let wire = frame.encode().unwrap();
//! assert_eq!(Frame::decode(&wire).unwrap(), frame);
//! ```

use bytes::Bytes;

use super::wire_format::{decode_frame, encode_frame, CommandCode, FRAME_OVERHEAD};
use crate::error::Result;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Command code.
    pub command: CommandCode,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from command and payload.
    pub fn new(command: CommandCode, payload: Bytes) -> Self {
        Self { command, payload }
    }

    /// Create a frame from command and raw bytes (copies data).
    pub fn from_parts(command: CommandCode, payload: &[u8]) -> Self {
        Self {
            command,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Decode one isolated wire frame.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        let (command, payload) = decode_frame(raw)?;
        Ok(Self { command, payload })
    }

    /// Encode into wire bytes, checksum included.
    pub fn encode(&self) -> Result<Bytes> {
        encode_frame(self.command, &self.payload)
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Size of this frame on the wire.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.payload.len() + 1 + FRAME_OVERHEAD
    }

    /// Check if this is an unsolicited push event.
    #[inline]
    pub fn is_push_event(&self) -> bool {
        self.command == CommandCode::PushEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::from_parts(CommandCode::Command, b"hello");

        assert_eq!(frame.command, CommandCode::Command);
        assert_eq!(frame.payload(), b"hello");
        assert_eq!(frame.wire_len(), 10);
        assert!(!frame.is_push_event());
    }

    #[test]
    fn test_encode_matches_wire_len() {
        let frame = Frame::from_parts(CommandCode::PushEvent, b"{\"val\":1}");
        let bytes = frame.encode().unwrap();

        assert_eq!(bytes.len(), frame.wire_len());
        assert!(frame.is_push_event());
    }

    #[test]
    fn test_decode_roundtrip() {
        let frame = Frame::from_parts(CommandCode::DeleteObject, b"{\"addr\":7}");
        let bytes = frame.encode().unwrap();

        assert_eq!(Frame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_payload_zero_copy() {
        let original = Bytes::from_static(b"test data");
        let frame = Frame::new(CommandCode::Command, original.clone());

        assert_eq!(frame.payload.as_ptr(), original.as_ptr());
    }
}
