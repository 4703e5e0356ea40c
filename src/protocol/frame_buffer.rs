//! Frame buffer for assembling frames from serial reads.
//!
//! Uses `bytes::BytesMut` for buffer management.
//! Implements a state machine for handling fragmented and corrupted input:
//! - `Scanning`: Discard bytes until the header byte
//! - `ReadingLength`: Header found, need the 2 length bytes
//! - `ReadingBody`: Length known, need command + payload + checksum
//!
//! A frame that fails to decode (bad checksum, unknown command) is dropped and
//! scanning resumes one byte past its header, so a real frame hidden behind
//! line noise is still found.
//!
//! # Example
//!
//! ```
//! use zigbee_gateway::protocol::{encode_frame, CommandCode, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let wire = encode_frame(CommandCode::PushEvent, b"{}").unwrap();
//!
//! // Line noise before the frame is skipped
//! let mut data = vec![0x00, 0x13];
//! data.extend_from_slice(&wire);
//!
//! let frames = buffer.push(&data);
//! assert_eq!(frames.len(), 1);
//! assert_eq!(frames[0].command, CommandCode::PushEvent);
//! ```

use bytes::{Buf, BytesMut};

use super::wire_format::{COMMAND_SIZE, FRAME_OVERHEAD, HEADER_BYTE};
use super::Frame;

/// Bytes needed to read the length field (header + 2 length bytes).
const LENGTH_PREFIX: usize = 3;

/// State machine for frame parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Looking for the header byte.
    Scanning,
    /// Header at buffer start, waiting for length bytes.
    ReadingLength,
    /// Length parsed, waiting for the rest of the frame.
    ReadingBody { length: u16 },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from serial reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum accepted value of the length field.
    max_frame_length: u16,
    /// Frames or partial frames thrown away.
    dropped: u64,
}

impl FrameBuffer {
    /// Create a new frame buffer accepting any length the field can carry.
    pub fn new() -> Self {
        Self::with_max_length(u16::MAX)
    }

    /// Create a new frame buffer with a custom maximum length field.
    pub fn with_max_length(max_frame_length: u16) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
            state: State::Scanning,
            max_frame_length,
            dropped: 0,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Corrupted frames are dropped silently; partial data is kept for the
    /// next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Frame> {
        self.buffer.extend_from_slice(data);
        self.drain_frames()
    }

    /// Abandon a partially received frame and rescan what follows it.
    ///
    /// Called when the link goes quiet in the middle of a frame. Returns any
    /// frames found in the bytes after the abandoned header.
    pub fn resync(&mut self) -> Vec<Frame> {
        if self.state != State::Scanning && !self.buffer.is_empty() {
            tracing::debug!(
                "Abandoning partial frame ({} bytes buffered)",
                self.buffer.len()
            );
            self.skip_header();
        }
        self.drain_frames()
    }

    fn drain_frames(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one() {
            frames.push(frame);
        }
        frames
    }

    /// Try to extract a single frame from the buffer.
    ///
    /// Returns `None` when more data is needed.
    fn try_extract_one(&mut self) -> Option<Frame> {
        loop {
            match self.state {
                State::Scanning => {
                    match self.buffer.iter().position(|&b| b == HEADER_BYTE) {
                        Some(pos) => {
                            self.buffer.advance(pos);
                            self.state = State::ReadingLength;
                        }
                        None => {
                            self.buffer.clear();
                            return None;
                        }
                    }
                }

                State::ReadingLength => {
                    if self.buffer.len() < LENGTH_PREFIX {
                        return None;
                    }
                    let length = u16::from_be_bytes([self.buffer[1], self.buffer[2]]);

                    // A frame always carries a command byte and a non-empty payload
                    if length as usize <= COMMAND_SIZE || length > self.max_frame_length {
                        tracing::debug!("Discarding header with invalid length {}", length);
                        self.skip_header();
                        continue;
                    }

                    self.state = State::ReadingBody { length };
                }

                State::ReadingBody { length } => {
                    let total = length as usize + FRAME_OVERHEAD;
                    if self.buffer.len() < total {
                        return None;
                    }

                    match Frame::decode(&self.buffer[..total]) {
                        Ok(frame) => {
                            self.buffer.advance(total);
                            self.state = State::Scanning;
                            return Some(frame);
                        }
                        Err(e) => {
                            tracing::debug!("Dropping inbound frame: {}", e);
                            self.skip_header();
                        }
                    }
                }
            }
        }
    }

    /// Drop the header byte at the buffer start and go back to scanning.
    fn skip_header(&mut self) {
        self.buffer.advance(1);
        self.state = State::Scanning;
        self.dropped += 1;
    }

    /// Number of frames (or candidate headers) discarded so far.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Check if a frame is partially received.
    pub fn has_partial(&self) -> bool {
        self.state != State::Scanning && !self.buffer.is_empty()
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::Scanning;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::Scanning => "Scanning",
            State::ReadingLength => "ReadingLength",
            State::ReadingBody { .. } => "ReadingBody",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
