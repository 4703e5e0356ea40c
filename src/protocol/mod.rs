//! Protocol module - wire format, framing, and message bodies.
//!
//! This module implements the serial link protocol:
//! - Frame encoding/decoding with the additive checksum
//! - Frame buffer for assembling frames from fragmented reads
//! - Logical message bodies carried in frame payloads

mod frame;
mod frame_buffer;
mod messages;
mod wire_format;

pub use frame::Frame;
pub use frame_buffer::FrameBuffer;
pub use messages::{CommandFrame, CommandId, DeleteObjectFrame, ProvisionFrame, ReplyFrame};
pub use wire_format::{
    checksum, decode_frame, encode_frame, CommandCode, COMMAND_SIZE, FRAME_OVERHEAD, HEADER_BYTE,
    MAX_PAYLOAD_SIZE,
};
