//! Error types for zigbee-gateway.

use thiserror::Error;

/// Main error type for all gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error on the serial link.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// Frame checksum does not match its contents.
    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Command byte is not one of the recognized command codes.
    #[error("Unknown command code: {0}")]
    UnknownCommand(u8),

    /// Frame bytes are structurally inconsistent (bad header, wrong length).
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Payload does not fit in the 16-bit length field.
    #[error("Payload of {0} bytes does not fit in a frame")]
    FrameTooLarge(usize),

    /// Reply arrived but could not be interpreted.
    #[error("Malformed reply: {0}")]
    MalformedReply(String),

    /// Object name or id is not in the address cache.
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// Resource has no attribute mapping in the address cache.
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Request parameters are missing or invalid.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Send token or frame write did not complete in time.
    #[error("Send timeout")]
    SendTimeout,

    /// No reply was posted for the exchange in time.
    #[error("Reply timeout")]
    ReplyTimeout,

    /// Transport has been closed.
    #[error("Transport closed")]
    TransportClosed,

    /// Coordinator answered with a non-zero status.
    #[error("Remote rejected request with status {0}")]
    RemoteRejected(u8),

    /// Serial device could not be opened.
    #[error("Device {port} unavailable: {reason}")]
    DeviceUnavailable { port: String, reason: String },

    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host device service failed.
    #[error("Device service error: {0}")]
    Host(String),
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
