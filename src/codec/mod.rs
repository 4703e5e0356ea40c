//! Codec module - serialization/deserialization for frame payloads.
//!
//! - [`JsonCodec`] - JSON via `serde_json`, what the coordinator firmware speaks
//! - [`MsgPackCodec`] - MessagePack using `rmp-serde` (`to_vec_named`, so
//!   structs stay maps and `#[serde(flatten)]` fields survive)
//!
//! # Design
//!
//! Codecs are marker structs with static methods. [`PayloadFormat`] selects
//! one at runtime from configuration.
//!
//! # Example
//!
//! ```
//! use zigbee_gateway::codec::{JsonCodec, MsgPackCodec, PayloadFormat};
//!
//! let encoded = JsonCodec::encode(&"hello").unwrap();
//! assert_eq!(encoded, b"\"hello\"");
//!
//! let encoded = MsgPackCodec::encode(&42u32).unwrap();
//! let decoded: u32 = MsgPackCodec::decode(&encoded).unwrap();
//! assert_eq!(decoded, 42);
//!
//! let format: PayloadFormat = "msgpack".parse().unwrap();
//! let bytes = format.encode(&vec![1, 2, 3]).unwrap();
//! let back: Vec<i32> = format.decode(&bytes).unwrap();
//! assert_eq!(back, vec![1, 2, 3]);
//! ```

mod json;
mod msgpack;

pub use json::JsonCodec;
pub use msgpack::MsgPackCodec;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Encoding used for frame payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadFormat {
    #[default]
    Json,
    MsgPack,
}

impl PayloadFormat {
    /// Encode a value with this format.
    pub fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        match self {
            Self::Json => JsonCodec::encode(value),
            Self::MsgPack => MsgPackCodec::encode(value),
        }
    }

    /// Decode bytes with this format.
    pub fn decode<T: serde::de::DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        match self {
            Self::Json => JsonCodec::decode(bytes),
            Self::MsgPack => MsgPackCodec::decode(bytes),
        }
    }
}

impl FromStr for PayloadFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "msgpack" | "messagepack" => Ok(Self::MsgPack),
            other => Err(GatewayError::Config(format!(
                "unknown payload format: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::MsgPack => f.write_str("msgpack"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_format_parse() {
        assert_eq!("JSON".parse::<PayloadFormat>().unwrap(), PayloadFormat::Json);
        assert_eq!(
            "MessagePack".parse::<PayloadFormat>().unwrap(),
            PayloadFormat::MsgPack
        );
        assert!(matches!(
            "cbor".parse::<PayloadFormat>(),
            Err(GatewayError::Config(_))
        ));
    }

    #[test]
    fn test_payload_format_serde() {
        let format: PayloadFormat = serde_json::from_str("\"msgpack\"").unwrap();
        assert_eq!(format, PayloadFormat::MsgPack);
        assert_eq!(format.to_string(), "msgpack");
        assert_eq!(PayloadFormat::default(), PayloadFormat::Json);
    }

    #[test]
    fn test_formats_differ_on_wire() {
        let json = PayloadFormat::Json.encode(&vec![1u8]).unwrap();
        let msgpack = PayloadFormat::MsgPack.encode(&vec![1u8]).unwrap();
        assert_eq!(json, b"[1]");
        assert_eq!(msgpack, vec![0x91, 0x01]);
    }
}
