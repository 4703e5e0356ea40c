//! JSON codec using `serde_json`.

use crate::error::Result;

/// JSON codec for frame payloads.
///
/// Output is compact (no whitespace) to keep frames short on the serial link.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value to compact JSON bytes.
    #[inline]
    pub fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    /// Decode JSON bytes to a value.
    ///
    /// Trailing NUL padding, which some coordinator firmware appends, is
    /// ignored.
    #[inline]
    pub fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        let end = bytes
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        Ok(serde_json::from_slice(&bytes[..end])?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Message {
        addr: u16,
        name: String,
    }

    #[test]
    fn test_encode_compact() {
        let msg = Message {
            addr: 10,
            name: "lamp".into(),
        };
        let encoded = JsonCodec::encode(&msg).unwrap();
        assert_eq!(encoded, br#"{"addr":10,"name":"lamp"}"#);
    }

    #[test]
    fn test_decode_struct() {
        let decoded: Message = JsonCodec::decode(br#"{"addr":7,"name":"x"}"#).unwrap();
        assert_eq!(
            decoded,
            Message {
                addr: 7,
                name: "x".into()
            }
        );
    }

    #[test]
    fn test_decode_ignores_nul_padding() {
        let decoded: Message = JsonCodec::decode(b"{\"addr\":1,\"name\":\"a\"}\0\0").unwrap();
        assert_eq!(decoded.addr, 1);
    }

    #[test]
    fn test_decode_error_on_invalid_data() {
        let result: Result<Message> = JsonCodec::decode(b"not json");
        assert!(matches!(result, Err(GatewayError::Json(_))));

        let result: Result<Message> = JsonCodec::decode(b"");
        assert!(result.is_err());
    }
}
