//! Network addressing types shared by the cache, the wire messages and the
//! manager payloads.

use serde::{Deserialize, Serialize};

/// Logical entity address on the radio network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectAddress {
    /// 16-bit network address.
    #[serde(rename = "addr")]
    pub address: u16,
    /// Object type byte.
    #[serde(rename = "type")]
    pub kind: u8,
    /// Endpoint on the node.
    #[serde(rename = "endp")]
    pub endpoint: u8,
}

impl ObjectAddress {
    pub fn new(address: u16, kind: u8, endpoint: u8) -> Self {
        Self {
            address,
            kind,
            endpoint,
        }
    }

    /// Packed `[addr hi, addr lo, type, endpoint]` form used in manager payloads.
    pub fn to_bytes(&self) -> [u8; 4] {
        let [hi, lo] = self.address.to_be_bytes();
        [hi, lo, self.kind, self.endpoint]
    }
}

impl std::fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.address, self.kind, self.endpoint)
    }
}

/// Physical network identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AddressEui64 {
    #[serde(rename = "MAC", with = "mac_string", default)]
    pub mac: u64,
    #[serde(rename = "PAN", default)]
    pub pan: u16,
}

/// Physical identity plus logical address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ObjectInfo {
    #[serde(flatten)]
    pub eui64: AddressEui64,
    #[serde(flatten)]
    pub address: ObjectAddress,
}

/// Identifies one addressable value on an object.
///
/// Equality and hashing cover all four fields; inbound lookups that must
/// ignore `value_type` go through [`AttributeInfo::triple`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AttributeInfo {
    #[serde(rename = "pro")]
    pub profile_id: u16,
    #[serde(rename = "clu")]
    pub cluster_id: u16,
    #[serde(rename = "att")]
    pub attribute_id: u16,
    #[serde(rename = "vt", default)]
    pub value_type: u8,
}

impl AttributeInfo {
    pub const fn new(profile_id: u16, cluster_id: u16, attribute_id: u16, value_type: u8) -> Self {
        Self {
            profile_id,
            cluster_id,
            attribute_id,
            value_type,
        }
    }

    /// The `(profile, cluster, attribute)` identity without the value type.
    #[inline]
    pub fn triple(&self) -> (u16, u16, u16) {
        (self.profile_id, self.cluster_id, self.attribute_id)
    }
}

/// Parse a MAC written as hex, with or without `:`/`-` separators.
///
/// `00124B0001A2B3C4`, `00:12:4b:00:01:a2:b3:c4` and `1234` are all
/// accepted. Returns `None` for empty input, non-hex digits or more than
/// 64 bits.
pub fn parse_mac(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|c| *c != ':' && *c != '-')
        .collect();
    if digits.is_empty() || digits.len() > 16 {
        return None;
    }
    u64::from_str_radix(&digits, 16).ok()
}

/// Canonical MAC text: upper-case hex, zero-padded to at least 8 digits.
pub fn format_mac(mac: u64) -> String {
    format!("{:08X}", mac)
}

/// MAC addresses travel as hex strings.
///
/// Some coordinator firmware sends the MAC as a bare JSON number, so
/// deserialization accepts both.
pub mod mac_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mac: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_mac(*mac))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(n),
            Raw::Text(s) if s.trim().is_empty() => Ok(0),
            Raw::Text(s) => super::parse_mac(&s)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid MAC {:?}", s))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_address_json_names() {
        let addr = ObjectAddress::new(10, 1, 2);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, r#"{"addr":10,"type":1,"endp":2}"#);

        let back: ObjectAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    #[test]
    fn test_object_address_bytes() {
        let addr = ObjectAddress::new(0x1234, 1, 2);
        assert_eq!(addr.to_bytes(), [0x12, 0x34, 0x01, 0x02]);
    }

    #[test]
    fn test_mac_serialized_as_padded_hex() {
        let eui = AddressEui64 { mac: 0x42, pan: 7 };
        let json = serde_json::to_string(&eui).unwrap();
        assert_eq!(json, r#"{"MAC":"00000042","PAN":7}"#);

        let eui = AddressEui64 { mac: 0x0012_4B00_01A2_B3C4, pan: 1 };
        let json = serde_json::to_string(&eui).unwrap();
        assert_eq!(json, r#"{"MAC":"00124B0001A2B3C4","PAN":1}"#);
    }

    #[test]
    fn test_mac_accepts_number_or_string() {
        let a: AddressEui64 = serde_json::from_str(r#"{"MAC":"00124B0001A2B3C4","PAN":1}"#).unwrap();
        assert_eq!(a.mac, 0x0012_4B00_01A2_B3C4);

        let b: AddressEui64 = serde_json::from_str(r#"{"MAC":4660,"PAN":1}"#).unwrap();
        assert_eq!(b.mac, 0x1234);

        let bad = serde_json::from_str::<AddressEui64>(r#"{"MAC":"xyz","PAN":1}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(parse_mac("00124B0001A2B3C4"), Some(0x0012_4B00_01A2_B3C4));
        assert_eq!(parse_mac("00:12:4b:00:01:a2:b3:c4"), Some(0x0012_4B00_01A2_B3C4));
        assert_eq!(parse_mac(" 1234 "), Some(0x1234));
        assert_eq!(parse_mac(""), None);
        assert_eq!(parse_mac("12G4"), None);
        assert_eq!(parse_mac("00124B0001A2B3C4FF"), None);
        assert_eq!(format_mac(0), "00000000");
    }

    #[test]
    fn test_object_info_flattened() {
        let json = r#"{"MAC":"00000099","PAN":5,"addr":10,"type":1,"endp":2}"#;
        let info: ObjectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.eui64.mac, 0x99);
        assert_eq!(info.address, ObjectAddress::new(10, 1, 2));
    }

    #[test]
    fn test_attribute_value_type_defaults() {
        let att: AttributeInfo = serde_json::from_str(r#"{"pro":260,"clu":6,"att":0}"#).unwrap();
        assert_eq!(att, AttributeInfo::new(260, 6, 0, 0));
        assert_eq!(att.triple(), (260, 6, 0));
    }
}
