//! Typed resource values.
//!
//! Conversions are deliberately simple switch-based coercions: JSON values
//! from replies and push events, decimal text from profile parameters, and
//! big-endian bytes for manager payloads.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{GatewayError, Result};

/// Declared value type of a device resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ValueType {
    Bool,
    String,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "Bool",
            Self::String => "String",
            Self::Uint8 => "Uint8",
            Self::Uint16 => "Uint16",
            Self::Uint32 => "Uint32",
            Self::Uint64 => "Uint64",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
        }
    }
}

impl FromStr for ValueType {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bool" => Ok(Self::Bool),
            "string" => Ok(Self::String),
            "uint8" => Ok(Self::Uint8),
            "uint16" => Ok(Self::Uint16),
            "uint32" => Ok(Self::Uint32),
            "uint64" => Ok(Self::Uint64),
            "int8" => Ok(Self::Int8),
            "int16" => Ok(Self::Int16),
            "int32" => Ok(Self::Int32),
            "int64" => Ok(Self::Int64),
            "float32" => Ok(Self::Float32),
            "float64" => Ok(Self::Float64),
            _ => Err(GatewayError::InvalidRequest(format!(
                "unsupported value type: {}",
                s
            ))),
        }
    }
}

impl TryFrom<String> for ValueType {
    type Error = GatewayError;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ValueType> for String {
    fn from(vt: ValueType) -> Self {
        vt.as_str().to_string()
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed resource value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    String(String),
    Uint8(u8),
    Uint16(u16),
    Uint32(u32),
    Uint64(u64),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Bool(_) => ValueType::Bool,
            Self::String(_) => ValueType::String,
            Self::Uint8(_) => ValueType::Uint8,
            Self::Uint16(_) => ValueType::Uint16,
            Self::Uint32(_) => ValueType::Uint32,
            Self::Uint64(_) => ValueType::Uint64,
            Self::Int8(_) => ValueType::Int8,
            Self::Int16(_) => ValueType::Int16,
            Self::Int32(_) => ValueType::Int32,
            Self::Int64(_) => ValueType::Int64,
            Self::Float32(_) => ValueType::Float32,
            Self::Float64(_) => ValueType::Float64,
        }
    }

    /// Coerce a JSON value from a reply or push event into `value_type`.
    ///
    /// Numbers outside the target range are rejected rather than truncated.
    pub fn from_json(value_type: ValueType, json: &Json) -> Result<Self> {
        let fail = || {
            GatewayError::MalformedReply(format!(
                "value {} is not a valid {}",
                json, value_type
            ))
        };

        let value = match value_type {
            ValueType::Bool => Self::Bool(json_to_bool(json).ok_or_else(fail)?),
            ValueType::String => Self::String(match json {
                Json::String(s) => s.clone(),
                Json::Null => return Err(fail()),
                other => other.to_string(),
            }),
            ValueType::Float32 => {
                let f = json_to_f64(json).ok_or_else(fail)?;
                if f.is_finite() && f.abs() > f32::MAX as f64 {
                    return Err(fail());
                }
                Self::Float32(f as f32)
            }
            ValueType::Float64 => Self::Float64(json_to_f64(json).ok_or_else(fail)?),
            integer => {
                let n = json_to_i128(json).ok_or_else(fail)?;
                integer_value(integer, n).ok_or_else(fail)?
            }
        };
        Ok(value)
    }

    /// Parse decimal text (profile parameters, defaults) into `value_type`.
    pub fn parse(value_type: ValueType, text: &str) -> Result<Self> {
        let fail = |e: &dyn fmt::Display| {
            GatewayError::InvalidRequest(format!(
                "cannot parse {:?} as {}: {}",
                text, value_type, e
            ))
        };
        let text_trimmed = text.trim();

        let value = match value_type {
            ValueType::Bool => Self::Bool(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::String => Self::String(text.to_string()),
            ValueType::Uint8 => Self::Uint8(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Uint16 => Self::Uint16(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Uint32 => Self::Uint32(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Uint64 => Self::Uint64(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Int8 => Self::Int8(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Int16 => Self::Int16(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Int32 => Self::Int32(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Int64 => Self::Int64(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Float32 => Self::Float32(text_trimmed.parse().map_err(|e| fail(&e))?),
            ValueType::Float64 => Self::Float64(text_trimmed.parse().map_err(|e| fail(&e))?),
        };
        Ok(value)
    }

    /// JSON form placed in the `val` field of outbound commands.
    pub fn to_json(&self) -> Json {
        match self {
            Self::Bool(v) => Json::from(*v),
            Self::String(v) => Json::from(v.as_str()),
            Self::Uint8(v) => Json::from(*v),
            Self::Uint16(v) => Json::from(*v),
            Self::Uint32(v) => Json::from(*v),
            Self::Uint64(v) => Json::from(*v),
            Self::Int8(v) => Json::from(*v),
            Self::Int16(v) => Json::from(*v),
            Self::Int32(v) => Json::from(*v),
            Self::Int64(v) => Json::from(*v),
            Self::Float32(v) => Json::from(*v),
            Self::Float64(v) => Json::from(*v),
        }
    }

    /// Raw bytes as embedded in manager payloads.
    ///
    /// Bools and 8-bit integers take one byte, strings their UTF-8 bytes,
    /// everything else its big-endian representation.
    pub fn to_wire_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bool(v) => vec![u8::from(*v)],
            Self::String(v) => v.as_bytes().to_vec(),
            Self::Uint8(v) => vec![*v],
            Self::Int8(v) => vec![*v as u8],
            Self::Uint16(v) => v.to_be_bytes().to_vec(),
            Self::Uint32(v) => v.to_be_bytes().to_vec(),
            Self::Uint64(v) => v.to_be_bytes().to_vec(),
            Self::Int16(v) => v.to_be_bytes().to_vec(),
            Self::Int32(v) => v.to_be_bytes().to_vec(),
            Self::Int64(v) => v.to_be_bytes().to_vec(),
            Self::Float32(v) => v.to_be_bytes().to_vec(),
            Self::Float64(v) => v.to_be_bytes().to_vec(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

fn json_to_bool(json: &Json) -> Option<bool> {
    match json {
        Json::Bool(b) => Some(*b),
        Json::Number(n) => n.as_f64().map(|f| f != 0.0),
        Json::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn json_to_f64(json: &Json) -> Option<f64> {
    match json {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.trim().parse().ok(),
        Json::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn json_to_i128(json: &Json) -> Option<i128> {
    match json {
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i as i128)
            } else if let Some(u) = n.as_u64() {
                Some(u as i128)
            } else {
                n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i128)
            }
        }
        Json::String(s) => s.trim().parse().ok(),
        Json::Bool(b) => Some(i128::from(*b)),
        _ => None,
    }
}

fn integer_value(value_type: ValueType, n: i128) -> Option<Value> {
    Some(match value_type {
        ValueType::Uint8 => Value::Uint8(u8::try_from(n).ok()?),
        ValueType::Uint16 => Value::Uint16(u16::try_from(n).ok()?),
        ValueType::Uint32 => Value::Uint32(u32::try_from(n).ok()?),
        ValueType::Uint64 => Value::Uint64(u64::try_from(n).ok()?),
        ValueType::Int8 => Value::Int8(i8::try_from(n).ok()?),
        ValueType::Int16 => Value::Int16(i16::try_from(n).ok()?),
        ValueType::Int32 => Value::Int32(i32::try_from(n).ok()?),
        ValueType::Int64 => Value::Int64(i64::try_from(n).ok()?),
        _ => return None,
    })
}

/// A typed reading returned to the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Resource name.
    pub resource: String,
    /// Capture time in nanoseconds since the Unix epoch.
    pub origin: i64,
    pub value: Value,
}

impl Reading {
    /// Reading stamped with the current time.
    pub fn now(resource: impl Into<String>, value: Value) -> Self {
        let origin = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or_default();
        Self {
            resource: resource.into(),
            origin,
            value,
        }
    }
}

/// Host request to read one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRequest {
    pub resource: String,
    pub value_type: ValueType,
}

impl ReadRequest {
    pub fn new(resource: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            resource: resource.into(),
            value_type,
        }
    }
}

/// Host request to write one resource.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRequest {
    pub resource: String,
    pub value: Value,
}

impl WriteRequest {
    pub fn new(resource: impl Into<String>, value: Value) -> Self {
        Self {
            resource: resource.into(),
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_value_type_case_insensitive() {
        assert_eq!("uint8".parse::<ValueType>().unwrap(), ValueType::Uint8);
        assert_eq!("FLOAT64".parse::<ValueType>().unwrap(), ValueType::Float64);
        assert_eq!("Bool".parse::<ValueType>().unwrap(), ValueType::Bool);
        assert!("decimal".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_value_type_serde() {
        let vt: ValueType = serde_json::from_str("\"int16\"").unwrap();
        assert_eq!(vt, ValueType::Int16);
        assert_eq!(serde_json::to_string(&vt).unwrap(), "\"Int16\"");
    }

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(
            Value::from_json(ValueType::Uint8, &json!(200)).unwrap(),
            Value::Uint8(200)
        );
        assert_eq!(
            Value::from_json(ValueType::Int16, &json!("-12")).unwrap(),
            Value::Int16(-12)
        );
        assert_eq!(
            Value::from_json(ValueType::Float32, &json!(1.5)).unwrap(),
            Value::Float32(1.5)
        );
    }

    #[test]
    fn test_from_json_out_of_range() {
        let result = Value::from_json(ValueType::Uint8, &json!(256));
        assert!(matches!(result, Err(GatewayError::MalformedReply(_))));

        let result = Value::from_json(ValueType::Uint16, &json!(-1));
        assert!(matches!(result, Err(GatewayError::MalformedReply(_))));
    }

    #[test]
    fn test_from_json_bool_and_string() {
        assert_eq!(
            Value::from_json(ValueType::Bool, &json!(1)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            Value::from_json(ValueType::Bool, &json!("false")).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            Value::from_json(ValueType::String, &json!(12)).unwrap(),
            Value::String("12".into())
        );
        assert!(Value::from_json(ValueType::String, &Json::Null).is_err());
    }

    #[test]
    fn test_parse_text() {
        assert_eq!(Value::parse(ValueType::Uint16, " 513 ").unwrap(), Value::Uint16(513));
        assert_eq!(Value::parse(ValueType::Bool, "true").unwrap(), Value::Bool(true));
        assert!(matches!(
            Value::parse(ValueType::Int8, "300"),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_wire_bytes() {
        assert_eq!(Value::Bool(true).to_wire_bytes(), vec![1]);
        assert_eq!(Value::Int8(-1).to_wire_bytes(), vec![0xFF]);
        assert_eq!(Value::Uint16(0x0102).to_wire_bytes(), vec![0x01, 0x02]);
        assert_eq!(Value::Int32(-2).to_wire_bytes(), vec![0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(Value::String("on".into()).to_wire_bytes(), b"on".to_vec());
    }

    #[test]
    fn test_to_json_roundtrip_through_from_json() {
        let v = Value::Int64(-42);
        assert_eq!(Value::from_json(ValueType::Int64, &v.to_json()).unwrap(), v);
    }

    #[test]
    fn test_reading_now_has_origin() {
        let reading = Reading::now("temp", Value::Float32(21.5));
        assert!(reading.origin > 0);
        assert_eq!(reading.resource, "temp");
    }
}
