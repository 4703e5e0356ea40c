//! Gateway configuration.
//!
//! Durations are stored as milliseconds so the config reads naturally from
//! JSON and from the host's flat key/value driver settings.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::PayloadFormat;
use crate::error::{GatewayError, Result};

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Serial device path, e.g. `/dev/ttyUSB0`.
    pub port: String,
    pub baud_rate: u32,
    /// Size of a single read from the device.
    pub read_buffer_size: usize,
    /// Silence after which a partially received frame is abandoned.
    pub frame_timeout_ms: u64,
    /// Largest accepted length field.
    pub max_frame_length: u16,
    /// Decoded frames being handled concurrently before new ones are dropped.
    pub max_inflight_frames: usize,
    /// Queue depth between senders and the writer task.
    pub writer_channel_capacity: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_buffer_size: 1024,
            frame_timeout_ms: 500,
            max_frame_length: u16::MAX,
            max_inflight_frames: 256,
            writer_channel_capacity: 16,
        }
    }
}

impl TransportConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}

/// Exchange budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Send phase of attribute commands.
    pub send_timeout_ms: u64,
    /// Overall budget of attribute commands, send phase included.
    pub command_timeout_ms: u64,
    /// Send phase of provisioning.
    pub provision_send_timeout_ms: u64,
    /// Overall budget of provisioning, send phase included.
    pub provision_timeout_ms: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: 5_000,
            command_timeout_ms: 10_000,
            provision_send_timeout_ms: 8_000,
            provision_timeout_ms: 28_000,
        }
    }
}

impl ExchangeConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn provision_send_timeout(&self) -> Duration {
        Duration::from_millis(self.provision_send_timeout_ms)
    }

    pub fn provision_timeout(&self) -> Duration {
        Duration::from_millis(self.provision_timeout_ms)
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub transport: TransportConfig,
    pub exchange: ExchangeConfig,
    pub payload_format: PayloadFormat,
    /// Send DeleteObject to the coordinator when the host removes a device.
    pub deprovision_on_remove: bool,
}

impl GatewayConfig {
    /// Configuration for the given serial port with defaults elsewhere.
    pub fn for_port(port: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.transport.port = port.into();
        config
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build from the host's flat driver settings.
    ///
    /// `SerialPort` is required; `BaudRate` and `PayloadFormat` are optional.
    pub fn from_driver_configs(configs: &HashMap<String, String>) -> Result<Self> {
        let port = configs
            .get("SerialPort")
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| GatewayError::Config("SerialPort is not specified".into()))?;

        let mut config = Self::for_port(port.trim());

        if let Some(baud) = configs.get("BaudRate") {
            config.transport.baud_rate = baud
                .trim()
                .parse()
                .map_err(|_| GatewayError::Config(format!("invalid BaudRate: {}", baud)))?;
        }
        if let Some(format) = configs.get("PayloadFormat") {
            config.payload_format = format.trim().parse()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the gateway cannot run with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.transport;
        if t.baud_rate == 0 {
            return Err(GatewayError::Config("baud_rate must be non-zero".into()));
        }
        if t.read_buffer_size == 0 {
            return Err(GatewayError::Config(
                "read_buffer_size must be non-zero".into(),
            ));
        }
        if t.max_frame_length < 2 {
            return Err(GatewayError::Config(
                "max_frame_length must allow a command byte and payload".into(),
            ));
        }
        if t.max_inflight_frames == 0 || t.writer_channel_capacity == 0 {
            return Err(GatewayError::Config(
                "max_inflight_frames and writer_channel_capacity must be non-zero".into(),
            ));
        }

        let e = &self.exchange;
        if e.send_timeout_ms > e.command_timeout_ms {
            return Err(GatewayError::Config(
                "send_timeout_ms exceeds command_timeout_ms".into(),
            ));
        }
        if e.provision_send_timeout_ms > e.provision_timeout_ms {
            return Err(GatewayError::Config(
                "provision_send_timeout_ms exceeds provision_timeout_ms".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.exchange.command_timeout(), Duration::from_secs(10));
        assert_eq!(config.exchange.provision_timeout(), Duration::from_secs(28));
        assert_eq!(config.transport.baud_rate, 9600);
        assert_eq!(config.payload_format, PayloadFormat::Json);
    }

    #[test]
    fn test_from_json_partial() {
        let config = GatewayConfig::from_json_str(
            r#"{"transport": {"port": "/dev/ttyS1", "baud_rate": 115200}, "payload_format": "msgpack"}"#,
        )
        .unwrap();

        assert_eq!(config.transport.port, "/dev/ttyS1");
        assert_eq!(config.transport.baud_rate, 115200);
        assert_eq!(config.transport.read_buffer_size, 1024);
        assert_eq!(config.payload_format, PayloadFormat::MsgPack);
        assert_eq!(config.exchange, ExchangeConfig::default());
    }

    #[test]
    fn test_from_json_rejects_bad_budgets() {
        let result = GatewayConfig::from_json_str(
            r#"{"exchange": {"send_timeout_ms": 20000, "command_timeout_ms": 1000}}"#,
        );
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }

    #[test]
    fn test_from_driver_configs() {
        let configs = HashMap::from([
            ("SerialPort".to_string(), "/dev/ttyUSB0".to_string()),
            ("BaudRate".to_string(), "57600".to_string()),
        ]);
        let config = GatewayConfig::from_driver_configs(&configs).unwrap();

        assert_eq!(config.transport.port, "/dev/ttyUSB0");
        assert_eq!(config.transport.baud_rate, 57600);
    }

    #[test]
    fn test_from_driver_configs_requires_port() {
        let result = GatewayConfig::from_driver_configs(&HashMap::new());
        assert!(matches!(result, Err(GatewayError::Config(_))));

        let configs = HashMap::from([
            ("SerialPort".to_string(), "/dev/ttyUSB0".to_string()),
            ("BaudRate".to_string(), "fast".to_string()),
        ]);
        assert!(GatewayConfig::from_driver_configs(&configs).is_err());
    }
}
