//! Serial device access through `tokio-serial`.

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::config::TransportConfig;
use crate::error::{GatewayError, Result};

/// Open the configured serial device as an async stream (8N1, no flow control).
pub fn open_serial(config: &TransportConfig) -> Result<SerialStream> {
    if config.port.is_empty() {
        return Err(GatewayError::DeviceUnavailable {
            port: String::new(),
            reason: "no serial port configured".into(),
        });
    }

    tokio_serial::new(&config.port, config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .open_native_async()
        .map_err(|e| GatewayError::DeviceUnavailable {
            port: config.port.clone(),
            reason: e.to_string(),
        })
}
