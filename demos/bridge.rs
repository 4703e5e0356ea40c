//! Standalone bridge: opens a coordinator port and logs pushed values.
//!
//! ```text
//! cargo run --example bridge -- /dev/ttyUSB0 [devices.json] [baud]
//! ```
//!
//! `devices.json` holds an array of device records. Set `RUST_LOG=debug`
//! to see frame-level traffic.

use std::sync::Arc;

use zigbee_gateway::{DeviceRecord, DeviceService, Driver, GatewayConfig, MemoryDeviceService};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port = args
        .next()
        .ok_or("usage: bridge <serial-port> [devices.json] [baud]")?;
    let records: Vec<DeviceRecord> = match args.next() {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => Vec::new(),
    };
    let mut config = GatewayConfig::for_port(port);
    if let Some(baud) = args.next() {
        config.transport.baud_rate = baud.parse()?;
    }

    let devices = Arc::new(MemoryDeviceService::with_devices(records));
    let (push_tx, mut push_rx) = tokio::sync::mpsc::channel(64);
    let driver = Driver::builder()
        .config(config)
        .device_service(devices.clone())
        .push_channel(push_tx)
        .start()
        .await?;

    let pending = devices.devices().into_iter().filter(|r| !r.state.provisioned);
    for record in pending {
        if let Err(e) = driver.add_device(&record.name).await {
            tracing::warn!("Could not provision {}: {}", record.name, e);
        }
    }

    loop {
        tokio::select! {
            Some(values) = push_rx.recv() => {
                for reading in values.readings {
                    tracing::info!("{} {} = {}", values.device_name, reading.resource, reading.value);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    driver.stop();
    Ok(())
}
