//! Driver builder and host-facing facade.
//!
//! The [`DriverBuilder`] collects configuration and the host collaborators,
//! then wires the pieces together:
//! 1. Fill the address cache from the host's device list
//! 2. Open the serial link with an inbound router as its sink
//! 3. Hand the transport, cache and correlation store to the dispatcher
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zigbee_gateway::{Driver, MemoryDeviceService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (push_tx, mut push_rx) = tokio::sync::mpsc::channel(64);
//!     let driver = Driver::builder()
//!         .port("/dev/ttyUSB0")
//!         .baud_rate(115_200)
//!         .device_service(Arc::new(MemoryDeviceService::new()))
//!         .push_channel(push_tx)
//!         .start()
//!         .await?;
//!
//!     while let Some(values) = push_rx.recv().await {
//!         println!("{}: {:?}", values.device_name, values.readings);
//!     }
//!     driver.stop();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::cache::AddressCache;
use crate::codec::PayloadFormat;
use crate::config::{ExchangeConfig, GatewayConfig};
use crate::correlation::CorrelationStore;
use crate::dispatcher::CommandDispatcher;
use crate::error::{GatewayError, Result};
use crate::host::{AsyncValues, DeviceService};
use crate::model::{DeviceRecord, ReadRequest, Reading, WriteRequest};
use crate::router::InboundRouter;
use crate::transport::{FrameSink, Transport};

/// Builder for configuring and starting a [`Driver`].
pub struct DriverBuilder {
    config: GatewayConfig,
    devices: Option<Arc<dyn DeviceService>>,
    push_tx: Option<mpsc::Sender<AsyncValues>>,
}

impl DriverBuilder {
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            devices: None,
            push_tx: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Serial device path.
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.config.transport.port = port.into();
        self
    }

    /// Default: 9600
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.config.transport.baud_rate = baud_rate;
        self
    }

    /// Default: JSON
    pub fn payload_format(mut self, format: PayloadFormat) -> Self {
        self.config.payload_format = format;
        self
    }

    /// Exchange budgets.
    pub fn exchange(mut self, exchange: ExchangeConfig) -> Self {
        self.config.exchange = exchange;
        self
    }

    /// Send DeleteObject to the coordinator when a device is removed.
    ///
    /// Default: false
    pub fn deprovision_on_remove(mut self, enabled: bool) -> Self {
        self.config.deprovision_on_remove = enabled;
        self
    }

    /// Host store of device records. Required.
    pub fn device_service(mut self, devices: Arc<dyn DeviceService>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Channel receiving unsolicited values. Required.
    pub fn push_channel(mut self, push_tx: mpsc::Sender<AsyncValues>) -> Self {
        self.push_tx = Some(push_tx);
        self
    }

    /// Open the configured serial port and start the driver.
    #[cfg(feature = "serial")]
    pub async fn start(self) -> Result<Driver> {
        self.config.validate()?;
        let transport_config = self.config.transport.clone();
        self.assemble(|sink| Transport::open(&transport_config, sink))
    }

    /// Start the driver over an already-open byte stream.
    pub async fn start_with_stream<S>(self, stream: S) -> Result<Driver>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.config.validate()?;
        let transport_config = self.config.transport.clone();
        self.assemble(|sink| Ok(Transport::from_stream(stream, &transport_config, sink)))
    }

    fn assemble<F>(self, open: F) -> Result<Driver>
    where
        F: FnOnce(Arc<dyn FrameSink>) -> Result<Transport>,
    {
        let devices = self
            .devices
            .ok_or_else(|| GatewayError::Config("device service is not set".into()))?;
        let push_tx = self
            .push_tx
            .ok_or_else(|| GatewayError::Config("push channel is not set".into()))?;
        let config = self.config;

        let cache = Arc::new(AddressCache::new());
        let records = devices.devices();
        cache.load(records.iter());
        tracing::info!("Address cache loaded with {} objects", cache.len());

        let store = CorrelationStore::new();
        let router = InboundRouter::new(cache.clone(), store.clone(), config.payload_format, push_tx);
        let transport = Arc::new(open(Arc::new(router))?);

        let dispatcher = CommandDispatcher::new(
            transport.clone(),
            cache.clone(),
            store,
            devices.clone(),
            config.exchange.clone(),
            config.payload_format,
        );

        Ok(Driver {
            config,
            cache,
            devices,
            transport,
            dispatcher,
        })
    }
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running gateway driver.
pub struct Driver {
    config: GatewayConfig,
    cache: Arc<AddressCache>,
    devices: Arc<dyn DeviceService>,
    transport: Arc<Transport>,
    dispatcher: CommandDispatcher,
}

impl Driver {
    pub fn builder() -> DriverBuilder {
        DriverBuilder::new()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<AddressCache> {
        &self.cache
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Whether the serial link is still up.
    pub fn is_running(&self) -> bool {
        !self.transport.is_closed() && self.transport.is_receiving()
    }

    fn record(&self, name: &str) -> Result<DeviceRecord> {
        self.devices
            .device(name)
            .ok_or_else(|| GatewayError::UnknownObject(name.to_string()))
    }

    /// Register a device the host just added, provisioning it if needed.
    ///
    /// Returns the record as stored afterwards.
    pub async fn add_device(&self, name: &str) -> Result<DeviceRecord> {
        let record = self.record(name)?;
        self.cache.update(&record);

        if record.state.provisioned {
            tracing::debug!("{} is already provisioned", name);
            return Ok(record);
        }
        match self.dispatcher.provision(&record).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                tracing::error!("Provisioning {} failed: {}", name, e);
                Err(e)
            }
        }
    }

    /// Refresh the cache after the host changed a record.
    pub fn update_device(&self, name: &str) -> Result<()> {
        let record = self.record(name)?;
        self.cache.update(&record);
        tracing::debug!("Updated {} in address cache", name);
        Ok(())
    }

    /// Forget a device. The cache entry goes even if de-provisioning fails.
    pub async fn remove_device(&self, name: &str) -> Result<()> {
        let result = if self.config.deprovision_on_remove
            && self.cache.resolve_name_to_address(name).is_some()
        {
            self.dispatcher.delete_object(name).await
        } else {
            Ok(())
        };

        self.cache.delete(name);
        tracing::info!("Removed {}", name);

        if let Err(e) = &result {
            tracing::warn!("De-provisioning {} failed: {}", name, e);
        }
        result
    }

    /// Read resources in order, stopping at the first failure.
    pub async fn handle_read_commands(
        &self,
        name: &str,
        requests: &[ReadRequest],
    ) -> Result<Vec<Reading>> {
        let mut readings = Vec::with_capacity(requests.len());
        for request in requests {
            readings.push(self.dispatcher.read(name, request).await?);
        }
        Ok(readings)
    }

    /// Write resources in order. Requests for the manager object are
    /// executed as one manager request.
    pub async fn handle_write_commands(&self, name: &str, requests: &[WriteRequest]) -> Result<()> {
        if self.cache.master_name().as_deref() == Some(name) {
            return self.dispatcher.master_request(requests).await;
        }
        for request in requests {
            self.dispatcher.write(name, request).await?;
        }
        Ok(())
    }

    /// Close the serial link. Pending exchanges fail with `TransportClosed`
    /// or time out.
    pub fn stop(&self) {
        self.transport.close();
    }
}
