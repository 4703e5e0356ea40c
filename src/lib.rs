//! # zigbee-gateway
//!
//! Serial bridge between a device-management host and a Zigbee network
//! coordinator.
//!
//! The host speaks in device names and typed resources; the coordinator
//! speaks in framed request/reply messages over a half-duplex UART. This
//! crate sits in between.
//!
//! ## Architecture
//!
//! - **Link** ([`transport`], [`writer`], [`protocol`]): framing, one receive
//!   loop and one writer task per serial port, sends serialised by a token
//! - **Routing** ([`router`], [`correlation`]): replies matched to waiting
//!   requests by key, push events forwarded to the host
//! - **Naming** ([`cache`]): names, ids, network addresses and attributes
//! - **Operations** ([`dispatcher`], [`Driver`]): read, write, provision,
//!   delete and manager requests with bounded deadlines
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zigbee_gateway::{Driver, MemoryDeviceService, ReadRequest, ValueType};
//!
//! #[tokio::main]
//! async fn main() -> zigbee_gateway::Result<()> {
//!     let (push_tx, _push_rx) = tokio::sync::mpsc::channel(64);
//!     let driver = Driver::builder()
//!         .port("/dev/ttyUSB0")
//!         .device_service(Arc::new(MemoryDeviceService::new()))
//!         .push_channel(push_tx)
//!         .start()
//!         .await?;
//!
//!     let readings = driver
//!         .handle_read_commands("lamp", &[ReadRequest::new("OnOff", ValueType::Bool)])
//!         .await?;
//!     println!("{:?}", readings);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod codec;
pub mod config;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod model;
pub mod profile;
pub mod protocol;
pub mod router;
pub mod transport;
pub mod writer;

mod driver;

pub use cache::AddressCache;
pub use config::{ExchangeConfig, GatewayConfig, TransportConfig};
pub use correlation::{CorrelationKey, CorrelationStore};
pub use dispatcher::CommandDispatcher;
pub use driver::{Driver, DriverBuilder};
pub use error::{GatewayError, Result};
pub use host::{AsyncValues, DeviceService, MemoryDeviceService};
pub use model::{
    DeviceProfile, DeviceRecord, DeviceResource, ObjectKind, ReadRequest, Reading, Value,
    ValueType, WriteRequest,
};
pub use transport::Transport;
