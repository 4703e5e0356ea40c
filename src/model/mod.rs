//! Data model shared across the gateway.
//!
//! - [`address`]: network addresses and attribute identities
//! - [`device`]: host device records and profiles
//! - [`value`]: typed values, readings and host requests

pub mod address;
pub mod device;
pub mod value;

pub use address::{
    format_mac, mac_string, parse_mac, AddressEui64, AttributeInfo, ObjectAddress, ObjectInfo,
};
pub use device::{
    DeviceProfile, DeviceRecord, DeviceResource, ObjectKind, ObjectState, ProfileCommand,
    ResourceOperation, MANAGER_PROFILE, NETWORK_PROTOCOL,
};
pub use value::{ReadRequest, Reading, Value, ValueType, WriteRequest};
