//! Host-side device records and profiles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::address::{format_mac, parse_mac, AddressEui64, AttributeInfo, ObjectAddress, ObjectInfo};
use super::value::ValueType;

/// Protocol section holding network properties.
pub const NETWORK_PROTOCOL: &str = "Network";
pub const MAC_PROPERTY: &str = "MAC";
pub const PAN_PROPERTY: &str = "PAN";
pub const ADDRESS_PROPERTY: &str = "Address";
pub const ENDPOINT_PROPERTY: &str = "Endpoint";
pub const TYPE_PROPERTY: &str = "Type";

/// Resource attribute keys.
pub const PROFILE_ID_ATTRIBUTE: &str = "profileID";
pub const CLUSTER_ID_ATTRIBUTE: &str = "clusterID";
pub const ATTRIBUTE_ID_ATTRIBUTE: &str = "attributeID";
pub const VALUE_TYPE_ATTRIBUTE: &str = "valueType";

/// Profile name that marks the manager object.
pub const MANAGER_PROFILE: &str = "ManagerProfile";

/// Kind of logical network entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ObjectKind {
    #[default]
    Device,
    Group,
    Scenario,
}

/// Explicit lifecycle state persisted with the device record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectState {
    #[serde(default)]
    pub kind: ObjectKind,
    #[serde(default)]
    pub provisioned: bool,
}

impl ObjectState {
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            provisioned: false,
        }
    }
}

/// One operation of a profile `set` command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceOperation {
    /// Target device resource.
    pub resource: String,
    /// Fallback parameter when the request omits one.
    #[serde(default)]
    pub parameter: Option<String>,
    /// Value translation table applied to the raw parameter.
    #[serde(default)]
    pub mappings: HashMap<String, String>,
}

/// Named profile command.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileCommand {
    pub name: String,
    #[serde(default)]
    pub set: Vec<ResourceOperation>,
}

/// Resource declared by a device profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceResource {
    pub name: String,
    pub value_type: ValueType,
    #[serde(default)]
    pub default_value: Option<String>,
    /// Attribute map carrying `profileID`, `clusterID`, `attributeID` and an
    /// optional `valueType`, all decimal.
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

impl DeviceResource {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            default_value: None,
            attributes: HashMap::new(),
        }
    }

    /// Attach the attribute triple this resource maps to.
    pub fn with_attribute(mut self, attribute: AttributeInfo) -> Self {
        self.attributes
            .insert(PROFILE_ID_ATTRIBUTE.into(), attribute.profile_id.to_string());
        self.attributes
            .insert(CLUSTER_ID_ATTRIBUTE.into(), attribute.cluster_id.to_string());
        self.attributes.insert(
            ATTRIBUTE_ID_ATTRIBUTE.into(),
            attribute.attribute_id.to_string(),
        );
        self.attributes
            .insert(VALUE_TYPE_ATTRIBUTE.into(), attribute.value_type.to_string());
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    /// Attribute identity, if all three ids are present and numeric.
    pub fn attribute_info(&self) -> Option<AttributeInfo> {
        let profile_id = self.attributes.get(PROFILE_ID_ATTRIBUTE)?.parse().ok()?;
        let cluster_id = self.attributes.get(CLUSTER_ID_ATTRIBUTE)?.parse().ok()?;
        let attribute_id = self.attributes.get(ATTRIBUTE_ID_ATTRIBUTE)?.parse().ok()?;
        let value_type = match self.attributes.get(VALUE_TYPE_ATTRIBUTE) {
            Some(vt) => vt.parse().ok()?,
            None => 0,
        };
        Some(AttributeInfo::new(
            profile_id,
            cluster_id,
            attribute_id,
            value_type,
        ))
    }
}

/// Device profile: resources plus named commands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub name: String,
    #[serde(default)]
    pub resources: Vec<DeviceResource>,
    #[serde(default)]
    pub commands: Vec<ProfileCommand>,
}

impl DeviceProfile {
    pub fn resource(&self, name: &str) -> Option<&DeviceResource> {
        self.resources.iter().find(|r| r.name == name)
    }

    pub fn command(&self, name: &str) -> Option<&ProfileCommand> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// Device record as owned by the host.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub profile: DeviceProfile,
    /// Protocol sections, each a map of string properties. `MAC` is hex,
    /// the rest decimal.
    #[serde(default)]
    pub protocols: HashMap<String, HashMap<String, String>>,
    #[serde(default)]
    pub state: ObjectState,
}

impl DeviceRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, profile: DeviceProfile) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            profile,
            ..Default::default()
        }
    }

    pub fn network(&self) -> Option<&HashMap<String, String>> {
        self.protocols.get(NETWORK_PROTOCOL)
    }

    fn network_property<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.network()?.get(key)?.trim().parse().ok()
    }

    /// Logical address from the `Network` protocol, if fully present.
    pub fn object_address(&self) -> Option<ObjectAddress> {
        Some(ObjectAddress::new(
            self.network_property(ADDRESS_PROPERTY)?,
            self.network_property(TYPE_PROPERTY)?,
            self.network_property(ENDPOINT_PROPERTY)?,
        ))
    }

    /// MAC from the `Network` protocol, written as hex.
    pub fn mac(&self) -> Option<u64> {
        parse_mac(self.network()?.get(MAC_PROPERTY)?)
    }

    /// PAN from the `Network` protocol.
    pub fn pan(&self) -> Option<u16> {
        self.network_property(PAN_PROPERTY)
    }

    /// Full physical plus logical identity.
    pub fn object_info(&self) -> Option<ObjectInfo> {
        Some(ObjectInfo {
            eui64: AddressEui64 {
                mac: self.mac()?,
                pan: self.pan()?,
            },
            address: self.object_address()?,
        })
    }

    /// Write an assigned identity into the `Network` protocol.
    pub fn set_object_info(&mut self, info: &ObjectInfo) {
        let network = self
            .protocols
            .entry(NETWORK_PROTOCOL.to_string())
            .or_default();
        network.insert(MAC_PROPERTY.into(), format_mac(info.eui64.mac));
        network.insert(PAN_PROPERTY.into(), info.eui64.pan.to_string());
        network.insert(ADDRESS_PROPERTY.into(), info.address.address.to_string());
        network.insert(ENDPOINT_PROPERTY.into(), info.address.endpoint.to_string());
        network.insert(TYPE_PROPERTY.into(), info.address.kind.to_string());
    }

    /// Whether this is the manager object.
    pub fn is_manager(&self) -> bool {
        self.profile.name == MANAGER_PROFILE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn network(pairs: &[(&str, &str)]) -> HashMap<String, HashMap<String, String>> {
        let props = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        HashMap::from([(NETWORK_PROTOCOL.to_string(), props)])
    }

    #[test]
    fn test_object_info_from_protocols() {
        let mut record = DeviceRecord::new("abc123", "sensor1", DeviceProfile::default());
        record.protocols = network(&[
            ("MAC", "00001234"),
            ("PAN", "7"),
            ("Address", "10"),
            ("Type", "1"),
            ("Endpoint", "2"),
        ]);

        let info = record.object_info().unwrap();
        assert_eq!(info.eui64.mac, 0x1234);
        assert_eq!(info.eui64.pan, 7);
        assert_eq!(info.address, ObjectAddress::new(10, 1, 2));
    }

    #[test]
    fn test_missing_address_property() {
        let mut record = DeviceRecord::new("id", "name", DeviceProfile::default());
        record.protocols = network(&[("MAC", "1"), ("PAN", "1"), ("Address", "10")]);

        assert!(record.object_address().is_none());
        assert!(record.object_info().is_none());
        assert_eq!(record.mac(), Some(1));
    }

    #[test]
    fn test_mac_property_is_hex() {
        let mut record = DeviceRecord::new("id", "plug", DeviceProfile::default());
        record.protocols = network(&[("MAC", "00124B0001A2B3C4"), ("PAN", "1")]);
        assert_eq!(record.mac(), Some(0x0012_4B00_01A2_B3C4));

        record.protocols = network(&[("MAC", "not-a-mac")]);
        assert_eq!(record.mac(), None);
    }

    #[test]
    fn test_set_object_info_roundtrip() {
        let mut record = DeviceRecord::new("id", "name", DeviceProfile::default());
        let info = ObjectInfo {
            eui64: AddressEui64 { mac: 0x77, pan: 3 },
            address: ObjectAddress::new(513, 2, 9),
        };

        record.set_object_info(&info);

        assert_eq!(record.network().unwrap()["MAC"], "00000077");
        assert_eq!(record.object_info(), Some(info));
    }

    #[test]
    fn test_resource_attribute_info() {
        let resource = DeviceResource::new("OnOff", ValueType::Bool)
            .with_attribute(AttributeInfo::new(260, 6, 0, 16));
        assert_eq!(resource.attribute_info(), Some(AttributeInfo::new(260, 6, 0, 16)));

        let mut partial = DeviceResource::new("Level", ValueType::Uint8);
        partial.attributes.insert("profileID".into(), "260".into());
        assert!(partial.attribute_info().is_none());
    }

    #[test]
    fn test_state_defaults() {
        let state: ObjectState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.kind, ObjectKind::Device);
        assert!(!state.provisioned);
    }

    #[test]
    fn test_manager_detection() {
        let profile = DeviceProfile {
            name: MANAGER_PROFILE.into(),
            ..Default::default()
        };
        assert!(DeviceRecord::new("m", "manager", profile).is_manager());
    }
}
