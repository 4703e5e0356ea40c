//! Manager object requests: subscriptions, schedules and self-removal.
//!
//! The host addresses the manager object with four string parameters. The
//! request becomes one Command frame to the target object whose `val` is a
//! packed binary record, base64-encoded:
//!
//! ```text
//! Subscribe    addr(2) type endp [pro(2) clu(2) att(2) vt value(8)]
//! Schedule     addr(2) type endp name(18) time(4) pro(2) clu(2) att(2) vt value(8)
//! ```
//!
//! All integers are big-endian. The address is the owner's.

use base64::{engine::general_purpose, Engine as _};
use bytes::{BufMut, BytesMut};
use serde::Deserialize;
use serde_json::Value as Json;

use super::CommandDispatcher;
use crate::error::{GatewayError, Result};
use crate::model::{AttributeInfo, ObjectAddress, ObjectKind, Value, WriteRequest};
use crate::profile;
use crate::protocol::{CommandFrame, CommandId};

pub const MANAGER_OBJECT_NAME: &str = "ManagerObjectName";
pub const MANAGER_COMMAND_NAME: &str = "ManagerCommandName";
pub const MANAGER_METHOD: &str = "ManagerMethod";
pub const MANAGER_BODY: &str = "ManagerBody";

/// Attribute carrying subscriptions and self-removal.
pub const SUBSCRIBE_ATTRIBUTE: AttributeInfo = AttributeInfo::new(260, 64528, 17, 0);
/// Attribute carrying schedules.
pub const SCHEDULE_ATTRIBUTE: AttributeInfo = AttributeInfo::new(260, 64528, 18, 0);

const SUBSCRIBE: &str = "Subscribe";
const SCHEDULE: &str = "Schedule";
const REMOVE_ITSELF: &str = "RemoveItself";

const NAME_LEN: usize = 18;
const VALUE_LEN: usize = 8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubscribeBody {
    #[serde(rename = "ownerID")]
    owner_id: String,
    command: String,
    body: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ScheduleBody {
    #[serde(rename = "ownerID")]
    owner_id: String,
    name: String,
    time: i32,
    command: String,
    body: String,
}

/// Packed subscription record.
///
/// Without an attribute only the owner address is sent.
pub fn subscribe_payload(owner: ObjectAddress, action: Option<(AttributeInfo, &Value)>) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(19);
    buf.put_slice(&owner.to_bytes());
    if let Some((attribute, value)) = action {
        put_attribute_value(&mut buf, attribute, value);
    }
    buf.to_vec()
}

/// Packed schedule record. The name is cut or zero-padded to 18 bytes.
pub fn schedule_payload(
    owner: ObjectAddress,
    name: &str,
    time: i32,
    attribute: AttributeInfo,
    value: &Value,
) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(41);
    buf.put_slice(&owner.to_bytes());
    put_padded(&mut buf, name.as_bytes(), NAME_LEN);
    buf.put_i32(time);
    put_attribute_value(&mut buf, attribute, value);
    buf.to_vec()
}

fn put_attribute_value(buf: &mut BytesMut, attribute: AttributeInfo, value: &Value) {
    buf.put_u16(attribute.profile_id);
    buf.put_u16(attribute.cluster_id);
    buf.put_u16(attribute.attribute_id);
    buf.put_u8(attribute.value_type);
    put_padded(buf, &value.to_wire_bytes(), VALUE_LEN);
}

fn put_padded(buf: &mut BytesMut, bytes: &[u8], width: usize) {
    let n = bytes.len().min(width);
    buf.put_slice(&bytes[..n]);
    buf.put_bytes(0, width - n);
}

fn string_param<'a>(requests: &'a [WriteRequest], name: &str) -> Result<&'a str> {
    let request = requests
        .iter()
        .find(|r| r.resource == name)
        .ok_or_else(|| GatewayError::InvalidRequest(format!("missing parameter {}", name)))?;
    request
        .value
        .as_str()
        .ok_or_else(|| GatewayError::InvalidRequest(format!("parameter {} must be a string", name)))
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body)
        .map_err(|e| GatewayError::InvalidRequest(format!("invalid manager body: {}", e)))
}

impl CommandDispatcher {
    /// Execute a manager request.
    pub async fn master_request(&self, requests: &[WriteRequest]) -> Result<()> {
        let object_name = string_param(requests, MANAGER_OBJECT_NAME)?;
        let command_name = string_param(requests, MANAGER_COMMAND_NAME)?;
        let method = string_param(requests, MANAGER_METHOD)?;
        let body = string_param(requests, MANAGER_BODY)?;

        let (id, address) = self.resolve_object(object_name)?;
        let command_id = match method {
            "PUT" => CommandId::Write,
            "DELETE" => CommandId::Delete,
            other => {
                return Err(GatewayError::InvalidRequest(format!(
                    "unsupported manager method {}",
                    other
                )))
            }
        };

        let (attribute, payload) = match command_name {
            SUBSCRIBE => (
                SUBSCRIBE_ATTRIBUTE,
                Some(self.subscribe(object_name, parse_body(body)?)?),
            ),
            SCHEDULE => (
                SCHEDULE_ATTRIBUTE,
                Some(self.schedule(object_name, parse_body(body)?)?),
            ),
            REMOVE_ITSELF => (SUBSCRIBE_ATTRIBUTE, None),
            other => {
                return Err(GatewayError::InvalidRequest(format!(
                    "unsupported manager command {}",
                    other
                )))
            }
        };

        let frame = CommandFrame {
            address,
            command_id,
            attribute,
            value: payload.map(|p| Json::String(general_purpose::STANDARD.encode(p))),
        };
        tracing::debug!(
            "Manager {} {} for {} ({})",
            method,
            command_name,
            object_name,
            id
        );
        self.command(id, &frame).await?;
        Ok(())
    }

    fn subscribe(&self, target: &str, content: SubscribeBody) -> Result<Vec<u8>> {
        let owner = self.resolve_owner(&content.owner_id)?;

        let owner_kind = self
            .cache
            .resolve_id_to_name(&content.owner_id)
            .and_then(|name| self.devices.device(&name))
            .map(|record| record.state.kind);
        if owner_kind != Some(ObjectKind::Scenario) {
            return Ok(subscribe_payload(owner, None));
        }

        let (attribute, value) = self.first_write(target, &content.command, &content.body)?;
        Ok(subscribe_payload(owner, Some((attribute, &value))))
    }

    fn schedule(&self, target: &str, content: ScheduleBody) -> Result<Vec<u8>> {
        let owner = self.resolve_owner(&content.owner_id)?;
        let (attribute, value) = self.first_write(target, &content.command, &content.body)?;
        Ok(schedule_payload(
            owner,
            &content.name,
            content.time,
            attribute,
            &value,
        ))
    }

    fn resolve_owner(&self, owner_id: &str) -> Result<ObjectAddress> {
        self.cache
            .resolve_id_to_address(owner_id)
            .ok_or_else(|| GatewayError::UnknownObject(owner_id.to_string()))
    }

    /// Expand a profile command on `target` and keep its first write.
    fn first_write(&self, target: &str, command: &str, params: &str) -> Result<(AttributeInfo, Value)> {
        let record = self
            .devices
            .device(target)
            .ok_or_else(|| GatewayError::UnknownObject(target.to_string()))?;
        let write = profile::resolve_write_command(&record, command, params)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("command {} writes nothing", command))
            })?;
        let attribute = self.resolve_resource(&write.resource)?;
        Ok((attribute, write.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::tests::{dispatcher, lamp};
    use crate::model::{DeviceProfile, DeviceRecord, ObjectState, ProfileCommand, ResourceOperation};
    use std::collections::HashMap;

    #[test]
    fn test_subscribe_payload_owner_only() {
        let payload = subscribe_payload(ObjectAddress::new(0x1234, 2, 1), None);
        assert_eq!(payload, vec![0x12, 0x34, 2, 1]);
    }

    #[test]
    fn test_subscribe_payload_with_action() {
        let payload = subscribe_payload(
            ObjectAddress::new(0x0102, 3, 4),
            Some((AttributeInfo::new(260, 6, 0, 16), &Value::Bool(true))),
        );
        assert_eq!(payload.len(), 19);
        assert_eq!(&payload[..4], &[0x01, 0x02, 3, 4]);
        assert_eq!(&payload[4..11], &[0x01, 0x04, 0x00, 0x06, 0x00, 0x00, 16]);
        assert_eq!(&payload[11..], &[1, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_schedule_payload_layout() {
        let payload = schedule_payload(
            ObjectAddress::new(0x00FF, 1, 2),
            "morning",
            0x0102_0304,
            AttributeInfo::new(260, 8, 0, 32),
            &Value::Uint16(0xABCD),
        );

        assert_eq!(payload.len(), 41);
        assert_eq!(&payload[..4], &[0x00, 0xFF, 1, 2]);
        assert_eq!(&payload[4..11], b"morning");
        assert!(payload[11..22].iter().all(|&b| b == 0));
        assert_eq!(&payload[22..26], &[1, 2, 3, 4]);
        assert_eq!(&payload[26..33], &[0x01, 0x04, 0x00, 0x08, 0x00, 0x00, 32]);
        assert_eq!(&payload[33..35], &[0xAB, 0xCD]);
        assert!(payload[35..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_long_names_and_values_truncated() {
        let payload = schedule_payload(
            ObjectAddress::default(),
            "a schedule name longer than eighteen",
            -1,
            AttributeInfo::default(),
            &Value::String("0123456789".into()),
        );
        assert_eq!(payload.len(), 41);
        assert_eq!(&payload[4..22], b"a schedule name lo");
        assert_eq!(&payload[22..26], &[0xFF; 4]);
        assert_eq!(&payload[33..], b"01234567");
    }

    fn manager_request(object: &str, command: &str, method: &str, body: &str) -> Vec<WriteRequest> {
        vec![
            WriteRequest::new(MANAGER_OBJECT_NAME, Value::String(object.into())),
            WriteRequest::new(MANAGER_COMMAND_NAME, Value::String(command.into())),
            WriteRequest::new(MANAGER_METHOD, Value::String(method.into())),
            WriteRequest::new(MANAGER_BODY, Value::String(body.into())),
        ]
    }

    fn scenario() -> DeviceRecord {
        let mut record = DeviceRecord::new("scene-id", "evening", DeviceProfile::default());
        record.state = ObjectState::new(ObjectKind::Scenario);
        record.protocols.insert(
            "Network".into(),
            HashMap::from([
                ("Address".to_string(), "20".to_string()),
                ("Type".to_string(), "3".to_string()),
                ("Endpoint".to_string(), "1".to_string()),
            ]),
        );
        record
    }

    fn switchable_lamp() -> DeviceRecord {
        let mut record = lamp();
        record.profile.commands.push(ProfileCommand {
            name: "Power".into(),
            set: vec![ResourceOperation {
                resource: "OnOff".into(),
                parameter: None,
                mappings: HashMap::new(),
            }],
        });
        record
    }

    #[tokio::test]
    async fn test_unsupported_method_rejected() {
        let (dispatcher, _remote, _) = dispatcher(vec![lamp()]);

        let result = dispatcher
            .master_request(&manager_request("lamp", "RemoveItself", "POST", "{}"))
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unsupported_command_rejected() {
        let (dispatcher, _remote, _) = dispatcher(vec![lamp()]);

        let result = dispatcher
            .master_request(&manager_request("lamp", "Reboot", "PUT", "{}"))
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_missing_parameter_rejected() {
        let (dispatcher, _remote, _) = dispatcher(vec![lamp()]);

        let mut requests = manager_request("lamp", "RemoveItself", "DELETE", "{}");
        requests.pop();
        let result = dispatcher.master_request(&requests).await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_unknown_owner_rejected() {
        let (dispatcher, _remote, _) = dispatcher(vec![lamp()]);

        let body = r#"{"ownerID":"nobody","command":"Power","body":"{\"OnOff\":\"true\"}"}"#;
        let result = dispatcher
            .master_request(&manager_request("lamp", "Subscribe", "PUT", body))
            .await;
        assert!(matches!(result, Err(GatewayError::UnknownObject(id)) if id == "nobody"));
    }

    #[tokio::test]
    async fn test_scenario_owner_resolves_action() {
        let (dispatcher, _remote, _) = dispatcher(vec![switchable_lamp(), scenario()]);

        let content = SubscribeBody {
            owner_id: "scene-id".into(),
            command: "Power".into(),
            body: r#"{"OnOff":"true"}"#.into(),
        };
        let payload = dispatcher.subscribe("lamp", content).unwrap();
        assert_eq!(payload.len(), 19);
        assert_eq!(&payload[..4], &[0, 20, 3, 1]);
        assert_eq!(payload[11], 1);

        // A device owner subscribes without an action
        let content = SubscribeBody {
            owner_id: "lamp-id".into(),
            command: "Power".into(),
            body: String::new(),
        };
        let payload = dispatcher.subscribe("lamp", content).unwrap();
        assert_eq!(payload, vec![0, 10, 1, 1]);
    }
}
