//! Expansion of profile `set` commands into typed resource writes.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::error::{GatewayError, Result};
use crate::model::{DeviceRecord, Value, WriteRequest};

/// Turn a named profile command plus its JSON parameters into resource writes.
///
/// For each operation the parameter comes from the request, else the
/// operation's own `parameter`, else the resource default. Value mappings
/// are applied before parsing into the resource's value type.
pub fn resolve_write_command(
    device: &DeviceRecord,
    command: &str,
    params_json: &str,
) -> Result<Vec<WriteRequest>> {
    let profile = &device.profile;
    let operations = &profile
        .command(command)
        .ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "command {} not found in profile {}",
                command, profile.name
            ))
        })?
        .set;

    let params = parse_params(params_json)?;

    let mut writes = Vec::with_capacity(operations.len());
    for op in operations {
        let resource = profile.resource(&op.resource).ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "{} does not match any resource in profile {}",
                op.resource, profile.name
            ))
        })?;

        let mut param = match params.get(&op.resource) {
            Some(p) => p.clone(),
            None => {
                tracing::debug!("No {} in request parameters, using fallback", op.resource);
                op.parameter
                    .clone()
                    .or_else(|| resource.default_value.clone())
                    .ok_or_else(|| {
                        GatewayError::InvalidRequest(format!(
                            "parameter {} is missing and has no default",
                            op.resource
                        ))
                    })?
            }
        };

        if !op.mappings.is_empty() {
            match op.mappings.get(&param) {
                Some(mapped) => param = mapped.clone(),
                None => tracing::warn!(
                    "No mapping for value {} of resource {}",
                    param,
                    op.resource
                ),
            }
        }

        let value = Value::parse(resource.value_type, &param)?;
        writes.push(WriteRequest::new(resource.name.clone(), value));
    }

    Ok(writes)
}

/// Parse a non-empty JSON object of parameters. Scalars are taken as text.
fn parse_params(params_json: &str) -> Result<HashMap<String, String>> {
    let map: HashMap<String, Json> = serde_json::from_str(params_json).map_err(|e| {
        GatewayError::InvalidRequest(format!("invalid command parameters {}: {}", params_json, e))
    })?;
    if map.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "no parameters specified".into(),
        ));
    }

    map.into_iter()
        .map(|(key, value)| match value {
            Json::String(s) => Ok((key, s)),
            Json::Bool(_) | Json::Number(_) => Ok((key, value.to_string())),
            other => Err(GatewayError::InvalidRequest(format!(
                "parameter {} must be a scalar, got {}",
                key, other
            ))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AttributeInfo, DeviceProfile, DeviceResource, ProfileCommand, ResourceOperation,
        ValueType,
    };

    fn lamp() -> DeviceRecord {
        let profile = DeviceProfile {
            name: "Lamp".into(),
            resources: vec![
                DeviceResource::new("OnOff", ValueType::Bool)
                    .with_attribute(AttributeInfo::new(260, 6, 0, 16)),
                DeviceResource::new("Level", ValueType::Uint8)
                    .with_attribute(AttributeInfo::new(260, 8, 0, 32))
                    .with_default("128"),
            ],
            commands: vec![
                ProfileCommand {
                    name: "Power".into(),
                    set: vec![ResourceOperation {
                        resource: "OnOff".into(),
                        parameter: None,
                        mappings: HashMap::from([
                            ("on".to_string(), "true".to_string()),
                            ("off".to_string(), "false".to_string()),
                        ]),
                    }],
                },
                ProfileCommand {
                    name: "Scene".into(),
                    set: vec![
                        ResourceOperation {
                            resource: "OnOff".into(),
                            parameter: Some("true".into()),
                            mappings: HashMap::new(),
                        },
                        ResourceOperation {
                            resource: "Level".into(),
                            parameter: None,
                            mappings: HashMap::new(),
                        },
                    ],
                },
            ],
        };
        DeviceRecord::new("lamp-id", "lamp", profile)
    }

    #[test]
    fn test_mapping_applied() {
        let writes = resolve_write_command(&lamp(), "Power", r#"{"OnOff":"on"}"#).unwrap();
        assert_eq!(writes, vec![WriteRequest::new("OnOff", Value::Bool(true))]);
    }

    #[test]
    fn test_unmapped_value_parsed_as_is() {
        let writes = resolve_write_command(&lamp(), "Power", r#"{"OnOff":"false"}"#).unwrap();
        assert_eq!(writes[0].value, Value::Bool(false));
    }

    #[test]
    fn test_fallbacks_parameter_then_default() {
        let writes = resolve_write_command(&lamp(), "Scene", r#"{"Other":"1"}"#).unwrap();
        assert_eq!(
            writes,
            vec![
                WriteRequest::new("OnOff", Value::Bool(true)),
                WriteRequest::new("Level", Value::Uint8(128)),
            ]
        );
    }

    #[test]
    fn test_numeric_params_accepted() {
        let writes = resolve_write_command(&lamp(), "Scene", r#"{"Level": 40}"#).unwrap();
        assert_eq!(writes[1].value, Value::Uint8(40));
    }

    #[test]
    fn test_errors() {
        let device = lamp();
        assert!(matches!(
            resolve_write_command(&device, "Missing", r#"{"a":"1"}"#),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            resolve_write_command(&device, "Power", "{}"),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            resolve_write_command(&device, "Power", "not json"),
            Err(GatewayError::InvalidRequest(_))
        ));
        // No request value, no parameter, no default
        assert!(matches!(
            resolve_write_command(&device, "Power", r#"{"Level":"1"}"#),
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            resolve_write_command(&device, "Scene", r#"{"Level":"999"}"#),
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
