//! Logical message bodies carried in frame payloads.
//!
//! Field names match the coordinator firmware:
//!
//! ```text
//! Command (0)       {addr, type, endp, cmid, pro, clu, att, vt, val?}
//! AddObject (2)     {MAC, PAN, name}
//! DeleteObject (3)  {addr, type, endp}
//! Reply / push      {MAC?, PAN?, addr, type, endp, resp, name?, desc?, pro?, clu?, att?, vt?, val?}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::{GatewayError, Result};
use crate::model::{AddressEui64, AttributeInfo, ObjectAddress, ObjectInfo};

/// Operation requested by a Command frame (`cmid`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum CommandId {
    Read = 1,
    Write = 2,
    Delete = 3,
}

impl From<CommandId> for u8 {
    fn from(id: CommandId) -> Self {
        id as u8
    }
}

impl TryFrom<u8> for CommandId {
    type Error = GatewayError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Self::Read),
            2 => Ok(Self::Write),
            3 => Ok(Self::Delete),
            other => Err(GatewayError::MalformedFrame(format!(
                "unknown command id {}",
                other
            ))),
        }
    }
}

/// Attribute operation addressed to one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandFrame {
    #[serde(flatten)]
    pub address: ObjectAddress,
    #[serde(rename = "cmid")]
    pub command_id: CommandId,
    #[serde(flatten)]
    pub attribute: AttributeInfo,
    #[serde(rename = "val", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
}

impl CommandFrame {
    pub fn read(address: ObjectAddress, attribute: AttributeInfo) -> Self {
        Self {
            address,
            command_id: CommandId::Read,
            attribute,
            value: None,
        }
    }

    pub fn write(address: ObjectAddress, attribute: AttributeInfo, value: Json) -> Self {
        Self {
            address,
            command_id: CommandId::Write,
            attribute,
            value: Some(value),
        }
    }
}

/// Request to provision a new object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionFrame {
    #[serde(flatten)]
    pub eui64: AddressEui64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// Request to remove an object from the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteObjectFrame {
    #[serde(flatten)]
    pub address: ObjectAddress,
}

/// Inbound body shared by replies and push events.
///
/// Replies to provisioning carry the physical identity; attribute replies
/// and push events carry the attribute and value.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReplyFrame {
    #[serde(flatten)]
    pub eui64: AddressEui64,
    #[serde(flatten)]
    pub address: Option<ObjectAddress>,
    /// Zero on success. Push events leave it out.
    #[serde(rename = "resp", default)]
    pub status: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "desc", default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub attribute: Option<AttributeInfo>,
    #[serde(rename = "val", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Json>,
}

impl ReplyFrame {
    /// Whether the remote side accepted the request.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Fail with `RemoteRejected` on a non-zero status.
    pub fn check_status(&self) -> Result<()> {
        if self.is_success() {
            Ok(())
        } else {
            Err(GatewayError::RemoteRejected(self.status))
        }
    }

    /// Address, required for routing.
    pub fn require_address(&self) -> Result<ObjectAddress> {
        self.address
            .ok_or_else(|| GatewayError::MalformedReply("reply carries no object address".into()))
    }

    /// Physical identity plus address, as assigned by provisioning.
    pub fn object_info(&self) -> Result<ObjectInfo> {
        Ok(ObjectInfo {
            eui64: self.eui64,
            address: self.require_address()?,
        })
    }
}
