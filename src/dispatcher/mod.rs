//! Host operations translated into request/reply exchanges.
//!
//! Every exchange walks the same path:
//!
//! ```text
//! resolve names ─► lock key ─► encode body ─► register key ─► send (send budget)
//!                                                                 │
//!            check status ◄─ matching reply ◄─ wait (overall budget − send time)
//! ```
//!
//! The key lock is held for the whole round trip, so two exchanges under
//! the same key never overlap and a reply cannot reach the wrong caller.

mod master;

pub use master::{
    schedule_payload, subscribe_payload, MANAGER_BODY, MANAGER_COMMAND_NAME, MANAGER_METHOD,
    MANAGER_OBJECT_NAME, SCHEDULE_ATTRIBUTE, SUBSCRIBE_ATTRIBUTE,
};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tokio::time::Instant;

use crate::cache::AddressCache;
use crate::codec::PayloadFormat;
use crate::config::ExchangeConfig;
use crate::correlation::{CorrelationKey, CorrelationStore};
use crate::error::{GatewayError, Result};
use crate::host::DeviceService;
use crate::model::{
    AddressEui64, AttributeInfo, DeviceRecord, ObjectAddress, ObjectKind, ReadRequest, Reading,
    Value, WriteRequest,
};
use crate::protocol::{CommandCode, CommandFrame, DeleteObjectFrame, ProvisionFrame, ReplyFrame};
use crate::transport::Transport;

type KeyLockMap = HashMap<CorrelationKey, Arc<tokio::sync::Mutex<()>>>;

/// One async lock per live correlation key.
///
/// Entries are created on first use and dropped once nobody holds or waits
/// on them.
#[derive(Default)]
struct KeyLocks {
    locks: Arc<Mutex<KeyLockMap>>,
}

/// Held for the duration of one exchange.
struct KeyGuard {
    locks: Arc<Mutex<KeyLockMap>>,
    key: CorrelationKey,
    lock: Arc<tokio::sync::Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLocks {
    async fn acquire(&self, key: &CorrelationKey) -> KeyGuard {
        let lock = self.locks.lock().entry(key.clone()).or_default().clone();
        let guard = lock.clone().lock_owned().await;
        KeyGuard {
            locks: self.locks.clone(),
            key: key.clone(),
            lock,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().len()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock();
        // Only the map and this guard still refer to the lock
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.key);
        }
    }
}

/// Issues commands to the coordinator and waits for their replies.
pub struct CommandDispatcher {
    transport: Arc<Transport>,
    cache: Arc<AddressCache>,
    store: CorrelationStore<ReplyFrame>,
    devices: Arc<dyn DeviceService>,
    budgets: ExchangeConfig,
    format: PayloadFormat,
    key_locks: KeyLocks,
}

impl CommandDispatcher {
    pub fn new(
        transport: Arc<Transport>,
        cache: Arc<AddressCache>,
        store: CorrelationStore<ReplyFrame>,
        devices: Arc<dyn DeviceService>,
        budgets: ExchangeConfig,
        format: PayloadFormat,
    ) -> Self {
        Self {
            transport,
            cache,
            store,
            devices,
            budgets,
            format,
            key_locks: KeyLocks::default(),
        }
    }

    /// Read one resource of a named object.
    pub async fn read(&self, object: &str, request: &ReadRequest) -> Result<Reading> {
        let (id, address) = self.resolve_object(object)?;
        let attribute = self.resolve_resource(&request.resource)?;

        let reply = self
            .command(id, &CommandFrame::read(address, attribute))
            .await?;

        let raw = reply.value.as_ref().ok_or_else(|| {
            GatewayError::MalformedReply(format!("read of {} returned no value", request.resource))
        })?;
        let value = Value::from_json(request.value_type, raw)?;
        Ok(Reading::now(request.resource.clone(), value))
    }

    /// Write one resource of a named object.
    pub async fn write(&self, object: &str, request: &WriteRequest) -> Result<()> {
        let (id, address) = self.resolve_object(object)?;
        let attribute = self.resolve_resource(&request.resource)?;

        self.command(
            id,
            &CommandFrame::write(address, attribute, request.value.to_json()),
        )
        .await?;
        Ok(())
    }

    /// Provision a record on the network.
    ///
    /// Returns the record with its assigned identity, already persisted
    /// through the device service and written into the cache. On any error
    /// the stored record is left untouched.
    ///
    /// A `Device` must carry a hex MAC in its `Network` protocol; groups and
    /// scenarios are provisioned with MAC 0.
    pub async fn provision(&self, record: &DeviceRecord) -> Result<DeviceRecord> {
        let is_device = record.state.kind == ObjectKind::Device;
        let mac = if is_device {
            record.mac().ok_or_else(|| {
                GatewayError::InvalidRequest(format!(
                    "{} has no valid MAC in its Network protocol",
                    record.name
                ))
            })?
        } else {
            0
        };
        let body = ProvisionFrame {
            eui64: AddressEui64 {
                mac,
                pan: record.pan().unwrap_or(0),
            },
            name: record.name.clone(),
        };
        let key = if is_device && mac != 0 {
            CorrelationKey::ByMac(mac)
        } else {
            CorrelationKey::ByCommand(CommandCode::AddObject)
        };

        tracing::debug!("Provisioning {} under {}", record.name, key);
        let reply = self
            .exchange(
                CommandCode::AddObject,
                &body,
                key,
                self.budgets.provision_send_timeout(),
                self.budgets.provision_timeout(),
                |_| true,
            )
            .await?;
        let info = reply.object_info()?;

        let mut updated = record.clone();
        updated.set_object_info(&info);
        if let Some(description) = reply.description.filter(|d| !d.is_empty()) {
            updated.description = description;
        }
        updated.state.provisioned = true;

        self.devices.update_device(updated.clone())?;
        self.cache.update(&updated);
        tracing::info!("Provisioned {} at {}", updated.name, info.address);
        Ok(updated)
    }

    /// Remove a named object from the coordinator.
    pub async fn delete_object(&self, object: &str) -> Result<()> {
        let (_, address) = self.resolve_object(object)?;

        self.exchange(
            CommandCode::DeleteObject,
            &DeleteObjectFrame { address },
            CorrelationKey::ByCommand(CommandCode::DeleteObject),
            self.budgets.send_timeout(),
            self.budgets.command_timeout(),
            |_| true,
        )
        .await?;
        tracing::info!("Deleted {} from the network", object);
        Ok(())
    }

    /// Command exchange keyed by the target's id.
    ///
    /// A reply for a different attribute of the same object is skipped.
    async fn command(&self, id: String, frame: &CommandFrame) -> Result<ReplyFrame> {
        let requested = frame.attribute.triple();
        self.exchange(
            CommandCode::Command,
            frame,
            CorrelationKey::ById(id),
            self.budgets.send_timeout(),
            self.budgets.command_timeout(),
            |reply| reply.attribute.map_or(true, |a| a.triple() == requested),
        )
        .await
    }

    /// One request/reply round trip.
    ///
    /// The key is locked for the whole exchange and registered before the
    /// send so a fast reply cannot slip past. Replies rejected by `accept`
    /// are dropped and the wait continues. The reply budget is what
    /// `overall` leaves after the send.
    async fn exchange<T, F>(
        &self,
        command: CommandCode,
        body: &T,
        key: CorrelationKey,
        send_timeout: Duration,
        overall: Duration,
        accept: F,
    ) -> Result<ReplyFrame>
    where
        T: Serialize,
        F: Fn(&ReplyFrame) -> bool,
    {
        let payload = self.format.encode(body)?;
        let _key_guard = self.key_locks.acquire(&key).await;
        let mut pending = self.store.register(key.clone());

        let spent = self
            .transport
            .send(command, &payload, send_timeout.min(overall))
            .await?;

        let deadline = Instant::now() + overall.saturating_sub(spent);
        let reply = loop {
            let reply = pending
                .wait(deadline.saturating_duration_since(Instant::now()))
                .await?;
            if accept(&reply) {
                break reply;
            }
            tracing::debug!("Reply under {} does not match the request, skipped", key);
            pending = self.store.resume(key.clone());
        };

        if let Err(e) = reply.check_status() {
            tracing::warn!("Command {} rejected with status {}", command, reply.status);
            return Err(e);
        }
        Ok(reply)
    }

    fn resolve_object(&self, name: &str) -> Result<(String, ObjectAddress)> {
        self.cache
            .resolve_name_to_address(name)
            .ok_or_else(|| GatewayError::UnknownObject(name.to_string()))
    }

    fn resolve_resource(&self, resource: &str) -> Result<AttributeInfo> {
        self.cache
            .resolve_resource_to_attribute(resource)
            .ok_or_else(|| GatewayError::UnknownResource(resource.to_string()))
    }
}
