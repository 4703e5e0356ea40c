//! Seam to the host device-management runtime.
//!
//! The host owns device records and receives pushed values. The gateway only
//! needs lookup by name, the full list at start-up, and persistence of
//! provisioning results.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::{GatewayError, Result};
use crate::model::{DeviceRecord, Reading};

/// Device records owned by the host.
pub trait DeviceService: Send + Sync + 'static {
    /// Look up one record by name.
    fn device(&self, name: &str) -> Option<DeviceRecord>;

    /// All records managed by this gateway.
    fn devices(&self) -> Vec<DeviceRecord>;

    /// Persist a modified record.
    fn update_device(&self, record: DeviceRecord) -> Result<()>;
}

/// Values pushed by the network without a request.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncValues {
    pub device_name: String,
    pub readings: Vec<Reading>,
}

/// In-memory [`DeviceService`], for tests and standalone runs.
#[derive(Default)]
pub struct MemoryDeviceService {
    records: RwLock<HashMap<String, DeviceRecord>>,
}

impl MemoryDeviceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(records: impl IntoIterator<Item = DeviceRecord>) -> Self {
        let service = Self::new();
        for record in records {
            service.insert(record);
        }
        service
    }

    /// Add or replace a record without going through `update_device`.
    pub fn insert(&self, record: DeviceRecord) {
        self.records.write().insert(record.name.clone(), record);
    }

    pub fn remove(&self, name: &str) -> Option<DeviceRecord> {
        self.records.write().remove(name)
    }
}

impl DeviceService for MemoryDeviceService {
    fn device(&self, name: &str) -> Option<DeviceRecord> {
        self.records.read().get(name).cloned()
    }

    fn devices(&self) -> Vec<DeviceRecord> {
        self.records.read().values().cloned().collect()
    }

    fn update_device(&self, record: DeviceRecord) -> Result<()> {
        let mut records = self.records.write();
        if !records.contains_key(&record.name) {
            return Err(GatewayError::Host(format!(
                "device {} is not registered",
                record.name
            )));
        }
        records.insert(record.name.clone(), record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceProfile;

    #[test]
    fn test_memory_service_lookup() {
        let service = MemoryDeviceService::with_devices([
            DeviceRecord::new("1", "lamp", DeviceProfile::default()),
            DeviceRecord::new("2", "switch", DeviceProfile::default()),
        ]);

        assert_eq!(service.device("lamp").unwrap().id, "1");
        assert!(service.device("fan").is_none());
        assert_eq!(service.devices().len(), 2);
    }

    #[test]
    fn test_update_requires_existing_record() {
        let service = MemoryDeviceService::new();
        let result = service.update_device(DeviceRecord::new("1", "lamp", DeviceProfile::default()));
        assert!(matches!(result, Err(GatewayError::Host(_))));

        service.insert(DeviceRecord::new("1", "lamp", DeviceProfile::default()));
        let mut record = service.device("lamp").unwrap();
        record.state.provisioned = true;
        service.update_device(record).unwrap();

        assert!(service.device("lamp").unwrap().state.provisioned);
    }
}
