//! Bidirectional index between object names, ids, network addresses and
//! attributes.
//!
//! All maps sit behind one lock so an id removed from one index is never
//! visible through another.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::model::{AttributeInfo, DeviceRecord, DeviceResource, ObjectAddress, ObjectInfo};

#[derive(Default)]
struct CacheState {
    name_to_id: HashMap<String, String>,
    id_to_name: HashMap<String, String>,
    id_to_address: HashMap<String, ObjectAddress>,
    id_to_info: HashMap<String, ObjectInfo>,
    address_to_id: HashMap<ObjectAddress, String>,
    resource_to_attribute: HashMap<String, AttributeInfo>,
    attribute_to_resource: HashMap<(u16, u16, u16), DeviceResource>,
    master: Option<String>,
}

impl CacheState {
    fn update(&mut self, record: &DeviceRecord) {
        let id = &record.id;

        if let Some(old_name) = self.id_to_name.insert(id.clone(), record.name.clone()) {
            if old_name != record.name {
                self.name_to_id.remove(&old_name);
                if self.master.as_deref() == Some(old_name.as_str()) {
                    self.master = None;
                }
            }
        }
        if let Some(previous_id) = self.name_to_id.insert(record.name.clone(), id.clone()) {
            if &previous_id != id {
                tracing::warn!(
                    "Object name {} moved from id {} to {}",
                    record.name,
                    previous_id,
                    id
                );
                self.id_to_name.remove(&previous_id);
            }
        }

        if record.is_manager() {
            self.master = Some(record.name.clone());
        } else if self.master.as_deref() == Some(record.name.as_str()) {
            self.master = None;
        }

        match record.object_address() {
            Some(address) => {
                if let Some(old) = self.id_to_address.insert(id.clone(), address) {
                    if old != address {
                        self.address_to_id.remove(&old);
                    }
                }
                self.address_to_id.insert(address, id.clone());
            }
            None => {
                if let Some(old) = self.id_to_address.remove(id) {
                    self.address_to_id.remove(&old);
                }
            }
        }

        match record.object_info() {
            Some(info) => {
                self.id_to_info.insert(id.clone(), info);
            }
            None => {
                self.id_to_info.remove(id);
            }
        }

        for resource in &record.profile.resources {
            if let Some(attribute) = resource.attribute_info() {
                self.resource_to_attribute
                    .insert(resource.name.clone(), attribute);
                self.attribute_to_resource
                    .insert(attribute.triple(), resource.clone());
            }
        }
    }

    fn delete(&mut self, name: &str) {
        let Some(id) = self.name_to_id.remove(name) else {
            return;
        };
        self.id_to_name.remove(&id);
        self.id_to_info.remove(&id);
        if let Some(address) = self.id_to_address.remove(&id) {
            // Only drop the route if it still points at this object
            if self.address_to_id.get(&address) == Some(&id) {
                self.address_to_id.remove(&address);
            }
        }
        if self.master.as_deref() == Some(name) {
            self.master = None;
        }
    }
}

/// Shared address cache.
///
/// Resource↔attribute mappings are keyed by resource name across all
/// profiles and survive object deletion.
#[derive(Default)]
pub struct AddressCache {
    state: Mutex<CacheState>,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill the cache from the host's device list.
    pub fn load<'a>(&self, records: impl IntoIterator<Item = &'a DeviceRecord>) {
        let mut state = self.state.lock();
        let mut count = 0usize;
        for record in records {
            state.update(record);
            count += 1;
        }
        tracing::debug!("Address cache loaded with {} objects", count);
    }

    /// Insert or refresh every mapping derived from `record`.
    pub fn update(&self, record: &DeviceRecord) {
        self.state.lock().update(record);
    }

    /// Remove the object called `name`. Unknown names are ignored.
    pub fn delete(&self, name: &str) {
        self.state.lock().delete(name);
    }

    pub fn resolve_name_to_id(&self, name: &str) -> Option<String> {
        self.state.lock().name_to_id.get(name).cloned()
    }

    pub fn resolve_id_to_name(&self, id: &str) -> Option<String> {
        self.state.lock().id_to_name.get(id).cloned()
    }

    /// Physical identity and address. Requires MAC and PAN to be known.
    pub fn resolve_id_to_info(&self, id: &str) -> Option<ObjectInfo> {
        self.state.lock().id_to_info.get(id).copied()
    }

    pub fn resolve_id_to_address(&self, id: &str) -> Option<ObjectAddress> {
        self.state.lock().id_to_address.get(id).copied()
    }

    pub fn resolve_address_to_id(&self, address: &ObjectAddress) -> Option<String> {
        self.state.lock().address_to_id.get(address).cloned()
    }

    pub fn resolve_resource_to_attribute(&self, resource: &str) -> Option<AttributeInfo> {
        self.state.lock().resource_to_attribute.get(resource).copied()
    }

    /// Resource declared for an attribute, matched on the
    /// `(profile, cluster, attribute)` triple only.
    pub fn resolve_attribute_to_resource(&self, attribute: &AttributeInfo) -> Option<DeviceResource> {
        self.state
            .lock()
            .attribute_to_resource
            .get(&attribute.triple())
            .cloned()
    }

    /// Name of the manager object, if one is known.
    pub fn master_name(&self) -> Option<String> {
        self.state.lock().master.clone()
    }

    /// Address of the object called `name`, in one lock acquisition.
    pub fn resolve_name_to_address(&self, name: &str) -> Option<(String, ObjectAddress)> {
        let state = self.state.lock();
        let id = state.name_to_id.get(name)?;
        let address = state.id_to_address.get(id)?;
        Some((id.clone(), *address))
    }

    /// Number of named objects.
    pub fn len(&self) -> usize {
        self.state.lock().name_to_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
