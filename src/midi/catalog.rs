//! Catalog of selectable output ports, kept in step with device hotplug.

use crate::connection::{DeviceId, PortDescriptor, PortId};
use crate::midi::device::{DeviceInfo, DeviceProperties, PortInfo};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: PortId,
    pub descriptor: PortDescriptor,
}

/// Snapshot of the catalog at the time `PortCatalog::list` was called.
/// Iterating it any number of times yields the same entries.
#[derive(Debug, Clone)]
pub struct PortListing {
    entries: Arc<[CatalogEntry]>,
}

impl Default for PortListing {
    fn default() -> Self {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }
}

impl PortListing {
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get(index)
    }

    pub fn position(&self, descriptor: &PortDescriptor) -> Option<usize> {
        self.entries.iter().position(|e| &e.descriptor == descriptor)
    }
}

impl<'a> IntoIterator for &'a PortListing {
    type Item = &'a CatalogEntry;
    type IntoIter = std::slice::Iter<'a, CatalogEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, Default)]
pub struct PortCatalog {
    entries: BTreeMap<PortId, PortDescriptor>,
    devices: HashMap<DeviceId, DeviceInfo>,
    next_id: u32,
}

impl PortCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds every input port of the device. Returns `false` when nothing
    /// changed (device already known, or it has no input ports).
    pub fn on_device_attached(&mut self, info: &DeviceInfo) -> bool {
        if self.devices.contains_key(&info.id) {
            debug!(device = %info.id, "duplicate attach ignored");
            return false;
        }

        let mut added = 0;
        for port in info.input_ports() {
            let label = port_label(&info.properties, port);
            let descriptor = PortDescriptor::new(info.id.clone(), port.number, label);
            let id = PortId(self.next_id);
            self.next_id += 1;
            self.entries.insert(id, descriptor);
            added += 1;
        }

        if added == 0 {
            return false;
        }

        self.devices.insert(info.id.clone(), info.clone());
        debug!(device = %info.id, ports = added, "device added");
        true
    }

    /// Removes all ports of the device and returns them
    pub fn on_device_detached(&mut self, info: &DeviceInfo) -> Vec<PortDescriptor> {
        if self.devices.remove(&info.id).is_none() {
            return Vec::new();
        }

        let mut removed = Vec::new();
        self.entries.retain(|_, descriptor| {
            if descriptor.device() == &info.id {
                removed.push(descriptor.clone());
                false
            } else {
                true
            }
        });
        debug!(device = %info.id, ports = removed.len(), "device removed");
        removed
    }

    pub fn list(&self) -> PortListing {
        let entries: Vec<CatalogEntry> = self
            .entries
            .iter()
            .map(|(id, descriptor)| CatalogEntry {
                id: *id,
                descriptor: descriptor.clone(),
            })
            .collect();
        PortListing {
            entries: entries.into(),
        }
    }

    /// Metadata of a known device, as it was when it attached
    pub fn device(&self, id: &DeviceId) -> Option<&DeviceInfo> {
        self.devices.get(id)
    }

    pub fn lookup(&self, id: PortId) -> Option<&PortDescriptor> {
        self.entries.get(&id)
    }

    pub fn contains(&self, descriptor: &PortDescriptor) -> bool {
        self.entries.values().any(|d| d == descriptor)
    }

    /// Finds the entry matching a persisted `(device, port)` identity
    pub fn find(&self, device: &str, port: u32) -> Option<&PortDescriptor> {
        self.entries
            .values()
            .find(|d| d.is_same_endpoint(device, port))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// Display label: `name` or `product, manufacturer`, then ` (serial)` when
/// known, then ` [number:name]` (or ` [number]` for an unnamed port).
pub fn port_label(properties: &DeviceProperties, port: &PortInfo) -> String {
    let mut label = match non_empty(&properties.name) {
        Some(name) => name.to_string(),
        None => format!(
            "{}, {}",
            properties.product.as_deref().unwrap_or_default(),
            properties.manufacturer.as_deref().unwrap_or_default()
        ),
    };

    if let Some(serial) = non_empty(&properties.serial) {
        label.push_str(&format!(" ({})", serial));
    }

    match non_empty(&port.name) {
        Some(name) => label.push_str(&format!(" [{}:{}]", port.number, name)),
        None => label.push_str(&format!(" [{}]", port.number)),
    }
    label
}
