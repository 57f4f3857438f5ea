//! # Device Registry
//!
//! The list of printers shown to the operator: every named peripheral seen
//! during the current scan, in discovery order, without duplicates.
//!
//! Discovery events arrive on a channel from the transport and are applied
//! by a single consumer ([`DeviceRegistry::drain`]), so the registry itself
//! needs no locking.

use std::collections::HashSet;

use tokio::sync::mpsc;

use crate::transport::{PeripheralId, PeripheralInfo};

/// Deduplicated, insertion-ordered set of discovered peripherals
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<PeripheralInfo>,
    seen: HashSet<PeripheralId>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovery event.
    ///
    /// Returns true if the device was added. Devices without a display name
    /// and devices already present are ignored.
    pub fn on_device_discovered(&mut self, device: PeripheralInfo) -> bool {
        if device.name.trim().is_empty() {
            tracing::trace!(id = %device.id, "ignoring unnamed peripheral");
            return false;
        }
        if !self.seen.insert(device.id.clone()) {
            return false;
        }
        tracing::debug!(id = %device.id, name = %device.name, "discovered peripheral");
        self.devices.push(device);
        true
    }

    /// Apply every event already waiting on `events`. Returns the number of
    /// devices added.
    pub fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<PeripheralInfo>) -> usize {
        let mut added = 0;
        while let Ok(device) = events.try_recv() {
            if self.on_device_discovered(device) {
                added += 1;
            }
        }
        added
    }

    /// Forget everything. Called at the start of each scan cycle.
    pub fn clear(&mut self) {
        self.devices.clear();
        self.seen.clear();
    }

    /// Current devices followed by any `connected` peripheral not already
    /// listed, so connected printers show up without re-advertising.
    pub fn snapshot(&self, connected: &[PeripheralInfo]) -> Vec<PeripheralInfo> {
        let mut out = self.devices.clone();
        let mut ids: HashSet<&PeripheralId> = self.seen.iter().collect();
        for device in connected {
            if ids.insert(&device.id) {
                out.push(device.clone());
            }
        }
        out
    }

    /// Look a device up by identifier, then by name. Both comparisons
    /// ignore ASCII case.
    pub fn find(&self, needle: &str) -> Option<&PeripheralInfo> {
        self.devices
            .iter()
            .find(|d| d.id.as_str().eq_ignore_ascii_case(needle))
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.name.eq_ignore_ascii_case(needle))
            })
    }

    pub fn devices(&self) -> &[PeripheralInfo] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
