//! # Bluetooth LE Transport (btleplug)
//!
//! [`BlePort`] over the platform BLE central exposed by `btleplug`
//! (BlueZ on Linux, CoreBluetooth on macOS, WinRT on Windows).
//!
//! ## Setup (Linux)
//!
//! BlueZ must be running and the user must be allowed on the system D-Bus:
//!
//! ```bash
//! $ sudo apt install libdbus-1-dev pkg-config
//! $ systemctl status bluetooth
//! ```
//!
//! ## Platform Notes
//!
//! - btleplug has no auto-reconnect setting; the option is ignored.
//! - `force_refresh_services` runs GATT service discovery right after
//!   connecting. Without it discovery runs lazily on the first
//!   `list_services`.
//! - btleplug keeps services and characteristics in ordered sets keyed by
//!   UUID, so "port order" here is UUID order.
//! - Writes go out as Write Request when the characteristic supports it,
//!   otherwise as Write Command. No MTU negotiation, no splitting.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use btleplug::api::{
    CentralEvent, CharPropFlags, Characteristic, Central as _, Manager as _, Peripheral as _,
    ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{
    BlePort, Capabilities, CharacteristicDescriptor, ConnectOptions, ConnectionState,
    PeripheralId, PeripheralInfo, Result, ServiceDescriptor,
};
use crate::error::TransportError;

fn transport_err(context: &str, e: btleplug::Error) -> TransportError {
    TransportError::new(format!("{}: {}", context, e))
}

fn capabilities(flags: CharPropFlags) -> Capabilities {
    Capabilities {
        can_read: flags.contains(CharPropFlags::READ),
        can_write: flags.contains(CharPropFlags::WRITE)
            || flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
        can_notify: flags.contains(CharPropFlags::NOTIFY)
            || flags.contains(CharPropFlags::INDICATE),
    }
}

async fn describe(peripheral: &Peripheral) -> PeripheralInfo {
    let name = match peripheral.properties().await {
        Ok(Some(props)) => props.local_name.unwrap_or_default(),
        _ => String::new(),
    };
    let state = match peripheral.is_connected().await {
        Ok(true) => ConnectionState::Connected,
        _ => ConnectionState::Disconnected,
    };
    PeripheralInfo {
        id: PeripheralId::new(peripheral.id().to_string()),
        name,
        state,
    }
}

/// btleplug-backed Bluetooth LE central
pub struct BtlePort {
    adapter: Adapter,
    known: Arc<Mutex<HashMap<PeripheralId, Peripheral>>>,
    scanning: AtomicBool,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtlePort {
    /// Open the first Bluetooth adapter on the system.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|e| transport_err("BLE manager", e))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| transport_err("list adapters", e))?
            .into_iter()
            .next()
            .ok_or_else(|| TransportError::new("No BLE adapter found"))?;

        if let Ok(info) = adapter.adapter_info().await {
            tracing::info!(adapter = %info, "using Bluetooth adapter");
        }

        Ok(Self {
            adapter,
            known: Arc::new(Mutex::new(HashMap::new())),
            scanning: AtomicBool::new(false),
            scan_task: Mutex::new(None),
        })
    }

    /// Resolve one of our identifiers to a btleplug peripheral.
    async fn peripheral(&self, id: &PeripheralId) -> Result<Peripheral> {
        let cached = self.known.lock().get(id).cloned();
        if let Some(p) = cached {
            return Ok(p);
        }

        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| transport_err("list peripherals", e))?;
        let found = peripherals
            .into_iter()
            .find(|p| p.id().to_string() == id.as_str())
            .ok_or_else(|| TransportError::new(format!("unknown peripheral {}", id)))?;

        self.known.lock().insert(id.clone(), found.clone());
        Ok(found)
    }

    /// Find the btleplug characteristic a descriptor refers to.
    fn characteristic(
        peripheral: &Peripheral,
        descriptor: &CharacteristicDescriptor,
    ) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| {
                c.uuid.to_string() == descriptor.id
                    && c.service_uuid.to_string() == descriptor.service_id
            })
            .ok_or_else(|| {
                TransportError::new(format!("characteristic {} not found", descriptor.id))
            })
    }
}

#[async_trait]
impl BlePort for BtlePort {
    async fn start_scan(&self, events: mpsc::UnboundedSender<PeripheralInfo>) -> Result<()> {
        let mut stream = self
            .adapter
            .events()
            .await
            .map_err(|e| transport_err("event stream", e))?;

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| transport_err("start scan", e))?;
        self.scanning.store(true, Ordering::SeqCst);

        let adapter = self.adapter.clone();
        let known = Arc::clone(&self.known);
        let task = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                let id = match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                    _ => continue,
                };
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                let info = describe(&peripheral).await;
                known.lock().insert(info.id.clone(), peripheral);
                if events.send(info).is_err() {
                    break;
                }
            }
            tracing::debug!("discovery event stream ended");
        });

        if let Some(previous) = self.scan_task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        let task = self.scan_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }
        if self.scanning.swap(false, Ordering::SeqCst) {
            self.adapter
                .stop_scan()
                .await
                .map_err(|e| transport_err("stop scan", e))?;
        }
        Ok(())
    }

    async fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    async fn connected_peripherals(&self) -> Result<Vec<PeripheralInfo>> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| transport_err("list peripherals", e))?;

        let mut connected = Vec::new();
        for peripheral in peripherals {
            if peripheral.is_connected().await.unwrap_or(false) {
                let info = describe(&peripheral).await;
                self.known.lock().insert(info.id.clone(), peripheral);
                connected.push(info);
            }
        }
        Ok(connected)
    }

    async fn connection_state(&self, id: &PeripheralId) -> ConnectionState {
        let Ok(peripheral) = self.peripheral(id).await else {
            return ConnectionState::Disconnected;
        };
        match peripheral.is_connected().await {
            Ok(true) => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    async fn connect(&self, id: &PeripheralId, options: ConnectOptions) -> Result<()> {
        if options.auto_reconnect {
            tracing::debug!("auto-reconnect requested; not supported by btleplug");
        }
        let peripheral = self.peripheral(id).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| transport_err("connect", e))?;
        if options.force_refresh_services {
            peripheral
                .discover_services()
                .await
                .map_err(|e| transport_err("discover services", e))?;
        }
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<()> {
        let peripheral = self.peripheral(id).await?;
        peripheral
            .disconnect()
            .await
            .map_err(|e| transport_err("disconnect", e))
    }

    async fn list_services(&self, id: &PeripheralId) -> Result<Vec<ServiceDescriptor>> {
        let peripheral = self.peripheral(id).await?;
        if peripheral.services().is_empty() {
            peripheral
                .discover_services()
                .await
                .map_err(|e| transport_err("discover services", e))?;
        }
        Ok(peripheral
            .services()
            .into_iter()
            .map(|s| {
                let uuid = s.uuid.to_string();
                let kind = if s.primary { "primary" } else { "secondary" };
                ServiceDescriptor::new(uuid, kind)
            })
            .collect())
    }

    async fn list_characteristics(
        &self,
        id: &PeripheralId,
        service: &ServiceDescriptor,
    ) -> Result<Vec<CharacteristicDescriptor>> {
        let peripheral = self.peripheral(id).await?;
        let found = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid.to_string() == service.id)
            .ok_or_else(|| TransportError::new(format!("service {} not found", service.id)))?;

        Ok(found
            .characteristics
            .into_iter()
            .map(|c| {
                let uuid = c.uuid.to_string();
                CharacteristicDescriptor::new(
                    uuid.clone(),
                    service.id.clone(),
                    uuid,
                    capabilities(c.properties),
                )
            })
            .collect())
    }

    async fn write_characteristic(
        &self,
        id: &PeripheralId,
        characteristic: &CharacteristicDescriptor,
        data: &[u8],
    ) -> Result<()> {
        let peripheral = self.peripheral(id).await?;
        let target = Self::characteristic(&peripheral, characteristic)?;
        let write_type = if target.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        peripheral
            .write(&target, data, write_type)
            .await
            .map_err(|e| transport_err("write", e))
    }
}

impl Drop for BtlePort {
    fn drop(&mut self) {
        if let Some(task) = self.scan_task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capabilities_from_flags() {
        let caps = capabilities(CharPropFlags::WRITE_WITHOUT_RESPONSE);
        assert!(caps.can_write);
        assert!(!caps.can_read);

        let caps = capabilities(CharPropFlags::READ | CharPropFlags::NOTIFY);
        assert!(!caps.can_write);
        assert!(caps.can_read);
        assert!(caps.can_notify);

        let caps = capabilities(CharPropFlags::INDICATE);
        assert!(caps.can_notify);
    }
}
