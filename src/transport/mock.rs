//! # Scripted Transport
//!
//! An in-memory [`BlePort`] with a fixed set of peripherals, services and
//! characteristics. Failures can be injected at each step and every call is
//! recorded, so tests can assert on the exact sequence the manager issued.
//!
//! Clones share state: keep one clone for assertions and hand the other to
//! the [`ConnectionManager`](crate::manager::ConnectionManager).
//!
//! ```
//! use estampa::transport::{Capabilities, MockPort};
//!
//! let port = MockPort::new()
//!     .with_printer("00:11:22:33:44:55", "MTP-II")
//!     .with_service("00:11:22:33:44:55", "18f0", "Printer")
//!     .with_characteristic("00:11:22:33:44:55", "18f0", "2af1", Capabilities::WRITE);
//!
//! assert!(port.calls().is_empty());
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{
    BlePort, Capabilities, CharacteristicDescriptor, ConnectOptions, ConnectionState,
    PeripheralId, PeripheralInfo, Result, ServiceDescriptor,
};
use crate::error::TransportError;

/// A port call, as recorded by [`MockPort`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    StartScan,
    StopScan,
    Connect(PeripheralId, ConnectOptions),
    Disconnect(PeripheralId),
    ListServices(PeripheralId),
    ListCharacteristics(String),
    Write { characteristic: String, data: Vec<u8> },
}

#[derive(Debug, Clone)]
struct MockPeripheral {
    id: PeripheralId,
    name: String,
    services: Vec<(ServiceDescriptor, Vec<CharacteristicDescriptor>)>,
}

#[derive(Debug, Default)]
struct Inner {
    peripherals: Vec<MockPeripheral>,
    connected: HashSet<PeripheralId>,
    scanning: bool,
    events: Option<mpsc::UnboundedSender<PeripheralInfo>>,
    calls: Vec<Call>,
    write_count: usize,

    scan_error: Option<String>,
    connect_error: Option<String>,
    connect_hangs: bool,
    services_error: Option<String>,
    characteristics_error: Option<String>,
    write_error: Option<(usize, String)>,
    disconnect_error: Option<String>,
}

impl Inner {
    fn info(&self, p: &MockPeripheral) -> PeripheralInfo {
        let state = if self.connected.contains(&p.id) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        PeripheralInfo {
            id: p.id.clone(),
            name: p.name.clone(),
            state,
        }
    }

    fn peripheral(&self, id: &PeripheralId) -> Result<&MockPeripheral> {
        self.peripherals
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| TransportError::new(format!("unknown peripheral {}", id)))
    }

    fn peripheral_mut(&mut self, id: &str) -> &mut MockPeripheral {
        let id = PeripheralId::new(id);
        if let Some(pos) = self.peripherals.iter().position(|p| p.id == id) {
            &mut self.peripherals[pos]
        } else {
            self.peripherals.push(MockPeripheral {
                id,
                name: String::new(),
                services: Vec::new(),
            });
            let last = self.peripherals.len() - 1;
            &mut self.peripherals[last]
        }
    }
}

/// Scripted [`BlePort`] for tests
#[derive(Debug, Clone, Default)]
pub struct MockPort {
    inner: Arc<Mutex<Inner>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Scripting ==========

    /// Add an advertising peripheral. An empty name models a device that
    /// does not advertise one.
    pub fn with_printer(self, id: &str, name: &str) -> Self {
        self.inner.lock().peripheral_mut(id).name = name.to_string();
        self
    }

    /// Add a peripheral the platform already holds a connection to.
    pub fn with_connected_printer(self, id: &str, name: &str) -> Self {
        {
            let mut inner = self.inner.lock();
            inner.peripheral_mut(id).name = name.to_string();
            inner.connected.insert(PeripheralId::new(id));
        }
        self
    }

    /// Append a service to a peripheral's GATT table.
    pub fn with_service(self, id: &str, service_id: &str, name: &str) -> Self {
        self.inner
            .lock()
            .peripheral_mut(id)
            .services
            .push((ServiceDescriptor::new(service_id, name), Vec::new()));
        self
    }

    /// Append a characteristic to an existing service.
    pub fn with_characteristic(
        self,
        id: &str,
        service_id: &str,
        characteristic_id: &str,
        capabilities: Capabilities,
    ) -> Self {
        {
            let mut inner = self.inner.lock();
            let peripheral = inner.peripheral_mut(id);
            if let Some((_, chars)) = peripheral
                .services
                .iter_mut()
                .find(|(s, _)| s.id == service_id)
            {
                chars.push(CharacteristicDescriptor::new(
                    characteristic_id,
                    service_id,
                    characteristic_id,
                    capabilities,
                ));
            }
        }
        self
    }

    pub fn fail_scan(self, cause: &str) -> Self {
        self.inner.lock().scan_error = Some(cause.to_string());
        self
    }

    pub fn fail_connect(self, cause: &str) -> Self {
        self.inner.lock().connect_error = Some(cause.to_string());
        self
    }

    /// Make `connect` never resolve, to exercise the connect timeout.
    pub fn hang_on_connect(self) -> Self {
        self.inner.lock().connect_hangs = true;
        self
    }

    pub fn fail_list_services(self, cause: &str) -> Self {
        self.inner.lock().services_error = Some(cause.to_string());
        self
    }

    pub fn fail_list_characteristics(self, cause: &str) -> Self {
        self.inner.lock().characteristics_error = Some(cause.to_string());
        self
    }

    /// Fail the write call with zero-based index `index`.
    pub fn fail_write_at(self, index: usize, cause: &str) -> Self {
        self.inner.lock().write_error = Some((index, cause.to_string()));
        self
    }

    pub fn fail_disconnect(self, cause: &str) -> Self {
        self.inner.lock().disconnect_error = Some(cause.to_string());
        self
    }

    /// Emit a discovery event on the active scan, as if a new device had
    /// just advertised. Returns false when no scan is running.
    pub fn announce(&self, id: &str, name: &str) -> bool {
        let mut inner = self.inner.lock();
        inner.peripheral_mut(id).name = name.to_string();
        let info = PeripheralInfo::new(id, name, ConnectionState::Disconnected);
        match &inner.events {
            Some(tx) if inner.scanning => tx.send(info).is_ok(),
            _ => false,
        }
    }

    // ========== Inspection ==========

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    /// Payloads of every write call, failed ones included, in call order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Write { data, .. } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn disconnect_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Disconnect(_)))
    }

    pub fn connect_count(&self) -> usize {
        self.count(|c| matches!(c, Call::Connect(..)))
    }

    pub fn scan_count(&self) -> usize {
        self.count(|c| matches!(c, Call::StartScan))
    }

    pub fn is_connected(&self, id: &str) -> bool {
        self.inner.lock().connected.contains(&PeripheralId::new(id))
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|c| pred(c)).count()
    }
}

#[async_trait]
impl BlePort for MockPort {
    async fn start_scan(&self, events: mpsc::UnboundedSender<PeripheralInfo>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::StartScan);
        if let Some(cause) = &inner.scan_error {
            return Err(TransportError::new(cause.clone()));
        }
        inner.scanning = true;
        for p in &inner.peripherals {
            // Receiver may already be gone; discovery is best effort
            let _ = events.send(inner.info(p));
        }
        inner.events = Some(events);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::StopScan);
        inner.scanning = false;
        inner.events = None;
        Ok(())
    }

    async fn is_scanning(&self) -> bool {
        self.inner.lock().scanning
    }

    async fn connected_peripherals(&self) -> Result<Vec<PeripheralInfo>> {
        let inner = self.inner.lock();
        Ok(inner
            .peripherals
            .iter()
            .filter(|p| inner.connected.contains(&p.id))
            .map(|p| inner.info(p))
            .collect())
    }

    async fn connection_state(&self, id: &PeripheralId) -> ConnectionState {
        if self.inner.lock().connected.contains(id) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    async fn connect(&self, id: &PeripheralId, options: ConnectOptions) -> Result<()> {
        let hangs = {
            let mut inner = self.inner.lock();
            inner.calls.push(Call::Connect(id.clone(), options));
            if let Some(cause) = &inner.connect_error {
                return Err(TransportError::new(cause.clone()));
            }
            inner.peripheral(id)?;
            if !inner.connect_hangs {
                inner.connected.insert(id.clone());
            }
            inner.connect_hangs
        };
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn disconnect(&self, id: &PeripheralId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Disconnect(id.clone()));
        inner.connected.remove(id);
        match &inner.disconnect_error {
            Some(cause) => Err(TransportError::new(cause.clone())),
            None => Ok(()),
        }
    }

    async fn list_services(&self, id: &PeripheralId) -> Result<Vec<ServiceDescriptor>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::ListServices(id.clone()));
        if let Some(cause) = &inner.services_error {
            return Err(TransportError::new(cause.clone()));
        }
        let services = inner
            .peripheral(id)?
            .services
            .iter()
            .map(|(s, _)| s.clone())
            .collect();
        Ok(services)
    }

    async fn list_characteristics(
        &self,
        id: &PeripheralId,
        service: &ServiceDescriptor,
    ) -> Result<Vec<CharacteristicDescriptor>> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::ListCharacteristics(service.id.clone()));
        if let Some(cause) = &inner.characteristics_error {
            return Err(TransportError::new(cause.clone()));
        }
        let chars = inner
            .peripheral(id)?
            .services
            .iter()
            .find(|(s, _)| s.id == service.id)
            .map(|(_, chars)| chars.clone())
            .unwrap_or_default();
        Ok(chars)
    }

    async fn write_characteristic(
        &self,
        id: &PeripheralId,
        characteristic: &CharacteristicDescriptor,
        data: &[u8],
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(Call::Write {
            characteristic: characteristic.id.clone(),
            data: data.to_vec(),
        });
        let index = inner.write_count;
        inner.write_count += 1;

        if let Some((fail_at, cause)) = &inner.write_error {
            if *fail_at == index {
                return Err(TransportError::new(cause.clone()));
            }
        }
        if !inner.connected.contains(id) {
            return Err(TransportError::new(format!("{} is not connected", id)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scan_sends_every_peripheral() {
        let port = MockPort::new()
            .with_printer("AA", "MTP-II")
            .with_printer("BB", "");
        let (tx, mut rx) = mpsc::unbounded_channel();

        port.start_scan(tx).await.unwrap();
        assert!(port.is_scanning().await);

        assert_eq!(rx.recv().await.unwrap().name, "MTP-II");
        assert_eq!(rx.recv().await.unwrap().name, "");
    }

    #[tokio::test]
    async fn test_announce_requires_active_scan() {
        let port = MockPort::new();
        assert!(!port.announce("CC", "Late"));

        let (tx, mut rx) = mpsc::unbounded_channel();
        port.start_scan(tx).await.unwrap();
        assert!(port.announce("CC", "Late"));
        assert_eq!(rx.recv().await.unwrap().id, PeripheralId::new("CC"));
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_track_state() {
        let port = MockPort::new().with_printer("AA", "MTP-II");
        let id = PeripheralId::new("AA");

        port.connect(&id, ConnectOptions::PRINT).await.unwrap();
        assert_eq!(port.connection_state(&id).await, ConnectionState::Connected);

        port.disconnect(&id).await.unwrap();
        assert_eq!(port.connection_state(&id).await, ConnectionState::Disconnected);
        assert_eq!(port.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_unknown_peripheral_fails() {
        let port = MockPort::new();
        let err = port
            .connect(&PeripheralId::new("ZZ"), ConnectOptions::PRINT)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unknown peripheral"));
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let port = MockPort::new()
            .with_connected_printer("AA", "MTP-II")
            .fail_write_at(1, "gatt error");
        let id = PeripheralId::new("AA");
        let ch = CharacteristicDescriptor::new("2af1", "18f0", "2af1", Capabilities::WRITE);

        assert!(port.write_characteristic(&id, &ch, b"a").await.is_ok());
        assert!(port.write_characteristic(&id, &ch, b"b").await.is_err());
        assert_eq!(port.writes(), vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
