//! # Connection Manager
//!
//! Drives one printer at a time through
//!
//! ```text
//! Idle -> Scanning -> Connecting -> Connected -> Printing -> Disconnecting -> Idle
//!                          |             |           |
//!                          +-------------+-----------+--> Disconnecting -> Idle (error)
//! ```
//!
//! Every operation takes `&mut self`, so exactly one port operation is in
//! flight at any time. There are no retries: a failure ends the attempt,
//! the device is disconnected and the error is returned to the caller.
//!
//! ## Print Attempt
//!
//! 1. [`connect`](ConnectionManager::connect) (skipped if already connected)
//! 2. [`select_writable_characteristic`](ConnectionManager::select_writable_characteristic):
//!    first characteristic with write capability, services and
//!    characteristics walked in the order the port reports them
//! 3. [`print`](ConnectionManager::print): one write per chunk, each awaited
//!    before the next, stop at the first failure
//! 4. disconnect, always, exactly once
//!
//! [`print_to`](ConnectionManager::print_to) runs all four steps.

use tokio::sync::mpsc;
use tokio::time;

use crate::config::SessionConfig;
use crate::error::{PrintError, TransportError};
use crate::receipt::ReceiptDocument;
use crate::registry::DeviceRegistry;
use crate::transport::{
    BlePort, CharacteristicDescriptor, ConnectOptions, ConnectionState, PeripheralId,
    PeripheralInfo,
};

/// Where the manager is in the print flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    Connected,
    Printing,
    Disconnecting,
}

/// Summary of a successful print
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReport {
    /// Display name of the printer
    pub device: String,
    pub chunks_written: usize,
    pub bytes_written: usize,
}

/// Scan, connect and print state machine over a [`BlePort`]
pub struct ConnectionManager<P: BlePort> {
    port: P,
    config: SessionConfig,
    registry: DeviceRegistry,
    discoveries: Option<mpsc::UnboundedReceiver<PeripheralInfo>>,
    state: ManagerState,
    current: Option<PeripheralInfo>,
    selected: Option<CharacteristicDescriptor>,
    cancelled: bool,
}

impl<P: BlePort> ConnectionManager<P> {
    pub fn new(port: P, config: SessionConfig) -> Self {
        Self {
            port,
            config,
            registry: DeviceRegistry::new(),
            discoveries: None,
            state: ManagerState::Idle,
            current: None,
            selected: None,
            cancelled: false,
        }
    }

    // ========== Accessors ==========

    pub fn state(&self) -> ManagerState {
        self.state
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The characteristic chosen for the current connection, if any
    pub fn selected(&self) -> Option<&CharacteristicDescriptor> {
        self.selected.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Update the host's permission gate.
    pub fn set_permission_granted(&mut self, granted: bool) {
        self.config.permission_granted = granted;
    }

    // ========== Discovery ==========

    /// Begin a scan cycle.
    ///
    /// Clears the registry, starts the port scan unless one is already
    /// running, and adds peripherals the platform reports as connected so
    /// they are listed even if they never advertise.
    ///
    /// Calling this while a scan is running keeps the running scan and its
    /// channel. Devices found earlier reappear only once they advertise
    /// again (connected peripherals are re-added right away).
    pub async fn start_scan(&mut self) -> Result<(), PrintError> {
        if !self.config.permission_granted {
            tracing::warn!("scan refused: Bluetooth permission not granted");
            return Err(PrintError::PermissionDenied);
        }

        self.registry.clear();

        if self.port.is_scanning().await {
            tracing::debug!("scan already running");
        } else {
            let (tx, rx) = mpsc::unbounded_channel();
            self.port
                .start_scan(tx)
                .await
                .map_err(PrintError::AdapterUnavailable)?;
            self.discoveries = Some(rx);
            tracing::info!("scan started");
        }

        if self.state == ManagerState::Idle {
            self.state = ManagerState::Scanning;
        }

        let connected = self
            .port
            .connected_peripherals()
            .await
            .map_err(PrintError::AdapterUnavailable)?;
        for device in connected {
            self.registry.on_device_discovered(device);
        }

        Ok(())
    }

    /// Stop the port scan. The registry keeps what was found.
    pub async fn stop_scan(&mut self) -> Result<(), PrintError> {
        self.drain_discoveries();
        self.port
            .stop_scan()
            .await
            .map_err(PrintError::AdapterUnavailable)?;
        if self.state == ManagerState::Scanning {
            self.state = ManagerState::Idle;
        }
        tracing::info!(devices = self.registry.len(), "scan stopped");
        Ok(())
    }

    /// Devices to offer the operator: everything discovered so far plus
    /// peripherals already connected.
    pub async fn devices(&mut self) -> Result<Vec<PeripheralInfo>, PrintError> {
        self.drain_discoveries();
        let connected = self
            .port
            .connected_peripherals()
            .await
            .map_err(PrintError::AdapterUnavailable)?;
        Ok(self.registry.snapshot(&connected))
    }

    fn drain_discoveries(&mut self) {
        if let Some(rx) = self.discoveries.as_mut() {
            let added = self.registry.drain(rx);
            if added > 0 {
                tracing::debug!(added, total = self.registry.len(), "registry updated");
            }
        }
    }

    // ========== Connection ==========

    /// Connect to `device`, or adopt the existing connection.
    ///
    /// Uses [`ConnectOptions::PRINT`] (no auto-reconnect, fresh service
    /// discovery) and the configured connect timeout. A connection to a
    /// different device is released first. On failure the device is
    /// disconnected and `ConnectionFailed` names it.
    pub async fn connect(&mut self, device: &PeripheralInfo) -> Result<(), PrintError> {
        if let Some(previous) = self.current.clone().filter(|p| p.id != device.id) {
            tracing::info!(device = %previous.display_name(), "releasing previous connection");
            self.release(&previous.id).await;
        }

        self.selected = None;
        self.cancelled = false;

        if self.port.connection_state(&device.id).await == ConnectionState::Connected {
            tracing::info!(device = %device.display_name(), "already connected");
            self.current = Some(device.clone());
            self.state = ManagerState::Connected;
            return Ok(());
        }

        tracing::info!(device = %device.display_name(), id = %device.id, "connecting");
        self.state = ManagerState::Connecting;

        let attempt = self.port.connect(&device.id, ConnectOptions::PRINT);
        let result = match time::timeout(self.config.connect_timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::new(format!(
                "timed out after {:?}",
                self.config.connect_timeout
            ))),
        };

        match result {
            Ok(()) => {
                tracing::info!(device = %device.display_name(), "connected");
                self.current = Some(device.clone());
                self.state = ManagerState::Connected;
                Ok(())
            }
            Err(cause) => {
                tracing::warn!(device = %device.display_name(), %cause, "connection failed");
                self.release(&device.id).await;
                Err(PrintError::ConnectionFailed {
                    device: device.display_name().to_string(),
                    cause,
                })
            }
        }
    }

    /// User-initiated disconnect before printing completes.
    ///
    /// Later `select_writable_characteristic`/`print` calls report
    /// `Cancelled` until the next `connect`.
    pub async fn cancel(&mut self) {
        if let Some(device) = self.current.clone() {
            tracing::info!(device = %device.display_name(), "cancelled by user");
            self.release(&device.id).await;
            self.cancelled = true;
        }
    }

    fn require_connection(&self) -> Result<PeripheralInfo, PrintError> {
        match &self.current {
            Some(device) => Ok(device.clone()),
            None if self.cancelled => Err(PrintError::Cancelled),
            None => Err(PrintError::NotConnected),
        }
    }

    /// Disconnect and forget the connection. Disconnect errors are logged,
    /// never returned: this runs on paths that already have a result.
    async fn release(&mut self, id: &PeripheralId) {
        self.state = ManagerState::Disconnecting;
        if let Err(e) = self.port.disconnect(id).await {
            tracing::warn!(%id, error = %e, "disconnect failed");
        } else {
            tracing::debug!(%id, "disconnected");
        }
        self.selected = None;
        self.current = None;
        self.state = ManagerState::Idle;
    }

    // ========== Characteristic Selection ==========

    /// Pick the characteristic to print to.
    ///
    /// The first characteristic with write capability, walking services
    /// then their characteristics in port order. The choice is kept for the
    /// rest of the connection. On failure the device is disconnected.
    pub async fn select_writable_characteristic(
        &mut self,
    ) -> Result<CharacteristicDescriptor, PrintError> {
        let device = self.require_connection()?;

        if let Some(selected) = &self.selected {
            return Ok(selected.clone());
        }

        match self.find_writable(&device.id).await {
            Ok(characteristic) => {
                tracing::info!(
                    service = %characteristic.service_id,
                    characteristic = %characteristic.id,
                    "selected writable characteristic"
                );
                self.selected = Some(characteristic.clone());
                Ok(characteristic)
            }
            Err(e) => {
                tracing::warn!(
                    device = %device.display_name(),
                    error = %e,
                    "no characteristic to print to"
                );
                self.release(&device.id).await;
                Err(e)
            }
        }
    }

    async fn find_writable(
        &self,
        id: &PeripheralId,
    ) -> Result<CharacteristicDescriptor, PrintError> {
        let services = self
            .port
            .list_services(id)
            .await
            .map_err(PrintError::ServiceDiscoveryFailed)?;

        for service in &services {
            tracing::debug!(service = %service.id, name = %service.name, "service");
            let characteristics = self
                .port
                .list_characteristics(id, service)
                .await
                .map_err(PrintError::ServiceDiscoveryFailed)?;

            for characteristic in characteristics {
                let caps = characteristic.capabilities;
                tracing::debug!(
                    characteristic = %characteristic.id,
                    can_read = caps.can_read,
                    can_write = caps.can_write,
                    can_notify = caps.can_notify,
                    "characteristic"
                );
                if caps.can_write {
                    return Ok(characteristic);
                }
            }
        }

        Err(PrintError::NoWritableCharacteristic)
    }

    // ========== Printing ==========

    /// Send `document` to the connected printer, then disconnect.
    ///
    /// Chunks are written strictly in order, one write each; the first
    /// failed write ends the print with `WriteFailed` and nothing after it
    /// is sent. The device is disconnected exactly once whatever happens.
    pub async fn print(&mut self, document: &ReceiptDocument) -> Result<PrintReport, PrintError> {
        let characteristic = self.select_writable_characteristic().await?;
        let device = self.require_connection()?;

        self.state = ManagerState::Printing;
        tracing::info!(
            device = %device.display_name(),
            chunks = document.len(),
            bytes = document.byte_len(),
            "printing"
        );

        let result = self.write_document(&device, &characteristic, document).await;
        self.release(&device.id).await;

        match &result {
            Ok(report) => tracing::info!(
                device = %report.device,
                chunks = report.chunks_written,
                bytes = report.bytes_written,
                "print complete"
            ),
            Err(e) => tracing::warn!(device = %device.display_name(), error = %e, "print failed"),
        }
        result
    }

    async fn write_document(
        &self,
        device: &PeripheralInfo,
        characteristic: &CharacteristicDescriptor,
        document: &ReceiptDocument,
    ) -> Result<PrintReport, PrintError> {
        let mut bytes_written = 0;

        for (chunk_index, chunk) in document.iter().enumerate() {
            if self.config.exceeds_write_len(chunk.len()) {
                tracing::warn!(
                    chunk_index,
                    len = chunk.len(),
                    max = ?self.config.max_write_len,
                    "chunk larger than configured write size"
                );
            }

            self.port
                .write_characteristic(&device.id, characteristic, chunk.bytes())
                .await
                .map_err(|cause| PrintError::WriteFailed { chunk_index, cause })?;

            tracing::trace!(chunk_index, len = chunk.len(), "chunk written");
            bytes_written += chunk.len();
        }

        Ok(PrintReport {
            device: device.display_name().to_string(),
            chunks_written: document.len(),
            bytes_written,
        })
    }

    /// One complete print attempt: connect, select, print, disconnect.
    pub async fn print_to(
        &mut self,
        device: &PeripheralInfo,
        document: &ReceiptDocument,
    ) -> Result<PrintReport, PrintError> {
        self.connect(device).await?;
        self.print(document).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::receipt::{PrintChunk, compose, demo_fields};
    use crate::transport::mock::Call;
    use crate::transport::{Capabilities, MockPort};

    const ADDR: &str = "00:11:22:33:44:55";

    fn printer_port() -> MockPort {
        MockPort::new()
            .with_printer(ADDR, "MTP-II")
            .with_service(ADDR, "1800", "Generic Access")
            .with_characteristic(ADDR, "1800", "2a00", Capabilities::READ)
            .with_service(ADDR, "18f0", "Printer")
            .with_characteristic(ADDR, "18f0", "2af0", Capabilities::NOTIFY)
            .with_characteristic(ADDR, "18f0", "2af1", Capabilities::WRITE)
    }

    fn granted() -> SessionConfig {
        SessionConfig::default().with_permission(true)
    }

    fn printer() -> PeripheralInfo {
        PeripheralInfo::new(ADDR, "MTP-II", ConnectionState::Disconnected)
    }

    fn document(n: usize) -> ReceiptDocument {
        ReceiptDocument::new(
            (0..n)
                .map(|i| PrintChunk::plain(vec![i as u8]))
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_scan_requires_permission() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), SessionConfig::default());

        let err = manager.start_scan().await.unwrap_err();
        assert_eq!(err, PrintError::PermissionDenied);
        assert_eq!(port.scan_count(), 0);
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_scan_collects_devices() {
        let port = printer_port().with_printer("AA", "");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.start_scan().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Scanning);

        let devices = manager.devices().await.unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "MTP-II");

        port.announce("BB", "PT-210");
        let devices = manager.devices().await.unwrap();
        assert_eq!(devices.len(), 2);

        manager.stop_scan().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_scan_is_idempotent() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.start_scan().await.unwrap();
        manager.start_scan().await.unwrap();
        assert_eq!(port.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_rescan_keeps_running_scan() {
        let port = printer_port().with_connected_printer("CC", "Bonded");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.start_scan().await.unwrap();
        assert_eq!(manager.devices().await.unwrap().len(), 2);

        manager.start_scan().await.unwrap();
        assert_eq!(port.scan_count(), 1);
        let names: Vec<String> = manager
            .devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Bonded"]);

        port.announce(ADDR, "MTP-II");
        assert_eq!(manager.devices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scan_merges_connected_peripherals() {
        let port = MockPort::new().with_connected_printer("CC", "Bonded");
        let mut manager = ConnectionManager::new(port, granted());

        manager.start_scan().await.unwrap();
        assert!(manager.registry().find("CC").is_some());
    }

    #[tokio::test]
    async fn test_scan_adapter_failure() {
        let port = printer_port().fail_scan("no adapter");
        let mut manager = ConnectionManager::new(port, granted());

        let err = manager.start_scan().await.unwrap_err();
        assert!(matches!(err, PrintError::AdapterUnavailable(_)));
    }

    #[tokio::test]
    async fn test_connect_uses_print_options() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.connect(&printer()).await.unwrap();
        assert_eq!(manager.state(), ManagerState::Connected);
        assert_eq!(
            port.calls(),
            vec![Call::Connect(
                PeripheralId::new(ADDR),
                ConnectOptions {
                    auto_reconnect: false,
                    force_refresh_services: true,
                }
            )]
        );
    }

    #[tokio::test]
    async fn test_connect_skipped_when_already_connected() {
        let port = MockPort::new()
            .with_connected_printer(ADDR, "MTP-II")
            .with_service(ADDR, "18f0", "Printer")
            .with_characteristic(ADDR, "18f0", "2af1", Capabilities::WRITE);
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.print_to(&printer(), &document(3)).await.unwrap();
        assert_eq!(port.connect_count(), 0);
        assert_eq!(port.writes().len(), 3);
        assert_eq!(port.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_names_device() {
        let port = printer_port().fail_connect("gatt 133");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let err = manager.print_to(&printer(), &document(3)).await.unwrap_err();
        match err {
            PrintError::ConnectionFailed { device, cause } => {
                assert_eq!(device, "MTP-II");
                assert_eq!(cause.to_string(), "gatt 133");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(manager.state(), ManagerState::Idle);
        assert_eq!(port.disconnect_count(), 1);
        assert!(port.writes().is_empty());
    }

    #[tokio::test]
    async fn test_connect_releases_other_device() {
        const OTHER: &str = "66:77:88:99:AA:BB";
        let port = printer_port()
            .with_printer(OTHER, "PT-210")
            .with_service(OTHER, "18f0", "Printer")
            .with_characteristic(OTHER, "18f0", "2af1", Capabilities::WRITE);
        let mut manager = ConnectionManager::new(port.clone(), granted());
        let other = PeripheralInfo::new(OTHER, "PT-210", ConnectionState::Disconnected);

        manager.connect(&printer()).await.unwrap();
        manager
            .print_to(&other, &ReceiptDocument::default())
            .await
            .unwrap();

        assert!(!port.is_connected(ADDR));
        assert!(!port.is_connected(OTHER));
        assert_eq!(port.disconnect_count(), 2);

        let calls = port.calls();
        let released = calls
            .iter()
            .position(|c| *c == Call::Disconnect(PeripheralId::new(ADDR)))
            .unwrap();
        let connected = calls
            .iter()
            .position(|c| matches!(c, Call::Connect(id, _) if id.as_str() == OTHER))
            .unwrap();
        assert!(released < connected);
    }

    #[tokio::test]
    async fn test_reconnect_same_device_keeps_connection() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.connect(&printer()).await.unwrap();
        manager.connect(&printer()).await.unwrap();
        assert_eq!(port.connect_count(), 1);
        assert_eq!(port.disconnect_count(), 0);
        assert_eq!(manager.state(), ManagerState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_timeout() {
        let port = printer_port().hang_on_connect();
        let config = granted().with_connect_timeout(Duration::from_secs(2));
        let mut manager = ConnectionManager::new(port.clone(), config);

        let err = manager.connect(&printer()).await.unwrap_err();
        match err {
            PrintError::ConnectionFailed { device, cause } => {
                assert_eq!(device, "MTP-II");
                assert!(cause.to_string().contains("timed out"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(port.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_selects_first_writable() {
        let port = MockPort::new()
            .with_printer(ADDR, "MTP-II")
            .with_service(ADDR, "18f0", "Printer")
            .with_characteristic(ADDR, "18f0", "2af0", Capabilities::READ)
            .with_characteristic(ADDR, "18f0", "2af1", Capabilities::WRITE)
            .with_service(ADDR, "ff00", "Vendor")
            .with_characteristic(ADDR, "ff00", "ff02", Capabilities::WRITE);
        let mut manager = ConnectionManager::new(port, granted());

        manager.connect(&printer()).await.unwrap();
        let selected = manager.select_writable_characteristic().await.unwrap();
        assert_eq!(selected.id, "2af1");
        assert_eq!(manager.selected().map(|c| c.id.as_str()), Some("2af1"));
    }

    #[tokio::test]
    async fn test_selection_fixed_for_connection() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.connect(&printer()).await.unwrap();
        let first = manager.select_writable_characteristic().await.unwrap();
        let calls_after_first = port.calls().len();
        let second = manager.select_writable_characteristic().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(port.calls().len(), calls_after_first);
    }

    #[tokio::test]
    async fn test_no_writable_characteristic() {
        let port = MockPort::new()
            .with_printer(ADDR, "MTP-II")
            .with_service(ADDR, "1800", "Generic Access")
            .with_characteristic(ADDR, "1800", "2a00", Capabilities::READ)
            .with_service(ADDR, "180f", "Battery")
            .with_characteristic(ADDR, "180f", "2a19", Capabilities::NOTIFY);
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let err = manager.print_to(&printer(), &document(2)).await.unwrap_err();
        assert_eq!(err, PrintError::NoWritableCharacteristic);
        assert_eq!(port.disconnect_count(), 1);
        assert!(port.writes().is_empty());
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_service_discovery_failure() {
        let port = printer_port().fail_list_services("att timeout");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let err = manager.print_to(&printer(), &document(2)).await.unwrap_err();
        assert!(matches!(err, PrintError::ServiceDiscoveryFailed(_)));
        assert_eq!(port.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_characteristic_discovery_failure() {
        let port = printer_port().fail_list_characteristics("att timeout");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let err = manager.print_to(&printer(), &document(2)).await.unwrap_err();
        assert!(matches!(err, PrintError::ServiceDiscoveryFailed(_)));
        assert_eq!(port.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_print_writes_in_order() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());
        let doc = compose(&demo_fields());

        let report = manager.print_to(&printer(), &doc).await.unwrap();

        let expected: Vec<Vec<u8>> = doc.iter().map(|c| c.bytes().to_vec()).collect();
        assert_eq!(port.writes(), expected);
        assert_eq!(report.chunks_written, 21);
        assert_eq!(report.bytes_written, doc.byte_len());
        assert_eq!(report.device, "MTP-II");
        assert_eq!(port.disconnect_count(), 1);
        assert!(!port.is_connected(ADDR));
        assert_eq!(manager.state(), ManagerState::Idle);
        assert!(manager.selected().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_aborts_remaining() {
        let port = printer_port().fail_write_at(4, "gatt write error");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let err = manager.print_to(&printer(), &document(10)).await.unwrap_err();

        assert_eq!(
            err,
            PrintError::WriteFailed {
                chunk_index: 4,
                cause: TransportError::new("gatt write error"),
            }
        );
        assert_eq!(port.writes().len(), 5);
        assert_eq!(port.disconnect_count(), 1);
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_first_write_failure_sends_nothing_else() {
        let port = printer_port().fail_write_at(0, "gatt write error");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let err = manager.print_to(&printer(), &document(10)).await.unwrap_err();
        assert!(matches!(err, PrintError::WriteFailed { chunk_index: 0, .. }));
        assert_eq!(port.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_failure_does_not_mask_result() {
        let port = printer_port().fail_disconnect("already gone");
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let report = manager.print_to(&printer(), &document(2)).await.unwrap();
        assert_eq!(report.chunks_written, 2);
        assert_eq!(port.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_print_without_connection() {
        let mut manager = ConnectionManager::new(printer_port(), granted());
        let err = manager.print(&document(1)).await.unwrap_err();
        assert_eq!(err, PrintError::NotConnected);
    }

    #[tokio::test]
    async fn test_cancel_before_print() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());

        manager.connect(&printer()).await.unwrap();
        manager.cancel().await;

        let err = manager.print(&document(3)).await.unwrap_err();
        assert_eq!(err, PrintError::Cancelled);
        assert_eq!(port.disconnect_count(), 1);
        assert!(port.writes().is_empty());

        // A new connection clears the cancellation
        manager.connect(&printer()).await.unwrap();
        assert!(manager.print(&document(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_document_still_disconnects() {
        let port = printer_port();
        let mut manager = ConnectionManager::new(port.clone(), granted());

        let report = manager
            .print_to(&printer(), &ReceiptDocument::default())
            .await
            .unwrap();
        assert_eq!(report.chunks_written, 0);
        assert_eq!(port.disconnect_count(), 1);
    }
}
