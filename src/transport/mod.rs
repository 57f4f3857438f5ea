//! # Printer Transport Layer
//!
//! This module defines the capability surface the core needs from a
//! Bluetooth LE central, and the plain descriptors that cross it.
//!
//! ## Available Transports
//!
//! - [`btle`]: btleplug central (BlueZ, CoreBluetooth, WinRT). Requires the
//!   `ble` feature.
//! - [`mock`]: scripted in-memory port for tests and dry runs
//!
//! ## Ownership
//!
//! The port owns live connections. Everything handed out here
//! ([`PeripheralInfo`], [`ServiceDescriptor`], [`CharacteristicDescriptor`])
//! is a plain value that names a remote object by identifier.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;

#[cfg(feature = "ble")]
pub mod btle;
pub mod mock;

#[cfg(feature = "ble")]
pub use btle::BtlePort;
pub use mock::MockPort;

/// Convenience alias for port results
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================================================
// DESCRIPTORS
// ============================================================================

/// Opaque, platform-assigned peripheral identifier
///
/// A MAC address on Linux, a UUID on macOS.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeripheralId(pub String);

impl PeripheralId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Link state of a peripheral as reported by the port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

/// A discovered (or already connected) peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralInfo {
    pub id: PeripheralId,
    /// Advertised local name, empty when the device does not advertise one
    pub name: String,
    pub state: ConnectionState,
}

impl PeripheralInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: ConnectionState) -> Self {
        Self {
            id: PeripheralId::new(id),
            name: name.into(),
            state,
        }
    }

    /// Name for messages; falls back to "N/A" for unnamed devices.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "N/A"
        } else {
            &self.name
        }
    }
}

/// A GATT service on the connected peripheral
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
}

impl ServiceDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Operations a characteristic supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub can_read: bool,
    pub can_write: bool,
    pub can_notify: bool,
}

impl Capabilities {
    pub const READ: Self = Self {
        can_read: true,
        can_write: false,
        can_notify: false,
    };

    pub const WRITE: Self = Self {
        can_read: false,
        can_write: true,
        can_notify: false,
    };

    pub const NOTIFY: Self = Self {
        can_read: false,
        can_write: false,
        can_notify: true,
    };
}

/// A GATT characteristic within a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicDescriptor {
    pub id: String,
    pub service_id: String,
    pub name: String,
    pub capabilities: Capabilities,
}

impl CharacteristicDescriptor {
    pub fn new(
        id: impl Into<String>,
        service_id: impl Into<String>,
        name: impl Into<String>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            id: id.into(),
            service_id: service_id.into(),
            name: name.into(),
            capabilities,
        }
    }

    pub fn can_write(&self) -> bool {
        self.capabilities.can_write
    }
}

/// Options for [`BlePort::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Let the platform reconnect automatically after a drop
    pub auto_reconnect: bool,
    /// Re-run service discovery instead of using a cached GATT table
    pub force_refresh_services: bool,
}

impl ConnectOptions {
    /// Options used for every print connection.
    pub const PRINT: Self = Self {
        auto_reconnect: false,
        force_refresh_services: true,
    };
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::PRINT
    }
}

// ============================================================================
// PORT
// ============================================================================

/// Bluetooth LE central capabilities consumed by the
/// [`ConnectionManager`](crate::manager::ConnectionManager).
///
/// Implementations perform each call as a single platform operation. No
/// retries, no chunking of writes.
#[async_trait]
pub trait BlePort: Send + Sync {
    /// Start scanning. Discovered peripherals are sent on `events` until
    /// the scan stops or the receiver is dropped.
    async fn start_scan(&self, events: mpsc::UnboundedSender<PeripheralInfo>) -> Result<()>;

    /// Stop an active scan. Stopping an idle port is not an error.
    async fn stop_scan(&self) -> Result<()>;

    /// Whether a scan is in progress
    async fn is_scanning(&self) -> bool;

    /// Peripherals the platform already holds a connection to
    async fn connected_peripherals(&self) -> Result<Vec<PeripheralInfo>>;

    /// Current link state of `id`
    async fn connection_state(&self, id: &PeripheralId) -> ConnectionState;

    async fn connect(&self, id: &PeripheralId, options: ConnectOptions) -> Result<()>;

    async fn disconnect(&self, id: &PeripheralId) -> Result<()>;

    /// Services in the order the platform reports them
    async fn list_services(&self, id: &PeripheralId) -> Result<Vec<ServiceDescriptor>>;

    /// Characteristics of `service` in the order the platform reports them
    async fn list_characteristics(
        &self,
        id: &PeripheralId,
        service: &ServiceDescriptor,
    ) -> Result<Vec<CharacteristicDescriptor>>;

    /// One GATT write of `data`
    async fn write_characteristic(
        &self,
        id: &PeripheralId,
        characteristic: &CharacteristicDescriptor,
        data: &[u8],
    ) -> Result<()>;
}
