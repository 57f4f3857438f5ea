//! # Session Configuration
//!
//! Tunables for one [`ConnectionManager`](crate::manager::ConnectionManager).
//!
//! ## Usage
//!
//! ```
//! use std::time::Duration;
//! use estampa::config::SessionConfig;
//!
//! let config = SessionConfig::default()
//!     .with_connect_timeout(Duration::from_secs(5))
//!     .with_permission(true);
//! assert!(config.permission_granted);
//! ```

use std::time::Duration;

/// Default bound on a single connection attempt
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default scan window used by the command-line host
pub const DEFAULT_SCAN_WINDOW: Duration = Duration::from_secs(5);

/// Largest write payload for the default ATT MTU (23 - 3 header bytes)
pub const DEFAULT_ATT_PAYLOAD: usize = 20;

/// # Session Configuration
///
/// ## Fields
///
/// - **connect_timeout**: how long `connect` may take before it is reported
///   as a connection failure
/// - **scan_window**: how long a host should let a scan run before reading
///   the device list
/// - **max_write_len**: expected largest single write. Chunks above it are
///   logged as a warning and still sent whole; writes are never split.
/// - **permission_granted**: the host's Bluetooth/location permission gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub connect_timeout: Duration,
    pub scan_window: Duration,
    pub max_write_len: Option<usize>,
    pub permission_granted: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            scan_window: DEFAULT_SCAN_WINDOW,
            max_write_len: None,
            permission_granted: false,
        }
    }
}

impl SessionConfig {
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_scan_window(mut self, window: Duration) -> Self {
        self.scan_window = window;
        self
    }

    pub fn with_max_write_len(mut self, len: usize) -> Self {
        self.max_write_len = Some(len);
        self
    }

    pub fn with_permission(mut self, granted: bool) -> Self {
        self.permission_granted = granted;
        self
    }

    /// Whether a chunk of `len` bytes exceeds the configured write size.
    pub fn exceeds_write_len(&self, len: usize) -> bool {
        self.max_write_len.is_some_and(|max| len > max)
    }
}
