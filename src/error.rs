//! # Error Types
//!
//! This module defines error types used throughout the estampa library.
//!
//! ## Layers
//!
//! - [`TransportError`]: raised by a [`BlePort`](crate::transport::BlePort)
//!   implementation (radio, adapter, GATT failures)
//! - [`PrintError`]: the single discriminated result of a
//!   [`ConnectionManager`](crate::manager::ConnectionManager) operation
//! - [`EstampaError`]: top-level error for the command-line host

use thiserror::Error;

/// Failure reported by a BLE transport port.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Outcome of a failed scan, connection or print attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
    /// The host has not granted Bluetooth/location permission
    #[error("Bluetooth permission has not been granted")]
    PermissionDenied,

    /// The BLE adapter is missing or refused the request
    #[error("Bluetooth adapter unavailable: {0}")]
    AdapterUnavailable(TransportError),

    /// Connecting to the named device failed or timed out
    #[error("Error connecting to BLE device: {device} ({cause})")]
    ConnectionFailed { device: String, cause: TransportError },

    /// Listing services or characteristics failed
    #[error("Service discovery failed: {0}")]
    ServiceDiscoveryFailed(TransportError),

    /// No characteristic on the device accepts writes
    #[error("No writable characteristic found on device")]
    NoWritableCharacteristic,

    /// Writing chunk `chunk_index` (zero-based) failed; remaining chunks were not sent
    #[error("Printing failed at chunk {chunk_index}: {cause}")]
    WriteFailed {
        chunk_index: usize,
        cause: TransportError,
    },

    /// The user disconnected before the print completed
    #[error("Print cancelled")]
    Cancelled,

    /// An operation that needs a connection was called without one
    #[error("No device connected")]
    NotConnected,
}

/// Main error type for the estampa command-line host
#[derive(Debug, Error)]
pub enum EstampaError {
    /// Scan, connection or print failure
    #[error(transparent)]
    Print(#[from] PrintError),

    /// Invalid configuration or arguments
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Receipt fields could not be parsed
    #[error("Invalid receipt fields: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_names_device() {
        let err = PrintError::ConnectionFailed {
            device: "MTP-II".to_string(),
            cause: TransportError::new("timed out"),
        };
        let msg = err.to_string();
        assert!(msg.contains("MTP-II"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn test_write_failed_display() {
        let err = PrintError::WriteFailed {
            chunk_index: 4,
            cause: TransportError::new("gatt error"),
        };
        assert_eq!(err.to_string(), "Printing failed at chunk 4: gatt error");
    }

    #[test]
    fn test_print_error_converts_to_top_level() {
        let err: EstampaError = PrintError::PermissionDenied.into();
        assert!(matches!(err, EstampaError::Print(PrintError::PermissionDenied)));
        assert_eq!(err.to_string(), "Bluetooth permission has not been granted");
    }
}
