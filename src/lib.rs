//! # Estampa - BLE Receipt Printing
//!
//! Estampa prints text receipts on ESC/POS-style thermal printers over a
//! Bluetooth Low Energy GATT link. It provides:
//!
//! - **Protocol implementation**: alignment, banner and line-feed byte builders
//! - **Receipt composition**: a fixed receipt layout from a fields record
//! - **Device registry**: deduplicated list of discovered printers
//! - **Connection manager**: scan, connect, characteristic selection and
//!   ordered chunk writes with disconnect on every exit path
//! - **Transport**: a `BlePort` trait, a btleplug implementation (feature
//!   `ble`) and a scripted port for tests
//!
//! ## Quick Start
//!
//! ```no_run
//! use estampa::{
//!     config::SessionConfig,
//!     manager::ConnectionManager,
//!     receipt::{self, ReceiptFields},
//!     transport::MockPort,
//! };
//!
//! # async fn run() -> Result<(), estampa::error::PrintError> {
//! let port = MockPort::new(); // or transport::BtlePort::new().await? with `ble`
//! let mut manager = ConnectionManager::new(port, SessionConfig::default().with_permission(true));
//!
//! manager.start_scan().await?;
//! let devices = manager.devices().await?;
//!
//! let document = receipt::compose(&ReceiptFields::new("Kelpie Solutions", "25.00"));
//! if let Some(printer) = devices.first() {
//!     let report = manager.print_to(printer, &document).await?;
//!     println!("{} chunks sent to {}", report.chunks_written, report.device);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | ESC/POS byte builders |
//! | [`receipt`] | Receipt fields and composition |
//! | [`registry`] | Discovered device list |
//! | [`manager`] | Scan/connect/print state machine |
//! | [`transport`] | BLE port trait and backends |
//! | [`config`] | Session tunables |
//! | [`error`] | Error types |

pub mod config;
pub mod error;
pub mod manager;
pub mod protocol;
pub mod receipt;
pub mod registry;
pub mod transport;

// Re-exports for convenience
pub use config::SessionConfig;
pub use error::{EstampaError, PrintError};
pub use manager::{ConnectionManager, PrintReport};
pub use receipt::{ReceiptDocument, ReceiptFields};
