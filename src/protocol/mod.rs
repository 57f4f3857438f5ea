//! # ESC/POS Protocol Implementation
//!
//! This module provides the byte builders for the line-printer control
//! protocol spoken by BLE receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Control sequences (print mode, line feeds, separator)
//! - [`text`]: Alignment and single-line text encoding
//!
//! ## Usage Example
//!
//! ```
//! use estampa::protocol::{commands, text::{self, Alignment}};
//!
//! let mut data = Vec::new();
//! data.extend(text::encode_header("RECEIPT"));
//! data.extend(commands::separator());
//! data.extend(text::encode("TOTAL 25.00", Alignment::Right));
//! data.extend(commands::feed_lines(3));
//!
//! // Send `data` to the printer's writable characteristic...
//! ```

pub mod commands;
pub mod text;
