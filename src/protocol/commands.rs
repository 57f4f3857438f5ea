//! # ESC/POS Control Commands
//!
//! This module implements the small subset of the ESC/POS command set used
//! to lay out a text receipt: line feeds, blank-line runs, the banner print
//! mode and the dashed separator rule.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`
//! - Multi-byte with parameter: `ESC a n`, `ESC ! n`
//!
//! Everything that is not a command is sent as literal text. The printer
//! has no framing: no length prefix, no checksum and no acknowledgement.

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
///
/// Every control sequence written by this crate begins with ESC (0x1B).
pub const ESC: u8 = 0x1B;

/// LF (Line Feed) - Print the line buffer and advance one line
pub const LF: u8 = 0x0A;

/// Dash used by the separator rule
pub const DASH: u8 = b'-';

/// Width of the separator rule in characters (58mm paper, Font A)
pub const SEPARATOR_WIDTH: usize = 32;

/// Print mode parameter used for the receipt banner line
pub const BANNER_PRINT_MODE: u8 = 0x40;

// ============================================================================
// PRINT MODE
// ============================================================================

/// # Select Print Mode (ESC ! n)
///
/// Selects the character print mode for the following text.
///
/// ## Protocol Details
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC ! n  |
/// | Hex     | 1B 21 n  |
/// | Decimal | 27 33 n  |
#[inline]
pub fn print_mode(n: u8) -> Vec<u8> {
    vec![ESC, b'!', n]
}

/// # Banner Emphasis (ESC ! 0x40)
///
/// Emitted once, before the centered header line of a receipt.
///
/// ## Example
///
/// ```
/// use estampa::protocol::commands;
///
/// assert_eq!(commands::emphasis(), vec![0x1B, 0x21, 0x40]);
/// ```
#[inline]
pub fn emphasis() -> Vec<u8> {
    print_mode(BANNER_PRINT_MODE)
}

// ============================================================================
// PAPER FEED
// ============================================================================

/// # Line Feed (LF)
///
/// Prints any pending text and advances the paper by one line.
#[inline]
pub fn line_feed() -> Vec<u8> {
    vec![LF]
}

/// Feed `n` blank lines (n consecutive LF bytes)
///
/// ## Example
///
/// ```
/// use estampa::protocol::commands;
///
/// assert_eq!(commands::feed_lines(3), vec![0x0A, 0x0A, 0x0A]);
/// ```
#[inline]
pub fn feed_lines(n: usize) -> Vec<u8> {
    vec![LF; n]
}

/// # Separator Rule
///
/// A literal run of [`SEPARATOR_WIDTH`] dashes followed by a line feed.
/// The rule is not alignment-prefixed; it inherits whatever alignment the
/// printer is in, which is irrelevant for a full-width line.
///
/// ```text
/// --------------------------------
/// ```
pub fn separator() -> Vec<u8> {
    let mut out = vec![DASH; SEPARATOR_WIDTH];
    out.push(LF);
    out
}

// ============================================================================
// TESTS
// ============================================================================
