//! # Text Line Encoding
//!
//! Turns a line of text plus an alignment into the bytes the printer
//! expects for one printed line.
//!
//! ## Line Layout
//!
//! ```text
//! +----------+---------------------+----+
//! | ESC a n  | UTF-8 text bytes    | LF |
//! | 3 bytes  | verbatim            | 1  |
//! +----------+---------------------+----+
//! ```
//!
//! Text is not escaped or wrapped. Callers pre-format fixed-width columns.
//!
//! ## Text Alignment
//!
//! ```text
//! Left aligned (default)    |LEFT TEXT
//! Center aligned            |  CENTER TEXT
//! Right aligned             |      RIGHT TEXT
//! ```

use serde::{Deserialize, Serialize};

use super::commands::{self, ESC, LF};

// ============================================================================
// TEXT ALIGNMENT
// ============================================================================

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

/// # Set Text Alignment (ESC a n)
///
/// Sets the alignment for subsequent text lines.
///
/// ## Protocol Details
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | ESC a n  |
/// | Hex     | 1B 61 n  |
/// | Decimal | 27 97 n  |
///
/// ## Parameters
///
/// - `n = 0`: Left alignment (default)
/// - `n = 1`: Center alignment
/// - `n = 2`: Right alignment
///
/// ## Example
///
/// ```
/// use estampa::protocol::text::{align, Alignment};
///
/// let center = align(Alignment::Center);
/// assert_eq!(center, [0x1B, 0x61, 0x01]);
/// ```
pub fn align(alignment: Alignment) -> [u8; 3] {
    [ESC, b'a', alignment as u8]
}

// ============================================================================
// LINE ENCODING
// ============================================================================

/// # Encode One Line
///
/// Alignment prefix, the UTF-8 bytes of `text`, then a single LF.
///
/// The output is always `3 + text.len() + 1` bytes long. Total and pure:
/// any `&str` is valid input.
///
/// ## Example
///
/// ```
/// use estampa::protocol::text::{encode, Alignment};
///
/// let line = encode("25.00", Alignment::Right);
/// assert_eq!(&line[..3], &[0x1B, 0x61, 0x02]);
/// assert_eq!(&line[3..8], b"25.00");
/// assert_eq!(line[8], 0x0A);
/// ```
pub fn encode(text: &str, alignment: Alignment) -> Vec<u8> {
    let mut out = Vec::with_capacity(3 + text.len() + 1);
    out.extend_from_slice(&align(alignment));
    out.extend_from_slice(text.as_bytes());
    out.push(LF);
    out
}

/// # Encode the Banner Line
///
/// The banner print mode (`ESC ! 0x40`) followed by the centered line.
///
/// ## Example
///
/// ```
/// use estampa::protocol::text::encode_header;
///
/// let banner = encode_header("SHOP");
/// assert_eq!(&banner[..6], &[0x1B, 0x21, 0x40, 0x1B, 0x61, 0x01]);
/// ```
pub fn encode_header(text: &str) -> Vec<u8> {
    let mut out = commands::emphasis();
    out.extend(encode(text, Alignment::Center));
    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align() {
        assert_eq!(align(Alignment::Left), [0x1B, 0x61, 0x00]);
        assert_eq!(align(Alignment::Center), [0x1B, 0x61, 0x01]);
        assert_eq!(align(Alignment::Right), [0x1B, 0x61, 0x02]);
    }

    #[test]
    fn test_encode_length_and_prefix() {
        let samples = [
            "",
            "TOTAL 25.00",
            "Kelpie Solutions",
            "ñandú café",
            "日本語のレシート",
            "line with\ttab",
        ];
        for text in samples {
            for alignment in [Alignment::Left, Alignment::Center, Alignment::Right] {
                let out = encode(text, alignment);
                assert_eq!(out.len(), 3 + text.len() + 1, "length for {:?}", text);
                assert_eq!(&out[..3], &align(alignment));
                assert_eq!(*out.last().unwrap(), LF);
            }
        }
    }

    #[test]
    fn test_encode_is_verbatim() {
        // No escaping, even for bytes that look like commands
        let text = "\u{1b}a\u{0}";
        let out = encode(text, Alignment::Left);
        assert_eq!(&out[3..6], text.as_bytes());
    }

    #[test]
    fn test_encode_header() {
        let out = encode_header("Kelpie Solutions");
        assert_eq!(&out[..3], &[0x1B, 0x21, 0x40]);
        assert_eq!(&out[3..], encode("Kelpie Solutions", Alignment::Center).as_slice());
    }

    #[test]
    fn test_alignment_default_is_left() {
        assert_eq!(Alignment::default(), Alignment::Left);
    }

    #[test]
    fn test_alignment_deserializes_lowercase() {
        let a: Alignment = serde_json::from_str("\"right\"").unwrap();
        assert_eq!(a, Alignment::Right);
    }
}
