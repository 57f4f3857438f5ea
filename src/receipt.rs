//! # Receipt Composer
//!
//! Builds a [`ReceiptDocument`]: the ordered list of writes that make up one
//! printed receipt.
//!
//! ## Layout
//!
//! ```text
//!         KELPIE SOLUTIONS          <- banner (ESC ! 0x40, centered)
//! --------------------------------
//!              2026-10-19 10:42:00  <- timestamp, right
//! --------------------------------
//!
//!
//!
//! ACME LTD                          <- customer, left
//! 20-12345678-9                     <- tax id, left
//! --------------------------------
//!
//!
//! QTY DESCRIPTION   PRICE   TOTAL   <- column header, left
//! 0.73 REGGULAR AS 34.19    25.00   <- one line per item
//! --------------------------------
//!                      TOTAL 25.00  <- total, right
//!
//!
//!
//!            TAX 4.34               <- tax line, centered
//!
//!
//!
//!          AUTHORIZATION            <- centered
//!      3f2b...-...-...-...          <- token, centered
//! --------------------------------
//!
//!
//! ```
//!
//! Each line above is one chunk, and each chunk becomes exactly one GATT
//! write. Blank-line runs are a single chunk of consecutive LFs. The banner
//! is two chunks: the print-mode command, then the centered text.
//!
//! Composition is pure. The authorization token and timestamp come from the
//! caller so identical fields always produce identical bytes.

use serde::{Deserialize, Serialize};

use crate::protocol::commands;
use crate::protocol::text::{self, Alignment};

// ============================================================================
// DOCUMENT MODEL
// ============================================================================

/// How a chunk's bytes were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    /// Raw control bytes or literal rule, no alignment prefix
    PlainBytes,
    /// One line of text with an alignment prefix and trailing LF
    Text(Alignment),
}

/// One write's worth of printer bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintChunk {
    kind: ChunkKind,
    bytes: Vec<u8>,
}

impl PrintChunk {
    /// Raw bytes, written as-is.
    pub fn plain(bytes: Vec<u8>) -> Self {
        Self {
            kind: ChunkKind::PlainBytes,
            bytes,
        }
    }

    /// A text line, encoded with [`text::encode`].
    pub fn text(line: &str, alignment: Alignment) -> Self {
        Self {
            kind: ChunkKind::Text(alignment),
            bytes: text::encode(line, alignment),
        }
    }

    pub fn kind(&self) -> ChunkKind {
        self.kind
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// An immutable, ordered sequence of chunks
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReceiptDocument {
    chunks: Vec<PrintChunk>,
}

impl ReceiptDocument {
    pub fn new(chunks: Vec<PrintChunk>) -> Self {
        Self { chunks }
    }

    pub fn chunks(&self) -> &[PrintChunk] {
        &self.chunks
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PrintChunk> {
        self.chunks.iter()
    }

    /// Number of chunks (= number of writes)
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Total bytes across all chunks
    pub fn byte_len(&self) -> usize {
        self.chunks.iter().map(PrintChunk::len).sum()
    }

    /// All chunks concatenated in order, as they reach the printer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        for chunk in &self.chunks {
            out.extend_from_slice(chunk.bytes());
        }
        out
    }
}

impl<'a> IntoIterator for &'a ReceiptDocument {
    type Item = &'a PrintChunk;
    type IntoIter = std::slice::Iter<'a, PrintChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.chunks.iter()
    }
}

// ============================================================================
// RECEIPT FIELDS
// ============================================================================

fn default_column_header() -> String {
    "QTY DESCRIPTION   PRICE   TOTAL".to_string()
}

fn default_total_label() -> String {
    "TOTAL".to_string()
}

fn default_tax_label() -> String {
    "TAX".to_string()
}

fn default_authorization_label() -> String {
    "AUTHORIZATION".to_string()
}

/// A purchased line. Amounts are pre-formatted by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub quantity: String,
    pub description: String,
    pub unit_price: String,
    pub line_total: String,
}

impl LineItem {
    pub fn new(
        quantity: impl Into<String>,
        description: impl Into<String>,
        unit_price: impl Into<String>,
        line_total: impl Into<String>,
    ) -> Self {
        Self {
            quantity: quantity.into(),
            description: description.into(),
            unit_price: unit_price.into(),
            line_total: line_total.into(),
        }
    }

    /// Render as a single fixed-column line.
    ///
    /// The line total is right-aligned in an 8-column field.
    pub fn render(&self) -> String {
        format!(
            "{} {} {} {:>8}",
            self.quantity, self.description, self.unit_price, self.line_total
        )
    }
}

/// Everything that varies from one receipt to the next.
///
/// Deserializes from JSON; labels fall back to English defaults.
///
/// ```json
/// {
///   "header": "Kelpie Solutions",
///   "timestamp": "2026-10-19 10:42:00",
///   "customer_name": "ACME LTD",
///   "tax_id": "20-12345678-9",
///   "items": [
///     { "quantity": "0.73", "description": "REGGULAR AS",
///       "unit_price": "34.19", "line_total": "25.00" }
///   ],
///   "total": "25.00",
///   "tax_amount": "4.34",
///   "authorization_token": "3f2b0c1e-..."
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptFields {
    pub header: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub tax_id: String,
    #[serde(default = "default_column_header")]
    pub column_header: String,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default = "default_total_label")]
    pub total_label: String,
    pub total: String,
    #[serde(default = "default_tax_label")]
    pub tax_label: String,
    #[serde(default)]
    pub tax_amount: String,
    #[serde(default = "default_authorization_label")]
    pub authorization_label: String,
    #[serde(default)]
    pub authorization_token: String,
}

impl ReceiptFields {
    /// Fields with the given header and total, every other field empty or default.
    pub fn new(header: impl Into<String>, total: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            timestamp: String::new(),
            customer_name: String::new(),
            tax_id: String::new(),
            column_header: default_column_header(),
            items: Vec::new(),
            total_label: default_total_label(),
            total: total.into(),
            tax_label: default_tax_label(),
            tax_amount: String::new(),
            authorization_label: default_authorization_label(),
            authorization_token: String::new(),
        }
    }

    /// Parse fields from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// `"{total_label} {total}"`
    pub fn total_line(&self) -> String {
        format!("{} {}", self.total_label, self.total)
    }

    /// `"{tax_label} {tax_amount}"`
    pub fn tax_line(&self) -> String {
        format!("{} {}", self.tax_label, self.tax_amount)
    }
}

// ============================================================================
// COMPOSITION
// ============================================================================

/// Build the receipt for `fields`.
///
/// Chunk order is fixed; only the number of item lines varies. With one
/// item the document has 21 chunks.
pub fn compose(fields: &ReceiptFields) -> ReceiptDocument {
    let mut chunks = Vec::with_capacity(20 + fields.items.len());

    // Banner
    chunks.push(PrintChunk::plain(commands::emphasis()));
    chunks.push(PrintChunk::text(&fields.header, Alignment::Center));
    chunks.push(separator());

    chunks.push(PrintChunk::text(&fields.timestamp, Alignment::Right));
    chunks.push(separator());
    chunks.push(blank_lines(3));

    // Customer
    chunks.push(PrintChunk::text(&fields.customer_name, Alignment::Left));
    chunks.push(PrintChunk::text(&fields.tax_id, Alignment::Left));
    chunks.push(separator());
    chunks.push(blank_lines(2));

    // Items
    chunks.push(PrintChunk::text(&fields.column_header, Alignment::Left));
    for item in &fields.items {
        chunks.push(PrintChunk::text(&item.render(), Alignment::Left));
    }
    chunks.push(separator());

    // Totals
    chunks.push(PrintChunk::text(&fields.total_line(), Alignment::Right));
    chunks.push(blank_lines(3));
    chunks.push(PrintChunk::text(&fields.tax_line(), Alignment::Center));
    chunks.push(blank_lines(3));

    // Authorization
    chunks.push(PrintChunk::text(&fields.authorization_label, Alignment::Center));
    chunks.push(PrintChunk::text(&fields.authorization_token, Alignment::Center));
    chunks.push(separator());
    chunks.push(blank_lines(2));

    ReceiptDocument::new(chunks)
}

fn separator() -> PrintChunk {
    PrintChunk::plain(commands::separator())
}

fn blank_lines(n: usize) -> PrintChunk {
    PrintChunk::plain(commands::feed_lines(n))
}

// ============================================================================
// SAMPLE
// ============================================================================

/// Sample fields used by `estampa preview` when no file is given.
pub fn demo_fields() -> ReceiptFields {
    ReceiptFields {
        timestamp: "2026-10-19 10:42:00".to_string(),
        customer_name: "ACME LTD".to_string(),
        tax_id: "20-12345678-9".to_string(),
        items: vec![LineItem::new("0.73", "REGGULAR AS", "34.19", "25.00")],
        tax_amount: "4.34".to_string(),
        authorization_token: "00000000-0000-0000-0000-000000000000".to_string(),
        ..ReceiptFields::new("Kelpie Solutions", "25.00")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_item_render() {
        let item = LineItem::new("0.73", "REGGULAR AS", "34.19", "25.00");
        assert_eq!(item.render(), "0.73 REGGULAR AS 34.19    25.00");
    }

    #[test]
    fn test_demo_receipt_chunk_count() {
        let doc = compose(&demo_fields());
        assert_eq!(doc.len(), 21);
    }

    #[test]
    fn test_chunk_count_grows_with_items() {
        let mut fields = demo_fields();
        fields.items.push(LineItem::new("1", "WIDGET", "2.00", "2.00"));
        fields.items.push(LineItem::new("2", "GADGET", "1.50", "3.00"));
        assert_eq!(compose(&fields).len(), 23);

        fields.items.clear();
        assert_eq!(compose(&fields).len(), 20);
    }

    #[test]
    fn test_compose_is_deterministic() {
        let fields = demo_fields();
        let a = compose(&fields);
        let b = compose(&fields);
        assert_eq!(a, b);
        assert_eq!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_banner_matches_header_encoding() {
        let doc = compose(&demo_fields());
        let mut banner = doc.chunks()[0].bytes().to_vec();
        banner.extend_from_slice(doc.chunks()[1].bytes());
        assert_eq!(banner, text::encode_header("Kelpie Solutions"));
        assert_eq!(doc.chunks()[0].kind(), ChunkKind::PlainBytes);
        assert_eq!(doc.chunks()[1].kind(), ChunkKind::Text(Alignment::Center));
    }

    #[test]
    fn test_fixed_order() {
        let doc = compose(&demo_fields());
        let kinds: Vec<ChunkKind> = doc.iter().map(PrintChunk::kind).collect();

        use Alignment::*;
        use ChunkKind::*;
        assert_eq!(
            kinds,
            vec![
                PlainBytes,   // emphasis
                Text(Center), // header
                PlainBytes,   // separator
                Text(Right),  // timestamp
                PlainBytes,   // separator
                PlainBytes,   // 3 blank lines
                Text(Left),   // customer
                Text(Left),   // tax id
                PlainBytes,   // separator
                PlainBytes,   // 2 blank lines
                Text(Left),   // column header
                Text(Left),   // item
                PlainBytes,   // separator
                Text(Right),  // total
                PlainBytes,   // 3 blank lines
                Text(Center), // tax
                PlainBytes,   // 3 blank lines
                Text(Center), // authorization label
                Text(Center), // token
                PlainBytes,   // separator
                PlainBytes,   // 2 blank lines
            ]
        );
    }

    #[test]
    fn test_total_chunk() {
        let doc = compose(&demo_fields());
        let total = &doc.chunks()[13];
        assert_eq!(&total.bytes()[..3], &[0x1B, 0x61, 0x02]);
        assert_eq!(&total.bytes()[3..], b"TOTAL 25.00\n");
    }

    #[test]
    fn test_blank_line_runs() {
        let doc = compose(&demo_fields());
        assert_eq!(doc.chunks()[5].bytes(), &[0x0A, 0x0A, 0x0A]);
        assert_eq!(doc.chunks()[9].bytes(), &[0x0A, 0x0A]);
        assert_eq!(doc.chunks()[20].bytes(), &[0x0A, 0x0A]);
    }

    #[test]
    fn test_to_bytes_concatenates_in_order() {
        let doc = compose(&demo_fields());
        let bytes = doc.to_bytes();
        assert_eq!(bytes.len(), doc.byte_len());
        assert_eq!(&bytes[..3], &[0x1B, 0x21, 0x40]);
        assert!(bytes.ends_with(&[b'-', 0x0A, 0x0A, 0x0A]));
    }

    #[test]
    fn test_fields_from_json_uses_label_defaults() {
        let json = r#"{
            "header": "Kelpie Solutions",
            "total": "25.00",
            "items": [
                { "quantity": "0.73", "description": "REGGULAR AS",
                  "unit_price": "34.19", "line_total": "25.00" }
            ]
        }"#;
        let fields = ReceiptFields::from_json(json).unwrap();
        assert_eq!(fields.total_label, "TOTAL");
        assert_eq!(fields.authorization_label, "AUTHORIZATION");
        assert_eq!(fields.items.len(), 1);
        assert_eq!(compose(&fields).len(), 21);
    }

    #[test]
    fn test_fields_from_json_requires_header() {
        assert!(ReceiptFields::from_json(r#"{ "total": "1.00" }"#).is_err());
    }
}
