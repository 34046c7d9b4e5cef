//! Identity strings from the vendor device-info blob
//!
//! Some firmware builds send the device-info field as an embedded message
//! whose inner lengths do not match its contents, so it cannot be decoded as
//! a message. The blob still carries the identity strings in a fixed order:
//!
//! ```text
//! ... 0x12 <len> MODEL ... DEVICE_ID ... MANUFACTURER 0x00 0x2A <len> FIRMWARE
//! ```
//!
//! - the model starts two bytes after the first [`MODEL_MARKER`] (marker and
//!   length byte) and ends where the device id occurs;
//! - the bytes after the device id split on [`FIRMWARE_MARKER`] into
//!   manufacturer and firmware.
//!
//! Every piece is cleaned with [`clean_identity`]. A missing marker or a
//! device id that does not occur in the blob leaves the dependent fields
//! empty.

use std::ops::Range;

/// Tag byte of the model sub-field (field 2, length-delimited)
pub const MODEL_MARKER: u8 = 0x12;

/// NUL terminator of the manufacturer followed by the firmware sub-field tag
/// (field 5, length-delimited)
pub const FIRMWARE_MARKER: [u8; 2] = [0x00, 0x2A];

/// Byte ranges of the identity pieces inside a blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobLayout {
    pub model: Option<Range<usize>>,
    pub manufacturer: Option<Range<usize>>,
    pub firmware: Option<Range<usize>>,
}

/// Cleaned identity strings recovered from a blob
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VendorStrings {
    pub model: String,
    pub manufacturer: String,
    pub firmware: String,
}

/// Locate the identity pieces inside `blob`, bounded by `device_id`
pub fn locate(blob: &[u8], device_id: &str) -> BlobLayout {
    let mut layout = BlobLayout::default();

    let id = device_id.as_bytes();
    let Some(id_start) = find(blob, id, 0) else {
        return layout;
    };
    let id_end = id_start + id.len();

    if let Some(marker) = blob[..id_start].iter().position(|b| *b == MODEL_MARKER) {
        let start = (marker + 2).min(id_start);
        layout.model = Some(start..id_start);
    }

    if let Some(split) = find(blob, &FIRMWARE_MARKER, id_end) {
        layout.manufacturer = Some(id_end..split);
        layout.firmware = Some(split + FIRMWARE_MARKER.len()..blob.len());
    }

    layout
}

/// Recover model, manufacturer and firmware from a malformed device-info blob
pub fn parse_vendor_blob(blob: &[u8], device_id: &str) -> VendorStrings {
    if device_id.is_empty() {
        return VendorStrings::default();
    }

    let layout = locate(blob, device_id);
    let piece = |range: Option<Range<usize>>| {
        range
            .and_then(|r| blob.get(r))
            .map(clean_identity)
            .unwrap_or_default()
    };

    VendorStrings {
        model: piece(layout.model),
        manufacturer: piece(layout.manufacturer),
        firmware: piece(layout.firmware),
    }
}

/// Keep printable ASCII, dropping control bytes, quotes and colons
pub fn clean_identity(raw: &[u8]) -> String {
    raw.iter()
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .filter(|b| !matches!(**b, b'"' | b':'))
        .map(|b| char::from(*b))
        .collect::<String>()
        .trim()
        .to_string()
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from > haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}
