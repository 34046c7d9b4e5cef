//! Schema-less tag/length/value codec for the charger firmware
//!
//! The firmware speaks a restricted subset of the protobuf wire format:
//! varints, little-endian 64-bit doubles, length-delimited blobs and
//! little-endian 32-bit floats. There is no schema, so decoding produces a
//! field-number keyed map of typed values. Group markers (wire types 3 and 4)
//! and undefined wire types are rejected instead of skipped, since guessing
//! their length would desynchronize the rest of the frame.

pub mod varint;

use crate::error::{ChargerError, Result};
use std::collections::HashMap;

pub use varint::{decode_varint, encode_varint, read_varint};

/// Wire type of a varint field
pub const WIRE_VARINT: u8 = 0;
/// Wire type of a 64-bit field (always a double in this protocol)
pub const WIRE_FIXED64: u8 = 1;
/// Wire type of a length-delimited field (text, bytes, embedded message)
pub const WIRE_LEN: u8 = 2;
/// Wire type of a 32-bit float field
pub const WIRE_FIXED32: u8 = 5;

/// A single decoded field value
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    /// Wire type 0
    UnsignedInt(u64),
    /// Wire type 1
    Float64(f64),
    /// Wire type 5
    Float32(f32),
    /// Wire type 2 payload that is valid UTF-8
    Text(String),
    /// Wire type 2 payload that is not valid UTF-8
    Bytes(Vec<u8>),
}

impl WireValue {
    /// Numeric view of the value; `None` for text and raw bytes
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WireValue::UnsignedInt(v) => Some(*v as f64),
            WireValue::Float64(v) => Some(*v),
            WireValue::Float32(v) => Some(f64::from(*v)),
            WireValue::Text(_) | WireValue::Bytes(_) => None,
        }
    }

    /// Integer view of the value. Varints are reinterpreted as two's
    /// complement so a sign-extended `-1` comes back as `-1`; floats are
    /// truncated toward zero.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            WireValue::UnsignedInt(v) => Some(*v as i64),
            WireValue::Float64(v) => Some(*v as i64),
            WireValue::Float32(v) => Some(*v as i64),
            WireValue::Text(_) | WireValue::Bytes(_) => None,
        }
    }

    /// Text view; only for payloads that decoded as UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            WireValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Raw bytes of a length-delimited payload, whichever way it decoded
    pub fn as_payload(&self) -> Option<&[u8]> {
        match self {
            WireValue::Text(s) => Some(s.as_bytes()),
            WireValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

/// Field-number keyed result of decoding one message.
///
/// A field number seen more than once keeps its last value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedMessage {
    fields: HashMap<u32, WireValue>,
    truncated: bool,
}

impl DecodedMessage {
    /// Create an empty message
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any earlier occurrence
    pub fn insert(&mut self, field: u32, value: WireValue) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: u32) -> Option<&WireValue> {
        self.fields.get(&field)
    }

    pub fn contains(&self, field: u32) -> bool {
        self.fields.contains_key(&field)
    }

    /// Whether any of the given field numbers is present
    pub fn contains_any(&self, fields: &[u32]) -> bool {
        fields.iter().any(|f| self.contains(*f))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether decoding stopped early because the buffer ended inside a field
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Field numbers present, sorted ascending
    pub fn field_numbers(&self) -> Vec<u32> {
        let mut keys: Vec<u32> = self.fields.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Numeric field or `default` when missing or non-numeric
    pub fn f64_or(&self, field: u32, default: f64) -> f64 {
        self.get(field).and_then(WireValue::as_f64).unwrap_or(default)
    }

    /// Integer field or `default` when missing or non-numeric
    pub fn i64_or(&self, field: u32, default: i64) -> i64 {
        self.get(field).and_then(WireValue::as_i64).unwrap_or(default)
    }

    /// Text field, if present and UTF-8
    pub fn text(&self, field: u32) -> Option<&str> {
        self.get(field).and_then(WireValue::as_str)
    }
}

/// Build a field tag: `(field_number << 3) | wire_type`
pub fn make_tag(field: u32, wire_type: u8) -> u64 {
    (u64::from(field) << 3) | u64::from(wire_type & 0x07)
}

/// Split a tag into `(field_number, wire_type)`
pub fn split_tag(tag: u64) -> (u64, u8) {
    (tag >> 3, (tag & 0x07) as u8)
}

fn encode_header(field: u32, wire_type: u8) -> Vec<u8> {
    encode_varint(make_tag(field, wire_type))
}

/// Encode a varint field
pub fn encode_varint_field(field: u32, value: u64) -> Vec<u8> {
    let mut out = encode_header(field, WIRE_VARINT);
    out.extend(encode_varint(value));
    out
}

/// Encode a 64-bit double field
pub fn encode_double(field: u32, value: f64) -> Vec<u8> {
    let mut out = encode_header(field, WIRE_FIXED64);
    out.extend_from_slice(&value.to_le_bytes());
    out
}

/// Encode a 32-bit float field
pub fn encode_float(field: u32, value: f32) -> Vec<u8> {
    let mut out = encode_header(field, WIRE_FIXED32);
    out.extend_from_slice(&value.to_le_bytes());
    out
}

/// Encode a UTF-8 string field
pub fn encode_string(field: u32, value: &str) -> Vec<u8> {
    encode_embedded_message(field, value.as_bytes())
}

/// Encode an already-encoded message (or any blob) as a length-delimited field
pub fn encode_embedded_message(field: u32, data: &[u8]) -> Vec<u8> {
    let mut out = encode_header(field, WIRE_LEN);
    out.extend(encode_varint(data.len() as u64));
    out.extend_from_slice(data);
    out
}

/// Decode a message into a field map.
///
/// A buffer that ends inside a field (tag, varint, fixed-width value, or a
/// length-delimited payload shorter than its declared length) stops decoding
/// without error; fields read so far are kept and the message is flagged as
/// truncated. Unsupported wire types and field number zero fail with a
/// communication error.
pub fn decode_message(buf: &[u8]) -> Result<DecodedMessage> {
    let mut msg = DecodedMessage::new();
    let mut offset = 0usize;

    while offset < buf.len() {
        let tag_offset = offset;
        let Some((tag, next)) = read_varint(buf, offset) else {
            msg.truncated = true;
            break;
        };
        offset = next;

        let (field_number, wire_type) = split_tag(tag);
        let field = match u32::try_from(field_number) {
            Ok(0) | Err(_) => {
                return Err(ChargerError::communication(format!(
                    "invalid field number {} at offset {}",
                    field_number, tag_offset
                )));
            }
            Ok(f) => f,
        };

        let value = match wire_type {
            WIRE_VARINT => read_varint(buf, offset).map(|(v, next)| {
                offset = next;
                WireValue::UnsignedInt(v)
            }),
            WIRE_FIXED64 => take(buf, &mut offset, 8).map(|b| {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(b);
                WireValue::Float64(f64::from_le_bytes(raw))
            }),
            WIRE_LEN => read_varint(buf, offset).and_then(|(len, next)| {
                offset = next;
                let len = usize::try_from(len).ok()?;
                take(buf, &mut offset, len).map(|b| match std::str::from_utf8(b) {
                    Ok(s) => WireValue::Text(s.to_string()),
                    Err(_) => WireValue::Bytes(b.to_vec()),
                })
            }),
            WIRE_FIXED32 => take(buf, &mut offset, 4).map(|b| {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(b);
                WireValue::Float32(f32::from_le_bytes(raw))
            }),
            other => {
                return Err(ChargerError::communication(format!(
                    "unsupported wire type {} for field {} at offset {}",
                    other, field, tag_offset
                )));
            }
        };

        match value {
            Some(v) => msg.insert(field, v),
            None => {
                msg.truncated = true;
                break;
            }
        }
    }

    Ok(msg)
}

/// Take `len` bytes at `offset`, advancing it; `None` if fewer remain
fn take<'a>(buf: &'a [u8], offset: &mut usize, len: usize) -> Option<&'a [u8]> {
    let end = offset.checked_add(len)?;
    let slice = buf.get(*offset..end)?;
    *offset = end;
    Some(slice)
}
