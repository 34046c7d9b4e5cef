//! Unsigned base-128 variable-length integers
//!
//! Seven payload bits per byte, least significant group first, with the
//! continuation bit (0x80) set on every byte except the last.

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Encode a non-negative integer as a varint
pub fn encode_varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    while value > u64::from(PAYLOAD_MASK) {
        out.push((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    out.push(value as u8);
    out
}

/// Decode a varint starting at `offset`, returning `(value, next_offset)`.
///
/// Decoding is permissive: when the buffer ends before a terminating byte the
/// bits accumulated so far are returned and `next_offset` equals the buffer
/// length. Use [`read_varint`] when an incomplete varint must be detected.
pub fn decode_varint(buf: &[u8], offset: usize) -> (u64, usize) {
    let (value, next, _) = scan(buf, offset);
    (value, next)
}

/// Strict variant of [`decode_varint`]: `None` when the buffer ends mid-varint.
pub fn read_varint(buf: &[u8], offset: usize) -> Option<(u64, usize)> {
    match scan(buf, offset) {
        (value, next, true) => Some((value, next)),
        (_, _, false) => None,
    }
}

fn scan(buf: &[u8], offset: usize) -> (u64, usize, bool) {
    let mut value = 0u64;
    let mut shift = 0u32;
    let mut pos = offset;

    while let Some(&byte) = buf.get(pos) {
        pos += 1;
        // Groups past the 64th bit are dropped
        if shift < 64 {
            value |= u64::from(byte & PAYLOAD_MASK) << shift;
        }
        if byte & CONTINUATION == 0 {
            return (value, pos, true);
        }
        shift = shift.saturating_add(7);
    }

    (value, pos, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_known_values() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(1), vec![0x01]);
        assert_eq!(encode_varint(127), vec![0x7F]);
        assert_eq!(encode_varint(128), vec![0x80, 0x01]);
        assert_eq!(encode_varint(300), vec![0xAC, 0x02]);
        assert_eq!(encode_varint(16384), vec![0x80, 0x80, 0x01]);
    }

    #[test]
    fn test_decode_consumes_exact_length() {
        for v in [0u64, 1, 127, 128, 300, 16384, u64::from(u32::MAX)] {
            let bytes = encode_varint(v);
            assert_eq!(decode_varint(&bytes, 0), (v, bytes.len()));
        }
    }

    #[test]
    fn test_decode_from_offset() {
        let buf = [0xFF, 0xAC, 0x02, 0x05];
        assert_eq!(decode_varint(&buf, 1), (300, 3));
        assert_eq!(decode_varint(&buf, 3), (5, 4));
    }

    #[test]
    fn test_truncated_varint_is_permissive_but_detectable() {
        let buf = [0xAC];
        assert_eq!(decode_varint(&buf, 0), (0x2C, 1));
        assert_eq!(read_varint(&buf, 0), None);
        assert_eq!(read_varint(&[], 0), None);
    }

    #[test]
    fn test_max_u64_round_trip() {
        let bytes = encode_varint(u64::MAX);
        assert_eq!(bytes.len(), 10);
        assert_eq!(read_varint(&bytes, 0), Some((u64::MAX, 10)));
    }
}
