use duosida_direct::error::ChargerError;
use duosida_direct::wire::{
    WireValue, decode_message, decode_varint, encode_embedded_message, encode_string,
    encode_varint, encode_varint_field, read_varint,
};

#[test]
fn varint_roundtrip_reports_consumed_length() {
    for v in [0u64, 1, 127, 128, 300, 16384, u64::from(u32::MAX)] {
        let encoded = encode_varint(v);
        assert_eq!(decode_varint(&encoded, 0), (v, encoded.len()), "value {}", v);
    }
}

#[test]
fn varint_decodes_from_offset() {
    let buf = [0xFF, 0xAC, 0x02, 0x01];
    assert_eq!(decode_varint(&buf, 1), (300, 3));
    assert_eq!(read_varint(&buf, 3), Some((1, 4)));
    // continuation bit set on the last byte
    assert_eq!(read_varint(&[0x80, 0x80], 0), None);
}

#[test]
fn tag_byte_of_varint_field() {
    assert_eq!(encode_varint_field(5, 42)[0], 5 << 3);
}

#[test]
fn string_field_roundtrip() {
    let msg = decode_message(&encode_string(1, "ABC")).unwrap();
    assert_eq!(msg.get(1), Some(&WireValue::Text("ABC".to_string())));
}

#[test]
fn embedded_message_is_recoverable() {
    let inner = [encode_varint_field(1, 7), encode_string(2, "x")].concat();
    let outer = decode_message(&encode_embedded_message(10, &inner)).unwrap();

    let nested = decode_message(outer.get(10).unwrap().as_payload().unwrap()).unwrap();
    assert_eq!(nested.get(1), Some(&WireValue::UnsignedInt(7)));
    assert_eq!(nested.text(2), Some("x"));
}

#[test]
fn non_utf8_payload_stays_bytes() {
    let msg = decode_message(&encode_embedded_message(4, &[0x12, 0xC3, 0x28])).unwrap();
    assert_eq!(msg.get(4), Some(&WireValue::Bytes(vec![0x12, 0xC3, 0x28])));
}

#[test]
fn truncated_length_delimited_field_is_dropped() {
    let mut buf = encode_varint_field(17, 2);
    buf.extend(encode_string(100, "0310107112122360374"));
    buf.truncate(buf.len() - 1);

    let msg = decode_message(&buf).unwrap();
    assert!(msg.contains(17));
    assert!(!msg.contains(100));
}

#[test]
fn unsupported_wire_type_is_a_communication_error() {
    let err = decode_message(&[0x08, 0x01, 0x0B, 0x08, 0x01]).unwrap_err();
    assert!(matches!(err, ChargerError::Communication { .. }));
}
