use duosida_direct::envelope::{FrameContent, NoStatusReason, unwrap_frame};
use duosida_direct::status::ChargerStatus;
use duosida_direct::wire::{
    encode_double, encode_embedded_message, encode_string, encode_varint_field,
};

const DEVICE_ID: &str = "0310107112122360374";

fn report_payload() -> Vec<u8> {
    [
        encode_double(1, 229.8),
        encode_double(2, 15.9),
        encode_double(4, 3.25),
        encode_double(7, 41.0),
        encode_double(8, 35.5),
        encode_double(9, 6.1),
        encode_varint_field(17, 2),
        encode_varint_field(18, 1_700_000_000),
    ]
    .concat()
}

fn frame_with(container: &[u8], info: Option<&[u8]>) -> Vec<u8> {
    let mut frame = Vec::new();
    if let Some(info) = info {
        frame.extend(encode_embedded_message(4, info));
    }
    frame.extend(encode_embedded_message(16, container));
    frame.extend(encode_string(100, DEVICE_ID));
    frame
}

#[test]
fn full_report_frame_decodes_to_status() {
    let container = [
        encode_string(2, "DataReportReq"),
        encode_embedded_message(10, &report_payload()),
    ]
    .concat();
    let info = [encode_string(2, "SmartChargePile"), encode_string(5, "V1.1.0")].concat();

    let FrameContent::Status(frame) = unwrap_frame(&frame_with(&container, Some(&info)), "").unwrap()
    else {
        panic!("expected a status frame");
    };
    assert_eq!(frame.message_type.as_deref(), Some("DataReportReq"));

    let status = ChargerStatus::from_frame(&frame, None);
    assert_eq!(status.device_id, DEVICE_ID);
    assert_eq!(status.model, "SmartChargePile");
    assert_eq!(status.firmware, "V1.1.0");
    assert_eq!(status.voltage, 229.8);
    assert_eq!(status.session_energy, 3.25);
    assert_eq!(status.temperature_station, 35.5);
    assert_eq!(status.cp_voltage(), 6.1);
    assert_eq!(status.session_start, 1_700_000_000);
}

#[test]
fn continue_request_wins_over_payload() {
    let container = [
        encode_string(2, "DataContinueReq"),
        encode_embedded_message(10, &report_payload()),
        encode_embedded_message(12, &report_payload()),
    ]
    .concat();
    assert!(matches!(
        unwrap_frame(&frame_with(&container, None), DEVICE_ID).unwrap(),
        FrameContent::NoStatus(NoStatusReason::ContinueRequest)
    ));
}

#[test]
fn ack_frame_without_key_fields_is_keepalive() {
    let frame = [encode_varint_field(3, 1), encode_string(100, DEVICE_ID)].concat();
    assert!(matches!(
        unwrap_frame(&frame, DEVICE_ID).unwrap(),
        FrameContent::NoStatus(NoStatusReason::NoKeyFields)
    ));
}

#[test]
fn known_device_id_fills_missing_field() {
    let container = encode_embedded_message(12, &report_payload());
    let frame = encode_embedded_message(16, &container);
    let FrameContent::Status(frame) = unwrap_frame(&frame, DEVICE_ID).unwrap() else {
        panic!("expected a status frame");
    };
    assert_eq!(frame.identity.device_id, DEVICE_ID);
    assert!(frame.message_type.is_none());
}

#[test]
fn malformed_container_is_an_error() {
    let frame = encode_embedded_message(16, &[0x0F]);
    assert!(unwrap_frame(&frame, DEVICE_ID).is_err());
}

#[test]
fn firmware_only_device_info_keeps_firmware() {
    let container = encode_embedded_message(10, &report_payload());
    let info = encode_string(5, "V2.0.1");
    let FrameContent::Status(frame) = unwrap_frame(&frame_with(&container, Some(&info)), "").unwrap()
    else {
        panic!("expected a status frame");
    };
    assert!(frame.identity.model.is_empty());
    assert_eq!(frame.identity.firmware, "V2.0.1");
}
