//! Envelope unwrapping for frames received from the charger
//!
//! Depending on firmware and message variant, the live status can sit at
//! different depths of a received frame:
//!
//! - field 16 holds an inner container whose sub-field 2 names the message
//!   type. `DataContinueReq` carries no status. Otherwise the status payload
//!   is the embedded message in sub-field 10, else sub-field 12, else the
//!   container itself.
//! - without field 16 the outer message is the payload.
//!
//! A payload only counts as a status update when it has at least one of the
//! key measurement fields; anything else (keepalives, acks) is reported as
//! "no status" so the caller keeps its cached snapshot.

pub mod device_info;

use crate::error::Result;
use crate::wire::{DecodedMessage, WireValue, decode_message};
use serde::{Deserialize, Serialize};

/// Outer field: device info (embedded message or vendor blob)
pub const FIELD_DEVICE_INFO: u32 = 4;
/// Outer field: inner container
pub const FIELD_CONTAINER: u32 = 16;
/// Outer field: device id text
pub const FIELD_DEVICE_ID: u32 = 100;

/// Container sub-field: message type tag
pub const FIELD_MESSAGE_TYPE: u32 = 2;
/// Container sub-fields holding the status payload, in order of preference
pub const PAYLOAD_FIELDS: [u32; 2] = [10, 12];

/// Device-info sub-fields of the well-formed variant
pub const INFO_FIELD_MODEL: u32 = 2;
pub const INFO_FIELD_FIRMWARE: u32 = 5;

/// Message type announcing that the charger has nothing new
pub const CONTINUE_REQUEST: &str = "DataContinueReq";

/// Fields whose presence marks a payload as a genuine status update
pub const STATUS_KEY_FIELDS: [u32; 4] = [1, 2, 8, 17];

/// Identity strings reported alongside a status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub device_id: String,
    pub model: String,
    pub manufacturer: String,
    pub firmware: String,
}

/// A frame that carried a status payload
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFrame {
    /// Message type tag of the inner container, if any
    pub message_type: Option<String>,
    pub identity: DeviceIdentity,
    pub payload: DecodedMessage,
}

/// Why a frame produced no status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoStatusReason {
    /// Inner container tagged `DataContinueReq`
    ContinueRequest,
    /// Payload without any key measurement field
    NoKeyFields,
}

/// Result of unwrapping one received frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameContent {
    Status(Box<StatusFrame>),
    NoStatus(NoStatusReason),
}

/// Where the status payload was found
enum PayloadSource {
    Outer,
    Container {
        message_type: Option<String>,
        payload: DecodedMessage,
    },
    Continue,
}

/// Decode a received frame and locate its status payload.
///
/// `known_device_id` is used when the frame carries no device id of its own;
/// it also bounds the model string in malformed device-info blobs.
pub fn unwrap_frame(frame: &[u8], known_device_id: &str) -> Result<FrameContent> {
    let outer = decode_message(frame)?;
    unwrap_message(outer, known_device_id)
}

/// Same as [`unwrap_frame`] for an already decoded outer message
pub fn unwrap_message(outer: DecodedMessage, known_device_id: &str) -> Result<FrameContent> {
    let (message_type, payload) = match locate_payload(&outer)? {
        PayloadSource::Continue => {
            return Ok(FrameContent::NoStatus(NoStatusReason::ContinueRequest));
        }
        PayloadSource::Container {
            message_type,
            payload,
        } => (message_type, payload),
        PayloadSource::Outer => (None, outer.clone()),
    };

    if !is_status_payload(&payload) {
        return Ok(FrameContent::NoStatus(NoStatusReason::NoKeyFields));
    }

    Ok(FrameContent::Status(Box::new(StatusFrame {
        message_type,
        identity: extract_identity(&outer, known_device_id),
        payload,
    })))
}

/// Whether a payload carries at least one key measurement field
pub fn is_status_payload(payload: &DecodedMessage) -> bool {
    payload.contains_any(&STATUS_KEY_FIELDS)
}

fn locate_payload(outer: &DecodedMessage) -> Result<PayloadSource> {
    let Some(container_bytes) = outer.get(FIELD_CONTAINER).and_then(WireValue::as_payload) else {
        return Ok(PayloadSource::Outer);
    };

    let container = decode_message(container_bytes)?;
    let message_type = container.text(FIELD_MESSAGE_TYPE).map(str::to_string);
    if message_type.as_deref() == Some(CONTINUE_REQUEST) {
        return Ok(PayloadSource::Continue);
    }

    for field in PAYLOAD_FIELDS {
        if let Some(bytes) = container.get(field).and_then(WireValue::as_payload) {
            return Ok(PayloadSource::Container {
                message_type,
                payload: decode_message(bytes)?,
            });
        }
    }

    Ok(PayloadSource::Container {
        message_type,
        payload: container,
    })
}

/// Collect device id, model, manufacturer and firmware from the outer message
pub fn extract_identity(outer: &DecodedMessage, known_device_id: &str) -> DeviceIdentity {
    let device_id = outer
        .text(FIELD_DEVICE_ID)
        .filter(|id| !id.is_empty())
        .unwrap_or(known_device_id)
        .to_string();

    let mut identity = DeviceIdentity {
        device_id,
        ..DeviceIdentity::default()
    };

    let Some(info) = outer.get(FIELD_DEVICE_INFO).and_then(WireValue::as_payload) else {
        return identity;
    };

    match decode_device_info(info) {
        Some((model, firmware)) => {
            identity.model = model;
            identity.firmware = firmware;
        }
        None => {
            let strings = device_info::parse_vendor_blob(info, &identity.device_id);
            identity.model = strings.model;
            identity.manufacturer = strings.manufacturer;
            identity.firmware = strings.firmware;
        }
    }

    identity
}

/// Model and firmware from a device-info field that decodes completely as a
/// message carrying either sub-field; `None` sends the caller to the blob
/// grammar. A model with control bytes means the lengths were wrong.
fn decode_device_info(info: &[u8]) -> Option<(String, String)> {
    let msg = decode_message(info).ok().filter(|m| !m.is_truncated())?;
    if !msg.contains_any(&[INFO_FIELD_MODEL, INFO_FIELD_FIRMWARE]) {
        return None;
    }
    let model = msg.text(INFO_FIELD_MODEL).unwrap_or_default();
    if model.chars().any(char::is_control) {
        return None;
    }
    let firmware = msg.text(INFO_FIELD_FIRMWARE).unwrap_or_default();
    Some((model.to_string(), firmware.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{encode_double, encode_embedded_message, encode_string, encode_varint_field};

    fn status_payload() -> Vec<u8> {
        let mut p = encode_double(1, 231.0);
        p.extend(encode_double(2, 10.0));
        p.extend(encode_varint_field(17, 2));
        p
    }

    fn container(message_type: &str, sub_field: u32, payload: &[u8]) -> Vec<u8> {
        let mut c = encode_string(FIELD_MESSAGE_TYPE, message_type);
        c.extend(encode_embedded_message(sub_field, payload));
        encode_embedded_message(FIELD_CONTAINER, &c)
    }

    #[test]
    fn test_status_in_sub_field_10() {
        let mut frame = container("DataVendorStatusReq", 10, &status_payload());
        frame.extend(encode_string(FIELD_DEVICE_ID, "DEV1"));

        let FrameContent::Status(sf) = unwrap_frame(&frame, "").unwrap() else {
            panic!("expected status");
        };
        assert_eq!(sf.message_type.as_deref(), Some("DataVendorStatusReq"));
        assert_eq!(sf.identity.device_id, "DEV1");
        assert_eq!(sf.payload.f64_or(1, 0.0), 231.0);
    }

    #[test]
    fn test_status_in_sub_field_12() {
        let frame = container("DataVendorRealtime", 12, &status_payload());
        let FrameContent::Status(sf) = unwrap_frame(&frame, "KNOWN").unwrap() else {
            panic!("expected status");
        };
        assert_eq!(sf.payload.i64_or(17, -1), 2);
        assert_eq!(sf.identity.device_id, "KNOWN");
    }

    #[test]
    fn test_sub_field_10_preferred_over_12() {
        let mut inner = encode_string(FIELD_MESSAGE_TYPE, "X");
        inner.extend(encode_embedded_message(12, &encode_double(1, 1.0)));
        inner.extend(encode_embedded_message(10, &encode_double(1, 2.0)));
        let frame = encode_embedded_message(FIELD_CONTAINER, &inner);

        let FrameContent::Status(sf) = unwrap_frame(&frame, "").unwrap() else {
            panic!("expected status");
        };
        assert_eq!(sf.payload.f64_or(1, 0.0), 2.0);
    }

    #[test]
    fn test_continue_request_has_no_status() {
        let mut inner = encode_string(FIELD_MESSAGE_TYPE, CONTINUE_REQUEST);
        inner.extend(encode_embedded_message(10, &status_payload()));
        inner.extend(encode_double(1, 230.0));
        let frame = encode_embedded_message(FIELD_CONTAINER, &inner);

        assert_eq!(
            unwrap_frame(&frame, "").unwrap(),
            FrameContent::NoStatus(NoStatusReason::ContinueRequest)
        );
    }

    #[test]
    fn test_container_fields_used_directly() {
        let mut inner = encode_string(FIELD_MESSAGE_TYPE, "Flat");
        inner.extend(encode_double(8, 31.5));
        let frame = encode_embedded_message(FIELD_CONTAINER, &inner);

        let FrameContent::Status(sf) = unwrap_frame(&frame, "").unwrap() else {
            panic!("expected status");
        };
        assert_eq!(sf.payload.f64_or(8, 0.0), 31.5);
    }

    #[test]
    fn test_outer_fields_used_without_container() {
        let frame = status_payload();
        assert!(matches!(
            unwrap_frame(&frame, "").unwrap(),
            FrameContent::Status(_)
        ));
    }

    #[test]
    fn test_keepalive_has_no_status() {
        let mut frame = encode_string(FIELD_DEVICE_ID, "DEV1");
        frame.extend(encode_varint_field(101, 7));
        assert_eq!(
            unwrap_frame(&frame, "").unwrap(),
            FrameContent::NoStatus(NoStatusReason::NoKeyFields)
        );
        assert_eq!(
            unwrap_frame(&[], "").unwrap(),
            FrameContent::NoStatus(NoStatusReason::NoKeyFields)
        );
    }

    #[test]
    fn test_bad_wire_type_inside_container_fails() {
        let frame = encode_embedded_message(FIELD_CONTAINER, &[0x13, 0x00]);
        assert!(unwrap_frame(&frame, "").is_err());
    }

    #[test]
    fn test_well_formed_device_info() {
        let mut info = encode_string(INFO_FIELD_MODEL, "DSD1-EU");
        info.extend(encode_string(INFO_FIELD_FIRMWARE, "V2.0.1"));
        let mut frame = encode_embedded_message(FIELD_DEVICE_INFO, &info);
        frame.extend(encode_string(FIELD_DEVICE_ID, "DEV1"));
        let outer = decode_message(&frame).unwrap();

        let identity = extract_identity(&outer, "");
        assert_eq!(identity.model, "DSD1-EU");
        assert_eq!(identity.firmware, "V2.0.1");
        assert!(identity.manufacturer.is_empty());
    }

    #[test]
    fn test_firmware_only_device_info() {
        let info = encode_string(INFO_FIELD_FIRMWARE, "V2.0.1");
        let mut frame = encode_embedded_message(FIELD_DEVICE_INFO, &info);
        frame.extend(encode_string(FIELD_DEVICE_ID, "DEV1"));
        let outer = decode_message(&frame).unwrap();

        let identity = extract_identity(&outer, "");
        assert!(identity.model.is_empty());
        assert_eq!(identity.firmware, "V2.0.1");
        assert_eq!(identity.device_id, "DEV1");
    }

    #[test]
    fn test_malformed_device_info_falls_back_to_blob_grammar() {
        let mut info = vec![0x12, 0x40];
        info.extend_from_slice(b"SmartHome");
        info.extend_from_slice(b"DEV1");
        info.extend_from_slice(b"\"\x07Duosida");
        info.extend_from_slice(&device_info::FIRMWARE_MARKER);
        info.extend_from_slice(b"\x05V1.02");
        let mut frame = encode_embedded_message(FIELD_DEVICE_INFO, &info);
        frame.extend(encode_string(FIELD_DEVICE_ID, "DEV1"));
        let outer = decode_message(&frame).unwrap();

        let identity = extract_identity(&outer, "");
        assert_eq!(identity.model, "SmartHome");
        assert_eq!(identity.manufacturer, "Duosida");
        assert_eq!(identity.firmware, "V1.02");
    }
}
