//! Command framing and the mutating session operations
//!
//! Every command is one frame: the command sub-message at its field number,
//! then the device id (field 100) and the sequence value (field 101).
//! Setters validate before any byte is written. The `try_*` forms return the
//! typed error; the plain forms log it and return `false`.

use super::ChargerSession;
use super::transport::Connector;
use crate::envelope::FIELD_DEVICE_ID;
use crate::error::{ChargerError, Result};
use crate::wire::{encode_embedded_message, encode_string, encode_varint_field};
use chrono::Utc;
use std::ops::RangeInclusive;

/// Field carrying the sequence value in a command frame
pub const FIELD_SEQUENCE: u32 = 101;

/// Field numbers of the command sub-messages
pub const FIELD_SET_CONFIG: u32 = 10;
pub const FIELD_START_CHARGING: u32 = 11;
pub const FIELD_STOP_CHARGING: u32 = 12;

/// Connector addressed by start/stop; single-connector chargers only
pub const CONNECTOR_ID: u64 = 1;

/// Vendor configuration keys
pub mod keys {
    pub const MAX_WORK_CURRENT: &str = "VendorMaxWorkCurrent";
    pub const CONNECTION_TIMEOUT: &str = "VendorConnectionTimeOut";
    pub const MAX_TEMPERATURE: &str = "VendorMaxTemperature";
    pub const MAX_VOLTAGE: &str = "VendorMaxVoltage";
    pub const MIN_VOLTAGE: &str = "VendorMinVoltage";
    pub const DIRECT_WORK_MODE: &str = "VendorDirectWorkMode";
    pub const LED_STRENGTH: &str = "VendorLEDStrength";
    pub const STOP_ON_DISCONNECT: &str = "VendorStopOnDisconnect";
}

pub const MAX_CURRENT_RANGE: RangeInclusive<u32> = 6..=32;
pub const CONNECTION_TIMEOUT_RANGE: RangeInclusive<u32> = 30..=900;
pub const MAX_TEMPERATURE_RANGE: RangeInclusive<u32> = 85..=95;
pub const MAX_VOLTAGE_RANGE: RangeInclusive<u32> = 265..=290;
pub const MIN_VOLTAGE_RANGE: RangeInclusive<u32> = 70..=110;
pub const LED_BRIGHTNESS_LEVELS: [u8; 3] = [0, 1, 3];

const ANNOUNCE_FRAME: [u8; 16] = [
    0xa2, 0x03, 0x04, 0x08, 0x00, 0x10, 0x00, 0xa2, 0x06, 0x03, 0x49, 0x4f, 0x53, 0xa8, 0x06, 0x00,
];
const IDENTIFY_PREFIX: [u8; 12] = [
    0x1a, 0x0a, 0x08, 0x9e, 0xe6, 0xda, 0x91, 0x0d, 0x10, 0x00, 0x18, 0x00,
];
const IDENTIFY_SUFFIX: [u8; 6] = [0xa8, 0x06, 0x9e, 0x81, 0x80, 0x40];

/// First handshake frame, sent verbatim
pub fn announce_frame() -> Vec<u8> {
    ANNOUNCE_FRAME.to_vec()
}

/// Second handshake frame: fixed prefix, the device id as field 100, fixed suffix
pub fn identify_frame(device_id: &str) -> Vec<u8> {
    let mut frame = IDENTIFY_PREFIX.to_vec();
    frame.extend(encode_string(FIELD_DEVICE_ID, device_id));
    frame.extend_from_slice(&IDENTIFY_SUFFIX);
    frame
}

/// A mutating request understood by the charger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetConfig { key: String, value: String },
    StartCharging,
    StopCharging { session_id: u32 },
}

impl Command {
    pub fn set_config(key: &str, value: impl ToString) -> Self {
        Self::SetConfig {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    pub fn field_number(&self) -> u32 {
        match self {
            Self::SetConfig { .. } => FIELD_SET_CONFIG,
            Self::StartCharging => FIELD_START_CHARGING,
            Self::StopCharging { .. } => FIELD_STOP_CHARGING,
        }
    }

    /// Encoded command sub-message
    pub fn body(&self) -> Vec<u8> {
        match self {
            Self::SetConfig { key, value } => {
                let mut body = encode_string(1, key);
                body.extend(encode_string(2, value));
                body
            }
            Self::StartCharging => encode_varint_field(1, CONNECTOR_ID),
            Self::StopCharging { session_id } => {
                let mut body = encode_varint_field(1, CONNECTOR_ID);
                body.extend(encode_varint_field(2, u64::from(*session_id)));
                body
            }
        }
    }

    /// Complete frame for the given device and sequence value
    pub fn frame(&self, device_id: &str, sequence: u64) -> Vec<u8> {
        let mut frame = encode_embedded_message(self.field_number(), &self.body());
        frame.extend(encode_string(FIELD_DEVICE_ID, device_id));
        frame.extend(encode_varint_field(FIELD_SEQUENCE, sequence));
        frame
    }

    pub fn describe(&self) -> String {
        match self {
            Self::SetConfig { key, value } => format!("set {}={}", key, value),
            Self::StartCharging => "start charging".to_string(),
            Self::StopCharging { session_id } => format!("stop charging (session {})", session_id),
        }
    }
}

/// Session id used when a stop request names none
pub fn default_stop_session_id() -> u32 {
    (Utc::now().timestamp_millis() as u64 % (1u64 << 32)) as u32
}

fn check_range(field: &str, value: u32, range: &RangeInclusive<u32>, unit: &str) -> Result<()> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err(ChargerError::validation(
            field,
            format!(
                "{} {} out of range ({}-{} {})",
                value,
                unit,
                range.start(),
                range.end(),
                unit
            ),
        ))
    }
}

fn flag(enabled: bool) -> &'static str {
    if enabled { "1" } else { "0" }
}

impl<C: Connector> ChargerSession<C> {
    fn report(&self, what: &str, result: Result<()>) -> bool {
        match result {
            Ok(()) => {
                self.logger.info(&format!("{} sent", what));
                true
            }
            Err(e) if e.is_validation() => {
                self.logger.warn(&format!("{} rejected: {}", what, e));
                false
            }
            Err(e) => {
                self.logger.error(&format!("{} failed: {}", what, e));
                false
            }
        }
    }

    /// Write an arbitrary vendor configuration key
    pub fn try_set_config(&mut self, key: &str, value: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(ChargerError::validation("key", "Configuration key is empty"));
        }
        self.send_command(&Command::set_config(key, value))
    }

    pub fn set_config(&mut self, key: &str, value: &str) -> bool {
        let result = self.try_set_config(key, value);
        self.report(&format!("Config {}={}", key, value), result)
    }

    pub fn try_set_max_current(&mut self, amps: u32) -> Result<()> {
        check_range("max_current", amps, &MAX_CURRENT_RANGE, "A")?;
        self.send_command(&Command::set_config(keys::MAX_WORK_CURRENT, amps))?;
        self.cached_max_current = Some(amps);
        Ok(())
    }

    pub fn set_max_current(&mut self, amps: u32) -> bool {
        let result = self.try_set_max_current(amps);
        self.report(&format!("Max current {} A", amps), result)
    }

    /// Last max current sent by this session; never read back from the charger
    pub fn get_max_current(&self) -> Option<u32> {
        self.cached_max_current
    }

    pub fn try_set_connection_timeout(&mut self, seconds: u32) -> Result<()> {
        check_range("connection_timeout", seconds, &CONNECTION_TIMEOUT_RANGE, "s")?;
        self.send_command(&Command::set_config(keys::CONNECTION_TIMEOUT, seconds))
    }

    pub fn set_connection_timeout(&mut self, seconds: u32) -> bool {
        let result = self.try_set_connection_timeout(seconds);
        self.report(&format!("Connection timeout {} s", seconds), result)
    }

    pub fn try_set_max_temperature(&mut self, celsius: u32) -> Result<()> {
        check_range("max_temperature", celsius, &MAX_TEMPERATURE_RANGE, "C")?;
        self.send_command(&Command::set_config(keys::MAX_TEMPERATURE, celsius))
    }

    pub fn set_max_temperature(&mut self, celsius: u32) -> bool {
        let result = self.try_set_max_temperature(celsius);
        self.report(&format!("Max temperature {} C", celsius), result)
    }

    pub fn try_set_max_voltage(&mut self, volts: u32) -> Result<()> {
        check_range("max_voltage", volts, &MAX_VOLTAGE_RANGE, "V")?;
        self.send_command(&Command::set_config(keys::MAX_VOLTAGE, volts))
    }

    pub fn set_max_voltage(&mut self, volts: u32) -> bool {
        let result = self.try_set_max_voltage(volts);
        self.report(&format!("Max voltage {} V", volts), result)
    }

    pub fn try_set_min_voltage(&mut self, volts: u32) -> Result<()> {
        check_range("min_voltage", volts, &MIN_VOLTAGE_RANGE, "V")?;
        self.send_command(&Command::set_config(keys::MIN_VOLTAGE, volts))
    }

    pub fn set_min_voltage(&mut self, volts: u32) -> bool {
        let result = self.try_set_min_voltage(volts);
        self.report(&format!("Min voltage {} V", volts), result)
    }

    pub fn try_set_direct_work_mode(&mut self, enabled: bool) -> Result<()> {
        self.send_command(&Command::set_config(keys::DIRECT_WORK_MODE, flag(enabled)))
    }

    pub fn set_direct_work_mode(&mut self, enabled: bool) -> bool {
        let result = self.try_set_direct_work_mode(enabled);
        self.report(&format!("Direct work mode {}", flag(enabled)), result)
    }

    pub fn try_set_led_brightness(&mut self, level: u8) -> Result<()> {
        if !LED_BRIGHTNESS_LEVELS.contains(&level) {
            return Err(ChargerError::validation(
                "led_brightness",
                format!("{} is not one of 0 (off), 1 (low), 3 (high)", level),
            ));
        }
        self.send_command(&Command::set_config(keys::LED_STRENGTH, level))
    }

    pub fn set_led_brightness(&mut self, level: u8) -> bool {
        let result = self.try_set_led_brightness(level);
        self.report(&format!("LED brightness {}", level), result)
    }

    pub fn try_set_stop_on_disconnect(&mut self, enabled: bool) -> Result<()> {
        self.send_command(&Command::set_config(
            keys::STOP_ON_DISCONNECT,
            flag(enabled),
        ))
    }

    pub fn set_stop_on_disconnect(&mut self, enabled: bool) -> bool {
        let result = self.try_set_stop_on_disconnect(enabled);
        self.report(&format!("Stop on disconnect {}", flag(enabled)), result)
    }

    pub fn try_start_charging(&mut self) -> Result<()> {
        self.send_command(&Command::StartCharging)
    }

    pub fn start_charging(&mut self) -> bool {
        let result = self.try_start_charging();
        self.report("Start charging", result)
    }

    pub fn try_stop_charging(&mut self, session_id: Option<u32>) -> Result<()> {
        let session_id = session_id.unwrap_or_else(default_stop_session_id);
        self.send_command(&Command::StopCharging { session_id })
    }

    pub fn stop_charging(&mut self, session_id: Option<u32>) -> bool {
        let result = self.try_stop_charging(session_id);
        self.report("Stop charging", result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{WireValue, decode_message};

    #[test]
    fn test_announce_frame_bytes() {
        assert_eq!(
            hex::encode(&announce_frame()),
            "a2030408001000a20603494f53a80600"
        );
    }

    #[test]
    fn test_identify_frame_bytes() {
        let frame = identify_frame("0310107112122360374");
        assert_eq!(
            hex::encode(&frame),
            "1a0a089ee6da910d10001800\
             a2061330333130313037313132313232333630333734\
             a8069e818040"
        );
        assert!(frame.starts_with(&IDENTIFY_PREFIX));
        assert!(frame.ends_with(&IDENTIFY_SUFFIX));
    }

    #[test]
    fn test_set_config_frame_layout() {
        let frame = Command::set_config(keys::MAX_WORK_CURRENT, 16).frame("DEV1", 4);
        let outer = decode_message(&frame).unwrap();
        assert_eq!(outer.text(FIELD_DEVICE_ID), Some("DEV1"));
        assert_eq!(outer.get(FIELD_SEQUENCE), Some(&WireValue::UnsignedInt(4)));

        let body = outer.get(FIELD_SET_CONFIG).unwrap().as_payload().unwrap();
        let body = decode_message(body).unwrap();
        assert_eq!(body.text(1), Some("VendorMaxWorkCurrent"));
        assert_eq!(body.text(2), Some("16"));
    }

    #[test]
    fn test_stop_frame_carries_session_id() {
        let command = Command::StopCharging { session_id: 77 };
        assert_eq!(command.field_number(), FIELD_STOP_CHARGING);
        let body = decode_message(&command.body()).unwrap();
        assert_eq!(body.get(1), Some(&WireValue::UnsignedInt(1)));
        assert_eq!(body.get(2), Some(&WireValue::UnsignedInt(77)));
    }

    #[test]
    fn test_start_frame() {
        let frame = Command::StartCharging.frame("DEV1", 3);
        // field 11, length 2, {1: 1}
        assert_eq!(&frame[..4], &[0x5a, 0x02, 0x08, 0x01]);
    }

    #[test]
    fn test_range_check_messages() {
        assert!(check_range("max_current", 6, &MAX_CURRENT_RANGE, "A").is_ok());
        assert!(check_range("max_current", 32, &MAX_CURRENT_RANGE, "A").is_ok());
        let err = check_range("max_current", 33, &MAX_CURRENT_RANGE, "A").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("6-32"));
    }

    #[test]
    fn test_flag_text() {
        assert_eq!(flag(true), "1");
        assert_eq!(flag(false), "0");
    }
}
