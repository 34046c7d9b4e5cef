//! Charger status snapshot and derived views
//!
//! A [`ChargerStatus`] is built once per decoded status frame and never
//! updated afterwards. Power is not transmitted by the charger; it is derived
//! from the phase 1 voltage and current on demand.

use crate::envelope::{DeviceIdentity, StatusFrame};
use crate::wire::DecodedMessage;
use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status payload field numbers
pub mod fields {
    pub const VOLTAGE_L1: u32 = 1;
    pub const CURRENT_L1: u32 = 2;
    pub const SESSION_ENERGY: u32 = 4;
    pub const TEMPERATURE_INTERNAL: u32 = 7;
    pub const TEMPERATURE_STATION: u32 = 8;
    pub const CP_VOLTAGE: u32 = 9;
    pub const CONNECTION_STATE: u32 = 17;
    pub const SESSION_START: u32 = 18;
}

/// Connection state reported by the charger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Undefined,
    Available,
    Preparing,
    Charging,
    Cooling,
    SuspendedEv,
    Finished,
    Holiday,
    Unknown(i64),
}

impl ConnectionState {
    pub fn from_code(code: i64) -> Self {
        match code {
            -1 => ConnectionState::Undefined,
            0 => ConnectionState::Available,
            1 => ConnectionState::Preparing,
            2 => ConnectionState::Charging,
            3 => ConnectionState::Cooling,
            4 => ConnectionState::SuspendedEv,
            5 => ConnectionState::Finished,
            6 => ConnectionState::Holiday,
            other => ConnectionState::Unknown(other),
        }
    }

    /// Nominal IEC 61851-1 control pilot level for this state, 0 when unmapped
    pub fn nominal_cp_voltage(self) -> f64 {
        match self {
            // State A: no vehicle
            ConnectionState::Available => 12.0,
            // State B: vehicle connected, not drawing
            ConnectionState::Preparing
            | ConnectionState::SuspendedEv
            | ConnectionState::Finished => 9.0,
            // State C: charging
            ConnectionState::Charging => 6.0,
            // State D: charging with ventilation
            ConnectionState::Cooling => 3.0,
            ConnectionState::Undefined | ConnectionState::Holiday | ConnectionState::Unknown(_) => {
                0.0
            }
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Undefined => write!(f, "Undefined"),
            ConnectionState::Available => write!(f, "Available"),
            ConnectionState::Preparing => write!(f, "Preparing"),
            ConnectionState::Charging => write!(f, "Charging"),
            ConnectionState::Cooling => write!(f, "Cooling"),
            ConnectionState::SuspendedEv => write!(f, "SuspendedEV"),
            ConnectionState::Finished => write!(f, "Finished"),
            ConnectionState::Holiday => write!(f, "Holiday"),
            ConnectionState::Unknown(code) => write!(f, "Unknown ({})", code),
        }
    }
}

/// Immutable status snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargerStatus {
    /// Raw connection-state code
    pub conn_status: i64,

    /// Phase voltages (V); only L1 is populated by current firmware
    pub voltage: f64,
    pub voltage2: f64,
    pub voltage3: f64,

    /// Phase currents (A); only L1 is populated by current firmware
    pub current: f64,
    pub current2: f64,
    pub current3: f64,

    /// Temperatures (°C)
    pub temperature_internal: f64,
    pub temperature_station: f64,

    /// Energy delivered in the current session (kWh)
    pub session_energy: f64,

    /// Session start, epoch seconds (0 when unknown)
    pub session_start: i64,

    /// Control pilot reading as reported by the sensor
    pub cp_voltage_raw: f64,

    /// Last max current sent by this session (not read back from the charger)
    pub max_current: Option<u32>,

    pub device_id: String,
    pub model: String,
    pub manufacturer: String,
    pub firmware: String,
}

impl ChargerStatus {
    /// Build a status from an unwrapped status payload
    pub fn from_payload(
        payload: &DecodedMessage,
        identity: &DeviceIdentity,
        max_current: Option<u32>,
    ) -> Self {
        Self {
            conn_status: payload.i64_or(fields::CONNECTION_STATE, 0),
            voltage: payload.f64_or(fields::VOLTAGE_L1, 0.0),
            current: payload.f64_or(fields::CURRENT_L1, 0.0),
            temperature_internal: payload.f64_or(fields::TEMPERATURE_INTERNAL, 0.0),
            temperature_station: payload.f64_or(fields::TEMPERATURE_STATION, 0.0),
            session_energy: payload.f64_or(fields::SESSION_ENERGY, 0.0),
            session_start: payload.i64_or(fields::SESSION_START, 0),
            cp_voltage_raw: payload.f64_or(fields::CP_VOLTAGE, 0.0),
            max_current,
            device_id: identity.device_id.clone(),
            model: identity.model.clone(),
            manufacturer: identity.manufacturer.clone(),
            firmware: identity.firmware.clone(),
            ..Self::default()
        }
    }

    /// Build a status from a frame returned by the envelope unwrapper
    pub fn from_frame(frame: &StatusFrame, max_current: Option<u32>) -> Self {
        Self::from_payload(&frame.payload, &frame.identity, max_current)
    }

    /// Power in watts: voltage × current when both are positive, else 0
    pub fn power(&self) -> f64 {
        if self.voltage > 0.0 && self.current > 0.0 {
            self.voltage * self.current
        } else {
            0.0
        }
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_code(self.conn_status)
    }

    /// Control pilot voltage: the sensor reading when positive, otherwise the
    /// nominal level for the connection state
    pub fn cp_voltage(&self) -> f64 {
        if self.cp_voltage_raw > 0.0 {
            self.cp_voltage_raw
        } else {
            self.state().nominal_cp_voltage()
        }
    }

    /// Minutes since the session started, `None` without a start timestamp
    pub fn session_time(&self) -> Option<i64> {
        self.session_time_at(Utc::now())
    }

    pub fn session_time_at(&self, now: DateTime<Utc>) -> Option<i64> {
        if self.session_start <= 0 {
            return None;
        }
        Some((now.timestamp() - self.session_start) / 60)
    }

    /// Serializable view including the derived values
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            timestamp: Utc::now().to_rfc3339(),
            state: self.state().to_string(),
            power: self.power(),
            cp_voltage: self.cp_voltage(),
            session_time_min: self.session_time(),
            status: self.clone(),
        }
    }
}

/// JSON-friendly status with derived fields
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub timestamp: String,
    pub state: String,
    pub power: f64,
    pub cp_voltage: f64,
    pub session_time_min: Option<i64>,
    #[serde(flatten)]
    pub status: ChargerStatus,
}

impl fmt::Display for ChargerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Charger Status:")?;
        writeln!(f, "  Device ID: {}", self.device_id)?;
        writeln!(f, "  Status: {}", self.state())?;
        for (label, value) in [
            ("Model", &self.model),
            ("Manufacturer", &self.manufacturer),
            ("Firmware", &self.firmware),
        ] {
            if !value.is_empty() {
                writeln!(f, "  {}: {}", label, value)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "  ELECTRICAL:")?;
        writeln!(f, "    Voltage (L1): {:.1}V", self.voltage)?;
        for (label, value) in [("L2", self.voltage2), ("L3", self.voltage3)] {
            if value > 0.01 {
                writeln!(f, "    Voltage ({}): {:.1}V", label, value)?;
            }
        }
        writeln!(f, "    Current (L1): {:.2}A", self.current)?;
        for (label, value) in [("L2", self.current2), ("L3", self.current3)] {
            if value > 0.01 {
                writeln!(f, "    Current ({}): {:.2}A", label, value)?;
            }
        }
        writeln!(f, "    Power: {:.1}W", self.power())?;
        writeln!(f, "    CP Voltage: {:.1}V", self.cp_voltage())?;
        if let Some(max) = self.max_current {
            writeln!(f, "    Max Current Limit: {}A  [cached]", max)?;
        }

        writeln!(f)?;
        writeln!(f, "  TEMPERATURE:")?;
        writeln!(f, "    Station: {:.1}°C", self.temperature_station)?;
        if self.temperature_internal > 0.01 {
            writeln!(f, "    Internal: {:.1}°C", self.temperature_internal)?;
        }

        if self.session_energy > 0.01 || self.session_start > 0 {
            writeln!(f)?;
            writeln!(f, "  SESSION:")?;
            writeln!(f, "    Energy: {:.2} kWh", self.session_energy)?;
            if self.session_start > 0
                && let Some(start) = Local.timestamp_opt(self.session_start, 0).single()
            {
                writeln!(f, "    Started: {}", start.format("%Y-%m-%d %H:%M:%S"))?;
            }
            if let Some(minutes) = self.session_time() {
                writeln!(f, "    Duration: {}h {:02}m", minutes / 60, minutes % 60)?;
            }
        }

        Ok(())
    }
}
