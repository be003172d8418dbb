//! Telemetry sentences sent from the vehicle to its operators.
//!
//! The vehicle broadcasts three sentence kinds per cycle: `GPGGA` for
//! position, `PSEAA` for attitude and `PSEAD` for thruster and mode
//! status. Decoding yields flat field/value pairs so receivers can merge
//! whatever subset a sentence carries.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::error::{Error, Result};
use crate::protocol::geo;
use crate::protocol::sentence::RawSentence;

/// Control mode of the vehicle, as reported in `PSEAD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlMode {
    Standby,
    Thruster,
    StationKeep,
    Waypoint,
    FileDownload,
}

impl ControlMode {
    /// Single-letter wire encoding.
    pub fn wire_char(self) -> char {
        match self {
            ControlMode::Standby => 'L',
            ControlMode::Thruster => 'T',
            ControlMode::StationKeep => 'R',
            ControlMode::Waypoint => 'W',
            ControlMode::FileDownload => 'F',
        }
    }

    pub fn from_wire_char(c: char) -> Option<ControlMode> {
        match c {
            'L' => Some(ControlMode::Standby),
            'T' => Some(ControlMode::Thruster),
            'R' => Some(ControlMode::StationKeep),
            'W' => Some(ControlMode::Waypoint),
            'F' => Some(ControlMode::FileDownload),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ControlMode::Standby => "Standby",
            ControlMode::Thruster => "Thruster",
            ControlMode::StationKeep => "Station Keep",
            ControlMode::Waypoint => "Waypoint",
            ControlMode::FileDownload => "File Download",
        }
    }
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One addressable telemetry quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetryField {
    Latitude,
    Longitude,
    Pitch,
    Roll,
    Heading,
    Heave,
    BoxTemperature,
    AccelForward,
    AccelStarboard,
    AccelDown,
    YawRate,
    ControlMode,
    CommandedHeading,
    Thrust,
    ThrustDiff,
}

/// Decoded value of a telemetry field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TelemetryValue {
    Number(f64),
    Mode(ControlMode),
}

impl TelemetryValue {
    pub fn as_number(self) -> Option<f64> {
        match self {
            TelemetryValue::Number(value) => Some(value),
            TelemetryValue::Mode(_) => None,
        }
    }

    pub fn as_mode(self) -> Option<ControlMode> {
        match self {
            TelemetryValue::Mode(mode) => Some(mode),
            TelemetryValue::Number(_) => None,
        }
    }
}

const ATTITUDE_FIELDS: [TelemetryField; 9] = [
    TelemetryField::Pitch,
    TelemetryField::Roll,
    TelemetryField::Heading,
    TelemetryField::Heave,
    TelemetryField::BoxTemperature,
    TelemetryField::AccelForward,
    TelemetryField::AccelStarboard,
    TelemetryField::AccelDown,
    TelemetryField::YawRate,
];

/// Current UTC time of day as an `hhmmss.ss` field.
pub fn utc_time_field() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0);
    let day = secs % 86_400;
    format!("{:02}{:02}{:02}.00", day / 3600, (day % 3600) / 60, day % 60)
}

/// `GPGGA` payload for a position fix. Fix quality, satellite count and
/// the remaining fields are fixed placeholder values.
pub fn position_payload(latitude: f64, longitude: f64, time_field: &str) -> String {
    let (lat_deg, lat_min, lat_hemi) = geo::to_degrees_minutes(latitude, 'N', 'S');
    let (lon_deg, lon_min, lon_hemi) = geo::to_degrees_minutes(longitude, 'E', 'W');
    format!(
        "GPGGA,{},{:02}{:08.5},{},{:03}{:08.5},{},1,08,1.0,0.0,M,0.0,M,,",
        time_field, lat_deg, lat_min, lat_hemi, lon_deg, lon_min, lon_hemi
    )
}

/// `PSEAA` payload for vehicle attitude. A surface vehicle with no
/// swell model reports zero pitch, roll, heave, acceleration and yaw
/// rate, and a constant box temperature.
pub fn attitude_payload(heading: f64) -> String {
    format!("PSEAA,0.0,0.0,{:.1},0.0,25.0,0.0,0.0,0.0,0.0", heading)
}

/// `PSEAD` payload for control mode and thruster status.
pub fn status_payload(mode: ControlMode, commanded_heading: f64, thrust: f64, diff: f64) -> String {
    format!(
        "PSEAD,{},{:.1},{:.0},{:.0}",
        mode.wire_char(),
        commanded_heading,
        thrust,
        diff
    )
}

/// Decode a telemetry sentence into field/value pairs.
///
/// Sentence prefixes outside the telemetry set decode to an empty list
/// so receivers can skip them without special cases. A recognized prefix
/// with too few or malformed fields is an error.
pub fn decode(sentence: &RawSentence<'_>) -> Result<Vec<(TelemetryField, TelemetryValue)>> {
    match sentence.prefix {
        "GPGGA" => decode_position(&sentence.fields),
        "PSEAA" => decode_attitude(&sentence.fields),
        "PSEAD" => decode_status(&sentence.fields),
        _ => Ok(Vec::new()),
    }
}

fn field<'a>(fields: &[&'a str], index: usize, what: &str) -> Result<&'a str> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| Error::MalformedSentence(format!("missing {}", what)))
}

fn numeric_field(fields: &[&str], index: usize, what: &str) -> Result<f64> {
    let raw = field(fields, index, what)?;
    if raw.is_empty() {
        return Ok(0.0);
    }
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidField(format!("{} {:?}", what, raw)))
}

fn decode_position(fields: &[&str]) -> Result<Vec<(TelemetryField, TelemetryValue)>> {
    let latitude = geo::decode_latitude(
        field(fields, 1, "GPGGA latitude")?,
        field(fields, 2, "GPGGA latitude hemisphere")?,
    )?;
    let longitude = geo::decode_longitude(
        field(fields, 3, "GPGGA longitude")?,
        field(fields, 4, "GPGGA longitude hemisphere")?,
    )?;
    Ok(vec![
        (TelemetryField::Latitude, TelemetryValue::Number(latitude)),
        (TelemetryField::Longitude, TelemetryValue::Number(longitude)),
    ])
}

fn decode_attitude(fields: &[&str]) -> Result<Vec<(TelemetryField, TelemetryValue)>> {
    let mut pairs = Vec::with_capacity(ATTITUDE_FIELDS.len());
    for (index, telemetry_field) in ATTITUDE_FIELDS.iter().enumerate() {
        let value = numeric_field(fields, index, "PSEAA value")?;
        pairs.push((*telemetry_field, TelemetryValue::Number(value)));
    }
    Ok(pairs)
}

fn decode_status(fields: &[&str]) -> Result<Vec<(TelemetryField, TelemetryValue)>> {
    let mode_raw = field(fields, 0, "PSEAD mode")?;
    let commanded = numeric_field(fields, 1, "PSEAD commanded heading")?;
    let thrust = numeric_field(fields, 2, "PSEAD thrust")?;
    let diff = numeric_field(fields, 3, "PSEAD thrust differential")?;

    let mut pairs = Vec::with_capacity(4);
    let mut chars = mode_raw.chars();
    let mode = match (chars.next(), chars.next()) {
        (Some(c), None) => ControlMode::from_wire_char(c),
        _ => None,
    };
    match mode {
        Some(mode) => {
            pairs.push((TelemetryField::ControlMode, TelemetryValue::Mode(mode)));
        }
        None => debug!("Ignoring unrecognized control mode {:?}", mode_raw),
    }
    pairs.push((
        TelemetryField::CommandedHeading,
        TelemetryValue::Number(commanded),
    ));
    pairs.push((TelemetryField::Thrust, TelemetryValue::Number(thrust)));
    pairs.push((TelemetryField::ThrustDiff, TelemetryValue::Number(diff)));
    Ok(pairs)
}
