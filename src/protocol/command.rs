//! Command sentences sent from the operator to the vehicle.
//!
//! Three sentence families carry commands: `PSEAC` (mode and motion),
//! `PSEAR` (run parameters, of which only throttle is used) and `OIWPL`
//! (one waypoint of a mission download).

use crate::error::{Error, Result};
use crate::protocol::geo::{self, Waypoint};
use crate::protocol::sentence::RawSentence;

/// A fully parsed operator command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Direct thrust and thrust differential, both in percent.
    Thruster { thrust: f64, diff: f64 },
    /// Stop thrusters and hold at idle.
    Standby,
    /// Hold the current position.
    StationKeep,
    /// Follow the downloaded mission.
    Waypoint,
    /// Move the simulated vehicle instantly to a new pose.
    Teleport {
        latitude: f64,
        longitude: f64,
        heading: Option<f64>,
    },
    /// Begin a mission download expecting `count` lines.
    StartDownload { count: u32 },
    /// End the current mission download.
    EndDownload,
    /// One waypoint of a mission download.
    AppendWaypoint {
        latitude: f64,
        longitude: f64,
        sequence: u32,
    },
    /// Set the mission throttle in percent.
    SetThrottle { throttle: f64 },
}

impl Command {
    /// Parse a command from an unframed sentence.
    ///
    /// Parsing is all-or-nothing: any missing or malformed field rejects
    /// the whole sentence and the command has no effect.
    pub fn parse(sentence: &RawSentence<'_>) -> Result<Command> {
        match sentence.prefix {
            "PSEAC" => parse_pseac(&sentence.fields),
            "PSEAR" => parse_psear(&sentence.fields),
            "OIWPL" => parse_oiwpl(&sentence.fields),
            other => Err(Error::MalformedSentence(format!(
                "unknown command prefix {:?}",
                other
            ))),
        }
    }
}

fn field<'a>(fields: &[&'a str], index: usize, what: &str) -> Result<&'a str> {
    fields
        .get(index)
        .copied()
        .ok_or_else(|| Error::MalformedSentence(format!("missing {}", what)))
}

fn parse_f64(fields: &[&str], index: usize, what: &str) -> Result<f64> {
    let raw = field(fields, index, what)?;
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidField(format!("{} {:?}", what, raw)))
}

fn parse_u32(fields: &[&str], index: usize, what: &str) -> Result<u32> {
    let raw = field(fields, index, what)?;
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidField(format!("{} {:?}", what, raw)))
}

fn parse_pseac(fields: &[&str]) -> Result<Command> {
    let mode = field(fields, 0, "PSEAC mode")?;
    match mode {
        "L" => Ok(Command::Standby),
        "R" => Ok(Command::StationKeep),
        "W" => Ok(Command::Waypoint),
        "T" => {
            let thrust = parse_f64(fields, 2, "PSEAC thrust")?;
            let diff = parse_f64(fields, 3, "PSEAC thrust differential")?;
            Ok(Command::Thruster { thrust, diff })
        }
        "S" => {
            let latitude = parse_f64(fields, 1, "PSEAC latitude")?;
            let longitude = parse_f64(fields, 2, "PSEAC longitude")?;
            let heading = match fields.get(3).copied() {
                None | Some("") => None,
                Some(raw) => Some(raw.trim().parse().map_err(|_| {
                    Error::InvalidField(format!("PSEAC heading {:?}", raw))
                })?),
            };
            Ok(Command::Teleport {
                latitude,
                longitude,
                heading,
            })
        }
        "F" => {
            let count = parse_u32(fields, 1, "PSEAC line count")?;
            if count == 0 {
                Ok(Command::EndDownload)
            } else {
                Ok(Command::StartDownload { count })
            }
        }
        other => Err(Error::InvalidField(format!("PSEAC mode {:?}", other))),
    }
}

fn parse_psear(fields: &[&str]) -> Result<Command> {
    let throttle = parse_f64(fields, 2, "PSEAR throttle")?;
    Ok(Command::SetThrottle { throttle })
}

fn parse_oiwpl(fields: &[&str]) -> Result<Command> {
    let latitude = geo::decode_latitude(
        field(fields, 0, "OIWPL latitude")?,
        field(fields, 1, "OIWPL latitude hemisphere")?,
    )?;
    let longitude = geo::decode_longitude(
        field(fields, 2, "OIWPL longitude")?,
        field(fields, 3, "OIWPL longitude hemisphere")?,
    )?;
    let sequence = parse_u32(fields, 4, "OIWPL sequence")?;
    Ok(Command::AppendWaypoint {
        latitude,
        longitude,
        sequence,
    })
}

/// Payload for a direct thruster command.
pub fn thruster_payload(thrust: i32, diff: i32) -> String {
    format!("PSEAC,T,0,{},{},", thrust, diff)
}

/// Payload selecting standby mode.
pub fn standby_payload() -> String {
    "PSEAC,L,0,0,0,".to_string()
}

/// Payload selecting station-keep mode.
pub fn station_keep_payload() -> String {
    "PSEAC,R,,,,".to_string()
}

/// Payload selecting waypoint mode.
pub fn waypoint_mode_payload() -> String {
    "PSEAC,W,0,0,0,".to_string()
}

/// Payload teleporting the simulated vehicle. Coordinates are signed
/// decimal degrees; a missing heading leaves the current heading alone.
pub fn teleport_payload(latitude: f64, longitude: f64, heading: Option<f64>) -> String {
    let heading = match heading {
        Some(value) => format!("{:.1}", value),
        None => String::new(),
    };
    format!("PSEAC,S,{:.6},{:.6},{},", latitude, longitude, heading)
}

/// Payload opening a mission download of `count` lines.
pub fn start_download_payload(count: u32) -> String {
    format!("PSEAC,F,{},000,000,", count)
}

/// Payload closing a mission download.
pub fn end_download_payload() -> String {
    "PSEAC,F,000,000,000".to_string()
}

/// Payload carrying the mission throttle in percent.
pub fn throttle_payload(percent: i32) -> String {
    format!("PSEAR,0,000,{},0,000", percent)
}

/// Payload for one waypoint line of a mission download.
pub fn waypoint_payload(waypoint: &Waypoint, sequence: u32) -> String {
    let (lat_deg, lat_min, lat_hemi) = geo::to_degrees_minutes(waypoint.latitude, 'N', 'S');
    let (lon_deg, lon_min, lon_hemi) = geo::to_degrees_minutes(waypoint.longitude, 'E', 'W');
    format!(
        "OIWPL,{:02}{:07.4},{},{:03}{:07.4},{},{}",
        lat_deg, lat_min, lat_hemi, lon_deg, lon_min, lon_hemi, sequence
    )
}

/// Payload sequence for a complete mission download.
///
/// The emergency recovery point takes sequence 0 and the mission waypoints
/// follow from sequence 1. The opening line count covers every `OIWPL`
/// line, recovery point included. Throttle is clamped to 0 through 70.
pub fn mission_payloads(
    waypoints: &[Waypoint],
    emergency_recovery: Waypoint,
    throttle: i32,
) -> Vec<String> {
    let mut payloads = Vec::with_capacity(waypoints.len() + 4);
    payloads.push(start_download_payload(waypoints.len() as u32 + 1));
    payloads.push(waypoint_payload(&emergency_recovery, 0));
    for (index, waypoint) in waypoints.iter().enumerate() {
        payloads.push(waypoint_payload(waypoint, index as u32 + 1));
    }
    payloads.push(throttle_payload(throttle.clamp(0, 70)));
    payloads.push(end_download_payload());
    payloads
}
