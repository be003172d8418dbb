//! Coordinate and angle helpers shared by both ends of the protocol.
//!
//! Coordinates travel on the wire in NMEA degrees-plus-decimal-minutes form
//! (`ddmm.mmmm` / `dddmm.mmmm` with a hemisphere letter) and are handled
//! internally as signed decimal degrees. Short-range navigation treats the
//! surface as locally planar.

use crate::error::{Error, Result};

/// Meters per degree of latitude; longitude scales by cos(latitude).
pub const METERS_PER_DEGREE: f64 = 111_132.0;

/// A geographic point in signed decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Decode an NMEA latitude field (`ddmm.mmmm`) with its hemisphere letter.
pub fn decode_latitude(field: &str, hemisphere: &str) -> Result<f64> {
    decode_coordinate(field, 2, hemisphere, "N", "S")
}

/// Decode an NMEA longitude field (`dddmm.mmmm`) with its hemisphere letter.
pub fn decode_longitude(field: &str, hemisphere: &str) -> Result<f64> {
    decode_coordinate(field, 3, hemisphere, "E", "W")
}

fn decode_coordinate(
    field: &str,
    degree_digits: usize,
    hemisphere: &str,
    positive: &str,
    negative: &str,
) -> Result<f64> {
    if !field.is_ascii() || field.len() <= degree_digits {
        return Err(Error::InvalidField(format!("coordinate {:?}", field)));
    }

    let (degrees, minutes) = field.split_at(degree_digits);
    let degrees: f64 = degrees
        .parse()
        .map_err(|_| Error::InvalidField(format!("coordinate degrees {:?}", field)))?;
    let minutes: f64 = minutes
        .parse()
        .map_err(|_| Error::InvalidField(format!("coordinate minutes {:?}", field)))?;

    let value = degrees + minutes / 60.0;
    if hemisphere == positive {
        Ok(value)
    } else if hemisphere == negative {
        Ok(-value)
    } else {
        Err(Error::InvalidField(format!("hemisphere {:?}", hemisphere)))
    }
}

/// Split signed decimal degrees into whole degrees, decimal minutes and the
/// hemisphere letter for the axis.
pub fn to_degrees_minutes(value: f64, positive: char, negative: char) -> (u32, f64, char) {
    let hemisphere = if value < 0.0 { negative } else { positive };
    let magnitude = value.abs();
    let degrees = magnitude.trunc();
    let minutes = (magnitude - degrees) * 60.0;
    (degrees as u32, minutes, hemisphere)
}

/// Meters per degree of longitude at the given latitude.
pub fn meters_per_degree_lon(latitude: f64) -> f64 {
    METERS_PER_DEGREE * latitude.to_radians().cos()
}

/// North/east offset in meters from one point to another, flat-earth.
pub fn local_offset(
    from_lat: f64,
    from_lon: f64,
    to_lat: f64,
    to_lon: f64,
) -> (f64, f64) {
    let north = (to_lat - from_lat) * METERS_PER_DEGREE;
    let east = (to_lon - from_lon) * meters_per_degree_lon(from_lat);
    (north, east)
}

/// Normalize a heading into [0, 360).
pub fn normalize_heading(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}

/// Normalize a signed angular error into (-180, 180].
pub fn normalize_error(degrees: f64) -> f64 {
    let mut error = degrees % 360.0;
    while error > 180.0 {
        error -= 360.0;
    }
    while error <= -180.0 {
        error += 360.0;
    }
    error
}
