//! Accumulated telemetry snapshot on the client side.

use std::collections::HashMap;

use crate::protocol::{ControlMode, TelemetryField, TelemetryValue};

/// Latest decoded value of every telemetry field seen so far.
///
/// Each incoming sentence overwrites the fields it carries; nothing
/// else changes. A field that has never arrived is absent, and callers
/// must treat absence as unknown rather than zero.
#[derive(Debug, Clone, Default)]
pub struct TelemetryState {
    fields: HashMap<TelemetryField, TelemetryValue>,
}

impl TelemetryState {
    /// Merge one decoded sentence into the snapshot, last writer wins.
    pub fn merge(&mut self, pairs: Vec<(TelemetryField, TelemetryValue)>) {
        for (field, value) in pairs {
            self.fields.insert(field, value);
        }
    }

    /// Raw value of one field, if it has arrived.
    pub fn get(&self, field: TelemetryField) -> Option<TelemetryValue> {
        self.fields.get(&field).copied()
    }

    fn number(&self, field: TelemetryField) -> Option<f64> {
        self.get(field).and_then(TelemetryValue::as_number)
    }

    /// Whether at least one sentence of each kind has been merged, the
    /// readiness gate for a fresh connection.
    pub fn has_full_cycle(&self) -> bool {
        self.fields.contains_key(&TelemetryField::Latitude)
            && self.fields.contains_key(&TelemetryField::Heading)
            && self.fields.contains_key(&TelemetryField::ControlMode)
    }

    /// Latitude and longitude in signed decimal degrees.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (
            self.number(TelemetryField::Latitude),
            self.number(TelemetryField::Longitude),
        ) {
            (Some(latitude), Some(longitude)) => Some((latitude, longitude)),
            _ => None,
        }
    }

    pub fn heading(&self) -> Option<f64> {
        self.number(TelemetryField::Heading)
    }

    pub fn pitch(&self) -> Option<f64> {
        self.number(TelemetryField::Pitch)
    }

    pub fn roll(&self) -> Option<f64> {
        self.number(TelemetryField::Roll)
    }

    pub fn heave(&self) -> Option<f64> {
        self.number(TelemetryField::Heave)
    }

    pub fn box_temperature(&self) -> Option<f64> {
        self.number(TelemetryField::BoxTemperature)
    }

    /// Forward, starboard and down acceleration.
    pub fn acceleration(&self) -> Option<(f64, f64, f64)> {
        match (
            self.number(TelemetryField::AccelForward),
            self.number(TelemetryField::AccelStarboard),
            self.number(TelemetryField::AccelDown),
        ) {
            (Some(forward), Some(starboard), Some(down)) => Some((forward, starboard, down)),
            _ => None,
        }
    }

    pub fn yaw_rate(&self) -> Option<f64> {
        self.number(TelemetryField::YawRate)
    }

    pub fn control_mode(&self) -> Option<ControlMode> {
        self.get(TelemetryField::ControlMode)
            .and_then(TelemetryValue::as_mode)
    }

    pub fn commanded_heading(&self) -> Option<f64> {
        self.number(TelemetryField::CommandedHeading)
    }

    pub fn thrust(&self) -> Option<f64> {
        self.number(TelemetryField::Thrust)
    }

    pub fn thrust_diff(&self) -> Option<f64> {
        self.number(TelemetryField::ThrustDiff)
    }
}
