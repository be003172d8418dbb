//! Seahelm - remote command and telemetry for an autonomous surface vehicle
//!
//! Two endpoints speak an NMEA-0183-style sentence protocol over TCP:
//! a vehicle-side simulator that owns the kinematic state and streams
//! telemetry to every connected peer, and a client driver that sends
//! commands and keeps a live telemetry snapshot.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod sim;

// Re-export commonly used types
pub use client::{TelemetryState, VehicleClient};
pub use config::{ClientConfig, SimConfig};
pub use error::{Error, Result};
pub use protocol::{ControlMode, Waypoint};
pub use sim::VehicleServer;
