//! Operator-side client: connection, command sending and telemetry.

pub mod driver;
pub mod state;

pub use driver::{Recorder, VehicleClient};
pub use state::TelemetryState;
