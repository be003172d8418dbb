//! Wire protocol shared by the simulator and the client driver.

pub mod command;
pub mod geo;
pub mod sentence;
pub mod telemetry;

pub use command::Command;
pub use geo::Waypoint;
pub use sentence::{checksum, frame, unframe, RawSentence};
pub use telemetry::{ControlMode, TelemetryField, TelemetryValue};
