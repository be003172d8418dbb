//! Vehicle-side simulator: state machine, physics and TCP server.

pub mod kinematics;
pub mod nav;
pub mod server;
pub mod vehicle;

pub use server::VehicleServer;
pub use vehicle::{ControlTargets, Mission, Pose, Vehicle};
