//! Closed-loop waypoint pursuit, active only in waypoint mode.

use crate::protocol::geo;
use crate::sim::vehicle::{Mission, Pose};

/// Distance below which a waypoint counts as reached, in meters.
pub const ACCEPTANCE_RADIUS: f64 = 2.5;

/// Steering differential per degree of bearing error.
const STEERING_GAIN: f64 = 0.3;
/// Steering differential clamp, percent.
const STEERING_LIMIT: f64 = 50.0;
/// Distance to the final waypoint below which thrust is scaled down.
const FINAL_APPROACH_RADIUS: f64 = 10.0;
/// Floor of the final-approach thrust scale.
const MIN_APPROACH_FACTOR: f64 = 0.2;

/// Outcome of one navigation tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NavStep {
    /// Pursue the current waypoint with these targets.
    Steer { thrust: f64, diff: f64 },
    /// The current waypoint was reached and the cursor moved on.
    Advanced,
    /// The last waypoint was reached; the mission is over.
    Complete,
    /// Nothing to pursue; the caller should stop.
    Idle,
}

/// Advance the mission one tick against the current pose.
///
/// A tick that accepts a waypoint does not steer; pursuit of the next
/// waypoint starts on the following tick.
pub fn step(pose: &Pose, mission: &mut Mission) -> NavStep {
    let waypoint = match mission.current() {
        Some(waypoint) => waypoint,
        None => return NavStep::Idle,
    };

    let (north, east) = geo::local_offset(
        pose.latitude,
        pose.longitude,
        waypoint.latitude,
        waypoint.longitude,
    );
    let distance = (north * north + east * east).sqrt();

    if distance < ACCEPTANCE_RADIUS {
        mission.advance_cursor();
        if mission.is_complete() {
            return NavStep::Complete;
        }
        return NavStep::Advanced;
    }

    let bearing = geo::normalize_heading(east.atan2(north).to_degrees());
    let error = geo::normalize_error(bearing - pose.heading);
    let diff = (error * STEERING_GAIN).clamp(-STEERING_LIMIT, STEERING_LIMIT);

    let mut thrust = mission.throttle();
    if mission.on_final_leg() && distance < FINAL_APPROACH_RADIUS {
        thrust *= (distance / FINAL_APPROACH_RADIUS).max(MIN_APPROACH_FACTOR);
    }

    NavStep::Steer { thrust, diff }
}
