//! First-order kinematics for the simulated hull.

use crate::protocol::geo;
use crate::sim::vehicle::{ControlTargets, Pose};

/// Speed at full thrust, meters per second.
pub const MAX_SPEED: f64 = 2.0;
/// Speed gained per second while below the thrust target.
pub const ACCELERATION: f64 = 0.1;
/// Speed shed per second while above the thrust target.
pub const DECELERATION: f64 = 0.2;
/// Degrees of turn per tick at full differential and zero speed.
pub const TURN_RATE_FACTOR: f64 = 4.0;

/// Advance the pose by one tick of `dt` seconds under the given targets.
///
/// Speed approaches `thrust/100 * MAX_SPEED` asymmetrically, braking
/// harder than it accelerates. The turn step is per tick, scaled by
/// speed rather than by `dt`. The position update uses the latitude
/// from before the step for the longitude scale.
pub fn integrate(pose: &mut Pose, targets: ControlTargets, dt: f64) {
    let target_speed = targets.thrust / 100.0 * MAX_SPEED;
    if pose.speed < target_speed {
        pose.speed = (pose.speed + ACCELERATION * dt).min(target_speed);
    } else if pose.speed > target_speed {
        pose.speed = (pose.speed - DECELERATION * dt).max(target_speed);
    }

    let turn = targets.diff / 100.0 * TURN_RATE_FACTOR * (1.0 + pose.speed.abs());
    pose.heading = geo::normalize_heading(pose.heading + turn);

    let distance = pose.speed * dt;
    let heading = pose.heading.to_radians();
    let dlat = distance * heading.cos() / geo::METERS_PER_DEGREE;
    let dlon = distance * heading.sin() / geo::meters_per_degree_lon(pose.latitude);
    pose.latitude += dlat;
    pose.longitude += dlon;
}
