//! Authoritative vehicle state and the control-mode state machine.

use log::{debug, info, warn};

use crate::protocol::geo::{self, Waypoint};
use crate::protocol::{Command, ControlMode};
use crate::sim::{kinematics, nav};

/// Kinematic state of the hull. Coordinates are signed decimal degrees,
/// heading is degrees in [0, 360), speed is meters per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub latitude: f64,
    pub longitude: f64,
    pub heading: f64,
    pub speed: f64,
}

impl Pose {
    pub fn new(latitude: f64, longitude: f64, heading: f64) -> Self {
        Self {
            latitude,
            longitude,
            heading: geo::normalize_heading(heading),
            speed: 0.0,
        }
    }
}

/// Thrust and thrust differential demands, both in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlTargets {
    pub thrust: f64,
    pub diff: f64,
}

/// The active waypoint mission.
///
/// The cursor stays in [0, len]; a cursor equal to the waypoint count
/// marks the mission complete.
#[derive(Debug, Clone)]
pub struct Mission {
    waypoints: Vec<Waypoint>,
    cursor: usize,
    throttle: f64,
}

impl Default for Mission {
    fn default() -> Self {
        Self {
            waypoints: Vec::new(),
            cursor: 0,
            throttle: 50.0,
        }
    }
}

impl Mission {
    pub fn new(waypoints: Vec<Waypoint>, throttle: f64) -> Self {
        Self {
            waypoints,
            cursor: 0,
            throttle,
        }
    }

    /// The waypoint under pursuit, if any.
    pub fn current(&self) -> Option<Waypoint> {
        self.waypoints.get(self.cursor).copied()
    }

    pub fn advance_cursor(&mut self) {
        self.cursor = (self.cursor + 1).min(self.waypoints.len());
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.waypoints.len()
    }

    /// Whether the cursor points at the last waypoint.
    pub fn on_final_leg(&self) -> bool {
        !self.waypoints.is_empty() && self.cursor == self.waypoints.len() - 1
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
        self.cursor = 0;
    }

    pub fn push(&mut self, waypoint: Waypoint) {
        self.waypoints.push(waypoint);
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn throttle(&self) -> f64 {
        self.throttle
    }

    pub fn set_throttle(&mut self, throttle: f64) {
        self.throttle = throttle;
    }
}

/// The simulated vehicle: pose, control targets, mode and mission.
///
/// Commands mutate state through [`Vehicle::apply`]; the physics tick
/// advances it through [`Vehicle::advance`]. Mode semantics:
///
/// - `Standby` zeroes the control targets every tick.
/// - `Thruster` holds whatever targets the last command set.
/// - `StationKeep` leaves targets alone; the vehicle coasts.
/// - `Waypoint` hands targets to the navigation engine.
/// - `FileDownload` accepts mission lines and otherwise behaves like
///   the mode it will resume into.
#[derive(Debug, Clone)]
pub struct Vehicle {
    pose: Pose,
    targets: ControlTargets,
    mode: ControlMode,
    mission: Mission,
    resume_mode: ControlMode,
    expected_lines: u32,
}

impl Vehicle {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            targets: ControlTargets::default(),
            mode: ControlMode::Standby,
            mission: Mission::default(),
            resume_mode: ControlMode::Standby,
            expected_lines: 0,
        }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn targets(&self) -> ControlTargets {
        self.targets
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    /// Apply one parsed command to the state machine.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Thruster { thrust, diff } => {
                self.targets = ControlTargets { thrust, diff };
                self.mode = ControlMode::Thruster;
            }
            Command::Standby => {
                self.targets = ControlTargets::default();
                self.mode = ControlMode::Standby;
            }
            Command::StationKeep => {
                self.mode = ControlMode::StationKeep;
            }
            Command::Waypoint => {
                self.mission.reset_cursor();
                self.mode = ControlMode::Waypoint;
            }
            Command::Teleport {
                latitude,
                longitude,
                heading,
            } => {
                self.pose.latitude = latitude;
                self.pose.longitude = longitude;
                if let Some(heading) = heading {
                    self.pose.heading = geo::normalize_heading(heading);
                }
                self.pose.speed = 0.0;
                self.targets = ControlTargets::default();
            }
            Command::StartDownload { count } => {
                if self.mode != ControlMode::FileDownload {
                    self.resume_mode = self.mode;
                }
                self.mission.clear();
                self.expected_lines = count;
                self.mode = ControlMode::FileDownload;
                info!("Mission download opened, expecting {} lines", count);
            }
            Command::EndDownload => {
                if self.mode == ControlMode::FileDownload {
                    if self.mission.len() as u32 != self.expected_lines {
                        warn!(
                            "Mission download closed with {} of {} lines",
                            self.mission.len(),
                            self.expected_lines
                        );
                    } else {
                        info!("Mission download closed with {} lines", self.mission.len());
                    }
                    self.mode = self.resume_mode;
                } else {
                    debug!("Ignoring end-download outside a download session");
                }
            }
            Command::AppendWaypoint {
                latitude,
                longitude,
                sequence,
            } => {
                if self.mode == ControlMode::FileDownload {
                    self.mission.push(Waypoint::new(latitude, longitude));
                    debug!(
                        "Mission waypoint {} at {:.6}, {:.6}",
                        sequence, latitude, longitude
                    );
                } else {
                    debug!("Ignoring waypoint append outside a download session");
                }
            }
            Command::SetThrottle { throttle } => {
                self.mission.set_throttle(throttle);
            }
        }
    }

    /// Advance the vehicle by one physics tick of `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        match self.mode {
            ControlMode::Waypoint => match nav::step(&self.pose, &mut self.mission) {
                nav::NavStep::Steer { thrust, diff } => {
                    self.targets = ControlTargets { thrust, diff };
                }
                nav::NavStep::Advanced => {
                    debug!(
                        "Waypoint reached, {} of {} remaining",
                        self.mission.len() - self.mission.cursor(),
                        self.mission.len()
                    );
                }
                nav::NavStep::Complete => {
                    info!("Mission complete, returning to standby");
                    self.mode = ControlMode::Standby;
                    self.targets = ControlTargets::default();
                }
                nav::NavStep::Idle => {
                    self.targets = ControlTargets::default();
                }
            },
            ControlMode::Standby => {
                self.targets = ControlTargets::default();
            }
            _ => {}
        }
        kinematics::integrate(&mut self.pose, self.targets, dt);
    }
}
