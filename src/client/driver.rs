//! TCP client driver for commanding the vehicle.
//!
//! Owns the socket, a background telemetry receiver and, optionally, a
//! periodic recorder thread. Command setters frame a payload and write
//! it with a short pacing gap so the vehicle's line reader keeps up.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::client::state::TelemetryState;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::protocol::geo::Waypoint;
use crate::protocol::{command, frame, telemetry, unframe, ControlMode};

/// Pause between consecutive command sends.
const COMMAND_GAP: Duration = Duration::from_millis(5);
/// Extra pause after opening and after closing a mission download.
const DOWNLOAD_SETTLE: Duration = Duration::from_millis(100);
/// Poll interval while waiting on a telemetry condition.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Periodic consumer of telemetry snapshots, driven by the thread
/// started with [`VehicleClient::start_recorder`].
pub trait Recorder: Send {
    fn record(&mut self, state: &TelemetryState);
}

impl<F> Recorder for F
where
    F: FnMut(&TelemetryState) + Send,
{
    fn record(&mut self, state: &TelemetryState) {
        self(state)
    }
}

/// Connected client: command sender plus telemetry snapshot.
pub struct VehicleClient {
    stream: TcpStream,
    state: Arc<Mutex<TelemetryState>>,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    recorder: Option<JoinHandle<()>>,
}

impl VehicleClient {
    /// Connect to the vehicle and block until the first full telemetry
    /// cycle has arrived, so every getter has data from the start.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let address = config
            .address
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| Error::Config(format!("No address resolves {}", config.address)))?;
        let stream = TcpStream::connect_timeout(&address, config.connect_timeout())?;
        stream.set_read_timeout(Some(config.read_timeout()))?;
        info!("Connected to vehicle at {}", address);

        let state = Arc::new(Mutex::new(TelemetryState::default()));
        let running = Arc::new(AtomicBool::new(true));
        let receiver = {
            let stream = stream.try_clone()?;
            let state = Arc::clone(&state);
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("telemetry-rx".to_string())
                .spawn(move || {
                    Self::receiver_loop(stream, state, running);
                })?
        };

        let client = Self {
            stream,
            state,
            running,
            receiver: Some(receiver),
            recorder: None,
        };
        client.wait_until_ready(config.ready_timeout())?;
        Ok(client)
    }

    fn wait_until_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state()?.has_full_cycle() {
                debug!("First full telemetry cycle received");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "No full telemetry cycle within {:?}",
                    timeout
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Snapshot of the accumulated telemetry.
    pub fn state(&self) -> Result<TelemetryState> {
        let state = self
            .state
            .lock()
            .map_err(|e| Error::MutexPoisoned(format!("telemetry state mutex: {}", e)))?;
        Ok(state.clone())
    }

    /// Latest reported position, if any.
    pub fn position(&self) -> Result<Option<(f64, f64)>> {
        Ok(self.state()?.position())
    }

    /// Latest reported control mode, if any.
    pub fn control_mode(&self) -> Result<Option<ControlMode>> {
        Ok(self.state()?.control_mode())
    }

    /// Direct thruster command. Thrust and differential are clamped to
    /// plus or minus 70 percent before encoding.
    pub fn set_thruster(&self, thrust: i32, diff: i32) -> Result<()> {
        let thrust = thrust.clamp(-70, 70);
        let diff = diff.clamp(-70, 70);
        self.send_payload(&command::thruster_payload(thrust, diff))
    }

    pub fn set_standby(&self) -> Result<()> {
        self.send_payload(&command::standby_payload())
    }

    pub fn set_station_keep(&self) -> Result<()> {
        self.send_payload(&command::station_keep_payload())
    }

    pub fn set_waypoint_mode(&self) -> Result<()> {
        self.send_payload(&command::waypoint_mode_payload())
    }

    /// Move the simulated vehicle to a new position, and optionally a
    /// new heading, without changing its control mode.
    pub fn teleport(&self, latitude: f64, longitude: f64, heading: Option<f64>) -> Result<()> {
        self.send_payload(&command::teleport_payload(latitude, longitude, heading))
    }

    /// Upload a mission: open the download, send the recovery point and
    /// every waypoint plus the throttle, then close the download.
    pub fn upload_mission(
        &self,
        waypoints: &[Waypoint],
        emergency_recovery: Waypoint,
        throttle: i32,
    ) -> Result<()> {
        let payloads = command::mission_payloads(waypoints, emergency_recovery, throttle);
        let last = payloads.len() - 1;
        for (index, payload) in payloads.iter().enumerate() {
            self.send_payload(payload)?;
            if index == 0 || index == last {
                // Give the vehicle time to open and close the session
                thread::sleep(DOWNLOAD_SETTLE);
            }
        }
        info!("Uploaded mission of {} waypoints", waypoints.len());
        Ok(())
    }

    /// Upload a single-waypoint mission and start pursuing it. The
    /// destination doubles as the emergency recovery point.
    pub fn go_to(&self, latitude: f64, longitude: f64, throttle: i32) -> Result<()> {
        let destination = Waypoint::new(latitude, longitude);
        self.upload_mission(&[destination], destination, throttle)?;
        self.set_waypoint_mode()
    }

    /// Block until the vehicle reports the given control mode.
    pub fn wait_for_mode(&self, mode: ControlMode, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.state()?.control_mode() == Some(mode) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout(format!(
                    "Mode {} not reported within {:?}",
                    mode, timeout
                )));
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Start a thread that hands a state snapshot to `recorder` every
    /// `interval` until the client closes.
    pub fn start_recorder<R>(&mut self, interval: Duration, mut recorder: R) -> Result<()>
    where
        R: Recorder + 'static,
    {
        if self.recorder.is_some() {
            return Err(Error::Other("Recorder already running".to_string()));
        }
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("recorder".to_string())
            .spawn(move || {
                while running.load(Ordering::Relaxed) {
                    let snapshot = state.lock().unwrap_or_else(|e| e.into_inner()).clone();
                    recorder.record(&snapshot);
                    thread::sleep(interval);
                }
                debug!("Recorder exiting");
            })?;
        self.recorder = Some(handle);
        Ok(())
    }

    /// Stop the background threads and close the socket. Safe to call
    /// more than once.
    pub fn close(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        // Closing the socket wakes a receiver parked in read
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(recorder) = self.recorder.take() {
            let _ = recorder.join();
        }
        if let Some(receiver) = self.receiver.take() {
            let _ = receiver.join();
        }
        info!("Disconnected from vehicle");
    }

    fn send_payload(&self, payload: &str) -> Result<()> {
        let sentence = frame(payload);
        (&self.stream).write_all(sentence.as_bytes())?;
        debug!("Sent {}", sentence.trim_end());
        // Pace commands out for the vehicle's line-oriented reader
        thread::sleep(COMMAND_GAP);
        Ok(())
    }

    fn receiver_loop(
        mut stream: TcpStream,
        state: Arc<Mutex<TelemetryState>>,
        running: Arc<AtomicBool>,
    ) {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 2048];
        while running.load(Ordering::Relaxed) {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    warn!("Telemetry stream closed by peer");
                    break;
                }
                Ok(n) => {
                    // Nothing is processed once teardown has begun
                    if !running.load(Ordering::Relaxed) {
                        break;
                    }
                    pending.extend_from_slice(&chunk[..n]);
                    Self::drain_telemetry(&mut pending, &state);
                }
                Err(ref e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    // Read timeout, re-check the run flag
                }
                Err(e) => {
                    if running.load(Ordering::Relaxed) {
                        warn!("Telemetry read error: {}", e);
                    }
                    break;
                }
            }
        }
        debug!("Telemetry receiver exiting");
    }

    /// Decode every complete line in the buffer into the shared state,
    /// keeping any partial trailing line for the next read.
    fn drain_telemetry(pending: &mut Vec<u8>, state: &Arc<Mutex<TelemetryState>>) {
        while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let pairs = match unframe(line).and_then(|raw| telemetry::decode(&raw)) {
                Ok(pairs) => pairs,
                Err(e) => {
                    debug!("Dropping telemetry line: {}", e);
                    continue;
                }
            };
            if pairs.is_empty() {
                continue;
            }
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            state.merge(pairs);
        }
    }
}

impl Drop for VehicleClient {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_telemetry_merges_a_cycle() {
        let state = Arc::new(Mutex::new(TelemetryState::default()));
        let mut pending = Vec::new();
        pending.extend_from_slice(
            frame(&telemetry::position_payload(25.0, -80.0, "000000.00")).as_bytes(),
        );
        pending.extend_from_slice(frame(&telemetry::attitude_payload(90.0)).as_bytes());
        pending.extend_from_slice(
            frame(&telemetry::status_payload(ControlMode::Standby, 90.0, 0.0, 0.0)).as_bytes(),
        );

        VehicleClient::drain_telemetry(&mut pending, &state);

        assert!(pending.is_empty());
        let state = state.lock().unwrap();
        assert!(state.has_full_cycle());
        assert_eq!(state.control_mode(), Some(ControlMode::Standby));
        assert_eq!(state.heading(), Some(90.0));
    }

    #[test]
    fn test_drain_telemetry_keeps_partial_line() {
        let state = Arc::new(Mutex::new(TelemetryState::default()));
        let full = frame(&telemetry::attitude_payload(45.0));
        let (head, tail) = full.split_at(full.len() - 6);

        let mut pending = head.as_bytes().to_vec();
        VehicleClient::drain_telemetry(&mut pending, &state);
        assert_eq!(state.lock().unwrap().heading(), None);

        pending.extend_from_slice(tail.as_bytes());
        VehicleClient::drain_telemetry(&mut pending, &state);
        assert!(pending.is_empty());
        assert_eq!(state.lock().unwrap().heading(), Some(45.0));
    }

    #[test]
    fn test_drain_telemetry_skips_junk_lines() {
        let state = Arc::new(Mutex::new(TelemetryState::default()));
        let mut pending = b"noise without framing\r\n".to_vec();
        pending.extend_from_slice(frame(&telemetry::attitude_payload(45.0)).as_bytes());

        VehicleClient::drain_telemetry(&mut pending, &state);

        assert!(pending.is_empty());
        assert_eq!(state.lock().unwrap().heading(), Some(45.0));
    }
}
