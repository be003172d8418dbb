//! TCP server that owns the simulated vehicle.
//!
//! One acceptor thread admits connections, one reader thread per
//! connection feeds commands to the state machine, a physics thread
//! advances the vehicle at a fixed tick and a broadcast thread streams
//! telemetry to every connection. The vehicle and the connection set
//! are guarded by separate locks so command handling never waits on a
//! slow peer.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::config::SimConfig;
use crate::error::{Error, Result};
use crate::protocol::{frame, telemetry, unframe, Command};
use crate::sim::vehicle::{Pose, Vehicle};

/// How long a reader blocks before re-checking the run flag.
const READ_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A live peer in the broadcast set.
struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
}

/// The running simulator: listener, per-connection readers, physics
/// tick and telemetry broadcast.
pub struct VehicleServer {
    vehicle: Arc<Mutex<Vehicle>>,
    connections: Arc<Mutex<Vec<Connection>>>,
    running: Arc<AtomicBool>,
    local_addr: SocketAddr,
    threads: Vec<JoinHandle<()>>,
}

impl VehicleServer {
    /// Bind the listener and start all server threads.
    ///
    /// A bind failure is fatal; everything after it is handled per
    /// connection without affecting the rest of the server.
    pub fn start(config: &SimConfig) -> Result<Self> {
        let bind_address = &config.network.bind_address;
        let listener = TcpListener::bind(bind_address)
            .map_err(|e| Error::Other(format!("Failed to bind {}: {}", bind_address, e)))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let pose = Pose::new(
            config.vehicle.start_latitude,
            config.vehicle.start_longitude,
            config.vehicle.start_heading,
        );
        let vehicle = Arc::new(Mutex::new(Vehicle::new(pose)));
        let connections: Arc<Mutex<Vec<Connection>>> = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));

        info!("Vehicle server listening on {}", local_addr);

        let mut threads = Vec::with_capacity(3);

        {
            let vehicle = Arc::clone(&vehicle);
            let connections = Arc::clone(&connections);
            let running = Arc::clone(&running);
            let write_timeout = config.network.write_timeout();
            threads.push(
                thread::Builder::new()
                    .name("net-accept".to_string())
                    .spawn(move || {
                        Self::accept_loop(listener, vehicle, connections, running, write_timeout);
                    })?,
            );
        }

        {
            let vehicle = Arc::clone(&vehicle);
            let running = Arc::clone(&running);
            let tick = config.rates.tick_interval();
            threads.push(
                thread::Builder::new()
                    .name("physics".to_string())
                    .spawn(move || {
                        Self::physics_loop(vehicle, running, tick);
                    })?,
            );
        }

        {
            let vehicle = Arc::clone(&vehicle);
            let connections = Arc::clone(&connections);
            let running = Arc::clone(&running);
            let interval = config.rates.telemetry_interval();
            threads.push(
                thread::Builder::new()
                    .name("broadcast".to_string())
                    .spawn(move || {
                        Self::broadcast_loop(vehicle, connections, running, interval);
                    })?,
            );
        }

        Ok(Self {
            vehicle,
            connections,
            running,
            local_addr,
            threads,
        })
    }

    /// Address the listener actually bound, useful when the configured
    /// port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Copy of the current vehicle state.
    pub fn vehicle_snapshot(&self) -> Result<Vehicle> {
        let vehicle = self
            .vehicle
            .lock()
            .map_err(|e| Error::MutexPoisoned(format!("vehicle mutex: {}", e)))?;
        Ok(vehicle.clone())
    }

    /// Number of peers currently in the broadcast set.
    pub fn connection_count(&self) -> Result<usize> {
        let connections = self
            .connections
            .lock()
            .map_err(|e| Error::MutexPoisoned(format!("connection set mutex: {}", e)))?;
        Ok(connections.len())
    }

    /// Request shutdown and join the server threads. Reader threads are
    /// woken by closing their sockets and exit on their own.
    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Vehicle server shutting down");

        {
            let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            for connection in connections.drain(..) {
                let _ = connection.stream.shutdown(Shutdown::Both);
            }
        }

        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
        info!("Vehicle server stopped");
    }

    fn accept_loop(
        listener: TcpListener,
        vehicle: Arc<Mutex<Vehicle>>,
        connections: Arc<Mutex<Vec<Connection>>>,
        running: Arc<AtomicBool>,
        write_timeout: Duration,
    ) {
        while running.load(Ordering::Relaxed) {
            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Err(e) =
                        Self::admit(stream, peer, &vehicle, &connections, &running, write_timeout)
                    {
                        warn!("Failed to admit connection from {}: {}", peer, e);
                    }
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    // No connection pending
                    thread::sleep(Duration::from_millis(10));
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
        debug!("Accept loop exiting");
    }

    fn admit(
        stream: TcpStream,
        peer: SocketAddr,
        vehicle: &Arc<Mutex<Vehicle>>,
        connections: &Arc<Mutex<Vec<Connection>>>,
        running: &Arc<AtomicBool>,
        write_timeout: Duration,
    ) -> Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(READ_POLL_INTERVAL))?;
        stream.set_write_timeout(Some(write_timeout))?;

        let writer = stream.try_clone()?;
        {
            let mut connections = connections.lock().unwrap_or_else(|e| e.into_inner());
            connections.push(Connection {
                stream: writer,
                peer,
            });
            info!("Client connected: {} ({} total)", peer, connections.len());
        }

        let vehicle = Arc::clone(vehicle);
        let connections = Arc::clone(connections);
        let running = Arc::clone(running);
        // The reader exits on EOF, read error or shutdown; nothing joins it
        let _reader = thread::Builder::new()
            .name("conn-rx".to_string())
            .spawn(move || {
                Self::reader_loop(stream, peer, &vehicle, &running);
                Self::remove_connection(&connections, peer);
            })?;
        Ok(())
    }

    /// Read commands from one peer until it goes away.
    fn reader_loop(
        mut stream: TcpStream,
        peer: SocketAddr,
        vehicle: &Arc<Mutex<Vehicle>>,
        running: &AtomicBool,
    ) {
        let mut pending = Vec::new();
        let mut chunk = [0u8; 1024];
        while running.load(Ordering::Relaxed) {
            match stream.read(&mut chunk) {
                Ok(0) => {
                    info!("Client disconnected: {}", peer);
                    break;
                }
                Ok(n) => {
                    pending.extend_from_slice(&chunk[..n]);
                    Self::drain_lines(&mut pending, peer, vehicle);
                }
                Err(ref e)
                    if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut =>
                {
                    // Timeout only means it is time to re-check the run flag
                }
                Err(e) => {
                    warn!("Read error from {}: {}", peer, e);
                    break;
                }
            }
        }
    }

    /// Apply every complete line in the buffer, leaving any partial
    /// trailing line for the next read. Lines that fail to parse are
    /// dropped without touching vehicle state.
    fn drain_lines(pending: &mut Vec<u8>, peer: SocketAddr, vehicle: &Arc<Mutex<Vehicle>>) {
        while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match unframe(line).and_then(|raw| Command::parse(&raw)) {
                Ok(command) => {
                    let mut vehicle = vehicle.lock().unwrap_or_else(|e| e.into_inner());
                    vehicle.apply(command);
                }
                Err(e) => {
                    debug!("Dropping line from {}: {}", peer, e);
                }
            }
        }
    }

    fn remove_connection(connections: &Arc<Mutex<Vec<Connection>>>, peer: SocketAddr) {
        let mut connections = connections.lock().unwrap_or_else(|e| e.into_inner());
        connections.retain(|connection| connection.peer != peer);
    }

    fn physics_loop(vehicle: Arc<Mutex<Vehicle>>, running: Arc<AtomicBool>, tick: Duration) {
        let dt = tick.as_secs_f64();
        while running.load(Ordering::Relaxed) {
            {
                let mut vehicle = vehicle.lock().unwrap_or_else(|e| e.into_inner());
                vehicle.advance(dt);
            }
            thread::sleep(tick);
        }
        debug!("Physics loop exiting");
    }

    fn broadcast_loop(
        vehicle: Arc<Mutex<Vehicle>>,
        connections: Arc<Mutex<Vec<Connection>>>,
        running: Arc<AtomicBool>,
        interval: Duration,
    ) {
        while running.load(Ordering::Relaxed) {
            let (pose, targets, mode) = {
                let vehicle = vehicle.lock().unwrap_or_else(|e| e.into_inner());
                (vehicle.pose(), vehicle.targets(), vehicle.mode())
            };

            // One cycle is always position, attitude, status, written as
            // a single buffer so a peer never sees a torn cycle.
            let mut cycle = String::with_capacity(160);
            cycle.push_str(&frame(&telemetry::position_payload(
                pose.latitude,
                pose.longitude,
                &telemetry::utc_time_field(),
            )));
            cycle.push_str(&frame(&telemetry::attitude_payload(pose.heading)));
            cycle.push_str(&frame(&telemetry::status_payload(
                mode,
                pose.heading,
                targets.thrust,
                targets.diff,
            )));

            {
                let mut connections = connections.lock().unwrap_or_else(|e| e.into_inner());
                connections.retain_mut(|connection| {
                    match connection.stream.write_all(cycle.as_bytes()) {
                        Ok(()) => true,
                        Err(e) => {
                            warn!("Dropping client {}: {}", connection.peer, e);
                            let _ = connection.stream.shutdown(Shutdown::Both);
                            false
                        }
                    }
                });
            }

            thread::sleep(interval);
        }
        debug!("Broadcast loop exiting");
    }
}

impl Drop for VehicleServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ControlMode;

    fn test_peer() -> SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[test]
    fn test_drain_lines_applies_complete_lines_only() {
        let vehicle = Arc::new(Mutex::new(Vehicle::new(Pose::new(0.0, 0.0, 0.0))));
        let mut pending = frame("PSEAC,T,0,50,-20,").into_bytes();
        pending.extend_from_slice(b"$PSEAC,");

        VehicleServer::drain_lines(&mut pending, test_peer(), &vehicle);

        // The partial trailing line stays buffered
        assert_eq!(pending, b"$PSEAC,");
        let vehicle = vehicle.lock().unwrap();
        assert_eq!(vehicle.mode(), ControlMode::Thruster);
        assert_eq!(vehicle.targets().thrust, 50.0);
        assert_eq!(vehicle.targets().diff, -20.0);
    }

    #[test]
    fn test_drain_lines_drops_malformed_input() {
        let vehicle = Arc::new(Mutex::new(Vehicle::new(Pose::new(0.0, 0.0, 0.0))));
        let mut pending = b"not a sentence\r\n$PSEAC,Q,0,0,0,*00\r\n\r\n".to_vec();

        VehicleServer::drain_lines(&mut pending, test_peer(), &vehicle);

        assert!(pending.is_empty());
        let vehicle = vehicle.lock().unwrap();
        assert_eq!(vehicle.mode(), ControlMode::Standby);
    }

    #[test]
    fn test_drain_lines_handles_several_commands_in_one_chunk() {
        let vehicle = Arc::new(Mutex::new(Vehicle::new(Pose::new(0.0, 0.0, 0.0))));
        let mut pending = Vec::new();
        pending.extend_from_slice(frame("PSEAC,F,1,000,000,").as_bytes());
        pending.extend_from_slice(frame("OIWPL,0100.0000,N,00200.0000,W,0").as_bytes());
        pending.extend_from_slice(frame("PSEAC,F,000,000,000").as_bytes());

        VehicleServer::drain_lines(&mut pending, test_peer(), &vehicle);

        let vehicle = vehicle.lock().unwrap();
        assert_eq!(vehicle.mission().len(), 1);
        assert_eq!(vehicle.mode(), ControlMode::Standby);
    }
}
