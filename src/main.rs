//! Seahelm vehicle simulator daemon
//!
//! Binds a TCP listener, simulates the vehicle at a fixed tick and
//! broadcasts telemetry to every connected client. Any client may send
//! commands; all of them receive the same telemetry stream.

use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use seahelm::config::SimConfig;
use seahelm::error::{Error, Result};
use seahelm::sim::VehicleServer;

/// Parse config path from command line arguments.
///
/// Supports:
/// - `seahelm-sim <path>` (positional)
/// - `seahelm-sim --config <path>` (flag-based)
/// - `seahelm-sim -c <path>` (short flag)
fn parse_config_path() -> Option<String> {
    let args: Vec<String> = env::args().collect();

    // Look for --config or -c flag
    for i in 1..args.len() {
        if (args[i] == "--config" || args[i] == "-c") && i + 1 < args.len() {
            return Some(args[i + 1].clone());
        }
    }

    // Fall back to first positional argument (if it doesn't start with -)
    if args.len() > 1 && !args[1].starts_with('-') {
        return Some(args[1].clone());
    }

    None
}

/// An explicitly given config path must load; otherwise fall back to
/// `seahelm.toml` in the working directory, then to built-in defaults.
fn resolve_config() -> Result<SimConfig> {
    if let Some(path) = parse_config_path() {
        log::info!("Using config: {}", path);
        return SimConfig::load(Path::new(&path));
    }

    let default_path = Path::new("seahelm.toml");
    if default_path.exists() {
        log::info!("Using config: {}", default_path.display());
        return SimConfig::load(default_path);
    }

    log::info!("No config file found, using built-in defaults");
    Ok(SimConfig::default())
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Seahelm v0.1.0 starting...");

    let config = resolve_config()?;

    // Set up shutdown signal handler
    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        r.store(false, Ordering::Relaxed);
    })
    .map_err(|e| Error::Other(format!("Error setting Ctrl-C handler: {}", e)))?;

    let mut server = VehicleServer::start(&config)?;
    log::info!("Seahelm running. Press Ctrl-C to stop.");

    let status_interval = config.rates.status_interval();
    let mut last_status = Instant::now();
    while running.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(100));

        if last_status.elapsed() >= status_interval {
            last_status = Instant::now();
            match (server.vehicle_snapshot(), server.connection_count()) {
                (Ok(vehicle), Ok(peers)) => {
                    let pose = vehicle.pose();
                    log::info!(
                        "{} | {:.6}, {:.6} | hdg {:.1} | {:.2} m/s | {} client(s)",
                        vehicle.mode(),
                        pose.latitude,
                        pose.longitude,
                        pose.heading,
                        pose.speed,
                        peers
                    );
                }
                (Err(e), _) | (_, Err(e)) => {
                    log::warn!("Status unavailable: {}", e);
                }
            }
        }
    }

    // Shutdown
    log::info!("Shutting down...");
    server.stop();
    log::info!("Seahelm stopped");
    Ok(())
}
