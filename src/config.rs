//! Configuration loading for the simulator and the client driver.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Simulator configuration
#[derive(Clone, Debug, Deserialize)]
pub struct SimConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub vehicle: VehicleConfig,
    #[serde(default)]
    pub rates: RateConfig,
}

/// Network settings for the vehicle server
#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    /// Listen address (default: 0.0.0.0:8003)
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Broadcast write timeout in milliseconds (default: 250)
    #[serde(default = "default_write_timeout")]
    pub write_timeout_ms: u64,
}

/// Initial pose of the simulated vehicle
#[derive(Clone, Debug, Deserialize)]
pub struct VehicleConfig {
    /// Start latitude in decimal degrees (default: Miami marina)
    #[serde(default = "default_start_latitude")]
    pub start_latitude: f64,

    /// Start longitude in decimal degrees
    #[serde(default = "default_start_longitude")]
    pub start_longitude: f64,

    /// Start heading in degrees (default: 0, due north)
    #[serde(default = "default_start_heading")]
    pub start_heading: f64,
}

/// Loop rates of the server threads
#[derive(Clone, Debug, Deserialize)]
pub struct RateConfig {
    /// Physics ticks per second (default: 10)
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,

    /// Telemetry broadcast cycles per second (default: 10)
    #[serde(default = "default_telemetry_hz")]
    pub telemetry_hz: u32,

    /// Seconds between status log lines (default: 10)
    #[serde(default = "default_status_interval")]
    pub status_interval_secs: u64,
}

/// Client driver configuration
#[derive(Clone, Debug, Deserialize)]
pub struct ClientConfig {
    /// Vehicle address (default: 192.168.0.50:8003)
    #[serde(default = "default_vehicle_address")]
    pub address: String,

    /// Connect timeout in milliseconds (default: 5000)
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// How long to wait for the first full telemetry cycle (default: 10000)
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,

    /// Receiver read timeout in milliseconds (default: 500)
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
}

impl NetworkConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

impl RateConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_hz.max(1) as f64)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.telemetry_hz.max(1) as f64)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

impl SimConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: SimConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            vehicle: VehicleConfig::default(),
            rates: RateConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            write_timeout_ms: default_write_timeout(),
        }
    }
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            start_latitude: default_start_latitude(),
            start_longitude: default_start_longitude(),
            start_heading: default_start_heading(),
        }
    }
}

impl Default for RateConfig {
    fn default() -> Self {
        Self {
            tick_hz: default_tick_hz(),
            telemetry_hz: default_telemetry_hz(),
            status_interval_secs: default_status_interval(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: default_vehicle_address(),
            connect_timeout_ms: default_connect_timeout(),
            ready_timeout_ms: default_ready_timeout(),
            read_timeout_ms: default_read_timeout(),
        }
    }
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8003".to_string()
}
fn default_write_timeout() -> u64 {
    250
}
fn default_start_latitude() -> f64 {
    25.758326
}
fn default_start_longitude() -> f64 {
    -80.373864
}
fn default_start_heading() -> f64 {
    0.0
}
fn default_tick_hz() -> u32 {
    10
}
fn default_telemetry_hz() -> u32 {
    10
}
fn default_status_interval() -> u64 {
    10
}
fn default_vehicle_address() -> String {
    "192.168.0.50:8003".to_string()
}
fn default_connect_timeout() -> u64 {
    5000
}
fn default_ready_timeout() -> u64 {
    10000
}
fn default_read_timeout() -> u64 {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_sim_config_uses_defaults() {
        let config: SimConfig = toml::from_str("").unwrap();
        assert_eq!(config.network.bind_address, "0.0.0.0:8003");
        assert_eq!(config.network.write_timeout(), Duration::from_millis(250));
        assert!((config.vehicle.start_latitude - 25.758326).abs() < 1e-12);
        assert_eq!(config.rates.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.rates.status_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_sim_config_keeps_other_defaults() {
        let config: SimConfig = toml::from_str(
            "[network]\nbind_address = \"127.0.0.1:9000\"\n\n[rates]\ntick_hz = 20\n",
        )
        .unwrap();
        assert_eq!(config.network.bind_address, "127.0.0.1:9000");
        assert_eq!(config.network.write_timeout_ms, 250);
        assert_eq!(config.rates.tick_hz, 20);
        assert_eq!(config.rates.telemetry_hz, 10);
        assert_eq!(config.rates.tick_interval(), Duration::from_millis(50));
    }

    #[test]
    fn test_client_config_defaults_and_overrides() {
        let config: ClientConfig = toml::from_str("").unwrap();
        assert_eq!(config.address, "192.168.0.50:8003");
        assert_eq!(config.connect_timeout(), Duration::from_millis(5000));

        let config: ClientConfig =
            toml::from_str("address = \"10.0.0.7:8003\"\nready_timeout_ms = 2000\n").unwrap();
        assert_eq!(config.address, "10.0.0.7:8003");
        assert_eq!(config.ready_timeout(), Duration::from_millis(2000));
        assert_eq!(config.read_timeout_ms, 500);
    }

    #[test]
    fn test_zero_rates_do_not_produce_degenerate_intervals() {
        let config: SimConfig = toml::from_str("[rates]\ntick_hz = 0\n").unwrap();
        assert_eq!(config.rates.tick_interval(), Duration::from_secs(1));
    }
}
