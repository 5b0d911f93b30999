//! Configuration for the SetuIO gateway
//!
//! Loaded from a TOML file. Every field has a default, so a partial file
//! only needs the values that differ from the stock Raspberry Pi setup.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Top-level gateway configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial device configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Serial device path (e.g. `/dev/ttyAMA0`, `/dev/ttyUSB0`)
    #[serde(default = "default_port")]
    pub port: String,

    /// Open Interface baud rate (115200 at power-up, 19200 alternate)
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Use the simulated robot instead of a real serial device
    #[serde(default)]
    pub stub: bool,

    /// Per-read device timeout in milliseconds
    ///
    /// Bounds how long the stream thread waits for a header byte before it
    /// checks for new stream requests, queries and shutdown.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

/// TCP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// TCP bind address for the control client
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

/// Single-shot sensor query configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SensorConfig {
    /// Bounded wait for a query response in milliseconds
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Number of sub-intervals the wait is polled in
    #[serde(default = "default_poll_slices")]
    pub poll_slices: u32,
}

/// Telemetry streaming configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamConfig {
    /// Bounded wait for the remainder of a frame once its header arrived
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    /// Interval between telemetry records sent to the TCP client
    #[serde(default = "default_telemetry_interval_ms")]
    pub telemetry_interval_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default log level (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> String {
    "/dev/ttyAMA0".to_string()
}
fn default_baud_rate() -> u32 {
    115_200
}
fn default_read_timeout_ms() -> u64 {
    20
}
fn default_bind_address() -> String {
    "0.0.0.0:4444".to_string()
}
fn default_query_timeout_ms() -> u64 {
    1000
}
fn default_poll_slices() -> u32 {
    10
}
fn default_frame_timeout_ms() -> u64 {
    100
}
fn default_telemetry_interval_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            stub: false,
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            poll_slices: default_poll_slices(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_timeout_ms: default_frame_timeout_ms(),
            telemetry_interval_ms: default_telemetry_interval_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu_io::Config;
    ///
    /// let config = Config::load("setu-io.toml")?;
    /// # Ok::<(), setu_io::Error>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the gateway cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.device.stub && self.device.port.trim().is_empty() {
            return Err(Error::Config(
                "device.port must be set unless device.stub = true".to_string(),
            ));
        }
        if self.device.baud_rate == 0 {
            return Err(Error::Config("device.baud_rate must be > 0".to_string()));
        }
        if self.device.read_timeout_ms == 0 {
            return Err(Error::Config("device.read_timeout_ms must be > 0".to_string()));
        }
        if self.sensors.query_timeout_ms == 0 || self.sensors.poll_slices == 0 {
            return Err(Error::Config(
                "sensors.query_timeout_ms and sensors.poll_slices must be > 0".to_string(),
            ));
        }
        if self.stream.frame_timeout_ms == 0 || self.stream.telemetry_interval_ms == 0 {
            return Err(Error::Config(
                "stream.frame_timeout_ms and stream.telemetry_interval_ms must be > 0"
                    .to_string(),
            ));
        }
        self.network
            .bind_address
            .parse::<SocketAddr>()
            .map_err(|e| {
                Error::Config(format!(
                    "network.bind_address '{}' is invalid: {}",
                    self.network.bind_address, e
                ))
            })?;
        Ok(())
    }
}

impl DeviceConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl SensorConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

impl StreamConfig {
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.port, "/dev/ttyAMA0");
        assert_eq!(config.device.baud_rate, 115_200);
        assert!(!config.device.stub);
        assert_eq!(config.network.bind_address, "0.0.0.0:4444");
        assert_eq!(config.sensors.query_timeout_ms, 1000);
        assert_eq!(config.sensors.poll_slices, 10);
        assert_eq!(config.stream.telemetry_interval_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[device]
port = "/dev/ttyUSB0"
stub = true

[network]
bind_address = "127.0.0.1:5000"

[logging]
level = "debug"
"#;

        let config = Config::from_toml(toml_content).unwrap();
        assert_eq!(config.device.port, "/dev/ttyUSB0");
        assert!(config.device.stub);
        // Unspecified fields keep their defaults
        assert_eq!(config.device.baud_rate, 115_200);
        assert_eq!(config.stream.frame_timeout_ms, 100);
        assert_eq!(config.network.bind_address, "127.0.0.1:5000");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_file_is_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.network.bind_address, "0.0.0.0:4444");
    }

    #[test]
    fn test_rejects_zero_poll_slices() {
        let err = Config::from_toml("[sensors]\npoll_slices = 0\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let err = Config::from_toml("[network]\nbind_address = \"not-an-address\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_port_allowed_for_stub() {
        let config = Config::from_toml("[device]\nport = \"\"\nstub = true\n").unwrap();
        assert!(config.device.stub);

        let err = Config::from_toml("[device]\nport = \"\"\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_toml_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();
        assert!(toml_string.contains("[device]"));
        assert!(toml_string.contains("[network]"));
        assert!(toml_string.contains("[stream]"));
        assert!(toml_string.contains("bind_address = \"0.0.0.0:4444\""));
    }
}
