//! ==============================================================================
//! config.rs - Relay Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `relay.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - SerialConfig: which device to open and at what data rate.
//!     - ServerConfig: where the dashboard / api / websocket listen.
//!     - DiagnosticsConfig: device banner lines that are never logged.
//!     - LoggingConfig: log level and per-reading output.
//!
//! note:
//!     the serial section has no built-in default. a relay started without
//!     a port keeps serving the initial reading until an operator restarts
//!     it with one.
//!
//! ==============================================================================

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RelayConfig {
    #[serde(default)]
    pub serial: Option<SerialConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SerialConfig {
    /// device path, e.g. "/dev/ttyACM0" or "COM12"
    pub port: String,
    pub baud_rate: u32,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

impl SerialConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout_ms: default_read_timeout_ms(),
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_http_port")]
    pub port: u16,
    /// frames buffered per websocket client before its oldest are evicted
    /// (rounded up to a power of two)
    #[serde(default = "default_subscriber_queue")]
    pub subscriber_queue: usize,
    #[serde(default = "default_heartbeat_seconds")]
    pub heartbeat_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_http_port(),
            subscriber_queue: default_subscriber_queue(),
            heartbeat_seconds: default_heartbeat_seconds(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiagnosticsConfig {
    /// substrings of device text that are dropped without logging
    #[serde(default = "default_suppressed")]
    pub suppressed: Vec<String>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self { suppressed: default_suppressed() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub show_readings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            show_readings: true,
        }
    }
}

fn default_read_timeout_ms() -> u64 { 100 }
fn default_max_line_bytes() -> usize { 4096 }
fn default_bind() -> String { "0.0.0.0".to_string() }
fn default_http_port() -> u16 { 3000 }
fn default_subscriber_queue() -> usize { 64 }
fn default_heartbeat_seconds() -> u64 { 30 }
fn default_level() -> String { "info".to_string() }
fn default_true() -> bool { true }

fn default_suppressed() -> Vec<String> {
    vec![
        "Traffic Light System Initialized".to_string(),
        "Monitoring traffic".to_string(),
    ]
}

impl RelayConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: RelayConfig = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// an explicit path must exist; the search paths are optional.
    /// runs before logging is set up, so it reports on stdout.
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            let config = Self::load(path)?;
            println!("[CONFIG] Loaded from {}", path.display());
            return Ok(config);
        }

        let paths = [
            PathBuf::from("config").join("relay.toml"),
            PathBuf::from("..").join("config").join("relay.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        println!("[CONFIG] Loaded from {}", path.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        println!("[CONFIG] Warning: Failed to load {}: {:#}", path.display(), e);
                    }
                }
            }
        }

        println!("[CONFIG] Warning: No config file found - using defaults");
        Ok(Self::default())
    }

    /// Apply command line overrides on top of the file values
    pub fn with_overrides(mut self, port: Option<String>, baud_rate: Option<u32>) -> anyhow::Result<Self> {
        if let Some(serial) = self.serial.as_mut() {
            if let Some(p) = port {
                serial.port = p;
            }
            if let Some(b) = baud_rate {
                serial.baud_rate = b;
            }
        } else {
            match (port, baud_rate) {
                (Some(p), Some(b)) => self.serial = Some(SerialConfig::new(p, b)),
                (Some(_), None) => {
                    anyhow::bail!("--port given without --baud-rate and no [serial] section to take it from")
                }
                (None, Some(_)) => {
                    anyhow::bail!("--baud-rate given without --port and no [serial] section to take it from")
                }
                (None, None) => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Some(serial) = &self.serial {
            if serial.port.trim().is_empty() {
                anyhow::bail!("serial.port must not be empty");
            }
            if serial.baud_rate == 0 {
                anyhow::bail!("serial.baud_rate must be positive");
            }
            if serial.max_line_bytes == 0 {
                anyhow::bail!("serial.max_line_bytes must be positive");
            }
        }
        if self.server.subscriber_queue == 0 {
            anyhow::bail!("server.subscriber_queue must be positive");
        }
        if self.server.heartbeat_seconds == 0 {
            anyhow::bail!("server.heartbeat_seconds must be positive");
        }
        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let (port, baud) = match &self.serial {
            Some(s) => (s.port.as_str(), s.baud_rate.to_string()),
            None => ("(none)", "-".to_string()),
        };
        println!("┌─────────────────────────────────────────┐");
        println!("│           RELAY CONFIGURATION           │");
        println!("├─────────────────────────────────────────┤");
        println!("│ Serial Port: {:<27}│", port);
        println!("│ Baud Rate: {:<29}│", baud);
        println!("│ Listen: {:<32}│", format!("{}:{}", self.server.bind, self.server.port));
        println!("│ Log Level: {:<29}│", self.logging.level);
        println!("└─────────────────────────────────────────┘");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config = RelayConfig::parse(
            r#"
            [serial]
            port = "/dev/ttyACM0"
            baud_rate = 9600

            [server]
            port = 8080

            [diagnostics]
            suppressed = ["Booting"]

            [logging]
            level = "debug"
            show_readings = false
            "#,
        )
        .unwrap();

        let serial = config.serial.unwrap();
        assert_eq!(serial.port, "/dev/ttyACM0");
        assert_eq!(serial.baud_rate, 9600);
        assert_eq!(serial.read_timeout_ms, 100);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.diagnostics.suppressed, vec!["Booting".to_string()]);
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.show_readings);
    }

    #[test]
    fn empty_file_has_no_serial_port() {
        let config = RelayConfig::parse("").unwrap();
        assert!(config.serial.is_none());
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.diagnostics.suppressed.len(), 2);
    }

    #[test]
    fn serial_section_requires_baud_rate() {
        assert!(RelayConfig::parse("[serial]\nport = \"COM3\"\n").is_err());
    }

    #[test]
    fn rejects_empty_port() {
        assert!(RelayConfig::parse("[serial]\nport = \"\"\nbaud_rate = 9600\n").is_err());
    }

    #[test]
    fn overrides_replace_file_values() {
        let config = RelayConfig::parse("[serial]\nport = \"COM3\"\nbaud_rate = 9600\n")
            .unwrap()
            .with_overrides(Some("/dev/ttyUSB0".into()), None)
            .unwrap();
        let serial = config.serial.unwrap();
        assert_eq!(serial.port, "/dev/ttyUSB0");
        assert_eq!(serial.baud_rate, 9600);
    }

    #[test]
    fn overrides_create_serial_section() {
        let config = RelayConfig::default()
            .with_overrides(Some("COM12".into()), Some(115200))
            .unwrap();
        assert_eq!(config.serial, Some(SerialConfig::new("COM12", 115200)));
    }

    #[test]
    fn port_override_alone_needs_baud_rate() {
        assert!(RelayConfig::default().with_overrides(Some("COM12".into()), None).is_err());
    }
}
