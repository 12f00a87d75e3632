//! Settings for the serial link and the polling monitor, loadable from TOML.
//!
//! ```toml
//! [port]
//! port = "/dev/ttyUSB0"
//! baud_rate = 38400
//! read_timeout_seconds = 3.0
//!
//! [monitor]
//! interval_ms = 1000
//! registers = [0x67, 0x65]
//! ```

use crate::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Where and how to open the radio's programming cable.
///
/// The defaults are those of the stock UV-K5 cable on Linux.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortSettings {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_seconds: f64,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 38_400,
            read_timeout_seconds: 3.0,
        }
    }
}

impl PortSettings {
    pub fn new<S: Into<String>>(port: S) -> Self {
        Self {
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.read_timeout_seconds).unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port.is_empty() {
            return Err(Error::Config("port must not be empty".to_string()));
        }
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be positive".to_string()));
        }
        if !self.read_timeout_seconds.is_finite() || self.read_timeout_seconds <= 0.0 {
            return Err(Error::Config(format!(
                "read_timeout_seconds must be a positive number, got {}",
                self.read_timeout_seconds
            )));
        }
        Ok(())
    }
}

/// What the polling monitor reads and how often.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    pub interval_ms: u64,
    pub registers: Vec<u8>,
    /// Stop after this many polls. Runs forever when unset.
    pub iterations: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_ms: 1000,
            registers: vec![0x67],
            iterations: None,
        }
    }
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub port: PortSettings,
    pub monitor: MonitorConfig,
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.port.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }
}
