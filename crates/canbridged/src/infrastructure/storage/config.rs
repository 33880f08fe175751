//! TOML-based configuration for the daemon.
//!
//! The daemon is fully configurable from the command line; the optional
//! file exists so deployments (systemd units, containers) can keep the
//! bus list and ports in one place.  Example:
//!
//! ```toml
//! interfaces = ["can0", "vcan1"]
//! port = 28600
//! broadcast_port = 42000
//! bind_address = "0.0.0.0"
//! verbose = false
//! ```
//!
//! Fields absent from the file take their defaults, so a file containing
//! only `interfaces = [...]` is valid.  Command-line flags override file
//! values (the merge lives in `main.rs`).

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Default TCP port clients connect to.
pub const DEFAULT_PORT: u16 = 28600;

/// Default UDP port the discovery beacon is broadcast to.
pub const DEFAULT_BROADCAST_PORT: u16 = 42000;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Complete daemon configuration, immutable once the daemon is wired.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    /// CAN interfaces served to clients and advertised in the beacon.
    pub interfaces: Vec<String>,
    /// TCP port clients connect to.
    pub port: u16,
    /// UDP port the discovery beacon is broadcast to.
    pub broadcast_port: u16,
    /// Address the TCP listener binds.
    pub bind_address: IpAddr,
    /// Log every received frame at info level (diagnostic only).
    pub verbose: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interfaces: Vec::new(),
            port: DEFAULT_PORT,
            broadcast_port: DEFAULT_BROADCAST_PORT,
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            verbose: false,
        }
    }
}

impl DaemonConfig {
    /// Loads the configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML for this schema.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_the_historical_ports() {
        let config = DaemonConfig::default();
        assert_eq!(config.port, 28600);
        assert_eq!(config.broadcast_port, 42000);
        assert_eq!(config.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert!(config.interfaces.is_empty());
        assert!(!config.verbose);
    }

    #[test]
    fn test_full_file_parses() {
        let config: DaemonConfig = toml::from_str(
            r#"
            interfaces = ["can0", "vcan1"]
            port = 29000
            broadcast_port = 43000
            bind_address = "127.0.0.1"
            verbose = true
            "#,
        )
        .unwrap();
        assert_eq!(config.interfaces, vec!["can0", "vcan1"]);
        assert_eq!(config.port, 29000);
        assert_eq!(config.broadcast_port, 43000);
        assert_eq!(config.bind_address, "127.0.0.1".parse::<IpAddr>().unwrap());
        assert!(config.verbose);
    }

    #[test]
    fn test_partial_file_fills_in_defaults() {
        let config: DaemonConfig = toml::from_str(r#"interfaces = ["vcan0"]"#).unwrap();
        assert_eq!(config.interfaces, vec!["vcan0"]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.broadcast_port, DEFAULT_BROADCAST_PORT);
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let result: Result<DaemonConfig, _> = toml::from_str("bogus = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_reports_missing_file_as_io_error() {
        let result = DaemonConfig::load(Path::new("/nonexistent/canbridged.toml"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }
}
