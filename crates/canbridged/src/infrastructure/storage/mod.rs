//! File-system storage: the optional TOML configuration file.

pub mod config;

pub use config::{ConfigError, DaemonConfig};
