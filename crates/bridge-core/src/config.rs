//! TOML configuration shared by the host and client binaries.
//!
//! # What is TOML? (for beginners)
//!
//! TOML is a small, human-friendly configuration format. A complete file
//! for the input bridge looks like this (every field is optional):
//!
//! ```toml
//! [network]
//! reliable_port = 7201
//! discovery_port = 7202
//! bind_address = "0.0.0.0"
//! broadcast_address = "255.255.255.255"
//!
//! [timing]
//! heartbeat_interval_ms = 2000
//! max_missed_heartbeats = 5
//!
//! [security]
//! shared_secret = "change me"
//!
//! [logging]
//! level = "info"
//! ```
//!
//! # Serde default values
//!
//! Fields annotated with `#[serde(default = "some_fn")]` take the value of
//! `some_fn()` when absent, so a partial file (or no file at all) still
//! yields a complete [`AppConfig`].
//!
//! # Port convention
//!
//! The datagram (mouse) port is always `reliable_port - 1`, on both roles.
//! The host listens for the reliable stream on `reliable_port` and sends
//! datagrams to `client_ip:reliable_port - 1`; the client binds its datagram
//! socket on `advertised_port - 1`.

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::SharedSecret;

/// Secret used when none is configured. Peers using it are warned at startup.
pub const DEFAULT_SHARED_SECRET: &str = "default_secret";

/// Error type for configuration loading.
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

    /// A value parsed but is unusable.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ports and addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Port the host accepts the reliable stream on, and advertises.
    #[serde(default = "default_reliable_port")]
    pub reliable_port: u16,
    /// Port discovery beacons are sent to and listened for on.
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,
    /// Address the host's stream listener binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Destination of discovery beacons.
    #[serde(default = "default_broadcast_address")]
    pub broadcast_address: String,
}

/// Intervals, timeouts and delays, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimingConfig {
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_max_missed_heartbeats")]
    pub max_missed_heartbeats: u32,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
    #[serde(default = "default_discovery_timeout_ms")]
    pub discovery_timeout_ms: u64,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_handshake_retry_delay_ms")]
    pub handshake_retry_delay_ms: u64,
    #[serde(default = "default_host_reconnect_delay_ms")]
    pub host_reconnect_delay_ms: u64,
    #[serde(default = "default_client_reconnect_delay_ms")]
    pub client_reconnect_delay_ms: u64,
    #[serde(default = "default_liveness_poll_ms")]
    pub liveness_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityConfig {
    #[serde(default = "default_shared_secret")]
    pub shared_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_reliable_port() -> u16 {
    7201
}
fn default_discovery_port() -> u16 {
    7202
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_broadcast_address() -> String {
    "255.255.255.255".to_string()
}
fn default_heartbeat_interval_ms() -> u64 {
    2000
}
fn default_max_missed_heartbeats() -> u32 {
    5
}
fn default_handshake_timeout_ms() -> u64 {
    5000
}
fn default_broadcast_interval_ms() -> u64 {
    3000
}
fn default_discovery_timeout_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_handshake_retry_delay_ms() -> u64 {
    1000
}
fn default_host_reconnect_delay_ms() -> u64 {
    2000
}
fn default_client_reconnect_delay_ms() -> u64 {
    3000
}
fn default_liveness_poll_ms() -> u64 {
    1000
}
fn default_shared_secret() -> String {
    DEFAULT_SHARED_SECRET.to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            reliable_port: default_reliable_port(),
            discovery_port: default_discovery_port(),
            bind_address: default_bind_address(),
            broadcast_address: default_broadcast_address(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            max_missed_heartbeats: default_max_missed_heartbeats(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            discovery_timeout_ms: default_discovery_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            handshake_retry_delay_ms: default_handshake_retry_delay_ms(),
            host_reconnect_delay_ms: default_host_reconnect_delay_ms(),
            client_reconnect_delay_ms: default_client_reconnect_delay_ms(),
            liveness_poll_ms: default_liveness_poll_ms(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            shared_secret: default_shared_secret(),
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

// ── Derived values ────────────────────────────────────────────────────────────

/// Datagram port paired with a reliable-stream port.
pub fn datagram_port_for(reliable_port: u16) -> u16 {
    reliable_port.saturating_sub(1)
}

impl NetworkConfig {
    pub fn datagram_port(&self) -> u16 {
        datagram_port_for(self.reliable_port)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `bind_address` is not an IP address.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        parse_ip("network.bind_address", &self.bind_address)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `broadcast_address` is not an IP address.
    pub fn broadcast_ip(&self) -> Result<IpAddr, ConfigError> {
        parse_ip("network.broadcast_address", &self.broadcast_address)
    }
}

impl TimingConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }
    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
    pub fn handshake_retry_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_retry_delay_ms)
    }
    pub fn host_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.host_reconnect_delay_ms)
    }
    pub fn client_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.client_reconnect_delay_ms)
    }
    pub fn liveness_poll(&self) -> Duration {
        Duration::from_millis(self.liveness_poll_ms)
    }
}

impl SecurityConfig {
    pub fn secret(&self) -> SharedSecret {
        SharedSecret::new(self.shared_secret.clone())
    }

    pub fn uses_default_secret(&self) -> bool {
        self.shared_secret == DEFAULT_SHARED_SECRET
    }
}

impl AppConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the connection loops misbehave.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.network.reliable_port < 2 {
            return Err(invalid(
                "network.reliable_port",
                "must be at least 2 so the datagram port below it is usable",
            ));
        }
        self.network.bind_ip()?;
        self.network.broadcast_ip()?;

        let timing = &self.timing;
        for (field, value) in [
            ("timing.heartbeat_interval_ms", timing.heartbeat_interval_ms),
            ("timing.handshake_timeout_ms", timing.handshake_timeout_ms),
            ("timing.broadcast_interval_ms", timing.broadcast_interval_ms),
            ("timing.discovery_timeout_ms", timing.discovery_timeout_ms),
            ("timing.connect_timeout_ms", timing.connect_timeout_ms),
            ("timing.liveness_poll_ms", timing.liveness_poll_ms),
        ] {
            if value == 0 {
                return Err(invalid(field, "must be greater than zero"));
            }
        }
        if timing.max_missed_heartbeats == 0 {
            return Err(invalid(
                "timing.max_missed_heartbeats",
                "must be greater than zero",
            ));
        }
        if self.security.shared_secret.is_empty() {
            return Err(invalid("security.shared_secret", "must not be empty"));
        }
        Ok(())
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is unusable.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => AppConfig::from_toml_str(&content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Ok(AppConfig::default())
        }
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Platform location of `config.toml`, used when no `--config` is given:
///
/// - Windows: `%APPDATA%\InputBridge\config.toml`
/// - Linux:   `$XDG_CONFIG_HOME/inputbridge/config.toml` (or `~/.config/..`)
/// - macOS:   `~/Library/Application Support/InputBridge/config.toml`
///
/// Returns `None` when the base directory cannot be determined.
pub fn default_config_path() -> Option<PathBuf> {
    platform_config_dir().map(|dir| dir.join("config.toml"))
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("InputBridge"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("InputBridge")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("inputbridge"))
    }
}

fn parse_ip(field: &'static str, value: &str) -> Result<IpAddr, ConfigError> {
    value
        .parse()
        .map_err(|_| invalid(field, &format!("`{value}` is not an IP address")))
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
