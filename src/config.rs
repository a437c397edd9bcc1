//! # Configuration Management
//!
//! Centralized configuration for the protocol client.
//!
//! Sections mirror the runtime layers: `client` picks the login endpoint and
//! wire variant, `transport` tunes the network thread and reliability link,
//! `handshake` bounds the reconnect supervisor, `logging` drives
//! [`crate::utils::logging::init_logging`].
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides (`ZONELINE_*`)

use crate::error::{ProtocolError, Result};
use crate::protocol::opcodes::WireVariant;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Largest datagram the legacy servers accept.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Default login endpoint.
pub const DEFAULT_LOGIN_ADDRESS: &str = "127.0.0.1:5998";

/// Top-level client configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ClientConfig {
    /// Endpoint and wire selection
    #[serde(default)]
    pub client: ClientSettings,

    /// Network thread and reliability link
    #[serde(default)]
    pub transport: TransportConfig,

    /// Handshake supervision
    #[serde(default)]
    pub handshake: HandshakeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ClientConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("ZONELINE_LOGIN_ADDRESS") {
            config.client.login_address = addr;
        }

        if let Ok(wire) = std::env::var("ZONELINE_WIRE") {
            match wire.to_ascii_lowercase().as_str() {
                "legacy" => config.client.wire = WireVariant::Legacy,
                "modern" => config.client.wire = WireVariant::Modern,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Unknown wire variant in ZONELINE_WIRE: {other}"
                    )))
                }
            }
        }

        if let Some(val) = env_millis("ZONELINE_RECV_TIMEOUT_MS") {
            config.transport.recv_timeout = val;
        }

        if let Some(val) = env_millis("ZONELINE_RETRANSMIT_TIMEOUT_MS") {
            config.transport.retransmit_timeout = val;
        }

        if let Some(val) = env_millis("ZONELINE_KEEPALIVE_INTERVAL_MS") {
            config.transport.keepalive_interval = val;
        }

        if let Some(val) = env_millis("ZONELINE_HANDSHAKE_TIMEOUT_MS") {
            config.handshake.timeout = val;
        }

        if let Ok(attempts) = std::env::var("ZONELINE_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(val) = attempts.parse::<u32>() {
                config.handshake.max_reconnect_attempts = val;
            }
        }

        if let Ok(level) = std::env::var("ZONELINE_LOG_LEVEL") {
            if let Ok(val) = level.parse::<Level>() {
                config.logging.log_level = val;
            }
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.client.validate());
        errors.extend(self.transport.validate());
        errors.extend(self.handshake.validate());
        errors.extend(self.logging.validate());

        if self.transport.retransmit_timeout >= self.handshake.timeout {
            errors.push(
                "Retransmit timeout should be shorter than the handshake timeout".to_string(),
            );
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Endpoint and wire selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientSettings {
    /// Login server address (e.g., "127.0.0.1:5998")
    pub login_address: String,

    /// Wire variant spoken by the target server family
    pub wire: WireVariant,

    /// Bounded wait for the network thread on shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            login_address: String::from(DEFAULT_LOGIN_ADDRESS),
            wire: WireVariant::Legacy,
            shutdown_timeout: Duration::from_secs(2),
        }
    }
}

impl ClientSettings {
    /// Validate client settings
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.login_address.is_empty() {
            errors.push("Login address cannot be empty".to_string());
        } else if self.login_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid login address format: '{}' (expected format: '127.0.0.1:5998')",
                self.login_address
            ));
        }

        if self.shutdown_timeout.as_millis() < 50 {
            errors.push("Shutdown timeout too short (minimum: 50ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Network thread and reliability link configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Local bind address for the UDP socket
    pub bind_address: String,

    /// Timed receive per loop iteration
    #[serde(with = "duration_serde")]
    pub recv_timeout: Duration,

    /// Resend an unacknowledged reliable datagram after this long
    #[serde(with = "duration_serde")]
    pub retransmit_timeout: Duration,

    /// Resends per datagram before the link is declared failed
    pub max_retransmits: u32,

    /// Send a keepalive when nothing was sent for this long
    #[serde(with = "duration_serde")]
    pub keepalive_interval: Duration,

    /// Receive buffer and datagram size cap
    pub max_datagram_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_address: String::from("0.0.0.0:0"),
            recv_timeout: Duration::from_millis(20),
            retransmit_timeout: Duration::from_millis(500),
            max_retransmits: 10,
            keepalive_interval: Duration::from_secs(5),
            max_datagram_size: MAX_DATAGRAM_SIZE,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.bind_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid bind address format: '{}' (expected format: '0.0.0.0:0')",
                self.bind_address
            ));
        }

        // The loop must stay responsive to queued commands.
        if self.recv_timeout.is_zero() {
            errors.push("Receive timeout cannot be 0".to_string());
        } else if self.recv_timeout.as_millis() > 250 {
            errors.push("Receive timeout too long (maximum: 250ms)".to_string());
        }

        if self.retransmit_timeout.as_millis() < 50 {
            errors.push("Retransmit timeout too short (minimum: 50ms)".to_string());
        }

        if self.max_retransmits == 0 {
            errors.push("Max retransmits must be greater than 0".to_string());
        }

        if self.keepalive_interval.as_millis() < 100 {
            errors.push("Keepalive interval too short (minimum: 100ms)".to_string());
        } else if self.keepalive_interval.as_secs() > 60 {
            errors.push("Keepalive interval too long (maximum: 60s)".to_string());
        }

        if self.max_datagram_size < 64 {
            errors.push("Max datagram size too small (minimum: 64 bytes)".to_string());
        } else if self.max_datagram_size > 65_507 {
            errors.push(format!(
                "Max datagram size too large: {} bytes (UDP maximum: 65507)",
                self.max_datagram_size
            ));
        }

        errors
    }
}

/// Handshake supervision configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandshakeConfig {
    /// Window after the entry request within which a payload must arrive
    #[serde(with = "duration_serde")]
    pub timeout: Duration,

    /// Reconnects before the machine fails terminally
    pub max_reconnect_attempts: u32,
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            max_reconnect_attempts: 3,
        }
    }
}

impl HandshakeConfig {
    /// Validate handshake configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.timeout.as_millis() < 100 {
            errors.push("Handshake timeout too short (minimum: 100ms)".to_string());
        } else if self.timeout.as_secs() > 120 {
            errors.push("Handshake timeout too long (maximum: 120s)".to_string());
        }

        if self.max_reconnect_attempts == 0 {
            errors.push("Max reconnect attempts must be greater than 0".to_string());
        } else if self.max_reconnect_attempts > 20 {
            errors.push(format!(
                "Max reconnect attempts too high: {} (maximum: 20)",
                self.max_reconnect_attempts
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for console logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("zoneline"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
