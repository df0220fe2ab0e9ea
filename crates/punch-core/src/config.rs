//! Configuration system for udppunch.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PUNCH_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/udppunch/config.toml
//!   3. ~/.config/udppunch/config.toml
//!
//! Read once at startup. Nothing in the daemon re-reads it.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::wire::{DEFAULT_UDP_PORT, MAX_DATAGRAM, MAX_UDP_PAYLOAD, MIN_HANDSHAKE_LEN, RECORD_LEN};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PunchConfig {
    pub network: NetworkConfig,
    pub registry: RegistryConfig,
    pub listener: ListenerConfig,
    pub monitor: MonitorConfig,
    pub registration: RegistrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the rendezvous socket binds to.
    pub bind_addr: IpAddr,
    /// UDP port clients register and resolve on.
    pub udp_port: u16,
    /// Receive buffer per datagram. Longer datagrams are truncated.
    pub max_datagram: usize,
    /// SO_RCVBUF in bytes. 0 = kernel default.
    pub recv_buffer_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Maximum number of peers kept. The least recently used is evicted.
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Consecutive transient receive errors tolerated before the listener
    /// gives up on the socket.
    pub max_consecutive_errors: u32,
    /// Upper bound on a resolve reply, in bytes.
    pub max_reply_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Serve the HTTP dashboard and JSON API.
    pub enabled: bool,
    pub bind_addr: IpAddr,
    pub port: u16,
    /// HTTP Basic credentials for every monitor route.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Peer keys (hex) whose registrations are dropped.
    pub blocked_keys: Vec<String>,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

/// Password shipped in the default config. The daemon warns while it is in use.
pub const DEFAULT_MONITOR_PASSWORD: &str = "admin";

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            udp_port: DEFAULT_UDP_PORT,
            max_datagram: MAX_DATAGRAM,
            recv_buffer_bytes: 0,
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            max_consecutive_errors: 64,
            max_reply_bytes: MAX_UDP_PAYLOAD,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_addr: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            username: "admin".to_string(),
            password: DEFAULT_MONITOR_PASSWORD.to_string(),
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("udppunch")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PunchConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            PunchConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PUNCH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&PunchConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject settings the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry.capacity == 0 {
            return Err(ConfigError::Invalid("registry.capacity must be at least 1"));
        }
        if self.network.max_datagram < MIN_HANDSHAKE_LEN {
            return Err(ConfigError::Invalid(
                "network.max_datagram is too small to hold a handshake",
            ));
        }
        if self.listener.max_consecutive_errors == 0 {
            return Err(ConfigError::Invalid(
                "listener.max_consecutive_errors must be at least 1",
            ));
        }
        if self.listener.max_reply_bytes < RECORD_LEN {
            return Err(ConfigError::Invalid(
                "listener.max_reply_bytes is too small to hold one record",
            ));
        }
        if self.monitor.enabled && self.monitor.password.is_empty() {
            return Err(ConfigError::Invalid("monitor.password must not be empty"));
        }
        Ok(())
    }

    /// Apply PUNCH_* env var overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("PUNCH_NETWORK__BIND_ADDR") {
            if let Ok(a) = v.parse() {
                self.network.bind_addr = a;
            }
        }
        if let Some(v) = var("PUNCH_NETWORK__UDP_PORT") {
            if let Ok(p) = v.parse() {
                self.network.udp_port = p;
            }
        }
        if let Some(v) = var("PUNCH_REGISTRY__CAPACITY") {
            if let Ok(c) = v.parse() {
                self.registry.capacity = c;
            }
        }
        if let Some(v) = var("PUNCH_MONITOR__ENABLED") {
            self.monitor.enabled = v == "true" || v == "1";
        }
        if let Some(v) = var("PUNCH_MONITOR__PORT") {
            if let Ok(p) = v.parse() {
                self.monitor.port = p;
            }
        }
        if let Some(v) = var("PUNCH_MONITOR__PASSWORD") {
            self.monitor.password = v;
        }
    }
}
