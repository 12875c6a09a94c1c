//! `MonitorConfig` and its TOML sections

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use super::defaults;
use crate::acquisition::{discovery::default_port_patterns, SerialSettings};
use crate::types::AlarmConfig;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VITALS_CONFIG";

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "monitor_config.toml";

/// Top-level monitor configuration.
///
/// Every section is optional; missing values take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub alarm: AlarmConfig,

    #[serde(default)]
    pub buffer: BufferConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub monitor: MonitorBehaviour,
}

impl MonitorConfig {
    /// Load using the standard search order, falling back to defaults.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded monitor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded monitor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No monitor config found, using built-in defaults");
        Self::default()
    }

    /// Load and validate a specific TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse(_, inner) => ConfigError::Parse(path.to_path_buf(), inner),
            other => other,
        })
    }

    /// Parse and validate TOML text. Unknown keys are logged as warnings.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        for w in super::validation::validate_unknown_keys(contents) {
            warn!("{}", w);
        }

        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(PathBuf::new(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to TOML (used to print the effective configuration).
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Check cross-field constraints, collecting every violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.buffer.capacity == 0 {
            errors.push("buffer.capacity must be > 0".to_string());
        }
        if self.buffer.visible_window == 0 {
            errors.push("buffer.visible_window must be > 0".to_string());
        }
        if self.buffer.visible_window > self.buffer.capacity {
            errors.push(format!(
                "buffer.visible_window ({}) must not exceed buffer.capacity ({})",
                self.buffer.visible_window, self.buffer.capacity
            ));
        }
        if self.buffer.diagnostic_capacity == 0 {
            errors.push("buffer.diagnostic_capacity must be > 0".to_string());
        }
        if self.persistence.flush_interval_secs == 0
            || self.persistence.flush_interval_secs > defaults::MAX_FLUSH_INTERVAL_SECS
        {
            errors.push(format!(
                "persistence.flush_interval_secs = {} is outside 1-{} s",
                self.persistence.flush_interval_secs,
                defaults::MAX_FLUSH_INTERVAL_SECS
            ));
        }
        if self.persistence.max_pending == 0 {
            errors.push("persistence.max_pending must be > 0".to_string());
        }
        if self.serial.baud_rate == 0 {
            errors.push("serial.baud_rate must be > 0".to_string());
        }
        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > defaults::MAX_READ_TIMEOUT_MS {
            errors.push(format!(
                "serial.read_timeout_ms = {} is outside 1-{} ms",
                self.serial.read_timeout_ms,
                defaults::MAX_READ_TIMEOUT_MS
            ));
        }
        if !AlarmConfig::is_valid_threshold(self.alarm.threshold_bpm) {
            errors.push(format!(
                "alarm.threshold_bpm = {} is outside {}-{} bpm",
                self.alarm.threshold_bpm,
                AlarmConfig::MIN_THRESHOLD_BPM,
                AlarmConfig::MAX_THRESHOLD_BPM
            ));
        }
        if self.server.enabled && self.server.addr.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("server.addr '{}' is not a socket address", self.server.addr));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
    Serialize(toml::ser::Error),
    Validation(Vec<String>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "Config I/O error ({}): {}", path.display(), e),
            ConfigError::Parse(path, e) => {
                write!(f, "Config parse error ({}): {}", path.display(), e)
            }
            ConfigError::Serialize(e) => write!(f, "Config serialization error: {}", e),
            ConfigError::Validation(errors) => {
                writeln!(f, "Config validation failed:")?;
                for e in errors {
                    writeln!(f, "  - {}", e)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Serial
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Explicit port (e.g. `/dev/ttyUSB0`, `COM3`); unset means auto-discover
    #[serde(default)]
    pub port: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bound on a single read before the loop re-checks commands
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Description substrings identifying the USB-UART bridge
    #[serde(default = "default_port_patterns")]
    pub port_patterns: Vec<String>,
}

fn default_baud_rate() -> u32 {
    defaults::DEFAULT_BAUD_RATE
}
fn default_read_timeout_ms() -> u64 {
    defaults::DEFAULT_READ_TIMEOUT_MS
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            port_patterns: default_port_patterns(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settings(&self) -> SerialSettings {
        SerialSettings {
            port: self.port.clone(),
            baud_rate: self.baud_rate,
            port_patterns: self.port_patterns.clone(),
        }
    }
}

// ============================================================================
// Buffers
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferConfig {
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Most-recent readings considered for display scaling
    #[serde(default = "default_visible_window")]
    pub visible_window: usize,

    /// Raw diagnostic lines retained
    #[serde(default = "default_diagnostic_capacity")]
    pub diagnostic_capacity: usize,
}

fn default_capacity() -> usize {
    defaults::DEFAULT_BUFFER_CAPACITY
}
fn default_visible_window() -> usize {
    defaults::DEFAULT_VISIBLE_WINDOW
}
fn default_diagnostic_capacity() -> usize {
    defaults::DEFAULT_DIAGNOSTIC_CAPACITY
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            visible_window: default_visible_window(),
            diagnostic_capacity: default_diagnostic_capacity(),
        }
    }
}

// ============================================================================
// Persistence
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Pending records kept across failed flushes before dropping the oldest
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(defaults::DEFAULT_DATA_DIR)
}
fn default_flush_interval_secs() -> u64 {
    defaults::DEFAULT_FLUSH_INTERVAL_SECS
}
fn default_max_pending() -> usize {
    defaults::MAX_PENDING_RECORDS
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            flush_interval_secs: default_flush_interval_secs(),
            max_pending: default_max_pending(),
        }
    }
}

impl PersistenceConfig {
    pub fn flush_interval(&self) -> chrono::Duration {
        let secs = self.flush_interval_secs.min(defaults::MAX_FLUSH_INTERVAL_SECS);
        chrono::Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX / 1_000))
    }
}

// ============================================================================
// Server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_addr")]
    pub addr: String,
}

fn default_true() -> bool {
    true
}
fn default_server_addr() -> String {
    defaults::DEFAULT_SERVER_ADDR.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            addr: default_server_addr(),
        }
    }
}

// ============================================================================
// Monitor behaviour
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorBehaviour {
    /// Connect as soon as the monitor starts
    #[serde(default = "default_true")]
    pub auto_connect: bool,

    #[serde(default = "default_replay_line_delay_ms")]
    pub replay_line_delay_ms: u64,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_replay_line_delay_ms() -> u64 {
    defaults::DEFAULT_REPLAY_LINE_DELAY_MS
}
fn default_event_capacity() -> usize {
    defaults::EVENT_CHANNEL_CAPACITY
}

impl Default for MonitorBehaviour {
    fn default() -> Self {
        Self {
            auto_connect: true,
            replay_line_delay_ms: default_replay_line_delay_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}
