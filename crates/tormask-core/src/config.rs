//! Configuration types for the tormask system
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

/// Interval used when the user gives no usable value
pub const DEFAULT_INTERVAL_SECS: u64 = 10;

/// Main tormask configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TormaskConfig {
    /// Control-port settings
    #[serde(default)]
    pub control: ControlConfig,

    /// Identity check and geolocation settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Change log settings
    #[serde(default)]
    pub change_log: ChangeLogConfig,

    /// Rotation loop settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Daemon lifecycle settings
    #[serde(default)]
    pub daemon: DaemonConfig,
}

impl TormaskConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.control.validate()?;
        self.probe.validate()?;
        self.change_log.validate()?;
        self.scheduler.validate()?;
        self.daemon.validate()?;
        Ok(())
    }
}

/// Control-port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Control port host
    #[serde(default = "default_control_host")]
    pub host: String,

    /// Control port
    #[serde(default = "default_control_port")]
    pub port: u16,

    /// Signal sent after authenticating
    #[serde(default = "default_signal")]
    pub signal: String,

    /// Timeout for the whole connect/write/read exchange (in seconds)
    #[serde(default = "default_control_timeout_secs")]
    pub timeout_secs: u64,

    /// Cookie file candidates, tried in order
    #[serde(default = "default_cookie_paths")]
    pub cookie_paths: Vec<String>,
}

impl ControlConfig {
    /// `host:port` form of the endpoint, IPv6 literals bracketed
    pub fn address(&self) -> String {
        match self.host.parse::<std::net::IpAddr>() {
            Ok(std::net::IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.port),
            _ => format!("{}:{}", self.host, self.port),
        }
    }

    /// Validate the control configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.trim().is_empty() {
            return Err(crate::Error::config("Control host cannot be empty"));
        }
        if self.port == 0 {
            return Err(crate::Error::config("Control port must be > 0"));
        }
        if self.signal.trim().is_empty()
            || !self.signal.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Control signal '{}' is not a valid signal name",
                self.signal
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Control timeout must be > 0"));
        }
        if self.cookie_paths.iter().all(|p| p.trim().is_empty()) {
            return Err(crate::Error::config("At least one cookie path is required"));
        }
        Ok(())
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            host: default_control_host(),
            port: default_control_port(),
            signal: default_signal(),
            timeout_secs: default_control_timeout_secs(),
            cookie_paths: default_cookie_paths(),
        }
    }
}

fn default_control_host() -> String {
    "127.0.0.1".to_string()
}

fn default_control_port() -> u16 {
    9051
}

fn default_signal() -> String {
    "NEWNYM".to_string()
}

fn default_control_timeout_secs() -> u64 {
    5
}

fn default_cookie_paths() -> Vec<String> {
    vec![
        "/run/tor/control.authcookie".to_string(),
        "/var/run/tor/control.authcookie".to_string(),
        "/var/lib/tor/control.authcookie".to_string(),
        "/var/lib/tor/control_auth_cookie".to_string(),
    ]
}

/// Identity check and geolocation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// SOCKS proxy the identity check goes through
    #[serde(default = "default_socks_proxy")]
    pub socks_proxy: String,

    /// Identity check endpoint (must return JSON)
    #[serde(default = "default_identity_url")]
    pub identity_url: String,

    /// Timeout for the identity check (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub identity_timeout_secs: u64,

    /// Timeout for each geolocation provider (in seconds)
    #[serde(default = "default_http_timeout_secs")]
    pub geo_timeout_secs: u64,
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(self.socks_proxy.starts_with("socks5h://")
            || self.socks_proxy.starts_with("socks5://")
            || self.socks_proxy.starts_with("socks4://"))
        {
            return Err(crate::Error::config(format!(
                "SOCKS proxy must use a socks4/socks5/socks5h scheme. Got: {}",
                self.socks_proxy
            )));
        }
        if !self.identity_url.starts_with("https://") && !self.identity_url.starts_with("http://")
        {
            return Err(crate::Error::config(format!(
                "Identity URL must use HTTP or HTTPS scheme. Got: {}",
                self.identity_url
            )));
        }
        if self.identity_timeout_secs == 0 || self.geo_timeout_secs == 0 {
            return Err(crate::Error::config("HTTP timeouts must be > 0"));
        }
        Ok(())
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            socks_proxy: default_socks_proxy(),
            identity_url: default_identity_url(),
            identity_timeout_secs: default_http_timeout_secs(),
            geo_timeout_secs: default_http_timeout_secs(),
        }
    }
}

fn default_socks_proxy() -> String {
    "socks5h://127.0.0.1:9050".to_string()
}

fn default_identity_url() -> String {
    "https://check.torproject.org/api/ip".to_string()
}

fn default_http_timeout_secs() -> u64 {
    10
}

/// Change log configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeLogConfig {
    /// Append-only text file
    File {
        /// Path to the log file
        path: String,
    },

    /// In-memory log (not persistent)
    #[default]
    Memory,
}

impl ChangeLogConfig {
    /// Validate the change log configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ChangeLogConfig::File { path } if path.trim().is_empty() => {
                Err(crate::Error::config("Change log path cannot be empty"))
            }
            _ => Ok(()),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between rotations
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Lines shown by the recent-log command
    #[serde(default = "default_recent_log_lines")]
    pub recent_log_lines: usize,

    /// Capacity of the scheduler event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SchedulerConfig {
    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Rotation interval must be > 0"));
        }
        if self.recent_log_lines == 0 {
            return Err(crate::Error::config("Recent log lines must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            recent_log_lines: default_recent_log_lines(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_recent_log_lines() -> usize {
    5
}

fn default_event_channel_capacity() -> usize {
    256
}

/// Daemon lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Stop the daemon when the session ends
    #[serde(default = "default_stop_on_exit")]
    pub stop_on_exit: bool,

    /// Service unit name handed to the service manager
    #[serde(default = "default_unit")]
    pub unit: String,
}

impl DaemonConfig {
    /// Validate the daemon configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.stop_on_exit && self.unit.trim().is_empty() {
            return Err(crate::Error::config("Daemon unit cannot be empty"));
        }
        Ok(())
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            stop_on_exit: default_stop_on_exit(),
            unit: default_unit(),
        }
    }
}

fn default_stop_on_exit() -> bool {
    true
}

fn default_unit() -> String {
    "tor".to_string()
}

/// Parse a user-supplied rotation interval
///
/// Blank, non-numeric and non-positive input all fall back to
/// [`DEFAULT_INTERVAL_SECS`].
pub fn parse_interval(input: &str) -> u64 {
    match input.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => secs,
        _ => DEFAULT_INTERVAL_SECS,
    }
}
