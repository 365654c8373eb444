//! Gateway and pairing configuration.
//!
//! The pairing itself (roster, credential, heartbeat policy, panel text) is
//! read from a JSON file. Where the process listens, where it keeps its data
//! and how it learns its own identity come from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dws_auth::Credential;
use dws_control::{FileIdentity, IdentityProvider, LockPrompt, PanelDefinition, StaticIdentity};
use dws_core::{CoreError, DeviceDescriptor, DeviceIdentity, Result, Roster, StateName, DEFAULT_NAMESPACE};
use dws_transport::TransportConfig;
use serde::Deserialize;

/// Configuration for the HTTP endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8443").
    #[serde(default = "GatewayConfig::default_listen_addr")]
    pub listen_addr: String,

    /// Allowed CORS origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    #[serde(default = "GatewayConfig::default_max_body")]
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    #[serde(default = "GatewayConfig::default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl GatewayConfig {
    fn default_listen_addr() -> String {
        "0.0.0.0:8443".to_string()
    }

    const fn default_max_body() -> usize {
        64 * 1024
    }

    const fn default_request_timeout() -> u64 {
        10
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen_addr: Self::default_listen_addr(),
            cors_origins: Vec::new(),
            max_body_bytes: Self::default_max_body(),
            request_timeout_seconds: Self::default_request_timeout(),
        }
    }
}

/// Longest heartbeat period or timeout accepted, one week.
pub const MAX_HEARTBEAT_MINUTES: u64 = 7 * 24 * 60;

/// Heartbeat policy applied by the combined states.
#[derive(Debug, Clone, Deserialize)]
pub struct HeartbeatConfig {
    /// Whether combined states exchange heartbeats at all.
    #[serde(default = "HeartbeatConfig::default_enabled")]
    pub enabled: bool,

    /// Minutes between outgoing heartbeats.
    #[serde(default = "HeartbeatConfig::default_period")]
    pub period_minutes: u64,

    /// Minutes without a heartbeat before falling back.
    #[serde(default = "HeartbeatConfig::default_timeout")]
    pub timeout_minutes: u64,

    /// State applied when a peer goes quiet.
    #[serde(default = "HeartbeatConfig::default_fallback")]
    pub fallback_state: String,
}

impl HeartbeatConfig {
    const fn default_enabled() -> bool {
        true
    }

    const fn default_period() -> u64 {
        1
    }

    const fn default_timeout() -> u64 {
        10
    }

    fn default_fallback() -> String {
        "Divided".to_string()
    }

    /// Interval between outgoing heartbeats.
    #[must_use]
    pub const fn period(&self) -> Duration {
        Duration::from_secs(self.period_minutes.saturating_mul(60))
    }

    /// Silence tolerated before the fallback state is requested.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_minutes.saturating_mul(60))
    }

    /// The fallback state as a validated name.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidId` if the name is empty or malformed.
    pub fn fallback(&self) -> Result<StateName> {
        Ok(StateName::new(self.fallback_state.as_str())?)
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            period_minutes: Self::default_period(),
            timeout_minutes: Self::default_timeout(),
            fallback_state: Self::default_fallback(),
        }
    }
}

/// Everything describing one pairing, shared by all of its devices.
#[derive(Debug, Clone, Deserialize)]
pub struct PairingConfig {
    /// Message namespace.
    #[serde(default = "PairingConfig::default_namespace")]
    pub namespace: String,

    /// Every device in the pairing.
    pub devices: Vec<DeviceDescriptor>,

    /// Credential shared by the pairing.
    pub credentials: Credential,

    /// Heartbeat policy.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Outbound messaging.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Panel button.
    #[serde(default)]
    pub panel: PanelDefinition,

    /// Prompt shown while the panel is locked.
    #[serde(default)]
    pub lock_prompt: LockPrompt,

    /// State applied at startup when nothing was persisted.
    #[serde(default = "PairingConfig::default_state")]
    pub default_state: String,

    /// Delay before the initial state is applied, in milliseconds.
    #[serde(default = "PairingConfig::default_startup_delay")]
    pub startup_delay_ms: u64,

    /// HTTP endpoint.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl PairingConfig {
    fn default_namespace() -> String {
        DEFAULT_NAMESPACE.to_string()
    }

    fn default_state() -> String {
        "Combined".to_string()
    }

    const fn default_startup_delay() -> u64 {
        2000
    }

    /// Parse and validate a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the document is not valid JSON,
    /// misses a required field, or fails validation.
    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|e| CoreError::Configuration(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if the file cannot be read or is
    /// invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Check every field the node depends on.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.namespace.contains('-') {
            return Err(CoreError::Configuration(format!(
                "namespace {:?} must be non-empty and free of '-'",
                self.namespace
            )));
        }
        self.roster()?;
        for (field, minutes) in [
            ("timeout", self.heartbeat.timeout_minutes),
            ("period", self.heartbeat.period_minutes),
        ] {
            if !(1..=MAX_HEARTBEAT_MINUTES).contains(&minutes) {
                return Err(CoreError::Configuration(format!(
                    "heartbeat {field} must be between 1 and {MAX_HEARTBEAT_MINUTES} minutes, got {minutes}"
                )));
            }
        }
        self.heartbeat.fallback()?;
        self.initial_state()?;
        Ok(())
    }

    /// The validated roster.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` for an empty roster, a bad address or
    /// a duplicated identity.
    pub fn roster(&self) -> Result<Roster> {
        Roster::new(self.devices.clone())
    }

    /// The state applied at startup.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidId` if the configured name is malformed.
    pub fn initial_state(&self) -> Result<StateName> {
        Ok(StateName::new(self.default_state.as_str())?)
    }

    /// Delay before the initial state is applied.
    #[must_use]
    pub const fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.startup_delay_ms)
    }
}

/// Settings taken from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Path of the pairing configuration (`DWS_CONFIG`).
    pub config_path: PathBuf,
    /// Listen address override (`LISTEN_ADDR`).
    pub listen_addr: Option<String>,
    /// Where the persisted state lives (`DATA_DIR`).
    pub data_dir: PathBuf,
    /// Local identity (`DWS_DEVICE_IDENTITY`).
    pub identity: Option<String>,
    /// File holding the local identity (`DWS_IDENTITY_FILE`).
    pub identity_file: Option<PathBuf>,
}

impl Settings {
    /// Read settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            config_path: lookup("DWS_CONFIG")
                .map_or_else(|| PathBuf::from("/etc/dws/pairing.json"), PathBuf::from),
            listen_addr: lookup("LISTEN_ADDR"),
            data_dir: lookup("DATA_DIR").map_or_else(|| PathBuf::from("/data/dws"), PathBuf::from),
            identity: lookup("DWS_DEVICE_IDENTITY").filter(|s| !s.is_empty()),
            identity_file: lookup("DWS_IDENTITY_FILE").map(PathBuf::from),
        }
    }

    /// Where the local identity comes from. An explicit identity wins over a
    /// file.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Configuration` if neither source is set, or
    /// `CoreError::InvalidId` if the explicit identity is malformed.
    pub fn identity_provider(&self) -> Result<Box<dyn IdentityProvider>> {
        if let Some(identity) = &self.identity {
            return Ok(Box::new(StaticIdentity::new(DeviceIdentity::new(
                identity.as_str(),
            )?)));
        }
        if let Some(path) = &self.identity_file {
            return Ok(Box::new(FileIdentity::new(path.clone())));
        }
        Err(CoreError::Configuration(
            "set DWS_DEVICE_IDENTITY or DWS_IDENTITY_FILE".into(),
        ))
    }
}
