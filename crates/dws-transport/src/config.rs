//! Transport configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for peer messaging.
#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
    /// URL scheme used to reach peers.
    #[serde(default = "TransportConfig::default_scheme")]
    pub scheme: String,

    /// Path of the message endpoint on every peer.
    #[serde(default = "TransportConfig::default_endpoint_path")]
    pub endpoint_path: String,

    /// Debounce window before a peer's buffer is flushed, in milliseconds.
    #[serde(default = "TransportConfig::default_debounce_ms")]
    pub debounce_ms: u64,

    /// Per-request HTTP timeout in seconds.
    #[serde(default = "TransportConfig::default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How long a status request waits for its reply, in milliseconds.
    #[serde(default = "TransportConfig::default_status_timeout_ms")]
    pub status_timeout_ms: u64,

    /// Accept self-signed peer certificates.
    #[serde(default = "TransportConfig::default_allow_insecure")]
    pub allow_insecure_https: bool,
}

impl TransportConfig {
    fn default_scheme() -> String {
        "https".to_string()
    }

    fn default_endpoint_path() -> String {
        "/v1/messages".to_string()
    }

    const fn default_debounce_ms() -> u64 {
        300
    }

    const fn default_request_timeout() -> u64 {
        5
    }

    const fn default_status_timeout_ms() -> u64 {
        5500
    }

    const fn default_allow_insecure() -> bool {
        true
    }

    /// Get the debounce window as a `Duration`.
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Get the HTTP request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the status correlation window as a `Duration`.
    #[must_use]
    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }

    /// Build the endpoint URL for a peer address.
    #[must_use]
    pub fn endpoint_url(&self, address: &str) -> String {
        format!("{}://{}{}", self.scheme, address, self.endpoint_path)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            scheme: Self::default_scheme(),
            endpoint_path: Self::default_endpoint_path(),
            debounce_ms: Self::default_debounce_ms(),
            request_timeout_secs: Self::default_request_timeout(),
            status_timeout_ms: Self::default_status_timeout_ms(),
            allow_insecure_https: Self::default_allow_insecure(),
        }
    }
}
