//! Error types for peer messaging.

use std::time::Duration;

use dws_core::Role;
use thiserror::Error;

/// A result type using `TransportError`.
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while talking to peers.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP request could not be completed (timeout, refused, TLS).
    #[error("peer request failed: {0}")]
    Http(String),

    /// The peer answered with a non-success status (e.g. 401).
    #[error("peer rejected request with status {status}")]
    Rejected {
        /// HTTP status returned by the peer.
        status: u16,
    },

    /// No reply arrived within the correlation window.
    #[error("no reply from {role} within {waited:?}")]
    Timeout {
        /// Role the request was addressed to.
        role: Role,
        /// How long the request waited.
        waited: Duration,
    },

    /// The roster holds no peer with the requested role.
    #[error("no peer with role {0}")]
    NoPeer(Role),

    /// The HTTP client could not be built.
    #[error("client setup failed: {0}")]
    Setup(String),
}

impl TransportError {
    /// Returns true if this error means the batch or request was lost in transit.
    #[must_use]
    pub const fn is_delivery_failure(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Rejected { .. })
    }
}
