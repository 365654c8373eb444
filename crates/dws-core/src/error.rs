//! Common error types for divisible workspaces.
//!
//! This module provides shared error types that are used across multiple crates.

use thiserror::Error;

use crate::ids::DeviceIdentity;

/// A result type using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while loading and resolving a pairing.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The pairing configuration is invalid or incomplete.
    ///
    /// This is always fatal: the node refuses to run partially configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The local hardware identity does not appear in the roster.
    #[error("configuration error: identity {0} is not part of the roster")]
    UnknownIdentity(DeviceIdentity),

    /// An invalid identifier was provided.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] crate::ids::IdError),
}

impl CoreError {
    /// Returns true if this error belongs to the configuration class.
    ///
    /// Every configuration error stops the node.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnknownIdentity(_) | Self::InvalidId(_)
        )
    }
}
