//! Error types for the control layer.

use dws_core::{CoreError, Role, StateName};
use dws_transport::TransportError;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// Errors that can occur while applying states or driving the panel.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The state is not defined for this device's role. Nothing was changed.
    #[error("state [{state}] is not defined for role {role}")]
    UnknownState {
        /// The local role.
        role: Role,
        /// The requested state.
        state: StateName,
    },

    /// No states are defined for this device's role.
    #[error("no states defined for role {0}")]
    NoStates(Role),

    /// An entry action failed after the state was persisted.
    #[error("entry action failed: {0}")]
    Action(String),

    /// A device configuration write failed.
    #[error("device write failed: {0}")]
    Device(String),

    /// The panel surface rejected an operation.
    #[error("panel error: {0}")]
    Panel(String),

    /// The panel is locked and does not accept presses.
    #[error("panel is locked")]
    PanelLocked,

    /// The node's command loop is no longer running.
    #[error("node is stopped")]
    NodeStopped,

    /// Configuration or identity error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Peer messaging error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl ControlError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::UnknownState { .. } => 400,
            Self::PanelLocked => 409,
            Self::NodeStopped => 503,
            Self::Transport(TransportError::Timeout { .. }) => 504,
            Self::Transport(_) => 502,
            Self::NoStates(_)
            | Self::Action(_)
            | Self::Device(_)
            | Self::Panel(_)
            | Self::Core(_) => 500,
        }
    }

    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Device(_))
    }
}
