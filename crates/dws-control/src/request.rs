//! Deferred state-change requests.

use std::fmt;
use std::sync::Arc;

use dws_core::{Role, StateName};

/// Why a state change was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// A peer sent `changeState`.
    Remote(Role),
    /// The heartbeat listen deadline for a role expired.
    Fallback(Role),
    /// The panel surface was pressed.
    Panel,
    /// Startup or an operator request.
    Local,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(role) => write!(f, "remote:{role}"),
            Self::Fallback(role) => write!(f, "fallback:{role}"),
            Self::Panel => f.write_str("panel"),
            Self::Local => f.write_str("local"),
        }
    }
}

/// Queues a state change for the node's event loop.
///
/// Components that may fire while a state is being applied (timers, inbound
/// handlers, panel presses) never apply a state directly; they go through
/// this.
#[derive(Clone)]
pub struct StateRequester {
    sink: Arc<dyn Fn(StateName, Origin) + Send + Sync>,
}

impl StateRequester {
    /// Wrap a sink.
    pub fn new<F>(sink: F) -> Self
    where
        F: Fn(StateName, Origin) + Send + Sync + 'static,
    {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// Request `state`.
    pub fn request(&self, state: StateName, origin: Origin) {
        (self.sink)(state, origin);
    }
}

impl fmt::Debug for StateRequester {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StateRequester")
    }
}
