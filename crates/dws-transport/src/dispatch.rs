//! Routing of decoded inbound messages.

use dws_core::{Role, StateName};

/// Receives inbound events after decoding.
///
/// Status replies never reach the handler; they complete pending
/// [`request_status`](crate::MessageTransport::request_status) calls instead.
pub trait InboundHandler: Send + Sync {
    /// A peer asked this device to apply `state`.
    fn on_change_state(&self, sender: &Role, state: StateName);

    /// A peer signalled liveness.
    fn on_heartbeat(&self, sender: &Role);

    /// A peer asked for this device's current state.
    fn on_status_request(&self, sender: &Role);

    /// Any other event from a peer.
    fn on_notify(&self, sender: &Role, kind: &str, args: &[String]);
}

/// What happened to one inbound payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatched {
    /// Handed to the [`InboundHandler`].
    Routed,
    /// A status reply that completed this many pending requests.
    StatusReply(usize),
    /// Not a valid message for this namespace.
    Discarded,
}
