//! Inter-device wire messages.
//!
//! Every payload exchanged between paired devices is a single line of text:
//!
//! ```text
//! <namespace>-<senderRole>-<eventType>[-<arg1>[-<arg2>]]
//! ```
//!
//! For example `divisibleWorkspaces-Primary-changeState-Combined`. Decoding
//! checks the namespace first; anything outside it is not ours and is
//! reported as [`WireError::ForeignNamespace`] so callers can drop it quietly.

use std::fmt;

use crate::ids::{Role, StateName};

/// The namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "divisibleWorkspaces";

const SEPARATOR: char = '-';
const MAX_ARGS: usize = 2;

/// A decoded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Liveness signal from the sender.
    Heartbeat,
    /// Ask the receiver to apply a state.
    ChangeState(StateName),
    /// Ask the receiver to report its current state.
    StatusRequest,
    /// Reply to a status request.
    Status(StateName),
    /// Any other notification (standby, volume, ...), forwarded to local subscribers.
    Notify {
        /// Event type as it appeared on the wire.
        kind: String,
        /// Zero to two arguments.
        args: Vec<String>,
    },
}

impl Event {
    /// The event type token used on the wire.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::ChangeState(_) => "changeState",
            Self::StatusRequest => "statusRequest",
            Self::Status(_) => "status",
            Self::Notify { kind, .. } => kind,
        }
    }
}

/// A namespaced message with its sender role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Role of the device that produced the message.
    pub sender: Role,
    /// The event carried by the message.
    pub event: Event,
}

impl Message {
    /// Create a message.
    #[must_use]
    pub const fn new(sender: Role, event: Event) -> Self {
        Self { sender, event }
    }

    /// Encode the message under `namespace`.
    #[must_use]
    pub fn encode(&self, namespace: &str) -> String {
        let mut out = format!("{namespace}{SEPARATOR}{}{SEPARATOR}{}", self.sender, self.event.kind());
        match &self.event {
            Event::Heartbeat | Event::StatusRequest => {}
            Event::ChangeState(state) | Event::Status(state) => {
                out.push(SEPARATOR);
                out.push_str(state.as_str());
            }
            Event::Notify { args, .. } => {
                for arg in args {
                    out.push(SEPARATOR);
                    out.push_str(arg);
                }
            }
        }
        out
    }

    /// Decode a payload, requiring it to belong to `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `WireError::ForeignNamespace` for payloads of another namespace
    /// and a parse error for malformed payloads inside it.
    pub fn decode(namespace: &str, payload: &str) -> Result<Self, WireError> {
        let payload = payload.trim();
        let rest = payload
            .strip_prefix(namespace)
            .and_then(|r| r.strip_prefix(SEPARATOR))
            .ok_or(WireError::ForeignNamespace)?;

        let mut parts = rest.split(SEPARATOR);
        let sender = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(WireError::Missing("sender role"))?;
        let sender = Role::new(sender).map_err(|_| WireError::Malformed("sender role"))?;

        let kind = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(WireError::Missing("event type"))?;

        let args: Vec<&str> = parts.collect();
        if args.len() > MAX_ARGS {
            return Err(WireError::TooManyArguments(args.len()));
        }
        if args.iter().any(|a| a.is_empty()) {
            return Err(WireError::Malformed("empty argument"));
        }

        let event = match kind {
            "heartbeat" => {
                expect_args(&args, 0)?;
                Event::Heartbeat
            }
            "statusRequest" => {
                expect_args(&args, 0)?;
                Event::StatusRequest
            }
            "changeState" => {
                expect_args(&args, 1)?;
                Event::ChangeState(state_arg(args[0])?)
            }
            "status" => {
                expect_args(&args, 1)?;
                Event::Status(state_arg(args[0])?)
            }
            other => Event::Notify {
                kind: other.to_string(),
                args: args.iter().map(ToString::to_string).collect(),
            },
        };

        Ok(Self { sender, event })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode(DEFAULT_NAMESPACE))
    }
}

fn expect_args(args: &[&str], expected: usize) -> Result<(), WireError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(WireError::ArgumentCount {
            expected,
            got: args.len(),
        })
    }
}

fn state_arg(arg: &str) -> Result<StateName, WireError> {
    StateName::new(arg).map_err(|_| WireError::Malformed("state name"))
}

/// Errors raised while decoding a wire payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// The payload does not start with our namespace.
    #[error("payload belongs to a different namespace")]
    ForeignNamespace,

    /// A required segment is absent.
    #[error("missing {0}")]
    Missing(&'static str),

    /// A segment is present but invalid.
    #[error("malformed {0}")]
    Malformed(&'static str),

    /// The event carries the wrong number of arguments.
    #[error("expected {expected} arguments, got {got}")]
    ArgumentCount {
        /// Arguments the event type requires.
        expected: usize,
        /// Arguments present in the payload.
        got: usize,
    },

    /// More arguments than the grammar allows.
    #[error("too many arguments: {0}")]
    TooManyArguments(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn role(s: &str) -> Role {
        Role::new(s).unwrap()
    }

    fn state(s: &str) -> StateName {
        StateName::new(s).unwrap()
    }

    #[test]
    fn decodes_heartbeat() {
        let msg = Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Secondary-heartbeat").unwrap();
        assert_eq!(msg.sender, role("Secondary"));
        assert_eq!(msg.event, Event::Heartbeat);
    }

    #[test]
    fn decodes_change_state() {
        let msg = Message::decode(
            DEFAULT_NAMESPACE,
            "divisibleWorkspaces-Primary-changeState-Combined",
        )
        .unwrap();
        assert_eq!(msg.sender, role("Primary"));
        assert_eq!(msg.event, Event::ChangeState(state("Combined")));
    }

    #[test]
    fn decodes_status_reply() {
        let msg = Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Secondary-status-Divided").unwrap();
        assert_eq!(msg.event, Event::Status(state("Divided")));
    }

    #[test]
    fn decodes_notification_with_two_args() {
        let msg = Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Primary-volume-Level-50").unwrap();
        assert_eq!(
            msg.event,
            Event::Notify {
                kind: "volume".into(),
                args: vec!["Level".into(), "50".into()],
            }
        );
    }

    #[test]
    fn encodes_in_wire_order() {
        let msg = Message::new(role("Primary"), Event::ChangeState(state("Combined")));
        assert_eq!(
            msg.encode(DEFAULT_NAMESPACE),
            "divisibleWorkspaces-Primary-changeState-Combined"
        );

        let msg = Message::new(role("Secondary"), Event::Heartbeat);
        assert_eq!(msg.encode("otherSpace"), "otherSpace-Secondary-heartbeat");
    }

    #[test]
    fn rejects_foreign_namespace() {
        assert_eq!(
            Message::decode(DEFAULT_NAMESPACE, "someMacro-Primary-heartbeat"),
            Err(WireError::ForeignNamespace)
        );
        // A shared prefix is not enough.
        assert_eq!(
            Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspacesX-Primary-heartbeat"),
            Err(WireError::ForeignNamespace)
        );
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces").is_err());
        assert!(Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Primary").is_err());
        assert!(Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces--heartbeat").is_err());
        assert_eq!(
            Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Primary-changeState"),
            Err(WireError::ArgumentCount { expected: 1, got: 0 })
        );
        assert_eq!(
            Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Primary-heartbeat-extra"),
            Err(WireError::ArgumentCount { expected: 0, got: 1 })
        );
        assert_eq!(
            Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Primary-x-a-b-c"),
            Err(WireError::TooManyArguments(3))
        );
        assert!(Message::decode(DEFAULT_NAMESPACE, "divisibleWorkspaces-Primary-x-a-").is_err());
    }
}
