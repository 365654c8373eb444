//! Role-based state control for divisible workspaces.
//!
//! Each device in a pairing runs one [`Node`]. The node applies named states
//! for its role, keeps heartbeats flowing to and from its peers, falls back
//! to an independent state when a peer goes quiet, and mirrors the active
//! state on a control panel.
//!
//! # Architecture
//!
//! ```text
//!   inbound payloads        panel presses        heartbeat deadlines
//!          │                      │                       │
//!          ▼                      ▼                       ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                Node command loop (mpsc)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ SetState
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StateMachine: persist → release subscriptions → entry      │
//! │                action → notify observers                    │
//! └─────────────────────────────────────────────────────────────┘
//!          │                 │                 │           │
//!          ▼                 ▼                 ▼           ▼
//!   ┌────────────┐   ┌──────────────┐   ┌──────────┐  ┌─────────┐
//!   │   Store    │   │  Heartbeat   │   │ EventBus │  │ Panel   │
//!   │            │   │  Monitor     │   │          │  │ Sync    │
//!   └────────────┘   └──────┬───────┘   └──────────┘  └─────────┘
//!                           ▼
//!                   MessageTransport
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use dws_control::{
//!     EventBus, InMemoryDevice, Node, NodeParts, PanelDefinition, PanelModel, StateTable,
//! };
//! use dws_core::{DeviceDescriptor, DeviceIdentity, Role, Roster, StateName};
//! use dws_store::MemoryStore;
//! use dws_transport::{HttpPeerClient, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let roster = Roster::new(vec![
//!     DeviceDescriptor::parse("Primary", "10.0.0.1", "AAAAAAAAAAAA")?,
//!     DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB")?,
//! ])?;
//! let resolved = roster.resolve(&DeviceIdentity::new("BBBBBBBBBBBB")?)?;
//!
//! let secondary = Role::new("Secondary")?;
//! let states = StateTable::new()
//!     .define(&secondary, &StateName::new("Combined")?, |ctx| {
//!         let primary = Role::new("Primary").map_err(dws_core::CoreError::from)?;
//!         let divided = StateName::new("Divided").map_err(dws_core::CoreError::from)?;
//!         ctx.heartbeat().start_sending(&primary, Duration::from_secs(60));
//!         ctx.heartbeat().start_listening(&primary, divided, Duration::from_secs(600));
//!         Ok(())
//!     })
//!     .define(&secondary, &StateName::new("Divided")?, |ctx| {
//!         ctx.heartbeat().stop_all();
//!         Ok(())
//!     });
//!
//! let events = EventBus::new();
//! let config = TransportConfig::default();
//! let node = Arc::new(Node::new(NodeParts {
//!     resolved,
//!     namespace: "divisibleWorkspaces".into(),
//!     states,
//!     store: Arc::new(MemoryStore::new()),
//!     client: Arc::new(HttpPeerClient::new(
//!         dws_auth::Credential::new("dws", "secret")?,
//!         config.clone(),
//!     )?),
//!     transport: config,
//!     device: Arc::new(InMemoryDevice::new()),
//!     panel: Arc::new(PanelModel::new(events.clone())),
//!     panel_definition: PanelDefinition::default(),
//!     events,
//! })?);
//!
//! let runner = Arc::clone(&node);
//! tokio::spawn(async move { runner.run().await });
//! node.start(StateName::new("Combined")?)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod device;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod machine;
pub mod node;
pub mod panel;
pub mod request;
pub mod states;

#[cfg(test)]
mod testing;

pub use device::{DeviceControl, FileIdentity, IdentityProvider, InMemoryDevice, StaticIdentity};
pub use error::{ControlError, Result};
pub use events::{
    local_topic, remote_topic, BusEvent, EventBus, Subscription, SubscriptionSet, PANEL_PRESS,
};
pub use heartbeat::HeartbeatMonitor;
pub use machine::{Services, StateContext, StateMachine, StateObserver};
pub use node::{Command, Node, NodeParts};
pub use panel::{LockPrompt, PanelControl, PanelDefinition, PanelModel, PanelSurface, PanelSync, PanelView};
pub use request::{Origin, StateRequester};
pub use states::{EntryAction, RoleStates, StateTable};
