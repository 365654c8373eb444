//! Peer messaging for divisible workspaces.
//!
//! Outgoing messages are batched per peer behind a short debounce window and
//! posted as one authenticated JSON [`Envelope`]. Inbound payloads are decoded
//! under the application namespace and routed to an [`InboundHandler`];
//! status replies complete pending [`MessageTransport::request_status`] calls.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use dws_auth::Credential;
//! use dws_core::{DeviceDescriptor, DeviceIdentity, Event, Role, Roster};
//! use dws_transport::{HttpPeerClient, MessageTransport, TransportConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let roster = Roster::new(vec![
//!     DeviceDescriptor::parse("Primary", "10.0.0.1", "AAAAAAAAAAAA")?,
//!     DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB")?,
//! ])?;
//! let resolved = roster.resolve(&DeviceIdentity::new("AAAAAAAAAAAA")?)?;
//!
//! let config = TransportConfig::default();
//! let client = HttpPeerClient::new(Credential::new("dws", "secret")?, config.clone())?;
//! let transport = MessageTransport::new(&resolved, "divisibleWorkspaces", Arc::new(client), config);
//!
//! transport.notify(&Role::new("Secondary")?, Event::Heartbeat);
//! let state = transport.request_status(&Role::new("Secondary")?).await?;
//! println!("secondary is {state}");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod config;
mod correlation;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod transport;

#[cfg(any(test, feature = "test-utils"))]
pub use client::RecordingPeerClient;
pub use client::{HttpPeerClient, PeerClient};
pub use config::TransportConfig;
pub use dispatch::{Dispatched, InboundHandler};
pub use envelope::Envelope;
pub use error::{Result, TransportError};
pub use transport::MessageTransport;
