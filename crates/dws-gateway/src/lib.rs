//! Peer message endpoint and node daemon for divisible workspaces.
//!
//! This crate hosts one node of a pairing:
//!
//! - Loads the pairing configuration and resolves the local role
//! - Provisions the shared credential as a local account
//! - Receives peer batches over authenticated HTTP and dispatches them
//! - Exposes the node's state, panel and local events to operators
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Peers / local operators                   │
//! │                      (HTTPS, Basic auth)                    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        dws-gateway                          │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────────┐    │
//! │  │  PeerAuth   │ │   Router    │ │  Standard pairing   │    │
//! │  │  Extractor  │ │  + Handlers │ │  presets            │    │
//! │  └─────────────┘ └─────────────┘ └─────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │  Node    │   │ Accounts │   │  Store   │
//!        │          │   │          │   │ (RocksDB)│
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use dws_core::DeviceIdentity;
//! use dws_gateway::{create_router, Daemon, PairingConfig};
//! use dws_store::RocksStore;
//! use dws_transport::HttpPeerClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pairing = PairingConfig::load(Path::new("/etc/dws/pairing.json"))?;
//! let client = HttpPeerClient::new(pairing.credentials.clone(), pairing.transport.clone())?;
//!
//! let daemon = Daemon::assemble(
//!     &pairing,
//!     &DeviceIdentity::new("BBBBBBBBBBBB")?,
//!     Arc::new(RocksStore::open("/tmp/dws")?),
//!     Arc::new(client),
//! )
//! .await?;
//! let _runner = daemon.spawn();
//!
//! let listener = tokio::net::TcpListener::bind(&pairing.gateway.listen_addr).await?;
//! axum::serve(listener, create_router(daemon.state.clone())).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod config;
pub mod daemon;
pub mod error;
pub mod handlers;
pub mod presets;
pub mod routes;
pub mod state;

pub use auth::PeerAuth;
pub use config::{GatewayConfig, HeartbeatConfig, PairingConfig, Settings};
pub use daemon::Daemon;
pub use error::{ApiError, StartupError};
pub use presets::standard_pairing;
pub use routes::create_router;
pub use state::GatewayState;
