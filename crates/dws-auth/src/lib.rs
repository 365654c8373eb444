//! Peer authentication for divisible workspaces.
//!
//! Paired devices authenticate every message batch with HTTP Basic auth built
//! from one shared [`Credential`]. Each device provisions a local service
//! account for that credential at setup and checks inbound requests against it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  Basic auth   ┌──────────────────┐
//! │  Peer transport  │──────────────▶│  Inbound handler │
//! │  (Credential)    │               │  (AccountRegistry│
//! └──────────────────┘               │   ::verify)      │
//!                                    └────────▲─────────┘
//!                                             │ setup
//!                                    ┌────────┴─────────┐
//!                                    │ ensure_service_  │
//!                                    │ account          │
//!                                    └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use dws_auth::{ensure_service_account, AccountRegistry, Credential};
//!
//! # async fn example() -> Result<(), dws_auth::AuthError> {
//! let credential = Credential::new("divisibleWorkspace", "secret")?;
//! let registry = AccountRegistry::new();
//! ensure_service_account(&registry, &credential, &[]).await?;
//!
//! registry.verify_header(&credential.authorization_header())?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod accounts;
pub mod credential;
pub mod error;

pub use accounts::{
    ensure_service_account, identify_missing_roles, Account, AccountChange, AccountDirectory,
    AccountRegistry, DEFAULT_SERVICE_ROLES,
};
pub use credential::Credential;
pub use error::{AuthError, Result};
