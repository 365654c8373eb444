//! Core types and utilities for divisible workspaces.
//!
//! This crate provides the foundational types shared by every other crate:
//!
//! - **Identifiers**: strongly-typed roles, state names and hardware identities
//! - **Roster**: the paired devices and the resolution of the local role
//! - **Wire codec**: the namespaced text messages exchanged between devices
//! - **Timers**: owned, cancellable timer handles
//! - **Error types**: common error definitions shared across crates
//!
//! # Example
//!
//! ```
//! use dws_core::{DeviceDescriptor, DeviceIdentity, Role, Roster};
//!
//! let roster = Roster::new(vec![
//!     DeviceDescriptor::parse("Primary", "10.0.0.1", "AAAAAAAAAAAA").unwrap(),
//!     DeviceDescriptor::parse("Secondary", "10.0.0.2", "BBBBBBBBBBBB").unwrap(),
//! ])
//! .unwrap();
//!
//! let local = DeviceIdentity::new("BBBBBBBBBBBB").unwrap();
//! let resolved = roster.resolve(&local).unwrap();
//!
//! assert_eq!(resolved.role(), &Role::new("Secondary").unwrap());
//! assert_eq!(resolved.peers().len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod ids;
pub mod roster;
pub mod timer;
pub mod wire;

pub use error::{CoreError, Result};
pub use ids::{DeviceIdentity, IdError, Role, StateName};
pub use roster::{DeviceDescriptor, Resolved, Roster};
pub use timer::TimerHandle;
pub use wire::{Event, Message, WireError, DEFAULT_NAMESPACE};
