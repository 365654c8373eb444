//! Durable state storage for divisible workspaces.
//!
//! The node persists exactly one value: the name of the state it applied last,
//! so that a restart resumes in the same mode. Writes are last-write-wins and
//! there is a single writer (the node's state machine).
//!
//! Two implementations are provided:
//!
//! - [`RocksStore`]: `RocksDB`-backed, survives restarts
//! - [`MemoryStore`]: in-process, for tests and ephemeral runs
//!
//! # Example
//!
//! ```no_run
//! use dws_core::StateName;
//! use dws_store::{RocksStore, Store};
//!
//! let store = RocksStore::open("/tmp/dws-db").unwrap();
//! store.save_current_state(&StateName::new("Combined").unwrap()).unwrap();
//!
//! let current = store.load_current_state().unwrap();
//! assert_eq!(current.unwrap().as_str(), "Combined");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod memory;
pub mod rocks;
pub mod schema;
pub mod types;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use rocks::RocksStore;
pub use types::PersistedState;

use dws_core::StateName;

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    /// Write a record under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn write(&self, key: &str, value: &PersistedState) -> Result<()>;

    /// Read the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails or the stored bytes
    /// cannot be decoded.
    fn read(&self, key: &str) -> Result<Option<PersistedState>>;

    /// Persist `state` as the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    fn save_current_state(&self, state: &StateName) -> Result<()> {
        self.write(keys::CURRENT_STATE, &PersistedState::now(state.clone()))
    }

    /// Load the current state, if one was ever saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails.
    fn load_current_state(&self) -> Result<Option<StateName>> {
        Ok(self.read(keys::CURRENT_STATE)?.map(|record| record.state))
    }
}
