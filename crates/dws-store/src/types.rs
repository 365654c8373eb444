//! Domain types stored in the database.

use chrono::{DateTime, Utc};
use dws_core::StateName;
use serde::{Deserialize, Serialize};

/// The persisted current-state record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Name of the state most recently applied.
    pub state: StateName,
    /// When the state was saved.
    pub saved_at: DateTime<Utc>,
}

impl PersistedState {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn now(state: StateName) -> Self {
        Self {
            state,
            saved_at: Utc::now(),
        }
    }
}
