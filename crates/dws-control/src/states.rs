//! State definitions per role.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dws_core::{Role, StateName};

use crate::error::{ControlError, Result};
use crate::machine::StateContext;

/// The side effects run when a state becomes active.
pub type EntryAction = Arc<dyn Fn(&mut StateContext<'_>) -> Result<()> + Send + Sync>;

/// Every role's states. Built once at setup.
#[derive(Clone, Default)]
pub struct StateTable {
    roles: HashMap<Role, RoleStates>,
}

impl fmt::Debug for StateTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.roles.iter().map(|(role, states)| (role, states.names())))
            .finish()
    }
}

impl StateTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name` for `role`, replacing an existing definition of the same
    /// name in place.
    #[must_use]
    pub fn define<F>(mut self, role: &Role, name: &StateName, action: F) -> Self
    where
        F: Fn(&mut StateContext<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.insert(role, name, Arc::new(action));
        self
    }

    /// Define `name` for `role` with a shared action.
    pub fn insert(&mut self, role: &Role, name: &StateName, action: EntryAction) {
        let states = self
            .roles
            .entry(role.clone())
            .or_insert_with(|| RoleStates {
                role: role.clone(),
                states: Vec::new(),
            });

        match states.states.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = action,
            None => states.states.push((name.clone(), action)),
        }
    }

    /// The states of `role`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NoStates` if nothing is defined for the role.
    pub fn for_role(&self, role: &Role) -> Result<RoleStates> {
        self.roles
            .get(role)
            .cloned()
            .ok_or_else(|| ControlError::NoStates(role.clone()))
    }

    /// Roles with at least one state.
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.roles.keys()
    }
}

/// The ordered states of one role.
#[derive(Clone)]
pub struct RoleStates {
    role: Role,
    states: Vec<(StateName, EntryAction)>,
}

impl fmt::Debug for RoleStates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleStates")
            .field("role", &self.role)
            .field("states", &self.names())
            .finish()
    }
}

impl RoleStates {
    /// The role these states belong to.
    #[must_use]
    pub const fn role(&self) -> &Role {
        &self.role
    }

    /// State names in definition order.
    #[must_use]
    pub fn names(&self) -> Vec<StateName> {
        self.states.iter().map(|(name, _)| name.clone()).collect()
    }

    /// Returns true if `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &StateName) -> bool {
        self.states.iter().any(|(n, _)| n == name)
    }

    /// The entry action for `name`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownState` if `name` is not defined.
    pub fn action(&self, name: &StateName) -> Result<EntryAction> {
        self.states
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, action)| Arc::clone(action))
            .ok_or_else(|| ControlError::UnknownState {
                role: self.role.clone(),
                state: name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::state;

    fn primary() -> Role {
        Role::new("Primary").unwrap()
    }

    #[test]
    fn keeps_definition_order() {
        let table = StateTable::new()
            .define(&primary(), &state("Divided"), |_| Ok(()))
            .define(&primary(), &state("Combined"), |_| Ok(()))
            .define(&primary(), &state("Divided"), |_| Ok(()));

        let states = table.for_role(&primary()).unwrap();
        assert_eq!(states.names(), vec![state("Divided"), state("Combined")]);
        assert!(states.contains(&state("Combined")));
    }

    #[test]
    fn unknown_lookups() {
        let table = StateTable::new().define(&primary(), &state("Divided"), |_| Ok(()));

        assert!(matches!(
            table.for_role(&Role::new("Secondary").unwrap()),
            Err(ControlError::NoStates(_))
        ));

        let states = table.for_role(&primary()).unwrap();
        assert!(matches!(
            states.action(&state("Combined")),
            Err(ControlError::UnknownState { .. })
        ));
    }
}
