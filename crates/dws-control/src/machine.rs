//! The state machine for the local device.
//!
//! Applying a state runs these steps under one lock:
//!
//! 1. check the name is defined for the local role (nothing changes otherwise)
//! 2. persist the name
//! 3. release every subscription the previous state registered
//! 4. run the new state's entry action
//!
//! Observers (the panel) are then told about the new state, even when the
//! entry action failed, because the state has already been persisted.

use std::fmt;
use std::sync::Arc;

use dws_core::{Event, Role, StateName};
use dws_store::Store;
use dws_transport::MessageTransport;
use parking_lot::{Mutex, RwLock};

use crate::device::DeviceControl;
use crate::error::Result;
use crate::events::{local_topic, BusEvent, EventBus, Subscription, SubscriptionSet};
use crate::heartbeat::HeartbeatMonitor;
use crate::panel::PanelSurface;
use crate::request::{Origin, StateRequester};
use crate::states::RoleStates;

/// The collaborators entry actions act on.
#[derive(Clone)]
pub struct Services {
    /// Peer messaging.
    pub transport: MessageTransport,
    /// Heartbeat send/listen entries.
    pub heartbeat: HeartbeatMonitor,
    /// Local event bus.
    pub events: EventBus,
    /// Local device configuration.
    pub device: Arc<dyn DeviceControl>,
    /// The UI surface.
    pub panel: Arc<dyn PanelSurface>,
    /// Queues state changes for the event loop.
    pub requester: StateRequester,
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("transport", &self.transport)
            .field("heartbeat", &self.heartbeat)
            .field("events", &self.events)
            .finish_non_exhaustive()
    }
}

/// What an entry action can reach while its state is being applied.
pub struct StateContext<'a> {
    services: &'a Services,
    subscriptions: &'a mut SubscriptionSet,
    state: &'a StateName,
}

impl<'a> StateContext<'a> {
    /// The local role.
    #[must_use]
    pub fn role(&self) -> &Role {
        self.services.transport.local_role()
    }

    /// The state being applied.
    #[must_use]
    pub const fn state(&self) -> &StateName {
        self.state
    }

    /// Heartbeat entries.
    #[must_use]
    pub const fn heartbeat(&self) -> &'a HeartbeatMonitor {
        &self.services.heartbeat
    }

    /// Peer messaging.
    #[must_use]
    pub const fn transport(&self) -> &'a MessageTransport {
        &self.services.transport
    }

    /// The local event bus.
    #[must_use]
    pub const fn events(&self) -> &'a EventBus {
        &self.services.events
    }

    /// The local device.
    #[must_use]
    pub fn device(&self) -> &'a dyn DeviceControl {
        self.services.device.as_ref()
    }

    /// The UI surface.
    #[must_use]
    pub fn panel(&self) -> &'a dyn PanelSurface {
        self.services.panel.as_ref()
    }

    /// Subscribe to `topic` until the next state is applied.
    pub fn subscribe<F>(&mut self, topic: impl Into<String>, handler: F)
    where
        F: Fn(&BusEvent) + Send + Sync + 'static,
    {
        let subscription = self.services.events.subscribe(topic, handler);
        self.subscriptions.push(subscription);
    }

    /// Release `subscription` when the next state is applied.
    pub fn track(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Relay local `kind` events to every peer holding `role` until the next
    /// state is applied.
    pub fn forward(&mut self, kind: &str, role: &Role) {
        let transport = self.services.transport.clone();
        let target = role.clone();
        let event_kind = kind.to_string();
        self.subscribe(local_topic(kind), move |event| {
            transport.notify(
                &target,
                Event::Notify {
                    kind: event_kind.clone(),
                    args: event.args.clone(),
                },
            );
        });
    }

    /// Queue a change to `state` after this one has been applied.
    pub fn request_state(&self, state: StateName) {
        self.services.requester.request(state, Origin::Local);
    }
}

/// Called with every applied state.
pub type StateObserver = Arc<dyn Fn(&StateName) + Send + Sync>;

/// Applies, persists and restores the local device's state.
pub struct StateMachine {
    states: RoleStates,
    store: Arc<dyn Store>,
    services: Services,
    current: RwLock<Option<StateName>>,
    active: Mutex<SubscriptionSet>,
    observers: RwLock<Vec<StateObserver>>,
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("states", &self.states)
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl StateMachine {
    /// Create a machine for the local role's `states`.
    #[must_use]
    pub fn new(states: RoleStates, store: Arc<dyn Store>, services: Services) -> Self {
        Self {
            states,
            store,
            services,
            current: RwLock::new(None),
            active: Mutex::new(SubscriptionSet::new()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The local role.
    #[must_use]
    pub const fn role(&self) -> &Role {
        self.states.role()
    }

    /// State names for the local role, in definition order.
    #[must_use]
    pub fn state_names(&self) -> Vec<StateName> {
        self.states.names()
    }

    /// The collaborators passed to entry actions.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// Register an observer for applied states.
    pub fn observe<F>(&self, observer: F)
    where
        F: Fn(&StateName) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// The most recently applied state, if any.
    #[must_use]
    pub fn get_state(&self) -> Option<StateName> {
        self.current.read().clone()
    }

    /// Number of subscriptions held by the active state.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.active.lock().len()
    }

    /// Apply `name`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownState` if `name` is not defined for the
    /// role, with no side effects, or the entry action's error. An entry
    /// action error leaves the new state persisted and current.
    pub fn set_state(&self, name: &StateName) -> Result<()> {
        let action = self.states.action(name)?;

        let outcome = {
            let mut active = self.active.lock();

            if let Err(e) = self.store.save_current_state(name) {
                tracing::warn!(state = %name, error = %e, "Failed to persist state");
            }
            *self.current.write() = Some(name.clone());

            let released = active.clear();
            tracing::info!(
                role = %self.role(),
                state = %name,
                released,
                "Applying state"
            );

            let mut ctx = StateContext {
                services: &self.services,
                subscriptions: &mut *active,
                state: name,
            };
            action(&mut ctx)
        };

        if let Err(e) = &outcome {
            tracing::error!(state = %name, error = %e, "Entry action failed");
        }

        let observers = self.observers.read().clone();
        for observer in &observers {
            observer(name);
        }

        outcome
    }

    /// Apply the persisted state, or `default` if there is none.
    ///
    /// A persisted name that is no longer defined for the role, or a store
    /// read failure, is logged and replaced by `default`. Returns the state
    /// that was applied.
    ///
    /// # Errors
    ///
    /// Returns the error of [`set_state`](Self::set_state).
    pub fn restore_state(&self, default: &StateName) -> Result<StateName> {
        let stored = match self.store.load_current_state() {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read stored state, using default");
                None
            }
        };

        let target = match stored {
            Some(state) if self.states.contains(&state) => {
                tracing::info!(%state, "Restoring stored state");
                state
            }
            Some(state) => {
                tracing::warn!(
                    %state,
                    default = %default,
                    "Stored state is not defined for this role, using default"
                );
                default.clone()
            }
            None => {
                tracing::info!(state = %default, "No stored state, applying default");
                default.clone()
            }
        };

        self.set_state(&target)?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use dws_store::{MemoryStore, PersistedState, StoreError};

    use super::*;
    use crate::error::ControlError;
    use crate::states::StateTable;
    use crate::testing::{fixture, state};

    fn secondary() -> Role {
        Role::new("Secondary").unwrap()
    }

    fn table() -> StateTable {
        StateTable::new()
            .define(&secondary(), &state("Combined"), |ctx| {
                ctx.subscribe("local.standby", |_| {});
                Ok(())
            })
            .define(&secondary(), &state("Divided"), |ctx| {
                ctx.device().configure("Standby.Control", "On")
            })
            .define(&secondary(), &state("Broken"), |_| {
                Err(ControlError::Action("device offline".into()))
            })
    }

    fn machine(store: Arc<dyn Store>) -> (StateMachine, crate::testing::Fixture) {
        let fixture = fixture("BBBBBBBBBBBB");
        let states = table().for_role(&secondary()).unwrap();
        (
            StateMachine::new(states, store, fixture.services.clone()),
            fixture,
        )
    }

    struct FailingStore;

    impl Store for FailingStore {
        fn write(&self, _: &str, _: &PersistedState) -> dws_store::Result<()> {
            Err(StoreError::Database("disk full".into()))
        }

        fn read(&self, _: &str) -> dws_store::Result<Option<PersistedState>> {
            Err(StoreError::Database("disk gone".into()))
        }
    }

    #[tokio::test]
    async fn unknown_state_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (machine, _fx) = machine(store.clone());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        machine.observe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = machine.set_state(&state("Merged")).unwrap_err();

        assert!(matches!(err, ControlError::UnknownState { .. }));
        assert!(machine.get_state().is_none());
        assert!(store.is_empty());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn reapplying_keeps_only_latest_subscriptions() {
        let (machine, fx) = machine(Arc::new(MemoryStore::new()));

        machine.set_state(&state("Combined")).unwrap();
        machine.set_state(&state("Combined")).unwrap();

        assert_eq!(machine.active_subscriptions(), 1);
        assert_eq!(fx.services.events.subscriber_count("local.standby"), 1);

        machine.set_state(&state("Divided")).unwrap();
        assert_eq!(machine.active_subscriptions(), 0);
        assert_eq!(fx.services.events.subscriber_count("local.standby"), 0);
        assert_eq!(fx.device.setting("Standby.Control").as_deref(), Some("On"));
    }

    #[tokio::test]
    async fn persists_before_failing_action() {
        let store = Arc::new(MemoryStore::new());
        let (machine, _fx) = machine(store.clone());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        machine.observe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = machine.set_state(&state("Broken")).unwrap_err();

        assert!(matches!(err, ControlError::Action(_)));
        assert_eq!(store.load_current_state().unwrap(), Some(state("Broken")));
        assert_eq!(machine.get_state(), Some(state("Broken")));
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn restore_recovers_after_restart() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        {
            let (machine, _fx) = machine(Arc::clone(&store));
            machine.set_state(&state("Combined")).unwrap();
        }

        let (restarted, _fx) = machine(store);
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        restarted.observe(move |state| log.lock().push(state.clone()));

        let applied = restarted.restore_state(&state("Divided")).unwrap();

        assert_eq!(applied, state("Combined"));
        assert_eq!(*seen.lock(), vec![state("Combined")]);
    }

    #[tokio::test]
    async fn restore_without_record_uses_default() {
        let (machine, _fx) = machine(Arc::new(MemoryStore::new()));
        let applied = machine.restore_state(&state("Divided")).unwrap();
        assert_eq!(applied, state("Divided"));
        assert_eq!(machine.get_state(), Some(state("Divided")));
    }

    #[tokio::test]
    async fn restore_replaces_undefined_record() {
        let store = Arc::new(MemoryStore::new());
        store.save_current_state(&state("Retired")).unwrap();
        let (machine, _fx) = machine(store);

        let applied = machine.restore_state(&state("Divided")).unwrap();
        assert_eq!(applied, state("Divided"));
    }

    #[tokio::test]
    async fn store_failures_are_not_fatal() {
        let (machine, _fx) = machine(Arc::new(FailingStore));

        let applied = machine.restore_state(&state("Divided")).unwrap();
        assert_eq!(applied, state("Divided"));

        machine.set_state(&state("Combined")).unwrap();
        assert_eq!(machine.get_state(), Some(state("Combined")));
    }

    #[tokio::test]
    async fn forward_relays_local_events() {
        let secondary_states = StateTable::new()
            .define(&secondary(), &state("Combined"), |ctx| {
                ctx.forward("standby", &Role::new("Primary").unwrap());
                Ok(())
            })
            .for_role(&secondary())
            .unwrap();
        let fx = fixture("BBBBBBBBBBBB");
        let machine = StateMachine::new(
            secondary_states,
            Arc::new(MemoryStore::new()),
            fx.services.clone(),
        );

        machine.set_state(&state("Combined")).unwrap();
        fx.services.events.publish("local.standby", vec!["Off".into()]);
        fx.services.transport.flush_all().await;

        assert_eq!(
            fx.recorder.payloads(),
            vec!["divisibleWorkspaces-Secondary-standby-Off"]
        );
    }
}
