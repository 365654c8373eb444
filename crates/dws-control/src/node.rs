//! The node: one device's state machine, heartbeats, panel and messaging,
//! driven by a single command loop.
//!
//! Everything that can change state while the process runs (peer
//! `changeState` messages, heartbeat fallbacks, panel presses) is queued as a
//! [`Command`] and applied in order by [`Node::run`], so no two states are
//! ever applied at once and no entry action is re-entered.

use std::sync::Arc;

use dws_core::{Event, Resolved, Role, StateName};
use dws_store::Store;
use dws_transport::{Dispatched, InboundHandler, MessageTransport, PeerClient, TransportConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::device::DeviceControl;
use crate::error::{ControlError, Result};
use crate::events::{remote_topic, EventBus};
use crate::heartbeat::HeartbeatMonitor;
use crate::machine::{Services, StateMachine};
use crate::panel::{PanelDefinition, PanelSurface, PanelSync};
use crate::request::{Origin, StateRequester};
use crate::states::StateTable;

/// Work for the node's event loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Apply a state.
    SetState {
        /// The state to apply.
        state: StateName,
        /// Who asked for it.
        origin: Origin,
    },
    /// Apply the persisted state, or `default`.
    Restore {
        /// State applied when nothing usable is persisted.
        default: StateName,
    },
    /// Stop the loop, cancel heartbeats and flush pending messages.
    Shutdown,
}

/// Everything needed to build a [`Node`].
pub struct NodeParts {
    /// The resolved roster.
    pub resolved: Resolved,
    /// Wire namespace.
    pub namespace: String,
    /// States for every role.
    pub states: StateTable,
    /// Where the current state is persisted.
    pub store: Arc<dyn Store>,
    /// Delivers message batches to peers.
    pub client: Arc<dyn PeerClient>,
    /// Batching and correlation settings.
    pub transport: TransportConfig,
    /// The local device.
    pub device: Arc<dyn DeviceControl>,
    /// The UI surface.
    pub panel: Arc<dyn PanelSurface>,
    /// How the panel button appears.
    pub panel_definition: PanelDefinition,
    /// The local event bus.
    pub events: EventBus,
}

/// One device in a pairing.
pub struct Node {
    machine: StateMachine,
    panel: Arc<PanelSync>,
    commands: mpsc::UnboundedSender<Command>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("machine", &self.machine)
            .field("panel", &self.panel)
            .finish_non_exhaustive()
    }
}

impl Node {
    /// Build a node for the resolved local device.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NoStates` if no states are defined for the
    /// local role.
    pub fn new(parts: NodeParts) -> Result<Self> {
        let states = parts.states.for_role(parts.resolved.role())?;
        let (commands, receiver) = mpsc::unbounded_channel();

        let requester = {
            let commands = commands.clone();
            StateRequester::new(move |state, origin| {
                if commands.send(Command::SetState { state, origin }).is_err() {
                    tracing::debug!("Node stopped, dropping state request");
                }
            })
        };

        let transport = MessageTransport::new(
            &parts.resolved,
            parts.namespace,
            parts.client,
            parts.transport,
        );
        let services = Services {
            heartbeat: HeartbeatMonitor::new(transport.clone(), requester.clone()),
            transport,
            events: parts.events,
            device: parts.device,
            panel: Arc::clone(&parts.panel),
            requester,
        };

        let machine = StateMachine::new(states, parts.store, services);
        let panel = Arc::new(PanelSync::new(parts.panel, parts.panel_definition));
        {
            let panel = Arc::clone(&panel);
            machine.observe(move |state| panel.state_changed(state));
        }

        tracing::info!(
            role = %machine.role(),
            states = ?machine.state_names(),
            "Node ready"
        );

        Ok(Self {
            machine,
            panel,
            commands,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// The local role.
    #[must_use]
    pub const fn role(&self) -> &Role {
        self.machine.role()
    }

    /// The state machine.
    #[must_use]
    pub const fn machine(&self) -> &StateMachine {
        &self.machine
    }

    /// The collaborators shared with entry actions.
    #[must_use]
    pub const fn services(&self) -> &Services {
        self.machine.services()
    }

    /// The current state, if one has been applied.
    #[must_use]
    pub fn current_state(&self) -> Option<StateName> {
        self.machine.get_state()
    }

    /// Render the panel and queue restoring the persisted state (or
    /// `default`).
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NodeStopped` if the loop has exited.
    pub fn start(&self, default: StateName) -> Result<()> {
        let services = self.services();
        self.panel.activate(
            self.machine.state_names(),
            &services.events,
            services.requester.clone(),
        );
        self.send(Command::Restore { default })
    }

    /// Queue `state`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::UnknownState` without queueing if `state` is
    /// not defined for the role, and `ControlError::NodeStopped` if the loop
    /// has exited.
    pub fn request_state(&self, state: StateName, origin: Origin) -> Result<()> {
        if !self.machine.state_names().contains(&state) {
            return Err(ControlError::UnknownState {
                role: self.role().clone(),
                state,
            });
        }
        self.send(Command::SetState { state, origin })
    }

    /// Ask the loop to stop.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::NodeStopped` if the loop has already exited.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    /// Decode and route one inbound payload.
    pub fn dispatch(&self, payload: &str) -> Dispatched {
        self.services().transport.dispatch(payload, self)
    }

    /// Run the command loop until [`Command::Shutdown`].
    ///
    /// Only the first call runs; later calls return immediately.
    pub async fn run(&self) {
        let receiver = self.receiver.lock().take();
        let Some(mut receiver) = receiver else {
            tracing::warn!("Node loop already running");
            return;
        };

        tracing::info!(role = %self.role(), "Node loop started");
        while let Some(command) = receiver.recv().await {
            if !self.handle(command) {
                break;
            }
        }
        receiver.close();

        let services = self.services();
        services.heartbeat.stop_all();
        self.panel.deactivate();
        services.transport.flush_all().await;
        tracing::info!(role = %self.role(), "Node loop stopped");
    }

    fn handle(&self, command: Command) -> bool {
        match command {
            Command::SetState { state, origin } => {
                tracing::info!(%state, %origin, "State requested");
                if let Err(e) = self.machine.set_state(&state) {
                    tracing::warn!(%state, %origin, error = %e, "State request failed");
                }
                true
            }
            Command::Restore { default } => {
                if let Err(e) = self.machine.restore_state(&default) {
                    tracing::error!(%default, error = %e, "Failed to restore state");
                }
                true
            }
            Command::Shutdown => false,
        }
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| ControlError::NodeStopped)
    }
}

impl InboundHandler for Node {
    fn on_change_state(&self, sender: &Role, state: StateName) {
        self.services()
            .requester
            .request(state, Origin::Remote(sender.clone()));
    }

    fn on_heartbeat(&self, sender: &Role) {
        self.services().heartbeat.on_heartbeat(sender);
    }

    fn on_status_request(&self, sender: &Role) {
        match self.current_state() {
            Some(state) => {
                self.services()
                    .transport
                    .notify(sender, Event::Status(state));
            }
            None => tracing::debug!(%sender, "Status requested before any state was applied"),
        }
    }

    fn on_notify(&self, sender: &Role, kind: &str, args: &[String]) {
        let delivered = self
            .services()
            .events
            .publish(&remote_topic(kind), args.to_vec());
        tracing::debug!(%sender, kind, delivered, "Peer notification");
    }
}
