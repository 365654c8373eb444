//! Node assembly and startup sequencing.

use std::sync::Arc;
use std::time::Duration;

use dws_auth::{ensure_service_account, AccountRegistry};
use dws_control::{EventBus, InMemoryDevice, Node, NodeParts, PanelModel};
use dws_core::{CoreError, DeviceIdentity, StateName};
use dws_store::Store;
use dws_transport::PeerClient;
use tokio::task::JoinHandle;

use crate::config::PairingConfig;
use crate::error::StartupError;
use crate::presets::standard_pairing;
use crate::state::GatewayState;

/// A fully wired node and the HTTP state that fronts it.
pub struct Daemon {
    /// Handler state for the router.
    pub state: GatewayState,
    initial_state: StateName,
    startup_delay: Duration,
}

impl Daemon {
    /// Wire a node for the local device `identity`.
    ///
    /// Provisions the pairing credential as a local account, builds the
    /// standard state table and resolves the local role. Nothing runs until
    /// [`spawn`](Self::spawn) is called.
    ///
    /// # Errors
    ///
    /// Returns `StartupError::Config` if the identity is not in the roster or
    /// the default or fallback state is not defined for the local role,
    /// `StartupError::Auth` if the account cannot be provisioned, and
    /// `StartupError::Control` if the role has no states.
    pub async fn assemble(
        pairing: &PairingConfig,
        identity: &DeviceIdentity,
        store: Arc<dyn Store>,
        client: Arc<dyn PeerClient>,
    ) -> Result<Self, StartupError> {
        let resolved = pairing.roster()?.resolve(identity)?;
        let states = standard_pairing(&pairing.heartbeat, &pairing.lock_prompt)?;
        let initial_state = pairing.initial_state()?;
        let fallback = pairing.heartbeat.fallback()?;
        let role_states = states.for_role(&resolved.local().role)?;
        for (purpose, name) in [
            ("default", &initial_state),
            ("fallback", &fallback),
        ] {
            if !role_states.contains(name) {
                return Err(CoreError::Configuration(format!(
                    "{purpose} state {name} is not defined for role {}; expected one of {:?}",
                    resolved.local().role,
                    role_states.names()
                ))
                .into());
            }
        }

        let accounts = Arc::new(AccountRegistry::new());
        ensure_service_account(accounts.as_ref(), &pairing.credentials, &[]).await?;
        tracing::info!(
            username = pairing.credentials.username(),
            "Service account ready"
        );

        let events = EventBus::new();
        let device = Arc::new(InMemoryDevice::new());
        let panel = Arc::new(PanelModel::new(events.clone()));

        let node = Node::new(NodeParts {
            resolved,
            namespace: pairing.namespace.clone(),
            states,
            store,
            client,
            transport: pairing.transport.clone(),
            device: device.clone(),
            panel: panel.clone(),
            panel_definition: pairing.panel.clone(),
            events: events.clone(),
        })?;

        let state = GatewayState::new(
            Arc::new(node),
            panel,
            events,
            device,
            accounts,
            pairing.gateway.clone(),
        );

        Ok(Self {
            state,
            initial_state,
            startup_delay: pairing.startup_delay(),
        })
    }

    /// The node.
    #[must_use]
    pub fn node(&self) -> &Arc<Node> {
        &self.state.node
    }

    /// Run the node's command loop and apply the initial state once the
    /// startup delay has passed.
    ///
    /// The returned handle completes after [`Node::shutdown`].
    #[must_use]
    pub fn spawn(&self) -> JoinHandle<()> {
        let runner = Arc::clone(&self.state.node);
        let handle = tokio::spawn(async move { runner.run().await });

        let node = Arc::clone(&self.state.node);
        let initial = self.initial_state.clone();
        let delay = self.startup_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::info!(default = %initial, "Restoring state");
            if let Err(err) = node.start(initial) {
                tracing::error!(error = %err, "Unable to start node");
            }
        });

        handle
    }
}
