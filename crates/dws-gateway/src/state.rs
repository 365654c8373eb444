//! Shared state available to every request handler.

use std::sync::Arc;

use dws_auth::AccountRegistry;
use dws_control::{EventBus, InMemoryDevice, Node, PanelModel};

use crate::config::GatewayConfig;

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct GatewayState {
    /// The local node.
    pub node: Arc<Node>,
    /// The panel the node renders on.
    pub panel: Arc<PanelModel>,
    /// The node's event bus, for local device events.
    pub events: EventBus,
    /// The device the node configures.
    pub device: Arc<InMemoryDevice>,
    /// Accounts allowed to post to this device.
    pub accounts: Arc<AccountRegistry>,
    /// Gateway configuration.
    pub config: GatewayConfig,
}

impl GatewayState {
    /// Create a new gateway state.
    #[must_use]
    pub fn new(
        node: Arc<Node>,
        panel: Arc<PanelModel>,
        events: EventBus,
        device: Arc<InMemoryDevice>,
        accounts: Arc<AccountRegistry>,
        config: GatewayConfig,
    ) -> Self {
        Self {
            node,
            panel,
            events,
            device,
            accounts,
            config,
        }
    }
}
