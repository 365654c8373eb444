//! Local device inspection.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::PeerAuth;
use crate::state::GatewayState;

/// What the node has written to the device and what it last reported.
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    /// Configuration values.
    pub settings: BTreeMap<String, String>,
    /// Commands executed, oldest first.
    pub commands: Vec<String>,
    /// Last reported status values.
    pub status: BTreeMap<String, String>,
}

/// `GET /v1/device`
pub async fn get_device(
    State(state): State<Arc<GatewayState>>,
    _peer: PeerAuth,
) -> Json<DeviceResponse> {
    Json(DeviceResponse {
        settings: state.device.settings(),
        commands: state.device.commands(),
        status: state.device.statuses(),
    })
}
