//! Node state endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use dws_control::Origin;
use dws_core::{Role, StateName};

use crate::auth::PeerAuth;
use crate::error::ApiError;
use crate::state::GatewayState;

/// The node's role and state.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    /// Local role.
    pub role: Role,
    /// Applied state, if any.
    pub state: Option<StateName>,
    /// States defined for the role.
    pub states: Vec<StateName>,
}

/// Body of a state change request.
#[derive(Debug, Deserialize)]
pub struct ApplyStateRequest {
    /// The state to apply.
    pub state: String,
}

/// A peer's reported state.
#[derive(Debug, Serialize)]
pub struct PeerStateResponse {
    /// The peer's role.
    pub role: Role,
    /// Its current state.
    pub state: StateName,
}

/// `GET /v1/state`
pub async fn get_state(
    State(state): State<Arc<GatewayState>>,
    _peer: PeerAuth,
) -> Json<StateResponse> {
    let node = &state.node;
    Json(StateResponse {
        role: node.role().clone(),
        state: node.current_state(),
        states: node.machine().state_names(),
    })
}

/// `POST /v1/state`
///
/// Queues the state on the node's loop and answers `202 Accepted`.
///
/// # Errors
///
/// Returns `400` for a malformed or undefined state name.
pub async fn apply_state(
    State(state): State<Arc<GatewayState>>,
    _peer: PeerAuth,
    Json(body): Json<ApplyStateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let requested = StateName::new(body.state)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.node.request_state(requested.clone(), Origin::Local)?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "requested": requested })),
    ))
}

/// `GET /v1/peers/:role/state`
///
/// Asks the peers holding `role` for their state and waits for the first
/// reply.
///
/// # Errors
///
/// Returns `404` if no peer holds the role and `504` if none answered in time.
pub async fn get_peer_state(
    State(state): State<Arc<GatewayState>>,
    _peer: PeerAuth,
    Path(role): Path<String>,
) -> Result<Json<PeerStateResponse>, ApiError> {
    let role = Role::new(role).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let reported = state
        .node
        .services()
        .transport
        .request_status(&role)
        .await?;

    Ok(Json(PeerStateResponse {
        role,
        state: reported,
    }))
}
