//! Panel surface endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use dws_control::{ControlError, PanelView};

use crate::auth::PeerAuth;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Body of a panel press.
#[derive(Debug, Deserialize)]
pub struct PressRequest {
    /// The option pressed.
    pub value: String,
}

/// `GET /v1/panel`
pub async fn get_panel(State(state): State<Arc<GatewayState>>, _peer: PeerAuth) -> Json<PanelView> {
    Json(state.panel.view())
}

/// `POST /v1/panel/press`
///
/// # Errors
///
/// Returns `409` while the panel is locked and `400` if nothing is rendered
/// or `value` is not an option.
pub async fn press(
    State(state): State<Arc<GatewayState>>,
    _peer: PeerAuth,
    Json(body): Json<PressRequest>,
) -> Result<impl IntoResponse, ApiError> {
    state.panel.press(&body.value).map_err(|err| match err {
        ControlError::Panel(msg) => ApiError::BadRequest(msg),
        other => ApiError::from(other),
    })?;

    Ok(StatusCode::ACCEPTED)
}
