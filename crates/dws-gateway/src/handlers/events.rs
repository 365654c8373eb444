//! Local device events.
//!
//! Whatever watches the local device (standby, volume, mute) reports changes
//! here. They are published on the node's bus under `local.<kind>`, where the
//! active state may relay them to peers. Kinds that report a device status
//! also update it, so a state entered later can send the current value.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use dws_control::local_topic;
use dws_core::StateName;

use crate::auth::PeerAuth;
use crate::error::ApiError;
use crate::presets::status_path;
use crate::state::GatewayState;

const MAX_ARGS: usize = 2;

/// A local device event.
#[derive(Debug, Deserialize)]
pub struct LocalEvent {
    /// Event type, e.g. `volumeChange`.
    pub kind: String,
    /// Up to two arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

/// How many subscribers saw the event.
#[derive(Debug, Serialize)]
pub struct PublishResponse {
    /// Subscribers notified.
    pub delivered: usize,
}

/// `POST /v1/events`
///
/// # Errors
///
/// Returns `400` if the kind or an argument cannot travel on the wire.
pub async fn publish_event(
    State(state): State<Arc<GatewayState>>,
    _peer: PeerAuth,
    Json(event): Json<LocalEvent>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&event)?;

    if let (Some(path), Some(value)) = (status_path(&event.kind), event.args.first()) {
        state.device.set_status(path, value);
    }
    let delivered = state.events.publish(&local_topic(&event.kind), event.args);
    Ok((StatusCode::ACCEPTED, Json(PublishResponse { delivered })))
}

fn validate(event: &LocalEvent) -> Result<(), ApiError> {
    // Kinds and arguments share the state-name token grammar.
    StateName::new(event.kind.as_str())
        .map_err(|_| ApiError::BadRequest(format!("invalid event kind {:?}", event.kind)))?;
    if event.args.len() > MAX_ARGS {
        return Err(ApiError::BadRequest(format!(
            "at most {MAX_ARGS} arguments, got {}",
            event.args.len()
        )));
    }
    for arg in &event.args {
        StateName::new(arg.as_str())
            .map_err(|_| ApiError::BadRequest(format!("invalid argument {arg:?}")))?;
    }
    Ok(())
}
