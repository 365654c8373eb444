//! Liveness of the node behind the endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::GatewayState;

/// Liveness report.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `starting` until the first state is applied, then `healthy`.
    pub status: &'static str,
    /// Role this device resolved to.
    pub role: String,
    /// Crate version.
    pub version: &'static str,
}

/// `GET /health`, unauthenticated so installers and peers can poll it.
pub async fn health(State(state): State<Arc<GatewayState>>) -> Json<HealthResponse> {
    let status = if state.node.current_state().is_some() {
        "healthy"
    } else {
        "starting"
    };

    Json(HealthResponse {
        status,
        role: state.node.role().to_string(),
        version: env!("CARGO_PKG_VERSION"),
    })
}
