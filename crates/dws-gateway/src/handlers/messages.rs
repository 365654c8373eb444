//! Inbound peer messages.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use dws_transport::{Dispatched, Envelope};

use crate::auth::PeerAuth;
use crate::state::GatewayState;

/// What happened to a received batch.
#[derive(Debug, Default, Serialize)]
pub struct ReceiptResponse {
    /// Payloads in the batch.
    pub received: usize,
    /// Payloads handed to the node.
    pub routed: usize,
    /// Payloads dropped as foreign or malformed.
    pub discarded: usize,
}

/// Accept a batch of wire payloads from a peer.
///
/// Every payload is dispatched in order. Payloads that do not decode are
/// counted and dropped; they never fail the request.
///
/// ```text
/// POST /v1/messages
/// Authorization: Basic ...
/// { "app": "divisibleWorkspaces", "source": "10.0.0.1",
///   "messages": ["divisibleWorkspaces-Primary-heartbeat"] }
///
/// Response: 202 Accepted
/// { "received": 1, "routed": 1, "discarded": 0 }
/// ```
pub async fn receive_messages(
    State(state): State<Arc<GatewayState>>,
    peer: PeerAuth,
    Json(envelope): Json<Envelope>,
) -> impl IntoResponse {
    tracing::debug!(
        source = %envelope.source,
        app = %envelope.app,
        username = %peer.username,
        count = envelope.messages.len(),
        "Received peer batch"
    );

    let mut receipt = ReceiptResponse {
        received: envelope.messages.len(),
        ..ReceiptResponse::default()
    };
    for payload in &envelope.messages {
        match state.node.dispatch(payload) {
            Dispatched::Routed | Dispatched::StatusReply(_) => receipt.routed += 1,
            Dispatched::Discarded => receipt.discarded += 1,
        }
    }

    (StatusCode::ACCEPTED, Json(receipt))
}
