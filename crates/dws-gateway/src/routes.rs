//! Router configuration.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{device, events, health, messages, panel, state};
use crate::state::GatewayState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Liveness, local role and whether a state is applied
///
/// ## Peer (Basic auth with the pairing credential)
/// - `POST /v1/messages` - Deliver a batch of wire payloads
/// - `GET /v1/state` - Role, applied state and defined states
/// - `POST /v1/state` - Queue a state change
/// - `GET /v1/peers/:role/state` - Ask a peer for its state
/// - `GET /v1/panel` - Panel snapshot
/// - `POST /v1/panel/press` - Press a panel option
/// - `POST /v1/events` - Publish a local device event
/// - `GET /v1/device` - Settings, commands and reported status of the device
pub fn create_router(gateway: GatewayState) -> Router {
    let cors = build_cors_layer(&gateway.config.cors_origins);
    let max_body_bytes = gateway.config.max_body_bytes;
    let request_timeout = gateway.config.request_timeout();

    Router::new()
        .route("/health", get(health::health))
        .route("/v1/messages", post(messages::receive_messages))
        .route("/v1/state", get(state::get_state).post(state::apply_state))
        .route("/v1/peers/:role/state", get(state::get_peer_state))
        .route("/v1/panel", get(panel::get_panel))
        .route("/v1/panel/press", post(panel::press))
        .route("/v1/events", post(events::publish_event))
        .route("/v1/device", get(device::get_device))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(Arc::new(gateway))
}

/// Build the CORS layer from configured origins. No origins means no
/// cross-origin access.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
