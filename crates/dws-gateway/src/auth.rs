//! Peer authentication extractor.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::error::ApiError;
use crate::state::GatewayState;

/// A caller that presented the pairing credential.
///
/// Validates the `Authorization: Basic ...` header against the local account
/// registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerAuth {
    /// The authenticated account.
    pub username: String,
}

#[async_trait]
impl FromRequestParts<Arc<GatewayState>> for PeerAuth {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<GatewayState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        let username = state.accounts.verify_header(header).map_err(|err| {
            tracing::debug!(error = %err, "Rejected peer credential");
            ApiError::from(err)
        })?;

        Ok(Self { username })
    }
}
