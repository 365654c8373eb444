//! API and startup error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use dws_auth::AuthError;
use dws_control::ControlError;
use dws_core::CoreError;
use dws_store::StoreError;
use dws_transport::TransportError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or invalid peer credential.
    #[error("unauthorized")]
    Unauthorized,

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request conflicts with the current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A peer did not answer in time.
    #[error("gateway timeout: {0}")]
    Timeout(String),

    /// The node is not accepting work.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::BadRequest(_) => "bad_request",
            Self::Timeout(_) => "timeout",
            Self::Unavailable(_) => "unavailable",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code(),
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingAuthorization
            | AuthError::MalformedAuthorization
            | AuthError::Rejected => Self::Unauthorized,
            AuthError::InvalidCredential(_)
            | AuthError::AccountSetup(_)
            | AuthError::Directory(_) => {
                tracing::error!(error = %err, "Account directory error");
                Self::Internal("authentication error".to_string())
            }
        }
    }
}

impl From<ControlError> for ApiError {
    fn from(err: ControlError) -> Self {
        match err.http_status_code() {
            400 => Self::BadRequest(err.to_string()),
            409 => Self::Conflict(err.to_string()),
            503 => Self::Unavailable(err.to_string()),
            504 => Self::Timeout(err.to_string()),
            _ => {
                tracing::error!(error = %err, "Control error");
                Self::Internal(err.to_string())
            }
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout { .. } => Self::Timeout(err.to_string()),
            TransportError::NoPeer(role) => Self::NotFound(format!("no peer with role {role}")),
            other => Self::from(ControlError::Transport(other)),
        }
    }
}

/// Errors that stop the daemon before it serves requests.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The pairing configuration or identity is unusable.
    #[error(transparent)]
    Config(#[from] CoreError),

    /// The service account could not be provisioned.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The node could not be assembled.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// The state store could not be opened.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The peer client could not be built.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The listener could not be bound or failed while serving.
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use dws_core::{Role, StateName};

    #[test]
    fn error_status_codes() {
        assert_eq!(ApiError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::Conflict("test".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Timeout("test".into()).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(ApiError::BadRequest("x".into()).code(), "bad_request");
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn control_errors_map_by_status() {
        let unknown = ControlError::UnknownState {
            role: Role::new("Primary").unwrap(),
            state: StateName::new("Merged").unwrap(),
        };
        assert!(matches!(ApiError::from(unknown), ApiError::BadRequest(_)));
        assert!(matches!(
            ApiError::from(ControlError::PanelLocked),
            ApiError::Conflict(_)
        ));
        assert!(matches!(
            ApiError::from(ControlError::NodeStopped),
            ApiError::Unavailable(_)
        ));
        assert!(matches!(
            ApiError::from(ControlError::Action("boom".into())),
            ApiError::Internal(_)
        ));
    }

    #[test]
    fn transport_errors() {
        let timeout = TransportError::Timeout {
            role: Role::new("Secondary").unwrap(),
            waited: std::time::Duration::from_millis(5500),
        };
        assert!(matches!(ApiError::from(timeout), ApiError::Timeout(_)));
        assert!(matches!(
            ApiError::from(TransportError::NoPeer(Role::new("Tertiary").unwrap())),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn auth_rejections_are_unauthorized() {
        assert!(matches!(
            ApiError::from(AuthError::Rejected),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from(AuthError::Directory("down".into())),
            ApiError::Internal(_)
        ));
    }
}
