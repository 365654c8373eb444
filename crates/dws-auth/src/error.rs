//! Authentication error types.

use thiserror::Error;

/// A result type using `AuthError`.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Errors that can occur during credential handling and account setup.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The configured credential is unusable (empty username or password).
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The request carried no `Authorization` header.
    #[error("missing authorization")]
    MissingAuthorization,

    /// The `Authorization` header is not a well-formed Basic header.
    #[error("malformed authorization header")]
    MalformedAuthorization,

    /// The username or password did not match an active account.
    #[error("invalid username or password")]
    Rejected,

    /// Provisioning the local service account failed.
    #[error("unable to setup user: {0}")]
    AccountSetup(String),

    /// The account directory reported an error.
    #[error("account directory error: {0}")]
    Directory(String),
}

impl AuthError {
    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::MissingAuthorization | Self::MalformedAuthorization | Self::Rejected => 401,
            Self::InvalidCredential(_) | Self::AccountSetup(_) | Self::Directory(_) => 500,
        }
    }

    /// Returns true if this error must stop the node at startup.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::InvalidCredential(_) | Self::AccountSetup(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(AuthError::MissingAuthorization.http_status_code(), 401);
        assert_eq!(AuthError::Rejected.http_status_code(), 401);
        assert_eq!(AuthError::Directory("x".into()).http_status_code(), 500);
    }

    #[test]
    fn setup_errors_are_fatal() {
        assert!(AuthError::AccountSetup("x".into()).is_configuration());
        assert!(!AuthError::Rejected.is_configuration());
    }
}
