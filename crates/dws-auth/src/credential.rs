//! The shared peer credential and Basic authorization headers.

use std::fmt;

use base64::prelude::*;
use serde::Deserialize;

use crate::error::{AuthError, Result};

/// The username/password pair shared by every device in a pairing.
///
/// Each device provisions a local account with this credential and presents
/// it when posting messages to its peers.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawCredential")]
pub struct Credential {
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct RawCredential {
    username: String,
    password: String,
}

impl TryFrom<RawCredential> for Credential {
    type Error = AuthError;

    fn try_from(raw: RawCredential) -> Result<Self> {
        Self::new(raw.username, raw.password)
    }
}

impl Credential {
    /// Create a credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredential` if either field is empty or the
    /// username contains `:`.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let password = password.into();

        if username.is_empty() {
            return Err(AuthError::InvalidCredential("username cannot be empty".into()));
        }
        if username.contains(':') {
            return Err(AuthError::InvalidCredential("username cannot contain ':'".into()));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidCredential("password cannot be empty".into()));
        }

        Ok(Self { username, password })
    }

    /// The account username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// The account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// The `Authorization` header value for this credential.
    #[must_use]
    pub fn authorization_header(&self) -> String {
        let token = BASE64_STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }

    /// Decode a `Basic` authorization header into a username and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MalformedAuthorization` if the header is not a
    /// base64-encoded `user:password` pair.
    pub fn parse_authorization(header: &str) -> Result<(String, String)> {
        let token = header
            .strip_prefix("Basic ")
            .ok_or(AuthError::MalformedAuthorization)?;
        let decoded = BASE64_STANDARD
            .decode(token.trim())
            .map_err(|_| AuthError::MalformedAuthorization)?;
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedAuthorization)?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(AuthError::MalformedAuthorization)?;
        Ok((username.to_string(), password.to_string()))
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
