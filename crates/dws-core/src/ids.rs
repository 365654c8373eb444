//! Core identifier types for divisible workspaces.
//!
//! This module provides strongly-typed identifiers for device roles, state names
//! and hardware identities. Roles and state names travel inside `-`-separated
//! wire messages, so they are restricted to ASCII alphanumerics and `_`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returns true if `s` is a non-empty token of ASCII alphanumerics or `_`.
fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

macro_rules! token_id {
    ($name:ident, $kind:literal) => {
        impl $name {
            /// Parse and validate a token.
            ///
            /// # Errors
            ///
            /// Returns an error if the value is empty or contains characters
            /// other than ASCII alphanumerics and `_`.
            pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
                let value = value.into();
                if is_token(&value) {
                    Ok(Self(value))
                } else {
                    Err(IdError::InvalidToken {
                        kind: $kind,
                        value,
                    })
                }
            }

            /// Return the token as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// The logical role of a device within a pairing (e.g. `Primary`, `Secondary`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

token_id!(Role, "role");

impl Role {
    /// Returns true if this is the primary role (case-insensitive).
    #[must_use]
    pub fn is_primary(&self) -> bool {
        self.0.eq_ignore_ascii_case("primary")
    }
}

/// The name of an operating state (e.g. `Combined`, `Divided`).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StateName(String);

token_id!(StateName, "state name");

/// A device's unique hardware identity (its 12-character serial number).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceIdentity(String);

impl DeviceIdentity {
    /// The exact length of a hardware identity.
    pub const LEN: usize = 12;

    /// Parse and validate a hardware identity.
    ///
    /// # Errors
    ///
    /// Returns an error unless the value is exactly 12 ASCII alphanumerics.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.len() != Self::LEN {
            return Err(IdError::InvalidLength {
                expected: Self::LEN,
                got: value.len(),
            });
        }
        if !value.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(IdError::InvalidToken {
                kind: "identity",
                value,
            });
        }
        Ok(Self(value))
    }

    /// Return the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceIdentity({})", self.0)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceIdentity {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for DeviceIdentity {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DeviceIdentity> for String {
    fn from(id: DeviceIdentity) -> Self {
        id.0
    }
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is empty or contains characters outside the allowed set.
    #[error("invalid {kind}: {value:?}")]
    InvalidToken {
        /// What kind of identifier was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// The input has an incorrect length.
    #[error("invalid length: expected {expected} characters, got {got}")]
    InvalidLength {
        /// The expected number of characters.
        expected: usize,
        /// The actual number of characters.
        got: usize,
    },
}
